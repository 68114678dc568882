//! Persistence tests
//!
//! Restart the engine over the same preference file and check that state
//! survives, and that bad files degrade to defaults.

mod common;

use backdrop_config::{FileStore, PrefKey, Preferences};
use common::{EngineHarness, TestEnvironment, png_upload};

#[test]
fn test_theme_survives_restart() {
    let env = TestEnvironment::new();
    {
        let mut h = env.engine();
        assert_eq!(h.theme(), Some("light"));
        h.engine.set_dark_mode(true);
        h.engine.teardown();
    }

    let h = env.engine();
    assert_eq!(h.theme(), Some("dark"));
    assert_eq!(h.glass_mode(), Some("none"));
    assert_eq!(h.image_mode(), Some("none"));
}

#[test]
fn test_system_preference_used_until_chosen() {
    let env = TestEnvironment::new();
    env.write_config("[general]\nprefers_dark = true\n");

    let mut h = env.engine();
    assert_eq!(h.theme(), Some("dark"));
    assert_eq!(h.stored("theme-dark"), None);

    h.engine.set_dark_mode(false);
    drop(h);
    assert_eq!(env.engine().theme(), Some("light"));
}

#[test]
fn test_rotation_resumes_where_it_stopped() {
    let env = TestEnvironment::new();
    {
        let mut h = env.engine();
        h.engine.set_carousel_interval(1).unwrap();
        h.engine.set_carousel_enabled(true);
        h.advance_secs(3);
        assert_eq!(h.engine.carousel().current_index(), 3);
        h.engine.teardown();
    }

    let mut h = env.engine();
    // Bundled set of five, resumed at the persisted index
    assert_eq!(h.engine.carousel().images().len(), 5);
    assert_eq!(h.engine.carousel().current_index(), 3);
    assert_eq!(h.surface().background(), Some("./Default4.avif"));

    h.advance_secs(1);
    assert_eq!(h.stored("carousel-current-index").as_deref(), Some("4"));
}

#[test]
fn test_cleared_carousel_stays_empty() {
    let env = TestEnvironment::new();
    {
        let mut h = env.engine();
        h.engine.clear_carousel_images();
    }
    let h = env.engine();
    assert!(h.engine.carousel().images().is_empty());
}

#[test]
fn test_uploaded_background_survives_restart() {
    let env = TestEnvironment::new();
    {
        let mut h = env.engine();
        h.engine.upload_background(&png_upload("sky.png", 256)).unwrap();
    }

    let h = env.engine();
    let stored = h.stored("custom-background").unwrap();
    assert_eq!(h.surface().background(), Some(stored.as_str()));
    assert_eq!(h.image_mode(), Some("light"));
}

#[test]
fn test_preferences_file_layout() {
    let env = TestEnvironment::new();
    {
        let mut h = env.engine();
        h.engine.set_dark_mode(true);
        h.engine.set_blur_amount(7).unwrap();
    }

    let content = std::fs::read_to_string(env.preferences_path()).unwrap();
    let table: toml::Table = content.parse().unwrap();
    let prefs = table["preferences"].as_table().unwrap();
    assert_eq!(prefs["theme-dark"].as_str(), Some("true"));
    assert_eq!(prefs["blur-amount"].as_str(), Some("7"));
}

#[test]
fn test_malformed_file_opens_empty() {
    let env = TestEnvironment::new();
    std::fs::write(env.preferences_path(), "this is [not toml").unwrap();

    let h = env.engine();
    assert_eq!(h.theme(), Some("light"));
    assert_eq!(h.engine.carousel().images().len(), 5);
}

#[test]
fn test_malformed_values_use_defaults() {
    let h = EngineHarness::with_values(&[
        ("carousel-images", "{broken"),
        ("carousel-interval-seconds", "0"),
        ("blur-amount", "999"),
        ("carousel-current-index", "-1"),
    ]);

    assert!(h.engine.carousel().images().is_empty());
    assert_eq!(h.engine.carousel().interval().as_secs(), 10);
    assert_eq!(h.engine.filters().blur, 3);
    assert_eq!(h.engine.carousel().current_index(), 0);
}

#[test]
fn test_external_edit_applies_on_reload() {
    let env = TestEnvironment::new();
    let mut h = env.engine();
    assert_eq!(h.theme(), Some("light"));

    let mut other = Preferences::new(
        FileStore::open(env.preferences_path()),
        env.config().preference_defaults(),
    );
    other.set_flag(PrefKey::ThemeDark, true);
    other.set_flag(PrefKey::GlassManualEnabled, true);

    assert!(h.engine.reload_preferences().unwrap());
    assert_eq!(h.theme(), Some("dark"));
    assert_eq!(h.glass_mode(), Some("dark"));
}

#[test]
fn test_own_writes_do_not_interrupt_rotation() {
    let env = TestEnvironment::new();
    {
        let mut prefs = env.preferences();
        prefs.set(PrefKey::CustomBackground, "me.png");
        prefs.set_flag(PrefKey::CarouselEnabled, true);
        prefs.set_number(PrefKey::CarouselIntervalSeconds, 1);
        prefs.set(PrefKey::CarouselImages, r#"["a","b","c"]"#);
    }

    let mut h = env.engine();
    assert_eq!(h.surface().background(), Some("me.png"));

    let mut shown = Vec::new();
    h.advance_ms(500);
    for _ in 0..3 {
        h.advance_ms(500);
        // The tick rewrote the index; a file watcher reports that write
        assert!(!h.engine.reload_preferences().unwrap());
        h.advance_ms(500);
        shown.push(h.surface().background().map(str::to_string));
    }

    let expected: Vec<_> = ["b", "c", "a"].iter().map(|s| Some(s.to_string())).collect();
    assert_eq!(shown, expected);
    assert_eq!(h.stored("carousel-current-index").as_deref(), Some("0"));
    assert!(h.engine.carousel().is_running());
}

#[test]
fn test_reset_wipes_file() {
    let env = TestEnvironment::new();
    {
        let mut h = env.engine();
        h.engine.set_dark_mode(true);
        h.engine.set_particles_enabled(true);
        h.engine.reset().unwrap();
    }

    let h = env.engine();
    assert_eq!(h.theme(), Some("light"));
    assert!(!h.engine.particles().is_enabled());
    assert!(env.preferences().unknown_keys().is_empty());
}
