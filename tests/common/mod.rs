//! Common test utilities and harness
//!
//! Provides reusable utilities for functional testing including:
//! - Test environment setup (temp directories, configs, preference files)
//! - An engine harness over the recording mock surface
//! - Upload fixtures

#![allow(dead_code)]

use std::path::PathBuf;
use std::time::Duration;

use backdrop_config::{Config, FileStore, MemoryStore, PreferenceDefaults, PreferenceStore, Preferences};
use backdrop_engine::{Engine, EngineOptions, MockNotifier, MockSurface, Upload, attributes};
use tempfile::TempDir;

/// Test environment with isolated config directory
pub struct TestEnvironment {
    /// Temporary directory for test config
    pub temp_dir: TempDir,
    /// Path to the config directory
    pub config_dir: PathBuf,
}

impl TestEnvironment {
    /// Create a new isolated test environment
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let config_dir = temp_dir.path().to_path_buf();
        Self {
            temp_dir,
            config_dir,
        }
    }

    /// Write a test config file
    pub fn write_config(&self, content: &str) {
        let config_path = self.config_dir.join("config.toml");
        std::fs::write(&config_path, content).expect("Failed to write test config");
    }

    /// Load (or create) the config in this environment
    pub fn config(&self) -> Config {
        Config::load_or_create_in(&self.config_dir).expect("Failed to load test config")
    }

    pub fn preferences_path(&self) -> PathBuf {
        self.config().preferences_path(&self.config_dir)
    }

    /// Preferences backed by this environment's preference file
    pub fn preferences(&self) -> Preferences {
        let config = self.config();
        Preferences::new(
            FileStore::open(config.preferences_path(&self.config_dir)),
            config.preference_defaults(),
        )
    }

    /// Engine over this environment's preference file, already initialized
    pub fn engine(&self) -> EngineHarness {
        EngineHarness::from_preferences(self.preferences())
    }
}

impl Default for TestEnvironment {
    fn default() -> Self {
        Self::new()
    }
}

/// Test harness for engine testing
pub struct EngineHarness {
    pub engine: Engine<MockSurface, MockNotifier>,
}

impl EngineHarness {
    /// Engine over an in-memory store seeded with `pairs`
    pub fn with_values(pairs: &[(&str, &str)]) -> Self {
        Self::with_store(MemoryStore::with_values(pairs.iter().copied()))
    }

    pub fn with_store(store: impl PreferenceStore + 'static) -> Self {
        Self::from_preferences(Preferences::new(store, PreferenceDefaults::default()))
    }

    pub fn from_preferences(prefs: Preferences) -> Self {
        let options = EngineOptions {
            particle_seed: 42,
            default_image: "./Default1.avif".to_string(),
        };
        let mut engine = Engine::new(MockSurface::new(), MockNotifier::new(), prefs, options);
        engine.initialize();
        Self { engine }
    }

    pub fn advance_ms(&mut self, ms: u64) {
        self.engine.advance(Duration::from_millis(ms));
    }

    pub fn advance_secs(&mut self, secs: u64) {
        self.engine.advance(Duration::from_secs(secs));
    }

    pub fn surface(&self) -> &MockSurface {
        self.engine.surface()
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.engine.surface().attribute(name)
    }

    pub fn theme(&self) -> Option<&str> {
        self.attribute(attributes::THEME)
    }

    pub fn glass_mode(&self) -> Option<&str> {
        self.attribute(attributes::GLASS_MODE)
    }

    pub fn image_mode(&self) -> Option<&str> {
        self.attribute(attributes::IMAGE_MODE)
    }

    /// Raw stored preference
    pub fn stored(&self, key: &str) -> Option<String> {
        let key = backdrop_config::PrefKey::parse(key).expect("Unknown preference key");
        self.engine.preferences().raw(key)
    }

    /// Assert the glass/image exclusion holds right now
    pub fn assert_modes_exclusive(&self) {
        let glass = self.glass_mode().unwrap_or("none");
        let image = self.image_mode().unwrap_or("none");
        assert!(
            glass == "none" || image == "none",
            "glass-mode={} and img-mode={} both set",
            glass,
            image
        );
    }
}

/// Upload of `size` bytes with a PNG signature
pub fn png_upload(name: &str, size: usize) -> Upload {
    let mut bytes = vec![0u8; size.max(8)];
    bytes[..8].copy_from_slice(&[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a]);
    Upload::new(name, bytes)
}

pub const MB: usize = 1024 * 1024;
