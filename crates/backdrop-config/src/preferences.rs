//! Typed access to the preference store
//!
//! Reads never fail: absent or malformed values resolve to documented
//! defaults. Writes are fire-and-forget; a failing store is logged and the
//! rejected value stays readable for the rest of the process, so everything
//! reading preferences agrees with what was applied.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::keys::{NumericRange, PrefKey};
use crate::store::{PreferenceStore, StoreError};

/// A multi-key save stopped partway through
///
/// Keys in `written` are already persisted and are not rolled back.
#[derive(Debug, Error)]
#[error("Saved {} preference(s) before '{failed}' failed: {source}", written.len())]
pub struct PartialSaveError {
    pub written: Vec<PrefKey>,
    pub failed: PrefKey,
    #[source]
    pub source: StoreError,
}

/// Defaults that depend on the environment rather than on a constant
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreferenceDefaults {
    /// Theme used when `theme-dark` was never written
    pub prefers_dark: bool,
    /// Rotation set used when `carousel-images` was never written
    pub carousel_images: Vec<String>,
}

/// Typed view over an injected [`PreferenceStore`]
pub struct Preferences {
    store: Box<dyn PreferenceStore>,
    defaults: PreferenceDefaults,
    /// Writes the store rejected; `None` is a rejected removal
    unsaved: BTreeMap<PrefKey, Option<String>>,
}

impl std::fmt::Debug for Preferences {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Preferences")
            .field("keys", &self.store.keys())
            .field("defaults", &self.defaults)
            .field("unsaved", &self.unsaved.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Preferences {
    pub fn new(store: impl PreferenceStore + 'static, defaults: PreferenceDefaults) -> Self {
        Self {
            store: Box::new(store),
            defaults,
            unsaved: BTreeMap::new(),
        }
    }

    pub fn defaults(&self) -> &PreferenceDefaults {
        &self.defaults
    }

    /// Raw stored string, including values the store failed to persist
    pub fn raw(&self, key: PrefKey) -> Option<String> {
        match self.unsaved.get(&key) {
            Some(value) => value.clone(),
            None => self.store.get(key.as_str()),
        }
    }

    /// Keys whose latest write only lives in memory
    pub fn unsaved_keys(&self) -> Vec<PrefKey> {
        self.unsaved.keys().copied().collect()
    }

    /// Boolean flag; anything other than `"true"` is false
    pub fn flag(&self, key: PrefKey) -> bool {
        self.optional_flag(key).unwrap_or(false)
    }

    /// Boolean flag that distinguishes "never set" from "false"
    pub fn optional_flag(&self, key: PrefKey) -> Option<bool> {
        match self.raw(key)?.trim() {
            "true" => Some(true),
            "false" => Some(false),
            other => {
                log::debug!("Ignoring non-boolean value {:?} for '{}'", other, key);
                None
            }
        }
    }

    /// Stored dark-theme override, falling back to the system preference
    pub fn is_dark_theme(&self) -> bool {
        self.optional_flag(PrefKey::ThemeDark)
            .unwrap_or(self.defaults.prefers_dark)
    }

    /// Non-empty string value
    pub fn string(&self, key: PrefKey) -> Option<String> {
        self.raw(key).filter(|s| !s.is_empty())
    }

    /// JSON array of strings. Absent carousel images fall back to the bundled
    /// set; anything unparsable is an empty list.
    pub fn string_list(&self, key: PrefKey) -> Vec<String> {
        let Some(raw) = self.raw(key) else {
            return match key {
                PrefKey::CarouselImages => self.defaults.carousel_images.clone(),
                _ => Vec::new(),
            };
        };
        serde_json::from_str::<Vec<String>>(&raw).unwrap_or_else(|e| {
            log::warn!("Malformed list in '{}' ({}), using empty list", key, e);
            Vec::new()
        })
    }

    /// Number within `range`; malformed or out-of-range values give the default
    pub fn number(&self, key: PrefKey, range: NumericRange) -> u32 {
        match self.raw(key).map(|raw| raw.trim().parse::<u32>()) {
            Some(Ok(value)) if range.contains(value) => value,
            Some(_) => {
                log::debug!("Out-of-range value for '{}', using {}", key, range.default);
                range.default
            }
            None => range.default,
        }
    }

    /// Non-negative index; malformed values give 0
    pub fn index(&self, key: PrefKey) -> usize {
        self.raw(key)
            .and_then(|raw| raw.trim().parse::<usize>().ok())
            .unwrap_or(0)
    }

    /// Write a value, reporting failure to the caller. A rejected value is
    /// still returned by later reads.
    pub fn try_set(&mut self, key: PrefKey, value: &str) -> Result<(), StoreError> {
        match self.store.set(key.as_str(), value) {
            Ok(()) => {
                self.unsaved.remove(&key);
                Ok(())
            }
            Err(e) => {
                self.unsaved.insert(key, Some(value.to_string()));
                Err(e)
            }
        }
    }

    /// Write a value, logging and swallowing failure
    pub fn set(&mut self, key: PrefKey, value: &str) {
        if let Err(e) = self.try_set(key, value) {
            log::warn!("Failed to save '{}': {}", key, e);
        }
    }

    pub fn set_flag(&mut self, key: PrefKey, value: bool) {
        self.set(key, if value { "true" } else { "false" });
    }

    pub fn set_number(&mut self, key: PrefKey, value: u32) {
        self.set(key, &value.to_string());
    }

    pub fn set_index(&mut self, key: PrefKey, value: usize) {
        self.set(key, &value.to_string());
    }

    pub fn set_string_list(&mut self, key: PrefKey, values: &[String]) {
        match serde_json::to_string(values) {
            Ok(json) => self.set(key, &json),
            Err(e) => log::warn!("Failed to encode '{}': {}", key, e),
        }
    }

    /// Delete a value, logging and swallowing failure
    pub fn remove(&mut self, key: PrefKey) {
        match self.store.remove(key.as_str()) {
            Ok(()) => {
                self.unsaved.remove(&key);
            }
            Err(e) => {
                log::warn!("Failed to remove '{}': {}", key, e);
                self.unsaved.insert(key, None);
            }
        }
    }

    /// Write several keys in order. Not atomic: on failure the earlier keys
    /// stay written and are listed in the error.
    pub fn save_many(&mut self, entries: &[(PrefKey, String)]) -> Result<(), PartialSaveError> {
        let mut written = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            if let Err(source) = self.try_set(*key, value) {
                return Err(PartialSaveError {
                    written,
                    failed: *key,
                    source,
                });
            }
            written.push(*key);
        }
        Ok(())
    }

    /// Delete every stored preference
    pub fn clear(&mut self) -> Result<(), StoreError> {
        self.store.clear()?;
        self.unsaved.clear();
        Ok(())
    }

    /// Re-read the backing store. Returns false when nothing changed, which
    /// is what a reload triggered by our own writes sees. Changed storage
    /// supersedes unsaved values.
    pub fn reload(&mut self) -> Result<bool, StoreError> {
        let changed = self.store.reload()?;
        if changed {
            self.unsaved.clear();
        }
        Ok(changed)
    }

    /// Stored keys that are not recognized preference keys are kept but listed here
    pub fn unknown_keys(&self) -> Vec<String> {
        self.store
            .keys()
            .into_iter()
            .filter(|k| PrefKey::parse(k).is_none())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{BLUR_AMOUNT, CAROUSEL_INTERVAL};
    use crate::store::MemoryStore;

    fn prefs(pairs: &[(&str, &str)]) -> Preferences {
        Preferences::new(
            MemoryStore::with_values(pairs.iter().copied()),
            PreferenceDefaults {
                prefers_dark: false,
                carousel_images: vec!["./Default1.avif".into(), "./Default2.avif".into()],
            },
        )
    }

    #[test]
    fn test_flag_defaults_false() {
        let p = prefs(&[]);
        assert!(!p.flag(PrefKey::CarouselEnabled));
        assert_eq!(p.optional_flag(PrefKey::ThemeDark), None);
    }

    #[test]
    fn test_flag_garbage_is_false() {
        let p = prefs(&[("carousel-enabled", "yes please")]);
        assert!(!p.flag(PrefKey::CarouselEnabled));
    }

    #[test]
    fn test_theme_falls_back_to_system_preference() {
        let mut p = prefs(&[]);
        p.defaults.prefers_dark = true;
        assert!(p.is_dark_theme());

        p.set_flag(PrefKey::ThemeDark, false);
        assert!(!p.is_dark_theme());
    }

    #[test]
    fn test_string_list_absent_uses_bundled_carousel() {
        let p = prefs(&[]);
        assert_eq!(p.string_list(PrefKey::CarouselImages).len(), 2);
    }

    #[test]
    fn test_string_list_malformed_is_empty() {
        let p = prefs(&[("carousel-images", "[not json")]);
        assert!(p.string_list(PrefKey::CarouselImages).is_empty());

        let p = prefs(&[("carousel-images", r#"{"a": 1}"#)]);
        assert!(p.string_list(PrefKey::CarouselImages).is_empty());
    }

    #[test]
    fn test_string_list_roundtrip_preserves_order() {
        let mut p = prefs(&[]);
        let images = vec!["c.png".to_string(), "a.png".to_string(), "b.png".to_string()];
        p.set_string_list(PrefKey::CarouselImages, &images);
        assert_eq!(p.string_list(PrefKey::CarouselImages), images);
    }

    #[test]
    fn test_number_out_of_range_uses_default() {
        let p = prefs(&[("carousel-interval-seconds", "0"), ("blur-amount", "-4")]);
        assert_eq!(p.number(PrefKey::CarouselIntervalSeconds, CAROUSEL_INTERVAL), 10);
        assert_eq!(p.number(PrefKey::BlurAmount, BLUR_AMOUNT), 3);

        let p = prefs(&[("carousel-interval-seconds", "30")]);
        assert_eq!(p.number(PrefKey::CarouselIntervalSeconds, CAROUSEL_INTERVAL), 30);
    }

    #[test]
    fn test_index_malformed_is_zero() {
        let p = prefs(&[("carousel-current-index", "two")]);
        assert_eq!(p.index(PrefKey::CarouselCurrentIndex), 0);
    }

    #[test]
    fn test_failed_write_stays_readable() {
        let mut store = MemoryStore::with_values([("custom-background", "me.png")]);
        store.set_unavailable(true);
        let mut p = Preferences::new(store, PreferenceDefaults::default());

        p.set_flag(PrefKey::ThemeDark, true);
        p.remove(PrefKey::CustomBackground);

        assert!(p.is_dark_theme());
        assert_eq!(p.raw(PrefKey::CustomBackground), None);
        assert_eq!(
            p.unsaved_keys(),
            vec![PrefKey::ThemeDark, PrefKey::CustomBackground]
        );
    }

    #[test]
    fn test_try_set_reports_failure_but_keeps_value() {
        let mut store = MemoryStore::new();
        store.set_unavailable(true);
        let mut p = Preferences::new(store, PreferenceDefaults::default());

        assert!(p.try_set(PrefKey::BlurAmount, "9").is_err());
        assert_eq!(p.number(PrefKey::BlurAmount, BLUR_AMOUNT), 9);
    }

    #[test]
    fn test_save_many_success() {
        let mut p = prefs(&[]);
        p.save_many(&[
            (PrefKey::BlurAmount, "6".to_string()),
            (PrefKey::SaturationAmount, "120".to_string()),
        ])
        .unwrap();
        assert_eq!(p.raw(PrefKey::BlurAmount).as_deref(), Some("6"));
        assert_eq!(p.raw(PrefKey::SaturationAmount).as_deref(), Some("120"));
    }

    #[test]
    fn test_save_many_reports_partial_write() {
        struct FailOn(MemoryStore, &'static str);
        impl PreferenceStore for FailOn {
            fn get(&self, key: &str) -> Option<String> {
                self.0.get(key)
            }
            fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
                if key == self.1 {
                    return Err(StoreError::Unavailable);
                }
                self.0.set(key, value)
            }
            fn remove(&mut self, key: &str) -> Result<(), StoreError> {
                self.0.remove(key)
            }
            fn clear(&mut self) -> Result<(), StoreError> {
                self.0.clear()
            }
            fn keys(&self) -> Vec<String> {
                self.0.keys()
            }
        }

        let mut p = Preferences::new(
            FailOn(MemoryStore::new(), "saturation-amount"),
            PreferenceDefaults::default(),
        );
        let err = p
            .save_many(&[
                (PrefKey::BlurAmount, "6".to_string()),
                (PrefKey::SaturationAmount, "120".to_string()),
                (PrefKey::BrightnessAmount, "90".to_string()),
            ])
            .unwrap_err();

        assert_eq!(err.written, vec![PrefKey::BlurAmount]);
        assert_eq!(err.failed, PrefKey::SaturationAmount);
        // Earlier key stays written, later key never attempted
        assert_eq!(p.raw(PrefKey::BlurAmount).as_deref(), Some("6"));
        assert_eq!(p.raw(PrefKey::BrightnessAmount), None);
    }

    #[test]
    fn test_unknown_keys_listed() {
        let p = prefs(&[("lastPage", "home"), ("theme-dark", "true")]);
        assert_eq!(p.unknown_keys(), vec!["lastPage".to_string()]);
    }
}
