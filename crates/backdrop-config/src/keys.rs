//! Preference keys
//!
//! Every persisted appearance preference is addressed by one of these keys.
//! The string form is the exact key written to the preference store.

use std::fmt;

/// A recognized preference key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PrefKey {
    /// Explicit dark/light override
    ThemeDark,
    /// Manual glass toggle, honored only when no background is active
    GlassManualEnabled,
    /// Currently selected single background (URL or data URI)
    CustomBackground,
    /// Tombstone: the user explicitly cleared the background
    BackgroundRemoved,
    /// Whether the rotating background is active
    CarouselEnabled,
    /// JSON array of image sources, in display order
    CarouselImages,
    /// Last shown rotation index
    CarouselCurrentIndex,
    /// Rotation period in seconds
    CarouselIntervalSeconds,
    BlurAmount,
    SaturationAmount,
    BrightnessAmount,
    ModuleBlurEnabled,
    BackgroundBlurEnabled,
    SizeLimitDisabled,
    ParticleEffectEnabled,
}

impl PrefKey {
    /// All keys, in the order they are documented
    pub const ALL: [PrefKey; 15] = [
        PrefKey::ThemeDark,
        PrefKey::GlassManualEnabled,
        PrefKey::CustomBackground,
        PrefKey::BackgroundRemoved,
        PrefKey::CarouselEnabled,
        PrefKey::CarouselImages,
        PrefKey::CarouselCurrentIndex,
        PrefKey::CarouselIntervalSeconds,
        PrefKey::BlurAmount,
        PrefKey::SaturationAmount,
        PrefKey::BrightnessAmount,
        PrefKey::ModuleBlurEnabled,
        PrefKey::BackgroundBlurEnabled,
        PrefKey::SizeLimitDisabled,
        PrefKey::ParticleEffectEnabled,
    ];

    /// The key as stored
    pub const fn as_str(&self) -> &'static str {
        match self {
            PrefKey::ThemeDark => "theme-dark",
            PrefKey::GlassManualEnabled => "glass-manual-enabled",
            PrefKey::CustomBackground => "custom-background",
            PrefKey::BackgroundRemoved => "background-removed",
            PrefKey::CarouselEnabled => "carousel-enabled",
            PrefKey::CarouselImages => "carousel-images",
            PrefKey::CarouselCurrentIndex => "carousel-current-index",
            PrefKey::CarouselIntervalSeconds => "carousel-interval-seconds",
            PrefKey::BlurAmount => "blur-amount",
            PrefKey::SaturationAmount => "saturation-amount",
            PrefKey::BrightnessAmount => "brightness-amount",
            PrefKey::ModuleBlurEnabled => "module-blur-enabled",
            PrefKey::BackgroundBlurEnabled => "background-blur-enabled",
            PrefKey::SizeLimitDisabled => "size-limit-disabled",
            PrefKey::ParticleEffectEnabled => "particle-effect-enabled",
        }
    }

    /// Look up a key by its stored name
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|key| key.as_str() == name)
    }
}

impl fmt::Display for PrefKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inclusive range and fallback for a numeric preference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NumericRange {
    pub min: u32,
    pub max: u32,
    pub default: u32,
}

impl NumericRange {
    pub const fn contains(&self, value: u32) -> bool {
        value >= self.min && value <= self.max
    }
}

pub const CAROUSEL_INTERVAL: NumericRange = NumericRange { min: 1, max: 3600, default: 10 };
pub const BLUR_AMOUNT: NumericRange = NumericRange { min: 0, max: 50, default: 3 };
pub const SATURATION_AMOUNT: NumericRange = NumericRange { min: 0, max: 200, default: 100 };
pub const BRIGHTNESS_AMOUNT: NumericRange = NumericRange { min: 0, max: 200, default: 100 };

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_roundtrips_every_key() {
        for key in PrefKey::ALL {
            assert_eq!(PrefKey::parse(key.as_str()), Some(key));
        }
    }

    #[test]
    fn test_parse_unknown_key() {
        assert_eq!(PrefKey::parse("dark-mode"), None);
        assert_eq!(PrefKey::parse(""), None);
    }

    #[test]
    fn test_keys_are_unique() {
        let mut names: Vec<_> = PrefKey::ALL.iter().map(|k| k.as_str()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), PrefKey::ALL.len());
    }

    #[test]
    fn test_range_contains() {
        assert!(CAROUSEL_INTERVAL.contains(1));
        assert!(!CAROUSEL_INTERVAL.contains(0));
        assert!(BLUR_AMOUNT.contains(0));
        assert!(!SATURATION_AMOUNT.contains(201));
    }
}
