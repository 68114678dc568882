//! Derived-mode resolution
//!
//! Computes theme, glass mode and image mode from stored flags and whether a
//! background is currently driving the look. An active background (a custom
//! image that was not removed, or an enabled carousel with images) always
//! selects image mode and locks the manual glass control; otherwise the
//! manual glass flag decides.

use backdrop_config::{PrefKey, Preferences};

use crate::traits::{DerivedVisualState, Theme, ToggleState, VisualMode};

/// Everything resolution depends on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResolverInputs {
    pub is_dark_theme: bool,
    pub has_custom_background: bool,
    pub background_removed: bool,
    pub carousel_enabled: bool,
    pub carousel_image_count: usize,
    pub manual_glass_enabled: bool,
}

impl ResolverInputs {
    /// Read inputs from preferences; the carousel size comes from the live
    /// carousel rather than re-parsing the stored list
    pub fn from_preferences(prefs: &Preferences, carousel_image_count: usize) -> Self {
        Self {
            is_dark_theme: prefs.is_dark_theme(),
            has_custom_background: prefs.string(PrefKey::CustomBackground).is_some(),
            background_removed: prefs.flag(PrefKey::BackgroundRemoved),
            carousel_enabled: prefs.flag(PrefKey::CarouselEnabled),
            carousel_image_count,
            manual_glass_enabled: prefs.flag(PrefKey::GlassManualEnabled),
        }
    }

    /// A custom background and the carousel are independent triggers
    pub fn background_active(&self) -> bool {
        (self.has_custom_background && !self.background_removed)
            || (self.carousel_enabled && self.carousel_image_count > 0)
    }
}

/// Result of one resolution pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub state: DerivedVisualState,
    /// What the manual glass control should show
    pub manual_glass: ToggleState,
}

/// Resolve the derived visual state. Pure and deterministic.
pub fn resolve(inputs: &ResolverInputs) -> Resolution {
    let theme = Theme::from_dark(inputs.is_dark_theme);
    let tinted = VisualMode::for_theme(theme);

    if inputs.background_active() {
        Resolution {
            state: DerivedVisualState {
                theme,
                glass_mode: VisualMode::None,
                image_mode: tinted,
            },
            manual_glass: ToggleState {
                checked: true,
                enabled: false,
            },
        }
    } else {
        let glass_mode = if inputs.manual_glass_enabled {
            tinted
        } else {
            VisualMode::None
        };
        Resolution {
            state: DerivedVisualState {
                theme,
                glass_mode,
                image_mode: VisualMode::None,
            },
            manual_glass: ToggleState {
                checked: inputs.manual_glass_enabled,
                enabled: true,
            },
        }
    }
}
