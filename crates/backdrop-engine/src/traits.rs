//! Rendering surface abstractions
//!
//! The engine never talks to a concrete UI toolkit. It drives a [`Surface`]
//! (root attributes, the background layer, particle elements) and reports
//! user-visible problems through a [`Notifier`]. A recording implementation
//! lives in [`crate::mock`].

use std::fmt;
use std::time::Duration;

/// Root attribute names written by the engine
pub mod attributes {
    /// `dark` or `light`
    pub const THEME: &str = "theme";
    /// `none`, `light` or `dark`
    pub const GLASS_MODE: &str = "glass-mode";
    /// `none`, `light` or `dark`
    pub const IMAGE_MODE: &str = "img-mode";
}

/// Color theme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub const fn from_dark(dark: bool) -> Self {
        if dark { Theme::Dark } else { Theme::Light }
    }

    pub const fn is_dark(&self) -> bool {
        matches!(self, Theme::Dark)
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Glass or image treatment, tinted to match the theme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VisualMode {
    #[default]
    None,
    Light,
    Dark,
}

impl VisualMode {
    /// The tinted mode matching `theme`
    pub const fn for_theme(theme: Theme) -> Self {
        match theme {
            Theme::Light => VisualMode::Light,
            Theme::Dark => VisualMode::Dark,
        }
    }

    pub const fn is_none(&self) -> bool {
        matches!(self, VisualMode::None)
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            VisualMode::None => "none",
            VisualMode::Light => "light",
            VisualMode::Dark => "dark",
        }
    }
}

impl fmt::Display for VisualMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Presentation state derived from preferences; never persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DerivedVisualState {
    pub theme: Theme,
    pub glass_mode: VisualMode,
    pub image_mode: VisualMode,
}

/// State of a two-position control such as the manual glass switch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToggleState {
    pub checked: bool,
    /// Whether the control accepts user input
    pub enabled: bool,
}

/// Toast severity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
    Success,
    Error,
}

/// Opaque reference to a particle element owned by the surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParticleHandle(pub u32);

/// Per-spawn visual parameters of a particle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParticleParams {
    /// Diameter in pixels
    pub size_px: f32,
    /// Horizontal lane as a percentage of viewport width
    pub lane_vw: f32,
    /// Sideways drift over the fall, in pixels
    pub drift_px: f32,
    /// Length of the fall animation
    pub duration: Duration,
}

/// Animation timing function
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Easing {
    Linear,
}

/// What the element shows once the animation ends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillMode {
    Forwards,
}

/// Declarative animation applied to a particle element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnimationDescriptor {
    pub name: &'static str,
    pub duration: Duration,
    pub easing: Easing,
    pub fill: FillMode,
}

/// The rendering surface the engine drives
///
/// `start_animation` must replay the animation even when the element already
/// finished an animation of the same name; callers always `cancel_animation`
/// first.
pub trait Surface {
    /// Current value of a root attribute
    fn root_attribute(&self, name: &str) -> Option<String>;

    /// Set a root attribute
    fn set_root_attribute(&mut self, name: &str, value: &str);

    /// Reflect checked/enabled state onto the manual glass control
    fn set_glass_toggle(&mut self, state: ToggleState);

    /// Show `source` on the background layer, or clear it
    fn set_background_image(&mut self, source: Option<&str>);

    /// Add or remove the fade transition on the background layer
    fn set_background_transition(&mut self, active: bool);

    /// Saturation and brightness filter on the background layer, in percent
    fn set_background_filter(&mut self, saturation: u32, brightness: u32);

    /// Shared blur magnitude in pixels
    fn set_blur_amount(&mut self, px: u32);

    /// Backdrop blur behind the foreground content; `None` removes it
    fn set_content_backdrop_blur(&mut self, px: Option<u32>);

    /// Backdrop blur on panel modules; `None` removes it
    fn set_module_blur(&mut self, px: Option<u32>);

    /// Create a hidden particle element
    fn create_particle(&mut self) -> ParticleHandle;

    /// Make a particle visible with fresh parameters
    fn show_particle(&mut self, handle: ParticleHandle, params: &ParticleParams);

    /// Hide a particle element
    fn hide_particle(&mut self, handle: ParticleHandle);

    /// Clear any running or finished animation on the element
    fn cancel_animation(&mut self, handle: ParticleHandle);

    /// Start `animation` on the element from its first frame
    fn start_animation(&mut self, handle: ParticleHandle, animation: &AnimationDescriptor);
}

/// User-visible notifications
pub trait Notifier {
    fn show_toast(&mut self, message: &str, kind: ToastKind);
}
