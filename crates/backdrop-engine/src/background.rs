//! Background image and carousel management
//!
//! Owns what the background layer shows, the carousel rotation timer and the
//! pending transition swap. Every swap goes through the same fade: the
//! transition is switched on, the image is replaced after a fixed delay, and
//! the transition is switched off again.

use std::time::Duration;

use backdrop_config::keys::{BLUR_AMOUNT, BRIGHTNESS_AMOUNT, CAROUSEL_INTERVAL, SATURATION_AMOUNT};
use backdrop_config::{NumericRange, PrefKey, Preferences};
use base64::{Engine as _, engine::general_purpose::STANDARD};

use crate::bus::Signal;
use crate::engine::{EffectContext, EngineError, Task};
use crate::scheduler::TimerId;
use crate::traits::{Surface, ToastKind};

/// Uploads larger than this are rejected unless the limit is disabled
pub const UPLOAD_LIMIT_BYTES: u64 = 2 * 1024 * 1024;
/// Fade delay for user-driven changes
pub const SELECT_TRANSITION: Duration = Duration::from_millis(300);
/// Fade delay for carousel rotation
pub const ROTATE_TRANSITION: Duration = Duration::from_millis(500);

const FALLBACK_MIME: &str = "application/octet-stream";

/// A user-selected image file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Whether this upload passes the size ceiling
    pub fn within_limit(&self, limit_disabled: bool) -> bool {
        limit_disabled || self.len() <= UPLOAD_LIMIT_BYTES
    }

    /// MIME type sniffed from the file header
    pub fn mime_type(&self) -> &'static str {
        image::guess_format(&self.bytes)
            .map(|format| format.to_mime_type())
            .unwrap_or(FALLBACK_MIME)
    }

    /// Inline representation stored as the background source
    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type(), STANDARD.encode(&self.bytes))
    }
}

/// Rotation set and its timer
#[derive(Debug, Clone, PartialEq)]
pub struct CarouselState {
    images: Vec<String>,
    current_index: usize,
    enabled: bool,
    interval: Duration,
    timer: Option<TimerId>,
}

impl CarouselState {
    fn from_preferences(prefs: &Preferences) -> Self {
        let images = prefs.string_list(PrefKey::CarouselImages);
        let stored = prefs.index(PrefKey::CarouselCurrentIndex);
        let current_index = if images.is_empty() { 0 } else { stored % images.len() };
        Self {
            images,
            current_index,
            enabled: prefs.flag(PrefKey::CarouselEnabled),
            interval: Duration::from_secs(prefs.number(PrefKey::CarouselIntervalSeconds, CAROUSEL_INTERVAL) as u64),
            timer: None,
        }
    }

    pub fn images(&self) -> &[String] {
        &self.images
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Enabled with something to rotate through
    pub fn is_active(&self) -> bool {
        self.enabled && !self.images.is_empty()
    }

    /// Whether the rotation timer is armed
    pub fn is_running(&self) -> bool {
        self.timer.is_some()
    }

    pub fn current_image(&self) -> Option<&str> {
        self.images.get(self.current_index).map(String::as_str)
    }

    /// Same rotation set, position and timing, ignoring the timer handle
    fn same_rotation(&self, other: &CarouselState) -> bool {
        self.images == other.images
            && self.current_index == other.current_index
            && self.enabled == other.enabled
            && self.interval == other.interval
    }
}

/// Rendering parameters for the background layer and blurred surfaces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterSettings {
    pub blur: u32,
    pub saturation: u32,
    pub brightness: u32,
    pub module_blur: bool,
    pub background_blur: bool,
}

impl FilterSettings {
    fn from_preferences(prefs: &Preferences) -> Self {
        Self {
            blur: prefs.number(PrefKey::BlurAmount, BLUR_AMOUNT),
            saturation: prefs.number(PrefKey::SaturationAmount, SATURATION_AMOUNT),
            brightness: prefs.number(PrefKey::BrightnessAmount, BRIGHTNESS_AMOUNT),
            module_blur: prefs.flag(PrefKey::ModuleBlurEnabled),
            background_blur: prefs.flag(PrefKey::BackgroundBlurEnabled),
        }
    }
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            blur: BLUR_AMOUNT.default,
            saturation: SATURATION_AMOUNT.default,
            brightness: BRIGHTNESS_AMOUNT.default,
            module_blur: false,
            background_blur: false,
        }
    }
}

fn check_range(key: PrefKey, value: u32, range: NumericRange) -> Result<u32, EngineError> {
    if range.contains(value) {
        Ok(value)
    } else {
        Err(EngineError::OutOfRange {
            key,
            value,
            min: range.min,
            max: range.max,
        })
    }
}

/// Static background if one is set and not removed
fn custom_background(prefs: &Preferences) -> Option<String> {
    if prefs.flag(PrefKey::BackgroundRemoved) {
        return None;
    }
    prefs.string(PrefKey::CustomBackground)
}

#[derive(Debug)]
pub struct BackgroundManager {
    carousel: CarouselState,
    filters: FilterSettings,
    /// Image currently on the background layer
    shown: Option<String>,
    /// Custom background as of the last display refresh
    custom: Option<String>,
    pending_swap: Option<TimerId>,
    default_image: String,
}

impl BackgroundManager {
    pub fn new(default_image: impl Into<String>) -> Self {
        Self {
            carousel: CarouselState {
                images: Vec::new(),
                current_index: 0,
                enabled: false,
                interval: Duration::from_secs(CAROUSEL_INTERVAL.default as u64),
                timer: None,
            },
            filters: FilterSettings::default(),
            shown: None,
            custom: None,
            pending_swap: None,
            default_image: default_image.into(),
        }
    }

    pub fn carousel(&self) -> &CarouselState {
        &self.carousel
    }

    pub fn filters(&self) -> &FilterSettings {
        &self.filters
    }

    pub fn shown(&self) -> Option<&str> {
        self.shown.as_deref()
    }

    pub fn default_image(&self) -> &str {
        &self.default_image
    }

    /// Whether a transition swap is waiting to happen
    pub fn in_transition(&self) -> bool {
        self.pending_swap.is_some()
    }

    /// Apply persisted state at startup, without a fade
    pub fn restore(&mut self, ctx: &mut EffectContext<'_>) {
        self.load(ctx);
        self.custom = custom_background(ctx.prefs);
        self.shown = self.desired(ctx.prefs);
        ctx.surface.set_background_image(self.shown.as_deref());
        self.apply_backdrop_blur(ctx.surface);
        log::info!(
            "Background restored: {} carousel image(s), carousel {}",
            self.carousel.images.len(),
            if self.carousel.is_running() { "running" } else { "idle" }
        );
    }

    /// Re-read persisted state after an external change, fading to the new
    /// image. An unchanged rotation keeps its timer and any swap in flight.
    pub fn reload(&mut self, ctx: &mut EffectContext<'_>) {
        let filters = FilterSettings::from_preferences(ctx.prefs);
        if filters != self.filters {
            self.filters = filters;
            self.apply_filters(ctx.surface);
        }

        let carousel = CarouselState::from_preferences(ctx.prefs);
        let rotation_changed = !self.carousel.same_rotation(&carousel);
        if rotation_changed {
            self.stop_timer(ctx);
            self.carousel = carousel;
            self.restart_timer(ctx);
        }

        if rotation_changed || custom_background(ctx.prefs) != self.custom {
            self.refresh_display(ctx, SELECT_TRANSITION);
        }
    }

    fn load(&mut self, ctx: &mut EffectContext<'_>) {
        self.stop_timer(ctx);
        self.carousel = CarouselState::from_preferences(ctx.prefs);
        self.filters = FilterSettings::from_preferences(ctx.prefs);
        self.apply_filters(ctx.surface);
        self.restart_timer(ctx);
    }

    /// Cancel the rotation timer and any pending swap
    pub fn stop(&mut self, ctx: &mut EffectContext<'_>) {
        self.stop_timer(ctx);
        if let Some(swap) = self.pending_swap.take() {
            ctx.scheduler.cancel(swap);
            ctx.surface.set_background_transition(false);
        }
    }

    // === Static background ===

    /// Validate and apply an uploaded file as the custom background
    pub fn upload(&mut self, ctx: &mut EffectContext<'_>, upload: &Upload) -> Result<(), EngineError> {
        if upload.is_empty() {
            return Err(EngineError::EmptyUpload(upload.name.clone()));
        }
        if !upload.within_limit(ctx.prefs.flag(PrefKey::SizeLimitDisabled)) {
            log::warn!(
                "Rejected upload '{}': {} bytes exceeds {} byte limit",
                upload.name,
                upload.len(),
                UPLOAD_LIMIT_BYTES
            );
            ctx.notifier.show_toast(
                "Image is larger than 2 MB. Disable the size limit to use it anyway.",
                ToastKind::Error,
            );
            return Err(EngineError::UploadTooLarge {
                name: upload.name.clone(),
                size: upload.len(),
                limit: UPLOAD_LIMIT_BYTES,
            });
        }

        self.apply_custom(ctx, upload.data_uri());
        ctx.notifier.show_toast("Background updated", ToastKind::Success);
        Ok(())
    }

    /// Set any image source as the custom background
    pub fn apply_custom(&mut self, ctx: &mut EffectContext<'_>, source: String) {
        log::info!("Custom background set ({} chars)", source.len());
        ctx.prefs.set(PrefKey::CustomBackground, &source);
        ctx.prefs.remove(PrefKey::BackgroundRemoved);
        self.custom = Some(source.clone());
        self.begin_transition(ctx, Some(source), SELECT_TRANSITION);
        ctx.bus.raise(Signal::BackgroundChanged);
    }

    /// Clear the custom background and leave a tombstone
    pub fn remove(&mut self, ctx: &mut EffectContext<'_>) {
        log::info!("Custom background removed");
        ctx.prefs.set_flag(PrefKey::BackgroundRemoved, true);
        ctx.prefs.remove(PrefKey::CustomBackground);
        self.refresh_display(ctx, SELECT_TRANSITION);
        ctx.bus.raise(Signal::BackgroundChanged);
    }

    pub fn restore_default(&mut self, ctx: &mut EffectContext<'_>) {
        let source = self.default_image.clone();
        self.apply_custom(ctx, source);
    }

    // === Carousel ===

    pub fn set_carousel_enabled(&mut self, ctx: &mut EffectContext<'_>, enabled: bool) {
        log::info!("Carousel {}", if enabled { "enabled" } else { "disabled" });
        ctx.prefs.set_flag(PrefKey::CarouselEnabled, enabled);
        self.carousel.enabled = enabled;
        self.restart_timer(ctx);
        self.refresh_display(ctx, SELECT_TRANSITION);
        ctx.bus.raise(Signal::BackgroundChanged);
    }

    /// Change the rotation period; a running timer restarts with it
    pub fn set_interval(&mut self, ctx: &mut EffectContext<'_>, seconds: u32) -> Result<(), EngineError> {
        let seconds = check_range(PrefKey::CarouselIntervalSeconds, seconds, CAROUSEL_INTERVAL)?;
        ctx.prefs.set_number(PrefKey::CarouselIntervalSeconds, seconds);
        self.carousel.interval = Duration::from_secs(seconds as u64);
        self.restart_timer(ctx);
        Ok(())
    }

    /// Append uploads to the rotation set. Empty and oversized files are
    /// skipped and reported together per reason. Returns how many were added.
    pub fn add_images(&mut self, ctx: &mut EffectContext<'_>, uploads: &[Upload]) -> usize {
        let limit_disabled = ctx.prefs.flag(PrefKey::SizeLimitDisabled);
        let mut empty = Vec::new();
        let mut oversized = Vec::new();
        let mut added = 0;

        for upload in uploads {
            if upload.is_empty() {
                empty.push(upload.name.as_str());
            } else if !upload.within_limit(limit_disabled) {
                oversized.push(upload.name.as_str());
            } else {
                self.carousel.images.push(upload.data_uri());
                added += 1;
            }
        }

        if !oversized.is_empty() {
            log::warn!("Skipped {} oversized carousel upload(s): {}", oversized.len(), oversized.join(", "));
            ctx.notifier.show_toast(
                &format!("Skipped {} image(s) over 2 MB: {}", oversized.len(), oversized.join(", ")),
                ToastKind::Error,
            );
        }
        if !empty.is_empty() {
            log::warn!("Skipped {} empty carousel upload(s): {}", empty.len(), empty.join(", "));
            ctx.notifier.show_toast(
                &format!("Skipped {} empty file(s): {}", empty.len(), empty.join(", ")),
                ToastKind::Error,
            );
        }
        if added == 0 {
            return 0;
        }

        ctx.prefs.set_string_list(PrefKey::CarouselImages, &self.carousel.images);
        if !self.carousel.is_running() {
            self.restart_timer(ctx);
        }
        if self.shown.is_none() {
            self.refresh_display(ctx, SELECT_TRANSITION);
        }
        log::info!("Added {} carousel image(s), {} total", added, self.carousel.images.len());
        ctx.bus.raise(Signal::BackgroundChanged);
        added
    }

    /// Empty the rotation set, reset the index and stop rotating
    pub fn clear_images(&mut self, ctx: &mut EffectContext<'_>) {
        self.carousel.images.clear();
        self.carousel.current_index = 0;
        // Written rather than removed so the bundled set does not come back
        ctx.prefs.set_string_list(PrefKey::CarouselImages, &[]);
        ctx.prefs.set_index(PrefKey::CarouselCurrentIndex, 0);
        self.stop_timer(ctx);
        self.refresh_display(ctx, SELECT_TRANSITION);
        log::info!("Carousel images cleared");
        ctx.bus.raise(Signal::BackgroundChanged);
    }

    /// Promote one carousel image to the custom background
    pub fn select_image(&mut self, ctx: &mut EffectContext<'_>, index: usize) -> Result<(), EngineError> {
        let Some(source) = self.carousel.images.get(index).cloned() else {
            return Err(EngineError::CarouselIndexOutOfRange {
                index,
                len: self.carousel.images.len(),
            });
        };
        self.carousel.current_index = index;
        ctx.prefs.set_index(PrefKey::CarouselCurrentIndex, index);
        self.apply_custom(ctx, source);
        Ok(())
    }

    /// Rotation timer fired
    pub fn on_tick(&mut self, ctx: &mut EffectContext<'_>) {
        if !self.carousel.is_active() {
            return;
        }
        let next = (self.carousel.current_index + 1) % self.carousel.images.len();
        self.carousel.current_index = next;
        ctx.prefs.set_index(PrefKey::CarouselCurrentIndex, next);
        log::debug!("Carousel advanced to {}", next);

        let source = self.carousel.images[next].clone();
        self.begin_transition(ctx, Some(source), ROTATE_TRANSITION);
    }

    /// Transition delay elapsed
    pub fn on_swap(&mut self, ctx: &mut EffectContext<'_>, source: Option<String>) {
        self.pending_swap = None;
        ctx.surface.set_background_image(source.as_deref());
        ctx.surface.set_background_transition(false);
        self.shown = source;
        self.apply_backdrop_blur(ctx.surface);
    }

    // === Filters ===

    pub fn set_blur(&mut self, ctx: &mut EffectContext<'_>, px: u32) -> Result<(), EngineError> {
        let px = check_range(PrefKey::BlurAmount, px, BLUR_AMOUNT)?;
        ctx.prefs.set_number(PrefKey::BlurAmount, px);
        self.filters.blur = px;
        ctx.surface.set_blur_amount(px);
        self.apply_module_blur(ctx.surface);
        self.apply_backdrop_blur(ctx.surface);
        Ok(())
    }

    pub fn set_saturation(&mut self, ctx: &mut EffectContext<'_>, percent: u32) -> Result<(), EngineError> {
        let percent = check_range(PrefKey::SaturationAmount, percent, SATURATION_AMOUNT)?;
        ctx.prefs.set_number(PrefKey::SaturationAmount, percent);
        self.filters.saturation = percent;
        ctx.surface.set_background_filter(self.filters.saturation, self.filters.brightness);
        Ok(())
    }

    pub fn set_brightness(&mut self, ctx: &mut EffectContext<'_>, percent: u32) -> Result<(), EngineError> {
        let percent = check_range(PrefKey::BrightnessAmount, percent, BRIGHTNESS_AMOUNT)?;
        ctx.prefs.set_number(PrefKey::BrightnessAmount, percent);
        self.filters.brightness = percent;
        ctx.surface.set_background_filter(self.filters.saturation, self.filters.brightness);
        Ok(())
    }

    pub fn set_module_blur_enabled(&mut self, ctx: &mut EffectContext<'_>, enabled: bool) {
        ctx.prefs.set_flag(PrefKey::ModuleBlurEnabled, enabled);
        self.filters.module_blur = enabled;
        self.apply_module_blur(ctx.surface);
    }

    pub fn set_background_blur_enabled(&mut self, ctx: &mut EffectContext<'_>, enabled: bool) {
        ctx.prefs.set_flag(PrefKey::BackgroundBlurEnabled, enabled);
        self.filters.background_blur = enabled;
        self.apply_backdrop_blur(ctx.surface);
    }

    fn apply_filters(&self, surface: &mut dyn Surface) {
        surface.set_blur_amount(self.filters.blur);
        surface.set_background_filter(self.filters.saturation, self.filters.brightness);
        self.apply_module_blur(surface);
        self.apply_backdrop_blur(surface);
    }

    fn apply_module_blur(&self, surface: &mut dyn Surface) {
        surface.set_module_blur(self.filters.module_blur.then_some(self.filters.blur));
    }

    /// Foreground blur only makes sense over an image
    fn apply_backdrop_blur(&self, surface: &mut dyn Surface) {
        let px = (self.filters.background_blur && self.shown.is_some()).then_some(self.filters.blur);
        surface.set_content_backdrop_blur(px);
    }

    // === Internals ===

    /// What the background layer should show for the current state
    fn desired(&self, prefs: &Preferences) -> Option<String> {
        custom_background(prefs).or_else(|| {
            self.carousel
                .is_active()
                .then(|| self.carousel.current_image().map(str::to_string))
                .flatten()
        })
    }

    /// Drop any in-flight swap, then fade to the desired image if it differs
    fn refresh_display(&mut self, ctx: &mut EffectContext<'_>, delay: Duration) {
        if let Some(swap) = self.pending_swap.take() {
            ctx.scheduler.cancel(swap);
            ctx.surface.set_background_transition(false);
        }
        self.custom = custom_background(ctx.prefs);
        let desired = self.desired(ctx.prefs);
        if desired != self.shown {
            self.begin_transition(ctx, desired, delay);
        }
    }

    fn begin_transition(&mut self, ctx: &mut EffectContext<'_>, source: Option<String>, delay: Duration) {
        if let Some(swap) = self.pending_swap.take() {
            ctx.scheduler.cancel(swap);
        }
        ctx.surface.set_background_transition(true);
        self.pending_swap = Some(ctx.scheduler.schedule_once(delay, Task::SwapBackground(source)));
    }

    fn restart_timer(&mut self, ctx: &mut EffectContext<'_>) {
        self.stop_timer(ctx);
        if self.carousel.is_active() {
            self.carousel.timer = Some(ctx.scheduler.schedule_repeating(self.carousel.interval, Task::CarouselTick));
            log::debug!("Carousel timer started, every {:?}", self.carousel.interval);
        }
    }

    fn stop_timer(&mut self, ctx: &mut EffectContext<'_>) {
        if let Some(timer) = self.carousel.timer.take() {
            ctx.scheduler.cancel(timer);
            log::debug!("Carousel timer stopped");
        }
    }
}
