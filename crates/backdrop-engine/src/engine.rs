//! Engine facade
//!
//! Owns the preference view, the timer queue, the change bus and both effect
//! producers, and applies resolver output to the surface. All mutation runs
//! on the caller's thread; time moves only through [`Engine::advance`].

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use backdrop_config::{Config, PrefKey, Preferences, StoreError};
use thiserror::Error;

use crate::background::{BackgroundManager, CarouselState, FilterSettings, Upload};
use crate::bus::{ChangeBus, Signal, SubscriptionId};
use crate::particles::{PREWARM, ParticlePool};
use crate::resolver::{ResolverInputs, resolve};
use crate::scheduler::Scheduler;
use crate::traits::{DerivedVisualState, Notifier, ParticleHandle, Surface, Theme, ToggleState, attributes};

/// Work the engine schedules for itself
#[derive(Debug, Clone, PartialEq)]
pub enum Task {
    /// Replace the background image once the fade delay elapsed
    SwapBackground(Option<String>),
    CarouselTick,
    ParticleTick,
    /// Fallback completion for a particle whose surface never reported back
    ParticleFinished(ParticleHandle),
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Upload '{name}' is {size} bytes, over the {limit} byte limit")]
    UploadTooLarge { name: String, size: u64, limit: u64 },

    #[error("Upload '{0}' is empty")]
    EmptyUpload(String),

    #[error("Carousel index {index} out of range for {len} image(s)")]
    CarouselIndexOutOfRange { index: usize, len: usize },

    #[error("'{key}' must be between {min} and {max}, got {value}")]
    OutOfRange { key: PrefKey, value: u32, min: u32, max: u32 },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Borrowed collaborators handed to the effect producers
pub struct EffectContext<'a> {
    pub prefs: &'a mut Preferences,
    pub surface: &'a mut dyn Surface,
    pub notifier: &'a mut dyn Notifier,
    pub scheduler: &'a mut Scheduler<Task>,
    pub bus: &'a mut ChangeBus,
}

/// Construction-time settings
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub particle_seed: u64,
    /// Image applied by "restore default background"
    pub default_image: String,
}

impl EngineOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            particle_seed: config.particles.seed.unwrap_or_else(time_seed),
            default_image: config.background.default_image.clone(),
        }
    }
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

fn time_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

/// State not tied to a particular surface
struct Core {
    prefs: Preferences,
    scheduler: Scheduler<Task>,
    bus: ChangeBus,
}

impl Core {
    fn ctx<'a>(&'a mut self, surface: &'a mut dyn Surface, notifier: &'a mut dyn Notifier) -> EffectContext<'a> {
        EffectContext {
            prefs: &mut self.prefs,
            surface,
            notifier,
            scheduler: &mut self.scheduler,
            bus: &mut self.bus,
        }
    }
}

/// Preference and visual-effects engine driving one surface
pub struct Engine<S: Surface, N: Notifier> {
    surface: S,
    notifier: N,
    core: Core,
    background: BackgroundManager,
    particles: ParticlePool,
    resolver_subscription: Option<SubscriptionId>,
    last_toggle: Option<ToggleState>,
    derived: Option<DerivedVisualState>,
}

impl<S: Surface, N: Notifier> Engine<S, N> {
    pub fn new(surface: S, notifier: N, prefs: Preferences, options: EngineOptions) -> Self {
        Self {
            surface,
            notifier,
            core: Core {
                prefs,
                scheduler: Scheduler::new(),
                bus: ChangeBus::new(),
            },
            background: BackgroundManager::new(options.default_image),
            particles: ParticlePool::new(options.particle_seed),
            resolver_subscription: None,
            last_toggle: None,
            derived: None,
        }
    }

    /// Apply persisted state to the surface and start timers
    pub fn initialize(&mut self) {
        if self.resolver_subscription.is_none() {
            self.resolver_subscription = Some(
                self.core
                    .bus
                    .subscribe(&[Signal::ThemeChanged, Signal::BackgroundChanged]),
            );
        }

        self.apply_theme(Theme::from_dark(self.core.prefs.is_dark_theme()));

        let mut ctx = self.core.ctx(&mut self.surface, &mut self.notifier);
        self.background.restore(&mut ctx);
        self.particles.prewarm(ctx.surface, PREWARM);

        self.sync_particles();
        self.run_resolver();
        self.dispatch();
        log::info!("Engine initialized");
    }

    /// Stop every timer and recycle all particles
    pub fn teardown(&mut self) {
        let mut ctx = self.core.ctx(&mut self.surface, &mut self.notifier);
        self.background.stop(&mut ctx);
        self.particles.stop(ctx.surface, ctx.scheduler);
        self.core.scheduler.cancel_all();
        if let Some(id) = self.resolver_subscription.take() {
            self.core.bus.unsubscribe(id);
        }
        log::info!("Engine torn down");
    }

    /// Run every task due within `dt`, in deadline order
    pub fn advance(&mut self, dt: Duration) {
        let until = self.core.scheduler.now() + dt;
        while let Some((_, task)) = self.core.scheduler.pop_due(until) {
            self.run_task(task);
            self.dispatch();
        }
        self.core.scheduler.advance_to(until);
    }

    pub fn now(&self) -> Duration {
        self.core.scheduler.now()
    }

    /// Time of the next scheduled task
    pub fn next_deadline(&self) -> Option<Duration> {
        self.core.scheduler.next_deadline()
    }

    fn run_task(&mut self, task: Task) {
        let mut ctx = self.core.ctx(&mut self.surface, &mut self.notifier);
        match task {
            Task::SwapBackground(source) => self.background.on_swap(&mut ctx, source),
            Task::CarouselTick => self.background.on_tick(&mut ctx),
            Task::ParticleTick => {
                self.particles.spawn(ctx.surface, ctx.scheduler);
            }
            Task::ParticleFinished(handle) => {
                self.particles.finish(handle, ctx.surface, ctx.scheduler);
            }
        }
    }

    // === Theme and glass ===

    pub fn set_dark_mode(&mut self, dark: bool) {
        log::info!("Theme set to {}", Theme::from_dark(dark));
        self.core.prefs.set_flag(PrefKey::ThemeDark, dark);
        self.apply_theme(Theme::from_dark(dark));
        self.dispatch();
    }

    pub fn toggle_dark_mode(&mut self) -> Theme {
        let dark = !self.current_theme().is_dark();
        self.set_dark_mode(dark);
        Theme::from_dark(dark)
    }

    /// Manual glass switch. Returns false when a background locks the control.
    pub fn set_manual_glass(&mut self, enabled: bool) -> bool {
        let inputs = self.resolver_inputs();
        if inputs.background_active() {
            log::debug!("Manual glass toggle ignored while a background is active");
            self.run_resolver();
            return false;
        }
        self.core.prefs.set_flag(PrefKey::GlassManualEnabled, enabled);
        self.run_resolver();
        true
    }

    /// Report that a root attribute was changed outside the engine
    pub fn notify_attribute_mutation(&mut self, name: &str) {
        if name == attributes::THEME {
            self.core.bus.raise(Signal::ThemeChanged);
            self.dispatch();
        }
    }

    // === Background and carousel ===

    pub fn upload_background(&mut self, upload: &Upload) -> Result<(), EngineError> {
        let mut ctx = self.core.ctx(&mut self.surface, &mut self.notifier);
        let result = self.background.upload(&mut ctx, upload);
        self.dispatch();
        result
    }

    /// Use an existing image source, such as a library entry
    pub fn select_background(&mut self, source: &str) {
        let mut ctx = self.core.ctx(&mut self.surface, &mut self.notifier);
        self.background.apply_custom(&mut ctx, source.to_string());
        self.dispatch();
    }

    pub fn remove_background(&mut self) {
        let mut ctx = self.core.ctx(&mut self.surface, &mut self.notifier);
        self.background.remove(&mut ctx);
        self.dispatch();
    }

    pub fn restore_default_background(&mut self) {
        let mut ctx = self.core.ctx(&mut self.surface, &mut self.notifier);
        self.background.restore_default(&mut ctx);
        self.dispatch();
    }

    pub fn set_carousel_enabled(&mut self, enabled: bool) {
        let mut ctx = self.core.ctx(&mut self.surface, &mut self.notifier);
        self.background.set_carousel_enabled(&mut ctx, enabled);
        self.dispatch();
    }

    pub fn set_carousel_interval(&mut self, seconds: u32) -> Result<(), EngineError> {
        let mut ctx = self.core.ctx(&mut self.surface, &mut self.notifier);
        self.background.set_interval(&mut ctx, seconds)
    }

    pub fn add_carousel_images(&mut self, uploads: &[Upload]) -> usize {
        let mut ctx = self.core.ctx(&mut self.surface, &mut self.notifier);
        let added = self.background.add_images(&mut ctx, uploads);
        self.dispatch();
        added
    }

    pub fn clear_carousel_images(&mut self) {
        let mut ctx = self.core.ctx(&mut self.surface, &mut self.notifier);
        self.background.clear_images(&mut ctx);
        self.dispatch();
    }

    pub fn select_carousel_image(&mut self, index: usize) -> Result<(), EngineError> {
        let mut ctx = self.core.ctx(&mut self.surface, &mut self.notifier);
        let result = self.background.select_image(&mut ctx, index);
        self.dispatch();
        result
    }

    // === Filters and toggles ===

    pub fn set_blur_amount(&mut self, px: u32) -> Result<(), EngineError> {
        let mut ctx = self.core.ctx(&mut self.surface, &mut self.notifier);
        self.background.set_blur(&mut ctx, px)
    }

    pub fn set_saturation(&mut self, percent: u32) -> Result<(), EngineError> {
        let mut ctx = self.core.ctx(&mut self.surface, &mut self.notifier);
        self.background.set_saturation(&mut ctx, percent)
    }

    pub fn set_brightness(&mut self, percent: u32) -> Result<(), EngineError> {
        let mut ctx = self.core.ctx(&mut self.surface, &mut self.notifier);
        self.background.set_brightness(&mut ctx, percent)
    }

    pub fn set_module_blur_enabled(&mut self, enabled: bool) {
        let mut ctx = self.core.ctx(&mut self.surface, &mut self.notifier);
        self.background.set_module_blur_enabled(&mut ctx, enabled);
    }

    pub fn set_background_blur_enabled(&mut self, enabled: bool) {
        let mut ctx = self.core.ctx(&mut self.surface, &mut self.notifier);
        self.background.set_background_blur_enabled(&mut ctx, enabled);
    }

    pub fn set_size_limit_disabled(&mut self, disabled: bool) {
        self.core.prefs.set_flag(PrefKey::SizeLimitDisabled, disabled);
    }

    // === Particles ===

    pub fn set_particles_enabled(&mut self, enabled: bool) {
        self.core.prefs.set_flag(PrefKey::ParticleEffectEnabled, enabled);
        self.sync_particles();
    }

    /// The surface finished a particle's animation
    pub fn on_animation_end(&mut self, handle: ParticleHandle) {
        self.particles
            .finish(handle, &mut self.surface, &mut self.core.scheduler);
    }

    fn sync_particles(&mut self) {
        let enabled = self.core.prefs.flag(PrefKey::ParticleEffectEnabled);
        if enabled {
            self.particles.start(&mut self.core.scheduler);
        } else if self.particles.is_enabled() || self.particles.active_count() > 0 {
            self.particles.stop(&mut self.surface, &mut self.core.scheduler);
        }
    }

    // === Whole-store operations ===

    /// Delete every preference and fall back to default visual state
    pub fn reset(&mut self) -> Result<(), EngineError> {
        self.core.prefs.clear()?;
        log::info!("All preferences cleared");
        self.reapply();
        Ok(())
    }

    /// Re-read the store after it was changed from outside. Returns false,
    /// leaving everything running untouched, when the stored values are
    /// the ones this engine wrote.
    pub fn reload_preferences(&mut self) -> Result<bool, EngineError> {
        if !self.core.prefs.reload()? {
            log::debug!("Preference file unchanged, nothing to reload");
            return Ok(false);
        }
        log::info!("Preferences reloaded");
        self.reapply();
        Ok(true)
    }

    fn reapply(&mut self) {
        self.apply_theme(Theme::from_dark(self.core.prefs.is_dark_theme()));
        let mut ctx = self.core.ctx(&mut self.surface, &mut self.notifier);
        self.background.reload(&mut ctx);
        self.sync_particles();
        self.run_resolver();
        self.dispatch();
    }

    // === Accessors ===

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    pub fn preferences(&self) -> &Preferences {
        &self.core.prefs
    }

    pub fn carousel(&self) -> &CarouselState {
        self.background.carousel()
    }

    pub fn filters(&self) -> &FilterSettings {
        self.background.filters()
    }

    pub fn particles(&self) -> &ParticlePool {
        &self.particles
    }

    /// Result of the last resolver pass
    pub fn derived_state(&self) -> Option<DerivedVisualState> {
        self.derived
    }

    // === Resolution ===

    /// Live theme: the root attribute if set, else the stored preference
    fn current_theme(&self) -> Theme {
        match self.surface.root_attribute(attributes::THEME).as_deref() {
            Some("dark") => Theme::Dark,
            Some(_) => Theme::Light,
            None => Theme::from_dark(self.core.prefs.is_dark_theme()),
        }
    }

    fn resolver_inputs(&self) -> ResolverInputs {
        let mut inputs =
            ResolverInputs::from_preferences(&self.core.prefs, self.background.carousel().images().len());
        inputs.is_dark_theme = self.current_theme().is_dark();
        inputs
    }

    fn apply_theme(&mut self, theme: Theme) {
        self.write_root_attribute(attributes::THEME, theme.as_str());
    }

    /// Write an attribute only when it changes; a theme change is observed
    /// like any other mutation
    fn write_root_attribute(&mut self, name: &str, value: &str) {
        if self.surface.root_attribute(name).as_deref() == Some(value) {
            return;
        }
        self.surface.set_root_attribute(name, value);
        if name == attributes::THEME {
            self.core.bus.raise(Signal::ThemeChanged);
        }
    }

    fn run_resolver(&mut self) {
        let resolution = resolve(&self.resolver_inputs());
        let state = resolution.state;

        self.write_root_attribute(attributes::THEME, state.theme.as_str());
        self.write_root_attribute(attributes::GLASS_MODE, state.glass_mode.as_str());
        self.write_root_attribute(attributes::IMAGE_MODE, state.image_mode.as_str());

        if self.last_toggle != Some(resolution.manual_glass) {
            self.surface.set_glass_toggle(resolution.manual_glass);
            self.last_toggle = Some(resolution.manual_glass);
        }
        if self.derived != Some(state) {
            log::debug!(
                "Resolved theme={} glass={} image={}",
                state.theme,
                state.glass_mode,
                state.image_mode
            );
        }
        self.derived = Some(state);
    }

    /// Deliver queued signals; one resolver pass per delivery
    fn dispatch(&mut self) {
        while self.core.bus.has_pending() {
            for delivery in self.core.bus.drain() {
                if Some(delivery.subscriber) == self.resolver_subscription {
                    self.run_resolver();
                }
            }
        }
    }
}
