//! Mock surface for testing
//!
//! Provides a [`MockSurface`] that keeps the state a real surface would show
//! and records every call for test assertions, plus a [`MockNotifier`] that
//! collects toasts.

use std::collections::BTreeMap;

use crate::traits::*;

/// Record of a surface call for test inspection
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceCall {
    SetAttribute { name: String, value: String },
    GlassToggle(ToggleState),
    BackgroundImage(Option<String>),
    BackgroundTransition(bool),
    BackgroundFilter { saturation: u32, brightness: u32 },
    BlurAmount(u32),
    ContentBackdropBlur(Option<u32>),
    ModuleBlur(Option<u32>),
    CreateParticle(ParticleHandle),
    ShowParticle(ParticleHandle),
    HideParticle(ParticleHandle),
    CancelAnimation(ParticleHandle),
    StartAnimation(ParticleHandle, &'static str),
}

/// What the mock knows about one particle element
#[derive(Debug, Clone, Default)]
pub struct MockParticle {
    pub visible: bool,
    pub params: Option<ParticleParams>,
    /// Name of the running animation, if any
    pub animation: Option<&'static str>,
    /// How many times an animation was started on this element
    pub starts: usize,
}

/// A surface that records calls instead of drawing
#[derive(Debug, Default)]
pub struct MockSurface {
    /// All calls made to this surface
    pub calls: Vec<SurfaceCall>,
    attributes: BTreeMap<String, String>,
    glass_toggle: Option<ToggleState>,
    background: Option<String>,
    transition: bool,
    filter: Option<(u32, u32)>,
    blur_amount: Option<u32>,
    content_blur: Option<u32>,
    module_blur: Option<u32>,
    particles: BTreeMap<ParticleHandle, MockParticle>,
    next_handle: u32,
}

impl MockSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all recorded calls, keeping the current state
    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    pub fn call_count(&self) -> usize {
        self.calls.len()
    }

    // === Assertion helpers ===

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Number of recorded writes to one attribute
    pub fn attribute_writes(&self, name: &str) -> usize {
        self.calls
            .iter()
            .filter(|call| matches!(call, SurfaceCall::SetAttribute { name: n, .. } if n == name))
            .count()
    }

    pub fn glass_toggle(&self) -> Option<ToggleState> {
        self.glass_toggle
    }

    pub fn background(&self) -> Option<&str> {
        self.background.as_deref()
    }

    pub fn in_transition(&self) -> bool {
        self.transition
    }

    pub fn background_filter(&self) -> Option<(u32, u32)> {
        self.filter
    }

    pub fn blur_amount(&self) -> Option<u32> {
        self.blur_amount
    }

    pub fn content_backdrop_blur(&self) -> Option<u32> {
        self.content_blur
    }

    pub fn module_blur(&self) -> Option<u32> {
        self.module_blur
    }

    pub fn particle(&self, handle: ParticleHandle) -> Option<&MockParticle> {
        self.particles.get(&handle)
    }

    /// Number of particle elements ever created
    pub fn particle_elements(&self) -> usize {
        self.particles.len()
    }

    pub fn visible_particles(&self) -> usize {
        self.particles.values().filter(|p| p.visible).count()
    }

    pub fn animating_particles(&self) -> usize {
        self.particles.values().filter(|p| p.animation.is_some()).count()
    }

    /// Background images shown, in order
    pub fn background_history(&self) -> Vec<Option<String>> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                SurfaceCall::BackgroundImage(source) => Some(source.clone()),
                _ => None,
            })
            .collect()
    }
}

impl Surface for MockSurface {
    fn root_attribute(&self, name: &str) -> Option<String> {
        self.attributes.get(name).cloned()
    }

    fn set_root_attribute(&mut self, name: &str, value: &str) {
        self.attributes.insert(name.to_string(), value.to_string());
        self.calls.push(SurfaceCall::SetAttribute {
            name: name.to_string(),
            value: value.to_string(),
        });
    }

    fn set_glass_toggle(&mut self, state: ToggleState) {
        self.glass_toggle = Some(state);
        self.calls.push(SurfaceCall::GlassToggle(state));
    }

    fn set_background_image(&mut self, source: Option<&str>) {
        self.background = source.map(str::to_string);
        self.calls.push(SurfaceCall::BackgroundImage(self.background.clone()));
    }

    fn set_background_transition(&mut self, active: bool) {
        self.transition = active;
        self.calls.push(SurfaceCall::BackgroundTransition(active));
    }

    fn set_background_filter(&mut self, saturation: u32, brightness: u32) {
        self.filter = Some((saturation, brightness));
        self.calls.push(SurfaceCall::BackgroundFilter { saturation, brightness });
    }

    fn set_blur_amount(&mut self, px: u32) {
        self.blur_amount = Some(px);
        self.calls.push(SurfaceCall::BlurAmount(px));
    }

    fn set_content_backdrop_blur(&mut self, px: Option<u32>) {
        self.content_blur = px;
        self.calls.push(SurfaceCall::ContentBackdropBlur(px));
    }

    fn set_module_blur(&mut self, px: Option<u32>) {
        self.module_blur = px;
        self.calls.push(SurfaceCall::ModuleBlur(px));
    }

    fn create_particle(&mut self) -> ParticleHandle {
        let handle = ParticleHandle(self.next_handle);
        self.next_handle += 1;
        self.particles.insert(handle, MockParticle::default());
        self.calls.push(SurfaceCall::CreateParticle(handle));
        handle
    }

    fn show_particle(&mut self, handle: ParticleHandle, params: &ParticleParams) {
        let particle = self.particles.entry(handle).or_default();
        particle.visible = true;
        particle.params = Some(*params);
        self.calls.push(SurfaceCall::ShowParticle(handle));
    }

    fn hide_particle(&mut self, handle: ParticleHandle) {
        if let Some(particle) = self.particles.get_mut(&handle) {
            particle.visible = false;
        }
        self.calls.push(SurfaceCall::HideParticle(handle));
    }

    fn cancel_animation(&mut self, handle: ParticleHandle) {
        if let Some(particle) = self.particles.get_mut(&handle) {
            particle.animation = None;
        }
        self.calls.push(SurfaceCall::CancelAnimation(handle));
    }

    fn start_animation(&mut self, handle: ParticleHandle, animation: &AnimationDescriptor) {
        let particle = self.particles.entry(handle).or_default();
        particle.animation = Some(animation.name);
        particle.starts += 1;
        self.calls.push(SurfaceCall::StartAnimation(handle, animation.name));
    }
}

/// Collects toasts instead of displaying them
#[derive(Debug, Default)]
pub struct MockNotifier {
    pub toasts: Vec<(String, ToastKind)>,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last(&self) -> Option<&(String, ToastKind)> {
        self.toasts.last()
    }

    pub fn error_count(&self) -> usize {
        self.toasts.iter().filter(|(_, kind)| *kind == ToastKind::Error).count()
    }
}

impl Notifier for MockNotifier {
    fn show_toast(&mut self, message: &str, kind: ToastKind) {
        self.toasts.push((message.to_string(), kind));
    }
}
