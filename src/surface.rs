//! Headless surface that logs what a real UI would render

use std::collections::HashMap;

use backdrop_engine::{
    AnimationDescriptor, Notifier, ParticleHandle, ParticleParams, Surface, ToastKind, ToggleState,
};

/// Keeps root attributes so diffing works, logs everything else
#[derive(Debug, Default)]
pub struct LogSurface {
    attributes: HashMap<String, String>,
    next_particle: u32,
}

impl LogSurface {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Surface for LogSurface {
    fn root_attribute(&self, name: &str) -> Option<String> {
        self.attributes.get(name).cloned()
    }

    fn set_root_attribute(&mut self, name: &str, value: &str) {
        log::info!("[{}={}]", name, value);
        self.attributes.insert(name.to_string(), value.to_string());
    }

    fn set_glass_toggle(&mut self, state: ToggleState) {
        log::info!(
            "glass toggle: {} ({})",
            if state.checked { "on" } else { "off" },
            if state.enabled { "enabled" } else { "locked" }
        );
    }

    fn set_background_image(&mut self, source: Option<&str>) {
        match source {
            // Data URIs are long; the prefix is enough to tell them apart
            Some(src) if src.len() > 64 => {
                let prefix: String = src.chars().take(48).collect();
                log::info!("background: {}... ({} chars)", prefix, src.len())
            }
            Some(src) => log::info!("background: {}", src),
            None => log::info!("background: none"),
        }
    }

    fn set_background_transition(&mut self, active: bool) {
        log::debug!("background transition {}", if active { "on" } else { "off" });
    }

    fn set_background_filter(&mut self, saturation: u32, brightness: u32) {
        log::debug!("background filter: saturate({}%) brightness({}%)", saturation, brightness);
    }

    fn set_blur_amount(&mut self, px: u32) {
        log::debug!("blur amount: {}px", px);
    }

    fn set_content_backdrop_blur(&mut self, px: Option<u32>) {
        log::debug!("content backdrop blur: {:?}", px);
    }

    fn set_module_blur(&mut self, px: Option<u32>) {
        log::debug!("module blur: {:?}", px);
    }

    fn create_particle(&mut self) -> ParticleHandle {
        let handle = ParticleHandle(self.next_particle);
        self.next_particle += 1;
        handle
    }

    fn show_particle(&mut self, handle: ParticleHandle, params: &ParticleParams) {
        log::trace!(
            "particle {} at {:.1}vw, {:.1}px, drift {:.0}px over {:?}",
            handle.0,
            params.lane_vw,
            params.size_px,
            params.drift_px,
            params.duration
        );
    }

    fn hide_particle(&mut self, handle: ParticleHandle) {
        log::trace!("particle {} hidden", handle.0);
    }

    fn cancel_animation(&mut self, _handle: ParticleHandle) {}

    fn start_animation(&mut self, handle: ParticleHandle, animation: &AnimationDescriptor) {
        log::trace!("particle {} animating '{}'", handle.0, animation.name);
    }
}

#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn show_toast(&mut self, message: &str, kind: ToastKind) {
        match kind {
            ToastKind::Success => log::info!("toast: {}", message),
            ToastKind::Error => log::warn!("toast: {}", message),
        }
    }
}
