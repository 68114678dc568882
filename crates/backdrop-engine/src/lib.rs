//! Backdrop Engine - appearance state and visual effects
//!
//! This crate derives the visual modes of an application shell from stored
//! preferences and keeps them applied to a rendering surface:
//! - Resolver: theme, glass mode and image mode from flags and background state
//! - Change bus: re-runs the resolver when the theme or background changes
//! - Background manager: custom image, carousel rotation and fade transitions
//! - Particle pool: a capped, recycled decorative overlay
//!
//! Nothing here draws. A [`Surface`] receives attribute and element updates,
//! and a [`Scheduler`] stands in for the host's timers so the whole engine
//! can be driven deterministically.

pub mod background;
pub mod bus;
pub mod engine;
pub mod mock;
pub mod particles;
pub mod resolver;
pub mod scheduler;
pub mod traits;

pub use background::{
    BackgroundManager, CarouselState, FilterSettings, ROTATE_TRANSITION, SELECT_TRANSITION,
    UPLOAD_LIMIT_BYTES, Upload,
};
pub use bus::{ChangeBus, Delivery, Signal, SubscriptionId};
pub use engine::{EffectContext, Engine, EngineError, EngineOptions, Task};
pub use mock::{MockNotifier, MockSurface, SurfaceCall};
pub use particles::{EntryState, MAX_ACTIVE, PREWARM, ParticlePool, SPAWN_INTERVAL};
pub use resolver::{Resolution, ResolverInputs, resolve};
pub use scheduler::{Scheduler, TimerId};
pub use traits::*;
