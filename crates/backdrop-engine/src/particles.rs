//! Particle overlay - falling decorative particles from a fixed pool
//!
//! Elements are created once and recycled. Each entry is either pooled
//! (hidden, idle) or active (visible, animating). A ticker spawns one
//! particle per period while the effect is enabled; an entry goes back to
//! the pool when its animation completes, or immediately when the effect is
//! stopped.
//!
//! ## Tuning
//!
//! - at most 40 particles falling at once
//! - 24 elements created up front
//! - one spawn attempt every 180 ms
//! - size 4-10 px, lane 0-100 vw, drift -120..120 px, fall 6-18 s

use std::time::Duration;

use crate::engine::Task;
use crate::scheduler::{Scheduler, TimerId};
use crate::traits::{AnimationDescriptor, Easing, FillMode, ParticleHandle, ParticleParams, Surface};

/// Maximum simultaneously active particles
pub const MAX_ACTIVE: usize = 40;
/// Elements created at initialization
pub const PREWARM: usize = 24;
/// Spawn ticker period
pub const SPAWN_INTERVAL: Duration = Duration::from_millis(180);
/// Animation applied to every spawned particle
pub const FALL_ANIMATION: &str = "fall";

const SIZE_PX: (f64, f64) = (4.0, 10.0);
const LANE_VW: (f64, f64) = (0.0, 100.0);
const DRIFT_PX: (f64, f64) = (-120.0, 120.0);
const DURATION_SECS: (f64, f64) = (6.0, 18.0);

/// Membership of a pool entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    Pooled,
    Active,
}

#[derive(Debug)]
struct Entry {
    handle: ParticleHandle,
    state: EntryState,
    /// Fallback completion timer while active
    finish_timer: Option<TimerId>,
}

/// Hash-based pseudo-random sequence, reproducible from its seed
#[derive(Debug, Clone)]
struct ParticleRng {
    seed: u64,
    counter: u64,
}

impl ParticleRng {
    fn new(seed: u64) -> Self {
        Self { seed, counter: 0 }
    }

    /// Uniform in [0, 1)
    fn next_unit(&mut self) -> f64 {
        let mut x = self.counter.wrapping_add(self.seed);
        self.counter = self.counter.wrapping_add(0x9e3779b97f4a7c15);
        x ^= x >> 33;
        x = x.wrapping_mul(0xff51afd7ed558ccd);
        x ^= x >> 33;
        x = x.wrapping_mul(0xc4ceb9fe1a85ec53);
        x ^= x >> 33;
        (x >> 11) as f64 / (1u64 << 53) as f64
    }

    fn in_range(&mut self, (min, max): (f64, f64)) -> f64 {
        min + self.next_unit() * (max - min)
    }
}

/// Fixed-capacity pool of particle elements
#[derive(Debug)]
pub struct ParticlePool {
    entries: Vec<Entry>,
    /// Indices of pooled entries; last in, first out
    idle: Vec<usize>,
    active: usize,
    capacity: usize,
    enabled: bool,
    ticker: Option<TimerId>,
    rng: ParticleRng,
}

impl ParticlePool {
    pub fn new(seed: u64) -> Self {
        Self::with_capacity(MAX_ACTIVE, seed)
    }

    pub fn with_capacity(capacity: usize, seed: u64) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            idle: Vec::with_capacity(capacity),
            active: 0,
            capacity,
            enabled: false,
            ticker: None,
            rng: ParticleRng::new(seed),
        }
    }

    /// Create up to `count` hidden elements ahead of time
    pub fn prewarm(&mut self, surface: &mut dyn Surface, count: usize) {
        let room = self.capacity.saturating_sub(self.entries.len());
        for _ in 0..count.min(room) {
            self.create_entry(surface);
        }
        log::debug!("Particle pool prewarmed: {} elements", self.entries.len());
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_running(&self) -> bool {
        self.ticker.is_some()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Elements ever created
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn active_count(&self) -> usize {
        self.active
    }

    pub fn pooled_count(&self) -> usize {
        self.idle.len()
    }

    pub fn state_of(&self, handle: ParticleHandle) -> Option<EntryState> {
        self.index_of(handle).map(|i| self.entries[i].state)
    }

    /// Enable spawning and arm the ticker
    pub fn start(&mut self, scheduler: &mut Scheduler<Task>) {
        self.enabled = true;
        if self.ticker.is_none() {
            self.ticker = Some(scheduler.schedule_repeating(SPAWN_INTERVAL, Task::ParticleTick));
            log::info!("Particle effect started");
        }
    }

    /// Disable spawning, disarm the ticker and recycle every active entry
    /// without letting its animation finish
    pub fn stop(&mut self, surface: &mut dyn Surface, scheduler: &mut Scheduler<Task>) {
        self.enabled = false;
        if let Some(ticker) = self.ticker.take() {
            scheduler.cancel(ticker);
        }
        let mut recycled = 0;
        for index in 0..self.entries.len() {
            if self.entries[index].state == EntryState::Active {
                self.recycle(index, surface, scheduler);
                recycled += 1;
            }
        }
        log::info!("Particle effect stopped, recycled {} particles", recycled);
    }

    /// Activate one pooled entry with fresh parameters. No-op when disabled
    /// or at the concurrency cap.
    pub fn spawn(
        &mut self,
        surface: &mut dyn Surface,
        scheduler: &mut Scheduler<Task>,
    ) -> Option<ParticleHandle> {
        if !self.enabled || self.active >= self.capacity {
            return None;
        }
        let index = match self.idle.pop() {
            Some(index) => index,
            None if self.entries.len() < self.capacity => {
                self.create_entry(surface);
                self.idle.pop()?
            }
            None => return None,
        };

        let params = self.draw_params();
        let animation = AnimationDescriptor {
            name: FALL_ANIMATION,
            duration: params.duration,
            easing: Easing::Linear,
            fill: FillMode::Forwards,
        };

        let entry = &mut self.entries[index];
        surface.show_particle(entry.handle, &params);
        // A finished animation with the same name does not replay on its own
        surface.cancel_animation(entry.handle);
        surface.start_animation(entry.handle, &animation);

        entry.state = EntryState::Active;
        entry.finish_timer =
            Some(scheduler.schedule_once(params.duration, Task::ParticleFinished(entry.handle)));
        self.active += 1;
        Some(entry.handle)
    }

    /// Animation-complete callback. Returns false if the entry was not active,
    /// so a late or duplicate completion is ignored.
    pub fn finish(
        &mut self,
        handle: ParticleHandle,
        surface: &mut dyn Surface,
        scheduler: &mut Scheduler<Task>,
    ) -> bool {
        match self.index_of(handle) {
            Some(index) if self.entries[index].state == EntryState::Active => {
                self.recycle(index, surface, scheduler);
                true
            }
            _ => false,
        }
    }

    fn recycle(&mut self, index: usize, surface: &mut dyn Surface, scheduler: &mut Scheduler<Task>) {
        let entry = &mut self.entries[index];
        if let Some(timer) = entry.finish_timer.take() {
            scheduler.cancel(timer);
        }
        surface.hide_particle(entry.handle);
        surface.cancel_animation(entry.handle);
        entry.state = EntryState::Pooled;
        self.active -= 1;
        self.idle.push(index);
    }

    fn create_entry(&mut self, surface: &mut dyn Surface) {
        let handle = surface.create_particle();
        self.entries.push(Entry {
            handle,
            state: EntryState::Pooled,
            finish_timer: None,
        });
        self.idle.push(self.entries.len() - 1);
    }

    fn index_of(&self, handle: ParticleHandle) -> Option<usize> {
        self.entries.iter().position(|e| e.handle == handle)
    }

    fn draw_params(&mut self) -> ParticleParams {
        ParticleParams {
            size_px: self.rng.in_range(SIZE_PX) as f32,
            lane_vw: self.rng.in_range(LANE_VW) as f32,
            drift_px: self.rng.in_range(DRIFT_PX) as f32,
            duration: Duration::from_secs_f64(self.rng.in_range(DURATION_SECS)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockSurface;

    fn setup() -> (ParticlePool, MockSurface, Scheduler<Task>) {
        let mut surface = MockSurface::new();
        let mut pool = ParticlePool::new(7);
        pool.prewarm(&mut surface, PREWARM);
        (pool, surface, Scheduler::new())
    }

    fn assert_consistent(pool: &ParticlePool) {
        assert_eq!(pool.active_count() + pool.pooled_count(), pool.len());
        assert!(pool.active_count() <= MAX_ACTIVE);
    }

    #[test]
    fn test_prewarm_creates_hidden_entries() {
        let (pool, surface, _) = setup();
        assert_eq!(pool.len(), PREWARM);
        assert_eq!(pool.pooled_count(), PREWARM);
        assert_eq!(surface.particle_elements(), PREWARM);
        assert_eq!(surface.visible_particles(), 0);
    }

    #[test]
    fn test_prewarm_respects_capacity() {
        let mut surface = MockSurface::new();
        let mut pool = ParticlePool::with_capacity(5, 1);
        pool.prewarm(&mut surface, 24);
        assert_eq!(pool.len(), 5);
    }

    #[test]
    fn test_spawn_rejected_when_disabled() {
        let (mut pool, mut surface, mut scheduler) = setup();
        assert!(pool.spawn(&mut surface, &mut scheduler).is_none());
        assert_eq!(pool.active_count(), 0);
    }

    #[test]
    fn test_spawn_caps_at_max_active() {
        let (mut pool, mut surface, mut scheduler) = setup();
        pool.start(&mut scheduler);

        let spawned = (0..100)
            .filter_map(|_| pool.spawn(&mut surface, &mut scheduler))
            .count();

        assert_eq!(spawned, MAX_ACTIVE);
        assert_eq!(pool.active_count(), MAX_ACTIVE);
        // Grows past the prewarmed set up to the cap, never beyond
        assert_eq!(pool.len(), MAX_ACTIVE);
        assert_eq!(surface.visible_particles(), MAX_ACTIVE);
        assert_consistent(&pool);
    }

    #[test]
    fn test_spawn_parameters_in_range() {
        let (mut pool, mut surface, mut scheduler) = setup();
        pool.start(&mut scheduler);

        for _ in 0..MAX_ACTIVE {
            let handle = pool.spawn(&mut surface, &mut scheduler).unwrap();
            let params = surface.particle(handle).unwrap().params.unwrap();
            assert!((4.0..10.0).contains(&params.size_px));
            assert!((0.0..100.0).contains(&params.lane_vw));
            assert!((-120.0..120.0).contains(&params.drift_px));
            assert!(params.duration >= Duration::from_secs(6));
            assert!(params.duration < Duration::from_secs(18));
        }
    }

    #[test]
    fn test_finish_returns_entry_exactly_once() {
        let (mut pool, mut surface, mut scheduler) = setup();
        pool.start(&mut scheduler);
        let handle = pool.spawn(&mut surface, &mut scheduler).unwrap();
        assert_eq!(pool.state_of(handle), Some(EntryState::Active));

        assert!(pool.finish(handle, &mut surface, &mut scheduler));
        assert!(!pool.finish(handle, &mut surface, &mut scheduler));
        assert_eq!(pool.state_of(handle), Some(EntryState::Pooled));
        assert_consistent(&pool);
    }

    #[test]
    fn test_reused_entry_replays_animation() {
        let (mut pool, mut surface, mut scheduler) = setup();
        pool.start(&mut scheduler);

        let first = pool.spawn(&mut surface, &mut scheduler).unwrap();
        pool.finish(first, &mut surface, &mut scheduler);
        let second = pool.spawn(&mut surface, &mut scheduler).unwrap();

        assert_eq!(first, second);
        let particle = surface.particle(second).unwrap();
        assert_eq!(particle.starts, 2);
        assert_eq!(particle.animation, Some(FALL_ANIMATION));
    }

    #[test]
    fn test_stop_recycles_everything() {
        let (mut pool, mut surface, mut scheduler) = setup();
        pool.start(&mut scheduler);
        for _ in 0..30 {
            pool.spawn(&mut surface, &mut scheduler);
        }

        pool.stop(&mut surface, &mut scheduler);

        assert!(!pool.is_running());
        assert_eq!(pool.active_count(), 0);
        assert_eq!(pool.pooled_count(), pool.len());
        assert_eq!(surface.visible_particles(), 0);
        assert_eq!(surface.animating_particles(), 0);
        // Ticker and every completion timer are gone
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn test_same_seed_same_parameters() {
        let (mut a, mut sa, mut ta) = setup();
        let (mut b, mut sb, mut tb) = setup();
        a.start(&mut ta);
        b.start(&mut tb);

        let ha = a.spawn(&mut sa, &mut ta).unwrap();
        let hb = b.spawn(&mut sb, &mut tb).unwrap();
        assert_eq!(sa.particle(ha).unwrap().params, sb.particle(hb).unwrap().params);
    }
}
