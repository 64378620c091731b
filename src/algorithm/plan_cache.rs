//! Memoized camera plans: a repeated request with the same inputs is not replanned.

use std::collections::VecDeque;
use std::hash::Hasher;
use std::sync::{Arc, Mutex};

use crate::algorithm::constraints::ZoomConstraints;
use crate::models::events::{EventKind, InputEvent, MouseButton};
use crate::models::geometry::Size;
use crate::models::plan::CameraPlan;

/// One plan per timeline preview.
pub const DEFAULT_PLAN_CACHE_CAPACITY: usize = 1;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Cache handle shared between the command layer and background workers.
pub type SharedPlanCache = Arc<Mutex<PlanCache>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlanCacheKey(pub u64);

/// 64-bit FNV-1a. Stable across runs, unlike `DefaultHasher`.
struct Fnv1a(u64);

impl Fnv1a {
    fn new() -> Self {
        Self(FNV_OFFSET_BASIS)
    }

    fn write_f64(&mut self, value: f64) {
        // -0.0 and 0.0 must hash the same.
        let value = if value == 0.0 { 0.0 } else { value };
        self.write_u64(value.to_bits());
    }
}

impl Hasher for Fnv1a {
    fn write(&mut self, bytes: &[u8]) {
        for byte in bytes {
            self.0 ^= u64::from(*byte);
            self.0 = self.0.wrapping_mul(FNV_PRIME);
        }
    }

    fn finish(&self) -> u64 {
        self.0
    }
}

/// Deterministic fingerprint of everything a plan depends on.
///
/// `events` must already be in asset space. Duration is rounded to
/// milliseconds and the source size to 1/100 pt so float jitter from the
/// decoder does not defeat the cache.
pub fn cache_key(
    events: &[InputEvent],
    constraints: &ZoomConstraints,
    duration: f64,
    source_size: Size,
) -> PlanCacheKey {
    let mut hasher = Fnv1a::new();

    hasher.write_u64(events.len() as u64);
    for event in events {
        hasher.write_u8(kind_code(event.kind));
        hasher.write_f64(event.timestamp);
        hasher.write_f64(event.position.x);
        hasher.write_f64(event.position.y);
        hasher.write_u8(button_code(event.button));
    }

    for value in [
        constraints.max_zoom,
        constraints.idle_zoom,
        constraints.base_zoom,
        constraints.min_visible_area_fraction,
        constraints.safe_margin_fraction,
        constraints.dwell_duration,
        constraints.dwell_speed_threshold,
        constraints.velocity_smoothing_alpha,
        constraints.motion_intensity,
        constraints.dwell_intensity,
        constraints.click_intensity,
        constraints.motion_speed_ceiling,
        constraints.minimum_keyframe_interval,
        constraints.max_pan_speed,
        constraints.max_pan_acceleration,
    ] {
        hasher.write_f64(value);
    }

    hasher.write_i64(rounded(duration, 1_000.0));
    hasher.write_i64(rounded(source_size.width, 100.0));
    hasher.write_i64(rounded(source_size.height, 100.0));

    PlanCacheKey(hasher.finish())
}

fn kind_code(kind: EventKind) -> u8 {
    match kind {
        EventKind::CursorMoved => 0,
        EventKind::MouseDown => 1,
        EventKind::MouseUp => 2,
    }
}

fn button_code(button: Option<MouseButton>) -> u8 {
    match button {
        None => 0,
        Some(MouseButton::Left) => 1,
        Some(MouseButton::Right) => 2,
        Some(MouseButton::Other) => 3,
    }
}

/// Non-finite values saturate through the `as` cast (NaN -> 0).
fn rounded(value: f64, steps_per_unit: f64) -> i64 {
    (value * steps_per_unit).round() as i64
}

/// Bounded LRU of finished plans. Front of the queue is the most recent entry.
#[derive(Debug)]
pub struct PlanCache {
    capacity: usize,
    entries: VecDeque<(PlanCacheKey, Arc<CameraPlan>)>,
}

impl Default for PlanCache {
    fn default() -> Self {
        Self::new()
    }
}

impl PlanCache {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_PLAN_CACHE_CAPACITY)
    }

    /// Capacity below one is raised to one.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    pub fn shared() -> SharedPlanCache {
        Arc::new(Mutex::new(Self::new()))
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Hit promotes the entry to most recently used.
    pub fn get(&mut self, key: PlanCacheKey) -> Option<Arc<CameraPlan>> {
        let index = self.entries.iter().position(|(stored, _)| *stored == key)?;
        let entry = self.entries.remove(index)?;
        let plan = Arc::clone(&entry.1);
        self.entries.push_front(entry);
        Some(plan)
    }

    pub fn put(&mut self, key: PlanCacheKey, plan: Arc<CameraPlan>) {
        if let Some(index) = self.entries.iter().position(|(stored, _)| *stored == key) {
            self.entries.remove(index);
        }
        self.entries.push_front((key, plan));
        while self.entries.len() > self.capacity {
            if let Some((evicted, _)) = self.entries.pop_back() {
                log::debug!("plan cache: evicted {:016x}", evicted.0);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
