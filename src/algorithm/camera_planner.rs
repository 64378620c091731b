use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::algorithm::attention::{self, AttentionSample};
use crate::algorithm::constraints::ZoomConstraints;
use crate::models::events::InputEvent;
use crate::models::geometry::{Point, Size};
use crate::models::plan::{CameraKeyframe, CameraPlan};

/// Intensities at or below this value fall back to idle framing.
const IDLE_INTENSITY_EPSILON: f64 = 1e-3;
const INTENSITY_TIE_EPSILON: f64 = 1e-9;
/// Boundary keyframes closer than this to 0 / duration are snapped onto them.
const BOUNDARY_EPSILON: f64 = 1e-6;

/// Advisory cancellation shared between a host task and a running plan.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Copy)]
struct PlannedKeyframe {
    keyframe: CameraKeyframe,
    intensity: f64,
}

#[derive(Debug, Clone)]
struct Bucket {
    /// Time of the first sample; buckets are at least one interval apart.
    time: f64,
    representative: AttentionSample,
    members: Vec<AttentionSample>,
}

impl Bucket {
    fn from_sample(sample: AttentionSample) -> Self {
        Self {
            time: sample.time,
            representative: sample,
            members: vec![sample],
        }
    }

    fn push(&mut self, sample: AttentionSample) {
        if outranks(&sample, &self.representative) {
            self.representative = sample;
        }
        self.members.push(sample);
    }

    /// Centroid of the samples tied with the representative.
    fn center(&self) -> Point {
        let rep = self.representative;
        let (sum_x, sum_y, count) = self
            .members
            .iter()
            .filter(|sample| {
                sample.priority() == rep.priority()
                    && (sample.intensity - rep.intensity).abs() <= INTENSITY_TIE_EPSILON
            })
            .fold((0.0, 0.0, 0usize), |(x, y, n), sample| {
                (x + sample.position.x, y + sample.position.y, n + 1)
            });

        if count == 0 {
            return rep.position;
        }
        Point::new(sum_x / count as f64, sum_y / count as f64)
    }
}

/// Plans the virtual camera path for a finished (or in-progress) event log.
pub fn plan(
    events: &[InputEvent],
    source_size: Size,
    duration: f64,
    constraints: &ZoomConstraints,
) -> CameraPlan {
    plan_with_cancellation(
        events,
        source_size,
        duration,
        constraints,
        &CancellationFlag::new(),
    )
    .unwrap_or_else(|| idle_plan(source_size, duration, constraints))
}

/// Same as [`plan`], but returns `None` once `cancel` is raised.
/// The flag is polled once per bucket.
pub fn plan_with_cancellation(
    events: &[InputEvent],
    source_size: Size,
    duration: f64,
    constraints: &ZoomConstraints,
    cancel: &CancellationFlag,
) -> Option<CameraPlan> {
    let constraints = constraints.sanitized();

    if !duration.is_finite() || duration <= 0.0 {
        log::debug!("plan: degenerate duration {duration}, returning single idle keyframe");
        return Some(single_keyframe_plan(source_size, duration, &constraints));
    }
    if !source_size.is_positive() {
        log::warn!(
            "plan: non-positive source size {}x{}, returning idle plan",
            source_size.width,
            source_size.height
        );
        return Some(idle_plan(source_size, duration, &constraints));
    }
    if events.is_empty() {
        return Some(idle_plan(source_size, duration, &constraints));
    }

    let samples = attention::samples(events, &constraints)
        .into_iter()
        .map(|sample| AttentionSample {
            time: sample.time.max(0.0),
            ..sample
        })
        .filter(|sample| sample.time <= duration)
        .collect::<Vec<_>>();
    if samples.is_empty() {
        log::debug!("plan: no attention samples inside [0, {duration}], returning idle plan");
        return Some(idle_plan(source_size, duration, &constraints));
    }

    let buckets = bucket_samples(&samples, constraints.minimum_keyframe_interval, cancel)?;

    let mut keyframes = buckets
        .iter()
        .map(|bucket| keyframe_for_bucket(bucket, source_size, &constraints))
        .collect::<Vec<_>>();

    ensure_boundaries(&mut keyframes, source_size, duration, &constraints);
    enforce_motion_limits(&mut keyframes, source_size, &constraints);
    let keyframes = dedupe_keyframes(keyframes);

    log::debug!(
        "plan: {} events -> {} samples -> {} keyframes over {duration}s",
        events.len(),
        samples.len(),
        keyframes.len()
    );

    Some(CameraPlan {
        duration,
        keyframes: keyframes.into_iter().map(|planned| planned.keyframe).collect(),
    })
}

/// Two-keyframe plan with idle framing at the source center.
pub fn idle_plan(source_size: Size, duration: f64, constraints: &ZoomConstraints) -> CameraPlan {
    if !duration.is_finite() || duration <= 0.0 {
        return single_keyframe_plan(source_size, duration, constraints);
    }

    let idle = idle_keyframe(0.0, source_size, constraints);
    CameraPlan {
        duration,
        keyframes: vec![
            idle,
            CameraKeyframe {
                time: duration,
                ..idle
            },
        ],
    }
}

fn single_keyframe_plan(
    source_size: Size,
    duration: f64,
    constraints: &ZoomConstraints,
) -> CameraPlan {
    let duration = if duration.is_finite() {
        duration.max(0.0)
    } else {
        0.0
    };
    CameraPlan {
        duration,
        keyframes: vec![idle_keyframe(0.0, source_size, constraints)],
    }
}

fn idle_keyframe(time: f64, source_size: Size, constraints: &ZoomConstraints) -> CameraKeyframe {
    let zoom = constraints.clamp_zoom(constraints.idle_zoom);
    CameraKeyframe {
        time,
        zoom,
        center: constraints.clamp_center(source_size.center(), source_size, zoom),
    }
}

fn outranks(candidate: &AttentionSample, current: &AttentionSample) -> bool {
    if candidate.intensity > current.intensity + INTENSITY_TIE_EPSILON {
        return true;
    }
    (candidate.intensity - current.intensity).abs() <= INTENSITY_TIE_EPSILON
        && candidate.priority() > current.priority()
}

fn bucket_samples(
    samples: &[AttentionSample],
    interval: f64,
    cancel: &CancellationFlag,
) -> Option<Vec<Bucket>> {
    let mut buckets: Vec<Bucket> = Vec::new();

    for sample in samples.iter().copied() {
        if cancel.is_cancelled() {
            log::debug!("plan: cancelled after {} buckets", buckets.len());
            return None;
        }

        let opens_bucket = buckets
            .last()
            .map_or(true, |current| sample.time - current.time >= interval);
        if opens_bucket {
            buckets.push(Bucket::from_sample(sample));
        } else if let Some(current) = buckets.last_mut() {
            current.push(sample);
        }
    }

    Some(buckets)
}

fn keyframe_for_bucket(
    bucket: &Bucket,
    source_size: Size,
    constraints: &ZoomConstraints,
) -> PlannedKeyframe {
    let intensity = bucket.representative.intensity;
    let target_zoom = if intensity <= IDLE_INTENSITY_EPSILON {
        constraints.idle_zoom
    } else {
        constraints.base_zoom + (constraints.max_zoom - constraints.base_zoom) * intensity
    };
    let zoom = constraints.clamp_zoom(target_zoom);

    PlannedKeyframe {
        keyframe: CameraKeyframe {
            time: bucket.time,
            zoom,
            center: constraints.clamp_center(bucket.center(), source_size, zoom),
        },
        intensity,
    }
}

/// Leading keyframe hard-snaps to idle framing; trailing keyframe holds the
/// last planned framing until `duration`.
fn ensure_boundaries(
    keyframes: &mut Vec<PlannedKeyframe>,
    source_size: Size,
    duration: f64,
    constraints: &ZoomConstraints,
) {
    let starts_at_zero = keyframes
        .first()
        .is_some_and(|first| first.keyframe.time <= BOUNDARY_EPSILON);
    if starts_at_zero {
        keyframes[0].keyframe.time = 0.0;
    } else {
        keyframes.insert(
            0,
            PlannedKeyframe {
                keyframe: idle_keyframe(0.0, source_size, constraints),
                intensity: 0.0,
            },
        );
    }

    let last_index = keyframes.len() - 1;
    let mut tail = keyframes[last_index];
    if last_index > 0 && tail.keyframe.time >= duration - BOUNDARY_EPSILON {
        keyframes[last_index].keyframe.time = duration;
    } else {
        tail.keyframe.time = duration;
        keyframes.push(tail);
    }
}

/// "No nausea" pass: caps pan acceleration and speed segment by segment,
/// left to right, then re-clamps each adjusted center.
fn enforce_motion_limits(
    keyframes: &mut [PlannedKeyframe],
    source_size: Size,
    constraints: &ZoomConstraints,
) {
    let max_speed = constraints.max_pan_speed;
    let max_acceleration = constraints.max_pan_acceleration;
    let mut prev_velocity = Point::new(0.0, 0.0);

    for idx in 1..keyframes.len() {
        let prev = keyframes[idx - 1].keyframe;
        let current = &mut keyframes[idx].keyframe;
        let dt = current.time - prev.time;
        if dt <= 0.0 {
            continue;
        }

        let mut vx = (current.center.x - prev.center.x) / dt;
        let mut vy = (current.center.y - prev.center.y) / dt;

        let dvx = vx - prev_velocity.x;
        let dvy = vy - prev_velocity.y;
        let dv = dvx.hypot(dvy);
        let max_dv = max_acceleration * dt;
        if dv > max_dv {
            let scale = max_dv / dv;
            vx = prev_velocity.x + dvx * scale;
            vy = prev_velocity.y + dvy * scale;
        }

        let speed = vx.hypot(vy);
        if speed > max_speed {
            let scale = max_speed / speed;
            vx *= scale;
            vy *= scale;
        }

        let target = Point::new(prev.center.x + vx * dt, prev.center.y + vy * dt);
        current.center = constraints.clamp_center(target, source_size, current.zoom);
        prev_velocity = Point::new(
            (current.center.x - prev.center.x) / dt,
            (current.center.y - prev.center.y) / dt,
        );
    }
}

fn dedupe_keyframes(keyframes: Vec<PlannedKeyframe>) -> Vec<PlannedKeyframe> {
    let mut deduped: Vec<PlannedKeyframe> = Vec::with_capacity(keyframes.len());

    for planned in keyframes {
        if let Some(last) = deduped.last_mut() {
            if planned.keyframe.time <= last.keyframe.time {
                if planned.intensity > last.intensity {
                    let time = last.keyframe.time;
                    *last = planned;
                    last.keyframe.time = time;
                }
                continue;
            }
        }
        deduped.push(planned);
    }

    deduped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::events::MouseButton;

    const SOURCE: Size = Size::new(1_920.0, 1_080.0);

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-4
    }

    fn assert_plan_invariants(plan: &CameraPlan, constraints: &ZoomConstraints) {
        let first = plan.first().expect("plan must not be empty");
        let last = plan.last().expect("plan must not be empty");
        assert!(approx_eq(first.time, 0.0), "first keyframe at {}", first.time);
        assert!(
            approx_eq(last.time, plan.duration),
            "last keyframe at {} for duration {}",
            last.time,
            plan.duration
        );

        for pair in plan.keyframes.windows(2) {
            assert!(
                pair[0].time < pair[1].time,
                "keyframe times must increase: {} then {}",
                pair[0].time,
                pair[1].time
            );
        }

        for keyframe in &plan.keyframes {
            assert!(keyframe.zoom >= 1.0 && keyframe.zoom <= constraints.max_zoom);
            assert!(keyframe.zoom <= constraints.clamp_zoom(constraints.max_zoom));
            assert_eq!(
                constraints.clamp_center(keyframe.center, SOURCE, keyframe.zoom),
                keyframe.center
            );
        }
    }

    fn busy_session() -> Vec<InputEvent> {
        let mut events = Vec::new();
        for i in 0..240u32 {
            let t = i as f64 * 0.02;
            let x = 200.0 + ((i * 37) % 1_500) as f64;
            let y = 100.0 + ((i * 53) % 900) as f64;
            events.push(InputEvent::moved(t, x, y));
            if i % 25 == 0 {
                events.push(InputEvent::down(t, x, y, MouseButton::Left));
                events.push(InputEvent::up(t + 0.08, x, y, MouseButton::Left));
            }
        }
        // Parked cursor long enough to dwell.
        for i in 0..30u32 {
            events.push(InputEvent::moved(5.0 + i as f64 * 0.05, 1_500.0, 300.0));
        }
        events
    }

    #[test]
    fn empty_events_produce_idle_boundary_plan() {
        let constraints = ZoomConstraints::default();
        let plan = plan(&[], SOURCE, 4.0, &constraints);

        assert_eq!(plan.duration, 4.0);
        assert_eq!(plan.keyframes.len(), 2);
        for keyframe in &plan.keyframes {
            assert!(approx_eq(keyframe.zoom, constraints.idle_zoom));
            assert_eq!(keyframe.center, SOURCE.center());
        }
        assert_plan_invariants(&plan, &constraints);
    }

    #[test]
    fn single_corner_click_is_clamped_for_pan_and_zoom() {
        let constraints = ZoomConstraints {
            max_zoom: 3.0,
            min_visible_area_fraction: 0.5,
            base_zoom: 1.0,
            ..ZoomConstraints::default()
        };
        let events = vec![InputEvent::down(1.0, 1_800.0, 900.0, MouseButton::Left)];

        let plan = plan(&events, SOURCE, 2.0, &constraints);
        assert_eq!(plan.duration, 2.0);
        assert_eq!(plan.first().map(|k| k.time), Some(0.0));
        assert_eq!(plan.last().map(|k| k.time), Some(2.0));
        assert_plan_invariants(&plan, &constraints);

        let click = plan
            .keyframes
            .iter()
            .find(|keyframe| approx_eq(keyframe.time, 1.0))
            .expect("missing keyframe for the click");
        assert!(approx_eq(click.zoom, 2.0));
        assert!(approx_eq(click.center.x, 1_344.0));
        assert!(approx_eq(click.center.y, 756.0));
    }

    #[test]
    fn busy_session_respects_every_invariant() {
        let constraints = ZoomConstraints::default();
        let plan = plan(&busy_session(), SOURCE, 7.0, &constraints);
        assert!(plan.keyframes.len() > 10);
        assert_plan_invariants(&plan, &constraints);

        let scaled = constraints.scale(0.4, 0.25);
        let plan = super::plan(&busy_session(), SOURCE, 7.0, &scaled);
        assert_plan_invariants(&plan, &scaled);
        for pair in plan.keyframes.windows(2) {
            assert!(pair[1].time - pair[0].time > 0.0);
        }
    }

    #[test]
    fn replanning_is_bit_identical() {
        let constraints = ZoomConstraints::default();
        let events = busy_session();
        let first = plan(&events, SOURCE, 7.0, &constraints);
        let second = plan(&events, SOURCE, 7.0, &constraints);
        assert_eq!(first, second);
    }

    #[test]
    fn degenerate_duration_returns_single_idle_keyframe() {
        let constraints = ZoomConstraints::default();
        let events = vec![InputEvent::down(0.5, 10.0, 10.0, MouseButton::Left)];

        for duration in [0.0, -3.0, f64::NAN] {
            let plan = plan(&events, SOURCE, duration, &constraints);
            assert_eq!(plan.keyframes.len(), 1);
            assert_eq!(plan.keyframes[0].time, 0.0);
            assert_eq!(plan.keyframes[0].center, SOURCE.center());
            assert!(approx_eq(plan.keyframes[0].zoom, constraints.idle_zoom));
            assert_eq!(plan.duration, 0.0);
        }
    }

    #[test]
    fn non_positive_source_returns_idle_plan() {
        let constraints = ZoomConstraints::default();
        let events = vec![InputEvent::down(0.5, 10.0, 10.0, MouseButton::Left)];
        let plan = plan(&events, Size::new(0.0, 1_080.0), 3.0, &constraints);

        assert_eq!(plan.keyframes.len(), 2);
        assert_eq!(plan.keyframes[0].time, 0.0);
        assert_eq!(plan.keyframes[1].time, 3.0);
        assert!(plan.keyframes.iter().all(|keyframe| keyframe.center.x == 0.0));
    }

    #[test]
    fn samples_within_interval_merge_and_click_wins() {
        let constraints = ZoomConstraints {
            minimum_keyframe_interval: 0.5,
            ..ZoomConstraints::default()
        };
        let events = vec![
            InputEvent::moved(1.0, 900.0, 500.0),
            InputEvent::down(1.2, 1_000.0, 600.0, MouseButton::Left),
            InputEvent::up(1.3, 1_040.0, 600.0, MouseButton::Left),
        ];

        let plan = plan(&events, SOURCE, 4.0, &constraints);
        // leading idle, merged bucket, trailing hold
        assert_eq!(plan.keyframes.len(), 3);
        let bucket = plan.keyframes[1];
        assert!(approx_eq(bucket.time, 1.0));
        assert!(approx_eq(bucket.zoom, constraints.max_zoom));
        // Centroid of the two tied click samples.
        assert!(approx_eq(bucket.center.x, 1_020.0));
        assert!(approx_eq(bucket.center.y, 600.0));
        assert_plan_invariants(&plan, &constraints);
    }

    #[test]
    fn pan_speed_is_capped_between_consecutive_keyframes() {
        let constraints = ZoomConstraints {
            max_pan_speed: 1_800.0,
            max_pan_acceleration: 3_600.0,
            ..ZoomConstraints::default()
        };
        let events = vec![
            InputEvent::down(1.0, 600.0, 540.0, MouseButton::Left),
            InputEvent::down(1.1, 1_300.0, 540.0, MouseButton::Left),
        ];

        let plan = plan(&events, SOURCE, 3.0, &constraints);
        assert_plan_invariants(&plan, &constraints);

        let second = plan
            .keyframes
            .iter()
            .find(|keyframe| approx_eq(keyframe.time, 1.1))
            .expect("missing keyframe for the second click");
        assert!(second.center.x < 1_300.0, "second click must be slowed down");

        for pair in plan.keyframes.windows(2) {
            let dt = pair[1].time - pair[0].time;
            let speed = pair[0].center.distance(pair[1].center) / dt;
            assert!(
                speed <= constraints.max_pan_speed + 1e-6,
                "segment {}..{} pans at {speed}",
                pair[0].time,
                pair[1].time
            );
        }

        let last = plan.last().expect("plan must not be empty");
        assert!(approx_eq(last.center.x, 1_300.0));
    }

    #[test]
    fn tight_visible_fraction_keeps_idle_plan_at_idle_zoom() {
        let tight = ZoomConstraints {
            min_visible_area_fraction: 0.8,
            ..ZoomConstraints::default()
        };
        assert_eq!(tight.validate(), Ok(()));
        let plan = plan(&[], SOURCE, 2.0, &tight);
        assert!(plan
            .keyframes
            .iter()
            .all(|keyframe| keyframe.zoom == tight.idle_zoom));

        let repaired = ZoomConstraints {
            min_visible_area_fraction: 0.95,
            ..ZoomConstraints::default()
        }
        .clamped();
        let plan = super::plan(&[], SOURCE, 2.0, &repaired);
        assert_eq!(plan.keyframes.len(), 2);
        assert!(plan
            .keyframes
            .iter()
            .all(|keyframe| keyframe.zoom == repaired.idle_zoom));
    }

    #[test]
    fn speed_cap_alone_limits_displacement() {
        let constraints = ZoomConstraints {
            max_pan_speed: 1_000.0,
            max_pan_acceleration: 1.0e9,
            ..ZoomConstraints::default()
        };
        let events = vec![
            InputEvent::down(1.0, 600.0, 540.0, MouseButton::Left),
            InputEvent::down(1.1, 1_300.0, 540.0, MouseButton::Left),
        ];

        let plan = plan(&events, SOURCE, 3.0, &constraints);
        assert_plan_invariants(&plan, &constraints);

        let first = plan.keyframes[1];
        let second = plan.keyframes[2];
        assert!(approx_eq(first.time, 1.0));
        assert!(approx_eq(second.time, 1.1));
        assert!(approx_eq(first.center.x, 600.0));

        let dt = second.time - first.time;
        assert!(approx_eq(
            second.center.x,
            600.0 + constraints.max_pan_speed * dt
        ));
        assert!(approx_eq(second.center.y, 540.0));
    }

    #[test]
    fn acceleration_cap_alone_limits_velocity_change() {
        let constraints = ZoomConstraints {
            max_pan_speed: 1.0e9,
            max_pan_acceleration: 3_600.0,
            ..ZoomConstraints::default()
        };
        let events = vec![
            InputEvent::down(1.0, 1_200.0, 540.0, MouseButton::Left),
            InputEvent::down(1.1, 1_400.0, 540.0, MouseButton::Left),
        ];

        let plan = plan(&events, SOURCE, 3.0, &constraints);
        assert_plan_invariants(&plan, &constraints);

        let leading = plan.keyframes[0];
        let first = plan.keyframes[1];
        let second = plan.keyframes[2];
        assert!(approx_eq(leading.center.x, 960.0));
        assert!(approx_eq(first.center.x, 1_200.0));

        let prior_velocity = (first.center.x - leading.center.x) / (first.time - leading.time);
        let dt = second.time - first.time;
        let expected =
            first.center.x + (prior_velocity + constraints.max_pan_acceleration * dt) * dt;
        assert!(approx_eq(second.center.x, expected));
        assert!(second.center.x < 1_400.0);
    }

    #[test]
    fn events_after_duration_are_ignored() {
        let constraints = ZoomConstraints::default();
        let events = vec![InputEvent::down(5.0, 100.0, 100.0, MouseButton::Left)];
        let plan = plan(&events, SOURCE, 2.0, &constraints);
        assert_eq!(plan, idle_plan(SOURCE, 2.0, &constraints));
    }

    #[test]
    fn event_at_time_zero_replaces_leading_idle_keyframe() {
        let constraints = ZoomConstraints::default();
        let events = vec![InputEvent::down(0.0, 700.0, 400.0, MouseButton::Left)];
        let plan = plan(&events, SOURCE, 1.0, &constraints);

        assert_eq!(plan.keyframes.len(), 2);
        assert!(approx_eq(plan.keyframes[0].zoom, constraints.max_zoom));
        assert_plan_invariants(&plan, &constraints);
    }

    #[test]
    fn raised_cancellation_flag_abandons_planning() {
        let cancel = CancellationFlag::new();
        cancel.cancel();
        let result = plan_with_cancellation(
            &busy_session(),
            SOURCE,
            7.0,
            &ZoomConstraints::default(),
            &cancel,
        );
        assert!(result.is_none());
        assert!(cancel.clone().is_cancelled());
    }
}
