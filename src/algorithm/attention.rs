use crate::algorithm::constraints::ZoomConstraints;
use crate::models::events::{EventKind, InputEvent};
use crate::models::geometry::Point;

/// Small tolerance so accumulated low-speed time like `0.1 + 0.2` still
/// reaches a `0.3` dwell threshold.
const DWELL_EPSILON: f64 = 1e-9;

/// Derived attention signal at one instant. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttentionSample {
    pub time: f64,
    /// 0.0..=1.0, drives zoom strength.
    pub intensity: f64,
    pub is_dwell: bool,
    pub is_click: bool,
    /// Position of the event that produced the sample.
    pub position: Point,
}

impl AttentionSample {
    /// Rank used to break intensity ties: click > dwell > plain motion.
    pub fn priority(&self) -> u8 {
        if self.is_click {
            2
        } else if self.is_dwell {
            1
        } else {
            0
        }
    }
}

/// Turns an event stream into attention samples ordered by time.
///
/// Every `cursorMoved` yields exactly one sample (dwell or background motion),
/// every button event yields one click sample.
pub fn samples(events: &[InputEvent], constraints: &ZoomConstraints) -> Vec<AttentionSample> {
    let mut ordered: Vec<&InputEvent> = events.iter().collect();
    // Stable: same-timestamp events keep their log order.
    ordered.sort_by(|left, right| left.sort_time().total_cmp(&right.sort_time()));

    let mut tracker = DwellTracker::new(constraints);
    let mut output = Vec::with_capacity(ordered.len());

    for event in ordered {
        let time = event.sort_time();
        let position = event.position.sanitized();
        match event.kind {
            EventKind::CursorMoved => output.push(tracker.observe_move(time, position)),
            EventKind::MouseDown | EventKind::MouseUp => output.push(AttentionSample {
                time,
                intensity: constraints.click_intensity.clamp(0.0, 1.0),
                is_dwell: false,
                is_click: true,
                position,
            }),
        }
    }

    output
}

struct DwellTracker<'a> {
    constraints: &'a ZoomConstraints,
    last_move: Option<(f64, Point)>,
    smoothed_speed: f64,
    low_speed_time: f64,
}

impl<'a> DwellTracker<'a> {
    fn new(constraints: &'a ZoomConstraints) -> Self {
        Self {
            constraints,
            last_move: None,
            smoothed_speed: 0.0,
            low_speed_time: 0.0,
        }
    }

    fn observe_move(&mut self, time: f64, position: Point) -> AttentionSample {
        let alpha = self.constraints.velocity_smoothing_alpha.clamp(0.0, 1.0);
        let mut elapsed = 0.0;

        if let Some((prev_time, prev_position)) = self.last_move {
            elapsed = (time - prev_time).max(0.0);
            let instant = instant_speed(prev_position, position, elapsed);
            let smoothed = alpha * instant + (1.0 - alpha) * self.smoothed_speed;
            self.smoothed_speed = if smoothed.is_finite() { smoothed } else { 0.0 };
        }
        self.last_move = Some((time, position));

        if self.smoothed_speed < self.constraints.dwell_speed_threshold {
            self.low_speed_time += elapsed;
        } else {
            self.low_speed_time = 0.0;
        }

        if self.low_speed_time + DWELL_EPSILON >= self.constraints.dwell_duration {
            return AttentionSample {
                time,
                intensity: self.constraints.dwell_intensity.clamp(0.0, 1.0),
                is_dwell: true,
                is_click: false,
                position,
            };
        }

        let ceiling = self.constraints.motion_speed_ceiling.max(f64::EPSILON);
        let normalized = (self.smoothed_speed / ceiling).clamp(0.0, 1.0);
        AttentionSample {
            time,
            intensity: (self.constraints.motion_intensity * normalized).clamp(0.0, 1.0),
            is_dwell: false,
            is_click: false,
            position,
        }
    }
}

fn instant_speed(from: Point, to: Point, elapsed: f64) -> f64 {
    if elapsed <= 0.0 || !elapsed.is_finite() {
        return 0.0;
    }
    let speed = from.distance(to) / elapsed;
    if speed.is_finite() {
        speed
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::events::MouseButton;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 0.0001
    }

    fn dwell_constraints() -> ZoomConstraints {
        ZoomConstraints {
            dwell_duration: 0.1,
            dwell_speed_threshold: 10.0,
            velocity_smoothing_alpha: 1.0,
            motion_intensity: 0.2,
            dwell_intensity: 0.7,
            click_intensity: 1.0,
            ..ZoomConstraints::default()
        }
    }

    fn times(samples: &[AttentionSample]) -> Vec<f64> {
        samples.iter().map(|sample| sample.time).collect()
    }

    #[test]
    fn detects_dwell_and_click() {
        let events = vec![
            InputEvent::moved(0.0, 100.0, 100.0),
            InputEvent::moved(0.2, 100.0, 100.0),
            InputEvent::down(0.25, 100.0, 100.0, MouseButton::Left),
        ];

        let samples = samples(&events, &dwell_constraints());
        let mut sorted = times(&samples);
        sorted.sort_by(f64::total_cmp);
        assert_eq!(times(&samples), sorted);

        let dwell = samples
            .iter()
            .find(|sample| approx_eq(sample.time, 0.2))
            .expect("missing sample at t=0.2");
        assert!(dwell.is_dwell);
        assert!(approx_eq(dwell.intensity, 0.7));

        let click = samples
            .iter()
            .find(|sample| sample.is_click)
            .expect("missing click sample");
        assert!(approx_eq(click.intensity, 1.0));
        assert!(approx_eq(click.time, 0.25));
    }

    #[test]
    fn sorts_unordered_events_and_keeps_same_timestamp_duplicates() {
        let events = vec![
            InputEvent::down(0.5, 10.0, 10.0, MouseButton::Left),
            InputEvent::moved(0.1, 0.0, 0.0),
            InputEvent::up(0.5, 12.0, 10.0, MouseButton::Left),
            InputEvent::moved(0.3, 5.0, 5.0),
        ];

        let samples = samples(&events, &ZoomConstraints::default());
        assert_eq!(samples.len(), events.len());
        assert_eq!(times(&samples), vec![0.1, 0.3, 0.5, 0.5]);
        // Ties keep log order: mouseDown before mouseUp.
        assert!(approx_eq(samples[2].position.x, 10.0));
        assert!(approx_eq(samples[3].position.x, 12.0));
    }

    #[test]
    fn fast_motion_resets_dwell_window_and_produces_background_signal() {
        let constraints = dwell_constraints();
        let events = vec![
            InputEvent::moved(0.0, 0.0, 0.0),
            InputEvent::moved(0.2, 0.0, 0.0),
            InputEvent::moved(0.3, 400.0, 0.0),
            InputEvent::moved(0.35, 800.0, 0.0),
        ];

        let samples = samples(&events, &constraints);
        assert!(samples[1].is_dwell);
        assert!(!samples[2].is_dwell);
        assert!(!samples[3].is_dwell);
        assert!(samples[3].intensity > 0.0);
        assert!(samples[3].intensity <= constraints.motion_intensity + 1e-12);
    }

    #[test]
    fn ema_smoothing_delays_dwell_after_fast_motion() {
        let constraints = ZoomConstraints {
            velocity_smoothing_alpha: 0.5,
            ..dwell_constraints()
        };
        let events = vec![
            InputEvent::moved(0.0, 0.0, 0.0),
            InputEvent::moved(0.1, 100.0, 0.0),
            InputEvent::moved(0.2, 100.0, 0.0),
            InputEvent::moved(0.3, 100.0, 0.0),
        ];

        let samples = samples(&events, &constraints);
        // Smoothed 500 -> 250 -> 125 pt/s: still above the 10 pt/s threshold.
        assert!(samples.iter().all(|sample| !sample.is_dwell));
    }

    #[test]
    fn degenerate_timing_and_positions_never_produce_nan() {
        let events = vec![
            InputEvent::moved(1.0, 0.0, 0.0),
            InputEvent::moved(1.0, 500.0, 500.0),
            InputEvent::moved(f64::NAN, f64::NAN, 3.0),
            InputEvent::moved(2.0, f64::INFINITY, 1.0),
        ];

        let samples = samples(&events, &ZoomConstraints::default());
        assert_eq!(samples.len(), 4);
        assert!(samples
            .iter()
            .all(|sample| sample.intensity.is_finite() && sample.time.is_finite()));
        assert!(samples.iter().all(|sample| sample.position.is_finite()));
        assert!(approx_eq(samples[0].time, 0.0));
    }

    #[test]
    fn clicks_are_emitted_even_during_dwell() {
        let events = vec![
            InputEvent::moved(0.0, 50.0, 50.0),
            InputEvent::moved(0.3, 50.0, 50.0),
            InputEvent::down(0.3, 50.0, 50.0, MouseButton::Right),
            InputEvent::moved(0.4, 50.0, 50.0),
        ];

        let samples = samples(&events, &dwell_constraints());
        assert_eq!(samples.iter().filter(|sample| sample.is_click).count(), 1);
        assert_eq!(samples.iter().filter(|sample| sample.is_dwell).count(), 2);
        assert_eq!(samples[2].priority(), 2);
    }
}
