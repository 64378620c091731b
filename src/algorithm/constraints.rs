use crate::error::ConstraintError;
use crate::models::geometry::{Point, Size};
use crate::models::settings::{AutoZoomSettings, MIN_KEYFRAME_INTERVAL_FLOOR};

/// Pan limits are scaled by this factor unconditionally so preview motion
/// stays calmer than the theoretical limit.
pub const FOLLOW_SMOOTHING_FACTOR: f64 = 0.75;

/// Numeric limits of a camera plan.
///
/// Built through `scale` or struct update (`..ZoomConstraints::default()`);
/// the planner reads it and never mutates it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomConstraints {
    pub max_zoom: f64,
    pub idle_zoom: f64,
    pub base_zoom: f64,
    /// Minimum share of each source axis that must stay inside the crop.
    pub min_visible_area_fraction: f64,
    /// Inset between crop edge and source edge, as a share of the crop size.
    pub safe_margin_fraction: f64,
    /// Seconds of sustained low velocity before a dwell is reported.
    pub dwell_duration: f64,
    /// Points per second.
    pub dwell_speed_threshold: f64,
    pub velocity_smoothing_alpha: f64,
    pub motion_intensity: f64,
    pub dwell_intensity: f64,
    pub click_intensity: f64,
    /// Speed (points/sec) at which background motion reaches full `motion_intensity`.
    pub motion_speed_ceiling: f64,
    /// Seconds.
    pub minimum_keyframe_interval: f64,
    /// Points per second.
    pub max_pan_speed: f64,
    /// Points per second squared.
    pub max_pan_acceleration: f64,
}

impl Default for ZoomConstraints {
    fn default() -> Self {
        Self {
            max_zoom: 2.5,
            idle_zoom: 1.1,
            base_zoom: 1.0,
            min_visible_area_fraction: 0.4,
            safe_margin_fraction: 0.10,
            dwell_duration: 0.35,
            dwell_speed_threshold: 40.0,
            velocity_smoothing_alpha: 0.35,
            motion_intensity: 0.25,
            dwell_intensity: 0.7,
            click_intensity: 1.0,
            motion_speed_ceiling: 2_000.0,
            minimum_keyframe_interval: 1.0 / 30.0,
            max_pan_speed: 1_800.0,
            max_pan_acceleration: 3_600.0,
        }
    }
}

impl ZoomConstraints {
    /// Working constraints for one user-facing intensity knob.
    pub fn scale(&self, intensity: f64, minimum_keyframe_interval: f64) -> Self {
        let intensity = if intensity.is_finite() {
            intensity.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let interval = if minimum_keyframe_interval.is_finite() {
            minimum_keyframe_interval.max(MIN_KEYFRAME_INTERVAL_FLOOR)
        } else {
            self.minimum_keyframe_interval
                .max(MIN_KEYFRAME_INTERVAL_FLOOR)
        };

        let max_zoom = 1.0 + (self.max_zoom - 1.0) * intensity;
        let idle_zoom = 1.0 + (self.idle_zoom - 1.0) * intensity;

        Self {
            max_zoom,
            idle_zoom,
            base_zoom: self.base_zoom.clamp(1.0, max_zoom.max(1.0)),
            // Tightest crop at the scaled ceiling must still satisfy the floor.
            min_visible_area_fraction: self
                .min_visible_area_fraction
                .max(1.0 / (max_zoom * max_zoom))
                .min(1.0),
            motion_intensity: self.motion_intensity * intensity,
            dwell_intensity: self.dwell_intensity * intensity,
            click_intensity: self.click_intensity * intensity,
            minimum_keyframe_interval: interval,
            max_pan_speed: self.max_pan_speed * FOLLOW_SMOOTHING_FACTOR,
            max_pan_acceleration: self.max_pan_acceleration * FOLLOW_SMOOTHING_FACTOR,
            ..*self
        }
    }

    pub fn for_settings(settings: &AutoZoomSettings) -> Self {
        let settings = settings.sanitized();
        Self::default().scale(settings.intensity, settings.minimum_keyframe_interval)
    }

    /// Highest zoom allowed by both `max_zoom` and the visible-fraction floor.
    ///
    /// `min_visible_area_fraction` bounds each source axis, so the crop keeps at
    /// least `fraction^2` of the source area. Valid constraints always have
    /// `idle_zoom <= zoom_ceiling()`.
    pub fn zoom_ceiling(&self) -> f64 {
        let by_visible = if self.min_visible_area_fraction > 0.0 {
            1.0 / self.min_visible_area_fraction
        } else {
            f64::INFINITY
        };
        self.max_zoom.min(by_visible).max(1.0)
    }

    /// `min(max(zoom, 1), zoom_ceiling())`; non-finite input maps to 1.
    pub fn clamp_zoom(&self, zoom: f64) -> f64 {
        if !zoom.is_finite() {
            return 1.0;
        }
        zoom.max(1.0).min(self.zoom_ceiling())
    }

    /// Keeps the crop at `zoom` (plus safe margin) inside the source frame.
    /// Degenerate axes snap to the source center.
    pub fn clamp_center(&self, center: Point, source_size: Size, zoom: f64) -> Point {
        if !source_size.is_positive() {
            return source_size.center();
        }

        let zoom = self.clamp_zoom(zoom);
        let fallback = source_size.center();
        let x = if center.x.is_finite() {
            center.x
        } else {
            fallback.x
        };
        let y = if center.y.is_finite() {
            center.y
        } else {
            fallback.y
        };

        Point::new(
            clamp_axis(x, source_size.width, zoom, self.safe_margin_fraction),
            clamp_axis(y, source_size.height, zoom, self.safe_margin_fraction),
        )
    }

    pub fn validate(&self) -> Result<(), ConstraintError> {
        let fields = [
            ("maxZoom", self.max_zoom),
            ("idleZoom", self.idle_zoom),
            ("baseZoom", self.base_zoom),
            ("minVisibleAreaFraction", self.min_visible_area_fraction),
            ("safeMarginFraction", self.safe_margin_fraction),
            ("dwellDuration", self.dwell_duration),
            ("dwellSpeedThreshold", self.dwell_speed_threshold),
            ("velocitySmoothingAlpha", self.velocity_smoothing_alpha),
            ("motionIntensity", self.motion_intensity),
            ("dwellIntensity", self.dwell_intensity),
            ("clickIntensity", self.click_intensity),
            ("motionSpeedCeiling", self.motion_speed_ceiling),
            ("minimumKeyframeInterval", self.minimum_keyframe_interval),
            ("maxPanSpeed", self.max_pan_speed),
            ("maxPanAcceleration", self.max_pan_acceleration),
        ];
        if let Some(&(field, _)) = fields.iter().find(|(_, value)| !value.is_finite()) {
            return Err(ConstraintError::NonFinite { field });
        }

        if self.max_zoom < 1.0 {
            return Err(ConstraintError::MaxZoomBelowOne(self.max_zoom));
        }
        let min_fraction = 1.0 / (self.max_zoom * self.max_zoom);
        if self.min_visible_area_fraction <= 0.0
            || self.min_visible_area_fraction > 1.0
            || self.min_visible_area_fraction < min_fraction
        {
            return Err(ConstraintError::VisibleFractionOutOfRange(
                self.min_visible_area_fraction,
            ));
        }

        let ceiling = self.zoom_ceiling();
        if self.idle_zoom < 1.0 || self.idle_zoom > ceiling {
            return Err(ConstraintError::IdleZoomOutOfRange {
                idle: self.idle_zoom,
                max: ceiling,
            });
        }
        check_range("baseZoom", self.base_zoom, 1.0, self.max_zoom)?;

        check_range("safeMarginFraction", self.safe_margin_fraction, 0.0, 0.45)?;
        check_range(
            "velocitySmoothingAlpha",
            self.velocity_smoothing_alpha,
            0.0,
            1.0,
        )?;
        if self.velocity_smoothing_alpha <= 0.0 {
            return Err(ConstraintError::NotPositive {
                field: "velocitySmoothingAlpha",
                value: self.velocity_smoothing_alpha,
            });
        }
        check_range("motionIntensity", self.motion_intensity, 0.0, 1.0)?;
        check_range("dwellIntensity", self.dwell_intensity, 0.0, 1.0)?;
        check_range("clickIntensity", self.click_intensity, 0.0, 1.0)?;

        check_positive("dwellDuration", self.dwell_duration)?;
        check_positive("dwellSpeedThreshold", self.dwell_speed_threshold)?;
        check_positive("motionSpeedCeiling", self.motion_speed_ceiling)?;
        check_positive("minimumKeyframeInterval", self.minimum_keyframe_interval)?;
        check_positive("maxPanSpeed", self.max_pan_speed)?;
        check_positive("maxPanAcceleration", self.max_pan_acceleration)?;

        Ok(())
    }

    /// Invalid constraints are a programmer error: assert in debug builds,
    /// clamp and continue in release builds.
    pub fn sanitized(self) -> Self {
        match self.validate() {
            Ok(()) => self,
            Err(err) => {
                debug_assert!(false, "invalid zoom constraints: {err}");
                log::warn!("invalid zoom constraints ({err}); clamping to safe values");
                self.clamped()
            }
        }
    }

    /// Forces every field into its valid range, falling back to the defaults
    /// for non-finite values.
    pub fn clamped(self) -> Self {
        let defaults = Self::default();
        let pick = |value: f64, fallback: f64| if value.is_finite() { value } else { fallback };

        let max_zoom = pick(self.max_zoom, defaults.max_zoom).max(1.0);
        let alpha = pick(
            self.velocity_smoothing_alpha,
            defaults.velocity_smoothing_alpha,
        );

        let min_visible_area_fraction = pick(
            self.min_visible_area_fraction,
            defaults.min_visible_area_fraction,
        )
        .clamp(1.0 / (max_zoom * max_zoom), 1.0);
        let ceiling = max_zoom.min(1.0 / min_visible_area_fraction).max(1.0);

        Self {
            max_zoom,
            idle_zoom: pick(self.idle_zoom, defaults.idle_zoom).clamp(1.0, ceiling),
            base_zoom: pick(self.base_zoom, defaults.base_zoom).clamp(1.0, max_zoom),
            min_visible_area_fraction,
            safe_margin_fraction: pick(self.safe_margin_fraction, defaults.safe_margin_fraction)
                .clamp(0.0, 0.45),
            dwell_duration: positive_or(self.dwell_duration, defaults.dwell_duration),
            dwell_speed_threshold: positive_or(
                self.dwell_speed_threshold,
                defaults.dwell_speed_threshold,
            ),
            velocity_smoothing_alpha: if alpha > 0.0 {
                alpha.min(1.0)
            } else {
                defaults.velocity_smoothing_alpha
            },
            motion_intensity: pick(self.motion_intensity, defaults.motion_intensity)
                .clamp(0.0, 1.0),
            dwell_intensity: pick(self.dwell_intensity, defaults.dwell_intensity).clamp(0.0, 1.0),
            click_intensity: pick(self.click_intensity, defaults.click_intensity).clamp(0.0, 1.0),
            motion_speed_ceiling: positive_or(
                self.motion_speed_ceiling,
                defaults.motion_speed_ceiling,
            ),
            minimum_keyframe_interval: positive_or(
                self.minimum_keyframe_interval,
                defaults.minimum_keyframe_interval,
            ),
            max_pan_speed: positive_or(self.max_pan_speed, defaults.max_pan_speed),
            max_pan_acceleration: positive_or(
                self.max_pan_acceleration,
                defaults.max_pan_acceleration,
            ),
        }
    }
}

fn clamp_axis(value: f64, extent: f64, zoom: f64, margin_fraction: f64) -> f64 {
    let visible = extent / zoom;
    let margin = visible * margin_fraction.max(0.0);
    let low = visible * 0.5 + margin;
    let high = extent - visible * 0.5 - margin;
    if low > high {
        extent * 0.5
    } else {
        value.clamp(low, high)
    }
}

fn positive_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        fallback
    }
}

fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), ConstraintError> {
    if value < min || value > max {
        return Err(ConstraintError::OutOfRange {
            field,
            value,
            min,
            max,
        });
    }
    Ok(())
}

fn check_positive(field: &'static str, value: f64) -> Result<(), ConstraintError> {
    if value <= 0.0 {
        return Err(ConstraintError::NotPositive { field, value });
    }
    Ok(())
}
