//! Настройки авто-зума и метаданные захвата, приходящие из состояния проекта.

use serde::{Deserialize, Serialize};

use crate::models::geometry::{Rect, Size};

pub const DEFAULT_INTENSITY: f64 = 0.55;
pub const DEFAULT_MIN_KEYFRAME_INTERVAL: f64 = 0.15;
/// Нижняя граница интервала между ключевыми кадрами (секунды).
pub const MIN_KEYFRAME_INTERVAL_FLOOR: f64 = 0.01;

/// Пользовательские настройки авто-зума (часть project state).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AutoZoomSettings {
    pub is_enabled: bool,
    /// 0.0 = без зума, 1.0 = максимальный.
    pub intensity: f64,
    /// Секунды.
    pub minimum_keyframe_interval: f64,
}

impl Default for AutoZoomSettings {
    fn default() -> Self {
        Self {
            is_enabled: false,
            intensity: DEFAULT_INTENSITY,
            minimum_keyframe_interval: DEFAULT_MIN_KEYFRAME_INTERVAL,
        }
    }
}

impl AutoZoomSettings {
    pub fn sanitized(self) -> Self {
        let intensity = if self.intensity.is_finite() {
            self.intensity.clamp(0.0, 1.0)
        } else {
            DEFAULT_INTENSITY
        };
        let minimum_keyframe_interval = if self.minimum_keyframe_interval.is_finite() {
            self.minimum_keyframe_interval
                .max(MIN_KEYFRAME_INTERVAL_FLOOR)
        } else {
            DEFAULT_MIN_KEYFRAME_INTERVAL
        };

        Self {
            is_enabled: self.is_enabled,
            intensity,
            minimum_keyframe_interval,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureSource {
    Display,
    Window,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureWindow {
    pub id: u64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub app_name: Option<String>,
}

/// Геометрия поверхности захвата на момент записи.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureMetadata {
    pub source: CaptureSource,
    #[serde(default)]
    pub window: Option<CaptureWindow>,
    /// Прямоугольник контента в координатах поверхности захвата (origin снизу слева).
    pub content_rect: Rect,
    #[serde(default = "default_pixel_scale")]
    pub pixel_scale: f64,
}

fn default_pixel_scale() -> f64 {
    1.0
}

impl CaptureMetadata {
    /// Пиксельный размер кадра, который описывал дескриптор захвата.
    pub fn descriptor_pixel_size(&self) -> Size {
        Size::new(
            self.content_rect.width * self.pixel_scale,
            self.content_rect.height * self.pixel_scale,
        )
    }
}

/// Натуральная геометрия декодированного ассета.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetGeometry {
    pub width: f64,
    pub height: f64,
    /// Секунды.
    pub duration: f64,
}

impl AssetGeometry {
    pub fn pixel_size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}
