//! Схема событий ввода (events.json).
//! schemaVersion: 1

use serde::{Deserialize, Serialize};

use crate::error::AutoZoomError;
use crate::models::geometry::Point;

pub const SCHEMA_VERSION: u32 = 1;

/// Тип события ввода.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventKind {
    CursorMoved,
    MouseDown,
    MouseUp,
}

impl EventKind {
    pub fn is_button(self) -> bool {
        matches!(self, EventKind::MouseDown | EventKind::MouseUp)
    }
}

/// Кнопка мыши.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    Left,
    Right,
    Other,
}

/// Одно наблюдённое событие ввода.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputEvent {
    pub kind: EventKind,
    /// Секунды от начала записи. Порядок в логе не гарантирован.
    pub timestamp: f64,
    /// Глобальные экранные координаты на момент захвата.
    pub position: Point,
    /// Только для mouseDown / mouseUp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub button: Option<MouseButton>,
}

impl InputEvent {
    pub fn moved(timestamp: f64, x: f64, y: f64) -> Self {
        Self {
            kind: EventKind::CursorMoved,
            timestamp,
            position: Point::new(x, y),
            button: None,
        }
    }

    pub fn down(timestamp: f64, x: f64, y: f64, button: MouseButton) -> Self {
        Self {
            kind: EventKind::MouseDown,
            timestamp,
            position: Point::new(x, y),
            button: Some(button),
        }
    }

    pub fn up(timestamp: f64, x: f64, y: f64, button: MouseButton) -> Self {
        Self {
            kind: EventKind::MouseUp,
            timestamp,
            position: Point::new(x, y),
            button: Some(button),
        }
    }

    /// Временная метка, пригодная для сортировки: NaN/∞ → 0.
    pub fn sort_time(&self) -> f64 {
        if self.timestamp.is_finite() {
            self.timestamp
        } else {
            0.0
        }
    }
}

/// Корневой контейнер файла events.json.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventsFile {
    pub schema_version: u32,
    #[serde(default)]
    pub events: Vec<InputEvent>,
}

impl EventsFile {
    /// Разбирает events.json и отклоняет незнакомую версию схемы.
    pub fn from_json(raw: &str) -> Result<Self, AutoZoomError> {
        let file: EventsFile = serde_json::from_str(raw)?;
        if file.schema_version != SCHEMA_VERSION {
            return Err(AutoZoomError::UnsupportedSchema {
                expected: SCHEMA_VERSION,
                actual: file.schema_version,
            });
        }
        Ok(file)
    }
}
