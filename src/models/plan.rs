//! Выходной артефакт планировщика: путь виртуальной камеры.

use serde::{Deserialize, Serialize};

use crate::models::geometry::Point;

/// Одна опорная точка пути камеры.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraKeyframe {
    /// Секунды, в пределах `[0, duration]`.
    pub time: f64,
    pub zoom: f64,
    /// Центр кадрирования в пикселях исходника, уже зажатый для `zoom`.
    pub center: Point,
}

/// Упорядоченный по времени план; `keyframes` никогда не пуст.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraPlan {
    pub duration: f64,
    pub keyframes: Vec<CameraKeyframe>,
}

impl CameraPlan {
    pub fn first(&self) -> Option<&CameraKeyframe> {
        self.keyframes.first()
    }

    pub fn last(&self) -> Option<&CameraKeyframe> {
        self.keyframes.last()
    }
}
