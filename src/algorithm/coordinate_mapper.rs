use crate::models::events::InputEvent;
use crate::models::geometry::{Point, Size};
use crate::models::settings::CaptureMetadata;

/// Projects capture-surface positions into the pixel space of the decoded asset.
///
/// Without usable metadata the events are returned unmapped (best-effort fallback).
pub fn map_events_to_asset_space(
    events: &[InputEvent],
    capture_metadata: Option<&CaptureMetadata>,
    asset_pixel_size: Size,
) -> Vec<InputEvent> {
    let Some(metadata) = capture_metadata else {
        log::debug!("map_events_to_asset_space: no capture metadata, passing events through");
        return events.to_vec();
    };

    if !is_mappable(metadata, asset_pixel_size) {
        log::warn!(
            "map_events_to_asset_space: unusable geometry (contentRect={:?}, pixelScale={}, asset={}x{}), passing events through",
            metadata.content_rect,
            metadata.pixel_scale,
            asset_pixel_size.width,
            asset_pixel_size.height
        );
        return events.to_vec();
    }

    events
        .iter()
        .map(|event| InputEvent {
            position: project_point(event.position, metadata, asset_pixel_size),
            ..*event
        })
        .collect()
}

/// Single-position variant of [`map_events_to_asset_space`].
pub fn map_point(
    position: Point,
    capture_metadata: Option<&CaptureMetadata>,
    asset_pixel_size: Size,
) -> Point {
    match capture_metadata {
        Some(metadata) if is_mappable(metadata, asset_pixel_size) => {
            project_point(position, metadata, asset_pixel_size)
        }
        _ => position,
    }
}

fn is_mappable(metadata: &CaptureMetadata, asset_pixel_size: Size) -> bool {
    !metadata.content_rect.is_empty()
        && metadata.pixel_scale.is_finite()
        && metadata.pixel_scale > 0.0
        && asset_pixel_size.is_positive()
}

fn project_point(position: Point, metadata: &CaptureMetadata, asset: Size) -> Point {
    let rect = metadata.content_rect;
    let descriptor = metadata.descriptor_pixel_size();

    let local_x = position.x - rect.x;
    // Screen origin is bottom-left, asset origin is top-left.
    let local_y = rect.height - (position.y - rect.y);

    let scale_x = metadata.pixel_scale * (asset.width / descriptor.width);
    let scale_y = metadata.pixel_scale * (asset.height / descriptor.height);

    Point::new(
        pin_to_extent(local_x * scale_x, asset.width),
        pin_to_extent(local_y * scale_y, asset.height),
    )
}

fn pin_to_extent(value: f64, extent: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    value.clamp(0.0, extent)
}
