pub mod events;
pub mod geometry;
pub mod plan;
pub mod settings;
