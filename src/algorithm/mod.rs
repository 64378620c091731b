pub mod attention;
pub mod camera_planner;
pub mod constraints;
pub mod coordinate_mapper;
pub mod plan_cache;
