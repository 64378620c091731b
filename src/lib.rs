//! Авто-зум: из лога ввода (курсор, клики) строит путь виртуальной камеры
//! поверх записанного экрана.

pub mod algorithm;
pub mod commands;
pub mod error;
pub mod models;

pub use algorithm::camera_planner::{plan, plan_with_cancellation, CancellationFlag};
pub use algorithm::constraints::ZoomConstraints;
pub use algorithm::plan_cache::{cache_key, PlanCache, PlanCacheKey, SharedPlanCache};
pub use commands::auto_zoom::{build_camera_plan, load_events, AutoZoomWorker, PlanRequest};
pub use error::{AutoZoomError, ConstraintError};
pub use models::plan::{CameraKeyframe, CameraPlan};
