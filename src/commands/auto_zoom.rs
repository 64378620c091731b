//! auto_zoom: точка входа хоста (настройки, ограничения, маппинг, кэш, план).

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

use crate::algorithm::camera_planner::{self, CancellationFlag};
use crate::algorithm::constraints::ZoomConstraints;
use crate::algorithm::coordinate_mapper::map_events_to_asset_space;
use crate::algorithm::plan_cache::{cache_key, PlanCache, SharedPlanCache};
use crate::error::AutoZoomError;
use crate::models::events::{EventsFile, InputEvent};
use crate::models::plan::CameraPlan;
use crate::models::settings::{AssetGeometry, AutoZoomSettings, CaptureMetadata};

/// Всё, что хост знает о таймлайне в момент запроса плана.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanRequest {
    /// Сырые события в координатах захвата, в любом порядке.
    pub events: Vec<InputEvent>,
    #[serde(default)]
    pub settings: AutoZoomSettings,
    #[serde(default)]
    pub capture_metadata: Option<CaptureMetadata>,
    pub asset: AssetGeometry,
}

enum PlanOutcome {
    Disabled,
    Cancelled,
    Ready(Arc<CameraPlan>),
}

/// Разбирает events.json и возвращает события (схема проверяется).
pub fn load_events(raw: &str) -> Result<Vec<InputEvent>, AutoZoomError> {
    let file = EventsFile::from_json(raw)?;
    log::info!("load_events: {} events", file.events.len());
    Ok(file.events)
}

/// Синхронно строит (или достаёт из кэша) план камеры.
///
/// Возвращает `None`, если авто-зум выключен в `settings`: тогда ассет
/// рендерится без виртуальной камеры.
pub fn build_camera_plan(
    request: &PlanRequest,
    cache: &Mutex<PlanCache>,
) -> Option<Arc<CameraPlan>> {
    match run_request(request, cache, &CancellationFlag::new()) {
        PlanOutcome::Ready(plan) => Some(plan),
        PlanOutcome::Disabled | PlanOutcome::Cancelled => None,
    }
}

fn run_request(
    request: &PlanRequest,
    cache: &Mutex<PlanCache>,
    cancel: &CancellationFlag,
) -> PlanOutcome {
    let settings = request.settings.sanitized();
    if !settings.is_enabled {
        log::debug!("build_camera_plan: auto-zoom disabled");
        return PlanOutcome::Disabled;
    }

    let constraints = ZoomConstraints::for_settings(&settings);
    let source_size = request.asset.pixel_size();
    let duration = request.asset.duration;
    let events = map_events_to_asset_space(
        &request.events,
        request.capture_metadata.as_ref(),
        source_size,
    );

    let key = cache_key(&events, &constraints, duration, source_size);
    if let Some(plan) = lock(cache).get(key) {
        log::debug!("build_camera_plan: cache hit {:016x}", key.0);
        return PlanOutcome::Ready(plan);
    }

    let Some(plan) = camera_planner::plan_with_cancellation(
        &events,
        source_size,
        duration,
        &constraints,
        cancel,
    ) else {
        return PlanOutcome::Cancelled;
    };

    log::info!(
        "build_camera_plan: {} events -> {} keyframes (intensity={:.2}, {}x{}, {:.3}s)",
        events.len(),
        plan.keyframes.len(),
        settings.intensity,
        source_size.width,
        source_size.height,
        duration
    );

    let plan = Arc::new(plan);
    lock(cache).put(key, Arc::clone(&plan));
    PlanOutcome::Ready(plan)
}

/// Отравленный мьютекс не портит кэш: продолжаем с теми же данными.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default)]
struct WorkerState {
    generation: u64,
    in_flight: Option<CancellationFlag>,
}

/// Фоновый планировщик для редактора: новый запрос отменяет предыдущий.
#[derive(Debug, Clone)]
pub struct AutoZoomWorker {
    cache: SharedPlanCache,
    state: Arc<Mutex<WorkerState>>,
}

impl Default for AutoZoomWorker {
    fn default() -> Self {
        Self::new()
    }
}

impl AutoZoomWorker {
    pub fn new() -> Self {
        Self::with_cache(PlanCache::shared())
    }

    pub fn with_cache(cache: SharedPlanCache) -> Self {
        Self {
            cache,
            state: Arc::new(Mutex::new(WorkerState::default())),
        }
    }

    pub fn cache(&self) -> SharedPlanCache {
        Arc::clone(&self.cache)
    }

    /// Ставит планирование в blocking-пул tokio.
    ///
    /// Запрос регистрируется в момент вызова, а не при первом poll future:
    /// предыдущий незавершённый запрос сразу отменяется и завершится
    /// [`AutoZoomError::Superseded`]. `Ok(None)` означает выключенный авто-зум.
    pub fn request_plan(
        &self,
        request: PlanRequest,
    ) -> impl Future<Output = Result<Option<Arc<CameraPlan>>, AutoZoomError>> + Send + 'static
    {
        let cancel = CancellationFlag::new();
        let generation = {
            let mut state = lock(&self.state);
            if let Some(previous) = state.in_flight.replace(cancel.clone()) {
                previous.cancel();
            }
            state.generation += 1;
            state.generation
        };
        log::debug!("request_plan: generation {generation} scheduled");

        let cache = Arc::clone(&self.cache);
        let state = Arc::clone(&self.state);

        async move {
            let task_cancel = cancel.clone();
            let outcome =
                tokio::task::spawn_blocking(move || run_request(&request, &cache, &task_cancel))
                    .await
                    .map_err(|err| {
                        log::error!("request_plan: worker task failed: {err}");
                        AutoZoomError::Worker(err.to_string())
                    })?;

            let is_current = {
                let mut state = lock(&state);
                let is_current = state.generation == generation;
                if is_current {
                    state.in_flight = None;
                }
                is_current
            };

            match outcome {
                PlanOutcome::Cancelled => Err(AutoZoomError::Superseded),
                _ if !is_current || cancel.is_cancelled() => Err(AutoZoomError::Superseded),
                PlanOutcome::Disabled => Ok(None),
                PlanOutcome::Ready(plan) => Ok(Some(plan)),
            }
        }
    }

    /// Отменяет текущий запрос (например, при закрытии проекта).
    pub fn cancel_pending(&self) {
        let mut state = lock(&self.state);
        if let Some(in_flight) = state.in_flight.take() {
            in_flight.cancel();
        }
        state.generation += 1;
    }
}
