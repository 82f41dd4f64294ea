//! Timers that drive the engine. The core operations know nothing about
//! time sources; this module decides when to call them.

use chrono::Utc;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{interval, Duration, MissedTickBehavior};

use crate::dispatch::{run_dispatch_pass, DispatchReport, DispatchSettings};
use crate::ingestion::{run_ingestion_cycle, IngestionReport, IngestionSettings};
use crate::platforms::PlatformAdapter;
use crate::services::Sinks;
use crate::shifts::{run_shift_rotation, RotationReport, ShiftSchedule};
use crate::store::{Store, StoreError};

/// Everything one engine instance needs. Cheap to clone.
///
/// Each job kind holds its own lock, so a manual trigger never overlaps a
/// scheduled run of the same kind. Different kinds may run concurrently.
#[derive(Clone)]
pub struct Engine {
    pub store: Arc<dyn Store>,
    pub adapters: Arc<Vec<Arc<dyn PlatformAdapter>>>,
    pub sinks: Sinks,
    pub schedule: ShiftSchedule,
    pub ingestion: IngestionSettings,
    pub dispatch: DispatchSettings,
    ingestion_lock: Arc<Mutex<()>>,
    dispatch_lock: Arc<Mutex<()>>,
    rotation_lock: Arc<Mutex<()>>,
}

impl Engine {
    pub fn new(
        store: Arc<dyn Store>,
        adapters: Vec<Arc<dyn PlatformAdapter>>,
        sinks: Sinks,
        schedule: ShiftSchedule,
        ingestion: IngestionSettings,
        dispatch: DispatchSettings,
    ) -> Self {
        Self {
            store,
            adapters: Arc::new(adapters),
            sinks,
            schedule,
            ingestion,
            dispatch,
            ingestion_lock: Arc::new(Mutex::new(())),
            dispatch_lock: Arc::new(Mutex::new(())),
            rotation_lock: Arc::new(Mutex::new(())),
        }
    }

    pub async fn ingest_now(&self) -> IngestionReport {
        let _guard = self.ingestion_lock.lock().await;
        run_ingestion_cycle(
            self.store.as_ref(),
            &self.adapters,
            &self.sinks,
            &self.ingestion,
            Utc::now(),
        )
        .await
    }

    pub async fn dispatch_now(&self) -> Result<DispatchReport, StoreError> {
        let _guard = self.dispatch_lock.lock().await;
        run_dispatch_pass(self.store.as_ref(), &self.sinks, &self.dispatch, Utc::now()).await
    }

    pub async fn rotate_now(&self) -> Result<RotationReport, StoreError> {
        let _guard = self.rotation_lock.lock().await;
        run_shift_rotation(self.store.as_ref(), &self.sinks, &self.schedule, Utc::now()).await
    }
}

/// Poll every account on a fixed interval.
pub async fn run_ingestion_loop(engine: Engine, interval_secs: u64) {
    let mut ticker = interval(Duration::from_secs(interval_secs.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tracing::info!(
        interval_secs,
        accounts = engine.adapters.len(),
        "Ingestion loop started"
    );

    loop {
        ticker.tick().await;
        engine.ingest_now().await;
    }
}

/// Run a dispatch pass on a fixed interval.
pub async fn run_dispatch_loop(engine: Engine, interval_secs: u64) {
    let mut ticker = interval(Duration::from_secs(interval_secs.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tracing::info!(interval_secs, "Dispatch loop started");

    loop {
        ticker.tick().await;
        if let Err(e) = engine.dispatch_now().await {
            tracing::error!(error = %e, "Dispatch pass failed");
        }
    }
}

/// Sleep until each local shift boundary (08:00, 15:00, 21:00) and rotate.
pub async fn run_rotation_loop(engine: Engine) {
    tracing::info!(offset = %engine.schedule.offset(), "Shift rotation loop started");

    loop {
        let now = Utc::now();
        let next = engine.schedule.next_boundary(now);
        let wait = (next - now).to_std().unwrap_or(Duration::from_secs(1));
        tracing::debug!(next = %next, wait_secs = wait.as_secs(), "Waiting for next shift boundary");

        tokio::time::sleep(wait).await;

        if let Err(e) = engine.rotate_now().await {
            tracing::error!(error = %e, "Shift rotation failed");
        }
    }
}
