//! Background save-and-render pipeline.
//!
//! Every qualifying change enqueues one job. Jobs run concurrently, one
//! remote call each, and are stamped with a generation in enqueue order.
//! A response older than one already displayed is dropped, so a slow early
//! request can never overwrite a newer plot. Failures are logged and not
//! retried.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use time::OffsetDateTime;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info};

use crate::api::{GateApi, PlotUpdateRequest};
use crate::events::GateEvent;

/// One save-and-render request with the tree snapshot taken when the
/// triggering change was made.
#[derive(Debug, Clone)]
pub(crate) struct RefreshJob {
    pub trigger: GateEvent,
    pub request: PlotUpdateRequest,
    /// Used when the server does not return a plot key of its own.
    pub plot_key: String,
}

/// Cache-busting plot version: the current time in unix milliseconds.
#[must_use]
pub fn plot_version() -> u64 {
    let millis = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
    u64::try_from(millis).unwrap_or_default()
}

/// Spawn the pipeline task and return its queue. The task ends when every
/// sender is dropped. Must be called within a Tokio runtime.
pub(crate) fn spawn_refresh_pipeline(
    api: Arc<dyn GateApi>,
    events: broadcast::Sender<GateEvent>,
) -> mpsc::UnboundedSender<RefreshJob> {
    let (tx, mut rx) = mpsc::unbounded_channel::<RefreshJob>();

    tokio::spawn(async move {
        let displayed = Arc::new(AtomicU64::new(0));
        let mut generation = 0u64;

        while let Some(job) = rx.recv().await {
            generation += 1;
            debug!(generation, trigger = ?job.trigger, "plot refresh queued");
            tokio::spawn(run_refresh(Arc::clone(&api), events.clone(), Arc::clone(&displayed), generation, job));
        }
        debug!("plot refresh pipeline closed");
    });

    tx
}

async fn run_refresh(
    api: Arc<dyn GateApi>,
    events: broadcast::Sender<GateEvent>,
    displayed: Arc<AtomicU64>,
    generation: u64,
    job: RefreshJob,
) {
    let update = match api.update_gate_plot(&job.request).await {
        Ok(update) => update,
        Err(err) => {
            error!(error = %err, generation, trigger = ?job.trigger, "plot refresh failed");
            return;
        }
    };

    let newest = displayed.fetch_max(generation, Ordering::SeqCst);
    if newest > generation {
        debug!(generation, newest, "stale plot refresh dropped");
        return;
    }

    let plot_key = update.plot_key.unwrap_or(job.plot_key);
    let version = plot_version();
    info!(generation, %plot_key, version, "plot refreshed");
    if events.send(GateEvent::PlotRefreshed { plot_key, version }).is_err() {
        debug!(generation, "plot refreshed with no subscribers");
    }
}
