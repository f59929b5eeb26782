use std::sync::Arc;

use anyhow::Result;
use collection::{collector::TrackingModule, tracker::SessionTracker};
use processing::SessionCommitter;
use storage::session_storage::SessionSink;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::{
    config::{StoreArgs, TrackerSettings, TrackingArgs},
    utils::clock::{Clock, DefaultClock},
    window_api::{GenericSignalSource, SignalSource},
};

pub mod args;
pub mod collection;
pub mod processing;
pub mod shutdown;
pub mod storage;

/// Represents the starting point for the daemon. Runs until an interrupt or termination
/// signal, then stores the session that was in progress.
pub async fn start_daemon(store: &StoreArgs, tracking: &TrackingArgs) -> Result<()> {
    let source = GenericSignalSource::new()?;
    let sink = store.open()?;
    let settings = tracking.settings();
    info!(
        "Tracking as {} every {:?}, grace period {}s, minimum session {}s",
        settings.user_id,
        settings.poll_interval,
        settings.grace_period.num_seconds(),
        settings.min_session.num_seconds()
    );

    let shutdown_token = CancellationToken::new();

    let tracker = create_tracker(source, sink, settings, &shutdown_token, DefaultClock);

    tokio::join!(
        shutdown::detect_shutdown(shutdown_token.clone()),
        tracker.run(),
    );

    info!("Tracker stopped");
    Ok(())
}

fn create_tracker(
    source: impl SignalSource + 'static,
    sink: Box<dyn SessionSink>,
    settings: TrackerSettings,
    shutdown_token: &CancellationToken,
    clock: impl Clock,
) -> TrackingModule {
    let committer = SessionCommitter::new(
        sink,
        Arc::clone(&settings.user_id),
        settings.min_session,
        settings.sink_timeout,
    );
    TrackingModule::new(
        Box::new(source),
        settings.filter,
        SessionTracker::new(settings.grace_period),
        committer,
        shutdown_token.clone(),
        settings.poll_interval,
        Box::new(clock),
    )
}
