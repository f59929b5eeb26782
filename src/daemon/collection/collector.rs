use std::{sync::Arc, time::Duration};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::{
    daemon::processing::SessionCommitter, utils::clock::Clock, window_api::SignalSource,
};

use super::{filter::TrackingFilter, tracker::SessionTracker};

/// The polling loop. Owns the tracker state, so ticks never overlap and nothing else can touch
/// it.
pub struct TrackingModule {
    source: Box<dyn SignalSource>,
    filter: TrackingFilter,
    tracker: SessionTracker,
    committer: SessionCommitter,
    shutdown: CancellationToken,
    poll_interval: Duration,
    time_provider: Box<dyn Clock>,
}

impl TrackingModule {
    pub fn new(
        source: Box<dyn SignalSource>,
        filter: TrackingFilter,
        tracker: SessionTracker,
        committer: SessionCommitter,
        shutdown: CancellationToken,
        poll_interval: Duration,
        time_provider: Box<dyn Clock>,
    ) -> Self {
        Self {
            source,
            filter,
            tracker,
            committer,
            shutdown,
            poll_interval,
            time_provider,
        }
    }

    /// Name of the focused application if it should be tracked. A source that can't be asked
    /// counts as nothing being focused.
    fn observe(&mut self) -> Option<Arc<str>> {
        let application = match self.source.active_application() {
            Ok(application) => application?,
            Err(e) => {
                warn!("Active application is unavailable, treating as untracked {e:?}");
                return None;
            }
        };

        if !self.filter.is_tracked_application(Some(&application)) {
            return None;
        }
        if !self.filter.is_allowed(&application.name) {
            debug!("Detected game library application {}", application.name);
        }
        Some(application.name)
    }

    async fn tick(&mut self) {
        let tracked = self.observe();
        let now = self.time_provider.time();
        if let Some(span) = self.tracker.observe(tracked.as_ref(), now) {
            self.committer.commit(span).await;
        }
    }

    async fn flush(&mut self) {
        let now = self.time_provider.time();
        if let Some(span) = self.tracker.shutdown(now) {
            info!("Logging final session for {}", span.application_name);
            self.committer.commit(span).await;
        }
    }

    /// Executes the tracking loop until shutdown, then flushes the outstanding session.
    pub async fn run(mut self) {
        let mut collection_point = self.time_provider.instant();
        loop {
            if self.shutdown.is_cancelled() {
                break;
            }
            collection_point += self.poll_interval;

            self.tick().instrument(info_span!("Tracking tick")).await;

            tokio::select! {
                biased;
                // Cancelation stops the loop between ticks, a tick in progress always
                // completes first.
                _ = self.shutdown.cancelled() => break,
                _ = self.time_provider.sleep_until(collection_point) => ()
            }
        }

        info!("Shutting down tracker");
        self.flush().await;
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use anyhow::anyhow;
    use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
    use tokio_util::sync::CancellationToken;

    use crate::{
        daemon::{
            collection::{filter::TrackingFilter, tracker::SessionTracker},
            processing::SessionCommitter,
            storage::memory::MemorySessionStore,
        },
        utils::{clock::TestClock, logging::TEST_LOGGING},
        window_api::{ActiveApplication, MockSignalSource},
    };

    use super::TrackingModule;

    const TEST_START_DATE: NaiveDateTime = NaiveDateTime::new(
        NaiveDate::from_ymd_opt(2018, 7, 4).unwrap(),
        NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
    );

    const POLL: u64 = 10;

    enum Sample {
        Focused(&'static str),
        Nothing,
        Unavailable,
    }

    /// `samples` are returned one per tick, the last one repeats.
    fn source(samples: Vec<Sample>, ticks: usize) -> MockSignalSource {
        let mut source = MockSignalSource::new();
        let mut index = 0;
        source
            .expect_active_application()
            .times(ticks)
            .returning(move || {
                let sample = &samples[index.min(samples.len() - 1)];
                index += 1;
                match sample {
                    Sample::Focused(name) => Ok(Some(ActiveApplication {
                        name: (*name).into(),
                        executable: None,
                    })),
                    Sample::Nothing => Ok(None),
                    Sample::Unavailable => Err(anyhow!("display is gone")),
                }
            });
        source
    }

    fn repeat(sample: fn() -> Sample, count: usize) -> impl Iterator<Item = Sample> {
        (0..count).map(move |_| sample())
    }

    fn module(
        source: MockSignalSource,
        store: &Arc<MemorySessionStore>,
        shutdown: &CancellationToken,
    ) -> TrackingModule {
        let clock = TestClock::starting_at(Local.from_local_datetime(&TEST_START_DATE).unwrap());
        TrackingModule::new(
            Box::new(source),
            TrackingFilter::new(["x.exe", "y.exe"], None),
            SessionTracker::new(chrono::Duration::seconds(120)),
            SessionCommitter::new(
                Box::new(store.clone()),
                "user".into(),
                chrono::Duration::seconds(180),
                Duration::from_secs(10),
            ),
            shutdown.clone(),
            Duration::from_secs(POLL),
            Box::new(clock),
        )
    }

    async fn run_until(module: TrackingModule, shutdown: CancellationToken, seconds: u64) {
        tokio::join!(
            async {
                tokio::time::sleep(Duration::from_secs(seconds)).await;
                shutdown.cancel();
            },
            module.run(),
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_flushes_active_session() {
        *TEST_LOGGING;
        let store = Arc::new(MemorySessionStore::new());
        let shutdown = CancellationToken::new();
        // Ticks at 0, 10, ..., 200.
        let source = source(vec![Sample::Focused("x.exe")], 21);

        run_until(module(source, &store, &shutdown), shutdown, 205).await;

        let records = store.records();
        assert_eq!(records.len(), 1);
        assert_eq!(&*records[0].application_name, "x.exe");
        assert_eq!(records[0].duration, "00:03:25");
        assert_eq!(records[0].start_time, TEST_START_DATE.time());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_drops_session_in_grace() {
        *TEST_LOGGING;
        let store = Arc::new(MemorySessionStore::new());
        let shutdown = CancellationToken::new();
        let samples = repeat(|| Sample::Focused("x.exe"), 20)
            .chain([Sample::Nothing])
            .collect();
        // Focused from 0 to 190, grace from 200, shutdown at 255.
        let source = source(samples, 26);

        run_until(module(source, &store, &shutdown), shutdown, 255).await;

        assert!(store.records().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_session_ended_by_grace_never_reaches_store() {
        *TEST_LOGGING;
        let store = Arc::new(MemorySessionStore::new());
        let shutdown = CancellationToken::new();
        let samples = [Sample::Focused("x.exe")]
            .into_iter()
            .chain(repeat(|| Sample::Nothing, 14))
            .chain([Sample::Focused("y.exe")])
            .collect();
        // x only at 0, gone from 10. Grace expires at 140 leaving 10s of x, below the 180s
        // minimum. y from 150 until shutdown at 355.
        let source = source(samples, 36);

        run_until(module(source, &store, &shutdown), shutdown, 355).await;

        let records = store.records();
        assert_eq!(store.append_calls(), 1);
        assert_eq!(records.len(), 1);
        assert_eq!(&*records[0].application_name, "y.exe");
        assert_eq!(records[0].duration, "00:03:25");
    }

    #[tokio::test(start_paused = true)]
    async fn test_switching_apps_commits_previous() {
        *TEST_LOGGING;
        let store = Arc::new(MemorySessionStore::new());
        let shutdown = CancellationToken::new();
        let samples = repeat(|| Sample::Focused("x.exe"), 30)
            .chain([Sample::Focused("y.exe")])
            .collect();
        // x from 0, y from 300, shutdown at 405 leaves y with 105s which is too short.
        let source = source(samples, 41);

        run_until(module(source, &store, &shutdown), shutdown, 405).await;

        let records = store.records();
        assert_eq!(records.len(), 1);
        assert_eq!(&*records[0].application_name, "x.exe");
        assert_eq!(records[0].duration, "00:05:00");
    }

    #[tokio::test(start_paused = true)]
    async fn test_brief_interruption_is_bridged() {
        *TEST_LOGGING;
        let store = Arc::new(MemorySessionStore::new());
        let shutdown = CancellationToken::new();
        let samples = [Sample::Focused("x.exe"), Sample::Nothing]
            .into_iter()
            .chain([Sample::Focused("x.exe")])
            .chain(repeat(|| Sample::Focused("x.exe"), 17))
            .chain([Sample::Nothing])
            .collect();
        // x at 0, gone at 10, back at 20 until 190, gone from 200. Grace expires at 330.
        let source = source(samples, 36);

        run_until(module(source, &store, &shutdown), shutdown, 355).await;

        let records = store.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].duration, "00:03:20");
        assert_eq!(records[0].end_time, TEST_START_DATE.time() + chrono::Duration::seconds(200));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unavailable_source_counts_as_untracked() {
        *TEST_LOGGING;
        let store = Arc::new(MemorySessionStore::new());
        let shutdown = CancellationToken::new();
        let samples = repeat(|| Sample::Focused("x.exe"), 30)
            .chain([Sample::Unavailable])
            .collect();
        // Unavailable from 300, grace expires at 430, loop keeps going until 445.
        let source = source(samples, 45);

        run_until(module(source, &store, &shutdown), shutdown, 445).await;

        let records = store.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].duration, "00:05:00");
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_append_does_not_stop_tracking() {
        *TEST_LOGGING;
        let store = Arc::new(MemorySessionStore::new());
        store.set_failing(true);
        let shutdown = CancellationToken::new();

        let mut signal = MockSignalSource::new();
        let mut tick = 0;
        let toggled = store.clone();
        signal
            .expect_active_application()
            .times(51)
            .returning(move || {
                tick += 1;
                // The switch to y at 300 fails to store x, afterwards the store recovers.
                if tick == 32 {
                    toggled.set_failing(false);
                }
                let name = if tick <= 30 { "x.exe" } else { "y.exe" };
                Ok(Some(ActiveApplication {
                    name: name.into(),
                    executable: None,
                }))
            });

        run_until(module(signal, &store, &shutdown), shutdown, 505).await;

        let records = store.records();
        assert_eq!(records.len(), 1);
        assert_eq!(&*records[0].application_name, "y.exe");
        assert_eq!(records[0].duration, "00:03:25");
    }
}
