use std::{sync::Arc, time::Duration as StdDuration};

use chrono::Duration;
use tracing::{debug, error, info, instrument};

use crate::{
    daemon::{
        collection::tracker::SessionSpan,
        storage::{
            entities::{Session, SessionRecord},
            session_storage::SessionSink,
        },
    },
    error::SinkError,
    utils::time::format_hms,
};

#[derive(Debug)]
pub enum CommitOutcome {
    Stored(SessionRecord),
    /// Not longer than the minimum session duration, so it never reached the sink.
    TooShort(Duration),
    /// The session is lost. There are no retries.
    Failed(SinkError),
}

/// Turns spans coming out of the tracker into stored sessions. This is where the minimum
/// session duration is enforced and where slow stores are cut off.
pub struct SessionCommitter {
    sink: Box<dyn SessionSink>,
    user_id: Arc<str>,
    min_duration: Duration,
    timeout: StdDuration,
}

impl SessionCommitter {
    pub fn new(
        sink: Box<dyn SessionSink>,
        user_id: Arc<str>,
        min_duration: Duration,
        timeout: StdDuration,
    ) -> Self {
        Self {
            sink,
            user_id,
            min_duration,
            timeout,
        }
    }

    #[instrument(skip_all, fields(app = %span.application_name))]
    pub async fn commit(&self, span: SessionSpan) -> CommitOutcome {
        let session = Session::new(self.user_id.clone(), span);
        let duration = session.duration();

        if duration <= self.min_duration {
            debug!(
                "Skipped (too short): {} - {}s",
                session.application_name,
                duration.num_seconds()
            );
            return CommitOutcome::TooShort(duration);
        }

        let record = session.to_record();
        let result = match tokio::time::timeout(self.timeout, self.sink.append(&record)).await {
            Ok(result) => result,
            Err(_) => Err(SinkError::Timeout(self.timeout)),
        };

        match result {
            Ok(()) => {
                info!(
                    "Logged: {} - {}",
                    record.application_name,
                    format_hms(duration)
                );
                CommitOutcome::Stored(record)
            }
            Err(e) => {
                error!("Error logging {}: {e}", record.application_name);
                CommitOutcome::Failed(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration as StdDuration};

    use chrono::{DateTime, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};

    use crate::{
        daemon::{collection::tracker::SessionSpan, storage::memory::MemorySessionStore},
        error::SinkError,
    };

    use super::{CommitOutcome, SessionCommitter};

    const TEST_START_DATE: NaiveDateTime = NaiveDateTime::new(
        NaiveDate::from_ymd_opt(2018, 7, 4).unwrap(),
        NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
    );

    fn at(seconds: i64) -> DateTime<Local> {
        Local.from_local_datetime(&TEST_START_DATE).unwrap() + Duration::seconds(seconds)
    }

    fn span(seconds: i64) -> SessionSpan {
        SessionSpan {
            application_name: "Code.exe".into(),
            start: at(0),
            end: at(seconds),
        }
    }

    fn committer(store: &Arc<MemorySessionStore>, min_seconds: i64) -> SessionCommitter {
        SessionCommitter::new(
            Box::new(store.clone()),
            "user".into(),
            Duration::seconds(min_seconds),
            StdDuration::from_secs(10),
        )
    }

    #[tokio::test]
    async fn test_commit_stores_long_session() {
        let store = Arc::new(MemorySessionStore::new());
        let outcome = committer(&store, 180).commit(span(300)).await;

        assert!(matches!(outcome, CommitOutcome::Stored(_)));
        let records = store.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].duration, "00:05:00");
        assert_eq!(&*records[0].user_id, "user");
        assert_eq!(&*records[0].application_name, "Code.exe");
    }

    #[tokio::test]
    async fn test_commit_never_stores_short_sessions() {
        for threshold in [0, 1, 59, 120, 180, 3600] {
            for length in [0, 1, threshold - 1, threshold, threshold + 1, threshold * 2] {
                if length < 0 {
                    continue;
                }
                let store = Arc::new(MemorySessionStore::new());
                let outcome = committer(&store, threshold).commit(span(length)).await;
                let stored = !store.records().is_empty();

                assert_eq!(stored, length > threshold, "threshold {threshold} length {length}");
                assert_eq!(
                    matches!(outcome, CommitOutcome::TooShort(_)),
                    length <= threshold
                );
            }
        }
    }

    #[tokio::test]
    async fn test_commit_failure_is_reported() {
        let store = Arc::new(MemorySessionStore::new());
        store.set_failing(true);
        let outcome = committer(&store, 0).commit(span(300)).await;

        assert!(matches!(outcome, CommitOutcome::Failed(SinkError::Write(_))));
        assert!(store.records().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_commit_times_out_slow_store() {
        let store = Arc::new(MemorySessionStore::stalling(StdDuration::from_secs(60)));
        let outcome = committer(&store, 0).commit(span(300)).await;

        assert!(matches!(outcome, CommitOutcome::Failed(SinkError::Timeout(_))));
        assert!(store.records().is_empty());
    }
}
