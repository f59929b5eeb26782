use std::{collections::HashMap, fmt::Write, sync::Arc};

use chrono::{Duration, NaiveDate};
use tracing::warn;

use crate::{
    daemon::storage::{
        entities::SessionRecord,
        session_storage::{SessionFilter, SessionSink},
    },
    utils::time::format_hours,
};

#[derive(Debug, PartialEq, Eq)]
pub struct ApplicationUsage {
    pub application_name: Arc<str>,
    pub duration: Duration,
}

/// Per-application totals, largest first, and the number of records whose duration couldn't
/// be read.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct UsageSummary {
    pub usages: Vec<ApplicationUsage>,
    pub skipped: usize,
}

impl UsageSummary {
    pub fn total(&self) -> Duration {
        self.usages
            .iter()
            .fold(Duration::zero(), |acc, v| acc + v.duration)
    }
}

pub fn aggregate(records: &[SessionRecord]) -> UsageSummary {
    let mut map = HashMap::<Arc<str>, Duration>::new();
    let mut skipped = 0;

    for record in records {
        match record.duration() {
            Ok(duration) => {
                *map.entry(record.application_name.clone())
                    .or_insert_with(Duration::zero) += duration;
            }
            Err(e) => {
                warn!("Skipping record of {}: {e}", record.application_name);
                skipped += 1;
            }
        }
    }

    let mut usages = map
        .into_iter()
        .map(|(application_name, duration)| ApplicationUsage {
            application_name,
            duration,
        })
        .collect::<Vec<_>>();
    usages.sort_by(|a, b| {
        b.duration
            .cmp(&a.duration)
            .then_with(|| a.application_name.cmp(&b.application_name))
    });

    UsageSummary { usages, skipped }
}

fn skipped_footer(output: &mut String, skipped: usize) {
    if skipped > 0 {
        let _ = write!(
            output,
            "\n(skipped {skipped} records with unreadable durations)"
        );
    }
}

fn usage_list(output: &mut String, usages: &[ApplicationUsage]) {
    for usage in usages {
        let _ = write!(
            output,
            "\n• {}: {} hours",
            usage.application_name,
            format_hours(usage.duration)
        );
    }
}

/// Total time spent in a single application.
pub async fn application_usage(sink: &dyn SessionSink, application: &str) -> String {
    let records = match sink.query(&SessionFilter::for_application(application)).await {
        Ok(v) => v,
        Err(e) => return format!("Error fetching stats: {e}"),
    };

    let summary = aggregate(&records);
    if summary.usages.is_empty() {
        let mut output = format!("No data found for **{application}**");
        skipped_footer(&mut output, summary.skipped);
        return output;
    }

    let mut output = format!(
        "**{application}**: {} hours total",
        format_hours(summary.total())
    );
    skipped_footer(&mut output, summary.skipped);
    output
}

/// Totals of every application, optionally only the `top` largest.
pub async fn all_usage(sink: &dyn SessionSink, top: Option<usize>) -> String {
    let records = match sink.query(&SessionFilter::all()).await {
        Ok(v) => v,
        Err(e) => return format!("Error fetching stats: {e}"),
    };

    let summary = aggregate(&records);
    if summary.usages.is_empty() {
        let mut output = "No usage data found!".to_string();
        skipped_footer(&mut output, summary.skipped);
        return output;
    }

    let shown = top.unwrap_or(summary.usages.len()).min(summary.usages.len());
    let mut output = match top {
        Some(_) => format!("**Top {shown} Applications:**"),
        None => format!("**All Applications ({} total):**", summary.usages.len()),
    };
    usage_list(&mut output, &summary.usages[..shown]);
    skipped_footer(&mut output, summary.skipped);
    output
}

/// Totals of sessions that started on `today`.
pub async fn today_usage(sink: &dyn SessionSink, today: NaiveDate) -> String {
    let records = match sink.query(&SessionFilter::for_date(today)).await {
        Ok(v) => v,
        Err(e) => return format!("Error fetching today's stats: {e}"),
    };

    let summary = aggregate(&records);
    if summary.usages.is_empty() {
        let mut output = "No usage data for today!".to_string();
        skipped_footer(&mut output, summary.skipped);
        return output;
    }

    let mut output = format!("**Today's Applications ({} total):**", summary.usages.len());
    usage_list(&mut output, &summary.usages);
    skipped_footer(&mut output, summary.skipped);
    output
}

/// Distinct names of every application that has a stored session.
pub async fn tracked_applications(sink: &dyn SessionSink) -> String {
    let records = match sink.query(&SessionFilter::all()).await {
        Ok(v) => v,
        Err(e) => return format!("Error fetching apps: {e}"),
    };

    let mut names = records
        .iter()
        .map(|v| v.application_name.clone())
        .collect::<Vec<_>>();
    names.sort();
    names.dedup();

    if names.is_empty() {
        return "No applications tracked yet!".to_string();
    }

    let mut output = format!("**Tracked Applications ({} total):**", names.len());
    for name in names {
        let _ = write!(output, "\n• {name}");
    }
    output
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate, NaiveTime};

    use crate::daemon::storage::{entities::SessionRecord, memory::MemorySessionStore};

    use super::{aggregate, all_usage, application_usage, today_usage, tracked_applications};

    fn record(name: &str, day: u32, duration: &str) -> SessionRecord {
        SessionRecord {
            user_id: "user".into(),
            application_name: name.into(),
            session_date: NaiveDate::from_ymd_opt(2018, 7, day).unwrap(),
            start_time: NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(13, 0, 0).unwrap(),
            duration: duration.into(),
        }
    }

    fn store() -> MemorySessionStore {
        MemorySessionStore::with_records(vec![
            record("Code.exe", 4, "01:30:00"),
            record("firefox.exe", 4, "00:45:00"),
            record("Code.exe", 5, "02:00:00"),
            record("Discord.exe", 5, "03:00:00"),
        ])
    }

    #[test]
    fn test_aggregate_sorts_and_counts_unreadable() {
        let summary = aggregate(&[
            record("Code.exe", 4, "01:00:00"),
            record("Code.exe", 4, "00:30:00"),
            record("firefox.exe", 4, "02:00:00"),
            record("firefox.exe", 4, "two hours"),
        ]);

        let totals = summary
            .usages
            .iter()
            .map(|v| (v.application_name.to_string(), v.duration))
            .collect::<Vec<_>>();
        assert_eq!(
            totals,
            vec![
                ("firefox.exe".to_string(), Duration::hours(2)),
                ("Code.exe".to_string(), Duration::minutes(90)),
            ]
        );
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.total(), Duration::minutes(210));
    }

    #[tokio::test]
    async fn test_application_usage() {
        let store = store();
        assert_eq!(
            application_usage(&store, "Code.exe").await,
            "**Code.exe**: 3.50 hours total"
        );
        assert_eq!(
            application_usage(&store, "spotify.exe").await,
            "No data found for **spotify.exe**"
        );
    }

    #[tokio::test]
    async fn test_all_usage() {
        let store = store();
        assert_eq!(
            all_usage(&store, None).await,
            "**All Applications (3 total):**\n• Code.exe: 3.50 hours\n• Discord.exe: 3.00 hours\n• firefox.exe: 0.75 hours"
        );
        assert_eq!(
            all_usage(&store, Some(2)).await,
            "**Top 2 Applications:**\n• Code.exe: 3.50 hours\n• Discord.exe: 3.00 hours"
        );
        assert_eq!(
            all_usage(&store, Some(10)).await,
            "**Top 3 Applications:**\n• Code.exe: 3.50 hours\n• Discord.exe: 3.00 hours\n• firefox.exe: 0.75 hours"
        );
        assert_eq!(
            all_usage(&MemorySessionStore::new(), None).await,
            "No usage data found!"
        );
    }

    #[tokio::test]
    async fn test_today_usage() {
        let store = store();
        assert_eq!(
            today_usage(&store, NaiveDate::from_ymd_opt(2018, 7, 4).unwrap()).await,
            "**Today's Applications (2 total):**\n• Code.exe: 1.50 hours\n• firefox.exe: 0.75 hours"
        );
        assert_eq!(
            today_usage(&store, NaiveDate::from_ymd_opt(2018, 7, 6).unwrap()).await,
            "No usage data for today!"
        );
    }

    #[tokio::test]
    async fn test_tracked_applications() {
        assert_eq!(
            tracked_applications(&store()).await,
            "**Tracked Applications (3 total):**\n• Code.exe\n• Discord.exe\n• firefox.exe"
        );
        assert_eq!(
            tracked_applications(&MemorySessionStore::new()).await,
            "No applications tracked yet!"
        );
    }

    #[tokio::test]
    async fn test_unreadable_durations_are_reported() {
        let store = MemorySessionStore::with_records(vec![
            record("Code.exe", 4, "01:00:00"),
            record("Code.exe", 4, "broken"),
        ]);
        assert_eq!(
            application_usage(&store, "Code.exe").await,
            "**Code.exe**: 1.00 hours total\n(skipped 1 records with unreadable durations)"
        );
    }

    #[tokio::test]
    async fn test_query_failures_become_messages() {
        let store = store();
        store.set_failing(true);

        assert!(application_usage(&store, "Code.exe")
            .await
            .starts_with("Error fetching stats: "));
        assert!(all_usage(&store, None)
            .await
            .starts_with("Error fetching stats: "));
        assert!(
            today_usage(&store, NaiveDate::from_ymd_opt(2018, 7, 4).unwrap())
                .await
                .starts_with("Error fetching today's stats: ")
        );
        assert!(tracked_applications(&store)
            .await
            .starts_with("Error fetching apps: "));
    }
}
