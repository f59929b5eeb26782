use std::sync::Arc;

use chrono::{DateTime, Duration, Local, NaiveDate, NaiveTime, SubsecRound};
use serde::{Deserialize, Serialize};

use crate::{
    daemon::collection::tracker::SessionSpan,
    error::DurationParseError,
    utils::time::{format_hms, parse_hms},
};

/// A usage session that is about to be stored. Timestamps are cut to whole seconds, and the
/// duration is always derived from them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub application_name: Arc<str>,
    pub user_id: Arc<str>,
    pub start_time: DateTime<Local>,
    pub end_time: DateTime<Local>,
}

impl Session {
    pub fn new(user_id: Arc<str>, span: SessionSpan) -> Self {
        Self {
            application_name: span.application_name,
            user_id,
            start_time: span.start.trunc_subsecs(0),
            end_time: span.end.trunc_subsecs(0),
        }
    }

    pub fn session_date(&self) -> NaiveDate {
        self.start_time.date_naive()
    }

    pub fn duration(&self) -> Duration {
        (self.end_time - self.start_time).max(Duration::zero())
    }

    pub fn to_record(&self) -> SessionRecord {
        SessionRecord {
            user_id: self.user_id.clone(),
            application_name: self.application_name.clone(),
            session_date: self.session_date(),
            start_time: self.start_time.time(),
            end_time: self.end_time.time(),
            duration: format_hms(self.duration()),
        }
    }
}

/// The row shape shared by every store. Field names and text formats are what the remote
/// `app_usage` table expects.
#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone)]
pub struct SessionRecord {
    pub user_id: Arc<str>,
    pub application_name: Arc<str>,
    #[serde(with = "date_ser")]
    pub session_date: NaiveDate,
    #[serde(with = "time_ser")]
    pub start_time: NaiveTime,
    #[serde(with = "time_ser")]
    pub end_time: NaiveTime,
    /// `HH:MM:SS`. Stays text so a single unreadable row doesn't break a whole query.
    pub duration: String,
}

impl SessionRecord {
    pub fn duration(&self) -> Result<Duration, DurationParseError> {
        parse_hms(&self.duration)
    }
}

mod date_ser {
    use chrono::NaiveDate;
    use serde::{self, Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%d";

    pub fn serialize<S>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&date.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NaiveDate::parse_from_str(&s, FORMAT).map_err(serde::de::Error::custom)
    }
}

mod time_ser {
    use chrono::NaiveTime;
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&time.format("%H:%M:%S").to_string())
    }

    /// Postgres may hand back fractional seconds for `time` columns.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(&s, "%H:%M:%S%.f").map_err(serde::de::Error::custom)
    }
}
