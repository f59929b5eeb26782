use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::SinkError;

use super::entities::SessionRecord;

/// Selects stored sessions. An empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionFilter {
    pub application_name: Option<String>,
    pub session_date: Option<NaiveDate>,
}

impl SessionFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn for_application(name: impl Into<String>) -> Self {
        Self {
            application_name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn for_date(date: NaiveDate) -> Self {
        Self {
            session_date: Some(date),
            ..Self::default()
        }
    }

    /// Exact match on every field that is set.
    pub fn matches(&self, record: &SessionRecord) -> bool {
        self.application_name
            .as_deref()
            .is_none_or(|name| *record.application_name == *name)
            && self
                .session_date
                .is_none_or(|date| record.session_date == date)
    }
}

/// Interface for abstracting storage of completed sessions. Stores are append-only.
#[async_trait]
pub trait SessionSink: Send + Sync {
    async fn append(&self, record: &SessionRecord) -> Result<(), SinkError>;

    async fn query(&self, filter: &SessionFilter) -> Result<Vec<SessionRecord>, SinkError>;
}

#[async_trait]
impl<T: SessionSink + ?Sized> SessionSink for Arc<T> {
    async fn append(&self, record: &SessionRecord) -> Result<(), SinkError> {
        (**self).append(record).await
    }

    async fn query(&self, filter: &SessionFilter) -> Result<Vec<SessionRecord>, SinkError> {
        (**self).query(filter).await
    }
}

#[async_trait]
impl<T: SessionSink + ?Sized> SessionSink for Box<T> {
    async fn append(&self, record: &SessionRecord) -> Result<(), SinkError> {
        (**self).append(record).await
    }

    async fn query(&self, filter: &SessionFilter) -> Result<Vec<SessionRecord>, SinkError> {
        (**self).query(filter).await
    }
}
