use std::{
    future,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use chrono::NaiveDate;
use fs4::tokio::AsyncFileExt;
use futures::{stream, StreamExt, TryStreamExt};
use tokio::{
    fs::File,
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
};
use tokio_stream::wrappers::ReadDirStream;
use tracing::{debug, warn};

use crate::{
    error::{SinkError, StoreFailure},
    utils::time::date_to_record_name,
};

use super::{
    entities::SessionRecord,
    session_storage::{SessionFilter, SessionSink},
};

/// Stores sessions on disk when no remote store is configured. There is one file per
/// `session_date`, each line holding one JSON encoded [SessionRecord].
pub struct LocalSessionStore {
    record_dir: PathBuf,
}

impl LocalSessionStore {
    pub fn new(record_dir: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&record_dir)?;

        Ok(Self { record_dir })
    }

    fn day_path(&self, date: NaiveDate) -> PathBuf {
        self.record_dir.join(date_to_record_name(date))
    }

    async fn read_day(path: &Path) -> Result<Vec<SessionRecord>, std::io::Error> {
        async fn extract(path: &Path) -> Result<Vec<SessionRecord>, std::io::Error> {
            debug!("Extracting {path:?}");
            let file = File::open(path).await?;
            file.lock_shared()?;
            let mut reader = BufReader::new(file);
            let records = LocalSessionStore::parse_lines(&mut reader, path).await;
            reader.into_inner().unlock_async().await?;
            records
        }

        match extract(path).await {
            Ok(s) => Ok(s),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(vec![]),
            Err(e) => Err(e),
        }
    }

    /// Undecodable lines are skipped, a read failure ends the whole read.
    async fn parse_lines(
        reader: &mut BufReader<File>,
        path: &Path,
    ) -> Result<Vec<SessionRecord>, std::io::Error> {
        let mut records = vec![];
        let mut line = Vec::new();
        loop {
            line.clear();
            if reader.read_until(b'\n', &mut line).await? == 0 {
                break;
            }
            let content = line.trim_ascii();
            if content.is_empty() {
                continue;
            }
            match serde_json::from_slice::<SessionRecord>(content) {
                Ok(v) => records.push(v),
                Err(e) => {
                    // A write cut short by a crash leaves a partial line behind.
                    warn!(
                        "During parsing in path {:?} found illegal json string {}:  {e}",
                        path,
                        String::from_utf8_lossy(content)
                    )
                }
            }
        }
        Ok(records)
    }

    /// Days that have a record file, oldest first. Unrelated files are ignored.
    async fn stored_days(&self) -> Result<Vec<NaiveDate>, std::io::Error> {
        let entries = ReadDirStream::new(tokio::fs::read_dir(&self.record_dir).await?);
        let mut days = entries
            .try_filter_map(|entry| {
                future::ready(Ok(entry
                    .file_name()
                    .to_str()
                    .and_then(|name| NaiveDate::parse_from_str(name, "%Y-%m-%d").ok())))
            })
            .try_collect::<Vec<_>>()
            .await?;
        days.sort();
        Ok(days)
    }

    async fn append_inner(&self, record: &SessionRecord) -> Result<(), StoreFailure> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let mut file = File::options()
            .create(true)
            .append(true)
            .open(self.day_path(record.session_date))
            .await?;

        file.lock_exclusive()?;
        let result = Self::write_line(&mut file, &line).await;
        file.unlock_async().await?;
        Ok(result?)
    }

    async fn write_line(file: &mut File, line: &[u8]) -> Result<(), std::io::Error> {
        file.write_all(line).await?;
        file.flush().await
    }

    async fn query_inner(&self, filter: &SessionFilter) -> Result<Vec<SessionRecord>, StoreFailure> {
        let days = match filter.session_date {
            Some(date) => vec![date],
            None => self.stored_days().await?,
        };

        let per_day = stream::iter(days)
            .map(|day| {
                let path = self.day_path(day);
                async move { Self::read_day(&path).await }
            })
            .buffered(4)
            .try_collect::<Vec<_>>()
            .await?;

        Ok(per_day
            .into_iter()
            .flatten()
            .filter(|record| filter.matches(record))
            .collect())
    }
}

#[async_trait]
impl SessionSink for LocalSessionStore {
    async fn append(&self, record: &SessionRecord) -> Result<(), SinkError> {
        self.append_inner(record).await.map_err(SinkError::Write)
    }

    async fn query(&self, filter: &SessionFilter) -> Result<Vec<SessionRecord>, SinkError> {
        self.query_inner(filter).await.map_err(SinkError::Query)
    }
}
