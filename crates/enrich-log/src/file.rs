//! Durable, append-only implementation: one JSON-lines file per message
//! under a configured root directory, in the manner of the teacher's
//! `ReceiptStore` (`abp-runtime::store`). The closest durable stand-in
//! for the Postgres-backed `events` table the original implementation
//! used, without pulling in a database driver the corpus never depends
//! on.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use enrich_core::{Event, EventKind, EventPayload};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{error::LogError, EventLog};

struct Clock {
    nanos: i64,
}

/// A durable event log backed by one JSON-lines file per message.
pub struct FileEventLog {
    root: PathBuf,
    clock: Mutex<Clock>,
}

impl FileEventLog {
    /// Create a log rooted at `root`. The directory is created lazily on
    /// first append; it need not exist yet.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            clock: Mutex::new(Clock { nanos: 0 }),
        }
    }

    fn path_for(&self, message_id: Uuid) -> PathBuf {
        self.root.join(format!("{message_id}.jsonl"))
    }

    async fn next_timestamp(&self) -> DateTime<Utc> {
        let mut clock = self.clock.lock().await;
        let now_nanos = Utc::now().timestamp_nanos_opt().unwrap_or(0);
        clock.nanos = clock.nanos.max(now_nanos) + 1;
        DateTime::from_timestamp_nanos(clock.nanos)
    }

    async fn read_events(&self, message_id: Uuid, path: &Path) -> Result<Vec<Event>, LogError> {
        let contents = match tokio::fs::read_to_string(path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(LogError::Storage { message_id, source }),
        };
        contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                serde_json::from_str::<Event>(line).map_err(|source| LogError::Corrupt {
                    message_id,
                    source,
                })
            })
            .collect()
    }
}

#[async_trait]
impl EventLog for FileEventLog {
    async fn append(
        &self,
        ticket_id: Option<Uuid>,
        message_id: Option<Uuid>,
        payload: EventPayload,
    ) -> Result<Event, LogError> {
        let key = payload.message_id();
        let timestamp = self.next_timestamp().await;
        let event = Event {
            id: Uuid::new_v4(),
            ticket_id,
            message_id,
            payload,
            timestamp,
        };

        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|source| LogError::Storage {
                message_id: key,
                source,
            })?;

        let mut line = serde_json::to_string(&event).map_err(|source| LogError::Corrupt {
            message_id: key,
            source,
        })?;
        line.push('\n');

        let path = self.path_for(key);
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|source| LogError::Storage {
                message_id: key,
                source,
            })?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|source| LogError::Storage {
                message_id: key,
                source,
            })?;
        file.flush().await.map_err(|source| LogError::Storage {
            message_id: key,
            source,
        })?;

        tracing::info!(target: "enrich.log", message_id = %key, kind = ?event.payload.kind(), "event appended");
        Ok(event)
    }

    async fn latest(
        &self,
        message_id: Uuid,
        kind: EventKind,
    ) -> Result<Option<Event>, LogError> {
        let path = self.path_for(message_id);
        let events = self.read_events(message_id, &path).await?;
        Ok(events.into_iter().rev().find(|e| e.payload.kind() == kind))
    }

    async fn all(&self, message_id: Uuid, kind: EventKind) -> Result<Vec<Event>, LogError> {
        let path = self.path_for(message_id);
        let events = self.read_events(message_id, &path).await?;
        Ok(events.into_iter().filter(|e| e.payload.kind() == kind).collect())
    }

    async fn all_for_message(&self, message_id: Uuid) -> Result<Vec<Event>, LogError> {
        let path = self.path_for(message_id);
        self.read_events(message_id, &path).await
    }
}
