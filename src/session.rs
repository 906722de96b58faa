use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{Result, RevloopError};

#[async_trait]
pub trait SessionRecorder: Send + Sync {
    /// Appends `record` to the session's history.
    async fn record(&self, session_id: &str, record: Value) -> Result<()>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionDocument {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub interactions: Vec<Value>,
}

impl SessionDocument {
    fn new(session_id: &str) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.to_string(),
            created_at: now,
            updated_at: now,
            interactions: Vec::new(),
        }
    }
}

/// Session ids become file names, so they must stay a single path component.
pub fn validate_session_id(session_id: &str) -> Result<()> {
    let bad = session_id.is_empty()
        || session_id.contains('/')
        || session_id.contains('\\')
        || session_id.contains("..")
        || session_id.contains('\0');
    if bad {
        return Err(RevloopError::Session(session_id.to_string()));
    }
    Ok(())
}

/// Keeps sessions as `<dir>/<session_id>.json`.
///
/// Appends are serialized through `lock`, and each write lands in a
/// temporary file first and is renamed over the document.
pub struct FileSessionRecorder {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl FileSessionRecorder {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, session_id: &str) -> Result<PathBuf> {
        validate_session_id(session_id)?;
        Ok(self.dir.join(format!("{session_id}.json")))
    }

    /// Reads a stored session. `Ok(None)` when nothing was recorded yet.
    pub async fn load(&self, session_id: &str) -> Result<Option<SessionDocument>> {
        let path = self.path_for(session_id)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl SessionRecorder for FileSessionRecorder {
    async fn record(&self, session_id: &str, record: Value) -> Result<()> {
        let path = self.path_for(session_id)?;
        let _guard = self.lock.lock().await;

        let mut doc = self
            .load(session_id)
            .await?
            .unwrap_or_else(|| SessionDocument::new(session_id));
        doc.interactions.push(record);
        doc.updated_at = Utc::now();

        tokio::fs::create_dir_all(&self.dir).await?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_string_pretty(&doc)?).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!(session_id, path = %path.display(), interactions = doc.interactions.len(), "session recorded");
        Ok(())
    }
}
