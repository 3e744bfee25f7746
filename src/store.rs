//! Transcript persistence layer.
//!
//! Records live in a single SQLite table keyed by the canonical video id. The
//! struct below mirrors both the row layout and the JSON exposed by the API.

use std::path::Path;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use libsql::{Builder, Connection, Row, params};
use serde::{Deserialize, Serialize};

/// One resolved video. `summary` is only ever set alongside a transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptRecord {
    pub video_id: String,
    pub title: String,
    pub source_url: String,
    pub transcript: Option<String>,
    pub summary: Option<String>,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

impl TranscriptRecord {
    pub fn new(
        video_id: impl Into<String>,
        title: impl Into<String>,
        source_url: impl Into<String>,
        transcript: Option<String>,
    ) -> Self {
        Self {
            video_id: video_id.into(),
            title: title.into(),
            source_url: source_url.into(),
            transcript,
            summary: None,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }
}

/// Storage contract used by the orchestrator. `create` must reject a second
/// record for the same id; `update` must fail when the id is unknown.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn find_by_video_id(&self, video_id: &str) -> Result<Option<TranscriptRecord>>;
    async fn create(&self, record: TranscriptRecord) -> Result<TranscriptRecord>;
    async fn update(&self, record: TranscriptRecord) -> Result<TranscriptRecord>;
    async fn list_recent(&self, limit: usize) -> Result<Vec<TranscriptRecord>>;
}

async fn configure_connection(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode=WAL;
        PRAGMA synchronous=NORMAL;
        "#,
    )
    .await?;
    Ok(())
}

async fn ensure_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS transcripts (
            video_id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            source_url TEXT NOT NULL,
            transcript TEXT,
            summary TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_transcripts_created_at ON transcripts(created_at);
        "#,
    )
    .await?;
    Ok(())
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// SQLite-backed record store. Cloning shares the underlying connection.
#[derive(Clone)]
pub struct TranscriptStore {
    conn: Connection,
}

impl TranscriptStore {
    /// Opens (and if necessary creates) the SQLite DB and ensures the expected
    /// schema exists.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating database directory {}", parent.display()))?;
        }

        let db = Builder::new_local(path)
            .build()
            .await
            .with_context(|| format!("opening transcript DB {}", path.display()))?;

        let conn = db.connect()?;
        configure_connection(&conn).await?;
        ensure_schema(&conn).await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl RecordStore for TranscriptStore {
    async fn find_by_video_id(&self, video_id: &str) -> Result<Option<TranscriptRecord>> {
        let stmt = self
            .conn
            .prepare(
                r#"
                SELECT video_id, title, source_url, transcript, summary, created_at, updated_at
                FROM transcripts
                WHERE video_id = ?1
                "#,
            )
            .await?;

        let mut rows = stmt.query([video_id]).await?;
        if let Some(row) = rows.next().await? {
            Ok(Some(row_to_record(&row)?))
        } else {
            Ok(None)
        }
    }

    async fn create(&self, mut record: TranscriptRecord) -> Result<TranscriptRecord> {
        let now = now_rfc3339();
        record.created_at = now.clone();
        record.updated_at = now;

        self.conn
            .execute(
                r#"
                INSERT INTO transcripts (
                    video_id, title, source_url, transcript, summary, created_at, updated_at
                ) VALUES (
                    :video_id, :title, :source_url, :transcript, :summary, :created_at, :updated_at
                )
                "#,
                params![
                    record.video_id.as_str(),
                    record.title.as_str(),
                    record.source_url.as_str(),
                    record.transcript.as_deref(),
                    record.summary.as_deref(),
                    record.created_at.as_str(),
                    record.updated_at.as_str(),
                ],
            )
            .await
            .with_context(|| format!("inserting transcript {}", record.video_id))?;

        Ok(record)
    }

    async fn update(&self, mut record: TranscriptRecord) -> Result<TranscriptRecord> {
        record.updated_at = now_rfc3339();

        let changed = self
            .conn
            .execute(
                r#"
                UPDATE transcripts SET
                    title = :title,
                    source_url = :source_url,
                    transcript = :transcript,
                    summary = :summary,
                    updated_at = :updated_at
                WHERE video_id = :video_id
                "#,
                params![
                    record.title.as_str(),
                    record.source_url.as_str(),
                    record.transcript.as_deref(),
                    record.summary.as_deref(),
                    record.updated_at.as_str(),
                    record.video_id.as_str(),
                ],
            )
            .await
            .with_context(|| format!("updating transcript {}", record.video_id))?;

        if changed == 0 {
            bail!("transcript {} does not exist", record.video_id);
        }
        Ok(record)
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<TranscriptRecord>> {
        let stmt = self
            .conn
            .prepare(
                r#"
                SELECT video_id, title, source_url, transcript, summary, created_at, updated_at
                FROM transcripts
                ORDER BY created_at DESC, rowid DESC
                LIMIT ?1
                "#,
            )
            .await?;

        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut rows = stmt.query(params![limit]).await?;
        let mut records = Vec::new();
        while let Some(row) = rows.next().await? {
            records.push(row_to_record(&row)?);
        }
        Ok(records)
    }
}

// Column order must match the SELECT statements above.
fn row_to_record(row: &Row) -> Result<TranscriptRecord> {
    Ok(TranscriptRecord {
        video_id: row.get(0)?,
        title: row.get(1)?,
        source_url: row.get(2)?,
        transcript: row.get(3)?,
        summary: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}
