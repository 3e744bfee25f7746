//! Request orchestration: locator → stored record or fresh fetch → persisted
//! transcript and summary.
//!
//! Every step runs sequentially because each one depends on the previous
//! outcome. Only metadata failures, summary failures and storage failures are
//! fatal; caption and transcript-generation problems degrade to a null
//! transcript.

use std::{collections::HashMap, sync::Arc};

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{info, warn};

use crate::config::GenerationLimits;
use crate::error::{OrchestratorError, Result};
use crate::locator::{VideoLocator, parse_locator};
use crate::providers::{
    CaptionOutcome, CaptionProvider, CaptionSegment, MetadataError, TextGenerator,
    VideoMetadataProvider,
};
use crate::store::{RecordStore, TranscriptRecord};

pub const MAX_RECENT_LIMIT: usize = 500;

/// Which path produced the returned record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscriptStatus {
    Transcribed,
    GeneratedTranscript,
    Unavailable,
    AlreadyStored,
}

impl TranscriptStatus {
    pub fn message(self) -> &'static str {
        match self {
            Self::Transcribed => "Video saved and transcribed successfully.",
            Self::GeneratedTranscript => "Transcript generated successfully using OpenAI.",
            Self::Unavailable => "Transcript not available for this video.",
            Self::AlreadyStored => "Transcript already stored for this video.",
        }
    }
}

#[derive(Debug, Clone)]
pub struct TranscriptOutcome {
    pub record: TranscriptRecord,
    pub status: TranscriptStatus,
    /// False when the record came from the store without any provider call.
    pub created: bool,
}

/// The external services a `TranscriptService` talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub metadata: Arc<dyn VideoMetadataProvider>,
    pub captions: Arc<dyn CaptionProvider>,
    pub generator: Arc<dyn TextGenerator>,
    pub store: Arc<dyn RecordStore>,
}

#[derive(Debug, Clone)]
pub struct ResolveSettings {
    pub caption_lang: String,
    pub limits: GenerationLimits,
}

impl Default for ResolveSettings {
    fn default() -> Self {
        Self {
            caption_lang: crate::config::DEFAULT_CAPTION_LANG.to_string(),
            limits: GenerationLimits::default(),
        }
    }
}

pub struct TranscriptService {
    collaborators: Collaborators,
    settings: ResolveSettings,
    inflight: InflightLocks,
}

impl TranscriptService {
    pub fn new(collaborators: Collaborators, settings: ResolveSettings) -> Self {
        Self {
            collaborators,
            settings,
            inflight: InflightLocks::default(),
        }
    }

    /// Resolves a locator into a stored transcript record, fetching and
    /// generating whatever is missing on first sight of a video id.
    pub async fn resolve(&self, source_url: &str) -> Result<TranscriptOutcome> {
        let locator = parse_locator(source_url)?;
        let _permit = self.inflight.acquire(&locator.video_id).await;
        self.resolve_locked(&locator).await
    }

    pub async fn lookup(&self, video_id: &str) -> Result<Option<TranscriptRecord>> {
        self.collaborators
            .store
            .find_by_video_id(video_id)
            .await
            .map_err(OrchestratorError::PersistenceFailed)
    }

    pub async fn recent(&self, limit: usize) -> Result<Vec<TranscriptRecord>> {
        self.collaborators
            .store
            .list_recent(limit.clamp(1, MAX_RECENT_LIMIT))
            .await
            .map_err(OrchestratorError::PersistenceFailed)
    }

    async fn resolve_locked(&self, locator: &VideoLocator) -> Result<TranscriptOutcome> {
        let Collaborators {
            metadata,
            captions,
            store,
            ..
        } = &self.collaborators;
        let video_id = locator.video_id.as_str();

        if let Some(record) = self.lookup(video_id).await? {
            info!(video_id, "returning stored transcript");
            return Ok(TranscriptOutcome {
                record,
                status: TranscriptStatus::AlreadyStored,
                created: false,
            });
        }

        let info = metadata.fetch_info(locator).await.map_err(|err| {
            warn!(video_id, error = %err, "metadata lookup failed");
            match err {
                MetadataError::NotFound | MetadataError::Unavailable => {
                    OrchestratorError::VideoUnavailable
                }
                MetadataError::Other(reason) => OrchestratorError::MetadataFetchFailed { reason },
            }
        })?;

        let caption_text = match captions
            .fetch_captions(video_id, &self.settings.caption_lang)
            .await
        {
            CaptionOutcome::Available(segments) if !segments.is_empty() => {
                Some(join_segments(&segments))
            }
            CaptionOutcome::Available(_) | CaptionOutcome::NoCaptions => None,
            CaptionOutcome::ProviderFailed(reason) => {
                warn!(video_id, %reason, "caption provider failed; treating as no captions");
                None
            }
        };

        let (transcript, status) = match caption_text {
            Some(text) => (Some(text), TranscriptStatus::Transcribed),
            None => match self.generate_transcript(locator).await {
                Some(text) => (Some(text), TranscriptStatus::GeneratedTranscript),
                None => (None, TranscriptStatus::Unavailable),
            },
        };

        let record = store
            .create(TranscriptRecord::new(
                video_id,
                info.title,
                locator.source_url.as_str(),
                transcript,
            ))
            .await
            .map_err(OrchestratorError::PersistenceFailed)?;

        let record = if let Some(text) = record.transcript.as_deref() {
            let summary = self.summarize(video_id, text).await?;
            let mut updated = record;
            updated.summary = Some(summary);
            store
                .update(updated)
                .await
                .map_err(OrchestratorError::PersistenceFailed)?
        } else {
            record
        };

        info!(video_id, status = ?status, "transcript resolved");
        Ok(TranscriptOutcome {
            record,
            status,
            created: true,
        })
    }

    async fn generate_transcript(&self, locator: &VideoLocator) -> Option<String> {
        let prompt = transcript_prompt(&locator.source_url);
        match self
            .collaborators
            .generator
            .complete(&prompt, self.settings.limits.transcript_max_tokens)
            .await
        {
            Ok(text) if !text.trim().is_empty() => Some(text),
            Ok(_) => {
                warn!(video_id = %locator.video_id, "generated transcript was empty");
                None
            }
            Err(err) => {
                warn!(video_id = %locator.video_id, error = %err, "transcript generation failed");
                None
            }
        }
    }

    async fn summarize(&self, video_id: &str, transcript: &str) -> Result<String> {
        self.collaborators
            .generator
            .complete(
                &summary_prompt(transcript),
                self.settings.limits.summary_max_tokens,
            )
            .await
            .map_err(|err| {
                warn!(video_id, error = %err, "summary generation failed; record kept without summary");
                OrchestratorError::SummaryFailed(err)
            })
    }
}

pub fn join_segments(segments: &[CaptionSegment]) -> String {
    segments.iter().fold(String::new(), |mut acc, segment| {
        acc.push_str(&segment.text);
        acc.push_str(" \n");
        acc
    })
}

pub fn transcript_prompt(source_url: &str) -> String {
    format!("Transcribe the spoken content of the following video:\n{source_url}")
}

pub fn summary_prompt(transcript: &str) -> String {
    format!("Summarize the following transcript:\n{transcript}")
}

/// Per-video-id async locks so concurrent requests for the same id run one
/// after another; the later request then finds the stored record.
#[derive(Default)]
struct InflightLocks {
    slots: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl InflightLocks {
    async fn acquire(&self, key: &str) -> InflightPermit<'_> {
        let slot = self.slots.lock().entry(key.to_string()).or_default().clone();
        // Built before waiting so a cancelled waiter still releases its slot.
        let mut permit = InflightPermit {
            locks: self,
            key: key.to_string(),
            slot,
            guard: None,
        };
        let guard = permit.slot.clone().lock_owned().await;
        permit.guard = Some(guard);
        permit
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.slots.lock().len()
    }
}

struct InflightPermit<'a> {
    locks: &'a InflightLocks,
    key: String,
    slot: Arc<AsyncMutex<()>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for InflightPermit<'_> {
    fn drop(&mut self) {
        self.guard.take();
        let mut slots = self.locks.slots.lock();
        // Clones are only taken under the map lock, so map + ours means idle.
        if Arc::strong_count(&self.slot) == 2 {
            slots.remove(&self.key);
        }
    }
}
