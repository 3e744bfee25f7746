//! In-memory collaborators and a temp-dir backed harness shared by the
//! orchestrator and API tests.

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tempfile::TempDir;

use crate::locator::VideoLocator;
use crate::orchestrator::{Collaborators, ResolveSettings, TranscriptService};
use crate::providers::{
    CaptionOutcome, CaptionProvider, GenerationError, MetadataError, TextGenerator, VideoInfo,
    VideoMetadataProvider,
};
use crate::store::{RecordStore, TranscriptRecord, TranscriptStore};

pub struct MockMetadata {
    result: Mutex<Result<VideoInfo, MetadataError>>,
    delay: Mutex<Option<Duration>>,
    calls: AtomicUsize,
}

impl MockMetadata {
    fn new(title: &str) -> Self {
        Self {
            result: Mutex::new(Ok(VideoInfo {
                title: title.to_string(),
            })),
            delay: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn fail_with(&self, err: MetadataError) {
        *self.result.lock() = Err(err);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VideoMetadataProvider for MockMetadata {
    async fn fetch_info(&self, _locator: &VideoLocator) -> Result<VideoInfo, MetadataError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.result.lock().clone()
    }
}

pub struct MockCaptions {
    outcome: CaptionOutcome,
    langs: Mutex<Vec<String>>,
}

impl MockCaptions {
    pub fn calls(&self) -> usize {
        self.langs.lock().len()
    }

    pub fn langs(&self) -> Vec<String> {
        self.langs.lock().clone()
    }
}

#[async_trait]
impl CaptionProvider for MockCaptions {
    async fn fetch_captions(&self, _video_id: &str, lang: &str) -> CaptionOutcome {
        self.langs.lock().push(lang.to_string());
        self.outcome.clone()
    }
}

/// Answers summary prompts and transcript prompts from separate canned results.
pub struct MockGenerator {
    transcript: Result<String, GenerationError>,
    summary: Result<String, GenerationError>,
    prompts: Mutex<Vec<(String, u32)>>,
}

impl MockGenerator {
    pub fn new(
        transcript: Result<String, GenerationError>,
        summary: Result<String, GenerationError>,
    ) -> Self {
        Self {
            transcript,
            summary,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn ok(transcript: &str, summary: &str) -> Self {
        Self::new(Ok(transcript.to_string()), Ok(summary.to_string()))
    }

    pub fn prompts(&self) -> Vec<(String, u32)> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl TextGenerator for MockGenerator {
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, GenerationError> {
        self.prompts.lock().push((prompt.to_string(), max_tokens));
        if prompt.starts_with("Summarize") {
            self.summary.clone()
        } else {
            self.transcript.clone()
        }
    }
}

pub struct Harness {
    _temp: TempDir,
    pub service: Arc<TranscriptService>,
    pub store: TranscriptStore,
    pub metadata: Arc<MockMetadata>,
    pub captions: Arc<MockCaptions>,
    pub generator: Arc<MockGenerator>,
}

impl Harness {
    pub async fn new(captions: CaptionOutcome, generator: MockGenerator) -> Self {
        Self::with_settings(captions, generator, ResolveSettings::default()).await
    }

    pub async fn with_settings(
        captions: CaptionOutcome,
        generator: MockGenerator,
        settings: ResolveSettings,
    ) -> Self {
        let temp = tempfile::tempdir().unwrap();
        let store = TranscriptStore::open(&temp.path().join("transcripts.db"))
            .await
            .unwrap();
        let metadata = Arc::new(MockMetadata::new("Test Video"));
        let captions = Arc::new(MockCaptions {
            outcome: captions,
            langs: Mutex::new(Vec::new()),
        });
        let generator = Arc::new(generator);

        let service = TranscriptService::new(
            Collaborators {
                metadata: metadata.clone(),
                captions: captions.clone(),
                generator: generator.clone(),
                store: Arc::new(store.clone()),
            },
            settings,
        );

        Self {
            _temp: temp,
            service: Arc::new(service),
            store,
            metadata,
            captions,
            generator,
        }
    }

    pub async fn stored(&self, video_id: &str) -> Option<TranscriptRecord> {
        self.store.find_by_video_id(video_id).await.unwrap()
    }

    pub async fn record_count(&self) -> usize {
        self.store.list_recent(10_000).await.unwrap().len()
    }

    pub fn total_provider_calls(&self) -> usize {
        self.metadata.calls() + self.captions.calls() + self.generator.prompts().len()
    }
}
