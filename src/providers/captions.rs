use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use super::{CaptionOutcome, CaptionProvider, CaptionSegment, describe_ureq_error, run_blocking};

const PLAYER_ENDPOINT: &str = "https://www.youtube.com/youtubei/v1/player";
const WEB_CLIENT_VERSION: &str = "2.20250626.01.00";

#[derive(Deserialize)]
struct PlayerResponse {
    captions: Option<Captions>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Captions {
    player_captions_tracklist_renderer: Option<TracklistRenderer>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TracklistRenderer {
    #[serde(default)]
    caption_tracks: Vec<CaptionTrack>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CaptionTrack {
    base_url: String,
    language_code: String,
    #[serde(default)]
    kind: Option<String>,
}

impl CaptionTrack {
    fn is_asr(&self) -> bool {
        self.kind.as_deref() == Some("asr") || self.base_url.contains("kind=asr")
    }
}

#[derive(Deserialize)]
struct Json3Document {
    #[serde(default)]
    events: Vec<Json3Event>,
}

#[derive(Deserialize)]
struct Json3Event {
    #[serde(default)]
    segs: Option<Vec<Json3Segment>>,
}

#[derive(Deserialize)]
struct Json3Segment {
    #[serde(default)]
    utf8: String,
}

/// Fetches caption tracks through the innertube player endpoint and downloads
/// the chosen track in json3 form.
#[derive(Clone)]
pub struct YoutubeCaptionProvider {
    agent: ureq::Agent,
}

impl YoutubeCaptionProvider {
    pub fn new(agent: ureq::Agent) -> Self {
        Self { agent }
    }

    fn fetch_blocking(
        agent: &ureq::Agent,
        video_id: &str,
        lang: &str,
    ) -> Result<CaptionOutcome, String> {
        let player: PlayerResponse = agent
            .post(PLAYER_ENDPOINT)
            .send_json(serde_json::json!({
                "context": {
                    "client": {
                        "clientName": "WEB",
                        "clientVersion": WEB_CLIENT_VERSION,
                        "hl": lang,
                    }
                },
                "videoId": video_id,
            }))
            .map_err(describe_ureq_error)?
            .into_json()
            .map_err(|err| format!("decoding player response: {err}"))?;

        let tracks = player
            .captions
            .and_then(|captions| captions.player_captions_tracklist_renderer)
            .map(|renderer| renderer.caption_tracks)
            .unwrap_or_default();
        let Some(track) = select_track(&tracks, lang) else {
            debug!(video_id, lang, tracks = tracks.len(), "no matching caption track");
            return Ok(CaptionOutcome::NoCaptions);
        };

        let document: Json3Document = agent
            .get(&json3_url(&track.base_url))
            .call()
            .map_err(describe_ureq_error)?
            .into_json()
            .map_err(|err| format!("decoding caption track: {err}"))?;

        let segments = segments_from_document(document);
        if segments.is_empty() {
            Ok(CaptionOutcome::NoCaptions)
        } else {
            Ok(CaptionOutcome::Available(segments))
        }
    }
}

#[async_trait]
impl CaptionProvider for YoutubeCaptionProvider {
    async fn fetch_captions(&self, video_id: &str, lang: &str) -> CaptionOutcome {
        let agent = self.agent.clone();
        let video_id = video_id.to_string();
        let lang = lang.to_string();
        let result = run_blocking(
            move || Self::fetch_blocking(&agent, &video_id, &lang),
            |err| err,
        )
        .await;
        result.unwrap_or_else(CaptionOutcome::ProviderFailed)
    }
}

/// Prefers a manual track, then punctuated ASR, then plain ASR. Language
/// matching accepts regional variants (`en` matches `en-GB`) when no exact
/// code exists.
fn select_track<'a>(tracks: &'a [CaptionTrack], lang: &str) -> Option<&'a CaptionTrack> {
    let exact: Vec<&CaptionTrack> = tracks
        .iter()
        .filter(|track| track.language_code.eq_ignore_ascii_case(lang))
        .collect();
    let candidates: Vec<&CaptionTrack> = if exact.is_empty() {
        let prefix = format!("{}-", lang.to_ascii_lowercase());
        tracks
            .iter()
            .filter(|track| track.language_code.to_ascii_lowercase().starts_with(&prefix))
            .collect()
    } else {
        exact
    };

    candidates
        .iter()
        .find(|track| !track.is_asr())
        .or_else(|| {
            candidates
                .iter()
                .find(|track| track.base_url.contains("variant=punctuated"))
        })
        .or_else(|| candidates.first())
        .copied()
}

/// Rewrites a track URL so it always requests `fmt=json3`, replacing any
/// format the track listing carried (`srv3`, `vtt`, ...).
fn json3_url(base_url: &str) -> String {
    let base = base_url.replace("\\u0026", "&");
    let Ok(mut url) = Url::parse(&base) else {
        return format!("{base}&fmt=json3");
    };
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != "fmt")
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    url.query_pairs_mut()
        .clear()
        .extend_pairs(pairs)
        .append_pair("fmt", "json3");
    url.into()
}

fn segments_from_document(document: Json3Document) -> Vec<CaptionSegment> {
    document
        .events
        .into_iter()
        .filter_map(|event| event.segs)
        .filter_map(|segs| {
            let text: String = segs.iter().map(|seg| seg.utf8.as_str()).collect();
            let text = text.trim();
            if text.is_empty() {
                None
            } else {
                Some(CaptionSegment {
                    text: text.to_string(),
                })
            }
        })
        .collect()
}
