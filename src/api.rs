//! Typed client for the hybrid AI pipeline server. The server owns the whole
//! ASR -> translation -> answer -> TTS flow; this side only uploads audio,
//! asks for results and streams the generated playback audio.

use std::path::Path;

use reqwest::{multipart, Client};
use serde::{Deserialize, Serialize};

use crate::playback::AudioKind;

/// Multipart field names the endpoints expect. `/upload-audio` reads
/// `audio_file`; `/replace-audio` reads `file`.
const UPLOAD_FILE_FIELD: &str = "audio_file";
const REPLACE_FILE_FIELD: &str = "file";

/// Whether the current job came from a live recording or a file upload.
/// Affects which process endpoint is called and result labeling, nothing else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Recording,
    Upload,
}

impl SourceType {
    pub fn label(self) -> &'static str {
        match self {
            SourceType::Recording => "Live Recording",
            SourceType::Upload => "File Upload",
        }
    }
}

/// Which generated audio to regenerate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegenTarget {
    Question,
    Answer,
    All,
}

impl RegenTarget {
    pub fn path_segment(self) -> &'static str {
        match self {
            RegenTarget::Question => "pashto_question",
            RegenTarget::Answer => "pashto_answer",
            RegenTarget::All => "all",
        }
    }
}

/// Request failures. Every error is terminal to the current job; there is no
/// automatic retry anywhere.
#[derive(Debug)]
pub enum ApiError {
    /// Transport-level failure: the request never produced a server verdict.
    Network(String),
    /// The server answered with `success: false` or an HTTP error. Holds the
    /// server-supplied error code or message.
    Server(String),
}

impl ApiError {
    /// Message for the error banner. Known error codes get a friendlier text.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Server(e) if e == "no_speech" => {
                "No speech detected. Please speak in Pashto during recording.".into()
            }
            ApiError::Server(e) => e.clone(),
            ApiError::Network(e) => format!("Network error occurred: {e}"),
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::Network(e) => write!(f, "network error: {e}"),
            ApiError::Server(e) => write!(f, "server error: {e}"),
        }
    }
}

impl std::error::Error for ApiError {}

/// Transcript fields returned by the process endpoints. Every field is
/// optional; accessors substitute the per-field placeholder.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TranscriptSet {
    pub pashto_question: Option<String>,
    pub english_question: Option<String>,
    pub pashto_answer: Option<String>,
    pub english_answer: Option<String>,
}

impl TranscriptSet {
    pub fn pashto_question(&self) -> &str {
        self.pashto_question
            .as_deref()
            .unwrap_or("Transcription not available")
    }

    pub fn english_question(&self) -> &str {
        self.english_question
            .as_deref()
            .unwrap_or("Translation not available")
    }

    pub fn pashto_answer(&self) -> &str {
        self.pashto_answer.as_deref().unwrap_or("Answer not available")
    }

    pub fn english_answer(&self) -> &str {
        self.english_answer
            .as_deref()
            .unwrap_or("Answer translation not available")
    }
}

/// Common JSON envelope shared by every endpoint.
#[derive(Debug, Default, Deserialize)]
struct Envelope {
    success: Option<bool>,
    error: Option<String>,
    message: Option<String>,
    timestamp: Option<String>,
    source_type: Option<SourceType>,
    data: Option<TranscriptSet>,
    is_processing: Option<bool>,
}

/// Acknowledgement of an upload; processing continues via `process`.
#[derive(Debug)]
pub struct UploadAck {
    pub timestamp: String,
}

/// Completed pipeline results.
#[derive(Debug)]
pub struct ProcessOutcome {
    pub data: TranscriptSet,
    pub timestamp: String,
    pub source_type: Option<SourceType>,
}

#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base: String,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            http: Client::new(),
            base: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    /// Streaming playback URL with a cache-busting query parameter so a
    /// regenerated track is never served from a stale cache.
    pub fn play_url(&self, kind: AudioKind) -> String {
        format!(
            "{}/play-audio/{}?_={}",
            self.base,
            kind.as_str(),
            chrono::Utc::now().timestamp_millis()
        )
    }

    /// Submit a finished recording (WAV bytes) plus the selected voice.
    pub async fn upload_recording(
        &self,
        wav: Vec<u8>,
        voice: &str,
    ) -> Result<UploadAck, ApiError> {
        let part = multipart::Part::bytes(wav)
            .file_name("recording.wav")
            .mime_str("audio/wav")
            .map_err(|e| ApiError::Network(e.to_string()))?;
        let form = multipart::Form::new()
            .part("audio", part)
            .text("voice", voice.to_string());

        let resp = self
            .http
            .post(self.url("/upload-recording"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        let env = read_envelope(resp).await?;
        Ok(UploadAck {
            timestamp: env.timestamp.unwrap_or_default(),
        })
    }

    /// Submit a local audio file.
    pub async fn upload_audio(&self, path: &Path, voice: &str) -> Result<UploadAck, ApiError> {
        let form = file_form(path, UPLOAD_FILE_FIELD)
            .await?
            .text("voice", voice.to_string());
        let resp = self
            .http
            .post(self.url("/upload-audio"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        let env = read_envelope(resp).await?;
        Ok(UploadAck {
            timestamp: env.timestamp.unwrap_or_default(),
        })
    }

    /// Fetch pipeline results. The server correlates by session; no body.
    pub async fn process(&self, source: SourceType) -> Result<ProcessOutcome, ApiError> {
        let path = match source {
            SourceType::Recording => "/process-recording",
            SourceType::Upload => "/process-audio",
        };
        let env = self.post_empty(path).await?;
        Ok(ProcessOutcome {
            data: env.data.unwrap_or_default(),
            timestamp: env.timestamp.unwrap_or_default(),
            source_type: env.source_type,
        })
    }

    /// Poll the server's processing flag.
    pub async fn processing_status(&self) -> Result<bool, ApiError> {
        let resp = self
            .http
            .get(self.url("/get-processing-status"))
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        let env = read_envelope(resp).await?;
        Ok(env.is_processing.unwrap_or(false))
    }

    pub async fn stop_processing(&self) -> Result<(), ApiError> {
        self.post_empty("/stop-processing").await.map(|_| ())
    }

    pub async fn clear_session(&self) -> Result<(), ApiError> {
        self.post_empty("/clear-session").await.map(|_| ())
    }

    /// Ask the server to synthesize fresh audio for the current results.
    /// Returns the server's status message.
    pub async fn regenerate_audio(&self, target: RegenTarget) -> Result<String, ApiError> {
        let path = format!("/regenerate-audio/{}", target.path_segment());
        let env = self.post_empty(&path).await?;
        Ok(env
            .message
            .unwrap_or_else(|| "Audio regenerated".to_string()))
    }

    /// Replace the session audio with a new file; processing restarts on the
    /// upload flow afterwards.
    pub async fn replace_audio(&self, path: &Path, voice: &str) -> Result<(), ApiError> {
        let form = file_form(path, REPLACE_FILE_FIELD)
            .await?
            .text("voice", voice.to_string());
        let resp = self
            .http
            .post(self.url("/replace-audio"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        read_envelope(resp).await.map(|_| ())
    }

    /// Download one generated track for local playback.
    pub async fn fetch_audio(&self, kind: AudioKind) -> Result<Vec<u8>, ApiError> {
        use futures_util::StreamExt;

        let resp = self
            .http
            .get(self.play_url(kind))
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(ApiError::Server(format!(
                "Audio not available ({})",
                resp.status()
            )));
        }

        let mut bytes = Vec::new();
        let mut stream = resp.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| ApiError::Network(e.to_string()))?;
            bytes.extend_from_slice(&chunk);
        }
        if bytes.is_empty() {
            return Err(ApiError::Server("Audio stream was empty".into()));
        }
        Ok(bytes)
    }

    async fn post_empty(&self, path: &str) -> Result<Envelope, ApiError> {
        let resp = self
            .http
            .post(self.url(path))
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        read_envelope(resp).await
    }
}

async fn file_form(path: &Path, field: &str) -> Result<multipart::Form, ApiError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| ApiError::Network(format!("Could not read {}: {e}", path.display())))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "audio".to_string());
    Ok(multipart::Form::new().part(field.to_string(), multipart::Part::bytes(bytes).file_name(file_name)))
}

async fn read_envelope(resp: reqwest::Response) -> Result<Envelope, ApiError> {
    let status_ok = resp.status().is_success();
    let status = resp.status();
    let body = resp
        .text()
        .await
        .map_err(|e| ApiError::Network(e.to_string()))?;
    parse_envelope(status_ok, status.as_u16(), &body)
}

/// Shared verdict logic: HTTP errors and `success: false` bodies both surface
/// the server-supplied `error` string when present.
fn parse_envelope(status_ok: bool, status: u16, body: &str) -> Result<Envelope, ApiError> {
    let env: Envelope = match serde_json::from_str(body) {
        Ok(env) => env,
        Err(_) if !status_ok => return Err(ApiError::Server(format!("Request failed ({status})"))),
        Err(e) => return Err(ApiError::Network(format!("Invalid response body: {e}"))),
    };
    if !status_ok || env.success == Some(false) {
        let message = env
            .error
            .unwrap_or_else(|| format!("Request failed ({status})"));
        return Err(ApiError::Server(message));
    }
    Ok(env)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_ack_parses_timestamp() {
        let env =
            parse_envelope(true, 200, r#"{"success": true, "timestamp": "20240101-1200"}"#)
                .unwrap();
        assert_eq!(env.timestamp.as_deref(), Some("20240101-1200"));
    }

    #[test]
    fn process_response_parses_all_fields() {
        let body = r#"{
            "success": true,
            "data": {
                "pashto_question": "q-ps",
                "english_question": "q-en",
                "pashto_answer": "a-ps",
                "english_answer": "a-en"
            },
            "timestamp": "20240101-1200",
            "source_type": "upload",
            "message": "Results retrieved"
        }"#;
        let env = parse_envelope(true, 200, body).unwrap();
        let data = env.data.unwrap();
        assert_eq!(data.pashto_question(), "q-ps");
        assert_eq!(data.english_answer(), "a-en");
        assert_eq!(env.source_type, Some(SourceType::Upload));
        assert_eq!(env.timestamp.as_deref(), Some("20240101-1200"));
    }

    #[test]
    fn missing_transcript_fields_fall_back_to_placeholders() {
        let data = TranscriptSet::default();
        assert_eq!(data.pashto_question(), "Transcription not available");
        assert_eq!(data.english_question(), "Translation not available");
        assert_eq!(data.pashto_answer(), "Answer not available");
        assert_eq!(data.english_answer(), "Answer translation not available");
    }

    #[test]
    fn success_false_surfaces_server_error() {
        let err = parse_envelope(true, 200, r#"{"success": false, "error": "no_speech"}"#)
            .unwrap_err();
        assert!(matches!(&err, ApiError::Server(e) if e == "no_speech"));
        assert_eq!(
            err.user_message(),
            "No speech detected. Please speak in Pashto during recording."
        );
    }

    #[test]
    fn http_error_without_error_field_is_generic() {
        let err = parse_envelope(false, 500, "<html>oops</html>").unwrap_err();
        assert!(matches!(&err, ApiError::Server(e) if e.contains("500")));
    }

    #[test]
    fn http_error_with_json_error_uses_server_message() {
        let err = parse_envelope(false, 400, r#"{"error": "No file provided"}"#).unwrap_err();
        assert!(matches!(&err, ApiError::Server(e) if e == "No file provided"));
    }

    #[test]
    fn status_response_parses_flag() {
        let env = parse_envelope(true, 200, r#"{"is_processing": true}"#).unwrap();
        assert_eq!(env.is_processing, Some(true));
    }

    #[test]
    fn play_url_carries_cache_buster() {
        let api = ApiClient::new("http://localhost:5000/");
        let url = api.play_url(AudioKind::Question);
        assert!(url.starts_with("http://localhost:5000/play-audio/question?_="));
    }

    #[test]
    fn upload_and_replace_use_their_own_file_fields() {
        assert_eq!(UPLOAD_FILE_FIELD, "audio_file");
        assert_eq!(REPLACE_FILE_FIELD, "file");
        assert_ne!(UPLOAD_FILE_FIELD, REPLACE_FILE_FIELD);
    }

    #[test]
    fn regen_targets_map_to_path_segments() {
        assert_eq!(RegenTarget::Question.path_segment(), "pashto_question");
        assert_eq!(RegenTarget::Answer.path_segment(), "pashto_answer");
        assert_eq!(RegenTarget::All.path_segment(), "all");
    }
}
