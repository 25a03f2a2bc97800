use std::sync::{Arc, Mutex};

use crate::api::{ApiClient, ApiError, ProcessOutcome, SourceType, TranscriptSet, UploadAck};
use crate::banner::Banners;
use crate::config::Config;
use crate::console::Command;
use crate::playback::{AudioKind, PlaybackState};
use crate::player::Player;
use crate::session::Session;

/// Events driving the controller: user commands, timers, poll results and
/// completions reported by spawned network tasks.
#[derive(Debug)]
pub enum ControllerEvent {
    Command(Command),
    /// 1Hz tick: recording/processing timers, banner expiry, playback progress.
    Tick,
    /// Result of the 3s background poll of `/get-processing-status`.
    StatusPolled(bool),
    /// Task completions carry the id of the job they were spawned for; a
    /// result for any other id is stale and ignored.
    UploadFinished(u64, Result<UploadAck, ApiError>),
    ProcessFinished(u64, Result<ProcessOutcome, ApiError>),
    /// Cosmetic pacing between progress steps; no real dependency.
    Pacing(u64, PacingStage),
    StopFinished(Result<(), ApiError>),
    ClearFinished(Result<(), ApiError>),
    RegenerateFinished(Result<String, ApiError>),
    ReplaceFinished(Result<(), ApiError>),
    AudioFetched(AudioKind, Result<Vec<u8>, ApiError>),
    /// stdin closed; shut down.
    InputClosed,
}

/// Stages emitted by the pacing task that sequences the progress display.
#[derive(Debug, Clone, Copy)]
pub enum PacingStage {
    /// Kick off the process call for the given source.
    PipelineStart(SourceType),
    ResultsFinalized,
    AudioLoaded,
    Complete,
}

/// Recording side of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderPhase {
    Idle,
    Recording,
    /// Stopped with a preview available, awaiting submit/re-record/cancel.
    Stopped,
}

/// The four sequential progress steps, 25% each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStep {
    Upload,
    Pipeline,
    Finalize,
    AudioLoad,
}

impl ProcessingStep {
    pub fn number(self) -> u8 {
        match self {
            ProcessingStep::Upload => 1,
            ProcessingStep::Pipeline => 2,
            ProcessingStep::Finalize => 3,
            ProcessingStep::AudioLoad => 4,
        }
    }

    pub fn percent(self) -> u8 {
        self.number() * 25
    }

    pub fn label(self) -> &'static str {
        match self {
            ProcessingStep::Upload => "Uploading",
            ProcessingStep::Pipeline => "Hybrid AI pipeline",
            ProcessingStep::Finalize => "Finalizing results",
            ProcessingStep::AudioLoad => "Loading audio",
        }
    }
}

/// Live capture state. The cpal stream is the one real hardware resource;
/// every exit path must drop it.
pub struct RecordingSession {
    pub slices: Arc<Mutex<Vec<Vec<f32>>>>,
    pub stream: Option<cpal::Stream>,
    pub sample_rate: u32,
    pub elapsed_secs: u32,
    /// Encoded WAV of the finished recording, the upload payload.
    pub wav: Option<Vec<u8>>,
}

impl RecordingSession {
    pub fn new() -> Self {
        Self {
            slices: Arc::new(Mutex::new(Vec::new())),
            stream: None,
            sample_rate: crate::recorder::TARGET_SAMPLE_RATE,
            elapsed_secs: 0,
            wav: None,
        }
    }
}

/// The single active job. Its presence is the local processing flag; the id
/// distinguishes it from any job that was stopped or replaced while network
/// tasks were still in flight.
#[derive(Debug)]
pub struct ProcessingJob {
    pub id: u64,
    pub source: SourceType,
    pub step: ProcessingStep,
    pub elapsed_secs: u64,
}

/// One generated track: visual state, live player, downloaded bytes.
#[derive(Default)]
pub struct AudioSlot {
    pub state: PlaybackState,
    pub player: Option<Player>,
    pub cache: Option<Vec<u8>>,
    /// A fetch task is in flight; don't start another.
    pub loading: bool,
}

impl AudioSlot {
    /// Drop the player and reset the control display.
    pub fn stop(&mut self) {
        self.player = None;
        self.state.reset_control();
    }
}

/// Central application state, owned by the event loop.
pub struct AppState {
    pub config: Config,
    pub api: ApiClient,
    pub tx: async_channel::Sender<ControllerEvent>,

    pub recorder_phase: RecorderPhase,
    pub recording: RecordingSession,
    pub preview: Option<Player>,

    pub job: Option<ProcessingJob>,
    /// Monotonic id source for jobs.
    pub job_seq: u64,
    /// The server reported a job this client didn't start.
    pub remote_lock: bool,

    pub timestamp: Option<String>,
    pub source_type: Option<SourceType>,
    pub transcripts: Option<TranscriptSet>,

    pub question: AudioSlot,
    pub answer: AudioSlot,

    pub banners: Banners,
    pub quit: bool,
}

impl AppState {
    pub fn new(
        config: Config,
        session: Session,
        tx: async_channel::Sender<ControllerEvent>,
    ) -> Self {
        let api = ApiClient::new(&config.server_url);
        Self {
            config,
            api,
            tx,
            recorder_phase: RecorderPhase::Idle,
            recording: RecordingSession::new(),
            preview: None,
            job: None,
            job_seq: 0,
            remote_lock: false,
            timestamp: session.timestamp,
            source_type: session.source_type,
            transcripts: None,
            question: AudioSlot::default(),
            answer: AudioSlot::default(),
            banners: Banners::default(),
            quit: false,
        }
    }

    /// A new submission is blocked while any job is active, ours or foreign.
    pub fn busy(&self) -> bool {
        self.job.is_some() || self.remote_lock
    }

    pub fn slot_mut(&mut self, kind: AudioKind) -> &mut AudioSlot {
        match kind {
            AudioKind::Question => &mut self.question,
            AudioKind::Answer => &mut self.answer,
        }
    }

    pub fn slot(&self, kind: AudioKind) -> &AudioSlot {
        match kind {
            AudioKind::Question => &self.question,
            AudioKind::Answer => &self.answer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> AppState {
        let (tx, _rx) = async_channel::unbounded();
        AppState::new(Config::default(), Session::default(), tx)
    }

    #[test]
    fn fresh_state_is_idle() {
        let s = state();
        assert!(!s.busy());
        assert_eq!(s.recorder_phase, RecorderPhase::Idle);
        assert!(s.timestamp.is_none());
    }

    #[test]
    fn local_job_marks_busy() {
        let mut s = state();
        s.job = Some(ProcessingJob {
            id: 1,
            source: SourceType::Upload,
            step: ProcessingStep::Upload,
            elapsed_secs: 0,
        });
        assert!(s.busy());
    }

    #[test]
    fn remote_lock_marks_busy() {
        let mut s = state();
        s.remote_lock = true;
        assert!(s.busy());
    }

    #[test]
    fn session_restores_previous_job_reference() {
        let (tx, _rx) = async_channel::unbounded();
        let session = Session {
            timestamp: Some("20240101-1200".into()),
            source_type: Some(SourceType::Recording),
        };
        let s = AppState::new(Config::default(), session, tx);
        assert_eq!(s.timestamp.as_deref(), Some("20240101-1200"));
        assert_eq!(s.source_type, Some(SourceType::Recording));
    }

    #[test]
    fn steps_advance_in_quarter_increments() {
        assert_eq!(ProcessingStep::Upload.percent(), 25);
        assert_eq!(ProcessingStep::Pipeline.percent(), 50);
        assert_eq!(ProcessingStep::Finalize.percent(), 75);
        assert_eq!(ProcessingStep::AudioLoad.percent(), 100);
    }
}
