use std::time::Instant;

use super::state::{AppState, ControllerEvent, RecorderPhase};
use super::{audio, pipeline, recording};
use crate::console::{self, Command};
use crate::playback::AudioKind;

/// Central dispatch: every state change goes through here, one event at a
/// time on the event-loop thread.
pub fn handle_event(state: &mut AppState, event: ControllerEvent) {
    match event {
        ControllerEvent::Command(cmd) => handle_command(state, cmd),
        ControllerEvent::Tick => on_tick(state),
        ControllerEvent::StatusPolled(remote) => on_status_polled(state, remote),
        ControllerEvent::UploadFinished(job_id, result) => {
            pipeline::on_upload_finished(state, job_id, result)
        }
        ControllerEvent::ProcessFinished(job_id, result) => {
            pipeline::on_process_finished(state, job_id, result)
        }
        ControllerEvent::Pacing(job_id, stage) => pipeline::on_pacing(state, job_id, stage),
        ControllerEvent::StopFinished(result) => pipeline::on_stop_finished(state, result),
        ControllerEvent::ClearFinished(result) => pipeline::on_clear_finished(state, result),
        ControllerEvent::RegenerateFinished(result) => {
            pipeline::on_regenerate_finished(state, result)
        }
        ControllerEvent::ReplaceFinished(result) => pipeline::on_replace_finished(state, result),
        ControllerEvent::AudioFetched(kind, result) => {
            audio::on_audio_fetched(state, kind, result)
        }
        ControllerEvent::InputClosed => {
            log::info!("Input closed, shutting down");
            state.quit = true;
        }
    }
}

fn handle_command(state: &mut AppState, cmd: Command) {
    match cmd {
        Command::Record => recording::start_recording(state),
        Command::StopRecording => recording::stop_recording(state),
        Command::Submit => pipeline::submit_recording(state),
        Command::ReRecord | Command::CancelRecording => {
            recording::reset_recording(state);
            console::print_status("Recording discarded.");
        }
        Command::Preview => recording::preview_recording(state),
        Command::Upload(path) => pipeline::submit_upload(state, path),
        Command::Play(kind) => audio::play(state, kind),
        Command::Pause(kind) => audio::pause(state, kind),
        Command::StopAudio(kind) => audio::stop(state, kind),
        Command::StopProcessing => pipeline::dispatch_stop(state),
        Command::Regenerate(target) => pipeline::dispatch_regenerate(state, target),
        Command::Replace(path) => pipeline::dispatch_replace(state, path),
        Command::ClearSession => pipeline::dispatch_clear(state),
        Command::Status => print_state(state),
        Command::Results => print_results(state),
        Command::Voice(voice) => set_voice(state, voice),
        Command::Help => console::print_help(),
        Command::Quit => state.quit = true,
    }
}

/// 1Hz housekeeping: banner expiry, recording/processing timers, playback
/// highlight updates.
fn on_tick(state: &mut AppState) {
    state.banners.expire(Instant::now());
    recording::recording_tick(state);
    if let Some(job) = state.job.as_mut() {
        job.elapsed_secs += 1;
    }
    audio::playback_tick(state);
}

/// Reconcile the server-side processing flag with local state. A foreign job
/// (started elsewhere against the same server) locks the controls; the lock
/// lifts as soon as the server reports idle. The local job is never killed
/// here, its own completion events end it.
fn on_status_polled(state: &mut AppState, remote: bool) {
    if remote && state.job.is_none() && !state.remote_lock {
        state.remote_lock = true;
        let msg = "Processing through hybrid AI pipeline...";
        state.banners.show_status_persistent(msg);
        console::print_status(msg);
    } else if !remote && state.remote_lock {
        state.remote_lock = false;
        state.banners.clear_status();
        console::print_status("Server processing finished. Controls unlocked.");
    }
}

fn print_state(state: &AppState) {
    let recorder = match state.recorder_phase {
        RecorderPhase::Idle => "idle".to_string(),
        RecorderPhase::Recording => format!("recording ({}s)", state.recording.elapsed_secs),
        RecorderPhase::Stopped => "recorded, awaiting submit".to_string(),
    };
    console::print_status(&format!("server: {}", state.api.base_url()));
    console::print_status(&format!("voice: {}", state.config.voice));
    console::print_status(&format!("recorder: {recorder}"));
    match &state.job {
        Some(job) => console::print_status(&format!(
            "processing: step {}/4 ({}) for {}s",
            job.step.number(),
            job.step.label(),
            job.elapsed_secs
        )),
        None if state.remote_lock => {
            console::print_status("processing: locked by a job started elsewhere")
        }
        None => console::print_status("processing: idle"),
    }
    match &state.timestamp {
        Some(ts) => console::print_status(&format!("last job: {ts}")),
        None => console::print_status("last job: none"),
    }
    for kind in [AudioKind::Question, AudioKind::Answer] {
        let slot = state.slot(kind);
        console::print_status(&format!("{kind} audio: {}", slot.state.status.label()));
    }
    if let Some(msg) = state.banners.error() {
        console::print_status(&format!("last error: {msg}"));
    }
}

fn print_results(state: &AppState) {
    match (&state.transcripts, &state.timestamp) {
        (Some(data), Some(ts)) => {
            let label = state
                .source_type
                .map(crate::api::SourceType::label)
                .unwrap_or("Processed audio");
            console::render_results(data, label, ts);
        }
        _ => console::print_error("No results yet. Process a recording or upload first."),
    }
}

fn set_voice(state: &mut AppState, voice: String) {
    if voice.trim().is_empty() {
        console::print_error("Voice id cannot be empty.");
        return;
    }
    state.config.voice = voice;
    if let Err(e) = state.config.save() {
        log::warn!("Failed to save config: {e}");
    }
    console::print_status(&format!("Voice set to {}", state.config.voice));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::SourceType;
    use crate::app::state::{ProcessingJob, ProcessingStep};
    use crate::config::Config;
    use crate::session::Session;

    fn state() -> AppState {
        let (tx, _rx) = async_channel::unbounded();
        AppState::new(Config::default(), Session::default(), tx)
    }

    fn local_job(id: u64) -> ProcessingJob {
        ProcessingJob {
            id,
            source: SourceType::Recording,
            step: ProcessingStep::Pipeline,
            elapsed_secs: 0,
        }
    }

    #[test]
    fn foreign_job_locks_controls() {
        let mut s = state();
        handle_event(&mut s, ControllerEvent::StatusPolled(true));
        assert!(s.remote_lock);
        assert!(s.busy());
        assert!(s.banners.status().is_some());
    }

    #[test]
    fn lock_lifts_when_server_goes_idle() {
        let mut s = state();
        handle_event(&mut s, ControllerEvent::StatusPolled(true));
        handle_event(&mut s, ControllerEvent::StatusPolled(false));
        assert!(!s.remote_lock);
        assert!(!s.busy());
        assert!(s.banners.status().is_none());
    }

    #[test]
    fn poll_does_not_lock_during_own_job() {
        let mut s = state();
        s.job = Some(local_job(1));
        handle_event(&mut s, ControllerEvent::StatusPolled(true));
        assert!(!s.remote_lock);
    }

    #[test]
    fn idle_poll_leaves_own_job_running() {
        let mut s = state();
        s.job = Some(local_job(1));
        handle_event(&mut s, ControllerEvent::StatusPolled(false));
        assert!(s.job.is_some());
    }

    #[test]
    fn repeated_busy_polls_are_idempotent() {
        let mut s = state();
        handle_event(&mut s, ControllerEvent::StatusPolled(true));
        handle_event(&mut s, ControllerEvent::StatusPolled(true));
        assert!(s.remote_lock);
    }

    #[test]
    fn input_closed_requests_quit() {
        let mut s = state();
        handle_event(&mut s, ControllerEvent::InputClosed);
        assert!(s.quit);
    }

    #[test]
    fn submit_is_refused_while_locked() {
        let mut s = state();
        s.remote_lock = true;
        handle_event(&mut s, ControllerEvent::Command(Command::Submit));
        assert!(s.job.is_none());
        assert!(s.banners.error().is_some());
    }

    #[test]
    fn tick_counts_job_time() {
        let mut s = state();
        s.job = Some(local_job(1));
        handle_event(&mut s, ControllerEvent::Tick);
        handle_event(&mut s, ControllerEvent::Tick);
        assert_eq!(s.job.as_ref().unwrap().elapsed_secs, 2);
    }

    #[test]
    fn recording_auto_stops_at_the_limit() {
        let mut s = state();
        s.recorder_phase = RecorderPhase::Recording;
        for _ in 0..recording::MAX_RECORDING_SECS {
            handle_event(&mut s, ControllerEvent::Tick);
        }
        // No device in tests, so the stop path finds no captured audio and
        // resets to idle with an error banner.
        assert_eq!(s.recorder_phase, RecorderPhase::Idle);
        assert_eq!(s.recording.elapsed_secs, 0);
        assert!(s.banners.error().is_some());
    }

    #[test]
    fn stale_process_result_does_not_touch_the_active_job() {
        use crate::api::{ProcessOutcome, TranscriptSet};

        let mut s = state();
        s.job_seq = 2;
        s.job = Some(local_job(2));
        let outcome = ProcessOutcome {
            data: TranscriptSet::default(),
            timestamp: "stale".into(),
            source_type: None,
        };
        handle_event(&mut s, ControllerEvent::ProcessFinished(1, Ok(outcome)));
        assert!(s.timestamp.is_none());
        assert_eq!(s.job.as_ref().unwrap().step, ProcessingStep::Pipeline);
    }

    #[test]
    fn stale_pacing_does_not_advance_the_active_job() {
        use crate::app::state::PacingStage;

        let mut s = state();
        s.job_seq = 2;
        s.job = Some(local_job(2));
        handle_event(&mut s, ControllerEvent::Pacing(1, PacingStage::Complete));
        assert!(s.job.is_some());
    }

    #[test]
    fn voice_command_updates_config() {
        let mut s = state();
        handle_command(&mut s, Command::Voice("v_test123".into()));
        assert_eq!(s.config.voice, "v_test123");
    }
}
