use std::path::PathBuf;
use std::time::Duration;

use super::state::{
    AppState, ControllerEvent, PacingStage, ProcessingJob, ProcessingStep, RecorderPhase,
};
use crate::api::{ApiError, ProcessOutcome, RegenTarget, SourceType, UploadAck};
use crate::console;
use crate::session::Session;

/// Submit the finished recording to the pipeline.
pub fn submit_recording(state: &mut AppState) {
    if refuse_if_busy(state) {
        return;
    }
    let wav = match (&state.recorder_phase, &state.recording.wav) {
        (RecorderPhase::Stopped, Some(wav)) => wav.clone(),
        _ => {
            let msg = "No recording found. Please record audio first.";
            state.banners.show_error(msg);
            console::print_error(msg);
            return;
        }
    };

    let job_id = begin_job(state, SourceType::Recording, "Uploading recording to server...");

    let api = state.api.clone();
    let tx = state.tx.clone();
    let voice = state.config.voice.clone();
    tokio::spawn(async move {
        let result = api.upload_recording(wav, &voice).await;
        let _ = tx
            .send(ControllerEvent::UploadFinished(job_id, result))
            .await;
    });
}

/// Submit a local audio file to the pipeline.
pub fn submit_upload(state: &mut AppState, path: PathBuf) {
    if refuse_if_busy(state) {
        return;
    }
    if !path.is_file() {
        let msg = format!("Please select an audio file: {} not found", path.display());
        state.banners.show_error(&msg);
        console::print_error(&msg);
        return;
    }

    let job_id = begin_job(state, SourceType::Upload, "Uploading your audio file to server...");

    let api = state.api.clone();
    let tx = state.tx.clone();
    let voice = state.config.voice.clone();
    tokio::spawn(async move {
        let result = api.upload_audio(&path, &voice).await;
        let _ = tx
            .send(ControllerEvent::UploadFinished(job_id, result))
            .await;
    });
}

pub fn on_upload_finished(
    state: &mut AppState,
    job_id: u64,
    result: Result<UploadAck, ApiError>,
) {
    let Some(source) = active_job_source(state, job_id, "upload result") else {
        return;
    };
    match result {
        Ok(ack) => {
            print_step(ProcessingStep::Upload, "Uploaded successfully");
            state.timestamp = Some(ack.timestamp);
            state.source_type = Some(source);
            print_step(ProcessingStep::Pipeline, "Starting hybrid AI pipeline...");
            // Short cosmetic pause before the process call, matching the
            // server-facing pacing of the progress display.
            let tx = state.tx.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(1)).await;
                let _ = tx
                    .send(ControllerEvent::Pacing(
                        job_id,
                        PacingStage::PipelineStart(source),
                    ))
                    .await;
            });
        }
        Err(e) => fail_job(state, &e),
    }
}

pub fn on_process_finished(
    state: &mut AppState,
    job_id: u64,
    result: Result<ProcessOutcome, ApiError>,
) {
    let Some(source) = active_job_source(state, job_id, "process result") else {
        return;
    };
    match result {
        Ok(outcome) => {
            if let Some(job) = state.job.as_mut() {
                job.step = ProcessingStep::Finalize;
            }
            print_step(ProcessingStep::Finalize, "Finalizing processing results...");

            // Transcripts drive both the results panel and word highlighting.
            state
                .question
                .state
                .set_transcript(outcome.data.pashto_question.as_deref());
            state
                .answer
                .state
                .set_transcript(outcome.data.pashto_answer.as_deref());
            state.transcripts = Some(outcome.data);

            // Fresh audio exists server-side; drop anything cached.
            state.question.stop();
            state.question.cache = None;
            state.answer.stop();
            state.answer.cache = None;

            // A missing timestamp keeps the previous one (replace-audio path).
            let timestamp = if outcome.timestamp.is_empty() {
                state.timestamp.clone().unwrap_or_default()
            } else {
                outcome.timestamp
            };
            state.timestamp = Some(timestamp);
            state.source_type = outcome.source_type.or(Some(source));
            let session = Session {
                timestamp: state.timestamp.clone(),
                source_type: state.source_type,
            };
            if let Err(e) = session.save() {
                log::warn!("Failed to save session: {e}");
            }

            spawn_finalize_pacing(state, job_id);
        }
        Err(e) => fail_job(state, &e),
    }
}

pub fn on_pacing(state: &mut AppState, job_id: u64, stage: PacingStage) {
    // A stop or error may have killed the job, or a new one replaced it,
    // while the pacing task slept.
    if state.job.as_ref().map(|j| j.id) != Some(job_id) {
        log::debug!("Ignoring pacing stage {stage:?} for job {job_id}");
        return;
    }
    match stage {
        PacingStage::PipelineStart(source) => {
            if let Some(job) = state.job.as_mut() {
                job.step = ProcessingStep::Pipeline;
            }
            print_step(
                ProcessingStep::Pipeline,
                "Processing: ASR, translation, answer generation, TTS...",
            );
            let api = state.api.clone();
            let tx = state.tx.clone();
            tokio::spawn(async move {
                let result = api.process(source).await;
                let _ = tx
                    .send(ControllerEvent::ProcessFinished(job_id, result))
                    .await;
            });
        }
        PacingStage::ResultsFinalized => {
            if let Some(job) = state.job.as_mut() {
                job.step = ProcessingStep::AudioLoad;
            }
            print_step(ProcessingStep::AudioLoad, "Loading generated audio files...");
        }
        PacingStage::AudioLoaded => {
            console::print_status("Hybrid AI processing completed successfully!");
        }
        PacingStage::Complete => complete_job(state),
    }
}

/// Ask the server to abandon the current job. Always allowed; on
/// acknowledgement all local processing and recording state resets.
pub fn dispatch_stop(state: &mut AppState) {
    let api = state.api.clone();
    let tx = state.tx.clone();
    tokio::spawn(async move {
        let result = api.stop_processing().await;
        let _ = tx.send(ControllerEvent::StopFinished(result)).await;
    });
}

pub fn on_stop_finished(state: &mut AppState, result: Result<(), ApiError>) {
    match result {
        Ok(()) => {
            state.job = None;
            state.remote_lock = false;
            state.banners.clear_status();
            super::recording::reset_recording(state);
            let msg = "Processing stopped. You can now upload new audio or record again.";
            state.banners.show_status(msg);
            console::print_status(msg);
        }
        Err(e) => {
            log::error!("Stop request failed: {e}");
            let msg = "Failed to stop processing";
            state.banners.show_error(msg);
            console::print_error(msg);
        }
    }
}

/// Wipe the server session and every piece of local result state.
pub fn dispatch_clear(state: &mut AppState) {
    if refuse_if_busy(state) {
        return;
    }
    let api = state.api.clone();
    let tx = state.tx.clone();
    tokio::spawn(async move {
        let result = api.clear_session().await;
        let _ = tx.send(ControllerEvent::ClearFinished(result)).await;
    });
}

pub fn on_clear_finished(state: &mut AppState, result: Result<(), ApiError>) {
    match result {
        Ok(()) => {
            state.question.stop();
            state.question.cache = None;
            state.answer.stop();
            state.answer.cache = None;
            state.transcripts = None;
            state.timestamp = None;
            state.source_type = None;
            state.job = None;
            state.banners.clear_error();
            super::recording::reset_recording(state);
            Session::wipe();
            let msg =
                "Session cleared. You can now upload a new audio file or start recording.";
            state.banners.show_status(msg);
            console::print_status(msg);
        }
        Err(e) => {
            let msg = e.user_message();
            state.banners.show_error(&msg);
            console::print_error(&msg);
        }
    }
}

/// Ask the server to synthesize fresh TTS audio for the current results.
pub fn dispatch_regenerate(state: &mut AppState, target: RegenTarget) {
    if refuse_if_busy(state) {
        return;
    }
    if state.timestamp.is_none() {
        let msg = "No processed results yet. Process a recording or upload first.";
        state.banners.show_error(msg);
        console::print_error(msg);
        return;
    }
    console::print_status("Regenerating audio...");
    let api = state.api.clone();
    let tx = state.tx.clone();
    tokio::spawn(async move {
        let result = api.regenerate_audio(target).await;
        let _ = tx.send(ControllerEvent::RegenerateFinished(result)).await;
    });
}

pub fn on_regenerate_finished(state: &mut AppState, result: Result<String, ApiError>) {
    match result {
        Ok(message) => {
            // Cached bytes are stale; the next play fetches with a fresh
            // cache buster.
            state.question.stop();
            state.question.cache = None;
            state.answer.stop();
            state.answer.cache = None;
            state.banners.show_status(&message);
            console::print_status(&message);
        }
        Err(e) => {
            let msg = e.user_message();
            state.banners.show_error(&msg);
            console::print_error(&msg);
        }
    }
}

/// Upload a replacement audio file, then rerun the processing flow.
pub fn dispatch_replace(state: &mut AppState, path: PathBuf) {
    if refuse_if_busy(state) {
        return;
    }
    if !path.is_file() {
        let msg = format!(
            "Please select an audio file to replace: {} not found",
            path.display()
        );
        state.banners.show_error(&msg);
        console::print_error(&msg);
        return;
    }
    console::print_status("Uploading replacement audio...");
    let api = state.api.clone();
    let tx = state.tx.clone();
    let voice = state.config.voice.clone();
    tokio::spawn(async move {
        let result = api.replace_audio(&path, &voice).await;
        let _ = tx.send(ControllerEvent::ReplaceFinished(result)).await;
    });
}

pub fn on_replace_finished(state: &mut AppState, result: Result<(), ApiError>) {
    match result {
        Ok(()) => {
            let msg = "Audio replaced successfully. Processing...";
            state.banners.show_status(msg);
            console::print_status(msg);

            let job_id = begin_job(
                state,
                SourceType::Upload,
                "Processing new audio file through hybrid AI pipeline...",
            );
            let tx = state.tx.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(500)).await;
                let _ = tx
                    .send(ControllerEvent::Pacing(
                        job_id,
                        PacingStage::PipelineStart(SourceType::Upload),
                    ))
                    .await;
            });
        }
        Err(e) => {
            let msg = e.user_message();
            state.banners.show_error(&msg);
            console::print_error(&msg);
        }
    }
}

/// Any failure is terminal: banner, progress hidden, flags reset so the next
/// command starts clean.
pub fn fail_job(state: &mut AppState, error: &ApiError) {
    log::error!("Processing failed: {error}");
    let msg = error.user_message();
    state.banners.show_error(&msg);
    console::print_error(&msg);
    state.job = None;
}

fn complete_job(state: &mut AppState) {
    state.job = None;
    if let (Some(data), Some(ts)) = (&state.transcripts, &state.timestamp) {
        let label = state
            .source_type
            .map(SourceType::label)
            .unwrap_or("Processed audio");
        console::render_results(data, label, ts);
    }
    let msg = "Processing completed through hybrid AI pipeline!";
    state.banners.show_status(msg);
}

fn begin_job(state: &mut AppState, source: SourceType, detail: &str) -> u64 {
    // New results invalidate the old players.
    state.question.stop();
    state.answer.stop();
    state.preview = None;

    state.job_seq += 1;
    let id = state.job_seq;
    state.job = Some(ProcessingJob {
        id,
        source,
        step: ProcessingStep::Upload,
        elapsed_secs: 0,
    });
    console::print_status("Processing through hybrid AI pipeline...");
    print_step(ProcessingStep::Upload, detail);
    id
}

fn print_step(step: ProcessingStep, detail: &str) {
    console::print_progress(step.number(), step.percent(), step.label(), detail);
}

fn spawn_finalize_pacing(state: &AppState, job_id: u64) {
    let tx = state.tx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        let _ = tx
            .send(ControllerEvent::Pacing(job_id, PacingStage::ResultsFinalized))
            .await;
        tokio::time::sleep(Duration::from_millis(1500)).await;
        let _ = tx
            .send(ControllerEvent::Pacing(job_id, PacingStage::AudioLoaded))
            .await;
        tokio::time::sleep(Duration::from_secs(1)).await;
        let _ = tx
            .send(ControllerEvent::Pacing(job_id, PacingStage::Complete))
            .await;
    });
}

/// Stale network callbacks are ignored: the result must belong to the job
/// that is still active, not one that was stopped or replaced in the
/// meantime. Returns the active job's source on a match.
fn active_job_source(state: &AppState, job_id: u64, what: &str) -> Option<SourceType> {
    match &state.job {
        Some(job) if job.id == job_id => Some(job.source),
        _ => {
            log::info!("Ignoring stale {what} for job {job_id}");
            None
        }
    }
}

fn refuse_if_busy(state: &mut AppState) -> bool {
    if state.busy() {
        let msg = "Processing is active. Please stop it first or wait for it to complete.";
        state.banners.show_error(msg);
        console::print_error(msg);
        return true;
    }
    false
}
