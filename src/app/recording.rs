use super::state::{AppState, RecorderPhase};
use crate::console;
use crate::player::Player;
use crate::recorder::{self, MicAccess};

/// Recording auto-stops after this many seconds.
pub const MAX_RECORDING_SECS: u32 = 60;

/// Start recording from the microphone. Guards: no active job, mic usable.
pub fn start_recording(state: &mut AppState) {
    if state.busy() {
        let msg = "Processing is active. Please stop it first or wait for it to complete.";
        state.banners.show_error(msg);
        console::print_error(msg);
        return;
    }
    if state.recorder_phase == RecorderPhase::Recording {
        return;
    }

    // Permission gate: probe the device on every attempt.
    match recorder::probe_microphone() {
        MicAccess::Granted => {}
        MicAccess::NoDevice => {
            let msg = "No microphone found. Please connect a microphone and try again.";
            state.banners.show_error_persistent(msg);
            console::print_error(msg);
            return;
        }
        MicAccess::Unavailable(e) => {
            let msg = format!("Failed to access microphone: {e}");
            state.banners.show_error_persistent(&msg);
            console::print_error(&msg);
            return;
        }
    }

    log::info!("Starting recording");

    // Discard any previous take before capturing a new one.
    state.preview = None;
    state.recording.wav = None;
    state.recording.elapsed_secs = 0;
    state.recording.slices.lock().unwrap().clear();

    match recorder::start_capture(state.recording.slices.clone()) {
        Ok((stream, sample_rate)) => {
            state.recording.stream = Some(stream);
            state.recording.sample_rate = sample_rate;
            state.recorder_phase = RecorderPhase::Recording;
            console::print_status("Recording... speak your question in Pashto.");
            console::print_recording_timer(0);
        }
        Err(e) => {
            log::error!("Failed to start recording: {e}");
            state.recorder_phase = RecorderPhase::Idle;
            let msg = format!("Failed to access microphone: {e}");
            state.banners.show_error(&msg);
            console::print_error(&msg);
        }
    }
}

/// 1Hz while recording: advance the timer, auto-stop at the limit.
pub fn recording_tick(state: &mut AppState) {
    if state.recorder_phase != RecorderPhase::Recording {
        return;
    }
    state.recording.elapsed_secs += 1;
    console::print_recording_timer(state.recording.elapsed_secs);
    if state.recording.elapsed_secs >= MAX_RECORDING_SECS {
        console::print_status("Maximum recording length reached.");
        stop_recording(state);
    }
}

/// Stop capture, concatenate the slices and encode the WAV payload.
pub fn stop_recording(state: &mut AppState) {
    if state.recorder_phase != RecorderPhase::Recording {
        return;
    }
    log::info!("Stopping recording");
    release_capture(state);

    let slices = state.recording.slices.lock().unwrap().clone();
    if slices.is_empty() {
        fail_capture(state, "Recording failed: No audio data captured.");
        return;
    }
    let samples = recorder::concat_slices(&slices);
    if samples.is_empty() {
        fail_capture(state, "Recording is empty. Please try again.");
        return;
    }

    let seconds = samples.len() as f32 / state.recording.sample_rate as f32;
    log::info!(
        "Captured {} samples ({seconds:.1}s at {}Hz)",
        samples.len(),
        state.recording.sample_rate
    );

    match recorder::samples_to_wav(&samples, state.recording.sample_rate) {
        Ok(wav) => {
            state.recording.wav = Some(wav);
            state.recorder_phase = RecorderPhase::Stopped;
            console::print_status(&format!(
                "Recording complete ({seconds:.1}s). 'preview' to listen, 'submit' to process, 'rerecord' to discard."
            ));
        }
        Err(e) => {
            log::error!("WAV encoding failed: {e}");
            fail_capture(state, &format!("Error processing recording: {e}"));
        }
    }
}

/// Play the captured take through the speakers.
pub fn preview_recording(state: &mut AppState) {
    let wav = match (&state.recorder_phase, &state.recording.wav) {
        (RecorderPhase::Stopped, Some(wav)) => wav.clone(),
        _ => {
            console::print_error("No recording to preview. Record something first.");
            return;
        }
    };
    match Player::start(&wav) {
        Ok(player) => {
            console::print_status(&format!(
                "Playing recording ({})",
                crate::playback::format_time(player.duration_secs())
            ));
            state.preview = Some(player);
        }
        Err(e) => {
            let msg = format!("Failed to play recording: {e}");
            state.banners.show_error(&msg);
            console::print_error(&msg);
        }
    }
}

/// Cancel/re-record from any phase: release the device, drop all captured
/// data and return to idle.
pub fn reset_recording(state: &mut AppState) {
    release_capture(state);
    state.recording.slices.lock().unwrap().clear();
    state.recording.wav = None;
    state.recording.elapsed_secs = 0;
    state.preview = None;
    state.recorder_phase = RecorderPhase::Idle;
    log::info!("Recording reset");
}

fn fail_capture(state: &mut AppState, message: &str) {
    state.banners.show_error(message);
    console::print_error(message);
    reset_recording(state);
}

/// Stop and drop the capture stream. Dropping closes the device; this must
/// happen on every exit path.
fn release_capture(state: &mut AppState) {
    if let Some(stream) = state.recording.stream.take() {
        use cpal::traits::StreamTrait;
        if let Err(e) = stream.pause() {
            log::warn!("Failed to pause capture stream: {e}");
        }
        drop(stream);
    }
}
