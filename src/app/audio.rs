use super::state::{AppState, ControllerEvent};
use crate::api::ApiError;
use crate::console;
use crate::playback::{self, AudioKind, PlayerStatus};
use crate::player::Player;

/// Play (or resume) one of the generated tracks. Fetches the audio from the
/// streaming endpoint on first use; afterwards the downloaded bytes replay
/// without another round trip until regeneration invalidates them.
pub fn play(state: &mut AppState, kind: AudioKind) {
    if state.busy() {
        let msg = "Processing is active. Please stop it first or wait for it to complete.";
        state.banners.show_error(msg);
        console::print_error(msg);
        return;
    }
    if state.timestamp.is_none() {
        let msg = "No audio available yet. Process a recording or upload first.";
        state.banners.show_error(msg);
        console::print_error(msg);
        return;
    }

    // Resuming a paused track still silences the other one.
    if state.slot(kind).state.status == PlayerStatus::Paused && state.slot(kind).player.is_some() {
        stop_other(state, kind);
        let resumed = state.slot(kind).player.as_ref().map(|p| p.resume());
        match resumed {
            Some(Ok(())) => {
                state.slot_mut(kind).state.status = PlayerStatus::Playing;
                console::print_status(&format!("{kind} audio: Playing"));
            }
            Some(Err(e)) => {
                state.slot_mut(kind).stop();
                let msg = format!("Failed to play audio: {e}");
                state.banners.show_error(&msg);
                console::print_error(&msg);
            }
            None => {}
        }
        return;
    }

    if state.slot(kind).cache.is_some() {
        start_cached(state, kind);
        return;
    }

    let slot = state.slot_mut(kind);
    if slot.loading {
        return;
    }
    slot.loading = true;
    console::print_status(&format!("Loading {kind} audio..."));

    let api = state.api.clone();
    let tx = state.tx.clone();
    tokio::spawn(async move {
        let result = api.fetch_audio(kind).await;
        let _ = tx.send(ControllerEvent::AudioFetched(kind, result)).await;
    });
}

pub fn on_audio_fetched(state: &mut AppState, kind: AudioKind, result: Result<Vec<u8>, ApiError>) {
    let slot = state.slot_mut(kind);
    if !slot.loading {
        log::debug!("Ignoring stale audio fetch for {kind}");
        return;
    }
    slot.loading = false;
    match result {
        Ok(bytes) => {
            slot.cache = Some(bytes);
            start_cached(state, kind);
        }
        Err(e) => {
            let msg = e.user_message();
            state.banners.show_error(&msg);
            console::print_error(&msg);
        }
    }
}

pub fn pause(state: &mut AppState, kind: AudioKind) {
    let slot = state.slot_mut(kind);
    if slot.state.status != PlayerStatus::Playing {
        return;
    }
    if let Some(player) = &slot.player {
        if let Err(e) = player.pause() {
            log::warn!("Pause failed: {e}");
            return;
        }
        slot.state.status = PlayerStatus::Paused;
        console::print_status(&format!("{kind} audio: Paused"));
    }
}

pub fn stop(state: &mut AppState, kind: AudioKind) {
    let slot = state.slot_mut(kind);
    if slot.player.is_none() && slot.state.status == PlayerStatus::Stopped {
        return;
    }
    slot.stop();
    console::print_status(&format!("{kind} audio: Stopped"));
}

/// 1Hz: advance highlighting for a playing track, detect completion.
pub fn playback_tick(state: &mut AppState) {
    for kind in [AudioKind::Question, AudioKind::Answer] {
        let slot = state.slot_mut(kind);
        let Some(player) = &slot.player else { continue };
        if slot.state.status != PlayerStatus::Playing {
            continue;
        }
        if player.finished() {
            slot.player = None;
            slot.state.finish();
            console::print_status(&format!("{kind} audio: Completed"));
            continue;
        }
        let position = player.position_secs();
        let duration = player.duration_secs();
        slot.state.update_highlight(position, duration);
        console::print_highlight_line(kind, &slot.state, position, duration);
    }

    // Local preview player just gets dropped once it runs out.
    if state.preview.as_ref().is_some_and(|p| p.finished()) {
        state.preview = None;
    }
}

fn start_cached(state: &mut AppState, kind: AudioKind) {
    stop_other(state, kind);
    state.preview = None;

    let Some(bytes) = state.slot(kind).cache.clone() else {
        return;
    };
    match Player::start(&bytes) {
        Ok(player) => {
            let duration = player.duration_secs();
            let slot = state.slot_mut(kind);
            slot.state.status = PlayerStatus::Playing;
            slot.state.word_index = 0;
            slot.state.all_spoken = false;
            slot.player = Some(player);
            console::print_status(&format!(
                "{kind} audio: Playing ({})",
                playback::format_time(duration)
            ));
        }
        Err(e) => {
            state.slot_mut(kind).stop();
            let msg = format!("Failed to play audio: {e}");
            state.banners.show_error(&msg);
            console::print_error(&msg);
        }
    }
}

/// One audio element playing at a time: silence and visually reset the other
/// track in the same event turn.
fn stop_other(state: &mut AppState, kind: AudioKind) {
    let (active, other) = match kind {
        AudioKind::Question => (&mut state.question, &mut state.answer),
        AudioKind::Answer => (&mut state.answer, &mut state.question),
    };
    if playback::exclusive_play(&mut active.state, &mut other.state) {
        other.player = None;
        console::print_status(&format!("{} audio: Stopped", kind.other()));
    }
}
