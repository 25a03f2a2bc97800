//! Pure playback state: player status, proportional word highlighting and
//! the one-audio-at-a-time rule. No audio device or terminal access here so
//! the transitions stay testable.

/// Which of the two generated audio tracks a control refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioKind {
    Question,
    Answer,
}

impl AudioKind {
    /// Path segment used by the streaming endpoint.
    pub fn as_str(self) -> &'static str {
        match self {
            AudioKind::Question => "question",
            AudioKind::Answer => "answer",
        }
    }

    pub fn other(self) -> AudioKind {
        match self {
            AudioKind::Question => AudioKind::Answer,
            AudioKind::Answer => AudioKind::Question,
        }
    }
}

impl std::fmt::Display for AudioKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Displayed status of one audio control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerStatus {
    Stopped,
    Playing,
    Paused,
    Completed,
}

impl PlayerStatus {
    pub fn label(self) -> &'static str {
        match self {
            PlayerStatus::Stopped => "Stopped",
            PlayerStatus::Playing => "Playing",
            PlayerStatus::Paused => "Paused",
            PlayerStatus::Completed => "Completed",
        }
    }
}

/// Highlight mark for a transcript word relative to the current word index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordMark {
    Spoken,
    Current,
    Upcoming,
}

/// Visual state of one audio control and its transcript.
#[derive(Debug, Default)]
pub struct PlaybackState {
    pub status: PlayerStatus,
    pub word_index: usize,
    /// All words spoken, set when playback runs to the end.
    pub all_spoken: bool,
    /// Transcript tokens for highlighting. Empty when only a placeholder text
    /// is available.
    pub words: Vec<String>,
}

impl Default for PlayerStatus {
    fn default() -> Self {
        PlayerStatus::Stopped
    }
}

impl PlaybackState {
    /// Replace the transcript tokens and clear any highlighting.
    pub fn set_transcript(&mut self, text: Option<&str>) {
        self.words = text
            .map(|t| t.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();
        self.word_index = 0;
        self.all_spoken = false;
    }

    /// Back to the stopped visual state, keeping the transcript.
    pub fn reset_control(&mut self) {
        self.status = PlayerStatus::Stopped;
        self.word_index = 0;
        self.all_spoken = false;
    }

    /// Advance highlighting from a playback position. Returns the new word
    /// index, or `None` when there is nothing to highlight.
    pub fn update_highlight(&mut self, current_time: f64, duration: f64) -> Option<usize> {
        let idx = highlight_index(current_time, duration, self.words.len())?;
        self.word_index = idx;
        self.all_spoken = false;
        Some(idx)
    }

    /// Playback ran to the end: every word counts as spoken.
    pub fn finish(&mut self) {
        self.status = PlayerStatus::Completed;
        self.all_spoken = true;
    }

    pub fn mark_at(&self, i: usize) -> WordMark {
        if self.all_spoken || i < self.word_index {
            WordMark::Spoken
        } else if i == self.word_index {
            WordMark::Current
        } else {
            WordMark::Upcoming
        }
    }
}

/// Proportional word estimate: `floor(t / (duration / words))`, clamped to the
/// last index. This is a linear approximation, not forced alignment.
pub fn highlight_index(current_time: f64, duration: f64, word_count: usize) -> Option<usize> {
    if word_count == 0 || duration <= 0.0 {
        return None;
    }
    let word_duration = duration / word_count as f64;
    let idx = (current_time / word_duration).floor() as usize;
    Some(idx.min(word_count - 1))
}

/// Start playing `active`, stopping `other` if it is currently audible.
/// Returns true when the other control was reset and its player must be
/// released in the same event turn.
pub fn exclusive_play(active: &mut PlaybackState, other: &mut PlaybackState) -> bool {
    active.status = PlayerStatus::Playing;
    match other.status {
        PlayerStatus::Playing | PlayerStatus::Paused => {
            other.reset_control();
            true
        }
        _ => false,
    }
}

/// `m:ss` display used for both elapsed and total time.
pub fn format_time(seconds: f64) -> String {
    if !seconds.is_finite() || seconds < 0.0 {
        return "0:00".to_string();
    }
    let total = seconds.floor() as u64;
    format!("{}:{:02}", total / 60, total % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn highlight_index_matches_proportional_estimate() {
        // 10s audio, 5 words, t=6.5s -> word 3 (0-indexed).
        assert_eq!(highlight_index(6.5, 10.0, 5), Some(3));
    }

    #[test]
    fn highlight_index_clamps_to_last_word() {
        assert_eq!(highlight_index(9.9, 10.0, 5), Some(4));
        assert_eq!(highlight_index(25.0, 10.0, 5), Some(4));
    }

    #[test]
    fn highlight_index_handles_degenerate_input() {
        assert_eq!(highlight_index(1.0, 10.0, 0), None);
        assert_eq!(highlight_index(1.0, 0.0, 5), None);
    }

    #[test]
    fn marks_split_spoken_current_upcoming() {
        let mut s = PlaybackState::default();
        s.set_transcript(Some("a b c d e"));
        s.update_highlight(6.5, 10.0);
        assert_eq!(s.mark_at(0), WordMark::Spoken);
        assert_eq!(s.mark_at(2), WordMark::Spoken);
        assert_eq!(s.mark_at(3), WordMark::Current);
        assert_eq!(s.mark_at(4), WordMark::Upcoming);
    }

    #[test]
    fn finish_marks_everything_spoken() {
        let mut s = PlaybackState::default();
        s.set_transcript(Some("a b c"));
        s.finish();
        assert_eq!(s.status, PlayerStatus::Completed);
        assert_eq!(s.mark_at(2), WordMark::Spoken);
    }

    #[test]
    fn exclusive_play_stops_the_other_track() {
        let mut q = PlaybackState::default();
        let mut a = PlaybackState::default();
        a.status = PlayerStatus::Playing;
        a.word_index = 2;
        assert!(exclusive_play(&mut q, &mut a));
        assert_eq!(q.status, PlayerStatus::Playing);
        assert_eq!(a.status, PlayerStatus::Stopped);
        assert_eq!(a.word_index, 0);
    }

    #[test]
    fn exclusive_play_leaves_idle_track_alone() {
        let mut q = PlaybackState::default();
        let mut a = PlaybackState::default();
        assert!(!exclusive_play(&mut q, &mut a));
        assert_eq!(a.status, PlayerStatus::Stopped);
    }

    #[test]
    fn placeholder_transcript_has_no_words() {
        let mut s = PlaybackState::default();
        s.set_transcript(None);
        assert!(s.words.is_empty());
        assert_eq!(s.update_highlight(1.0, 10.0), None);
    }

    #[test]
    fn format_time_pads_seconds() {
        assert_eq!(format_time(0.0), "0:00");
        assert_eq!(format_time(65.4), "1:05");
        assert_eq!(format_time(f64::NAN), "0:00");
        assert_eq!(format_time(f64::INFINITY), "0:00");
    }
}
