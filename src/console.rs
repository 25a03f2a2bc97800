//! Terminal front end: stdin command parsing and result rendering. All state
//! decisions live in the controller; this module only formats.

use std::io::Write;
use std::path::PathBuf;

use crate::api::{RegenTarget, TranscriptSet};
use crate::playback::{AudioKind, PlaybackState, WordMark};

const DIM: &str = "\x1b[2m";
const REVERSE: &str = "\x1b[7m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

/// User gestures, parsed from one input line each.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Record,
    StopRecording,
    Submit,
    ReRecord,
    CancelRecording,
    Preview,
    Upload(PathBuf),
    Play(AudioKind),
    Pause(AudioKind),
    StopAudio(AudioKind),
    StopProcessing,
    Regenerate(RegenTarget),
    Replace(PathBuf),
    ClearSession,
    Status,
    Results,
    Voice(String),
    Help,
    Quit,
}

/// Parse one input line. `Ok(None)` for blank lines, `Err` carries a usage
/// message for the user.
pub fn parse_command(line: &str) -> Result<Option<Command>, String> {
    let mut parts = line.split_whitespace();
    let head = match parts.next() {
        Some(h) => h.to_ascii_lowercase(),
        None => return Ok(None),
    };
    let arg = parts.next();
    let rest = parts.next();
    if rest.is_some() && head != "upload" && head != "replace" {
        return Err(format!("Too many arguments for '{head}'. Try 'help'."));
    }

    let cmd = match (head.as_str(), arg) {
        ("record", None) => Command::Record,
        ("stop", None) => Command::StopRecording,
        ("stop", Some("processing")) => Command::StopProcessing,
        ("stop", Some(k)) => Command::StopAudio(parse_kind(k)?),
        ("submit", None) => Command::Submit,
        ("rerecord" | "re-record", None) => Command::ReRecord,
        ("cancel", None) => Command::CancelRecording,
        ("preview", None) => Command::Preview,
        ("upload", Some(_)) => Command::Upload(path_arg(line, "upload")?),
        ("upload", None) => return Err("Usage: upload <audio file>".into()),
        ("play", Some(k)) => Command::Play(parse_kind(k)?),
        ("play", None) => return Err("Usage: play question|answer".into()),
        ("pause", Some(k)) => Command::Pause(parse_kind(k)?),
        ("pause", None) => return Err("Usage: pause question|answer".into()),
        ("regen" | "regenerate", Some(t)) => Command::Regenerate(parse_regen(t)?),
        ("regen" | "regenerate", None) => {
            return Err("Usage: regen question|answer|all".into())
        }
        ("replace", Some(_)) => Command::Replace(path_arg(line, "replace")?),
        ("replace", None) => return Err("Usage: replace <audio file>".into()),
        ("clear", None) => Command::ClearSession,
        ("status", None) => Command::Status,
        ("results", None) => Command::Results,
        ("voice", Some(v)) => Command::Voice(v.to_string()),
        ("voice", None) => return Err("Usage: voice <voice id>".into()),
        ("help", None) => Command::Help,
        ("quit" | "exit", None) => Command::Quit,
        _ => return Err(format!("Unknown command '{head}'. Try 'help'.")),
    };
    Ok(Some(cmd))
}

fn parse_kind(s: &str) -> Result<AudioKind, String> {
    match s {
        "question" | "q" => Ok(AudioKind::Question),
        "answer" | "a" => Ok(AudioKind::Answer),
        other => Err(format!("Expected 'question' or 'answer', got '{other}'")),
    }
}

fn parse_regen(s: &str) -> Result<RegenTarget, String> {
    match s {
        "question" | "q" => Ok(RegenTarget::Question),
        "answer" | "a" => Ok(RegenTarget::Answer),
        "all" => Ok(RegenTarget::All),
        other => Err(format!("Expected 'question', 'answer' or 'all', got '{other}'")),
    }
}

/// File paths may contain spaces; take everything after the command word.
fn path_arg(line: &str, head: &str) -> Result<PathBuf, String> {
    let trimmed = line.trim_start();
    let after = trimmed[head.len()..].trim();
    if after.is_empty() {
        return Err(format!("Usage: {head} <audio file>"));
    }
    Ok(PathBuf::from(after))
}

pub fn print_error(message: &str) {
    clear_inline();
    println!("{BOLD}error:{RESET} {message}");
}

pub fn print_status(message: &str) {
    clear_inline();
    println!("{DIM}*{RESET} {message}");
}

pub fn print_help() {
    println!("Commands:");
    println!("  record                 start recording (mono 16kHz, 60s max)");
    println!("  stop                   stop the current recording");
    println!("  preview                play back the recorded audio locally");
    println!("  submit                 send the recording through the AI pipeline");
    println!("  rerecord | cancel      discard the recording");
    println!("  upload <file>          process a local audio file");
    println!("  play question|answer   play a generated track");
    println!("  pause question|answer  pause a playing track");
    println!("  stop question|answer   stop a track");
    println!("  stop processing        ask the server to stop the current job");
    println!("  regen question|answer|all   regenerate TTS audio");
    println!("  replace <file>         replace the session audio and reprocess");
    println!("  results                show the last transcripts");
    println!("  status                 show client state");
    println!("  voice <id>             select the TTS voice");
    println!("  clear                  clear the server session and local state");
    println!("  quit");
}

/// Inline (same line) recording timer, mm:ss.
pub fn print_recording_timer(elapsed_secs: u32) {
    print!(
        "\r  recording {:02}:{:02} (60s max, 'stop' to finish)  ",
        elapsed_secs / 60,
        elapsed_secs % 60
    );
    let _ = std::io::stdout().flush();
}

/// One line per progress transition: step number, 25% increments, detail.
pub fn print_progress(step_no: u8, percent: u8, label: &str, detail: &str) {
    clear_inline();
    println!("  [{percent:>3}%] step {step_no}/4 {BOLD}{label}{RESET} - {detail}");
}

pub fn render_results(data: &TranscriptSet, source_label: &str, timestamp: &str) {
    clear_inline();
    println!();
    println!("{BOLD}=== Results ==={RESET}  ({source_label}, job {timestamp})");
    println!("{BOLD}Pashto question:{RESET}  {}", data.pashto_question());
    println!("{BOLD}English question:{RESET} {}", data.english_question());
    println!("{BOLD}Pashto answer:{RESET}    {}", data.pashto_answer());
    println!("{BOLD}English answer:{RESET}   {}", data.english_answer());
    println!("Use 'play question' / 'play answer' to listen.");
}

/// Inline highlighted transcript line: spoken words dimmed, the current word
/// reversed, upcoming words plain.
pub fn print_highlight_line(
    kind: AudioKind,
    state: &PlaybackState,
    current_time: f64,
    duration: f64,
) {
    let mut line = format!(
        "\r  [{kind} {} / {}] ",
        crate::playback::format_time(current_time),
        crate::playback::format_time(duration)
    );
    for (i, word) in state.words.iter().enumerate() {
        match state.mark_at(i) {
            WordMark::Spoken => {
                line.push_str(DIM);
                line.push_str(word);
                line.push_str(RESET);
            }
            WordMark::Current => {
                line.push_str(REVERSE);
                line.push_str(word);
                line.push_str(RESET);
            }
            WordMark::Upcoming => line.push_str(word),
        }
        line.push(' ');
    }
    print!("{line}");
    let _ = std::io::stdout().flush();
}

/// Terminate an inline (\r) line before printing regular output.
fn clear_inline() {
    print!("\r\x1b[2K");
    let _ = std::io::stdout().flush();
}

pub fn print_prompt() {
    print!("> ");
    let _ = std::io::stdout().flush();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_basic_commands() {
        assert_eq!(parse_command("record").unwrap(), Some(Command::Record));
        assert_eq!(parse_command("stop").unwrap(), Some(Command::StopRecording));
        assert_eq!(parse_command("  quit  ").unwrap(), Some(Command::Quit));
        assert_eq!(parse_command("").unwrap(), None);
    }

    #[test]
    fn stop_is_contextual() {
        assert_eq!(
            parse_command("stop processing").unwrap(),
            Some(Command::StopProcessing)
        );
        assert_eq!(
            parse_command("stop answer").unwrap(),
            Some(Command::StopAudio(AudioKind::Answer))
        );
    }

    #[test]
    fn play_accepts_short_kinds() {
        assert_eq!(
            parse_command("play q").unwrap(),
            Some(Command::Play(AudioKind::Question))
        );
        assert!(parse_command("play sideways").is_err());
    }

    #[test]
    fn upload_keeps_spaces_in_path() {
        assert_eq!(
            parse_command("upload /tmp/my question.wav").unwrap(),
            Some(Command::Upload(PathBuf::from("/tmp/my question.wav")))
        );
        assert!(parse_command("upload").is_err());
    }

    #[test]
    fn regen_targets_parse() {
        assert_eq!(
            parse_command("regen all").unwrap(),
            Some(Command::Regenerate(RegenTarget::All))
        );
        assert_eq!(
            parse_command("regenerate q").unwrap(),
            Some(Command::Regenerate(RegenTarget::Question))
        );
    }

    #[test]
    fn unknown_commands_are_rejected() {
        assert!(parse_command("frobnicate").is_err());
        assert!(parse_command("record now").is_err());
    }
}
