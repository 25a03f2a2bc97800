//! Local audio playback through a cpal output stream. Decodes the whole
//! track up front (WAV or MP3) and tracks a shared frame cursor so the
//! controller can render elapsed time and word highlighting from its tick
//! handler.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

pub struct Player {
    stream: cpal::Stream,
    /// Position in source frames, written by the output callback.
    cursor: Arc<AtomicUsize>,
    total_frames: usize,
    source_rate: u32,
}

impl Player {
    /// Decode `bytes` and start playing immediately.
    pub fn start(bytes: &[u8]) -> Result<Self, Box<dyn std::error::Error>> {
        let (samples, source_rate) = decode_audio(bytes)?;
        if samples.is_empty() {
            return Err("Audio track is empty".into());
        }

        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or("No output device found")?;
        let config = device.default_output_config()?;
        let out_rate = config.sample_rate() as f64;
        let channels = config.channels() as usize;

        let total_frames = samples.len();
        let cursor = Arc::new(AtomicUsize::new(0));
        let cursor_cb = cursor.clone();
        let samples = Arc::new(samples);

        // Nearest-neighbor rate conversion; fine for speech playback.
        let step = source_rate as f64 / out_rate;
        let mut pos = 0.0_f64;

        let stream = device.build_output_stream(
            &config.into(),
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                for frame in data.chunks_mut(channels) {
                    let idx = pos as usize;
                    let value = if idx < total_frames { samples[idx] } else { 0.0 };
                    for sample in frame.iter_mut() {
                        *sample = value;
                    }
                    pos += step;
                }
                cursor_cb.store(pos as usize, Ordering::Relaxed);
            },
            |err| log::error!("Audio output error: {err}"),
            None,
        )?;

        stream.play()?;

        Ok(Self {
            stream,
            cursor,
            total_frames,
            source_rate,
        })
    }

    pub fn pause(&self) -> Result<(), Box<dyn std::error::Error>> {
        self.stream.pause()?;
        Ok(())
    }

    pub fn resume(&self) -> Result<(), Box<dyn std::error::Error>> {
        self.stream.play()?;
        Ok(())
    }

    pub fn position_secs(&self) -> f64 {
        let frames = self.cursor.load(Ordering::Relaxed).min(self.total_frames);
        frames as f64 / self.source_rate as f64
    }

    pub fn duration_secs(&self) -> f64 {
        self.total_frames as f64 / self.source_rate as f64
    }

    pub fn finished(&self) -> bool {
        self.cursor.load(Ordering::Relaxed) >= self.total_frames
    }
}

/// Decode audio bytes to mono f32 samples plus the source sample rate.
/// The server streams generated tracks as MP3 (`audio/mpeg`); local previews
/// and the server's silence fallback are WAV. The container decides the
/// decoder.
fn decode_audio(bytes: &[u8]) -> Result<(Vec<f32>, u32), Box<dyn std::error::Error>> {
    if looks_like_wav(bytes) {
        decode_wav(bytes)
    } else {
        decode_compressed(bytes)
    }
}

fn looks_like_wav(bytes: &[u8]) -> bool {
    bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WAVE"
}

/// Decode WAV bytes to mono f32 samples plus the source sample rate.
/// Multi-channel input is averaged down to mono.
fn decode_wav(bytes: &[u8]) -> Result<(Vec<f32>, u32), Box<dyn std::error::Error>> {
    let reader = hound::WavReader::new(std::io::Cursor::new(bytes))?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<Vec<_>, _>>()?,
        hound::SampleFormat::Int => {
            let max = (1i64 << (spec.bits_per_sample as i64 - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max))
                .collect::<Result<Vec<_>, _>>()?
        }
    };

    let mono: Vec<f32> = interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect();

    Ok((mono, spec.sample_rate))
}

/// Decode a compressed (MP3) stream via symphonia, downmixing to mono.
fn decode_compressed(bytes: &[u8]) -> Result<(Vec<f32>, u32), Box<dyn std::error::Error>> {
    let cursor = std::io::Cursor::new(bytes.to_vec());
    let mss = MediaSourceStream::new(Box::new(cursor), Default::default());

    let probed = symphonia::default::get_probe().format(
        &Hint::new(),
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;
    let mut format = probed.format;

    let track = format.default_track().ok_or("No audio track found")?;
    let track_id = track.id;
    let codec_params = track.codec_params.clone();
    let source_rate = codec_params.sample_rate.ok_or("Unknown sample rate")?;
    let channels = codec_params.channels.map(|c| c.count()).unwrap_or(1);

    let mut decoder =
        symphonia::default::get_codecs().make(&codec_params, &DecoderOptions::default())?;

    let mut mono = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(symphonia::core::errors::Error::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(e.into()),
        };
        if packet.track_id() != track_id {
            continue;
        }
        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(symphonia::core::errors::Error::DecodeError(e)) => {
                log::warn!("Skipping corrupt audio frame: {e}");
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        let spec = *decoded.spec();
        let frames = decoded.frames();
        if frames == 0 {
            continue;
        }
        let mut buf = SampleBuffer::<f32>::new(frames as u64, spec);
        buf.copy_interleaved_ref(decoded);
        if channels > 1 {
            for frame in buf.samples().chunks(channels) {
                mono.push(frame.iter().sum::<f32>() / channels as f32);
            }
        } else {
            mono.extend_from_slice(buf.samples());
        }
    }

    if mono.is_empty() {
        return Err("No audio samples decoded".into());
    }
    Ok((mono, source_rate))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wav_fixture(spec: hound::WavSpec, frames: usize) -> Vec<u8> {
        let mut cursor = std::io::Cursor::new(Vec::new());
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for i in 0..frames * spec.channels as usize {
            writer.write_sample((i % 100) as i16).unwrap();
        }
        writer.finalize().unwrap();
        cursor.into_inner()
    }

    #[test]
    fn decode_reads_mono_pcm() {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 16000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let bytes = wav_fixture(spec, 1600);
        let (samples, rate) = decode_wav(&bytes).unwrap();
        assert_eq!(rate, 16000);
        assert_eq!(samples.len(), 1600);
    }

    #[test]
    fn decode_downmixes_stereo() {
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 22050,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let bytes = wav_fixture(spec, 500);
        let (samples, rate) = decode_wav(&bytes).unwrap();
        assert_eq!(rate, 22050);
        assert_eq!(samples.len(), 500);
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(decode_audio(&[0u8; 16]).is_err());
    }

    #[test]
    fn mp3_headers_are_not_routed_to_the_wav_decoder() {
        // MPEG-1 Layer III frame sync and an ID3v2 tag prefix.
        let frame = [0xFFu8, 0xFB, 0x90, 0x64, 0, 0, 0, 0, 0, 0, 0, 0];
        let id3 = *b"ID3\x04\x00\x00\x00\x00\x00\x00\x00\x00";
        assert!(!looks_like_wav(&frame));
        assert!(!looks_like_wav(&id3));

        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 22050,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        assert!(looks_like_wav(&wav_fixture(spec, 10)));
    }

    #[test]
    fn wav_streams_decode_through_the_sniffed_path() {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 16000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let (samples, rate) = decode_audio(&wav_fixture(spec, 160)).unwrap();
        assert_eq!(rate, 16000);
        assert_eq!(samples.len(), 160);
    }
}
