use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::{Arc, Mutex};

/// Capture target: mono 16kHz, what the server pipeline expects.
pub const TARGET_SAMPLE_RATE: u32 = 16000;

/// Capture is sliced into ~100ms buffers.
pub const SLICE_MILLIS: u32 = 100;

/// Ordered capture-format preference; the first format the device supports
/// wins, falling back to f32.
pub const FORMAT_PREFERENCE: &[cpal::SampleFormat] = &[
    cpal::SampleFormat::F32,
    cpal::SampleFormat::I16,
    cpal::SampleFormat::U16,
];

/// Result of probing the default input device before recording.
#[derive(Debug, Clone)]
pub enum MicAccess {
    Granted,
    /// No input device at all.
    NoDevice,
    /// A device exists but cannot be used.
    Unavailable(String),
}

/// Check whether recording can start. Re-run on every record attempt since
/// devices come and go.
pub fn probe_microphone() -> MicAccess {
    let host = cpal::default_host();
    let device = match host.default_input_device() {
        Some(d) => d,
        None => return MicAccess::NoDevice,
    };
    match device.supported_input_configs() {
        Ok(mut configs) => {
            if configs.next().is_none() {
                MicAccess::Unavailable("Input device reports no capture configurations".into())
            } else {
                MicAccess::Granted
            }
        }
        Err(e) => MicAccess::Unavailable(e.to_string()),
    }
}

/// Start capturing from the default input device. Mono f32 samples are
/// appended to `slices` one buffer per callback (~100ms each). Drop the
/// returned `Stream` to stop capture and release the device.
pub fn start_capture(
    slices: Arc<Mutex<Vec<Vec<f32>>>>,
) -> Result<(cpal::Stream, u32), Box<dyn std::error::Error>> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or("No input device found")?;

    log::info!("Input device: {:?}", device.description());

    let supported_configs: Vec<_> = device.supported_input_configs()?.collect();

    // Prefer a mono 16kHz config in one of the preferred sample formats.
    let desired = FORMAT_PREFERENCE.iter().find_map(|&format| {
        supported_configs.iter().find(|c| {
            c.channels() == 1
                && c.min_sample_rate() <= TARGET_SAMPLE_RATE
                && c.max_sample_rate() >= TARGET_SAMPLE_RATE
                && c.sample_format() == format
        })
    });

    let (mut config, sample_format, capture_rate, downsample_factor) = match desired {
        Some(cfg) => {
            let format = cfg.sample_format();
            (
                cfg.with_sample_rate(TARGET_SAMPLE_RATE).config(),
                format,
                TARGET_SAMPLE_RATE,
                1usize,
            )
        }
        None => {
            // Fall back to the default config, downsampling later.
            let default_config = device.default_input_config()?;
            let rate = default_config.sample_rate();
            let factor = (rate / TARGET_SAMPLE_RATE).max(1) as usize;
            let actual_rate = rate / factor as u32;
            log::info!(
                "Using native rate {rate}Hz, downsampling by {factor}x to ~{actual_rate}Hz"
            );
            let format = default_config.sample_format();
            (default_config.config(), format, actual_rate, factor)
        }
    };

    // One callback buffer per slice.
    let frames_per_slice = config.sample_rate * SLICE_MILLIS / 1000;
    config.buffer_size = cpal::BufferSize::Fixed(frames_per_slice);

    let channels = config.channels as usize;

    let stream = match sample_format {
        cpal::SampleFormat::I16 => build_input::<i16>(
            &device,
            &config,
            channels,
            downsample_factor,
            slices,
            |v| v as f32 / i16::MAX as f32,
        )?,
        cpal::SampleFormat::U16 => build_input::<u16>(
            &device,
            &config,
            channels,
            downsample_factor,
            slices,
            |v| (v as f32 - 32768.0) / 32768.0,
        )?,
        _ => build_input::<f32>(&device, &config, channels, downsample_factor, slices, |v| v)?,
    };

    stream.play()?;
    Ok((stream, capture_rate))
}

fn build_input<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    channels: usize,
    downsample_factor: usize,
    slices: Arc<Mutex<Vec<Vec<f32>>>>,
    convert: fn(T) -> f32,
) -> Result<cpal::Stream, Box<dyn std::error::Error>>
where
    T: cpal::SizedSample + Copy + 'static,
{
    let stream = device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            let mut slice = Vec::with_capacity(data.len() / (channels * downsample_factor) + 1);
            for (i, frame) in data.chunks(channels).enumerate() {
                if i % downsample_factor == 0 {
                    let mono =
                        frame.iter().map(|&s| convert(s)).sum::<f32>() / channels as f32;
                    slice.push(mono);
                }
            }
            if !slice.is_empty() {
                slices.lock().unwrap().push(slice);
            }
        },
        |err| log::error!("Input stream error: {err}"),
        None,
    )?;
    Ok(stream)
}

/// Concatenate captured slices into one sample buffer.
pub fn concat_slices(slices: &[Vec<f32>]) -> Vec<f32> {
    let total = slices.iter().map(Vec::len).sum();
    let mut samples = Vec::with_capacity(total);
    for slice in slices {
        samples.extend_from_slice(slice);
    }
    samples
}

/// Convert f32 samples to WAV bytes (mono 16-bit PCM), the upload payload.
pub fn samples_to_wav(
    samples: &[f32],
    sample_rate: u32,
) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let mut cursor = std::io::Cursor::new(Vec::new());
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
    for &s in samples {
        let clamped = s.clamp(-1.0, 1.0);
        let i16_val = (clamped * i16::MAX as f32) as i16;
        writer.write_sample(i16_val)?;
    }
    writer.finalize()?;
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concat_preserves_slice_order() {
        let slices = vec![vec![0.1, 0.2], vec![0.3], vec![0.4, 0.5]];
        assert_eq!(concat_slices(&slices), vec![0.1, 0.2, 0.3, 0.4, 0.5]);
    }

    #[test]
    fn concat_of_nothing_is_empty() {
        assert!(concat_slices(&[]).is_empty());
        assert!(concat_slices(&[vec![], vec![]]).is_empty());
    }

    #[test]
    fn wav_encoding_is_readable_and_mono_16k() {
        let samples: Vec<f32> = (0..1600).map(|i| (i as f32 / 100.0).sin() * 0.5).collect();
        let wav = samples_to_wav(&samples, TARGET_SAMPLE_RATE).unwrap();
        assert!(!wav.is_empty());

        let reader = hound::WavReader::new(std::io::Cursor::new(wav)).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, TARGET_SAMPLE_RATE);
        assert_eq!(spec.bits_per_sample, 16);
        assert_eq!(reader.len(), 1600);
    }

    #[test]
    fn wav_encoding_clamps_overdriven_samples() {
        let wav = samples_to_wav(&[2.0, -2.0], 16000).unwrap();
        let mut reader = hound::WavReader::new(std::io::Cursor::new(wav)).unwrap();
        let vals: Vec<i16> = reader.samples::<i16>().map(Result::unwrap).collect();
        assert_eq!(vals[0], i16::MAX);
        assert_eq!(vals[1], -i16::MAX);
    }

    #[test]
    fn format_preference_starts_with_f32() {
        assert_eq!(FORMAT_PREFERENCE[0], cpal::SampleFormat::F32);
    }
}
