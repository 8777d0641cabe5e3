use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unsupported or corrupt container: {0}")]
    Probe(String),
    #[error("no audio track in file")]
    NoAudioTrack,
    #[error("sample rate not specified in audio file")]
    UnknownSampleRate,
    #[error("decode error: {0}")]
    Codec(String),
}

/// Decoded audio: mono f32 samples in [-1, 1] at the file's native rate.
pub struct AudioData {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

/// Decode an audio file to mono f32 and resample it to `target_rate`,
/// the rate the fingerprint strategy is calibrated for.
pub fn decode_to_rate(path: &Path, target_rate: u32) -> Result<Vec<f32>, DecodeError> {
    let audio = decode_audio(path)?;
    Ok(linear_resample(
        &audio.samples,
        audio.sample_rate,
        target_rate,
    ))
}

/// Decode an audio file to raw mono PCM via symphonia. Multi-channel
/// input is mixed down by averaging.
pub fn decode_audio(path: &Path) -> Result<AudioData, DecodeError> {
    let file = std::fs::File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(extension);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| DecodeError::Probe(e.to_string()))?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(DecodeError::NoAudioTrack)?;
    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or(DecodeError::UnknownSampleRate)?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| DecodeError::Codec(e.to_string()))?;

    let mut samples: Vec<f32> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;
    let mut channels = 1usize;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(err))
                if err.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break; // end of stream
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(err) => return Err(DecodeError::Codec(err.to_string())),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                // Corrupt packet; skip it and keep going.
                log::debug!("skipping undecodable packet in {}: {e}", path.display());
                continue;
            }
            Err(err) => return Err(DecodeError::Codec(err.to_string())),
        };

        if sample_buf.is_none() {
            let spec = *decoded.spec();
            channels = spec.channels.count();
            sample_buf = Some(SampleBuffer::<f32>::new(decoded.capacity() as u64, spec));
        }
        let buf = sample_buf.as_mut().unwrap();
        buf.copy_interleaved_ref(decoded);

        if channels <= 1 {
            samples.extend_from_slice(buf.samples());
        } else {
            for frame in buf.samples().chunks_exact(channels) {
                samples.push(frame.iter().sum::<f32>() / channels as f32);
            }
        }
    }

    Ok(AudioData {
        samples,
        sample_rate,
    })
}

/// Linearly resample `samples` from `source_rate` to `target_rate`.
/// Linear interpolation is plenty here: fingerprinting only needs peak
/// positions to survive, not audible fidelity.
pub fn linear_resample(samples: &[f32], source_rate: u32, target_rate: u32) -> Vec<f32> {
    if samples.is_empty() || source_rate == target_rate {
        return samples.to_vec();
    }

    let ratio = target_rate as f32 / source_rate as f32;
    let output_len = ((samples.len() as f32) * ratio).ceil().max(1.0) as usize;
    let last_index = samples.len() - 1;

    let mut output = Vec::with_capacity(output_len);
    for i in 0..output_len {
        let position = i as f32 / ratio;
        let left = (position.floor() as usize).min(last_index);
        let right = (left + 1).min(last_index);
        let t = position - left as f32;
        output.push(samples[left] * (1.0 - t) + samples[right] * t);
    }

    output
}

#[cfg(test)]
mod tests {
    use super::linear_resample;

    #[test]
    fn test_same_rate_is_passthrough() {
        let input = vec![0.1, 0.2, 0.3];
        assert_eq!(linear_resample(&input, 44_100, 44_100), input);
    }

    #[test]
    fn test_preserves_constant_signal() {
        let input = vec![0.5; 480];
        let out = linear_resample(&input, 48_000, 22_050);
        let expected_len = ((input.len() as f32) * 22_050.0 / 48_000.0).ceil() as usize;
        assert_eq!(out.len(), expected_len);
        assert!(out.iter().all(|&s| (s - 0.5).abs() < 1e-6));
    }

    #[test]
    fn test_upsampling_interpolates() {
        let input = vec![0.0, 1.0];
        let out = linear_resample(&input, 1, 2);
        assert_eq!(out.len(), 4);
        assert!((out[1] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_empty_input() {
        assert!(linear_resample(&[], 44_100, 22_050).is_empty());
    }
}
