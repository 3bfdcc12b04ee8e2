use crate::AudioError;
use ringbuf::HeapRb;
use rubato::{FastFixedIn, PolynomialDegree, Resampler};

/// Rate of the raw PCM16 audio returned by the speech synthesis endpoint.
pub const TTS_PCM16_SAMPLE_RATE: f64 = 24000.0;

/// Rate recordings are converted to before transcription.
pub const SPEECH_SAMPLE_RATE: u32 = 16000;

const RESAMPLE_CHUNK_SIZE: usize = 1024;

/// Creates a resampler to convert between audio sample rates.
pub fn create_resampler(
    in_sampling_rate: f64,
    out_sampling_rate: f64,
    chunk_size: usize,
) -> Result<FastFixedIn<f32>, AudioError> {
    FastFixedIn::<f32>::new(
        out_sampling_rate / in_sampling_rate,
        1.0,
        PolynomialDegree::Cubic,
        chunk_size,
        1,
    )
    .map_err(|e| AudioError::Resample(e.to_string()))
}

/// Splits a slice of audio samples into fixed-size chunks, zero-padding the last one.
pub fn split_for_chunks(samples: &[f32], chunk_size: usize) -> Vec<Vec<f32>> {
    samples
        .chunks(chunk_size)
        .map(|chunk| {
            let mut chunk = chunk.to_vec();
            chunk.resize(chunk_size, 0.0);
            chunk
        })
        .collect()
}

/// Resamples a complete mono clip. The result is trimmed to the expected length.
pub fn resample(samples: &[f32], in_sampling_rate: f64, out_sampling_rate: f64) -> Result<Vec<f32>, AudioError> {
    if samples.is_empty() || (in_sampling_rate - out_sampling_rate).abs() < f64::EPSILON {
        return Ok(samples.to_vec());
    }

    let mut resampler = create_resampler(in_sampling_rate, out_sampling_rate, RESAMPLE_CHUNK_SIZE)?;
    let expected = (samples.len() as f64 * out_sampling_rate / in_sampling_rate).ceil() as usize;
    let mut resampled = Vec::with_capacity(expected);
    for chunk in split_for_chunks(samples, resampler.input_frames_next()) {
        let frames = resampler
            .process(&[chunk.as_slice()], None)
            .map_err(|e| AudioError::Resample(e.to_string()))?;
        if let Some(channel) = frames.first() {
            resampled.extend_from_slice(channel);
        }
    }
    resampled.truncate(expected);
    Ok(resampled)
}

/// Creates a new ring buffer on the heap for shared audio data.
pub fn shared_buffer(size: usize) -> HeapRb<f32> {
    HeapRb::new(size)
}

/// Interprets little-endian PCM16 bytes as f32 samples in `[-1.0, 1.0)`.
/// A trailing odd byte is ignored.
pub fn decode_pcm16_le(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(2)
        .map(|chunk| i16::from_le_bytes([chunk[0], chunk[1]]) as f32 / 32768.0)
        .collect()
}

/// Converts a slice of f32 samples to a vector of i16 samples.
pub fn convert_f32_to_i16(pcm32: &[f32]) -> Vec<i16> {
    pcm32
        .iter()
        .map(|&sample| (sample * i16::MAX as f32).clamp(i16::MIN as f32, i16::MAX as f32) as i16)
        .collect()
}

/// Averages interleaved frames down to one channel.
pub fn downmix(data: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return data.to_vec();
    }
    data.chunks(channels)
        .map(|c| c.iter().sum::<f32>() / c.len() as f32)
        .collect()
}

/// Root mean square energy of a block of samples.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f32 = samples.iter().map(|s| s * s).sum();
    (sum / samples.len() as f32).sqrt()
}

/// Encodes mono samples as a 16-bit PCM WAV file.
pub fn samples_to_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>, AudioError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        for sample in convert_f32_to_i16(samples) {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_pads_last_chunk() {
        let chunks = split_for_chunks(&[0.1, 0.2, 0.3, 0.4, 0.5], 2);
        assert_eq!(chunks, vec![vec![0.1, 0.2], vec![0.3, 0.4], vec![0.5, 0.0]]);
    }

    #[test]
    fn decodes_little_endian_pcm16() {
        let bytes = [0x00, 0x00, 0x00, 0x40, 0x00, 0x80, 0xff];
        assert_eq!(decode_pcm16_le(&bytes), vec![0.0, 0.5, -1.0]);
    }

    #[test]
    fn downmix_averages_frames() {
        assert_eq!(downmix(&[0.2, 0.4, -1.0, 1.0], 2), vec![0.3, 0.0]);
        assert_eq!(downmix(&[0.2, 0.4], 1), vec![0.2, 0.4]);
    }

    #[test]
    fn rms_of_constant_signal_is_its_magnitude() {
        assert!((rms(&[0.5, -0.5, 0.5, -0.5]) - 0.5).abs() < 1e-6);
        assert_eq!(rms(&[]), 0.0);
    }

    #[test]
    fn wav_has_header_and_samples() -> anyhow::Result<()> {
        let wav = samples_to_wav(&[0.0, 0.5, -0.5, 1.0], SPEECH_SAMPLE_RATE)?;
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        assert_eq!(wav.len(), 44 + 4 * 2);

        let reader = hound::WavReader::new(std::io::Cursor::new(wav))?;
        assert_eq!(reader.spec().sample_rate, SPEECH_SAMPLE_RATE);
        assert_eq!(reader.spec().channels, 1);
        Ok(())
    }

    #[test]
    fn resample_scales_length_by_rate_ratio() -> anyhow::Result<()> {
        let samples = vec![0.25; 4800];
        let resampled = resample(&samples, 48000.0, SPEECH_SAMPLE_RATE as f64)?;
        assert_eq!(resampled.len(), 1600);

        let same = resample(&samples, 16000.0, 16000.0)?;
        assert_eq!(same.len(), samples.len());
        assert!(resample(&[], 24000.0, 48000.0)?.is_empty());
        Ok(())
    }
}
