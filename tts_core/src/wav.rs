use std::io::Cursor;

use crate::error::EncodeError;

/// Convert one floating-point sample to 16-bit PCM.
///
/// NaN maps to silence. Input is clamped to [-1.0, 1.0]; positive values scale
/// by `i16::MAX` and negative values by `-i16::MIN`, rounding to nearest, so
/// +1.0 lands exactly on 32767 and -1.0 on -32768.
#[inline]
pub fn float_to_pcm16(sample: f32) -> i16 {
    if sample.is_nan() {
        return 0;
    }
    let s = sample.clamp(-1.0, 1.0);
    let scaled = if s >= 0.0 {
        s * i16::MAX as f32
    } else {
        s * -(i16::MIN as f32)
    };
    scaled.round() as i16
}

/// Inverse of [`float_to_pcm16`], used when checking encoded output.
#[inline]
pub fn pcm16_to_float(sample: i16) -> f32 {
    if sample >= 0 {
        sample as f32 / i16::MAX as f32
    } else {
        sample as f32 / -(i16::MIN as f32)
    }
}

/// Encode f32 samples as a mono 16-bit PCM WAV container held in memory.
pub fn encode_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>, EncodeError> {
    if samples.is_empty() {
        return Err(EncodeError::EmptyWaveform);
    }

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    // WAV header (44 bytes) + 2 bytes per sample
    let mut cursor = Cursor::new(Vec::<u8>::with_capacity(44 + samples.len() * 2));
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        for &s in samples {
            writer.write_sample(float_to_pcm16(s))?;
        }
        // finalize patches the RIFF and data chunk sizes
        writer.finalize()?;
    }

    Ok(cursor.into_inner())
}

/// Decode a 16-bit PCM WAV container produced by [`encode_wav`].
pub fn decode_wav(bytes: &[u8]) -> Result<(Vec<i16>, hound::WavSpec), EncodeError> {
    let mut reader = hound::WavReader::new(Cursor::new(bytes))?;
    let spec = reader.spec();
    let samples = reader.samples::<i16>().collect::<Result<Vec<_>, _>>()?;
    Ok((samples, spec))
}

pub fn duration_ms(sample_count: usize, sample_rate: u32) -> u64 {
    if sample_rate == 0 {
        return 0;
    }
    (sample_count as u64 * 1000) / sample_rate as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SAMPLE_RATE;

    #[test]
    fn test_boundaries_saturate() {
        assert_eq!(float_to_pcm16(1.0), i16::MAX);
        assert_eq!(float_to_pcm16(-1.0), i16::MIN);
        assert_eq!(float_to_pcm16(1.5), i16::MAX);
        assert_eq!(float_to_pcm16(-7.0), i16::MIN);
        assert_eq!(float_to_pcm16(f32::INFINITY), i16::MAX);
        assert_eq!(float_to_pcm16(f32::NEG_INFINITY), i16::MIN);
        assert_eq!(float_to_pcm16(f32::NAN), 0);
        assert_eq!(float_to_pcm16(0.0), 0);
    }

    #[test]
    fn test_rounding_is_deterministic() {
        assert_eq!(float_to_pcm16(0.5), 16384); // 16383.5 rounds away from zero
        assert_eq!(float_to_pcm16(-0.5), -16384);
        assert_eq!(float_to_pcm16(0.25), float_to_pcm16(0.25));
    }

    #[test]
    fn test_encode_header_fields() {
        let samples = vec![0.0f32; 100];
        let bytes = encode_wav(&samples, SAMPLE_RATE).unwrap();
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WAVE");
        assert_eq!(bytes.len(), 44 + 200);

        let riff_size = u32::from_le_bytes(bytes[4..8].try_into().unwrap());
        assert_eq!(riff_size as usize, bytes.len() - 8);
        let channels = u16::from_le_bytes(bytes[22..24].try_into().unwrap());
        assert_eq!(channels, 1);
        let rate = u32::from_le_bytes(bytes[24..28].try_into().unwrap());
        assert_eq!(rate, 22050);
        let data_size = u32::from_le_bytes(bytes[40..44].try_into().unwrap());
        assert_eq!(data_size, 200);
    }

    #[test]
    fn test_encode_decode_round_trip() {
        let samples: Vec<f32> = (0..2205)
            .map(|i| (i as f32 * 0.05).sin() * 0.8)
            .collect();
        let bytes = encode_wav(&samples, SAMPLE_RATE).unwrap();
        let (decoded, spec) = decode_wav(&bytes).unwrap();

        assert_eq!(spec.sample_rate, SAMPLE_RATE);
        assert_eq!(spec.channels, 1);
        assert_eq!(decoded.len(), samples.len());
        let lsb = 1.0 / i16::MAX as f32;
        for (orig, pcm) in samples.iter().zip(decoded.iter()) {
            assert!((orig - pcm16_to_float(*pcm)).abs() <= lsb);
        }
    }

    #[test]
    fn test_encode_is_deterministic() {
        let samples = vec![0.1, -0.2, 0.3, 1.2, -1.2];
        assert_eq!(
            encode_wav(&samples, SAMPLE_RATE).unwrap(),
            encode_wav(&samples, SAMPLE_RATE).unwrap()
        );
    }

    #[test]
    fn test_empty_waveform_fails() {
        let err = encode_wav(&[], SAMPLE_RATE).unwrap_err();
        assert!(matches!(err, EncodeError::EmptyWaveform));
    }

    #[test]
    fn test_duration_ms() {
        assert_eq!(duration_ms(22050, 22050), 1000);
        assert_eq!(duration_ms(11025, 22050), 500);
        assert_eq!(duration_ms(10, 0), 0);
    }
}
