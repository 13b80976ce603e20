//! Stereo WAV reading and writing.

use crate::Result;
use hound::{SampleFormat, WavReader, WavWriter};
use std::path::Path;

/// Owned stereo audio, one `Vec` per side.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StereoSamples {
    /// Left channel samples.
    pub left: Vec<f32>,
    /// Right channel samples.
    pub right: Vec<f32>,
}

impl StereoSamples {
    /// Pair up two channels of equal length.
    pub fn new(left: Vec<f32>, right: Vec<f32>) -> Self {
        debug_assert_eq!(left.len(), right.len(), "channels must have same length");
        Self { left, right }
    }

    /// Duplicate a mono signal to both sides.
    pub fn from_mono(mono: Vec<f32>) -> Self {
        Self {
            left: mono.clone(),
            right: mono,
        }
    }

    /// Frames per channel.
    pub fn len(&self) -> usize {
        self.left.len()
    }

    /// Whether there are no frames.
    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }

    /// Largest absolute sample over both sides.
    pub fn peak(&self) -> f32 {
        mixbus_core::peak(&self.left).max(mixbus_core::peak(&self.right))
    }

    /// Deinterleave `[L0, R0, L1, R1, ...]`. A trailing odd sample is dropped.
    pub fn from_interleaved(interleaved: &[f32]) -> Self {
        let (left, right) = interleaved
            .chunks_exact(2)
            .map(|frame| (frame[0], frame[1]))
            .unzip();
        Self { left, right }
    }
}

/// WAV format of a file to write or one that was read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavSpec {
    /// Channel count in the file.
    pub channels: u16,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// 16 or 24 for integer PCM, 32 for float.
    pub bits_per_sample: u16,
}

impl Default for WavSpec {
    fn default() -> Self {
        Self {
            channels: 2,
            sample_rate: 48000,
            bits_per_sample: 32,
        }
    }
}

impl From<hound::WavSpec> for WavSpec {
    fn from(spec: hound::WavSpec) -> Self {
        Self {
            channels: spec.channels,
            sample_rate: spec.sample_rate,
            bits_per_sample: spec.bits_per_sample,
        }
    }
}

impl From<WavSpec> for hound::WavSpec {
    fn from(spec: WavSpec) -> Self {
        hound::WavSpec {
            channels: spec.channels,
            sample_rate: spec.sample_rate,
            bits_per_sample: spec.bits_per_sample,
            sample_format: if spec.bits_per_sample == 32 {
                SampleFormat::Float
            } else {
                SampleFormat::Int
            },
        }
    }
}

/// Header details of a WAV file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WavInfo {
    /// Format of the file.
    pub spec: WavSpec,
    /// Frames per channel.
    pub frames: u64,
    /// Length in seconds.
    pub duration_secs: f64,
}

/// Read the header without loading samples.
pub fn read_wav_info<P: AsRef<Path>>(path: P) -> Result<WavInfo> {
    let reader = WavReader::open(path)?;
    let spec = WavSpec::from(reader.spec());
    let frames = u64::from(reader.len()) / u64::from(spec.channels.max(1));
    Ok(WavInfo {
        spec,
        frames,
        duration_secs: frames as f64 / f64::from(spec.sample_rate),
    })
}

/// Read a WAV file as stereo.
///
/// Mono is duplicated to both sides. Files with more than two channels keep
/// the first two.
pub fn read_wav_stereo<P: AsRef<Path>>(path: P) -> Result<(StereoSamples, WavSpec)> {
    let reader = WavReader::open(path)?;
    let spec = WavSpec::from(reader.spec());
    let channels = usize::from(spec.channels.max(1));

    let samples: Vec<f32> = match reader.spec().sample_format {
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<std::result::Result<Vec<_>, _>>()?,
        SampleFormat::Int => {
            let full_scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / full_scale))
                .collect::<std::result::Result<Vec<_>, _>>()?
        }
    };

    let stereo = match channels {
        1 => StereoSamples::from_mono(samples),
        2 => StereoSamples::from_interleaved(&samples),
        _ => {
            let (left, right) = samples
                .chunks_exact(channels)
                .map(|frame| (frame[0], frame[1]))
                .unzip();
            StereoSamples { left, right }
        }
    };
    tracing::debug!(
        frames = stereo.len(),
        channels,
        sample_rate = spec.sample_rate,
        "wav loaded"
    );

    Ok((stereo, spec))
}

/// Write stereo samples. `spec.channels` is forced to 2.
///
/// Integer formats are clamped to full scale.
pub fn write_wav_stereo<P: AsRef<Path>>(
    path: P,
    samples: &StereoSamples,
    spec: WavSpec,
) -> Result<()> {
    let spec = WavSpec {
        channels: 2,
        ..spec
    };
    let mut writer = WavWriter::create(path, hound::WavSpec::from(spec))?;

    if spec.bits_per_sample == 32 {
        for (l, r) in samples.left.iter().zip(&samples.right) {
            writer.write_sample(*l)?;
            writer.write_sample(*r)?;
        }
    } else {
        let full_scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
        let quantize = |x: f32| (x * full_scale).clamp(-full_scale, full_scale - 1.0) as i32;
        for (l, r) in samples.left.iter().zip(&samples.right) {
            writer.write_sample(quantize(*l))?;
            writer.write_sample(quantize(*r))?;
        }
    }

    writer.finalize()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn ramp(n: usize, scale: f32) -> Vec<f32> {
        (0..n).map(|i| (i as f32 / n as f32) * scale).collect()
    }

    #[test]
    fn test_float_keeps_samples() {
        let samples = StereoSamples::new(ramp(1000, 0.9), ramp(1000, -0.9));
        let file = NamedTempFile::new().unwrap();
        write_wav_stereo(file.path(), &samples, WavSpec::default()).unwrap();

        let (loaded, spec) = read_wav_stereo(file.path()).unwrap();
        assert_eq!(spec.channels, 2);
        assert_eq!(loaded, samples);
    }

    #[test]
    fn test_int16_quantizes_and_clamps() {
        let samples = StereoSamples::new(vec![0.5, 2.0, -2.0], vec![0.25, 0.0, 0.0]);
        let spec = WavSpec {
            bits_per_sample: 16,
            sample_rate: 44100,
            ..WavSpec::default()
        };
        let file = NamedTempFile::new().unwrap();
        write_wav_stereo(file.path(), &samples, spec).unwrap();

        let (loaded, loaded_spec) = read_wav_stereo(file.path()).unwrap();
        assert_eq!(loaded_spec.sample_rate, 44100);
        assert!((loaded.left[0] - 0.5).abs() < 1e-4);
        assert!((loaded.right[0] - 0.25).abs() < 1e-4);
        assert!(loaded.left[1] < 1.0 && loaded.left[1] > 0.999);
        assert_eq!(loaded.left[2], -1.0);
    }

    #[test]
    fn test_mono_file_reads_as_stereo() {
        let file = NamedTempFile::new().unwrap();
        let mono = ramp(100, 1.0);
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 48000,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let mut writer = WavWriter::create(file.path(), spec).unwrap();
        for &s in &mono {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();

        let (stereo, _) = read_wav_stereo(file.path()).unwrap();
        assert_eq!(stereo.left, mono);
        assert_eq!(stereo.right, mono);
    }

    #[test]
    fn test_info_reports_duration() {
        let samples = StereoSamples::from_mono(vec![0.0; 24000]);
        let file = NamedTempFile::new().unwrap();
        write_wav_stereo(file.path(), &samples, WavSpec::default()).unwrap();

        let info = read_wav_info(file.path()).unwrap();
        assert_eq!(info.frames, 24000);
        assert!((info.duration_secs - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_interleaved_drops_odd_tail() {
        let s = StereoSamples::from_interleaved(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(s.left, vec![1.0, 3.0]);
        assert_eq!(s.right, vec![2.0, 4.0]);
    }
}
