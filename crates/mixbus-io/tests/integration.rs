//! Integration tests for mixbus-io backends and WAV files.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use mixbus_io::{
    AudioBackend, BackendStreamConfig, NullBackend, StereoSamples, WavSpec, read_wav_info,
    read_wav_stereo, write_wav_stereo,
};
use tempfile::NamedTempFile;

fn sine(sample_rate: u32, freq_hz: f32, frames: usize) -> Vec<f32> {
    (0..frames)
        .map(|i| (2.0 * std::f32::consts::PI * freq_hz * i as f32 / sample_rate as f32).sin() * 0.8)
        .collect()
}

#[test]
fn wav_24_bit_stereo_within_quantization() {
    let left = sine(48000, 440.0, 4800);
    let right = sine(48000, 660.0, 4800);
    let samples = StereoSamples::new(left.clone(), right.clone());
    let spec = WavSpec {
        bits_per_sample: 24,
        ..WavSpec::default()
    };

    let file = NamedTempFile::new().unwrap();
    write_wav_stereo(file.path(), &samples, spec).unwrap();
    let (loaded, loaded_spec) = read_wav_stereo(file.path()).unwrap();

    assert_eq!(loaded_spec.bits_per_sample, 24);
    assert_eq!(loaded.len(), 4800);
    for (a, b) in left.iter().zip(&loaded.left) {
        assert!((a - b).abs() < 1e-6, "{a} vs {b}");
    }
    for (a, b) in right.iter().zip(&loaded.right) {
        assert!((a - b).abs() < 1e-6, "{a} vs {b}");
    }
    assert_eq!(read_wav_info(file.path()).unwrap().frames, 4800);
}

#[test]
fn missing_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(read_wav_stereo(dir.path().join("absent.wav")).is_err());
}

#[test]
fn null_stream_delivers_frames_near_real_time() {
    let frames = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&frames);
    let config = BackendStreamConfig {
        sample_rate: 48000,
        buffer_size: 480,
        ..BackendStreamConfig::default()
    };
    let backend = NullBackend::new();
    assert_eq!(backend.actual_sample_rate(&config), 48000);

    let stream = backend
        .build_output_stream(
            &config,
            Box::new(move |data: &mut [f32]| {
                counter.fetch_add(data.len() as u64 / 2, Ordering::Relaxed);
            }),
            Box::new(|_| {}),
        )
        .unwrap();
    std::thread::sleep(Duration::from_millis(200));
    drop(stream);

    // 200 ms at 48 kHz is 9600 frames; allow for scheduler jitter.
    let delivered = frames.load(Ordering::Relaxed);
    assert!(delivered >= 2400, "{delivered}");
    assert!(delivered <= 48000, "{delivered}");
}
