//! Silent output device driven by a timer thread.
//!
//! Used when no hardware is available or the hardware stream dies. The
//! callback runs at the configured rate and buffer size, and its output is
//! discarded.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::backend::{
    AudioBackend, AudioDevice, BackendStreamConfig, ErrorCallback, OutputCallback, StreamHandle,
};
use crate::{Error, Result};

/// Device name reported by [`NullBackend`].
pub const NULL_DEVICE_NAME: &str = "null";

/// Timer-paced silent backend.
#[derive(Debug, Clone, Default)]
pub struct NullBackend {
    unpaced: bool,
}

impl NullBackend {
    /// Backend that calls back in real time.
    pub fn new() -> Self {
        Self { unpaced: false }
    }

    /// Backend that calls back as fast as the callback returns.
    pub fn unpaced() -> Self {
        Self { unpaced: true }
    }
}

/// Keeps the timer thread running. Stops and joins it on drop.
struct NullStream {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl Drop for NullStream {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl AudioBackend for NullBackend {
    fn name(&self) -> &'static str {
        "null"
    }

    fn list_devices(&self) -> Result<Vec<AudioDevice>> {
        Ok(vec![AudioDevice {
            name: NULL_DEVICE_NAME.to_string(),
            is_output: true,
            is_input: false,
            default_sample_rate: 48000,
        }])
    }

    fn default_output_device(&self) -> Result<Option<AudioDevice>> {
        Ok(self.list_devices()?.into_iter().next())
    }

    fn build_output_stream(
        &self,
        config: &BackendStreamConfig,
        mut callback: OutputCallback,
        _error_callback: ErrorCallback,
    ) -> Result<StreamHandle> {
        if config.sample_rate == 0 || config.buffer_size == 0 || config.channels == 0 {
            return Err(Error::DeviceUnavailable(format!(
                "invalid null stream config: {} Hz, {} frames, {} channels",
                config.sample_rate, config.buffer_size, config.channels
            )));
        }

        let stop = Arc::new(AtomicBool::new(false));
        let period = Duration::from_secs_f64(
            f64::from(config.buffer_size) / f64::from(config.sample_rate),
        );
        let mut buffer = vec![0.0f32; config.buffer_size as usize * config.channels as usize];
        let unpaced = self.unpaced;
        let thread_stop = Arc::clone(&stop);

        let thread = std::thread::Builder::new()
            .name("mixbus-null-audio".into())
            .spawn(move || {
                let mut deadline = Instant::now();
                while !thread_stop.load(Ordering::Acquire) {
                    buffer.fill(0.0);
                    callback(&mut buffer);
                    if unpaced {
                        std::thread::yield_now();
                        continue;
                    }
                    deadline += period;
                    let now = Instant::now();
                    if deadline > now {
                        std::thread::sleep(deadline - now);
                    } else {
                        deadline = now;
                    }
                }
            })?;

        tracing::info!(
            sample_rate = config.sample_rate,
            buffer_size = config.buffer_size,
            unpaced,
            "null output stream started"
        );

        Ok(StreamHandle::new(NullStream {
            stop,
            thread: Some(thread),
        }))
    }
}
