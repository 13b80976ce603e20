//! Real-time playback command.

use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Args;
use mixbus_config::Settings;
use mixbus_engine::{Command, Engine, EngineConfig};
use mixbus_io::{AudioBackend, BackendStreamConfig, CpalBackend, NullBackend};

use super::common::{format_time, open_project, peak_db, report};

/// Status line refresh interval.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Longest `--seconds` accepted (one day).
const MAX_SECONDS: f32 = 86_400.0;

#[derive(Args)]
pub struct PlayArgs {
    /// Project file or name
    #[arg(value_name = "PROJECT")]
    project: String,

    /// Output device name (default: from settings, then system default)
    #[arg(short, long)]
    output: Option<String>,

    /// Stop after this many seconds (default: until Ctrl+C)
    #[arg(short, long)]
    seconds: Option<f32>,

    /// Run on the silent backend instead of an audio device
    #[arg(long)]
    null: bool,
}

pub fn run(args: PlayArgs) -> anyhow::Result<()> {
    let settings = Settings::load_or_default()?;
    let (project, base_dir) = open_project(&args.project)?;

    let stream_config = BackendStreamConfig {
        sample_rate: settings.audio.sample_rate,
        buffer_size: settings.audio.buffer_size,
        channels: settings.audio.channels,
        device_name: args.output.clone().or_else(|| settings.audio.device.clone()),
    };
    let backend: Box<dyn AudioBackend> = if args.null {
        Box::new(NullBackend::new())
    } else {
        Box::new(CpalBackend::new())
    };

    let mut engine = Engine::new(EngineConfig::from_settings(&settings));
    let notifications = engine.subscribe();
    engine
        .load_project(&project, &base_dir)
        .with_context(|| format!("loading project '{}'", project.name))?;
    report(notifications.try_iter());

    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    engine.apply(Command::Play)?;
    engine.start(backend, stream_config)?;

    println!("Playing '{}'", project.name);
    println!("  Backend: {}", engine.backend_name().unwrap_or("none"));
    println!("  Sample rate: {} Hz", engine.sample_rate() as u32);
    println!("  Channels: {}", engine.graph().len());
    println!("  Tracks: {}", engine.tracks().len());
    match args.seconds {
        Some(seconds) => println!("\nPlaying for {:.1}s (Ctrl+C to stop)\n", seconds),
        None => println!("\nPress Ctrl+C to stop\n"),
    }

    let deadline = args
        .seconds
        .map(|s| Instant::now() + Duration::from_secs_f32(s.clamp(0.0, MAX_SECONDS)));
    let handle = engine.handle();
    let sample_rate = engine.sample_rate();

    while running.load(Ordering::SeqCst) {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            break;
        }
        std::thread::sleep(POLL_INTERVAL);
        engine.poll()?;
        report(notifications.try_iter());

        print!(
            "\r  {}  peak {:6.1} dB  ",
            format_time(handle.position(), sample_rate),
            peak_db(handle.master_peak())
        );
        std::io::stdout().flush().ok();
    }

    engine.stop()?;
    report(notifications.try_iter());

    println!("\n\nStopped.");
    let underruns = handle.underruns();
    if underruns > 0 {
        println!("  {} buffer underrun(s); try a larger buffer_size", underruns);
    }
    Ok(())
}
