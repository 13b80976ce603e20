//! Offline project rendering command.

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use mixbus_config::Settings;
use mixbus_engine::{Command, Engine, EngineConfig};
use mixbus_io::{StereoSamples, WavSpec, write_wav_stereo};

use super::common::{format_time, open_project, peak_db, report};

/// Frames rendered per progress step.
const CHUNK: usize = 4096;

/// Tail rendered after the last clip so delays can ring out.
const TAIL_SECONDS: f32 = 1.0;

#[derive(Args)]
pub struct RenderArgs {
    /// Project file or name
    #[arg(value_name = "PROJECT")]
    project: String,

    /// Output WAV file
    #[arg(value_name = "OUTPUT")]
    output: PathBuf,

    /// Length in seconds (default: one loop pass, or the last clip plus a tail)
    #[arg(short, long)]
    seconds: Option<f32>,

    /// Sample rate override in Hz
    #[arg(long)]
    sample_rate: Option<u32>,

    /// Output bit depth (16, 24, or 32)
    #[arg(long, default_value = "32")]
    bit_depth: u16,
}

pub fn run(args: RenderArgs) -> anyhow::Result<()> {
    if !matches!(args.bit_depth, 16 | 24 | 32) {
        anyhow::bail!("Unsupported bit depth {} (use 16, 24, or 32)", args.bit_depth);
    }

    let settings = Settings::load_or_default()?;
    let (project, base_dir) = open_project(&args.project)?;

    let mut config = EngineConfig::from_settings(&settings);
    if let Some(rate) = args.sample_rate {
        config.sample_rate = rate as f32;
    }
    let mut engine = Engine::new(config);
    let notifications = engine.subscribe();
    engine
        .load_project(&project, &base_dir)
        .with_context(|| format!("loading project '{}'", project.name))?;
    report(notifications.try_iter());

    let sample_rate = engine.sample_rate();
    let frames = match args.seconds {
        Some(seconds) => (seconds.max(0.0) * sample_rate) as usize,
        None => default_length(&engine),
    };
    if frames == 0 {
        anyhow::bail!("Nothing to render: the project is empty. Pass --seconds to render silence.");
    }

    println!("Rendering '{}' ({})...", project.name, format_time(frames as u64, sample_rate));
    engine.apply(Command::Play)?;

    let pb = ProgressBar::new(frames as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
            .progress_chars("##-"),
    );

    let mut left = vec![0.0; frames];
    let mut right = vec![0.0; frames];
    for (l, r) in left.chunks_mut(CHUNK).zip(right.chunks_mut(CHUNK)) {
        engine.render_into(l, r)?;
        pb.inc(l.len() as u64);
    }
    pb.finish_with_message("done");

    let samples = StereoSamples::new(left, right);
    let peak = samples.peak();
    write_wav_stereo(
        &args.output,
        &samples,
        WavSpec {
            channels: 2,
            sample_rate: sample_rate as u32,
            bits_per_sample: args.bit_depth,
        },
    )?;

    println!("\nWrote {}", args.output.display());
    println!("  {} frames, {} Hz, {}-bit", frames, sample_rate as u32, args.bit_depth);
    println!("  Peak {:.1} dBFS", peak_db(peak));
    if peak > 1.0 {
        println!("  Warning: output clips; lower channel volumes");
    }
    Ok(())
}

/// One pass of the loop, or everything up to the last clip plus a tail.
fn default_length(engine: &Engine) -> usize {
    let transport = engine.transport();
    let timing = transport.timing();
    if let Some(range) = transport.loop_range() {
        return timing.tick_to_frame(range.end_tick) as usize;
    }
    let end_tick = engine.tracks().iter().map(|t| t.end_tick()).max().unwrap_or(0);
    if end_tick == 0 {
        return 0;
    }
    timing.tick_to_frame(end_tick) as usize + (TAIL_SECONDS * timing.sample_rate) as usize
}
