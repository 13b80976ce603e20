//! Audio output device listing command.

use clap::Args;
use mixbus_io::{AudioBackend, CpalBackend};

#[derive(Args)]
pub struct DevicesArgs {
    /// Only show the default output device
    #[arg(long)]
    default: bool,
}

pub fn run(args: DevicesArgs) -> anyhow::Result<()> {
    let backend = CpalBackend::new();
    let default = backend.default_output_device()?;

    if args.default {
        println!("Default Output Device");
        println!("=====================\n");
        match default {
            Some(device) => {
                println!("  Name: {}", device.name);
                println!("  Sample Rate: {} Hz", device.default_sample_rate);
            }
            None => println!("  None"),
        }
        return Ok(());
    }

    let outputs: Vec<_> = backend
        .list_devices()?
        .into_iter()
        .filter(|d| d.is_output)
        .collect();
    if outputs.is_empty() {
        println!("No output devices found.");
        return Ok(());
    }

    println!("Output Devices");
    println!("==============\n");
    let default_name = default.map(|d| d.name);
    for (idx, device) in outputs.iter().enumerate() {
        let marker = if default_name.as_deref() == Some(device.name.as_str()) {
            " (default)"
        } else {
            ""
        };
        println!(
            "  [{}] {} ({} Hz){}",
            idx, device.name, device.default_sample_rate, marker
        );
    }
    println!();
    println!("Total: {} output(s)", outputs.len());
    println!();
    println!("Tip: pick a device by name with --output, or set audio.device in settings:");
    println!("  mixbus play my-song --output \"USB\"");

    Ok(())
}
