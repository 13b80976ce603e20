//! Effect listing and information command.

#![allow(clippy::print_literal)] // Table headers use literal strings intentionally

use clap::Args;
use mixbus_registry::EffectRegistry;

#[derive(Args)]
pub struct EffectsArgs {
    /// Show parameters of a specific effect
    #[arg(value_name = "EFFECT")]
    effect: Option<String>,
}

pub fn run(args: EffectsArgs) -> anyhow::Result<()> {
    let registry = EffectRegistry::new();

    let Some(id) = &args.effect else {
        println!("Available Effects");
        println!("=================");
        println!();
        for effect in registry.all_effects() {
            println!(
                "  {:12} {:12} - {}",
                effect.id,
                effect.category.name(),
                effect.description
            );
        }

        println!();
        println!("Instruments");
        println!("-----------");
        println!();
        for instrument in registry.all_instruments() {
            println!("  {:12} - {}", instrument.id, instrument.description);
        }

        println!();
        println!("Use 'mixbus effects <id>' for parameter details.");
        return Ok(());
    };

    let id = id.to_ascii_lowercase();
    let descriptor = registry
        .get(&id)
        .ok_or_else(|| anyhow::anyhow!("Unknown effect: {}", id))?;
    let params = registry.param_descriptors(&id)?;

    println!("{} ({})", descriptor.name, descriptor.id);
    println!("{}", "=".repeat(descriptor.name.len() + descriptor.id.len() + 3));
    println!();
    println!("{}", descriptor.description);
    println!();

    println!("Parameters:");
    println!();
    println!("  {:12}  {:20}  {:12}  {}", "Key", "Name", "Default", "Range");
    println!("  {:12}  {:20}  {:12}  {}", "---", "----", "-------", "-----");
    for param in &params {
        println!(
            "  {:12}  {:20}  {:12}  {} .. {}",
            param.string_id,
            param.name,
            param.format_value(param.default),
            param.format_value(param.min),
            param.format_value(param.max)
        );
    }

    println!();
    println!("Project usage:");
    println!();
    println!("  [[channels.effects]]");
    println!("  type = \"{}\"", descriptor.id);
    for param in params.iter().take(2) {
        println!("  params.{} = \"{}\"", param.string_id, param.format_value(param.default));
    }

    Ok(())
}
