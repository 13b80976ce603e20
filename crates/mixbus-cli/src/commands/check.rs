//! Project validation command.

use clap::Args;
use mixbus_config::{Project, ValidationError, validate_project};
use mixbus_registry::EffectRegistry;

use super::common::open_project;

#[derive(Args)]
pub struct CheckArgs {
    /// Project file or name
    #[arg(value_name = "PROJECT")]
    project: String,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,
}

pub fn run(args: CheckArgs) -> anyhow::Result<()> {
    let (project, _) = open_project(&args.project)?;
    let registry = EffectRegistry::new();

    let errors = match validate_project(&project, &registry) {
        Ok(()) => Vec::new(),
        Err(ValidationError::Multiple(errors)) => errors.iter().map(ToString::to_string).collect(),
        Err(e) => vec![e.to_string()],
    };
    let order = render_order(&project);

    if args.json {
        let report = serde_json::json!({
            "name": project.name,
            "valid": errors.is_empty(),
            "errors": errors,
            "render_order": order,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Project: {}", project.name);
        println!("{}", "=".repeat(project.name.len() + 9));
        println!();
        if let Some(description) = &project.description {
            println!("{}", description);
            println!();
        }
        println!("  Channels: {}", project.channels.len());
        println!("  Tracks:   {}", project.tracks.len());
        println!("  Tempo:    {} bpm", project.transport.bpm);
        println!();

        if !order.is_empty() {
            println!("Render order:");
            for (i, channel) in order.iter().enumerate() {
                println!("  {}. {}", i + 1, channel);
            }
            println!();
        }

        if errors.is_empty() {
            println!("OK");
        } else {
            println!("Problems:");
            for error in &errors {
                println!("  - {}", error);
            }
        }
    }

    if !errors.is_empty() {
        anyhow::bail!("{} problem(s) found", errors.len());
    }
    Ok(())
}

/// Channels in processing order, master last. Empty when routing is invalid.
fn render_order(project: &Project) -> Vec<String> {
    let Ok(graph) = project.to_graph() else {
        return Vec::new();
    };
    graph
        .render_order()
        .into_iter()
        .filter_map(|id| graph.channel(id).map(|c| format!("{} ({})", c.name, id)))
        .collect()
}
