//! Starter project command.

use std::path::PathBuf;

use clap::Args;
use mixbus_config::{Project, project_name_from_path};

#[derive(Args)]
pub struct NewArgs {
    /// Where to write the project file
    #[arg(value_name = "PATH")]
    path: PathBuf,

    /// Project name (default: file stem)
    #[arg(long)]
    name: Option<String>,

    /// Overwrite an existing file
    #[arg(long)]
    force: bool,
}

pub fn run(args: NewArgs) -> anyhow::Result<()> {
    if args.path.exists() && !args.force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            args.path.display()
        );
    }

    let name = args
        .name
        .or_else(|| project_name_from_path(&args.path))
        .unwrap_or_else(|| "untitled".to_string());
    let project = Project::starter(&name);
    project.save(&args.path)?;

    println!("Created '{}' at {}", name, args.path.display());
    println!();
    println!("Next:");
    println!("  mixbus check {}", args.path.display());
    println!("  mixbus render {} out.wav", args.path.display());
    Ok(())
}
