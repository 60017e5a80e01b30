//! Synth command - Compose the stack and emit its manifest.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use kstack_iac::{compose, ManifestFormat, StackManifest, StackSpec};

use super::{ensure_parent, parse_format, ConfigArgs};

#[derive(Args)]
pub struct SynthArgs {
    #[command(flatten)]
    config: ConfigArgs,

    /// Stack name (defaults to <name>-<environment>)
    #[arg(long)]
    stack_name: Option<String>,

    /// Output format (json, yaml)
    #[arg(short, long, default_value = "json", value_parser = parse_format)]
    format: ManifestFormat,

    /// Write the manifest to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

pub fn execute(args: SynthArgs, quiet: bool) -> Result<()> {
    let config = args.config.load()?;
    let stack_name = args
        .stack_name
        .unwrap_or_else(|| format!("{}-{}", config.name, config.environment));

    let spec = StackSpec::for_environment(config.environment)?;
    let stack = compose(&spec, &config, &stack_name)?;
    let manifest = StackManifest::from_stack(&stack);
    let rendered = manifest.render(args.format)?;

    match args.output {
        Some(path) => {
            ensure_parent(&path)?;
            fs::write(&path, rendered)
                .with_context(|| format!("Failed to write manifest to {}", path.display()))?;
            info!("Manifest written to {:?}", path);
            if !quiet {
                println!("✅ Synthesized {} ({} resources)", stack_name, manifest.resources.len());
                println!("   📄 {}", path.display());
            }
        }
        None => println!("{}", rendered),
    }

    Ok(())
}
