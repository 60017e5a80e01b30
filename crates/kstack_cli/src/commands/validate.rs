//! Validate command - Validate an environment configuration.

use anyhow::Result;
use clap::Args;
use tracing::info;

use super::ConfigArgs;

#[derive(Args)]
pub struct ValidateArgs {
    #[command(flatten)]
    config: ConfigArgs,
}

pub fn execute(args: ValidateArgs, quiet: bool) -> Result<()> {
    info!("Validating configuration");

    let config = args.config.load()?;

    if !quiet {
        println!("✅ Configuration valid");
        println!("   name:        {}", config.name);
        println!("   environment: {}", config.environment);
        println!("   region:      {}", config.region);
        println!("   vendor:      {}", config.vendor);
        println!(
            "   subnets:     {} public, {} private",
            config.public_subnets().len(),
            config.private_subnets().len()
        );
    }

    Ok(())
}
