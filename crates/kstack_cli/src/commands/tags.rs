//! Tags command - Resolve the tag set of one resource.

use anyhow::Result;
use clap::Args;
use tracing::info;

use kstack_config::Tags;
use kstack_iac::{ManifestFormat, TagResolver};

use super::{parse_format, parse_key_value, ConfigArgs};

#[derive(Args)]
pub struct TagsArgs {
    #[command(flatten)]
    config: ConfigArgs,

    /// Resource type to resolve for (defaults to the configured one)
    #[arg(short = 't', long = "for")]
    resource: Option<String>,

    /// Call-site tag override, repeatable
    #[arg(long = "tag", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    tags: Vec<(String, String)>,

    /// Output format (json, yaml)
    #[arg(short, long, default_value = "json", value_parser = parse_format)]
    format: ManifestFormat,
}

pub fn execute(args: TagsArgs) -> Result<()> {
    let config = args.config.load()?;

    let mut call_site: Tags = args.tags.into_iter().collect();
    if let Some(resource) = args.resource {
        call_site.insert("resourceType".to_string(), resource);
    }

    let resolved = TagResolver::for_config(config).resolve(&call_site)?;
    info!("Resolved {} tags for {}", resolved.len(), resolved.name());

    let rendered = match args.format {
        ManifestFormat::Json => serde_json::to_string_pretty(&resolved)?,
        ManifestFormat::Yaml => serde_yaml::to_string(&resolved)?,
    };
    println!("{}", rendered);

    Ok(())
}
