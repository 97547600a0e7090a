//! Command implementations for the kittydex CLI.

mod missing;
mod plan;
mod run;
mod show;

pub use missing::list_missing;
pub use plan::print_plan;
pub use run::run_harvest;
pub use show::show_record;

use std::path::Path;

use anyhow::{Context, Result};
use kittydex_core::HarvestConfig;

use crate::cli::HarvestArgs;

/// Build the effective configuration: defaults, then the config file, then flags.
pub fn resolve_config(path: Option<&Path>, args: HarvestArgs) -> Result<HarvestConfig> {
    let base = match path {
        Some(path) => HarvestConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => HarvestConfig::default(),
    };
    Ok(args.apply(base))
}
