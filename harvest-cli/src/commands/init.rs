//! `harvest init [--catalog <loc>] [--environment <env>] [--workers N]`

use anyhow::{Context, Result};
use clap::Args;

use harvest_core::{config, Environment, HarvestConfig};

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Catalog file path or http(s) URL.
    #[arg(long)]
    pub catalog: Option<String>,

    /// production | staging. Staging uses a separate store file.
    #[arg(long, short = 'e', value_name = "ENV")]
    pub environment: Option<Environment>,

    /// Worker threads per run.
    #[arg(long)]
    pub workers: Option<usize>,
}

impl InitArgs {
    pub fn run(self) -> Result<()> {
        let home = dirs::home_dir().context("could not determine home directory")?;
        let path = config::config_path_at(&home);
        let existed = path.exists();

        let defaults = HarvestConfig::default();
        let wanted = HarvestConfig {
            catalog: self.catalog,
            environment: self.environment.unwrap_or_default(),
            workers: self.workers.unwrap_or(defaults.workers),
            ..defaults
        };
        let config = config::init_at(&home, wanted)
            .with_context(|| format!("failed to write {}", path.display()))?;

        if existed {
            println!("✓ Already initialized: {}", path.display());
        } else {
            println!("✓ Wrote {}", path.display());
        }
        println!("  environment: {}", config.environment);
        println!(
            "  catalog:     {}",
            config.catalog.as_deref().unwrap_or("<unset>")
        );
        println!("  store:       {}", config.store_path_at(&home).display());
        Ok(())
    }
}
