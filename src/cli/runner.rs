//! CLI runner - executes commands

use crate::api::{ApiClient, SessionAuth};
use crate::checkpoint::CheckpointStore;
use crate::cli::commands::{Cli, Commands, OutputFormat};
use crate::config::HarvestConfig;
use crate::error::{Error, Result};
use crate::harvest::{HarvestReport, Harvester};
use crate::sink::ObservationStore;
use serde_json::json;
use tracing::{info, warn};

/// Guidance printed under a fatal error before exiting.
///
/// Mid-harvest aborts leave the checkpoint on disk, so the user needs to
/// know that simply rerunning continues where the run stopped; errors that
/// name a configuration value to change carry that in their own message.
pub fn fatal_guidance(error: &Error) -> Option<&'static str> {
    if error.resume_preserved() {
        Some("Checkpoint preserved; the next run will resume automatically.")
    } else {
        None
    }
}

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        match &self.cli.command {
            Commands::Run {
                start_page,
                no_login,
            } => self.run_harvest(*start_page, *no_login).await,
            Commands::Status => self.status().await,
            Commands::Reset { yes } => self.reset(*yes).await,
            Commands::Validate => self.validate(),
        }
    }

    /// Load the harvest configuration
    fn load_config(&self) -> Result<HarvestConfig> {
        let path = self
            .cli
            .config
            .as_ref()
            .ok_or_else(|| Error::config("Configuration file not specified (use -c flag)"))?;
        HarvestConfig::from_file(path)
    }

    async fn run_harvest(&self, start_page: Option<u32>, no_login: bool) -> Result<()> {
        let mut config = self.load_config()?;
        if let Some(page) = start_page {
            config.start_page = page;
        }
        config.validate()?;

        let client = ApiClient::from_config(&config)?;

        // An authenticated session widens coordinate visibility for taxa
        // the API obscures from anonymous callers.
        match (&config.credentials, no_login) {
            (Some(credentials), false) => {
                let session = SessionAuth::new(credentials.clone());
                session.login(client.http(), &config.site_url).await?;
                info!("authenticated session established");
            }
            (Some(_), true) => warn!("credentials configured but login skipped (--no-login)"),
            (None, _) => info!("no credentials configured, harvesting anonymously"),
        }

        let sink = ObservationStore::open(config.database_path(), &config.table_name)?;
        let checkpoint = CheckpointStore::new(&config.checkpoint_file);

        let report = Harvester::new(config, client, sink, checkpoint)
            .run()
            .await?;
        self.print_report(&report);
        Ok(())
    }

    async fn status(&self) -> Result<()> {
        let config = self.load_config()?;
        let checkpoint = CheckpointStore::new(&config.checkpoint_file);
        let resume_date = checkpoint.read().await?;

        let db_path = config.database_path();
        let stored = if db_path.exists() {
            Some(ObservationStore::open(&db_path, &config.table_name)?.count()?)
        } else {
            None
        };

        match self.cli.format {
            OutputFormat::Json => {
                let status = json!({
                    "checkpoint": resume_date.map(|d| d.to_string()),
                    "database": db_path.display().to_string(),
                    "records": stored,
                });
                println!("{}", serde_json::to_string_pretty(&status)?);
            }
            OutputFormat::Pretty => {
                match resume_date {
                    Some(date) => println!("Checkpoint: {date} (interrupted run, will resume)"),
                    None => println!("Checkpoint: none (next run starts fresh)"),
                }
                match stored {
                    Some(count) => println!("Database:   {} ({count} records)", db_path.display()),
                    None => println!("Database:   {} (not created yet)", db_path.display()),
                }
            }
        }
        Ok(())
    }

    async fn reset(&self, yes: bool) -> Result<()> {
        let config = self.load_config()?;
        let checkpoint = CheckpointStore::new(&config.checkpoint_file);

        if !checkpoint.exists() {
            println!("No checkpoint to remove");
            return Ok(());
        }
        if !yes {
            return Err(Error::config(format!(
                "Refusing to delete checkpoint '{}' without --yes",
                checkpoint.path().display()
            )));
        }
        checkpoint.clear().await?;
        println!("Checkpoint removed; next run starts fresh");
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        let config = self.load_config()?;
        config.validate()?;
        if config.start_offset_over_cap() {
            warn!(
                start_page = config.start_page,
                per_page = config.per_page,
                "start offset exceeds the API cap; run requires a checkpoint"
            );
        }
        println!(
            "Configuration OK: place {} / taxon {} -> {}",
            config.place_id,
            config.taxon_id,
            config.database_path().display()
        );
        Ok(())
    }

    fn print_report(&self, report: &HarvestReport) {
        match self.cli.format {
            OutputFormat::Json => match serde_json::to_string_pretty(report) {
                Ok(s) => println!("{s}"),
                Err(e) => eprintln!("Failed to serialize report: {e}"),
            },
            OutputFormat::Pretty => {
                println!("Harvest complete");
                println!("  records extracted: {}", report.records_extracted);
                println!("  records inserted:  {}", report.records_inserted);
                println!("  pages fetched:     {}", report.pages_fetched);
                println!("  window rollovers:  {}", report.cycles_completed);
                if report.resumed {
                    println!("  (resumed from checkpoint)");
                }
            }
        }
    }
}
