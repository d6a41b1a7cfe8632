// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::unused_self)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::needless_pass_by_value)]

//! # inat-harvest
//!
//! Harvester for iNaturalist observation records of a configured taxon in a
//! configured place. The remote API refuses any page whose offset exceeds
//! 10,000 records, so a full harvest slides a date-filtered window across
//! the result space: page through a window until the cap, then narrow the
//! window's lower bound to the last persisted date and start over at page 1.
//!
//! Progress is checkpointed to disk after every persisted page, so an
//! interrupted run resumes from its last safe date instead of restarting.
//! The sink deduplicates on record id, which makes reprocessing a partial
//! page after a crash harmless.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use inat_harvest::{
//!     ApiClient, CheckpointStore, HarvestConfig, Harvester, ObservationStore, Result,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = HarvestConfig::from_file("harvest.yaml")?;
//!     let client = ApiClient::from_config(&config)?;
//!     let sink = ObservationStore::open(config.database_path(), &config.table_name)?;
//!     let checkpoint = CheckpointStore::new(&config.checkpoint_file);
//!
//!     let report = Harvester::new(config, client, sink, checkpoint).run().await?;
//!     println!("inserted {} records", report.records_inserted);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
#![allow(missing_docs)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types
pub mod error;

/// Common record and window types
pub mod types;

/// Harvest configuration
pub mod config;

/// Remote API client with retry, rate limiting and session login
pub mod api;

/// Record extraction from API page payloads
pub mod extract;

/// Resume checkpoint persistence
pub mod checkpoint;

/// DuckDB record sink
pub mod sink;

/// Pagination/windowing controller
pub mod harvest;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use api::{ApiClient, PageFetcher, SessionAuth};
pub use checkpoint::CheckpointStore;
pub use config::{HarvestConfig, OFFSET_CAP};
pub use error::{Error, Result};
pub use harvest::{HarvestReport, Harvester};
pub use sink::{ObservationStore, RecordSink};
pub use types::{Observation, QualityGrade, QueryWindow};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
