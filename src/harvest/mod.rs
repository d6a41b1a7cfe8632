//! Pagination controller
//!
//! The core of the harvester: walks the offset-capped result set window by
//! window, page by page, checkpointing after every persisted page and
//! resuming from the checkpoint after an unplanned termination.

mod controller;

pub use controller::{HarvestReport, Harvester};
