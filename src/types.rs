//! Core data model for harvested observations

use crate::config::OFFSET_CAP;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// The date-bounded slice of the result set currently being paged.
///
/// The remote API refuses offsets past [`OFFSET_CAP`], so a window is only
/// addressable while `page * per_page` stays at or under the cap. Once the
/// cap is reached the window rolls over: the lower bound advances to the
/// last persisted date and the page cursor resets to 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryWindow {
    /// Inclusive oldest observation date served by this window
    pub lower: NaiveDate,
    /// Inclusive newest observation date served by this window
    pub upper: NaiveDate,
    /// Current page cursor, 1-based
    pub page: u32,
    /// Records per page
    pub per_page: u32,
}

impl QueryWindow {
    /// Create a window starting at the given page
    pub fn new(lower: NaiveDate, upper: NaiveDate, page: u32, per_page: u32) -> Self {
        Self {
            lower,
            upper,
            page,
            per_page,
        }
    }

    /// Highest record offset a fetch of the current page would address
    pub fn offset(&self) -> u32 {
        self.page.saturating_mul(self.per_page)
    }

    /// Whether fetching the current page would exceed the API offset cap
    pub fn exceeds_cap(&self) -> bool {
        self.offset() > OFFSET_CAP
    }

    /// Move the page cursor to the next page
    pub fn advance_page(&mut self) {
        self.page += 1;
    }

    /// Roll the window forward: new lower bound, page cursor back to 1.
    ///
    /// Callers must ensure `new_lower` is strictly later than the current
    /// lower bound; that is what guarantees forward progress.
    pub fn roll_over(&mut self, new_lower: NaiveDate) {
        debug_assert!(new_lower > self.lower);
        self.lower = new_lower;
        self.page = 1;
    }
}

/// Identification quality grade assigned by the remote service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityGrade {
    /// Identification verified by the community
    Research,
    /// Identification not yet verified
    NeedsId,
    /// Any other grade the service may report
    #[serde(other)]
    Other,
}

impl QualityGrade {
    /// Parse a grade from the API's string form
    pub fn parse(s: &str) -> Self {
        match s {
            "research" => Self::Research,
            "needs_id" => Self::NeedsId,
            _ => Self::Other,
        }
    }

    /// String form used in the storage table
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Research => "research",
            Self::NeedsId => "needs_id",
            Self::Other => "other",
        }
    }
}

/// A single flat observation record, one row in the sink table.
///
/// The `id` is assigned by the remote service and is the primary key for
/// deduplication. Every other field may be absent at the source; absence is
/// represented as `None` and stored as SQL NULL, never rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Primary key assigned by the remote service
    pub id: i64,
    /// Date on which the observation was made
    pub observed_on: Option<NaiveDate>,
    /// Genus name for the organism
    pub genus: Option<String>,
    /// Species epithet
    pub species: Option<String>,
    /// Subspecies epithet
    pub subspecies: Option<String>,
    /// Raw `[lat, lon]` coordinate string as displayed by the source
    pub coords: Option<String>,
    /// Latitude in decimal degrees
    pub latitude: Option<f64>,
    /// Longitude in decimal degrees
    pub longitude: Option<f64>,
    /// Best-guess locality text
    pub place_guess: Option<String>,
    /// Whether the organism is introduced at the locality
    pub introduced: Option<bool>,
    /// Identification quality grade
    pub quality_grade: Option<QualityGrade>,
}

impl Observation {
    /// Create a record carrying only its primary key
    pub fn with_id(id: i64) -> Self {
        Self {
            id,
            observed_on: None,
            genus: None,
            species: None,
            subspecies: None,
            coords: None,
            latitude: None,
            longitude: None,
            place_guess: None,
            introduced: None,
            quality_grade: None,
        }
    }
}
