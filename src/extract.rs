//! Record extraction from raw API pages
//!
//! Turns one page of raw JSON into an ordered sequence of [`Observation`]s.
//! Extraction never fails on a per-field basis: a missing or malformed
//! field degrades to `None` and is logged at warning level. A page with no
//! parseable results yields an empty vec, which is the controller's
//! exhaustion signal.

use crate::types::{Observation, QualityGrade};
use chrono::NaiveDate;
use serde_json::Value;
use tracing::warn;

/// Extract all observation records from one raw API page.
///
/// Records without an `id` are skipped (they cannot be keyed for
/// deduplication); everything else degrades field by field.
pub fn extract_page(page: &Value) -> Vec<Observation> {
    let Some(results) = page.get("results").and_then(Value::as_array) else {
        warn!("page has no 'results' array; treating as empty");
        return Vec::new();
    };

    let mut records = Vec::with_capacity(results.len());
    for raw in results {
        let Some(id) = raw.get("id").and_then(Value::as_i64) else {
            warn!("observation has no id; record skipped");
            continue;
        };
        records.push(extract_observation(id, raw));
    }
    records
}

/// Extract a single observation, degrading missing fields to `None`
fn extract_observation(id: i64, raw: &Value) -> Observation {
    let mut obs = Observation::with_id(id);

    match raw
        .pointer("/observed_on_details/date")
        .and_then(Value::as_str)
    {
        Some(s) => match NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            Ok(date) => obs.observed_on = Some(date),
            Err(e) => warn!(id, date = s, %e, "unparseable observed date"),
        },
        None => warn!(id, "date unavailable for observation"),
    }

    match raw.get("quality_grade").and_then(Value::as_str) {
        Some(s) => obs.quality_grade = Some(QualityGrade::parse(s)),
        None => warn!(id, "quality grade unavailable for observation"),
    }

    match raw.get("place_guess").and_then(Value::as_str) {
        Some(s) => obs.place_guess = Some(s.to_string()),
        None => warn!(id, "locality unavailable for observation"),
    }

    // geojson coordinates are [longitude, latitude]; the coords column
    // keeps the reversed [lat, lon] display form of the source
    match coordinates(raw) {
        Some((lon, lat)) => {
            obs.longitude = Some(lon);
            obs.latitude = Some(lat);
            obs.coords = Some(format!("[{lat}, {lon}]"));
        }
        None => warn!(id, "coordinates unavailable for observation"),
    }

    match raw.pointer("/taxon/introduced").and_then(Value::as_bool) {
        Some(b) => obs.introduced = Some(b),
        None => warn!(id, "introduced flag unavailable for observation"),
    }

    match raw.pointer("/taxon/name").and_then(Value::as_str) {
        Some(name) => {
            let mut parts = name.split_whitespace();
            obs.genus = parts.next().map(str::to_string);
            obs.species = parts.next().map(str::to_string);
            obs.subspecies = parts.next().map(str::to_string);
            if obs.genus.is_none() {
                warn!(id, "taxon name empty for observation");
            }
        }
        None => warn!(id, "taxon name unavailable for observation"),
    }

    obs
}

/// Pull `(longitude, latitude)` out of the geojson block
fn coordinates(raw: &Value) -> Option<(f64, f64)> {
    let coords = raw.pointer("/geojson/coordinates")?.as_array()?;
    let lon = coords.first()?.as_f64()?;
    let lat = coords.get(1)?.as_f64()?;
    Some((lon, lat))
}
