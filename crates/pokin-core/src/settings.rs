//! The user's working context: fiscal year and organisational unit (OPD).
//!
//! Loaded once by the hub, persisted whenever it changes, and handed to every
//! tool through [`crate::tool::Tool::apply_filter`]. Tools never read the
//! settings table themselves.

use anyhow::{Context, Result};
use chrono::Datelike;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::db;

const KEY_FISCAL_YEAR: &str = "tahun";
const KEY_ORG_UNIT: &str = "opd";

/// An organisational unit (OPD) selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgUnit {
    pub code: String,
    #[serde(default)]
    pub name: String,
}

impl OrgUnit {
    /// Name if known, otherwise the code.
    pub fn label(&self) -> &str {
        if self.name.is_empty() {
            &self.code
        } else {
            &self.name
        }
    }
}

/// The filter context every page depends on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterContext {
    pub fiscal_year: i32,
    pub org_unit: Option<OrgUnit>,
}

impl Default for FilterContext {
    fn default() -> Self {
        Self {
            fiscal_year: chrono::Local::now().year(),
            org_unit: None,
        }
    }
}

impl FilterContext {
    pub fn org_code(&self) -> Option<&str> {
        self.org_unit.as_ref().map(|o| o.code.as_str())
    }

    /// Short status-bar text, e.g. "Tahun 2025 · Dinas Kesehatan".
    pub fn summary(&self) -> String {
        match &self.org_unit {
            Some(org) => format!("Tahun {} \u{b7} {}", self.fiscal_year, org.label()),
            None => format!("Tahun {} \u{b7} no OPD", self.fiscal_year),
        }
    }
}

/// Load the persisted filter, falling back to the current year and no OPD.
/// A corrupt value is ignored rather than failing startup.
pub fn load_filter(conn: &Connection) -> Result<FilterContext> {
    let mut filter = FilterContext::default();

    if let Some(raw) = db::get_setting(conn, KEY_FISCAL_YEAR)? {
        match raw.trim().parse::<i32>() {
            Ok(year) => filter.fiscal_year = year,
            Err(_) => tracing::warn!(value = %raw, "ignoring unparsable fiscal year setting"),
        }
    }

    if let Some(raw) = db::get_setting(conn, KEY_ORG_UNIT)? {
        match serde_json::from_str::<OrgUnit>(&raw) {
            Ok(org) if !org.code.is_empty() => filter.org_unit = Some(org),
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "ignoring unparsable OPD setting"),
        }
    }

    Ok(filter)
}

/// Persist the filter so the next session starts from it.
pub fn save_filter(conn: &Connection, filter: &FilterContext) -> Result<()> {
    db::set_setting(conn, KEY_FISCAL_YEAR, &filter.fiscal_year.to_string())?;
    match &filter.org_unit {
        Some(org) => {
            let json = serde_json::to_string(org).context("Failed to encode OPD setting")?;
            db::set_setting(conn, KEY_ORG_UNIT, &json)?;
        }
        None => db::delete_setting(conn, KEY_ORG_UNIT)?,
    }
    Ok(())
}
