//! Coordinate Reference System types and utilities.

use serde::{Deserialize, Serialize};
use std::fmt;

/// WKT written into `.prj` sidecars for WGS84 output.
pub const WGS84_PRJ_WKT: &str = r#"GEOGCS["GCS_WGS_1984",DATUM["D_WGS_1984",SPHEROID["WGS_1984",6378137.0,298.257223563]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]]"#;

/// A coordinate reference system, held as any definition PROJ accepts.
///
/// Authority codes are normalized to `EPSG:<code>`; anything else (WKT from a
/// `.prj` sidecar, PROJ strings, URNs that don't map to an EPSG code) is kept
/// verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Crs {
    definition: String,
}

impl Crs {
    /// WGS84 geographic (lon/lat degrees).
    pub fn wgs84() -> Self {
        Self::from_epsg(4326)
    }

    /// Web Mercator (meters).
    pub fn web_mercator() -> Self {
        Self::from_epsg(3857)
    }

    pub fn from_epsg(code: u32) -> Self {
        Self {
            definition: format!("EPSG:{}", code),
        }
    }

    /// Parse a CRS identifier.
    ///
    /// Accepts formats like:
    /// - "EPSG:4326", "epsg:3857"
    /// - "urn:ogc:def:crs:EPSG::3857"
    /// - "CRS:84", "urn:ogc:def:crs:OGC:1.3:CRS84" (WGS84 lon/lat)
    /// - WKT or PROJ strings (kept as-is)
    pub fn parse(s: &str) -> Result<Self, CrsParseError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(CrsParseError::Empty);
        }

        let upper = trimmed.to_uppercase();
        if upper == "CRS:84" || upper == "CRS84" || upper.ends_with(":CRS84") {
            return Ok(Self::wgs84());
        }

        let code = if let Some(code) = upper.strip_prefix("EPSG:") {
            Some(code)
        } else if let Some(rest) = upper.strip_prefix("URN:OGC:DEF:CRS:EPSG:") {
            // urn:ogc:def:crs:EPSG:<version>:<code>, version is usually empty
            rest.rsplit(':').next()
        } else {
            None
        };

        match code {
            Some(code) => code
                .parse::<u32>()
                .map(Self::from_epsg)
                .map_err(|_| CrsParseError::InvalidEpsg(trimmed.to_string())),
            None => Ok(Self {
                definition: trimmed.to_string(),
            }),
        }
    }

    /// Definition string handed to PROJ.
    pub fn definition(&self) -> &str {
        &self.definition
    }

    /// EPSG code when this CRS is authority-coded.
    pub fn epsg(&self) -> Option<u32> {
        self.definition
            .strip_prefix("EPSG:")
            .and_then(|code| code.parse().ok())
    }

    pub fn is_wgs84(&self) -> bool {
        self.epsg() == Some(4326)
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.definition)
    }
}

/// What to do with a dataset that arrives without a CRS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MissingCrsPolicy {
    /// Label the dataset with this CRS; coordinates are left untouched.
    Assume(Crs),
    /// Fail the request.
    Reject,
}

impl Default for MissingCrsPolicy {
    fn default() -> Self {
        MissingCrsPolicy::Assume(Crs::wgs84())
    }
}

impl MissingCrsPolicy {
    /// Build a policy from its configuration name ("assume" or "reject").
    pub fn from_config(mode: &str, default_crs: &str) -> Result<Self, CrsParseError> {
        match mode.trim().to_lowercase().as_str() {
            "assume" => Ok(MissingCrsPolicy::Assume(Crs::parse(default_crs)?)),
            "reject" => Ok(MissingCrsPolicy::Reject),
            other => Err(CrsParseError::InvalidPolicy(other.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CrsParseError {
    #[error("Empty CRS definition")]
    Empty,

    #[error("Invalid EPSG code: {0}")]
    InvalidEpsg(String),

    #[error("Unknown missing-CRS policy '{0}' (expected 'assume' or 'reject')")]
    InvalidPolicy(String),
}
