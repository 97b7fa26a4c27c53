use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a piece of entropy came from.
///
/// Only `Hardware` samples are ever persisted; `Software` values are
/// synthesized on demand and handed straight to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntropySource {
    Hardware,
    Software,
}

impl EntropySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntropySource::Hardware => "hardware",
            EntropySource::Software => "software",
        }
    }
}

impl fmt::Display for EntropySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntropySource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hardware" => Ok(EntropySource::Hardware),
            "software" => Ok(EntropySource::Software),
            other => Err(format!("unknown entropy source '{}'", other)),
        }
    }
}

/// One entry of the entropy log.
///
/// Created once at ingestion, flipped to `consumed` once at issuance,
/// never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntropySample {
    pub hex_digest: String,
    pub source: EntropySource,
    pub consumed: bool,
    pub created_at: DateTime<Utc>,
    pub consumed_at: Option<DateTime<Utc>>,
}
