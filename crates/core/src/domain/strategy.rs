// Acquisition sharing strategy

use serde::{Deserialize, Serialize};

/// How Operation Jobs obtain their resource
///
/// - `Serialized`: every job routes through one shared acquisition per handler,
///   so at most one acquire call is ever in flight.
/// - `Inline`: each job reads-or-acquires and validates on its own. Cheaper, but
///   concurrent first callers each issue their own acquire; the first commit is kept
///   and later duplicates are destroyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AcquisitionStrategy {
    #[default]
    Serialized,
    Inline,
}

impl std::fmt::Display for AcquisitionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AcquisitionStrategy::Serialized => write!(f, "serialized"),
            AcquisitionStrategy::Inline => write!(f, "inline"),
        }
    }
}

impl std::str::FromStr for AcquisitionStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "serialized" => Ok(AcquisitionStrategy::Serialized),
            "inline" => Ok(AcquisitionStrategy::Inline),
            other => Err(format!("unknown acquisition strategy: {other}")),
        }
    }
}
