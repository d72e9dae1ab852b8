//! Tooth addressing primitives: tooth numbers, surfaces and entry statuses.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DentalError;

/// Permanent-dentition tooth number (universal numbering, 1..=32).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct ToothNumber(u8);

impl ToothNumber {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 32;

    pub fn new(value: i64) -> Result<Self, DentalError> {
        if (i64::from(Self::MIN)..=i64::from(Self::MAX)).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(DentalError::validation(
                "toothNumber",
                format!(
                    "{} is outside {}..={}",
                    value,
                    Self::MIN,
                    Self::MAX
                ),
            ))
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for ToothNumber {
    type Error = DentalError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        ToothNumber::new(value)
    }
}

impl From<ToothNumber> for u8 {
    fn from(tooth: ToothNumber) -> Self {
        tooth.0
    }
}

impl fmt::Display for ToothNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A named region of a tooth, or the whole tooth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Surface {
    Mesial,
    Distal,
    Occlusal,
    Buccal,
    Lingual,
    Palatal,
    Incisal,
    /// Whole tooth (extraction, crown, root canal).
    Entire,
}

impl Surface {
    pub const ALL: [Surface; 8] = [
        Surface::Mesial,
        Surface::Distal,
        Surface::Occlusal,
        Surface::Buccal,
        Surface::Lingual,
        Surface::Palatal,
        Surface::Incisal,
        Surface::Entire,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Surface::Mesial => "mesial",
            Surface::Distal => "distal",
            Surface::Occlusal => "occlusal",
            Surface::Buccal => "buccal",
            Surface::Lingual => "lingual",
            Surface::Palatal => "palatal",
            Surface::Incisal => "incisal",
            Surface::Entire => "entire",
        }
    }

    pub fn is_entire(self) -> bool {
        matches!(self, Surface::Entire)
    }

    /// Closest known surface name, for error hints on typos.
    fn closest(input: &str) -> Option<Surface> {
        Surface::ALL
            .iter()
            .map(|s| (*s, strsim::jaro_winkler(input, s.as_str())))
            .filter(|(_, score)| *score >= 0.75)
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(s, _)| s)
    }
}

impl FromStr for Surface {
    type Err = DentalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        if let Some(surface) = Surface::ALL.iter().find(|v| v.as_str() == normalized) {
            return Ok(*surface);
        }

        let message = match Surface::closest(&normalized) {
            Some(hint) => format!("unknown surface '{}', did you mean '{}'?", s, hint),
            None => format!("unknown surface '{}'", s),
        };
        Err(DentalError::validation("surface", message))
    }
}

impl TryFrom<String> for Surface {
    type Error = DentalError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Surface> for String {
    fn from(surface: Surface) -> Self {
        surface.as_str().to_string()
    }
}

impl fmt::Display for Surface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a procedure, shared by chart entries and planned procedures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ProcedureStatus {
    #[default]
    Planned,
    InProgress,
    Completed,
}

impl ProcedureStatus {
    pub fn is_completed(self) -> bool {
        matches!(self, ProcedureStatus::Completed)
    }
}

/// Whether a chart entry records an observation or performed work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Condition,
    Treatment,
}

impl EntryKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntryKind::Condition => "condition",
            EntryKind::Treatment => "treatment",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tooth_number_range() {
        assert!(ToothNumber::new(1).is_ok());
        assert!(ToothNumber::new(32).is_ok());
        assert!(ToothNumber::new(0).is_err());
        assert!(ToothNumber::new(33).is_err());
        assert!(ToothNumber::new(-4).is_err());
    }

    #[test]
    fn test_tooth_number_serde() {
        let tooth: ToothNumber = serde_json::from_str("14").unwrap();
        assert_eq!(tooth.get(), 14);
        assert_eq!(serde_json::to_string(&tooth).unwrap(), "14");
        assert!(serde_json::from_str::<ToothNumber>("40").is_err());
    }

    #[test]
    fn test_surface_parse_case_insensitive() {
        assert_eq!("Occlusal".parse::<Surface>().unwrap(), Surface::Occlusal);
        assert_eq!(" entire ".parse::<Surface>().unwrap(), Surface::Entire);
    }

    #[test]
    fn test_surface_typo_suggests_closest() {
        let err = "occlsal".parse::<Surface>().unwrap_err();
        assert!(err.to_string().contains("did you mean 'occlusal'"));
    }

    #[test]
    fn test_surface_serde_roundtrip_lowercase() {
        let json = serde_json::to_string(&Surface::Buccal).unwrap();
        assert_eq!(json, "\"buccal\"");
        let parsed: Surface = serde_json::from_str("\"LINGUAL\"").unwrap();
        assert_eq!(parsed, Surface::Lingual);
    }

    #[test]
    fn test_status_kebab_case() {
        let json = serde_json::to_string(&ProcedureStatus::InProgress).unwrap();
        assert_eq!(json, "\"in-progress\"");
    }
}
