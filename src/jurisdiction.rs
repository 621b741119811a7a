//! Jurisdiction codes used to partition exhaustive sweeps
//!
//! The clearinghouse files every audit under a two-letter U.S. state or
//! territory code. Sweeping one code at a time keeps each request well under
//! the server's row cap.

use std::fmt;

/// Every jurisdiction code accepted by the `auditee_state` filter, in sweep order
pub const ALL_JURISDICTIONS: [&str; 59] = [
    "AK", "AL", "AR", "AS", "AZ", "CA", "CO", "CT", "DC", "DE", "FL", "FM", "GA", "GU", "HI",
    "IA", "ID", "IL", "IN", "KS", "KY", "LA", "MA", "MD", "ME", "MH", "MI", "MN", "MO", "MP",
    "MS", "MT", "NC", "ND", "NE", "NH", "NJ", "NM", "NV", "NY", "OH", "OK", "OR", "PA", "PR",
    "PW", "RI", "SC", "SD", "TN", "TX", "UT", "VA", "VI", "VT", "WA", "WI", "WV", "WY",
];

/// A validated two-letter jurisdiction code
///
/// Input is case-insensitive and normalized to uppercase.
///
/// # Examples
///
/// ```
/// use fac_collector::jurisdiction::Jurisdiction;
///
/// let ca = Jurisdiction::parse(" ca ").unwrap();
/// assert_eq!(ca.code(), "CA");
/// assert!(Jurisdiction::parse("ZZ").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Jurisdiction(String);

impl Jurisdiction {
    /// Parse and validate a code against [`ALL_JURISDICTIONS`]
    pub fn parse(s: &str) -> Result<Self, JurisdictionError> {
        let code = s.trim().to_uppercase();
        if code.len() != 2 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(JurisdictionError::InvalidFormat(s.to_string()));
        }
        if !ALL_JURISDICTIONS.contains(&code.as_str()) {
            return Err(JurisdictionError::Unknown(code));
        }
        Ok(Self(code))
    }

    /// Parse a comma-separated list, preserving order and dropping repeats
    pub fn parse_list(s: &str) -> Result<Vec<Self>, JurisdictionError> {
        let mut out: Vec<Self> = Vec::new();
        for part in s.split(',').filter(|p| !p.trim().is_empty()) {
            let parsed = Self::parse(part)?;
            if !out.contains(&parsed) {
                out.push(parsed);
            }
        }
        if out.is_empty() {
            return Err(JurisdictionError::Empty);
        }
        Ok(out)
    }

    /// The full enumeration in sweep order
    pub fn all() -> Vec<Self> {
        ALL_JURISDICTIONS
            .iter()
            .map(|code| Self((*code).to_string()))
            .collect()
    }

    /// Uppercase two-letter code
    pub fn code(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Jurisdiction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Jurisdiction parsing errors
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum JurisdictionError {
    /// Not a two-letter alphabetic code
    #[error("invalid jurisdiction code '{0}': expected two letters")]
    InvalidFormat(String),

    /// Well-formed but not a U.S. state or territory
    #[error("unknown jurisdiction code '{0}'")]
    Unknown(String),

    /// Empty list
    #[error("jurisdiction list cannot be empty")]
    Empty,
}
