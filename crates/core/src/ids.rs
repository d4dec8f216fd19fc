#![forbid(unsafe_code)]

use std::fmt;

/// Certificate id used by the demo flows when the caller does not name one.
pub const DEFAULT_CERT_ID: &str = "demo-cert";

const MAX_CERT_ID_LEN: usize = 128;
const MAX_PROVIDER_LEN: usize = 32;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CertId(String);

impl CertId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Trims the input; the stored value never carries surrounding whitespace.
    pub fn try_new(value: impl Into<String>) -> Result<Self, CertIdError> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(CertIdError::Empty);
        }
        if trimmed.len() > MAX_CERT_ID_LEN {
            return Err(CertIdError::TooLong);
        }
        if trimmed.chars().any(|c| c.is_control()) {
            return Err(CertIdError::ContainsControl);
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Blank or missing input falls back to [`DEFAULT_CERT_ID`].
    pub fn or_default(value: Option<&str>) -> Result<Self, CertIdError> {
        match value.map(str::trim).filter(|v| !v.is_empty()) {
            Some(value) => Self::try_new(value),
            None => Ok(Self(DEFAULT_CERT_ID.to_string())),
        }
    }
}

impl fmt::Display for CertId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CertIdError {
    Empty,
    TooLong,
    ContainsControl,
}

impl CertIdError {
    pub fn message(&self) -> &'static str {
        match self {
            Self::Empty => "cert_id must not be empty",
            Self::TooLong => "cert_id is too long",
            Self::ContainsControl => "cert_id contains control characters",
        }
    }
}

impl fmt::Display for CertIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

impl std::error::Error for CertIdError {}

/// Receipt origin. `tsa` and `chain` are built in; any other lowercase token is kept verbatim.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Provider {
    Tsa,
    Chain,
    Other(String),
}

impl Provider {
    pub fn parse(raw: &str) -> Option<Self> {
        let value = raw.trim().to_ascii_lowercase();
        if value.is_empty() || value.len() > MAX_PROVIDER_LEN {
            return None;
        }
        if !value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        {
            return None;
        }
        Some(match value.as_str() {
            "tsa" => Self::Tsa,
            "chain" => Self::Chain,
            _ => Self::Other(value),
        })
    }

    /// Rows written by older tools may carry anything in the provider column.
    pub fn from_stored(raw: &str) -> Self {
        Self::parse(raw).unwrap_or_else(|| Self::Other(raw.trim().to_string()))
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Tsa => "tsa",
            Self::Chain => "chain",
            Self::Other(value) => value.as_str(),
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
