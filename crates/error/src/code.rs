use serde::{Deserialize, Serialize};
use std::fmt;

/// Numeric error codes following WEIR-XXXX format.
///
/// ## Code Ranges
/// - **1000-1999**: Source errors
/// - **2000-2999**: Join errors
/// - **3000-3999**: Configuration errors
/// - **5000-5999**: Internal/System errors
///
/// Codes are stable across versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
#[non_exhaustive]
pub enum ErrorCode {
    // === Source Errors (1000-1999) ===
    /// WEIR-1002: Metadata for a join entry could not be resolved
    MetadataUnavailable = 1002,

    // === Join Errors (2000-2999) ===
    /// WEIR-2001: Adaptive join processing is disabled for this action
    AdaptiveJoinDisabled = 2001,
    /// WEIR-2002: A bindings stream failed while producing results
    UpstreamFailed = 2002,
    /// WEIR-2003: The second phase of an adaptive join could not be started
    SwapFailed = 2003,
    /// WEIR-2004: A cardinality violated its invariants
    InvalidCardinality = 2004,

    // === Configuration Errors (3000-3999) ===
    /// WEIR-3001: Invalid YAML syntax
    InvalidYaml = 3001,
    /// WEIR-3002: Schema validation failed
    SchemaViolation = 3002,
    /// WEIR-3003: Configuration could not be loaded
    ConfigLoadFailed = 3003,

    // === Internal Errors (5000-5999) ===
    /// WEIR-5001: I/O failure
    Io = 5001,
    /// WEIR-5002: Serialization/deserialization failed
    SerializationFailed = 5002,

    /// WEIR-9999: Unknown/unclassified error
    Unknown = 9999,
}

impl ErrorCode {
    /// Get the numeric code value
    pub fn as_u16(&self) -> u16 {
        *self as u16
    }

    /// Get the formatted code string (e.g., "WEIR-2001")
    pub fn as_str(&self) -> String {
        format!("WEIR-{:04}", self.as_u16())
    }

    /// Get the error category
    pub fn category(&self) -> ErrorCategory {
        match self.as_u16() {
            1000..=1999 => ErrorCategory::Source,
            2000..=2999 => ErrorCategory::Join,
            3000..=3999 => ErrorCategory::Config,
            _ => ErrorCategory::Internal,
        }
    }

    /// Admission failures are scoped to actor selection: the caller falls back
    /// to another join strategy instead of surfacing the error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::AdaptiveJoinDisabled)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<ErrorCode> for String {
    fn from(code: ErrorCode) -> String {
        code.as_str()
    }
}

impl TryFrom<String> for ErrorCode {
    type Error = String;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        let num: u16 = s
            .strip_prefix("WEIR-")
            .and_then(|n| n.parse().ok())
            .ok_or_else(|| "Invalid format".to_string())?;
        Self::try_from(num).map_err(|_| "Unknown code".to_string())
    }
}

impl TryFrom<u16> for ErrorCode {
    type Error = String;

    fn try_from(n: u16) -> std::result::Result<Self, Self::Error> {
        match n {
            1002 => Ok(Self::MetadataUnavailable),
            2001 => Ok(Self::AdaptiveJoinDisabled),
            2002 => Ok(Self::UpstreamFailed),
            2003 => Ok(Self::SwapFailed),
            2004 => Ok(Self::InvalidCardinality),
            3001 => Ok(Self::InvalidYaml),
            3002 => Ok(Self::SchemaViolation),
            3003 => Ok(Self::ConfigLoadFailed),
            5001 => Ok(Self::Io),
            5002 => Ok(Self::SerializationFailed),
            9999 => Ok(Self::Unknown),
            _ => Err(format!("Unknown error code: {}", n)),
        }
    }
}

/// High-level error category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ErrorCategory {
    Source,
    Join,
    Config,
    Internal,
}
