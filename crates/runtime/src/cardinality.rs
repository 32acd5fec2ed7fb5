//! Cardinality estimates attached to join entries and join outputs.

use std::fmt;

use weir_error::{ErrorCode, ErrorContext, WeirError};

/// How much a cardinality can be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CardinalityKind {
    /// Counted by actually enumerating results.
    Exact,
    /// Heuristic or approximate; the fallback when nothing is known.
    Estimate,
    /// Taken from authoritative out-of-band statistics (e.g. a dataset description).
    Index,
}

impl fmt::Display for CardinalityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CardinalityKind::Exact => write!(f, "exact"),
            CardinalityKind::Estimate => write!(f, "estimate"),
            CardinalityKind::Index => write!(f, "index"),
        }
    }
}

/// An estimate of how many results a pattern or partial join produces.
///
/// # Invariants
///
/// - `value` is never negative and never NaN
/// - `value` is only infinite when `kind` is [`CardinalityKind::Estimate`]
/// - `dataset` is only set when the estimate applies to a bounded subset of sources
#[derive(Debug, Clone, PartialEq)]
pub struct Cardinality {
    kind: CardinalityKind,
    value: f64,
    dataset: Option<String>,
}

impl Cardinality {
    /// Validating constructor.
    pub fn try_new(
        kind: CardinalityKind,
        value: f64,
        dataset: Option<String>,
    ) -> weir_error::Result<Self> {
        let valid = !value.is_nan()
            && value >= 0.0
            && (value.is_finite() || kind == CardinalityKind::Estimate);
        if !valid {
            return Err(WeirError::new(
                ErrorCode::InvalidCardinality,
                format!("Invalid {} cardinality {}", kind, value),
            )
            .with_context(ErrorContext::Cardinality {
                kind: kind.to_string(),
                value: value.to_string(),
            }));
        }
        Ok(Self {
            kind,
            value,
            dataset,
        })
    }

    /// The "we know nothing" estimate: `{Estimate, +inf}`.
    pub fn unknown() -> Self {
        Self {
            kind: CardinalityKind::Estimate,
            value: f64::INFINITY,
            dataset: None,
        }
    }

    /// An exact count. Unusable values collapse to [`Cardinality::unknown`].
    pub fn exact(value: f64) -> Self {
        Self::try_new(CardinalityKind::Exact, value, None).unwrap_or_else(|_| Self::unknown())
    }

    /// A heuristic estimate. Unusable values collapse to [`Cardinality::unknown`].
    pub fn estimate(value: f64) -> Self {
        Self::try_new(CardinalityKind::Estimate, value, None).unwrap_or_else(|_| Self::unknown())
    }

    /// An index-sourced count scoped to `dataset`.
    /// Unusable values collapse to [`Cardinality::unknown`].
    pub fn index(value: f64, dataset: impl Into<String>) -> Self {
        Self::try_new(CardinalityKind::Index, value, Some(dataset.into()))
            .unwrap_or_else(|_| Self::unknown())
    }

    /// Returns a copy scoped to `dataset`.
    pub fn with_dataset(mut self, dataset: impl Into<String>) -> Self {
        self.dataset = Some(dataset.into());
        self
    }

    /// Returns a copy without a dataset scope.
    pub fn without_dataset(mut self) -> Self {
        self.dataset = None;
        self
    }

    pub fn kind(&self) -> CardinalityKind {
        self.kind
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn dataset(&self) -> Option<&str> {
        self.dataset.as_deref()
    }

    pub fn is_index(&self) -> bool {
        self.kind == CardinalityKind::Index
    }

    pub fn is_finite(&self) -> bool {
        self.value.is_finite()
    }
}

impl Default for Cardinality {
    fn default() -> Self {
        Self::unknown()
    }
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}, {}", self.kind, self.value)?;
        if let Some(dataset) = &self.dataset {
            write!(f, ", {}", dataset)?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_try_new_rejects_negative() {
        let err = Cardinality::try_new(CardinalityKind::Exact, -1.0, None).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidCardinality);
    }

    #[test]
    fn test_try_new_rejects_infinite_exact_and_index() {
        assert!(Cardinality::try_new(CardinalityKind::Exact, f64::INFINITY, None).is_err());
        assert!(Cardinality::try_new(CardinalityKind::Index, f64::INFINITY, None).is_err());
        assert!(Cardinality::try_new(CardinalityKind::Estimate, f64::INFINITY, None).is_ok());
        assert!(Cardinality::try_new(CardinalityKind::Estimate, f64::NAN, None).is_err());
    }

    #[test]
    fn test_lenient_constructors_collapse_to_unknown() {
        assert_eq!(Cardinality::exact(f64::NAN), Cardinality::unknown());
        assert_eq!(Cardinality::index(-3.0, "http://a/"), Cardinality::unknown());
        assert_eq!(Cardinality::exact(4.0).value(), 4.0);
    }

    #[test]
    fn test_display() {
        assert_eq!(Cardinality::exact(10.0).to_string(), "{exact, 10}");
        assert_eq!(
            Cardinality::index(3.0, "http://a/").to_string(),
            "{index, 3, http://a/}"
        );
        assert_eq!(Cardinality::unknown().to_string(), "{estimate, inf}");
    }
}
