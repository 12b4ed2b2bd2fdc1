//! Per-attempt delivery result.

use crate::error::{DeliveryError, DeliveryErrorKind};

/// Overall shape of a [`DeliveryResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Every target accepted the stanza
    Success,
    /// Routing acted, but at least one target failed
    PartialSuccess,
    /// No target was attempted
    Failure,
}

/// Aggregated outcome of one relay attempt across all of its targets.
///
/// A result with no errors is a success. A processed result with errors is a
/// partial success. An unprocessed result carrying the error it was created
/// with is a terminal failure: routing never reached a target.
#[derive(Debug, Clone, Default)]
pub struct DeliveryResult {
    processed: bool,
    errors: Vec<DeliveryError>,
}

impl DeliveryResult {
    /// Create an empty, unprocessed result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a terminal failure carrying a single error.
    pub fn failed(error: DeliveryError) -> Self {
        Self {
            processed: false,
            errors: vec![error],
        }
    }

    /// Record a per-target failure.
    pub fn add_processing_error(&mut self, error: DeliveryError) {
        self.errors.push(error);
    }

    /// Mark that routing took action on at least one target.
    pub fn set_processed(mut self) -> Self {
        self.processed = true;
        self
    }

    pub fn is_processed(&self) -> bool {
        self.processed
    }

    pub fn has_processing_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Errors in the order they were recorded.
    pub fn processing_errors(&self) -> &[DeliveryError] {
        &self.errors
    }

    /// Whether any recorded error is of the given kind.
    pub fn contains(&self, kind: DeliveryErrorKind) -> bool {
        self.errors.iter().any(|e| e.kind() == kind)
    }

    /// Kinds of all recorded errors, in order.
    pub fn error_kinds(&self) -> Vec<DeliveryErrorKind> {
        self.errors.iter().map(DeliveryError::kind).collect()
    }

    pub fn outcome(&self) -> DeliveryOutcome {
        match (self.errors.is_empty(), self.processed) {
            (true, _) => DeliveryOutcome::Success,
            (false, true) => DeliveryOutcome::PartialSuccess,
            (false, false) => DeliveryOutcome::Failure,
        }
    }
}
