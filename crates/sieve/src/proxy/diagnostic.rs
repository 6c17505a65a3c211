//! Structured reports of source-model contract violations.

use std::fmt;

use crate::model::ModelIndex;

/// What the source model did wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    /// An insertion started past the end of the parent's current children.
    InvalidInsertion,
    /// A removal did not match what the proxy had mapped.
    InconsistentRemoval,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticKind::InvalidInsertion => f.write_str("invalid insertion"),
            DiagnosticKind::InconsistentRemoval => f.write_str("inconsistent removal"),
        }
    }
}

/// A contract violation the proxy recovered from.
///
/// Delivered on [`SortFilterProxyModel::diagnostics`](super::SortFilterProxyModel::diagnostics)
/// after the proxy has repaired its own state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyDiagnostic {
    pub kind: DiagnosticKind,
    /// The source parent whose mapping was discarded.
    pub source_parent: ModelIndex,
    pub message: String,
}

impl ProxyDiagnostic {
    pub(crate) fn new(kind: DiagnosticKind, source_parent: ModelIndex, message: impl Into<String>) -> Self {
        Self {
            kind,
            source_parent,
            message: message.into(),
        }
    }
}

impl fmt::Display for ProxyDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}
