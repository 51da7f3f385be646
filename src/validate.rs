//! Aggregated validation errors.
//!
//! Validation never stops at the first problem: every check pushes an issue
//! and the caller sees all of them at once, one per line, each tagged with
//! the dotted location of the offending value.

use crate::gomod::DirectiveError;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueKind {
    /// A require/replace directive failed its checks.
    Directive(DirectiveError),
    /// A per-host credential entry is malformed.
    Auth { host: String, message: String },
    /// A generator path escapes or is not relative.
    Path { path: String, message: &'static str },
    /// A source declares none of the known source kinds.
    MissingSourceKind,
    /// A source declares more than one source kind.
    ConflictingSourceKinds { kinds: Vec<&'static str> },
    /// A patch reference names a source the build spec does not have.
    UnknownPatchSource { source: String },
    EmptyField { field: &'static str },
    /// A user source name clashes with generated patch source naming.
    ReservedSourceName { message: &'static str },
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IssueKind::Directive(e) => write!(f, "{e}"),
            IssueKind::Auth { host, message } => write!(f, "auth for host '{host}': {message}"),
            IssueKind::Path { path, message } => write!(f, "path '{path}' {message}"),
            IssueKind::MissingSourceKind => {
                write!(f, "source must declare one of: git, http, context")
            }
            IssueKind::ConflictingSourceKinds { kinds } => write!(
                f,
                "source must declare exactly one kind, found: {}",
                kinds.join(", ")
            ),
            IssueKind::UnknownPatchSource { source } => {
                write!(f, "patch references unknown source '{source}'")
            }
            IssueKind::EmptyField { field } => write!(f, "{field} must be non-empty"),
            IssueKind::ReservedSourceName { message } => write!(f, "source name {message}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// Dotted path to the value, e.g. `sources.app.generate[0].gomod`.
    pub location: String,
    pub kind: IssueKind,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.location.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}: {}", self.location, self.kind)
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationError {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn push(&mut self, location: impl Into<String>, kind: IssueKind) {
        self.issues.push(ValidationIssue {
            location: location.into(),
            kind,
        });
    }

    /// Fold the issues of a nested validation in under `prefix`.
    pub fn merge(&mut self, prefix: &str, nested: Result<(), ValidationError>) {
        let Err(nested) = nested else {
            return;
        };
        for issue in nested.issues {
            let location = match (prefix.is_empty(), issue.location.is_empty()) {
                (true, _) => issue.location,
                (false, true) => prefix.to_string(),
                (false, false) => format!("{prefix}.{}", issue.location),
            };
            self.issues.push(ValidationIssue {
                location,
                kind: issue.kind,
            });
        }
    }

    pub fn into_result(self) -> Result<(), ValidationError> {
        if self.issues.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }

    pub fn has_directive_issues(&self) -> bool {
        self.issues
            .iter()
            .any(|issue| matches!(issue.kind, IssueKind::Directive(_)))
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}
