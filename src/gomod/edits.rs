use crate::gomod::directive::{DirectiveError, GomodReplace, GomodRequire};
use crate::gomod::script::shell_quote;
use crate::validate::{IssueKind, ValidationError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Ordered replace and require directives for one generator.
///
/// The two lists are kept apart: replaces always compile before requires,
/// each list in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GomodEdits {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub replace: Vec<GomodReplace>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub require: Vec<GomodRequire>,
}

impl GomodEdits {
    pub fn is_empty(&self) -> bool {
        self.replace.is_empty() && self.require.is_empty()
    }

    /// Check every directive, reporting all violations together.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut errors = ValidationError::new();
        for (idx, require) in self.require.iter().enumerate() {
            for violation in require.violations() {
                errors.push(format!("require[{idx}]"), IssueKind::Directive(violation));
            }
        }
        for (idx, replace) in self.replace.iter().enumerate() {
            for violation in replace.violations() {
                errors.push(format!("replace[{idx}]"), IssueKind::Directive(violation));
            }
        }
        errors.into_result()
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot render {directive}: {source}")]
pub struct CompileError {
    pub directive: String,
    #[source]
    pub source: DirectiveError,
}

/// Compile the edit set into a single `go mod edit` command line.
///
/// An empty edit set compiles to an empty string: there is nothing to run.
/// Each flag is shell-quoted unless it is a plain word.
pub fn gomod_edit_command(edits: &GomodEdits) -> Result<String, CompileError> {
    let mut args = Vec::with_capacity(edits.replace.len() + edits.require.len());

    for replace in &edits.replace {
        let arg = replace.edit_arg().map_err(|source| CompileError {
            directive: replace.to_string(),
            source,
        })?;
        args.push(shell_quote(&format!("-replace={arg}")));
    }

    for require in &edits.require {
        let arg = require.edit_arg().map_err(|source| CompileError {
            directive: require.to_string(),
            source,
        })?;
        args.push(shell_quote(&format!("-require={arg}")));
    }

    if args.is_empty() {
        return Ok(String::new());
    }

    Ok(format!("go mod edit {}", args.join(" ")))
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GomodGitAuthSsh {
    /// Name of the SSH agent socket to forward.
    pub id: String,
    /// Defaults to `git`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// How to authenticate against one git host.
///
/// `token` and `header` name build secrets; the secret values never enter
/// the generated script or any environment variable the script exports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GomodGitAuth {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssh: Option<GomodGitAuthSsh>,
}

/// Which credential helper flavour a host uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthKind {
    Token,
    Header,
}

impl AuthKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AuthKind::Token => "token",
            AuthKind::Header => "header",
        }
    }
}

impl GomodGitAuth {
    pub fn token_secret(&self) -> Option<&str> {
        self.token.as_deref().filter(|t| !t.is_empty())
    }

    pub fn header_secret(&self) -> Option<&str> {
        self.header.as_deref().filter(|h| !h.is_empty())
    }

    /// Token/header helper kind; `None` for SSH-only or empty entries.
    pub fn helper_kind(&self) -> Option<AuthKind> {
        if self.token_secret().is_some() {
            Some(AuthKind::Token)
        } else if self.header_secret().is_some() {
            Some(AuthKind::Header)
        } else {
            None
        }
    }

    pub fn has_credentials(&self) -> bool {
        self.ssh.is_some() || self.helper_kind().is_some()
    }

    fn validate(&self, host: &str) -> Result<(), ValidationError> {
        let mut errors = ValidationError::new();
        let issue = |message: &str| IssueKind::Auth {
            host: host.to_string(),
            message: message.to_string(),
        };

        if host.is_empty() {
            errors.push("", issue("host must be non-empty"));
        } else if host.chars().any(|c| c.is_whitespace() || c == '"' || c == '\'') {
            errors.push("", issue("host must not contain whitespace or quotes"));
        }

        let mechanisms = [
            self.token_secret().is_some(),
            self.header_secret().is_some(),
            self.ssh.is_some(),
        ];
        if mechanisms.iter().filter(|set| **set).count() > 1 {
            errors.push(
                "",
                issue("only one of token, header, or ssh may be configured"),
            );
        }

        if let Some(ssh) = &self.ssh {
            if ssh.id.trim().is_empty() {
                errors.push("ssh", issue("ssh id must be non-empty"));
            }
        }

        errors.into_result()
    }
}

/// A gomod generator: which modules to edit, how, and with what credentials.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeneratorGomod {
    /// Module directories relative to the generator subpath; empty means `.`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub paths: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edits: Option<GomodEdits>,
    /// Credentials keyed by git host (optionally `host:port`).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub auth: HashMap<String, GomodGitAuth>,
}

impl GeneratorGomod {
    pub fn has_edits(&self) -> bool {
        self.edits.as_ref().is_some_and(|e| !e.is_empty())
    }

    pub fn edit_command(&self) -> Result<String, CompileError> {
        match &self.edits {
            Some(edits) => gomod_edit_command(edits),
            None => Ok(String::new()),
        }
    }

    /// Module paths to process, defaulting to the generator root.
    pub fn module_paths(&self) -> Vec<String> {
        if self.paths.is_empty() {
            vec![".".to_string()]
        } else {
            self.paths.clone()
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut errors = ValidationError::new();

        if let Some(edits) = &self.edits {
            errors.merge("edits", edits.validate());
        }

        for (idx, path) in self.paths.iter().enumerate() {
            errors.merge(&format!("paths[{idx}]"), validate_relative_path(path));
        }

        for host in crate::gomod::sorted_keys(&self.auth) {
            errors.merge(&format!("auth.{host}"), self.auth[host].validate(host));
        }

        errors.into_result()
    }
}

/// Paths handed to the sandbox must stay inside the source tree.
pub(crate) fn validate_relative_path(path: &str) -> Result<(), ValidationError> {
    let mut errors = ValidationError::new();
    if path.starts_with('/') {
        errors.push(
            "",
            IssueKind::Path {
                path: path.to_string(),
                message: "must be relative",
            },
        );
    } else if crate::gomod::script::clean_path(path).split('/').next() == Some("..") {
        errors.push(
            "",
            IssueKind::Path {
                path: path.to_string(),
                message: "must not escape the source tree",
            },
        );
    }
    errors.into_result()
}
