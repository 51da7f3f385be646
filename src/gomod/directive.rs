//! `require` / `replace` directives and their two textual forms.
//!
//! Both directives decode from either a compact `"<left>:<right>"` string
//! (split on the first colon) or a structured map with named fields. They
//! always encode to the structured map, so a compact input round-trips to
//! the structured form rather than to the same bytes.

use serde::de::{self, MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DirectiveError {
    #[error("require {version:?}: module must be non-empty")]
    EmptyModule { version: String },

    #[error("require {module:?}: version must include @version (got {version:?})")]
    MissingVersionPin { module: String, version: String },

    #[error("replace {original:?} => {update:?}: old and new must be non-empty")]
    EmptyReplace { original: String, update: String },

    #[error("invalid {kind} directive {input:?}: expected \"<{left}>:<{right}>\"")]
    MissingSeparator {
        kind: &'static str,
        left: &'static str,
        right: &'static str,
        input: String,
    },
}

fn split_compact(
    kind: &'static str,
    left: &'static str,
    right: &'static str,
    input: &str,
) -> Result<(String, String), DirectiveError> {
    input
        .split_once(':')
        .map(|(l, r)| (l.to_string(), r.to_string()))
        .ok_or_else(|| DirectiveError::MissingSeparator {
            kind,
            left,
            right,
            input: input.to_string(),
        })
}

/// Pin a module to an explicit version: `go mod edit -require=<version>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct GomodRequire {
    pub module: String,
    /// `<module path>@<version tag>`.
    pub version: String,
}

impl GomodRequire {
    pub fn new(module: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            version: version.into(),
        }
    }

    pub fn violations(&self) -> Vec<DirectiveError> {
        let mut violations = Vec::new();
        if self.module.is_empty() {
            violations.push(DirectiveError::EmptyModule {
                version: self.version.clone(),
            });
        }
        if !self.version.contains('@') {
            violations.push(DirectiveError::MissingVersionPin {
                module: self.module.clone(),
                version: self.version.clone(),
            });
        }
        violations
    }

    pub fn validate(&self) -> Result<(), DirectiveError> {
        match self.violations().into_iter().next() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// The token passed to `go mod edit -require=`.
    pub fn edit_arg(&self) -> Result<String, DirectiveError> {
        self.validate()?;
        Ok(self.version.clone())
    }
}

impl fmt::Display for GomodRequire {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "require {}", self.module)
    }
}

/// Redirect one module to another: `go mod edit -replace=<old>=<new>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct GomodReplace {
    #[serde(rename = "old")]
    pub original: String,
    /// Usually `<module path>@<version tag>`, but local paths are allowed.
    #[serde(rename = "new")]
    pub update: String,
}

impl GomodReplace {
    pub fn new(original: impl Into<String>, update: impl Into<String>) -> Self {
        Self {
            original: original.into(),
            update: update.into(),
        }
    }

    pub fn violations(&self) -> Vec<DirectiveError> {
        if self.original.is_empty() || self.update.is_empty() {
            vec![DirectiveError::EmptyReplace {
                original: self.original.clone(),
                update: self.update.clone(),
            }]
        } else {
            Vec::new()
        }
    }

    pub fn validate(&self) -> Result<(), DirectiveError> {
        match self.violations().into_iter().next() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// The token passed to `go mod edit -replace=`.
    pub fn edit_arg(&self) -> Result<String, DirectiveError> {
        self.validate()?;
        Ok(format!("{}={}", self.original, self.update))
    }
}

impl fmt::Display for GomodReplace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "replace {} => {}", self.original, self.update)
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RequireFields {
    module: String,
    version: String,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ReplaceFields {
    old: String,
    new: String,
}

struct RequireVisitor;

impl<'de> Visitor<'de> for RequireVisitor {
    type Value = GomodRequire;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a \"<module>:<module>@<version>\" string or a map with `module` and `version`")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        let (module, version) = split_compact("require", "module", "version", v).map_err(E::custom)?;
        Ok(GomodRequire { module, version })
    }

    fn visit_map<A: MapAccess<'de>>(self, map: A) -> Result<Self::Value, A::Error> {
        let fields = RequireFields::deserialize(de::value::MapAccessDeserializer::new(map))?;
        Ok(GomodRequire {
            module: fields.module,
            version: fields.version,
        })
    }
}

struct ReplaceVisitor;

impl<'de> Visitor<'de> for ReplaceVisitor {
    type Value = GomodReplace;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an \"<old>:<new>\" string or a map with `old` and `new`")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        let (original, update) = split_compact("replace", "old", "new", v).map_err(E::custom)?;
        Ok(GomodReplace { original, update })
    }

    fn visit_map<A: MapAccess<'de>>(self, map: A) -> Result<Self::Value, A::Error> {
        let fields = ReplaceFields::deserialize(de::value::MapAccessDeserializer::new(map))?;
        Ok(GomodReplace {
            original: fields.old,
            update: fields.new,
        })
    }
}

impl<'de> Deserialize<'de> for GomodRequire {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let require = deserializer.deserialize_any(RequireVisitor)?;
        require.validate().map_err(de::Error::custom)?;
        Ok(require)
    }
}

impl<'de> Deserialize<'de> for GomodReplace {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let replace = deserializer.deserialize_any(ReplaceVisitor)?;
        replace.validate().map_err(de::Error::custom)?;
        Ok(replace)
    }
}
