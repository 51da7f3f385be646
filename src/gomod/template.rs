//! Minimal `{{name}}` substitution over embedded shell templates.
//!
//! Templates are compiled into the binary and parsed once per process; the
//! parsed form is shared read-only by every render.

use std::sync::LazyLock;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScriptError {
    #[error("template {template}: unterminated placeholder at byte {offset}")]
    Unterminated { template: &'static str, offset: usize },

    #[error("template {template}: no value for placeholder '{name}'")]
    MissingValue {
        template: &'static str,
        name: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(&'static str),
    Placeholder(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    name: &'static str,
    segments: Vec<Segment>,
}

impl Template {
    pub fn parse(name: &'static str, source: &'static str) -> Result<Self, ScriptError> {
        let mut segments = Vec::new();
        let mut rest = source;
        let mut offset = 0;

        while let Some(start) = rest.find("{{") {
            if start > 0 {
                segments.push(Segment::Text(&rest[..start]));
            }
            let after = &rest[start + 2..];
            let end = after.find("}}").ok_or(ScriptError::Unterminated {
                template: name,
                offset: offset + start,
            })?;
            segments.push(Segment::Placeholder(after[..end].trim()));

            let consumed = start + 2 + end + 2;
            offset += consumed;
            rest = &rest[consumed..];
        }
        if !rest.is_empty() {
            segments.push(Segment::Text(rest));
        }

        Ok(Self { name, segments })
    }

    /// Substitute every placeholder in a single pass.
    ///
    /// Substituted values are never rescanned, so a value containing `{{`
    /// is emitted literally.
    pub fn render(&self, values: &[(&str, &str)]) -> Result<String, ScriptError> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Placeholder(name) => {
                    let value = values
                        .iter()
                        .find(|(key, _)| key == name)
                        .map(|(_, value)| *value)
                        .ok_or(ScriptError::MissingValue {
                            template: self.name,
                            name: *name,
                        })?;
                    out.push_str(value);
                }
            }
        }
        Ok(out)
    }

    pub fn placeholders(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.segments.iter().filter_map(|s| match s {
            Segment::Placeholder(name) => Some(*name),
            Segment::Text(_) => None,
        })
    }
}

static PATCH_SCRIPT: LazyLock<Result<Template, ScriptError>> = LazyLock::new(|| {
    Template::parse("gomod-patch.sh", include_str!("scripts/gomod-patch.sh"))
});

static MODULE_BLOCK: LazyLock<Result<Template, ScriptError>> = LazyLock::new(|| {
    Template::parse("gomod-module.sh", include_str!("scripts/gomod-module.sh"))
});

/// The outer sandbox procedure.
pub fn patch_script() -> Result<&'static Template, ScriptError> {
    PATCH_SCRIPT.as_ref().map_err(Clone::clone)
}

/// The per-module edit/tidy/diff block.
pub fn module_block() -> Result<&'static Template, ScriptError> {
    MODULE_BLOCK.as_ref().map_err(Clone::clone)
}
