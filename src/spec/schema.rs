use crate::gomod::edits::validate_relative_path;
use crate::gomod::GeneratorGomod;
use crate::graph::{Constraints, FileAction, Identifier, State};
use crate::patch::{GENERATOR_INDEX_SEPARATOR, GOMOD_PATCH_SOURCE_PREFIX};
use crate::validate::{IssueKind, ValidationError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A build specification: named sources and the patches applied to them.
///
/// Maps are ordered so that everything derived from a spec (scripts, graph
/// descriptions, patch order) is reproducible.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Spec {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub sources: BTreeMap<String, Source>,
    /// Patches per target source, applied in order.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub patches: BTreeMap<String, Vec<PatchSpec>>,
}

impl Spec {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut errors = ValidationError::new();

        for (name, source) in &self.sources {
            if name.trim().is_empty() {
                errors.push("sources", IssueKind::EmptyField { field: "source name" });
            }
            if source.llb.is_none() {
                if name.starts_with(GOMOD_PATCH_SOURCE_PREFIX) {
                    errors.push(
                        format!("sources.{name}"),
                        IssueKind::ReservedSourceName {
                            message: "must not start with __gomod_patch_",
                        },
                    );
                }
                if name.contains(GENERATOR_INDEX_SEPARATOR) {
                    errors.push(
                        format!("sources.{name}"),
                        IssueKind::ReservedSourceName {
                            message: "must not contain '#'",
                        },
                    );
                }
            }
            errors.merge(&format!("sources.{name}"), source.validate());
        }

        for (target, patches) in &self.patches {
            if !self.sources.contains_key(target) {
                errors.push(
                    format!("patches.{target}"),
                    IssueKind::UnknownPatchSource {
                        source: target.clone(),
                    },
                );
            }
            for (idx, patch) in patches.iter().enumerate() {
                if !self.sources.contains_key(&patch.source) {
                    errors.push(
                        format!("patches.{target}[{idx}]"),
                        IssueKind::UnknownPatchSource {
                            source: patch.source.clone(),
                        },
                    );
                }
            }
        }

        errors.into_result()
    }

    /// Names of sources with at least one generator carrying gomod edits.
    pub fn gomod_sources(&self) -> BTreeSet<&str> {
        self.sources
            .iter()
            .filter(|(_, source)| source.generate.iter().any(SourceGenerator::has_gomod_edits))
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceGit {
    pub url: String,
    pub commit: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceHttp {
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceContext {
    /// Build context to read from; the main context when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Internal source wrapping an already-built state.
///
/// Never read from or written to a spec file; only preprocessing creates these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLlb {
    state: State,
}

impl SourceLlb {
    pub fn new(state: State) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &State {
        &self.state
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Source {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git: Option<SourceGit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http: Option<SourceHttp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<SourceContext>,
    #[serde(skip)]
    pub llb: Option<SourceLlb>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub generate: Vec<SourceGenerator>,
}

impl Source {
    pub fn from_llb(state: State) -> Self {
        Self {
            llb: Some(SourceLlb::new(state)),
            ..Self::default()
        }
    }

    fn kinds(&self) -> Vec<&'static str> {
        let mut kinds = Vec::new();
        if self.git.is_some() {
            kinds.push("git");
        }
        if self.http.is_some() {
            kinds.push("http");
        }
        if self.context.is_some() {
            kinds.push("context");
        }
        if self.llb.is_some() {
            kinds.push("llb");
        }
        kinds
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut errors = ValidationError::new();

        match self.kinds().as_slice() {
            [] => errors.push("", IssueKind::MissingSourceKind),
            [_] => {}
            kinds => errors.push(
                "",
                IssueKind::ConflictingSourceKinds {
                    kinds: kinds.to_vec(),
                },
            ),
        }

        if let Some(git) = &self.git {
            if git.url.trim().is_empty() {
                errors.push("git", IssueKind::EmptyField { field: "url" });
            }
            if git.commit.trim().is_empty() {
                errors.push("git", IssueKind::EmptyField { field: "commit" });
            }
        }
        if let Some(http) = &self.http {
            if http.url.trim().is_empty() {
                errors.push("http", IssueKind::EmptyField { field: "url" });
            }
        }

        for (idx, gen) in self.generate.iter().enumerate() {
            errors.merge(&format!("generate[{idx}]"), gen.validate());
        }

        errors.into_result()
    }

    /// Describe this source's content.
    ///
    /// Directory sources land under `/<name>`; an http source is the single
    /// file `/<name>`. Internal sources are returned as built.
    pub fn to_state(&self, name: &str, constraints: &Constraints) -> Option<State> {
        if let Some(llb) = &self.llb {
            return Some(llb.state().clone());
        }

        let identifier = if let Some(git) = &self.git {
            Identifier::Git {
                remote: git.url.clone(),
                commit: git.commit.clone(),
            }
        } else if let Some(http) = &self.http {
            let fetched = State::source(
                Identifier::Http {
                    url: http.url.clone(),
                },
                constraints,
            );
            return Some(
                State::scratch().file(FileAction::copy(&fetched, "/", format!("/{name}")), constraints),
            );
        } else if let Some(context) = &self.context {
            Identifier::Context {
                name: context.name.clone().unwrap_or_else(|| "context".to_string()),
            }
        } else {
            return None;
        };

        let fetched = State::source(identifier, constraints);
        Some(State::scratch().file(FileAction::copy(&fetched, "/", format!("/{name}/")), constraints))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceGenerator {
    /// Offset of the generator's root within the source tree.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub subpath: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gomod: Option<GeneratorGomod>,
}

impl SourceGenerator {
    pub fn has_gomod_edits(&self) -> bool {
        self.gomod.as_ref().is_some_and(GeneratorGomod::has_edits)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut errors = ValidationError::new();
        if !self.subpath.is_empty() {
            errors.merge("subpath", validate_relative_path(&self.subpath));
        }
        if let Some(gomod) = &self.gomod {
            errors.merge("gomod", gomod.validate());
        }
        errors.into_result()
    }
}

/// Reference to a patch file inside another source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PatchSpec {
    pub source: String,
    /// Path of the patch inside `source`; the source itself when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Leading path components to strip; 1 when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strip: Option<u32>,
}

impl PatchSpec {
    pub fn strip_count(&self) -> u32 {
        self.strip.unwrap_or(1)
    }
}
