//! Turning gomod generators into patch sources.
//!
//! Nothing here runs Go. Each generator becomes a described sandbox exec
//! whose captured output is a single `gomod.patch`, registered back into
//! the build spec as an internal source plus a patch reference on its owner.

use crate::gomod::{build_script, CompileError, ScriptError, ScriptParams, GOMOD_PATCH_FILENAME, WORK_DIR};
use crate::graph::{CacheSharing, Constraints, FileAction, Mount, Run, RunOption, State};
use crate::patch::{patched_sources, PatchError};
use crate::spec::{PatchSpec, Source, SourceGenerator, Spec};
use crate::validate::ValidationError;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

pub use crate::patch::{GENERATOR_INDEX_SEPARATOR, GOMOD_PATCH_SOURCE_PREFIX};

/// Where the rendered script is mounted inside the sandbox.
pub const PATCH_SCRIPT_PATH: &str = "/gomod-patch.sh";
/// Go module download cache inside the sandbox.
pub const MODULE_CACHE_DIR: &str = "/go/pkg/mod";
/// Capture directory the script writes the patch into.
pub const PATCH_OUTPUT_DIR: &str = "/tmp/patch-work";
/// Key of the persistent module cache shared by every gomod exec.
pub const GOMOD_CACHE_KEY: &str = "gomod-patcher-module-cache";

const GOPATH: &str = "/go";
const GIT_SSH_COMMAND: &str = "ssh -o UserKnownHostsFile=/dev/null -o StrictHostKeyChecking=no";

/// What every sandbox exec is built from.
#[derive(Debug, Clone)]
pub struct SandboxInputs {
    /// Image or state providing the Go toolchain, git and a shell.
    pub worker: State,
    pub credential_helper: Option<Arc<dyn RunOption>>,
    pub constraints: Constraints,
}

impl SandboxInputs {
    pub fn new(worker: State) -> Self {
        Self {
            worker,
            credential_helper: None,
            constraints: Constraints::default(),
        }
    }

    pub fn with_credential_helper(mut self, helper: impl RunOption + 'static) -> Self {
        self.credential_helper = Some(Arc::new(helper));
        self
    }

    pub fn with_constraints(mut self, constraints: Constraints) -> Self {
        self.constraints = constraints;
        self
    }
}

/// One generator of one source, ready to be turned into a patch state.
#[derive(Debug, Clone, Copy)]
pub struct PatchRequest<'a> {
    pub source_name: &'a str,
    pub generator_index: usize,
    pub generator: &'a SourceGenerator,
    /// Source content with prior patches applied, laid out under `/<source_name>`.
    pub base: &'a State,
}

impl PatchRequest<'_> {
    pub fn patch_source_name(&self) -> String {
        gomod_patch_source_name(self.source_name, self.generator_index)
    }
}

/// `__gomod_patch_<source>` for the first generator, `__gomod_patch_<source>#<n>` after that.
///
/// Source names cannot contain `#`, so names of distinct sources never meet.
pub fn gomod_patch_source_name(source_name: &str, generator_index: usize) -> String {
    if generator_index == 0 {
        format!("{GOMOD_PATCH_SOURCE_PREFIX}{source_name}")
    } else {
        format!("{GOMOD_PATCH_SOURCE_PREFIX}{source_name}{GENERATOR_INDEX_SEPARATOR}{generator_index}")
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("generator {generator} of source '{source_name}' is invalid:\n{source}")]
    Validation {
        source_name: String,
        generator: usize,
        #[source]
        source: ValidationError,
    },

    #[error("generator {generator} of source '{source_name}': {source}")]
    Compile {
        source_name: String,
        generator: usize,
        #[source]
        source: CompileError,
    },

    #[error("generator {generator} of source '{source_name}': {source}")]
    Script {
        source_name: String,
        generator: usize,
        #[source]
        source: ScriptError,
    },

    #[error("generator {generator} of source '{source_name}': sandbox has no patch output")]
    MissingOutput { source_name: String, generator: usize },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PreprocessError {
    #[error("failed to generate gomod patch state for source {source_name}: {source}")]
    Build {
        source_name: String,
        #[source]
        source: BuildError,
    },

    #[error("patch source '{name}' already exists")]
    PatchSourceExists { name: String },

    #[error(transparent)]
    Patch(#[from] PatchError),
}

/// A patch source registered by [`preprocess`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedPatch {
    /// Source the patch applies to.
    pub source: String,
    pub generator: usize,
    /// Name of the internal source holding `gomod.patch`.
    pub patch_source: String,
    pub state: State,
}

/// Render the sandbox script for a request.
///
/// `Ok(None)` means the generator has nothing to edit and needs no sandbox.
pub fn render_patch_script(request: &PatchRequest<'_>) -> Result<Option<String>, BuildError> {
    let source_name = request.source_name.to_string();
    let generator = request.generator_index;

    let Some(gomod) = &request.generator.gomod else {
        return Ok(None);
    };

    request
        .generator
        .validate()
        .map_err(|source| BuildError::Validation {
            source_name: source_name.clone(),
            generator,
            source,
        })?;

    let edit_cmd = gomod.edit_command().map_err(|source| BuildError::Compile {
        source_name: source_name.clone(),
        generator,
        source,
    })?;
    if edit_cmd.is_empty() {
        return Ok(None);
    }

    let paths = gomod.module_paths();
    let script = build_script(&ScriptParams {
        edit_cmd: &edit_cmd,
        paths: &paths,
        subpath: &request.generator.subpath,
        auth: &gomod.auth,
        source_name: request.source_name,
        output_dir: PATCH_OUTPUT_DIR,
    })
    .map_err(|source| BuildError::Script {
        source_name,
        generator,
        source,
    })?;

    debug!(
        source = %request.source_name,
        generator,
        modules = paths.len(),
        "rendered gomod patch script"
    );
    Ok(Some(script))
}

/// Describe the sandbox exec for one generator and the artifact it yields.
///
/// The artifact holds exactly `/<patch source>/gomod.patch`. A state is
/// returned whenever the edit command is non-empty, even if the resulting
/// patch turns out empty.
pub fn build_patch_state(
    request: &PatchRequest<'_>,
    inputs: &SandboxInputs,
) -> Result<Option<State>, BuildError> {
    let Some(script) = render_patch_script(request)? else {
        return Ok(None);
    };
    let Some(gomod) = &request.generator.gomod else {
        return Ok(None);
    };
    let constraints = &inputs.constraints;

    let script_state = State::scratch().file(
        FileAction::mkfile(PATCH_SCRIPT_PATH, 0o755, script),
        constraints,
    );

    let mut run = Run::new([PATCH_SCRIPT_PATH])
        .mount(
            Mount::bind(PATCH_SCRIPT_PATH, &script_state)
                .selector(PATCH_SCRIPT_PATH)
                .readonly(),
        )
        .mount(Mount::bind(WORK_DIR, request.base))
        .mount(Mount::cache(MODULE_CACHE_DIR, GOMOD_CACHE_KEY, CacheSharing::Shared))
        .mount(Mount::bind(PATCH_OUTPUT_DIR, &State::scratch()))
        .env("GOPATH", GOPATH)
        .env("TMP_GOMODCACHE", MODULE_CACHE_DIR)
        .env("GIT_SSH_COMMAND", GIT_SSH_COMMAND)
        .constraints(constraints)
        .progress_group(format!(
            "Generate gomod patch for source: {}",
            request.source_name
        ));

    if let Some(helper) = &inputs.credential_helper {
        run = run.with(helper.as_ref());
    }
    if let Some(mounts) = gomod.secrets_and_sockets() {
        run = run.with(&mounts);
    }

    let output = inputs
        .worker
        .run(run)
        .mount_output(PATCH_OUTPUT_DIR)
        .ok_or_else(|| BuildError::MissingOutput {
            source_name: request.source_name.to_string(),
            generator: request.generator_index,
        })?;

    let artifact_dir = format!("/{}", request.patch_source_name());
    let state = State::scratch()
        .file(FileAction::mkdir(artifact_dir.as_str(), 0o755, true), constraints)
        .file(
            FileAction::copy(
                &output,
                format!("/{GOMOD_PATCH_FILENAME}"),
                format!("{artifact_dir}/{GOMOD_PATCH_FILENAME}"),
            ),
            constraints,
        );

    Ok(Some(state))
}

/// Generate a gomod patch source for every generator with edits and
/// register it with the build spec.
///
/// Sources are visited in name order and generators in declaration order.
/// The spec is only modified once every generator succeeded.
pub fn preprocess(
    spec: &mut Spec,
    inputs: &SandboxInputs,
) -> Result<Vec<GeneratedPatch>, PreprocessError> {
    let gomod_sources: BTreeSet<String> = spec
        .gomod_sources()
        .into_iter()
        .map(str::to_string)
        .collect();
    if gomod_sources.is_empty() {
        debug!("no gomod generators with edits");
        return Ok(Vec::new());
    }

    let bases = patched_sources(spec, &inputs.worker, &inputs.constraints, |name| {
        gomod_sources.contains(name)
    })?;

    let mut generated: Vec<GeneratedPatch> = Vec::new();

    for source_name in &gomod_sources {
        let (Some(source), Some(base)) = (spec.sources.get(source_name), bases.get(source_name))
        else {
            continue;
        };

        for (idx, generator) in source.generate.iter().enumerate() {
            let request = PatchRequest {
                source_name,
                generator_index: idx,
                generator,
                base,
            };

            let state = build_patch_state(&request, inputs).map_err(|source| {
                PreprocessError::Build {
                    source_name: source_name.clone(),
                    source,
                }
            })?;
            let Some(state) = state else {
                debug!(source = %source_name, generator = idx, "no gomod edits, skipping");
                continue;
            };

            let patch_source = request.patch_source_name();
            if spec.sources.contains_key(&patch_source)
                || generated.iter().any(|p| p.patch_source == patch_source)
            {
                return Err(PreprocessError::PatchSourceExists { name: patch_source });
            }

            generated.push(GeneratedPatch {
                source: source_name.clone(),
                generator: idx,
                patch_source,
                state,
            });
        }
    }

    for patch in &generated {
        spec.sources.insert(
            patch.patch_source.clone(),
            Source::from_llb(patch.state.clone()),
        );
        spec.patches
            .entry(patch.source.clone())
            .or_default()
            .push(PatchSpec {
                source: patch.patch_source.clone(),
                path: Some(GOMOD_PATCH_FILENAME.to_string()),
                strip: Some(1),
            });
        info!(
            source = %patch.source,
            patch_source = %patch.patch_source,
            digest = %format!("{:016x}", patch.state.digest()),
            "registered gomod patch source"
        );
    }

    Ok(generated)
}
