//! Applying a source's declared patches on top of its content.

use crate::graph::{Constraints, Mount, Run, State};
use crate::spec::{PatchSpec, Spec};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

/// Name prefix of generated gomod patch sources.
pub const GOMOD_PATCH_SOURCE_PREFIX: &str = "__gomod_patch_";
/// Separates the generator index in generated names; never valid in a source name.
pub const GENERATOR_INDEX_SEPARATOR: char = '#';

const SRC_MOUNT: &str = "/src";
const PATCHES_MOUNT: &str = "/patches";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatchError {
    #[error("source '{target}': patch references unknown source '{patch_source}'")]
    MissingSource { target: String, patch_source: String },

    #[error("source '{name}' declares no content")]
    EmptySource { name: String },

    #[error("source '{target}': patch step produced no output")]
    MissingOutput { target: String },
}

fn source_state(spec: &Spec, name: &str, constraints: &Constraints) -> Option<State> {
    spec.sources.get(name)?.to_state(name, constraints)
}

/// Layer `patches` over `base`, one patch step per reference, in order.
///
/// Generated gomod patches are skipped so they never feed one another.
pub fn apply_patch_specs(
    spec: &Spec,
    target: &str,
    base: State,
    patches: &[PatchSpec],
    worker: &State,
    constraints: &Constraints,
) -> Result<State, PatchError> {
    let mut state = base;

    for patch in patches {
        if patch.source.starts_with(GOMOD_PATCH_SOURCE_PREFIX) {
            debug!(source = %target, patch_source = %patch.source, "skipping generated patch");
            continue;
        }

        let patch_state = source_state(spec, &patch.source, constraints).ok_or_else(|| {
            PatchError::MissingSource {
                target: target.to_string(),
                patch_source: patch.source.clone(),
            }
        })?;

        let patch_file = match &patch.path {
            Some(path) => format!("{PATCHES_MOUNT}/{}/{}", patch.source, path.trim_start_matches('/')),
            None => format!("{PATCHES_MOUNT}/{}", patch.source),
        };

        let run = Run::new([
            "patch".to_string(),
            format!("-p{}", patch.strip_count()),
            "-d".to_string(),
            format!("{SRC_MOUNT}/{target}"),
            "-i".to_string(),
            patch_file,
        ])
        .mount(Mount::bind(SRC_MOUNT, &state))
        .mount(Mount::bind(PATCHES_MOUNT, &patch_state).readonly())
        .progress_group(format!("Apply patch {} to source: {target}", patch.source))
        .constraints(constraints);

        debug!(source = %target, patch_source = %patch.source, strip = patch.strip_count(), "applying patch");

        state = worker
            .run(run)
            .mount_output(SRC_MOUNT)
            .ok_or_else(|| PatchError::MissingOutput {
                target: target.to_string(),
            })?;
    }

    Ok(state)
}

/// States of every source accepted by `filter`, with its declared patches applied.
pub fn patched_sources<F>(
    spec: &Spec,
    worker: &State,
    constraints: &Constraints,
    filter: F,
) -> Result<BTreeMap<String, State>, PatchError>
where
    F: Fn(&str) -> bool,
{
    let mut states = BTreeMap::new();

    for name in spec.sources.keys().filter(|name| filter(name.as_str())) {
        let base = source_state(spec, name, constraints)
            .ok_or_else(|| PatchError::EmptySource { name: name.clone() })?;
        let patches = spec.patches.get(name).map(Vec::as_slice).unwrap_or_default();
        let state = apply_patch_specs(spec, name, base, patches, worker, constraints)?;
        states.insert(name.clone(), state);
    }

    Ok(states)
}
