//! Grouped integration scenarios: multi-module generators, private module
//! auth, and directive properties.

mod auth;
mod directive_properties;
mod multi_module;

use gomod_patcher::graph::{Exec, FileAction, Node, State};
use gomod_patcher::preprocess::{SandboxInputs, PATCH_SCRIPT_PATH};

pub(crate) fn inputs() -> SandboxInputs {
    SandboxInputs::new(State::image("docker.io/library/golang:1.23"))
}

/// The sandbox exec a generated artifact copies its patch from.
pub(crate) fn sandbox_exec(artifact: &State) -> &Exec {
    match artifact.node() {
        Node::File {
            action: FileAction::Copy { source, .. },
            ..
        } => source.exec().expect("artifact copies from an exec output"),
        other => panic!("unexpected artifact node {other:?}"),
    }
}

pub(crate) fn script_text(exec: &Exec) -> &str {
    let mount = exec.run.find_mount(PATCH_SCRIPT_PATH).expect("script mount");
    match mount.source.node() {
        Node::File {
            action: FileAction::Mkfile { contents, .. },
            ..
        } => contents,
        other => panic!("unexpected script node {other:?}"),
    }
}
