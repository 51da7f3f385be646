//! Gomod Patcher: declarative `go.mod` / `go.sum` patches for package builds
//!
//! A build spec declares sources and, per source, generators carrying
//! `require` / `replace` edits. Preprocessing turns every generator into a
//! described sandbox step that applies the edits, runs `go mod tidy` and
//! captures the resulting diff as `gomod.patch`. The patch is registered back
//! into the build spec as an internal source plus a patch reference, so the build
//! applies it like any hand-written patch.
//!
//! # Architecture
//!
//! Nothing in this crate executes commands. Every step produces a
//! [`graph::State`], an immutable description consumed later by an executor.
//!
//! - [`gomod`]: directives, edit-command compilation, script synthesis
//! - [`spec`]: the build spec and its loaders
//! - [`patch`]: applying a source's existing patches
//! - [`preprocess`]: per-generator sandbox description and registration
//!
//! # Example
//!
//! ```no_run
//! use gomod_patcher::graph::State;
//! use gomod_patcher::preprocess::{preprocess, SandboxInputs};
//! use gomod_patcher::spec::load_from_path;
//!
//! let mut spec = load_from_path("package.yml")?;
//! let inputs = SandboxInputs::new(State::image("docker.io/library/golang:1.23"));
//!
//! for patch in preprocess(&mut spec, &inputs)? {
//!     println!("{} -> {}", patch.source, patch.patch_source);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod gomod;
pub mod graph;
pub mod patch;
pub mod preprocess;
pub mod spec;
pub mod validate;

// Re-exports
pub use gomod::{
    gomod_edit_command, CompileError, DirectiveError, GeneratorGomod, GomodEdits, GomodGitAuth,
    GomodReplace, GomodRequire, ScriptError,
};
pub use patch::{patched_sources, PatchError};
pub use preprocess::{
    build_patch_state, gomod_patch_source_name, preprocess, BuildError, GeneratedPatch,
    PatchRequest, PreprocessError, SandboxInputs,
};
pub use spec::{load_from_path, load_from_str, PatchSpec, Source, Spec, SpecError, SpecFormat};
pub use validate::{IssueKind, ValidationError, ValidationIssue};
