//! Build-graph state descriptions.
//!
//! A [`State`] is an immutable description of a filesystem: scratch, an
//! external source, a file action layered on another state, or the output of
//! a command execution. Descriptions are consumed lazily by an external
//! executor which decides when (and whether) anything actually runs.

pub mod exec;
pub mod state;

pub use exec::{CacheSharing, Exec, ExecState, Mount, MountKind, Run, RunOption, SecretEnv, SshSocket};
pub use state::{Constraints, FileAction, Identifier, Node, State};
