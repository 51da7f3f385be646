//! Go module edit directives and the sandbox script that turns them into a patch.

pub mod auth;
pub mod directive;
pub mod edits;
pub mod script;
pub mod template;

pub use auth::{auth_env_name, sorted_keys, GitCredentialHelper, GomodAuthMounts, FRONTEND_BIN_PATH};
pub use directive::{DirectiveError, GomodReplace, GomodRequire};
pub use edits::{
    gomod_edit_command, AuthKind, CompileError, GeneratorGomod, GomodEdits, GomodGitAuth,
    GomodGitAuthSsh,
};
pub use script::{build_script, shell_quote, ScriptParams, WORK_DIR};
pub use template::ScriptError;

pub const GOMOD_FILENAME: &str = "go.mod";
pub const GOSUM_FILENAME: &str = "go.sum";
/// Name of the generated patch, both in the sandbox and in the artifact.
pub const GOMOD_PATCH_FILENAME: &str = "gomod.patch";
pub const DEFAULT_GIT_USERNAME: &str = "git";
