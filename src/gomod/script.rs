//! Synthesis of the sandboxed shell procedure that produces the patch.
//!
//! One script handles every module path of a generator, so a multi-module
//! source still yields a single merged patch file.

use crate::gomod::auth::{sorted_keys, FRONTEND_BIN_PATH};
use crate::gomod::edits::GomodGitAuth;
use crate::gomod::template::{module_block, patch_script, ScriptError};
use crate::gomod::{DEFAULT_GIT_USERNAME, GOMOD_FILENAME, GOSUM_FILENAME, GOMOD_PATCH_FILENAME};
use std::collections::HashMap;

/// Where the source states are mounted inside the sandbox.
pub const WORK_DIR: &str = "/work/src";

/// Inputs of [`build_script`].
#[derive(Debug, Clone, Copy)]
pub struct ScriptParams<'a> {
    /// Compiled `go mod edit ...` command; see [`crate::gomod::gomod_edit_command`].
    pub edit_cmd: &'a str,
    /// Module directories relative to `subpath`, in processing order.
    pub paths: &'a [String],
    /// Offset of the generator inside the source tree.
    pub subpath: &'a str,
    pub auth: &'a HashMap<String, GomodGitAuth>,
    pub source_name: &'a str,
    /// Directory the patch file is written to.
    pub output_dir: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ModuleInfo {
    module_dir: String,
    gomod_path: String,
    gosum_path: String,
    rel_gomod_path: String,
    rel_gosum_path: String,
}

impl ModuleInfo {
    fn new(source_name: &str, subpath: &str, rel_path: &str) -> Self {
        let module_dir = join_path(&[WORK_DIR, source_name, subpath, rel_path]);
        let rel_module = join_path(&[subpath, rel_path]);
        let rel_module = if rel_module == "." { "" } else { rel_module.as_str() };

        Self {
            gomod_path: join_path(&[module_dir.as_str(), GOMOD_FILENAME]),
            gosum_path: join_path(&[module_dir.as_str(), GOSUM_FILENAME]),
            rel_gomod_path: join_path(&[rel_module, GOMOD_FILENAME]),
            rel_gosum_path: join_path(&[rel_module, GOSUM_FILENAME]),
            module_dir,
        }
    }
}

/// Render the sandbox procedure for one gomod generator.
pub fn build_script(params: &ScriptParams<'_>) -> Result<String, ScriptError> {
    let patch_path = join_path(&[params.output_dir, GOMOD_PATCH_FILENAME]);
    let (git_config, go_env) = auth_sections(params.auth);

    let block = module_block()?;
    let mut modules = String::new();
    for rel_path in params.paths {
        let module = ModuleInfo::new(params.source_name, params.subpath, rel_path);
        let module_dir = shell_quote(&module.module_dir);
        let gomod_path = shell_quote(&module.gomod_path);
        let gosum_path = shell_quote(&module.gosum_path);
        let rel_gomod_path = shell_quote(&module.rel_gomod_path);
        let rel_gosum_path = shell_quote(&module.rel_gosum_path);
        modules.push_str(&block.render(&[
            ("module_dir", module_dir.as_str()),
            ("gomod_path", gomod_path.as_str()),
            ("gosum_path", gosum_path.as_str()),
            ("rel_gomod_path", rel_gomod_path.as_str()),
            ("rel_gosum_path", rel_gosum_path.as_str()),
            ("edit_cmd", params.edit_cmd),
        ])?);
    }

    let patch_path = shell_quote(&patch_path);
    patch_script()?.render(&[
        ("patch_path", patch_path.as_str()),
        ("git_config", git_config.as_str()),
        ("go_env", go_env.as_str()),
        ("modules", modules.as_str()),
    ])
}

/// Git rewrites/helpers per host, plus the GOPRIVATE/GOINSECURE exports.
///
/// Hosts are visited in sorted order. Only host names reach the script.
fn auth_sections(auth: &HashMap<String, GomodGitAuth>) -> (String, String) {
    let mut git_config = String::new();
    let hosts = sorted_keys(auth);
    if hosts.is_empty() {
        return (git_config, String::new());
    }

    let mut private_hosts = Vec::with_capacity(hosts.len());
    for host in hosts {
        let entry = &auth[host];
        let bare_host = host.split_once(':').map_or(host.as_str(), |(h, _)| h);
        private_hosts.push(bare_host);

        if let Some(ssh) = &entry.ssh {
            let username = ssh
                .username
                .as_deref()
                .filter(|u| !u.is_empty())
                .unwrap_or(DEFAULT_GIT_USERNAME);
            git_config.push_str(&format!(
                "git config --global url.{}.insteadOf {}\n",
                double_quote(&format!("ssh://{username}@{host}/")),
                double_quote(&format!("https://{bare_host}/")),
            ));
            continue;
        }

        if let Some(kind) = entry.helper_kind() {
            git_config.push_str(&format!(
                "git config --global credential.{}.helper {}\n",
                double_quote(&format!("https://{host}")),
                double_quote(&format!(
                    "{FRONTEND_BIN_PATH} credential-helper --kind={}",
                    kind.as_str()
                )),
            ));
        }
    }

    let joined = double_quote(&private_hosts.join(","));
    let go_env = format!("export GOPRIVATE={joined}\nexport GOINSECURE={joined}\n");
    (git_config, go_env)
}

/// Lexically clean a slash-separated path: collapses `//`, `.` and
/// resolvable `..` without touching the filesystem.
pub(crate) fn clean_path(path: &str) -> String {
    let rooted = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();

    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                if parts.last().is_some_and(|p| *p != "..") {
                    parts.pop();
                } else if !rooted {
                    parts.push("..");
                }
            }
            other => parts.push(other),
        }
    }

    let joined = parts.join("/");
    if rooted {
        format!("/{joined}")
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}

fn join_path(parts: &[&str]) -> String {
    let joined = parts
        .iter()
        .filter(|p| !p.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("/");
    clean_path(&joined)
}

fn is_shell_safe(c: char) -> bool {
    c.is_ascii_alphanumeric() || "_-./@:,+=%".contains(c)
}

/// Quote `value` for a POSIX shell, leaving plain words untouched.
pub fn shell_quote(value: &str) -> String {
    if !value.is_empty() && value.chars().all(is_shell_safe) {
        return value.to_string();
    }
    format!("'{}'", value.replace('\'', r"'\''"))
}

fn double_quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        if matches!(c, '"' | '\\' | '$' | '`') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}
