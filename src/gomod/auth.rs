//! Credential plumbing for the gomod sandbox.
//!
//! Secret values are never read here. Descriptions only carry secret IDs and
//! SSH socket IDs; the executor resolves them when (and if) the step runs.

use crate::gomod::edits::{AuthKind, GeneratorGomod, GomodGitAuth};
use crate::graph::{Mount, Run, RunOption, SecretEnv, SshSocket, State};
use std::collections::{BTreeSet, HashMap};
use std::hash::BuildHasher;

/// Path of the frontend binary that serves as git credential helper.
pub const FRONTEND_BIN_PATH: &str = "/usr/local/bin/frontend";

/// Keys of `map` in sorted order, independent of the map's iteration order.
pub fn sorted_keys<K: Ord, V, S: BuildHasher>(map: &HashMap<K, V, S>) -> Vec<&K> {
    let mut keys: Vec<&K> = map.keys().collect();
    keys.sort();
    keys
}

/// Environment variable the credential helper reads for `host`.
///
/// `git.example.com:8443` with a token becomes `GOMOD_AUTH_TOKEN_GIT_EXAMPLE_COM_8443`.
pub fn auth_env_name(kind: AuthKind, host: &str) -> String {
    let host: String = host
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("GOMOD_AUTH_{}_{host}", kind.as_str().to_ascii_uppercase())
}

/// Mounts the frontend binary so `git` can call it as a credential helper.
#[derive(Debug, Clone)]
pub struct GitCredentialHelper {
    frontend: State,
}

impl GitCredentialHelper {
    pub fn new(frontend: State) -> Self {
        Self { frontend }
    }
}

impl RunOption for GitCredentialHelper {
    fn apply(&self, run: &mut Run) {
        run.add_mount(
            Mount::bind(FRONTEND_BIN_PATH, &self.frontend)
                .selector(FRONTEND_BIN_PATH)
                .readonly(),
        );
    }
}

/// Secrets and SSH sockets a gomod generator's auth config asks for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GomodAuthMounts {
    pub secrets: Vec<SecretEnv>,
    pub sockets: Vec<SshSocket>,
}

impl RunOption for GomodAuthMounts {
    fn apply(&self, run: &mut Run) {
        for secret in &self.secrets {
            run.add_secret(secret.clone());
        }
        for socket in &self.sockets {
            run.add_ssh(socket.clone());
        }
        if let Some(first) = self.sockets.first() {
            run.set_env("SSH_AUTH_SOCK", first.target.clone());
        }
    }
}

impl GeneratorGomod {
    /// Secret and socket requirements of the auth config, `None` when there are none.
    pub fn secrets_and_sockets(&self) -> Option<GomodAuthMounts> {
        if !self.auth.values().any(GomodGitAuth::has_credentials) {
            return None;
        }

        let mut mounts = GomodAuthMounts::default();
        let mut seen_sockets = BTreeSet::new();

        for host in sorted_keys(&self.auth) {
            let auth = &self.auth[host];

            if let Some(ssh) = &auth.ssh {
                if seen_sockets.insert(ssh.id.as_str()) {
                    let target = format!("/run/buildkit/ssh_agent.{}", mounts.sockets.len());
                    mounts.sockets.push(SshSocket {
                        id: ssh.id.clone(),
                        target,
                    });
                }
                continue;
            }

            let secret = match auth.helper_kind() {
                Some(AuthKind::Token) => auth.token_secret(),
                Some(AuthKind::Header) => auth.header_secret(),
                None => None,
            };
            if let (Some(kind), Some(id)) = (auth.helper_kind(), secret) {
                mounts.secrets.push(SecretEnv {
                    id: id.to_string(),
                    env: auth_env_name(kind, host),
                });
            }
        }

        if mounts.secrets.is_empty() && mounts.sockets.is_empty() {
            None
        } else {
            Some(mounts)
        }
    }
}
