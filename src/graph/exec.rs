use crate::graph::state::{Constraints, State};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Concurrency mode of a persistent cache mount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CacheSharing {
    /// Any number of concurrent execs may use the cache at once.
    Shared,
    /// Concurrent execs each get their own copy.
    Private,
    /// Concurrent execs wait for exclusive access.
    Locked,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum MountKind {
    Bind { readonly: bool },
    Cache { id: String, sharing: CacheSharing },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Mount {
    pub target: String,
    pub source: State,
    /// Path inside `source` to mount instead of its root.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    pub kind: MountKind,
}

impl Mount {
    pub fn bind(target: impl Into<String>, source: &State) -> Self {
        Self {
            target: target.into(),
            source: source.clone(),
            selector: None,
            kind: MountKind::Bind { readonly: false },
        }
    }

    /// Persistent cache directory keyed by `id`, starting out empty.
    pub fn cache(target: impl Into<String>, id: impl Into<String>, sharing: CacheSharing) -> Self {
        Self {
            target: target.into(),
            source: State::scratch(),
            selector: None,
            kind: MountKind::Cache {
                id: id.into(),
                sharing,
            },
        }
    }

    pub fn readonly(mut self) -> Self {
        if let MountKind::Bind { readonly } = &mut self.kind {
            *readonly = true;
        }
        self
    }

    pub fn selector(mut self, path: impl Into<String>) -> Self {
        self.selector = Some(path.into());
        self
    }

    pub fn is_writable_bind(&self) -> bool {
        matches!(self.kind, MountKind::Bind { readonly: false })
    }
}

/// A build secret exposed to the command as an environment variable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SecretEnv {
    pub id: String,
    pub env: String,
}

/// An SSH agent socket forwarded into the command.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SshSocket {
    pub id: String,
    pub target: String,
}

/// Everything needed to describe one command execution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct Run {
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub mounts: Vec<Mount>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub secrets: Vec<SecretEnv>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ssh: Vec<SshSocket>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress_group: Option<String>,
    pub constraints: Constraints,
}

impl Run {
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn mount(mut self, mount: Mount) -> Self {
        self.add_mount(mount);
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_env(key, value);
        self
    }

    pub fn progress_group(mut self, label: impl Into<String>) -> Self {
        self.progress_group = Some(label.into());
        self
    }

    pub fn constraints(mut self, constraints: &Constraints) -> Self {
        self.constraints = constraints.clone();
        self
    }

    pub fn with(mut self, option: &dyn RunOption) -> Self {
        option.apply(&mut self);
        self
    }

    pub fn add_mount(&mut self, mount: Mount) {
        self.mounts.push(mount);
    }

    /// Set an environment variable, replacing any previous value for `key`.
    pub fn set_env(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.env.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.env.push((key, value)),
        }
    }

    pub fn add_secret(&mut self, secret: SecretEnv) {
        self.secrets.push(secret);
    }

    pub fn add_ssh(&mut self, socket: SshSocket) {
        self.ssh.push(socket);
    }

    pub fn get_env(&self, key: &str) -> Option<&str> {
        self.env
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn find_mount(&self, target: &str) -> Option<&Mount> {
        self.mounts.iter().find(|m| m.target == target)
    }
}

/// Extra configuration injected into a [`Run`] by a collaborator.
///
/// Builders treat options as opaque: they only decide whether to apply one.
pub trait RunOption: fmt::Debug + Send + Sync {
    fn apply(&self, run: &mut Run);
}

#[derive(Debug, PartialEq, Eq, Hash, Serialize)]
pub struct Exec {
    pub root: State,
    pub run: Run,
}

/// Handle to a described exec, used to pick out its outputs.
#[derive(Debug, Clone)]
pub struct ExecState(Arc<Exec>);

impl ExecState {
    pub(crate) fn new(exec: Exec) -> Self {
        ExecState(Arc::new(exec))
    }

    pub fn exec(&self) -> &Exec {
        &self.0
    }

    /// Contents of the writable bind mount at `target` after the command ran.
    ///
    /// Read-only and cache mounts have no output.
    pub fn mount_output(&self, target: &str) -> Option<State> {
        self.0
            .run
            .find_mount(target)
            .filter(|m| m.is_writable_bind())
            .map(|m| State::exec_output(Arc::clone(&self.0), m.target.clone()))
    }
}
