use crate::graph::exec::{Exec, ExecState, Run};
use serde::Serialize;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use xxhash_rust::xxh3::Xxh3;

/// Constraints attached to every node a builder creates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct Constraints {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
}

impl Constraints {
    pub fn with_platform(platform: impl Into<String>) -> Self {
        Self {
            platform: Some(platform.into()),
        }
    }
}

/// Where an external source node pulls its content from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Identifier {
    Image { reference: String },
    Git { remote: String, commit: String },
    Http { url: String },
    Context { name: String },
}

/// A single filesystem transformation applied on top of a base state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum FileAction {
    Mkfile {
        path: String,
        mode: u32,
        contents: String,
    },
    Mkdir {
        path: String,
        mode: u32,
        parents: bool,
    },
    Copy {
        source: State,
        src: String,
        dest: String,
    },
}

impl FileAction {
    pub fn mkfile(path: impl Into<String>, mode: u32, contents: impl Into<String>) -> Self {
        FileAction::Mkfile {
            path: path.into(),
            mode,
            contents: contents.into(),
        }
    }

    pub fn mkdir(path: impl Into<String>, mode: u32, parents: bool) -> Self {
        FileAction::Mkdir {
            path: path.into(),
            mode,
            parents,
        }
    }

    pub fn copy(source: &State, src: impl Into<String>, dest: impl Into<String>) -> Self {
        FileAction::Copy {
            source: source.clone(),
            src: src.into(),
            dest: dest.into(),
        }
    }
}

#[derive(Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum Node {
    Scratch,
    Source {
        identifier: Identifier,
        constraints: Constraints,
    },
    File {
        base: State,
        action: FileAction,
        constraints: Constraints,
    },
    ExecOutput {
        exec: Arc<Exec>,
        mount: String,
    },
}

/// Immutable, lazily-evaluated description of a filesystem.
///
/// Nothing here touches the host: states only describe what an executor
/// would produce. Cloning is cheap and shares the underlying node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct State(Arc<Node>);

impl State {
    pub fn scratch() -> Self {
        State(Arc::new(Node::Scratch))
    }

    pub fn source(identifier: Identifier, constraints: &Constraints) -> Self {
        State(Arc::new(Node::Source {
            identifier,
            constraints: constraints.clone(),
        }))
    }

    pub fn image(reference: impl Into<String>) -> Self {
        Self::source(
            Identifier::Image {
                reference: reference.into(),
            },
            &Constraints::default(),
        )
    }

    pub(crate) fn exec_output(exec: Arc<Exec>, mount: impl Into<String>) -> Self {
        State(Arc::new(Node::ExecOutput {
            exec,
            mount: mount.into(),
        }))
    }

    /// Layer a file action on top of this state.
    pub fn file(&self, action: FileAction, constraints: &Constraints) -> Self {
        State(Arc::new(Node::File {
            base: self.clone(),
            action,
            constraints: constraints.clone(),
        }))
    }

    /// Describe running a command with this state as the root filesystem.
    pub fn run(&self, run: Run) -> ExecState {
        ExecState::new(Exec {
            root: self.clone(),
            run,
        })
    }

    pub fn node(&self) -> &Node {
        &self.0
    }

    pub fn is_scratch(&self) -> bool {
        matches!(*self.0, Node::Scratch)
    }

    /// The exec this state was captured from, if any.
    pub fn exec(&self) -> Option<&Exec> {
        match &*self.0 {
            Node::ExecOutput { exec, .. } => Some(exec),
            _ => None,
        }
    }

    /// Content identity of the whole description (xxh3 over the node tree).
    ///
    /// Equal descriptions always produce equal digests, across processes.
    pub fn digest(&self) -> u64 {
        let mut hasher = Xxh3::new();
        self.hash(&mut hasher);
        hasher.finish()
    }
}
