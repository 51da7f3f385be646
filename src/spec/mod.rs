//! The build spec: sources, their generators, and patches between them.

pub mod loader;
pub mod schema;

pub use loader::{load_from_path, load_from_str, SpecError, SpecFormat};
pub use schema::{
    PatchSpec, Source, SourceContext, SourceGenerator, SourceGit, SourceHttp, SourceLlb, Spec,
};
