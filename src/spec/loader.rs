use crate::spec::schema::Spec;
use crate::validate::ValidationError;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// On-disk encodings a spec can be read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecFormat {
    Yaml,
    Json,
    Toml,
}

impl SpecFormat {
    /// Pick the format from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "yml" | "yaml" => Some(SpecFormat::Yaml),
            "json" => Some(SpecFormat::Json),
            "toml" => Some(SpecFormat::Toml),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SpecFormat::Yaml => "YAML",
            SpecFormat::Json => "JSON",
            SpecFormat::Toml => "TOML",
        }
    }
}

#[derive(Debug)]
pub enum SpecError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    UnsupportedFormat {
        path: PathBuf,
    },
    Yaml {
        path: Option<PathBuf>,
        source: serde_yaml::Error,
    },
    Json {
        path: Option<PathBuf>,
        source: serde_json::Error,
    },
    Toml {
        path: Option<PathBuf>,
        source: toml_edit::de::Error,
    },
    Validation {
        path: Option<PathBuf>,
        source: ValidationError,
    },
}

impl SpecError {
    fn with_path(self, path: &Path) -> Self {
        let path = Some(path.to_path_buf());
        match self {
            SpecError::Yaml { path: None, source } => SpecError::Yaml { path, source },
            SpecError::Json { path: None, source } => SpecError::Json { path, source },
            SpecError::Toml { path: None, source } => SpecError::Toml { path, source },
            SpecError::Validation { path: None, source } => SpecError::Validation { path, source },
            other => other,
        }
    }

    /// Validation issues, when the build spec parsed but failed its checks.
    pub fn validation(&self) -> Option<&ValidationError> {
        match self {
            SpecError::Validation { source, .. } => Some(source),
            _ => None,
        }
    }
}

fn write_parse_error(
    f: &mut fmt::Formatter<'_>,
    format: SpecFormat,
    path: &Option<PathBuf>,
    source: &dyn fmt::Display,
) -> fmt::Result {
    match path {
        Some(path) => write!(
            f,
            "failed to parse spec {} ({}): {}",
            format.as_str(),
            path.display(),
            source
        ),
        None => write!(f, "failed to parse spec {}: {}", format.as_str(), source),
    }
}

impl fmt::Display for SpecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpecError::Io { path, source } => {
                write!(f, "failed to read spec from {}: {}", path.display(), source)
            }
            SpecError::UnsupportedFormat { path } => write!(
                f,
                "cannot tell spec format of {} (expected .yml, .yaml, .json or .toml)",
                path.display()
            ),
            SpecError::Yaml { path, source } => write_parse_error(f, SpecFormat::Yaml, path, source),
            SpecError::Json { path, source } => write_parse_error(f, SpecFormat::Json, path, source),
            SpecError::Toml { path, source } => write_parse_error(f, SpecFormat::Toml, path, source),
            SpecError::Validation { path, source } => match path {
                Some(path) => write!(f, "invalid spec ({}):\n{}", path.display(), source),
                None => write!(f, "invalid spec:\n{}", source),
            },
        }
    }
}

impl std::error::Error for SpecError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SpecError::Io { source, .. } => Some(source),
            SpecError::UnsupportedFormat { .. } => None,
            SpecError::Yaml { source, .. } => Some(source),
            SpecError::Json { source, .. } => Some(source),
            SpecError::Toml { source, .. } => Some(source),
            SpecError::Validation { source, .. } => Some(source),
        }
    }
}

/// Decode and validate a spec.
///
/// Malformed directives are rejected while decoding; everything else is
/// checked afterwards and reported together.
pub fn load_from_str(input: &str, format: SpecFormat) -> Result<Spec, SpecError> {
    let spec: Spec = match format {
        SpecFormat::Yaml => serde_yaml::from_str(input)
            .map_err(|source| SpecError::Yaml { path: None, source })?,
        SpecFormat::Json => serde_json::from_str(input)
            .map_err(|source| SpecError::Json { path: None, source })?,
        SpecFormat::Toml => toml_edit::de::from_str(input)
            .map_err(|source| SpecError::Toml { path: None, source })?,
    };
    spec.validate()
        .map_err(|source| SpecError::Validation { path: None, source })?;
    Ok(spec)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<Spec, SpecError> {
    let path = path.as_ref();
    let format = SpecFormat::from_path(path).ok_or_else(|| SpecError::UnsupportedFormat {
        path: path.to_path_buf(),
    })?;
    let contents = fs::read_to_string(path).map_err(|source| SpecError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load_from_str(&contents, format).map_err(|error| error.with_path(path))
}
