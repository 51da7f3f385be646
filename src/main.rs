use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use gomod_patcher::gomod::GitCredentialHelper;
use gomod_patcher::graph::{Constraints, State};
use gomod_patcher::preprocess::{preprocess, render_patch_script, PatchRequest, SandboxInputs};
use gomod_patcher::spec::{load_from_path, Spec, SpecError, SpecFormat};
use similar::{ChangeTag, TextDiff};
use std::env;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use walkdir::WalkDir;

const DEFAULT_WORKER: &str = "docker.io/library/golang:1.23";

#[derive(Parser)]
#[command(name = "gomod-patcher")]
#[command(about = "Generate go.mod/go.sum patches for package build specs", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate spec files (directories are scanned one level deep)
    Validate {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Generate gomod patch sources for a spec
    Preprocess {
        /// Spec file (.yml, .yaml, .json or .toml)
        spec: PathBuf,

        /// Toolchain image the sandbox runs in (defaults to $GOMOD_PATCHER_WORKER)
        #[arg(long)]
        worker: Option<String>,

        /// Image providing the git credential helper binary
        #[arg(long)]
        frontend: Option<String>,

        /// Target platform, e.g. linux/arm64
        #[arg(long)]
        platform: Option<String>,

        /// Print the generated patch sources as JSON
        #[arg(long)]
        json: bool,

        /// Show how preprocessing changed the build spec
        #[arg(short, long)]
        diff: bool,
    },

    /// Print the sandbox script of one generator
    Script {
        spec: PathBuf,

        #[arg(short, long)]
        source: String,

        /// Generator index within the source
        #[arg(short, long, default_value_t = 0)]
        generator: usize,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_writer(std::io::stderr),
        )
        .init();

    match cli.command {
        Commands::Validate { paths } => cmd_validate(paths),

        Commands::Preprocess {
            spec,
            worker,
            frontend,
            platform,
            json,
            diff,
        } => cmd_preprocess(&spec, worker, frontend, platform, json, diff),

        Commands::Script {
            spec,
            source,
            generator,
        } => cmd_script(&spec, &source, generator),
    }
}

/// Expand directories into the build spec files directly inside them.
fn collect_spec_files(paths: Vec<PathBuf>) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for path in paths {
        if !path.is_dir() {
            files.push(path);
            continue;
        }

        let mut found = Vec::new();
        for entry in WalkDir::new(&path).max_depth(1) {
            let entry = entry?;
            if entry.file_type().is_file() && SpecFormat::from_path(entry.path()).is_some() {
                found.push(entry.path().to_path_buf());
            }
        }
        found.sort();

        if found.is_empty() {
            eprintln!(
                "{}",
                format!("Warning: no spec files found in {}", path.display()).yellow()
            );
        }
        files.extend(found);
    }

    if files.is_empty() {
        anyhow::bail!("No spec files to validate");
    }
    Ok(files)
}

/// Resolve the toolchain image: flag, then environment, then the default.
fn resolve_worker(cli_worker: Option<String>) -> String {
    cli_worker
        .or_else(|| env::var("GOMOD_PATCHER_WORKER").ok().filter(|w| !w.is_empty()))
        .unwrap_or_else(|| DEFAULT_WORKER.to_string())
}

/// Render the user-declarable part of a spec; generated sources only exist as graph states.
fn declared_yaml(spec: &Spec) -> Result<String> {
    let mut declared = spec.clone();
    declared.sources.retain(|_, source| source.llb.is_none());
    Ok(serde_yaml::to_string(&declared)?)
}

/// Helper: Show unified diff between original and modified content
fn display_diff(file: &Path, original: &str, modified: &str) {
    println!(
        "\n{}",
        format!("--- {} (original)", file.display()).dimmed()
    );
    println!("{}", format!("+++ {} (preprocessed)", file.display()).dimmed());

    let diff = TextDiff::from_lines(original, modified);

    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => format!("-{}", change).red(),
            ChangeTag::Insert => format!("+{}", change).green(),
            ChangeTag::Equal => format!(" {}", change).normal(),
        };
        print!("{}", sign);
    }
}

fn cmd_validate(paths: Vec<PathBuf>) -> Result<()> {
    let files = collect_spec_files(paths)?;

    let mut valid = 0;
    let mut invalid = 0;

    for file in files {
        match load_from_path(&file) {
            Ok(spec) => {
                let gomod = spec.gomod_sources().len();
                println!(
                    "{} {}: {} sources, {} with gomod edits",
                    "✓".green(),
                    file.display(),
                    spec.sources.len(),
                    gomod
                );
                valid += 1;
            }
            Err(SpecError::Validation { source, .. }) => {
                eprintln!(
                    "{} {}: {} issue(s)",
                    "✗".red(),
                    file.display(),
                    source.issues.len()
                );
                for issue in &source.issues {
                    eprintln!("  - {}", issue);
                }
                invalid += 1;
            }
            Err(e) => {
                eprintln!("{} {}: {}", "✗".red(), file.display(), e);
                invalid += 1;
            }
        }
    }

    println!();
    println!("{}", "Summary:".bold());
    println!("  {} valid", format!("{}", valid).green());
    println!("  {} invalid", format!("{}", invalid).red());

    if invalid > 0 {
        std::process::exit(1);
    }

    Ok(())
}

fn cmd_preprocess(
    spec_path: &Path,
    worker: Option<String>,
    frontend: Option<String>,
    platform: Option<String>,
    json: bool,
    show_diff: bool,
) -> Result<()> {
    let mut spec = load_from_path(spec_path)?;
    let before = if show_diff {
        Some(declared_yaml(&spec)?)
    } else {
        None
    };

    let worker = resolve_worker(worker);
    let mut inputs = SandboxInputs::new(State::image(worker.as_str()));
    if let Some(frontend) = frontend {
        inputs = inputs.with_credential_helper(GitCredentialHelper::new(State::image(frontend)));
    }
    if let Some(platform) = platform {
        inputs = inputs.with_constraints(Constraints::with_platform(platform));
    }

    let generated = preprocess(&mut spec, &inputs)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&generated)?);
        return Ok(());
    }

    println!("Spec: {}", spec_path.display());
    println!("Worker: {}", worker);
    println!();

    if generated.is_empty() {
        println!("{} No gomod edits; nothing to generate", "⊘".cyan());
    }
    for patch in &generated {
        println!(
            "{} {} [generator {}] -> {} ({:016x})",
            "✓".green(),
            patch.source,
            patch.generator,
            patch.patch_source,
            patch.state.digest()
        );
    }

    if let Some(before) = before {
        let after = declared_yaml(&spec)?;
        if before != after {
            display_diff(spec_path, &before, &after);
        }
    }

    println!();
    println!("{}", "Summary:".bold());
    println!(
        "  {} patch source(s) generated",
        format!("{}", generated.len()).green()
    );

    Ok(())
}

fn cmd_script(spec_path: &Path, source_name: &str, generator_index: usize) -> Result<()> {
    let spec = load_from_path(spec_path)?;

    let Some(source) = spec.sources.get(source_name) else {
        anyhow::bail!(
            "Source '{}' not found in {}",
            source_name,
            spec_path.display()
        );
    };
    let Some(generator) = source.generate.get(generator_index) else {
        anyhow::bail!(
            "Source '{}' has {} generator(s); index {} is out of range",
            source_name,
            source.generate.len(),
            generator_index
        );
    };

    let base = State::scratch();
    let request = PatchRequest {
        source_name,
        generator_index,
        generator,
        base: &base,
    };

    match render_patch_script(&request)? {
        Some(script) => print!("{}", script),
        None => eprintln!(
            "{} {} [generator {}]: no gomod edits",
            "⊘".cyan(),
            source_name,
            generator_index
        ),
    }

    Ok(())
}
