use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::error;
use tracing_subscriber::EnvFilter;

use fsdiff_common::{ChecksumStore, CompareStrategy, Config};
use fsdiff_core::operation::{ReasonKind, Value};
use fsdiff_core::tree::EnsureOptions;
use fsdiff_core::{
    collect_paths, compose, diff, ensure_tree_checksums, explain, load_from_with_cancel, print,
    LoadOptions, Operation, SidecarStore, TreeObserver, XattrStore,
};

#[derive(Parser)]
#[command(name = "fsdiff")]
#[command(version)]
#[command(about = "Compare two directory trees and describe the patch that transforms left into right", long_about = None)]
struct Cli {
    /// Left tree (the "before" side)
    left: PathBuf,

    /// Right tree (the "after" side)
    right: PathBuf,

    /// Comparison mode
    #[arg(long, value_enum, default_value_t = Mode::Accurate)]
    mode: Mode,

    /// Checksum algorithm for the checksum modes
    #[arg(long, default_value = "sha256")]
    algo: String,

    /// Extended-attribute key for cached checksums (e.g. user.sha256); empty disables
    #[arg(long, default_value = "")]
    xattr: String,

    /// Sidecar directory for cached checksums
    #[arg(long, alias = "checksum-cache-dir")]
    sidecar: Option<PathBuf>,

    /// Root for sidecar relative paths (defaults to the left tree)
    #[arg(long)]
    root: Option<PathBuf>,

    /// Populate checksums before diffing (checksum and checksum-ensure modes)
    #[arg(long)]
    precompute: bool,

    /// Case-insensitive comparison
    #[arg(long)]
    ci: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t = Format::Pretty)]
    format: Format,

    /// Exclude glob (doublestar semantics, repeatable)
    #[arg(long)]
    exclude: Vec<String>,

    /// Progress reporting on stderr
    #[arg(long, value_enum, default_value_t = Progress::Auto)]
    progress: Progress,

    /// Mask mtime from the accurate mode
    #[arg(long)]
    no_mtime: bool,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    Fast,
    Accurate,
    Checksum,
    ChecksumEnsure,
    ChecksumRequire,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Pretty,
    Tree,
    Json,
    Paths,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Progress {
    On,
    Off,
    Auto,
}

/// Spinner counters bumped from the walker; the spinner thread owned by
/// indicatif polls and redraws.
struct SpinnerObserver {
    bar: ProgressBar,
    files: AtomicU64,
    dirs: AtomicU64,
}

impl SpinnerObserver {
    fn new(bar: ProgressBar) -> Self {
        SpinnerObserver {
            bar,
            files: AtomicU64::new(0),
            dirs: AtomicU64::new(0),
        }
    }

    fn refresh(&self) {
        let files = self.files.load(Ordering::Relaxed);
        let dirs = self.dirs.load(Ordering::Relaxed);
        self.bar
            .set_message(format!("{} files, {} directories", files, dirs));
    }
}

impl TreeObserver for SpinnerObserver {
    fn on_file_done(&self, _path: &str) {
        let n = self.files.fetch_add(1, Ordering::Relaxed) + 1;
        if n % 64 == 0 {
            self.refresh();
        }
    }

    fn on_directory_visit(&self, _path: &str) {
        self.dirs.fetch_add(1, Ordering::Relaxed);
        self.refresh();
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    if let Err(message) = validate(&cli) {
        eprintln!("Error: {}", message);
        std::process::exit(2);
    }

    match run(cli) {
        Ok(()) => {}
        Err(err) => {
            error!("{}", err);
            eprintln!("Error: {}", err);
            std::process::exit(1);
        }
    }
}

fn validate(cli: &Cli) -> Result<(), String> {
    if !cli.left.is_dir() {
        return Err(format!("left path is not a directory: {}", cli.left.display()));
    }
    if !cli.right.is_dir() {
        return Err(format!(
            "right path is not a directory: {}",
            cli.right.display()
        ));
    }
    if cli.algo.is_empty() {
        return Err("--algo must not be empty".to_string());
    }
    Ok(())
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let root = cli.root.clone().unwrap_or_else(|| cli.left.clone());

    let mut stores: Vec<Arc<dyn ChecksumStore>> = Vec::new();
    if !cli.xattr.is_empty() {
        stores.push(Arc::new(XattrStore::new(&cli.xattr)));
    }
    if let Some(sidecar) = &cli.sidecar {
        stores.push(Arc::new(SidecarStore::new(sidecar, &root, &cli.algo)));
    }
    let store = compose(stores);

    let mut load = LoadOptions::default();
    if !cli.xattr.is_empty() {
        load.xattr_key = cli.xattr.clone();
        load.algorithm = cli.algo.clone();
    }

    let show_progress = match cli.progress {
        Progress::On => true,
        Progress::Off => false,
        Progress::Auto => std::io::stderr().is_terminal(),
    };

    let spinner = if show_progress {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {prefix} {msg}")
                .expect("static template"),
        );
        bar.set_prefix("scanning");
        bar.enable_steady_tick(std::time::Duration::from_millis(100));
        Some(SpinnerObserver::new(bar))
    } else {
        None
    };
    let observer = spinner
        .as_ref()
        .map(|spinner| spinner as &dyn TreeObserver);

    let mut left = load_from_with_cancel(&cli.left, &load, None, observer)?;
    let mut right = load_from_with_cancel(&cli.right, &load, None, observer)?;

    let mut config = match cli.mode {
        Mode::Fast => Config::fast(),
        Mode::Accurate => {
            if cli.no_mtime {
                Config::accurate_no_mtime()
            } else {
                Config::accurate()
            }
        }
        Mode::Checksum => Config::checksums(&cli.algo, store.clone()),
        Mode::ChecksumEnsure => Config::checksums_ensure(&cli.algo, store.clone()),
        Mode::ChecksumRequire => Config::checksums_strict(&cli.algo, store.clone()),
    };
    config.case_sensitive = !cli.ci;
    config.exclude_globs = cli.exclude.clone();

    if cli.precompute
        && store.is_some()
        && matches!(
            config.strategy,
            CompareStrategy::ChecksumPrefer | CompareStrategy::ChecksumEnsure
        )
    {
        if let Some(spinner) = &spinner {
            spinner.bar.set_prefix("hashing");
        }
        let ensure = EnsureOptions {
            algorithm: cli.algo.clone(),
            compute_if_missing: true,
            stream_from_disk: true,
            persist: true,
            store: store.as_deref(),
        };
        ensure_tree_checksums(&mut left, &ensure, None)?;
        ensure_tree_checksums(&mut right, &ensure, None)?;
    }

    if let Some(spinner) = &spinner {
        spinner.bar.set_prefix("comparing");
    }
    let result = diff(&left, &right, &config);
    if let Some(spinner) = &spinner {
        spinner.refresh();
        spinner.bar.finish_and_clear();
    }

    if let Some(reason) = incompatible_excludes(&result) {
        return Err(format!("incompatible exclude globs: {}", reason).into());
    }

    match cli.format {
        Format::Pretty => println!("{}", explain(&result)),
        Format::Tree => println!("{}", print(&result)),
        Format::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        Format::Paths => {
            for path in collect_paths(&result) {
                println!("{}", path);
            }
        }
    }
    Ok(())
}

/// A childless Because root means the two trees were filtered incompatibly
/// and the comparison was refused.
fn incompatible_excludes(op: &Operation) -> Option<String> {
    if let Value::Dir(dir) = &op.value {
        if let Some(reason) = &dir.reason {
            if reason.kind == ReasonKind::Because && op.relative_path == "." {
                return Some(fsdiff_core::explain::format_reason(reason));
            }
        }
    }
    None
}
