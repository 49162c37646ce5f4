mod manifest;

use anyhow::{Context, Result};
use clap::Parser;
use log::warn;
use manifest::Manifest;
use sourcery_merge::{FileError, MergeConfig, RunReport, Runner, SourceFile};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "sourcery-merge")]
#[command(about = "Merge rendered template fragments into source files")]
struct Cli {
    /// Project manifest
    #[arg(short, long, default_value = "sourcery-merge.toml")]
    manifest: PathBuf,

    /// Spaces added to every auto-inserted block
    #[arg(long)]
    base_indentation: Option<usize>,

    /// Neither read nor write the fragment cache
    #[arg(long)]
    disable_cache: bool,

    /// Remove generated outputs that end up empty
    #[arg(long)]
    prune: bool,

    /// Report what would change without writing anything
    #[arg(long)]
    dry_run: bool,

    /// Log every merge decision
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    /// Apply command-line overrides on top of the manifest's settings.
    fn merge_config(&self, mut config: MergeConfig) -> MergeConfig {
        if let Some(spaces) = self.base_indentation {
            config = config.with_base_indentation(spaces);
        }
        if self.disable_cache {
            config = config.without_cache();
        }
        if self.prune {
            config.prune_empty_outputs = true;
        }
        config
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let report = run(&cli)?;
    print!("{}", report);

    if !report.success() {
        std::process::exit(report.exit_code());
    }
    Ok(())
}

fn run(cli: &Cli) -> Result<RunReport> {
    let manifest = Manifest::load(&cli.manifest)?;
    let base = cli.manifest.parent().unwrap_or_else(|| Path::new(""));
    let config = cli.merge_config(manifest.merge.clone());

    let declarations = manifest
        .declaration_manifest(base)
        .context("failed to load the declaration index")?;
    let templates = manifest.rendered_templates()?;

    let mut sources = Vec::new();
    let mut load_errors = Vec::new();
    for path in manifest.source_files()? {
        let specs = declarations.for_path(&path).unwrap_or(&[]);
        match SourceFile::load(&path, specs) {
            Ok(Some(source)) => sources.push(source),
            Ok(None) => {}
            Err(error) if error.kind() == "read" => {
                return Err(error).with_context(|| format!("failed to read {}", path.display()));
            }
            Err(error) => {
                warn!("{}: {}", path.display(), error);
                load_errors.push(FileError::new(path, error));
            }
        }
    }

    let mut report = Runner::new(&config, &manifest.output)
        .dry_run(cli.dry_run)
        .run(&sources, &templates);
    report.errors.extend(load_errors);
    Ok(report)
}
