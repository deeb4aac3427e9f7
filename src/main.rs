use anyhow::{Context, Result};
use bibscreen::logging::init_logging;
use bibscreen::prelude::*;
use bibscreen::report;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;

/// Environment variable naming a TOML file that overrides the defaults
const CONFIG_ENV: &str = "BIBSCREEN_CONFIG";

/// Type and keyword screening for BibTeX corpora
#[derive(Parser, Debug)]
#[command(name = "bibscreen")]
#[command(about = "Screen BibTeX corpora by entry type and keywords")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Drop entries of excluded types and entries without a title
    Types {
        /// Deduplicated input file
        #[arg(default_value = "non-duplicate.bib")]
        input: PathBuf,

        /// Output file
        #[arg(default_value = "filtered_nodup.bib")]
        output: PathBuf,
    },

    /// Keep entries mentioning at least one domain term and one quality term
    Keywords {
        /// Type-filtered input file
        #[arg(default_value = "filtered_nodup.bib")]
        input: PathBuf,

        /// Output file
        #[arg(default_value = "screened.bib")]
        output: PathBuf,

        /// CSV listing kept entries and their matched terms
        included_csv: Option<PathBuf>,

        /// CSV listing discarded entries and the reason
        excluded_csv: Option<PathBuf>,
    },

    /// Run the type filter, then the keyword screen on its output
    Run {
        /// Deduplicated input file
        #[arg(default_value = "non-duplicate.bib")]
        input: PathBuf,

        /// Intermediate type-filtered file
        #[arg(default_value = "filtered_nodup.bib")]
        filtered: PathBuf,

        /// Final screened file
        #[arg(default_value = "screened.bib")]
        screened: PathBuf,

        /// CSV listing kept entries and their matched terms
        included_csv: Option<PathBuf>,

        /// CSV listing discarded entries and the reason
        excluded_csv: Option<PathBuf>,
    },

    /// Print the default configuration as TOML
    Defaults,
}

fn load_config() -> Result<Config> {
    match std::env::var_os(CONFIG_ENV) {
        Some(path) => {
            let path = PathBuf::from(path);
            info!(path = %path.display(), "loading configuration");
            Config::load(&path)
                .with_context(|| format!("invalid configuration in {}", path.display()))
        }
        None => Ok(Config::default()),
    }
}

fn print_summary(report: &StageReport, output: &Path) {
    println!("[{}] processed {} entries.", report.stage, report.total());
    for (reason, count) in report.reason_counts() {
        println!("  removed {} ({})", count, reason);
    }
    if !report.warnings.is_empty() {
        println!("  {} missing-field warnings", report.warnings.len());
    }
    println!(
        "  kept {}, discarded {}. Written to {}",
        report.kept(),
        report.discarded(),
        output.display()
    );
}

fn run_types(config: &Config, input: &Path, output: &Path) -> Result<()> {
    let report = run_stage(input, output, &config.type_filter())
        .with_context(|| format!("type filter failed on {}", input.display()))?;
    print_summary(&report, output);
    Ok(())
}

/// Optional CSV listings written beside the screened file
#[derive(Debug, Clone, Copy)]
struct Reports<'a> {
    included: Option<&'a Path>,
    excluded: Option<&'a Path>,
}

impl Reports<'_> {
    fn stage(&self, report: &StageReport, writes: &mut PendingWrites) -> Result<()> {
        if let Some(path) = self.included {
            writes
                .stage(path, &report::included_csv(report)?)
                .with_context(|| format!("cannot write {}", path.display()))?;
        }
        if let Some(path) = self.excluded {
            writes
                .stage(path, &report::excluded_csv(report)?)
                .with_context(|| format!("cannot write {}", path.display()))?;
        }
        Ok(())
    }

    fn print(&self) {
        if let Some(path) = self.included {
            println!("  included CSV: {}", path.display());
        }
        if let Some(path) = self.excluded {
            println!("  excluded CSV: {}", path.display());
        }
    }
}

fn stage_output(
    writes: &mut PendingWrites,
    path: &Path,
    bibliography: &Bibliography,
) -> Result<()> {
    writes
        .stage(path, bibliography.to_bibtex().as_bytes())
        .with_context(|| format!("cannot write {}", path.display()))
}

fn run_keywords(
    config: &Config,
    input: &Path,
    output: &Path,
    reports: Reports<'_>,
) -> Result<()> {
    let screen = config.keyword_screen()?;
    let (screened, report) = screen_file(input, &screen)
        .with_context(|| format!("keyword screen failed on {}", input.display()))?;

    let mut writes = PendingWrites::new(Some(input));
    stage_output(&mut writes, output, &screened)?;
    reports.stage(&report, &mut writes)?;
    writes.commit()?;

    print_summary(&report, output);
    reports.print();
    Ok(())
}

/// Both stages in memory; outputs are only committed once everything is staged
fn run_pipeline(
    config: &Config,
    input: &Path,
    filtered: &Path,
    screened: &Path,
    reports: Reports<'_>,
) -> Result<()> {
    let screen = config.keyword_screen()?;
    let (mut bibliography, type_report) = screen_file(input, &config.type_filter())
        .with_context(|| format!("type filter failed on {}", input.display()))?;

    let mut writes = PendingWrites::new(Some(input));
    stage_output(&mut writes, filtered, &bibliography)?;

    let keyword_report = apply_filter(&mut bibliography, &screen);
    stage_output(&mut writes, screened, &bibliography)?;
    reports.stage(&keyword_report, &mut writes)?;
    writes.commit()?;

    print_summary(&type_report, filtered);
    print_summary(&keyword_report, screened);
    reports.print();
    Ok(())
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Command::Types { input, output } => {
            let config = load_config()?;
            run_types(&config, &input, &output)
        }
        Command::Keywords {
            input,
            output,
            included_csv,
            excluded_csv,
        } => {
            let config = load_config()?;
            let reports = Reports {
                included: included_csv.as_deref(),
                excluded: excluded_csv.as_deref(),
            };
            run_keywords(&config, &input, &output, reports)
        }
        Command::Run {
            input,
            filtered,
            screened,
            included_csv,
            excluded_csv,
        } => {
            let config = load_config()?;
            let reports = Reports {
                included: included_csv.as_deref(),
                excluded: excluded_csv.as_deref(),
            };
            run_pipeline(&config, &input, &filtered, &screened, reports)
        }
        Command::Defaults => {
            print!("{}", Config::default().to_toml()?);
            Ok(())
        }
    }
}
