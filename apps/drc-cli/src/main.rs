//! Batch DRC for OpenSilicon projects.
//!
//! ```bash
//! opensilicon-drc board.osproj.json --rules board.rules --severity warning
//! ```
//!
//! Exit status: 0 when no errors remain, 1 when error violations were found,
//! 2 when the project or rules could not be loaded (or saved), 3 when the run
//! was cancelled.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, ValueEnum};
use opensilicon_core::{to_mm, Board};
use opensilicon_drc::{
    BoardMarkersProvider, DrcEngine, DrcItem, LogProgressReporter, RcItemsProvider, RunStatus, Severity,
    SeverityMask,
};
use opensilicon_io::ProjectDocument;

const EXIT_ERRORS: u8 = 1;
const EXIT_LOAD_FAILED: u8 = 2;
const EXIT_CANCELLED: u8 = 3;

/// Run design rule checks on an OpenSilicon project
#[derive(Parser)]
#[command(name = "opensilicon-drc")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Project document to check
    project: PathBuf,

    /// Rule file (defaults to the project's configured rule file)
    #[arg(short, long)]
    rules: Option<PathBuf>,

    /// Lowest severity to list
    #[arg(short, long, default_value = "all")]
    severity: SeverityFilter,

    /// Print the results as JSON
    #[arg(long)]
    json: bool,

    /// Store the results as markers in the project document
    #[arg(long)]
    save: bool,

    /// Worker threads for parallel checks
    #[arg(long)]
    threads: Option<usize>,

    /// Stop reporting a violation kind after this many
    #[arg(long)]
    max_errors: Option<usize>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SeverityFilter {
    /// Errors only.
    Error,
    /// Errors and warnings.
    Warning,
    /// Everything, including exclusions.
    All,
}

impl SeverityFilter {
    fn mask(self) -> SeverityMask {
        match self {
            SeverityFilter::Error => SeverityMask::ERRORS,
            SeverityFilter::Warning => SeverityMask::ERRORS | SeverityMask::WARNINGS,
            SeverityFilter::All => SeverityMask::ALL,
        }
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match run(&cli) {
        Ok(code) => code,
        Err(err) => {
            log::error!("{err:#}");
            ExitCode::from(EXIT_LOAD_FAILED)
        }
    }
}

/// The rule file named on the command line, or the project's, relative to the project.
fn rule_file(cli: &Cli, doc: &ProjectDocument) -> Option<PathBuf> {
    if let Some(path) = &cli.rules {
        return Some(path.clone());
    }
    let configured = doc.drc_settings.rule_file.as_ref()?;
    let base = cli.project.parent().unwrap_or(Path::new("."));
    Some(base.join(configured))
}

fn load(cli: &Cli) -> Result<(ProjectDocument, DrcEngine, Arc<Board>)> {
    let mut doc = ProjectDocument::load(&cli.project)
        .with_context(|| format!("loading project {}", cli.project.display()))?;
    if cli.threads.is_some() {
        doc.drc_settings.worker_threads = cli.threads;
    }
    if cli.max_errors.is_some() {
        doc.drc_settings.max_errors_per_code = cli.max_errors;
    }
    let rules = rule_file(cli, &doc);

    let board = Arc::new(std::mem::replace(&mut doc.board, Board::new("")));
    let mut engine = DrcEngine::new(Arc::clone(&board), doc.drc_settings.clone())
        .with_progress(Arc::new(LogProgressReporter));
    if let Some(path) = rules {
        engine
            .load_rules(&path)
            .with_context(|| format!("loading rules {}", path.display()))?;
    }
    engine.compile_rules().context("compiling rules")?;
    Ok((doc, engine, board))
}

fn run(cli: &Cli) -> Result<ExitCode> {
    let (mut doc, mut engine, board) = load(cli)?;

    let report = engine.run_tests()?;
    drop(engine);
    doc.board = Arc::try_unwrap(board).map_err(|_| anyhow!("board is still shared after the run"))?;
    doc.markers.replace_with_run(report.items.iter().cloned());

    let mut view = BoardMarkersProvider::new(&mut doc.markers, &doc.drc_settings);
    view.set_severities(cli.severity.mask());
    let shown: Vec<DrcItem> = (0..view.count(None)).filter_map(|i| view.item(i)).collect();
    let errors = view.count(Some(Severity::Error));

    if cli.json {
        let output = serde_json::json!({
            "status": report.status,
            "summary": report.summary(),
            "providers_run": report.providers_run,
            "tests_not_run": report.tests_not_run,
            "items": shown,
        });
        let text = serde_json::to_string_pretty(&output)?;
        println!("{text}");
    } else {
        for item in &shown {
            println!("{}", describe(item));
        }
        println!("{}", report.summary());
    }

    if cli.save {
        doc.save(&cli.project)
            .with_context(|| format!("saving project {}", cli.project.display()))?;
    }

    Ok(match report.status {
        RunStatus::Cancelled => ExitCode::from(EXIT_CANCELLED),
        RunStatus::Complete if errors > 0 => ExitCode::from(EXIT_ERRORS),
        RunStatus::Complete => ExitCode::SUCCESS,
    })
}

fn describe(item: &DrcItem) -> String {
    format!(
        "[{}] {} @ ({:.4}, {:.4}) mm",
        item.severity,
        item.display_text(),
        to_mm(item.location.x),
        to_mm(item.location.y)
    )
}
