/*!
 * Command-line interface for ctxcraft
 */

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{CommandFactory, Parser};
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use ctxcraft::config::{Args, Command, Config};
use ctxcraft::error::{Result, ResultExt};
use ctxcraft::refresh::StatusSink;
use ctxcraft::report::Reporter;
use ctxcraft::selection::JsonStateFile;
use ctxcraft::session::{Session, TreeItem};
use ctxcraft::types::{CheckState, EntryKind};
use ctxcraft::utils::{absolutize, format_file_size, format_status, relative_slash_path};

/// Spinner standing in for an editor status bar
struct ConsoleStatus {
    progress: ProgressBar,
}

impl ConsoleStatus {
    fn new() -> Self {
        let progress = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.green} {prefix:.bold.cyan} {wide_msg:.dim.white}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        progress.set_style(style);
        progress.set_prefix("📊 ctxcraft");
        Self { progress }
    }
}

impl StatusSink for ConsoleStatus {
    fn set_calculating(&self) {
        self.progress.enable_steady_tick(Duration::from_millis(100));
        self.progress.set_message("Calculating...");
    }

    fn update_counts(&self, files: usize, tokens: usize) {
        self.progress.finish_and_clear();
        eprintln!("✅ {}", format_status(files, tokens));
    }

    fn set_no_workspace(&self) {
        self.progress.finish_and_clear();
        eprintln!("⚠️ No workspace");
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_env("CTXCRAFT_LOG")
        .unwrap_or_else(|_| EnvFilter::new(format!("ctxcraft={}", level)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn marker(state: CheckState) -> &'static str {
    match state {
        CheckState::Checked => "[x]",
        CheckState::Partial => "[-]",
        CheckState::Unchecked => "[ ]",
    }
}

/// Path shown to the user: relative to its root when possible
fn display_path(session: &Session, path: &Path) -> String {
    session
        .root_for(path)
        .ok()
        .and_then(|root| {
            relative_slash_path(&root.path, path).map(|rel| {
                if session.roots().len() > 1 {
                    format!("{}/{}", root.name, rel)
                } else {
                    rel
                }
            })
        })
        .unwrap_or_else(|| path.display().to_string())
}

fn push_children(stack: &mut Vec<(PathBuf, EntryKind, usize)>, items: Vec<TreeItem>, level: usize) {
    // Reversed so the first child is popped first
    for item in items.into_iter().rev() {
        stack.push((item.path, item.kind, level));
    }
}

async fn print_tree(session: &Session, top: &Path, depth: usize) {
    println!("{} {}/", marker(session.check_state(top).await), top.display());

    let mut stack: Vec<(PathBuf, EntryKind, usize)> = Vec::new();
    push_children(&mut stack, session.children(top).await, 1);

    while let Some((path, kind, level)) = stack.pop() {
        let state = session.check_state(&path).await;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let suffix = if kind == EntryKind::Directory { "/" } else { "" };
        println!("{}{} {}{}", "  ".repeat(level), marker(state), name, suffix);

        if kind == EntryKind::Directory && level < depth {
            push_children(&mut stack, session.children(&path).await, level + 1);
        }
    }
}

async fn toggle_all(session: &Session, cwd: &Path, paths: &[PathBuf], checked: bool) -> Result<()> {
    for path in paths {
        let path = absolutize(path, cwd);
        let changed = session.toggle(&path, checked).await?;
        println!(
            "{} {}{}",
            marker(session.check_state(&path).await),
            display_path(session, &path),
            if changed { "" } else { " (unchanged)" }
        );
    }
    session.refresh().await;
    Ok(())
}

async fn run(args: Args) -> Result<()> {
    if let Command::Completions { shell } = args.command {
        clap_complete::generate(shell, &mut Args::command(), "ctxcraft", &mut io::stdout());
        return Ok(());
    }

    let cwd = std::env::current_dir().with_context(|| "Failed to read current directory")?;
    let config = Config::from_args(&args, &cwd);
    config.validate()?;

    let persistence = Arc::new(JsonStateFile::new(config.state_file.clone()));
    let session = Session::builder(config)
        .persistence(persistence)
        .sink(Arc::new(ConsoleStatus::new()))
        .build()?;
    let cancel = CancellationToken::new();
    let reporter = Reporter::new();

    match args.command {
        Command::Check { paths } => toggle_all(&session, &cwd, &paths, true).await?,
        Command::Uncheck { paths } => toggle_all(&session, &cwd, &paths, false).await?,
        Command::Clear => {
            if session.clear().await? {
                println!("Selection cleared");
            } else {
                println!("Nothing selected");
            }
        }
        Command::List { files } => {
            let paths = if files {
                session.resolve(&cancel).await
            } else {
                session.selected_paths().await
            };
            for path in &paths {
                println!("{}", display_path(&session, path));
            }
        }
        Command::Tree { path, depth } => match path {
            Some(path) => print_tree(&session, &absolutize(&path, &cwd), depth).await,
            None => {
                for root in session.roots() {
                    print_tree(&session, &root.path, depth).await;
                }
            }
        },
        Command::Status => {
            let report = session.report(&cancel).await;
            reporter.print_report(&report);
        }
        Command::Export { output } => {
            let started = Instant::now();
            let export = session.export(&cancel).await?;
            match output {
                Some(output) => {
                    let output = absolutize(&output, &cwd);
                    tokio::fs::write(&output, export.xml.as_bytes())
                        .await
                        .with_context(|| format!("Failed to write {}", output.display()))?;
                    let mut report = export.report;
                    report.output = Some(format!(
                        "{} ({})",
                        output.display(),
                        format_file_size(export.xml.len() as u64)
                    ));
                    report.duration = started.elapsed();
                    reporter.print_report(&report);
                }
                None => print!("{}", export.xml),
            }
        }
        Command::GitChanges { seed } => {
            if seed {
                let seeded = session.seed_from_git().await?;
                println!(
                    "Selected {} changed paths ({} missing, {} outside the workspace)",
                    seeded.added, seeded.missing, seeded.outside
                );
                session.refresh().await;
            } else {
                for path in session.git_changes().await? {
                    println!("{}", display_path(&session, &path));
                }
            }
        }
        Command::Rm { path } => {
            let path = absolutize(&path, &cwd);
            session.delete_path(&path).await?;
            println!("Deleted {}", path.display());
        }
        Command::Mv { from, to } => {
            let from = absolutize(&from, &cwd);
            let to = absolutize(&to, &cwd);
            session.rename_path(&from, &to).await?;
            println!("Renamed {} to {}", from.display(), to.display());
        }
        Command::Completions { .. } => {}
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_tracing(args.verbose);

    if let Err(e) = run(args).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
