use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use reconcile_engine::{ReconcileConfig, Reconciler};
use reconcile_protocol::Mode;
use serde::Serialize;
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::process::ExitCode;

mod flags;
mod report;

use flags::{LayoutFlag, SchemaKind};
use report::{render_index, render_run, IndexOutput, RunOutput};

/// Exit status for faults, including command-line usage errors.
const EXIT_FAULT: u8 = 1;

/// Exit status when a run completed but some document could not be read or
/// some action failed.
const EXIT_PARTIAL: u8 = 2;

fn print_stdout(text: &str) -> Result<()> {
    use std::io::Write;

    let mut stdout = io::stdout().lock();
    if let Err(err) = stdout
        .write_all(text.as_bytes())
        .and_then(|_| stdout.write_all(b"\n"))
        .and_then(|_| stdout.flush())
    {
        if err.kind() == io::ErrorKind::BrokenPipe {
            return Ok(());
        }
        return Err(err.into());
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    print_stdout(&serde_json::to_string_pretty(value)?)
}

#[derive(Parser)]
#[command(name = "asm-reconcile")]
#[command(about = "Keep INCLUDE_ASM placeholders in sync with routine files", long_about = None)]
#[command(version)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    // Used when no subcommand is given.
    #[command(flatten)]
    preview: ReconcileArgs,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors
    #[arg(long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show what a commit would change, without writing anything (default)
    Preview(ReconcileArgs),

    /// Apply the planned corrections
    Commit(CommitArgs),

    /// List indexed artifacts and index warnings
    Index(IndexArgs),

    /// Print the JSON schema of a report
    Schema(SchemaArgs),
}

#[derive(Args)]
struct ProjectArgs {
    /// Project root
    #[arg(default_value = ".")]
    path: PathBuf,

    /// Configuration file (default: <ROOT>/asm-reconcile.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Source subtree, relative to the project root
    #[arg(long)]
    source_dir: Option<PathBuf>,

    /// Artifact subtree, relative to the project root
    #[arg(long)]
    artifact_dir: Option<PathBuf>,
}

#[derive(Args)]
struct ReconcileArgs {
    #[command(flatten)]
    project: ProjectArgs,

    /// Comment out directives with no matching artifact instead of rejecting them
    #[arg(long)]
    comment_orphans: bool,

    /// Required artifact layout; plans a migration when not `any`
    #[arg(long, value_enum)]
    layout: Option<LayoutFlag>,

    /// Remove originals once their layout copy is in place
    #[arg(long)]
    remove_originals: bool,

    /// Output JSON (stdout is reserved for the report)
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct CommitArgs {
    #[command(flatten)]
    run: ReconcileArgs,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    yes: bool,
}

#[derive(Args)]
struct IndexArgs {
    #[command(flatten)]
    project: ProjectArgs,

    /// Output JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct SchemaArgs {
    /// Which report to describe
    #[arg(value_enum, default_value = "report")]
    kind: SchemaKind,
}

pub fn main_entry() -> Result<ExitCode> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // Help and version go to stdout and are not failures.
            let code = if err.use_stderr() { EXIT_FAULT } else { 0 };
            err.print()?;
            return Ok(ExitCode::from(code));
        }
    };
    let command = cli.command.unwrap_or(Commands::Preview(cli.preview));

    // Keep stdout clean for JSON consumers.
    let json_output = match &command {
        Commands::Preview(args) => args.json,
        Commands::Commit(args) => args.run.json,
        Commands::Index(args) => args.json,
        Commands::Schema(_) => true,
    };

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet || json_output {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    match command {
        Commands::Preview(args) => run_preview(&args),
        Commands::Commit(args) => run_commit(&args),
        Commands::Index(args) => run_index(&args),
        Commands::Schema(args) => run_schema(&args),
    }
}

fn load_config(project: &ProjectArgs) -> Result<(PathBuf, ReconcileConfig)> {
    let root = project
        .path
        .canonicalize()
        .with_context(|| format!("Project root {} is not accessible", project.path.display()))?;

    let mut config = match &project.config {
        Some(path) => ReconcileConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => ReconcileConfig::discover(&root).context("Failed to load project config")?,
    };
    if let Some(dir) = &project.source_dir {
        config.source_dir = dir.clone();
    }
    if let Some(dir) = &project.artifact_dir {
        config.artifact_dir = dir.clone();
    }
    Ok((root, config))
}

fn build_reconciler(args: &ReconcileArgs) -> Result<Reconciler> {
    let (root, mut config) = load_config(&args.project)?;
    if args.comment_orphans {
        config.comment_orphans = true;
    }
    if let Some(layout) = args.layout {
        config.artifact_layout = layout.as_domain();
    }
    if args.remove_originals {
        config.remove_originals = true;
    }
    Reconciler::new(&root, config).context("Invalid configuration")
}

fn finish(args: &ReconcileArgs, out: &RunOutput) -> Result<ExitCode> {
    if args.json {
        print_json(out)?;
    } else {
        print_stdout(render_run(out).trim_end())?;
    }
    if out.is_partial() {
        Ok(ExitCode::from(EXIT_PARTIAL))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

fn run_preview(args: &ReconcileArgs) -> Result<ExitCode> {
    let reconciler = build_reconciler(args)?;
    let snapshot = reconciler.snapshot().context("Failed to scan project")?;
    let plan = reconciler.plan(&snapshot);
    let execution = reconciler.apply(&plan, Mode::Simulate);
    let out = RunOutput::new(reconciler.root(), &snapshot, plan, execution);
    finish(args, &out)
}

fn run_commit(args: &CommitArgs) -> Result<ExitCode> {
    let reconciler = build_reconciler(&args.run)?;
    let snapshot = reconciler.snapshot().context("Failed to scan project")?;
    let plan = reconciler.plan(&snapshot);

    if !plan.is_empty() && !args.yes {
        let preview = reconciler.apply(&plan, Mode::Simulate);
        let preview = RunOutput::new(reconciler.root(), &snapshot, plan.clone(), preview);
        eprintln!("{}", render_run(&preview).trim_end());

        if !io::stdin().is_terminal() {
            anyhow::bail!("Refusing to commit without confirmation; pass --yes to skip the prompt");
        }
        let destructive = if plan.has_destructive_actions() {
            " (includes file removals)"
        } else {
            ""
        };
        let confirmed = dialoguer::Confirm::new()
            .with_prompt(format!("Apply {} action(s){destructive}?", plan.actions.len()))
            .default(false)
            .interact()
            .context("Failed to read confirmation")?;
        if !confirmed {
            log::info!("Commit cancelled; nothing was written");
            return Ok(ExitCode::SUCCESS);
        }
    }

    let execution = reconciler.apply(&plan, Mode::Commit);
    let out = RunOutput::new(reconciler.root(), &snapshot, plan, execution);
    finish(&args.run, &out)
}

fn run_index(args: &IndexArgs) -> Result<ExitCode> {
    let (root, config) = load_config(&args.project)?;
    let reconciler = Reconciler::new(&root, config).context("Invalid configuration")?;
    let index = reconciler.build_index().context("Failed to index artifacts")?;
    let out = IndexOutput::new(&root, &index);
    if args.json {
        print_json(&out)?;
    } else {
        print_stdout(render_index(&out).trim_end())?;
    }
    Ok(ExitCode::SUCCESS)
}

fn run_schema(args: &SchemaArgs) -> Result<ExitCode> {
    let schema = match args.kind {
        SchemaKind::Report => schemars::schema_for!(RunOutput),
        SchemaKind::Index => schemars::schema_for!(IndexOutput),
    };
    print_json(&schema)?;
    Ok(ExitCode::SUCCESS)
}
