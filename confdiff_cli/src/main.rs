use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use confdiff_common::{load_config, load_config_from, AppConfig, ColorMode, DiffSummary};
use confdiff_core::{
    AttrPath, DifferOptions, Differencer, DocumentEvaluator, DocumentFormat, Evaluator,
    OutputRenderer, Palette, Source, ValueId, ValueTree,
};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// Conventional status for a run stopped by SIGINT
const EXIT_INTERRUPTED: i32 = 130;

#[derive(Parser, Debug)]
#[command(name = "confdiff")]
#[command(author = "confdiff Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Structural diff of two configuration trees", long_about = None)]
struct Cli {
    /// Left document (file path, or document text with --expr)
    left: String,

    /// Right document (file path, or document text with --expr)
    right: String,

    /// Treat LEFT and RIGHT as document text instead of file paths
    #[arg(long)]
    expr: bool,

    /// Input format (default: from file extension, json for --expr)
    #[arg(short, long)]
    format: Option<DocumentFormat>,

    /// Attribute path to start diffing from (e.g. services.nginx)
    #[arg(short, long, default_value = "")]
    path: String,

    /// When to color the output
    #[arg(long, value_enum)]
    color: Option<ColorArg>,

    /// Context lines around each text hunk
    #[arg(short = 'U', long)]
    context: Option<usize>,

    /// Configuration file to use instead of the default location
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print run counters as JSON to stderr
    #[arg(long)]
    stats: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ColorArg {
    Auto,
    Always,
    Never,
}

impl From<ColorArg> for ColorMode {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => ColorMode::Auto,
            ColorArg::Always => ColorMode::Always,
            ColorArg::Never => ColorMode::Never,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    // Logs go to stderr so the diff on stdout stays clean
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();

    let cancel = Arc::new(AtomicBool::new(false));
    spawn_interrupt_listener(Arc::clone(&cancel));

    match run(cli, cancel) {
        Ok(summary) if summary.cancelled => std::process::exit(EXIT_INTERRUPTED),
        Ok(_) => {}
        Err(e) => {
            error!("Diff failed: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Raise `cancel` on Ctrl-C. The renderer checks it before every write.
fn spawn_interrupt_listener(cancel: Arc<AtomicBool>) {
    let spawned = std::thread::Builder::new()
        .name("interrupt".to_string())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(e) => {
                    warn!("Interrupt handling unavailable: {}", e);
                    return;
                }
            };
            runtime.block_on(async {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Interrupt received");
                    cancel.store(true, Ordering::SeqCst);
                }
            });
        });

    if let Err(e) = spawned {
        warn!("Failed to start interrupt listener: {}", e);
    }
}

fn run(cli: Cli, cancel: Arc<AtomicBool>) -> Result<DiffSummary> {
    let loaded = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    debug!(
        path = %loaded.path.display(),
        exists = loaded.exists,
        portable = loaded.portable,
        "Loaded configuration"
    );
    let config = apply_overrides(loaded.config, &cli);

    let path = AttrPath::parse(&cli.path)?;
    let evaluator = match cli.format {
        Some(format) => DocumentEvaluator::new().with_format(format),
        None => DocumentEvaluator::new(),
    };

    let left_source = build_source(&cli.left, cli.expr);
    let right_source = build_source(&cli.right, cli.expr);
    info!("Comparing {} with {}", left_source.describe(), right_source.describe());

    let (mut left, left_root) = load_side(&evaluator, &left_source, &path)?;
    let (mut right, right_root) = load_side(&evaluator, &right_source, &path)?;

    let stdout = std::io::stdout();
    let palette = Palette::for_mode(config.color, stdout.is_terminal());
    let mut renderer = OutputRenderer::new(stdout.lock(), palette).with_cancel(cancel);

    Differencer::new(&mut left, &mut right, &mut renderer, DifferOptions::from(&config))
        .run(&path, left_root, right_root);

    let summary = renderer.finish()?;
    if summary.is_empty() && !summary.cancelled {
        info!("No differences");
    }
    info!(
        changes = summary.changes,
        hunks = summary.hunks,
        cancelled = summary.cancelled,
        "Diff complete"
    );

    if cli.stats {
        eprintln!("{}", serde_json::to_string_pretty(&summary)?);
    }
    Ok(summary)
}

fn apply_overrides(mut config: AppConfig, cli: &Cli) -> AppConfig {
    if let Some(color) = cli.color {
        config.color = color.into();
    }
    if let Some(context) = cli.context {
        config.context_lines = context;
    }
    config
}

fn build_source(operand: &str, inline: bool) -> Source {
    if inline {
        Source::Inline(operand.to_string())
    } else {
        Source::File(PathBuf::from(operand))
    }
}

/// Evaluate one side and select the node at `path`.
fn load_side(
    evaluator: &DocumentEvaluator,
    source: &Source,
    path: &AttrPath,
) -> Result<(ValueTree, ValueId)> {
    let mut tree = evaluator
        .evaluate(source)
        .with_context(|| format!("Failed to evaluate {}", source.describe()))?;
    let root = tree
        .root()
        .with_context(|| format!("{} has no root value", source.describe()))?;
    let selected = tree
        .select(root, path)
        .with_context(|| format!("Failed to select '{}' in {}", path, source.describe()))?;
    Ok((tree, selected))
}
