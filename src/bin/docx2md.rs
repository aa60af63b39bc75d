//! CLI binary for docx2md.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ConversionConfig`, drives a [`Session`], and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use docx2md::export::{copy_to_clipboard, write_markdown_file};
use docx2md::{
    convert, inspect, parse_dropped_paths, ConversionConfig, ConversionStats, ProgressObserver,
    ProgressSink, Session, EXPORT_FILE_NAME, EXPORT_MIME,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress observer using indicatif ────────────────────────────────────

/// Terminal renderer for the synthetic progress ticker: a percent bar that
/// appears on start, follows the cosmetic advances, and clears itself when
/// the conversion settles either way.
struct CliProgressObserver {
    bar: ProgressBar,
}

impl CliProgressObserver {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(100);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}%",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Converting");
        Arc::new(Self { bar })
    }
}

impl ProgressObserver for CliProgressObserver {
    fn on_start(&self) {
        self.bar.enable_steady_tick(Duration::from_millis(80));
    }

    fn on_advance(&self, percent: f32) {
        self.bar.set_position(percent.round() as u64);
    }

    fn on_finish(&self) {
        self.bar.finish_and_clear();
    }

    fn on_fail(&self) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Basic conversion (stdout)
  docx2md report.docx

  # Convert to a file
  docx2md report.docx -o notes/document.md

  # Copy the result to the clipboard
  docx2md report.docx --copy

  # YAML front matter from the document's core properties
  docx2md report.docx --include-metadata -o document.md

  # Machine-readable envelope
  docx2md report.docx --json > result.json

  # Document facts without converting
  docx2md report.docx --inspect-only

  # Treat the "Listing" paragraph style as code
  docx2md report.docx --code-style Listing

  # No argument on a terminal: prompts for a dropped path
  docx2md

ENVIRONMENT VARIABLES:
  DOCX2MD_OUTPUT       Default output path for -o
  DOCX2MD_NO_PROGRESS  Disable the progress bar
  RUST_LOG             Tracing filter override (e.g. docx2md=debug)

NOTES:
  Every embedded image is inlined as a data: URL, so the output is one
  self-contained Markdown string with no sidecar files.
  Without -o the export file is named document.md
  (media type text/markdown;charset=utf-8).
"#;

/// Convert DOCX files to clean, self-contained Markdown.
#[derive(Parser, Debug)]
#[command(
    name = "docx2md",
    version,
    about = "Convert DOCX files to clean, self-contained Markdown",
    long_about = "Convert DOCX documents to Markdown entirely in-process: the WordprocessingML \
package is decoded directly (no LibreOffice, no pandoc) and every embedded image is inlined \
as a data: URL, so the result is a single self-contained string.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Path to a .docx file. Omit it on a terminal to get a drop-zone
    /// prompt.
    input: Option<PathBuf>,

    /// Write Markdown to this file instead of stdout.
    #[arg(short, long, env = "DOCX2MD_OUTPUT")]
    output: Option<PathBuf>,

    /// Also copy the Markdown to the system clipboard.
    #[arg(long)]
    copy: bool,

    /// Prepend YAML front matter with title/creator/modified.
    #[arg(long, env = "DOCX2MD_METADATA")]
    include_metadata: bool,

    /// Paragraph style id to treat as a code block, on top of the built-in
    /// set (repeatable).
    #[arg(long = "code-style", value_name = "STYLE")]
    code_styles: Vec<String>,

    /// Output a structured JSON envelope instead of Markdown.
    #[arg(long, env = "DOCX2MD_JSON")]
    json: bool,

    /// Print document facts only, no conversion.
    #[arg(long)]
    inspect_only: bool,

    /// Disable the progress bar.
    #[arg(long, env = "DOCX2MD_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DOCX2MD_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "DOCX2MD_QUIET")]
    quiet: bool,
}

/// JSON envelope for `--json` runs.
#[derive(Serialize)]
struct JsonEnvelope<'a> {
    markdown: &'a str,
    image_count: usize,
    export_file_name: &'a str,
    export_mime: &'a str,
    stats: &'a ConversionStats,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active; the
    // bar provides the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Resolve input ────────────────────────────────────────────────────
    let input = match cli.input.clone() {
        Some(path) => path,
        None => prompt_for_drop()?,
    };

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let info = inspect(&input).await.context("Failed to inspect DOCX")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&info).context("Failed to serialize document facts")?
            );
        } else {
            println!("File:        {}", input.display());
            if let Some(ref t) = info.title {
                println!("Title:       {t}");
            }
            if let Some(ref c) = info.creator {
                println!("Creator:     {c}");
            }
            if let Some(ref m) = info.modified {
                println!("Modified:    {m}");
            }
            println!("Paragraphs:  {}", info.paragraph_count);
            println!("Tables:      {}", info.table_count);
            println!("Images:      {}", info.image_count);
        }
        return Ok(());
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress: Option<ProgressSink> = if show_progress {
        Some(CliProgressObserver::new() as Arc<dyn ProgressObserver>)
    } else {
        None
    };
    let config = build_config(&cli, progress)?;

    // ── JSON mode: plain library call, machine-readable envelope ─────────
    if cli.json {
        let output = convert(&input, &config).await.context("Conversion failed")?;
        if let Some(ref out) = cli.output {
            write_markdown_file(&output.markdown, out)
                .await
                .context("Failed to write output file")?;
        }
        if cli.copy {
            copy_to_clipboard(&output.markdown)
                .await
                .context("Clipboard export failed")?;
        }
        let envelope = JsonEnvelope {
            markdown: &output.markdown,
            image_count: output.stats.inlined_images,
            export_file_name: EXPORT_FILE_NAME,
            export_mime: EXPORT_MIME,
            stats: &output.stats,
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&envelope).context("Failed to serialise output")?
        );
        return Ok(());
    }

    // ── Interactive mode: drive a session ────────────────────────────────
    let mut session = Session::new(config);
    session.select_file(&input);
    let markdown = session.convert().await?.to_owned();

    if cli.copy {
        session.copy_to_clipboard().await?;
        if !cli.quiet {
            eprintln!("{} Copied to clipboard", green("✔"));
        }
    }

    if cli.output.is_some() {
        let written = session.export_file(cli.output.as_deref()).await?;
        if !cli.quiet {
            eprintln!(
                "{} {}  →  {}",
                green("✔"),
                dim(&format!("{} bytes", markdown.len())),
                bold(&written.display().to_string())
            );
        }
    } else {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(markdown.as_bytes())
            .context("Failed to write to stdout")?;
        // Ensure a trailing newline on stdout.
        if !markdown.ends_with('\n') {
            handle.write_all(b"\n").ok();
        }
    }

    Ok(())
}

/// Map CLI args to `ConversionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressSink>) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder().include_metadata(cli.include_metadata);
    for style in &cli.code_styles {
        builder = builder.code_block_style(style.clone());
    }
    if let Some(observer) = progress {
        builder = builder.progress_observer(observer);
    }
    builder.build().context("Invalid configuration")
}

/// The CLI's drop zone: prompt on stderr, read one line, take the first
/// path on it.
fn prompt_for_drop() -> Result<PathBuf> {
    if !io::stdin().is_terminal() {
        anyhow::bail!("No input file given and stdin is not a terminal.\nUsage: docx2md <FILE>");
    }
    eprint!(
        "{} {} ",
        cyan("◆"),
        bold("Drop a .docx file here (or type a path), then press Enter:")
    );
    io::stderr().flush().ok();

    let mut line = String::new();
    io::stdin()
        .read_line(&mut line)
        .context("Failed to read from stdin")?;

    let mut paths = parse_dropped_paths(&line);
    if paths.len() > 1 {
        eprintln!("{}", dim(&format!("{} files dropped; taking the first", paths.len())));
    }
    if paths.is_empty() {
        anyhow::bail!("No file path in the dropped input");
    }
    Ok(paths.remove(0))
}
