//! wikibook - Wikipedia articles to EPUB

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::warn;
use tracing_subscriber::{EnvFilter, fmt, prelude::*, reload};

use wikibook::config::LogLevel;
use wikibook::export::inspect_epub;
use wikibook::pipeline::split_urls;
use wikibook::{Config, ContentSource, DirectoryDelivery, WikiClient, run_batch};

type ReloadHandle = reload::Handle<EnvFilter, tracing_subscriber::Registry>;

#[derive(Parser)]
#[command(name = "wikibook")]
#[command(version, about = "Convert Wikipedia articles to EPUB", long_about = None)]
#[command(after_help = "EXAMPLES:
    wikibook https://en.wikipedia.org/wiki/Ferris_wheel
    wikibook -o books URL1,URL2 URL3       Convert several articles
    wikibook --source html URL             Build the body from rendered HTML
    wikibook -i Ferris_wheel.epub          Show package contents")]
struct Cli {
    /// Article URLs; comma-separated lists are accepted
    #[arg(value_name = "URL", required_unless_present = "inspect")]
    urls: Vec<String>,

    /// Config file (default: ~/.wikibook.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Output directory
    #[arg(short, long, value_name = "DIR")]
    out: Option<PathBuf>,

    /// Where the article body comes from
    #[arg(long, value_name = "SOURCE")]
    source: Option<ContentSource>,

    /// Show the package structure of an EPUB instead of converting
    #[arg(short, long, value_name = "FILE", conflicts_with = "urls")]
    inspect: Option<PathBuf>,

    /// Only log warnings and errors; no summary
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Log debug detail
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let logging = init_logging(flag_level(&cli).unwrap_or_default());

    let result = match &cli.inspect {
        Some(path) => show_package(path).map(|()| true),
        None => convert(&cli, &logging),
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Installed subscriber; the filter follows the config unless pinned.
struct Logging {
    handle: ReloadHandle,
    /// `RUST_LOG` was set, so the config level is ignored.
    from_env: bool,
}

impl Logging {
    fn apply(&self, level: LogLevel) {
        if self.from_env {
            return;
        }
        if let Err(err) = self.handle.modify(|filter| *filter = level_filter(level)) {
            warn!(%level, "Failed to update log level from config: {err}");
        }
    }
}

fn level_filter(level: LogLevel) -> EnvFilter {
    EnvFilter::new(format!("wikibook={level}"))
}

fn init_logging(level: LogLevel) -> Logging {
    let (filter, from_env) = match EnvFilter::try_from_default_env() {
        Ok(filter) => (filter, true),
        Err(_) => (level_filter(level), false),
    };
    let (filter_layer, handle) = reload::Layer::new(filter);
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(filter_layer),
        )
        .init();
    Logging { handle, from_env }
}

/// Level forced by `-v` / `-q`.
fn flag_level(cli: &Cli) -> Option<LogLevel> {
    if cli.verbose {
        Some(LogLevel::Debug)
    } else if cli.quiet {
        Some(LogLevel::Warn)
    } else {
        None
    }
}

/// Returns whether every article succeeded.
fn convert(cli: &Cli, logging: &Logging) -> Result<bool> {
    let mut config = Config::load(cli.config.as_deref()).context("loading config")?;
    if let Some(dir) = &cli.out {
        config.output_dir = dir.clone();
    }
    if let Some(source) = cli.source {
        config.content_source = source;
    }
    if let Some(level) = flag_level(cli) {
        config.log_level = level;
    }
    logging.apply(config.log_level);
    config.validate().context("invalid configuration")?;

    let urls = split_urls(&cli.urls);
    if urls.is_empty() {
        bail!("no article URLs given");
    }

    let client = WikiClient::new(&config)?;
    let delivery = DirectoryDelivery::new(&config.output_dir);
    let outcomes = run_batch(&urls, &config, |url| client.for_url(url), &delivery);

    let failed = outcomes.iter().filter(|o| !o.is_success()).count();
    if !cli.quiet {
        for outcome in &outcomes {
            match &outcome.result {
                Ok(done) => println!(
                    "{} -> {} ({}/{} images)",
                    outcome.url,
                    config.output_dir.join(&done.filename).display(),
                    done.images_embedded,
                    done.images_total
                ),
                Err(e) => println!("{} failed: {e}", outcome.url),
            }
        }
        if outcomes.len() > 1 {
            println!("{} converted, {failed} failed", outcomes.len() - failed);
        }
    }

    Ok(failed == 0)
}

fn show_package(path: &Path) -> Result<()> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let summary = inspect_epub(BufReader::new(file))?;

    println!("File: {}", path.display());
    println!("Title: {}", summary.title);
    if let Some(creator) = &summary.creator {
        println!("Creator: {creator}");
    }
    println!("Language: {}", summary.language);
    println!("Identifier: {}", summary.identifier);
    if let Some(source) = &summary.source {
        println!("Source: {source}");
    }
    println!("Spine: {}", summary.spine.join(", "));
    println!("Manifest:");
    for item in &summary.manifest {
        match &item.properties {
            Some(props) => println!("  {:<14} {:<28} {} [{props}]", item.id, item.href, item.media_type),
            None => println!("  {:<14} {:<28} {}", item.id, item.href, item.media_type),
        }
    }
    println!("Images: {}", summary.images().count());

    for item in summary.dangling_manifest() {
        println!("warning: {} is declared but missing from the archive", item.href);
    }
    for id in summary.duplicate_ids() {
        println!("warning: duplicate manifest id {id}");
    }

    Ok(())
}
