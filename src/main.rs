// =============================================================================
// Strength Scanner — Main Entry Point
// =============================================================================
//
//   strength-scanner analyze 2330 2317 [--json]   full report per symbol
//   strength-scanner screen [--json]              whole-market screen
//   strength-scanner config init [PATH]           write a default config file
//   strength-scanner                              prompt for symbols
//
// The market-data session is set up in the background as soon as the process
// starts, so the interactive prompt and the connection overlap.  Reports go
// to stdout; logs go to stderr.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod analysis;
mod indicators;
mod market_data;
mod microstructure;
mod overview;
mod report;
mod runtime_config;
mod scoring;
mod screener;
mod session;
mod types;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Serialize;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::analysis::{analyze_symbol, SymbolAnalysis};
use crate::overview::{market_overview, MarketOverview};
use crate::runtime_config::{ScannerConfig, DEFAULT_CONFIG_PATH};
use crate::session::Session;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Analyze(Vec<String>),
    Screen,
    InitConfig(PathBuf),
    Interactive,
    Help,
}

/// `--json` output of an analyze run.
#[derive(Debug, Serialize)]
struct AnalyzeOutput<'a> {
    market: Option<&'a MarketOverview>,
    analyses: &'a [SymbolAnalysis],
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Cli {
    command: Command,
    json: bool,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Cli> {
    let mut json = false;
    let mut positional = Vec::new();
    for arg in args {
        match arg.as_str() {
            "--json" => json = true,
            "-h" | "--help" => {
                return Ok(Cli {
                    command: Command::Help,
                    json,
                })
            }
            flag if flag.starts_with("--") => bail!("unknown flag {flag}"),
            _ => positional.push(arg),
        }
    }

    let command = match positional.split_first() {
        None => Command::Interactive,
        Some((cmd, rest)) => match cmd.as_str() {
            "analyze" if rest.is_empty() => bail!("analyze needs at least one symbol"),
            "analyze" => Command::Analyze(normalize_symbols(rest.iter().map(String::as_str))),
            "screen" if rest.is_empty() => Command::Screen,
            "screen" => bail!("screen takes no arguments"),
            "config" => match rest {
                [sub] if sub == "init" => Command::InitConfig(PathBuf::from(DEFAULT_CONFIG_PATH)),
                [sub, path] if sub == "init" => Command::InitConfig(PathBuf::from(path)),
                _ => bail!("usage: config init [PATH]"),
            },
            "help" => Command::Help,
            other => bail!("unknown command {other}"),
        },
    };
    Ok(Cli { command, json })
}

/// Split on whitespace and commas, upper-case, drop blanks and duplicates.
fn normalize_symbols<'a>(raw: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for token in raw.flat_map(|s| s.split(|c: char| c == ',' || c.is_whitespace())) {
        let symbol = token.trim().to_uppercase();
        if !symbol.is_empty() && !out.contains(&symbol) {
            out.push(symbol);
        }
    }
    out
}

fn usage() -> &'static str {
    "usage: strength-scanner [analyze SYMBOL... | screen | config init [PATH]] [--json]"
}

#[tokio::main]
async fn main() -> Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = parse_args(std::env::args().skip(1)).map_err(|e| {
        eprintln!("{}", usage());
        e
    })?;
    match &cli.command {
        Command::Help => {
            println!("{}", usage());
            return Ok(());
        }
        Command::InitConfig(path) => return init_config(path),
        _ => {}
    }

    let mut config = ScannerConfig::load_or_default(DEFAULT_CONFIG_PATH);
    config.apply_env();

    // ── 2. Session, set up in the background ─────────────────────────────
    let pending = session::connect(&config);

    let command = match cli.command {
        Command::Interactive => Command::Analyze(prompt_symbols().await?),
        other => other,
    };

    let session = pending.wait(config.session_timeout()).await?;
    info!(established_at = %session.established_at(), "session ready");

    // ── 3. Run ───────────────────────────────────────────────────────────
    match command {
        Command::Analyze(symbols) => run_analyze(&session, &config, &symbols, cli.json).await,
        Command::Screen => run_screen(&session, &config, cli.json).await,
        Command::InitConfig(_) | Command::Interactive | Command::Help => Ok(()),
    }
}

/// Write the default configuration to `path`, refusing to overwrite.
fn init_config(path: &Path) -> Result<()> {
    if path.exists() {
        bail!("{} already exists", path.display());
    }
    ScannerConfig::default().save(path)?;
    println!("wrote {}", path.display());
    Ok(())
}

/// Read symbols from stdin while the session connects.
async fn prompt_symbols() -> Result<Vec<String>> {
    eprint!("symbols (e.g. 2330 2317): ");
    let line = tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        std::io::stdin().read_line(&mut line).map(|_| line)
    })
    .await
    .context("stdin reader task failed")?
    .context("failed to read symbols from stdin")?;

    let symbols = normalize_symbols(std::iter::once(line.as_str()));
    if symbols.is_empty() {
        bail!("no symbols entered");
    }
    Ok(symbols)
}

async fn run_analyze(
    session: &Session,
    config: &ScannerConfig,
    symbols: &[String],
    json: bool,
) -> Result<()> {
    let params = config.analysis_params();
    let mut results = Vec::with_capacity(symbols.len());
    let mut failed = 0usize;

    let market = if config.market_overview {
        let o = market_overview(session.source()).await;
        if !json && !o.is_empty() {
            println!("{}", report::render_overview(&o));
        }
        Some(o)
    } else {
        None
    };

    for symbol in symbols {
        match analyze_symbol(session.source(), symbol, &params).await {
            Ok(analysis) => {
                if !json {
                    println!("{}", report::render_analysis(&analysis));
                }
                results.push(analysis);
            }
            Err(e) => {
                failed += 1;
                error!(symbol = %symbol, error = %format!("{e:#}"), "analysis failed");
            }
        }
    }

    if json {
        let output = AnalyzeOutput {
            market: market.as_ref(),
            analyses: &results,
        };
        println!("{}", report::render_json(&output)?);
    }

    let budget = session.source().budget().snapshot();
    info!(
        analysed = results.len(),
        failed,
        requests_used = budget.used,
        "analysis run finished"
    );

    if results.is_empty() {
        bail!("no symbol could be analysed");
    }
    Ok(())
}

async fn run_screen(session: &Session, config: &ScannerConfig, json: bool) -> Result<()> {
    let exclusion = screener::load_exclusion_list(&config.exclude_list);
    let params = config.screen_params();

    let outcome = screener::screen_market(session.source(), &config.market, &exclusion, &params)
        .await
        .context("screen failed")?;

    if outcome.candidates > 0 && outcome.failures.len() == outcome.candidates {
        warn!(failed = outcome.failures.len(), "every candidate failed");
    }

    if json {
        println!("{}", report::render_json(&outcome)?);
    } else {
        println!("{}", report::render_screen(&outcome, config.display_limit));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn no_arguments_means_interactive() {
        let cli = parse_args(args(&[])).unwrap();
        assert_eq!(cli.command, Command::Interactive);
        assert!(!cli.json);
    }

    #[test]
    fn analyze_collects_symbols_and_json_flag() {
        let cli = parse_args(args(&["analyze", "2330,2317", "--json", "2330", "00878"])).unwrap();
        assert_eq!(
            cli.command,
            Command::Analyze(vec!["2330".into(), "2317".into(), "00878".into()])
        );
        assert!(cli.json);
    }

    #[test]
    fn bad_invocations_are_rejected() {
        assert!(parse_args(args(&["analyze"])).is_err());
        assert!(parse_args(args(&["screen", "2330"])).is_err());
        assert!(parse_args(args(&["frobnicate"])).is_err());
        assert!(parse_args(args(&["screen", "--verbose"])).is_err());
    }

    #[test]
    fn config_init_takes_an_optional_path() {
        let cli = parse_args(args(&["config", "init"])).unwrap();
        assert_eq!(cli.command, Command::InitConfig(PathBuf::from(DEFAULT_CONFIG_PATH)));
        let cli = parse_args(args(&["config", "init", "/tmp/scanner.json"])).unwrap();
        assert_eq!(cli.command, Command::InitConfig(PathBuf::from("/tmp/scanner.json")));
        assert!(parse_args(args(&["config"])).is_err());
        assert!(parse_args(args(&["config", "show"])).is_err());
    }

    #[test]
    fn init_config_writes_defaults_once() {
        let path = std::env::temp_dir().join(format!("scanner-init-{}.json", uuid::Uuid::new_v4()));
        init_config(&path).unwrap();
        let loaded = ScannerConfig::load(&path).unwrap();
        let second = init_config(&path);
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded, ScannerConfig::default());
        assert!(second.unwrap_err().to_string().contains("already exists"));
    }

    #[test]
    fn symbols_are_normalised() {
        assert_eq!(
            normalize_symbols(std::iter::once(" 2330  tsm,2330 \n")),
            vec!["2330".to_string(), "TSM".to_string()]
        );
    }
}
