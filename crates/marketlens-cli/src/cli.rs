//! CLI argument definitions for marketlens.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `quote` | Latest quote for one symbol |
//! | `fundamentals` | Company fundamentals for one ticker |
//! | `news` | Recent news for one ticker |
//! | `analysis` | Composite report (quote, fundamentals, news) |
//! | `sources` | Provider chains, capabilities and credentials |
//! | `serve` | Answer NDJSON tool calls on stdin |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--config` | `MARKETLENS_CONFIG` | TOML settings file |
//! | `--format` | `json` | Output format (json, table) |
//! | `--pretty` | `false` | Pretty-print JSON output |
//! | `--strict` | `false` | Fail with exit code 5 on any envelope error |
//! | `--log-level` | `info` | Log filter when `RUST_LOG` is unset |
//! | `--log-json` | `false` | JSON log lines on stderr |
//!
//! # Examples
//!
//! ```bash
//! marketlens quote RELIANCE
//! marketlens news TATAMOTORS "Tata Motors" --max-items 5 --pretty
//! marketlens analysis INFY Infosys --no-news --strict
//! echo '{"tool":"get_stock_quote","arguments":{"symbol":"TCS"}}' | marketlens serve
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Stock quotes, fundamentals and news for Indian listings, resolved
/// across Yahoo Finance, Alpha Vantage and Google News.
#[derive(Debug, Parser)]
#[command(
    name = "marketlens",
    author,
    version,
    about = "Multi-provider stock data for Indian listings",
    long_about = "marketlens queries several upstream providers per request and returns one \
envelope per tool call. Features include:\n\
\n\
  • Priority fallback with retry and backoff per provider\n\
  • Short-lived request caching\n\
  • Composite reports with per-section failures\n\
  • NDJSON tool serving over stdio\n\
\n\
Use 'marketlens <command> --help' for command-specific help."
)]
pub struct Cli {
    /// TOML settings file (overrides MARKETLENS_CONFIG).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format for results.
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,

    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Treat envelope errors as failures (exit code 5).
    #[arg(long, global = true, default_value_t = false)]
    pub strict: bool,

    /// Log filter directive used when RUST_LOG is not set.
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON lines.
    #[arg(long, global = true, default_value_t = false)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Single JSON object output.
    Json,
    /// Human-readable summary.
    Table,
}

/// Available CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch the latest quote for a symbol.
    ///
    /// Symbols without an exchange suffix default to NSE.
    ///
    /// # Examples
    ///
    ///   marketlens quote RELIANCE
    ///   marketlens quote TCS.BO --pretty
    Quote(QuoteArgs),

    /// Fetch company fundamentals.
    Fundamentals(FundamentalsArgs),

    /// Fetch recent news, newest first.
    ///
    /// # Examples
    ///
    ///   marketlens news TATAMOTORS "Tata Motors"
    ///   marketlens news INFY Infosys --query "Infosys results" --max-items 5
    News(NewsArgs),

    /// Build a composite report for a ticker.
    Analysis(AnalysisArgs),

    /// List provider chains, capabilities and credential presence.
    Sources,

    /// Read tool calls as JSON lines on stdin and answer one envelope per line.
    Serve,
}

/// Arguments for the `quote` command.
#[derive(Debug, Args)]
pub struct QuoteArgs {
    /// Market symbol (e.g., RELIANCE, TCS.NS).
    pub symbol: String,
}

/// Arguments for the `fundamentals` command.
#[derive(Debug, Args)]
pub struct FundamentalsArgs {
    /// Market symbol.
    pub ticker: String,
}

/// Arguments for the `news` command.
#[derive(Debug, Args)]
pub struct NewsArgs {
    /// Market symbol.
    pub ticker: String,

    /// Company name used to build the default search query.
    pub stock_name: String,

    /// Explicit search query.
    #[arg(long)]
    pub query: Option<String>,

    /// Number of items to return (1-50).
    #[arg(long, default_value_t = 10)]
    pub max_items: usize,
}

/// Arguments for the `analysis` command.
#[derive(Debug, Args)]
pub struct AnalysisArgs {
    /// Market symbol.
    pub ticker: String,

    /// Company name.
    pub stock_name: String,

    /// Skip the news section.
    #[arg(long, default_value_t = false)]
    pub no_news: bool,

    /// Number of news items in the report (1-50).
    #[arg(long, default_value_t = 5)]
    pub max_news: usize,
}
