use std::path::PathBuf;

use clap::Parser;

/// Runs every method/path pair a RAML document declares against a live
/// server and validates the responses against the contract.
#[derive(Parser, Debug)]
#[command(name = "ramlcheck", version, about)]
pub struct Config {
    /// Path to the RAML document describing the API under test.
    pub raml: PathBuf,

    /// Base URL requests are sent to, e.g. http://localhost:8080.
    #[arg(long)]
    pub base_url: String,

    /// Optional JSON run-configuration file (retries, delays,
    /// validation toggle); flags below override its values.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Total attempts per request.
    #[arg(long)]
    pub retry_attempts: Option<u32>,

    /// Fixed delay between attempts, in milliseconds.
    #[arg(long)]
    pub retry_delay_ms: Option<u64>,

    /// Delay after each generated request, in milliseconds.
    #[arg(long)]
    pub settle_delay_ms: Option<u64>,

    /// Skip contract validation; only report transport-level outcomes.
    #[arg(long)]
    pub no_validate: bool,

    /// HTTP client timeout, in seconds.
    #[arg(long, default_value_t = 10)]
    pub timeout_secs: u64,
}
