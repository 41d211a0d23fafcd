use std::fs::File;
use std::io::BufReader;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::info;

use ramlcheck::autotest::AutotestOptions;
use ramlcheck::http::ReqwestClient;
use ramlcheck::suite::ApiSuite;
use ramlcheck::{Executor, RunConfig};

use crate::config::Config;

mod config;

fn main() -> Result<()> {
    env_logger::init();
    let config = Config::parse();

    let document = ramlcheck::raml::parse_file(&config.raml)
        .with_context(|| format!("read RAML from {}", config.raml.display()))?;
    info!(
        "loaded '{}' ({} declared method/path pairs)",
        document.title,
        document.nodes.len()
    );

    let run_config = run_config(&config)?;

    let mut suite = ApiSuite::new(document);
    suite.autotest(&AutotestOptions::default());

    let client = ReqwestClient::with_timeout(
        &config.base_url,
        Duration::from_secs(config.timeout_secs),
    )?;

    let report = Executor::new(suite, client).config(run_config).execute();
    println!("{}", report);

    if report.failed() {
        let (_, failed, _) = report.counts();
        bail!("{} tests failed", failed);
    }
    Ok(())
}

fn run_config(config: &Config) -> Result<RunConfig> {
    let mut run_config = match &config.config {
        None => RunConfig::default(),
        Some(path) => {
            let file = File::open(path).context("read run config")?;
            serde_json::from_reader(BufReader::new(file))?
        }
    };
    if let Some(attempts) = config.retry_attempts {
        run_config.retry_attempts = attempts;
    }
    if let Some(delay) = config.retry_delay_ms {
        run_config.retry_delay_ms = delay;
    }
    if let Some(settle) = config.settle_delay_ms {
        run_config.settle_delay_ms = settle;
    }
    if config.no_validate {
        run_config.validate = false;
    }
    Ok(run_config)
}
