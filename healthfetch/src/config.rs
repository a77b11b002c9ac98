use anyhow::{anyhow, Context, Result};
use clap::ValueEnum;
use device_probe::transport::{DEFAULT_PASSWORD, DEFAULT_USERNAME};
use device_probe::{Credentials, FallbackPolicy, HttpOptions};
use healthfetch_core::session::{DEFAULT_CONCURRENCY, DEFAULT_TIMEOUT};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::report::OutputMode;
use crate::FetchArgs;

const DEFAULT_CONFIG: &str = "healthfetch.yaml";

#[derive(Copy, Clone, Debug, Eq, PartialEq, Default, ValueEnum)]
pub enum FallbackMode {
    /// Try port 443 only after port 8888 timed out
    #[default]
    TimeoutOnly,
    /// Try port 443 after any port 8888 failure
    AnyFailure,
}

impl From<FallbackMode> for FallbackPolicy {
    fn from(m: FallbackMode) -> Self {
        match m {
            FallbackMode::TimeoutOnly => FallbackPolicy::TimeoutOnly,
            FallbackMode::AnyFailure => FallbackPolicy::AnyFailure,
        }
    }
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct FetchConfig {
    pub timeout_secs: Option<u64>,
    pub concurrency: Option<usize>,
    pub output: Option<String>,
    pub out_dir: Option<PathBuf>,
    pub fallback: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub token: Option<String>,
    pub verify_tls: Option<bool>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct Config {
    pub fetch: Option<FetchConfig>,
}

/// Load the YAML config. An explicit path must exist; the default file is optional.
pub fn load_config(path: Option<&Path>) -> Result<Option<Config>> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => {
            let p = Path::new(DEFAULT_CONFIG);
            if p.exists() { p.to_path_buf() } else { return Ok(None); }
        }
    };
    let s = fs::read_to_string(&path).with_context(|| format!("reading config {}", path.display()))?;
    let cfg = serde_yaml::from_str(&s).with_context(|| format!("parsing config {}", path.display()))?;
    Ok(Some(cfg))
}

/// Everything a fetch run needs, after merging CLI flags over the config file over defaults.
#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub target: Option<String>,
    pub targets_file: Option<PathBuf>,
    pub timeout: Duration,
    pub concurrency: usize,
    pub output: OutputMode,
    pub out_dir: PathBuf,
    pub summary_csv: Option<PathBuf>,
    pub fallback: FallbackPolicy,
    pub http: HttpOptions,
}

impl FetchSettings {
    pub fn resolve(args: FetchArgs, cfg: &FetchConfig) -> Result<Self> {
        let timeout_secs = args
            .timeout
            .or(cfg.timeout_secs)
            .unwrap_or(DEFAULT_TIMEOUT.as_secs());
        if timeout_secs == 0 {
            return Err(anyhow!("timeout must be > 0"));
        }
        let concurrency = args
            .concurrency
            .or(cfg.concurrency)
            .unwrap_or(DEFAULT_CONCURRENCY);
        if concurrency == 0 {
            return Err(anyhow!("concurrency must be > 0"));
        }
        let output = match (args.output, cfg.output.as_deref()) {
            (Some(o), _) => o,
            (None, Some(s)) => OutputMode::from_str(s, true).map_err(|e| anyhow!("config output: {}", e))?,
            (None, None) => OutputMode::default(),
        };
        let fallback = match (args.fallback, cfg.fallback.as_deref()) {
            (Some(f), _) => f,
            (None, Some(s)) => FallbackMode::from_str(s, true).map_err(|e| anyhow!("config fallback: {}", e))?,
            (None, None) => FallbackMode::default(),
        };

        let credentials = match args.token.or_else(|| cfg.token.clone()) {
            Some(token) => Credentials::Bearer(token),
            None => Credentials::Basic {
                username: args.username.or_else(|| cfg.username.clone()).unwrap_or_else(|| DEFAULT_USERNAME.into()),
                password: args.password.or_else(|| cfg.password.clone()).unwrap_or_else(|| DEFAULT_PASSWORD.into()),
            },
        };
        let http = HttpOptions {
            credentials,
            verify_tls: args.verify_tls || cfg.verify_tls.unwrap_or(false),
            ..HttpOptions::default()
        };

        Ok(FetchSettings {
            target: args.target,
            targets_file: args.targets,
            timeout: Duration::from_secs(timeout_secs),
            concurrency,
            output,
            out_dir: args.out_dir.or_else(|| cfg.out_dir.clone()).unwrap_or_else(|| PathBuf::from(".")),
            summary_csv: args.summary_csv,
            fallback: fallback.into(),
            http,
        })
    }
}
