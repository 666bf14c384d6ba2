//! Configuration for the `x402-paywall` command.
//!
//! Values come from command-line flags, their environment variable fallbacks,
//! and an optional JSON file. Flags win over the file.
//!
//! ```json
//! {
//!   "url": "https://api.example.com/api/report",
//!   "method": "GET",
//!   "headers": { "Accept": "application/json" },
//!   "receipt": "$PAYWALL_RECEIPT",
//!   "receipt_header": "X-Payment-Receipt",
//!   "timeout_secs": 120
//! }
//! ```
//!
//! `url` and `receipt` may reference environment variables as `$VAR` or `${VAR}`.

use clap::Parser;
use http::Method;
use http::header::{HeaderMap, HeaderName, HeaderValue};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use url::Url;
use x402_paywall_types::{RECEIPT_HEADER, Receipt};

/// CLI arguments for the `x402-paywall` command.
#[derive(Parser, Debug, Default)]
#[command(name = "x402-paywall")]
#[command(about = "Fetch a URL, paying through HTTP 402 payment challenges")]
pub struct CliArgs {
    /// Path to a JSON configuration file
    #[arg(long, short, env = "CONFIG")]
    config: Option<PathBuf>,
    /// HTTP method to use
    #[arg(long, short = 'X')]
    method: Option<String>,
    /// Extra request header as `Name: value`; may be repeated
    #[arg(long = "header", short = 'H')]
    headers: Vec<String>,
    /// Request body
    #[arg(long, short)]
    data: Option<String>,
    /// Pay every challenge with this receipt instead of prompting for one
    #[arg(long, env = "PAYWALL_RECEIPT")]
    receipt: Option<String>,
    /// Decline a challenge nobody answered within this many seconds
    #[arg(long, env = "PAYWALL_TIMEOUT")]
    timeout: Option<u64>,
    /// URL to fetch
    #[arg(env = "PAYWALL_URL")]
    url: Option<Url>,
}

/// Contents of the optional JSON configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
struct FileConfig {
    #[serde(default)]
    url: Option<LiteralOrEnv<Url>>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    headers: BTreeMap<String, String>,
    #[serde(default)]
    receipt: Option<LiteralOrEnv<String>>,
    #[serde(default)]
    receipt_header: Option<String>,
    #[serde(default)]
    timeout_secs: Option<u64>,
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {0}: {1}")]
    FileRead(PathBuf, std::io::Error),
    #[error("Failed to parse config file: {0}")]
    JsonParse(#[from] serde_json::Error),
    #[error("No URL given, pass one as an argument or set `url` in the config file")]
    MissingUrl,
    #[error("Invalid HTTP method: {0}")]
    InvalidMethod(String),
    #[error("Invalid header {0:?}, expected `Name: value`")]
    InvalidHeader(String),
    #[error("Invalid receipt header name: {0}")]
    InvalidReceiptHeader(String),
}

/// Resolved configuration of a single fetch.
#[derive(Debug, Clone)]
pub struct Config {
    url: Url,
    method: Method,
    headers: HeaderMap,
    body: Option<String>,
    receipt: Option<Receipt>,
    receipt_header: HeaderName,
    timeout: Option<Duration>,
}

impl Config {
    /// Parses the command line and merges in the config file it points to.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_args(CliArgs::parse())
    }

    fn from_args(args: CliArgs) -> Result<Self, ConfigError> {
        let file = match &args.config {
            Some(path) => {
                let content =
                    fs::read_to_string(path).map_err(|e| ConfigError::FileRead(path.clone(), e))?;
                serde_json::from_str::<FileConfig>(&content)?
            }
            None => FileConfig::default(),
        };
        Self::merge(args, file)
    }

    fn merge(args: CliArgs, file: FileConfig) -> Result<Self, ConfigError> {
        let url = args
            .url
            .or_else(|| file.url.map(LiteralOrEnv::into_inner))
            .ok_or(ConfigError::MissingUrl)?;

        let method = match args.method.or(file.method) {
            Some(method) => Method::from_str(&method.to_ascii_uppercase())
                .map_err(|_| ConfigError::InvalidMethod(method))?,
            None => Method::GET,
        };

        let mut headers = HeaderMap::new();
        for (name, value) in &file.headers {
            insert_header(&mut headers, name, value)
                .ok_or_else(|| ConfigError::InvalidHeader(format!("{name}: {value}")))?;
        }
        for line in &args.headers {
            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| ConfigError::InvalidHeader(line.clone()))?;
            insert_header(&mut headers, name, value)
                .ok_or_else(|| ConfigError::InvalidHeader(line.clone()))?;
        }

        let receipt_header = match file.receipt_header {
            Some(name) => HeaderName::from_str(name.trim())
                .map_err(|_| ConfigError::InvalidReceiptHeader(name))?,
            None => RECEIPT_HEADER,
        };

        let receipt = args
            .receipt
            .or_else(|| file.receipt.map(LiteralOrEnv::into_inner))
            .filter(|receipt| !receipt.trim().is_empty())
            .map(Receipt::new);

        let timeout = args
            .timeout
            .or(file.timeout_secs)
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);

        Ok(Self {
            url,
            method,
            headers,
            body: args.data,
            receipt,
            receipt_header,
            timeout,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    /// Preconfigured receipt; when absent the user is prompted for one.
    pub fn receipt(&self) -> Option<&Receipt> {
        self.receipt.as_ref()
    }

    pub fn receipt_header(&self) -> &HeaderName {
        &self.receipt_header
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

/// Appends a header, returning `None` if the name or value is not valid.
fn insert_header(headers: &mut HeaderMap, name: &str, value: &str) -> Option<()> {
    let name = HeaderName::from_str(name.trim()).ok()?;
    let value = HeaderValue::from_str(value.trim()).ok()?;
    headers.append(name, value);
    Some(())
}

/// A config value that is either written literally or names an environment
/// variable (`$VAR` or `${VAR}`) to read it from at load time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiteralOrEnv<T>(T);

impl<T> LiteralOrEnv<T> {
    pub fn into_inner(self) -> T {
        self.0
    }

    fn env_var_name(s: &str) -> Option<&str> {
        let name = match s.strip_prefix("${") {
            Some(rest) => rest.strip_suffix('}')?,
            None => s.strip_prefix('$')?,
        };
        let valid = !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        valid.then_some(name)
    }
}

impl<'de, T> Deserialize<'de> for LiteralOrEnv<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        let value = match Self::env_var_name(&raw) {
            Some(var) => std::env::var(var).map_err(|_| {
                serde::de::Error::custom(format!(
                    "Environment variable '{var}' not found (referenced as '{raw}')"
                ))
            })?,
            None => raw,
        };
        value
            .parse::<T>()
            .map(LiteralOrEnv)
            .map_err(|e| serde::de::Error::custom(format!("Failed to parse value: {e}")))
    }
}
