use std::collections::HashMap;
use std::net::IpAddr;
use std::time::Duration;

use clap::{ArgAction, Parser};
use reqwest::Method;
use reqwest::header::{HeaderName, HeaderValue};

use crate::target::TargetError;
use crate::util::parse_header;

#[derive(Debug, Clone, Parser)]
#[command(name = "webping")]
#[command(about = "Probe one HTTP(S) endpoint at a pinned IP address once per second")]
pub struct Cli {
    /// Target Url
    #[arg(long, default_value = "")]
    pub target: String,

    /// HTTP method
    #[arg(long, default_value = "GET")]
    pub method: String,

    /// Skip SSL certificate verification
    #[arg(
        long,
        num_args = 0..=1,
        default_value_t = false,
        default_missing_value = "true",
        action = ArgAction::Set
    )]
    pub skip_verify: bool,

    /// Timeout, e.g. "2s", "500ms", "1m 30s". Zero disables it
    #[arg(long, default_value = "2s", value_parser = humantime::parse_duration)]
    pub timeout: Duration,

    /// IP address
    #[arg(long, default_value = "")]
    pub ip: String,

    /// Expected status code
    #[arg(long, default_value_t = 200)]
    pub status: u16,

    /// DNS IP address
    #[arg(long = "dns-ip", default_value = "1.1.1.1")]
    pub dns_ip: String,

    /// Request header as "Name: value", may be repeated
    #[arg(short = 'H', long = "header")]
    pub headers: Vec<String>,

    /// Request body
    #[arg(long)]
    pub body: Option<String>,

    /// Diagnostic log level written to stderr
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

/// Validated flag values, before URL normalization and address resolution.
#[derive(Debug, Clone)]
pub struct ProbeSettings {
    pub target: String,
    pub method: Method,
    pub skip_verify: bool,
    pub timeout: Duration,
    pub ip: Option<IpAddr>,
    pub expected_status: u16,
    pub dns_ip: IpAddr,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl Cli {
    /// Get the log level as a tracing::Level
    pub fn get_tracing_level(&self) -> Result<tracing::Level, TargetError> {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Ok(tracing::Level::TRACE),
            "debug" => Ok(tracing::Level::DEBUG),
            "info" => Ok(tracing::Level::INFO),
            "warn" | "warning" => Ok(tracing::Level::WARN),
            "error" => Ok(tracing::Level::ERROR),
            _ => Err(TargetError::InvalidLogLevel(self.log_level.clone())),
        }
    }

    pub fn settings(&self) -> Result<ProbeSettings, TargetError> {
        let method_name = self.method.trim().to_uppercase();
        let method = Method::from_bytes(method_name.as_bytes())
            .map_err(|_| TargetError::InvalidMethod(self.method.clone()))?;

        let ip = match self.ip.trim() {
            "" => None,
            raw => Some(
                raw.parse::<IpAddr>()
                    .map_err(|_| TargetError::InvalidIp(raw.to_string()))?,
            ),
        };

        let dns_ip = self
            .dns_ip
            .trim()
            .parse::<IpAddr>()
            .map_err(|_| TargetError::InvalidDnsServer(self.dns_ip.clone()))?;

        let mut headers = HashMap::new();
        for raw in &self.headers {
            let (name, value) =
                parse_header(raw).ok_or_else(|| TargetError::InvalidHeader(raw.clone()))?;
            if HeaderName::from_bytes(name.as_bytes()).is_err()
                || HeaderValue::from_str(&value).is_err()
            {
                return Err(TargetError::InvalidHeader(raw.clone()));
            }
            headers.insert(name, value);
        }

        Ok(ProbeSettings {
            target: self.target.clone(),
            method,
            skip_verify: self.skip_verify,
            timeout: self.timeout,
            ip,
            expected_status: self.status,
            dns_ip,
            headers,
            body: self.body.clone().map(String::into_bytes).unwrap_or_default(),
        })
    }
}
