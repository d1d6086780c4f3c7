use std::collections::HashMap;
use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use rand::Rng;
use reqwest::Method;
use thiserror::Error;
use tracing::{debug, info, warn};
use trust_dns_resolver::TokioAsyncResolver;
use trust_dns_resolver::config::{
    LookupIpStrategy, NameServerConfig, NameServerConfigGroup, Protocol, ResolverConfig,
    ResolverOpts,
};
use url::{Host, Url};

use crate::config::ProbeSettings;

const DNS_PORT: u16 = 53;
const DNS_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum TargetError {
    #[error("Invalid target url: {url}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("Invalid target scheme: {0}")]
    UnsupportedScheme(String),
    #[error("Invalid target address: {0}")]
    Unresolvable(String),
    #[error("Invalid method: {0}")]
    InvalidMethod(String),
    #[error("Invalid header: {0}")]
    InvalidHeader(String),
    #[error("Invalid ip address: {0}")]
    InvalidIp(String),
    #[error("Invalid DNS IP address: {0}")]
    InvalidDnsServer(String),
    #[error("Invalid log level: {0}. Valid levels are: trace, debug, info, warn, error")]
    InvalidLogLevel(String),
}

impl TargetError {
    /// Follow-up line printed under the diagnostic, if any.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            TargetError::InvalidUrl { .. } => Some("Usage: webping --target=https://<target>"),
            TargetError::Unresolvable(_) => {
                Some("ERR: Try to set new DNS IP or set valid target url")
            }
            _ => None,
        }
    }
}

/// Everything the probe loop needs. Built once, read-only afterwards.
#[derive(Debug, Clone)]
pub struct ProbeTarget {
    /// Normalized target as typed, used in the banner.
    pub display_url: String,
    pub url: Url,
    pub ip: IpAddr,
    pub port: u16,
    pub method: Method,
    pub body: Vec<u8>,
    pub headers: HashMap<String, String>,
    pub timeout: Duration,
    pub skip_verify: bool,
    pub dns_ip: IpAddr,
    pub expected_status: u16,
}

impl ProbeTarget {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.port)
    }
}

/// True when the string opens with `scheme://`; a `://` later in a path or query does not count.
fn has_scheme(raw: &str) -> bool {
    let Some((scheme, _)) = raw.split_once("://") else {
        return false;
    };
    let mut chars = scheme.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Prepend `http://` when the target carries no scheme.
pub fn normalize_target(raw: &str) -> String {
    let raw = raw.trim();
    if has_scheme(raw) {
        raw.to_string()
    } else {
        format!("http://{}", raw)
    }
}

pub fn normalize_url(raw: &str) -> Result<Url, TargetError> {
    let full = normalize_target(raw);
    Url::parse(&full).map_err(|source| TargetError::InvalidUrl { url: full, source })
}

/// Explicit port wins; otherwise 80 for http and 443 for https.
pub fn resolve_port(url: &Url) -> Result<u16, TargetError> {
    let default = match url.scheme() {
        "http" => 80,
        "https" => 443,
        other => return Err(TargetError::UnsupportedScheme(other.to_string())),
    };
    // the url crate hides a port equal to the scheme default, which lands on the same value
    match url.port() {
        Some(port) if port != 0 => Ok(port),
        _ => Ok(default),
    }
}

/// Pick one IPv4 address, uniformly at random when there are several.
pub fn select_ipv4<R: Rng + ?Sized>(addrs: &[IpAddr], rng: &mut R) -> Option<IpAddr> {
    let v4: Vec<IpAddr> = addrs.iter().copied().filter(IpAddr::is_ipv4).collect();
    match v4.len() {
        0 => None,
        1 => Some(v4[0]),
        n => Some(v4[rng.gen_range(0..n)]),
    }
}

/// Name lookup used once at startup. Failures come back as an empty list.
pub trait HostLookup {
    fn lookup_host(&self, host: &str) -> impl Future<Output = Vec<IpAddr>> + Send;
}

/// Queries a single DNS server on port 53.
pub struct DnsLookup {
    resolver: TokioAsyncResolver,
}

impl DnsLookup {
    pub fn new(dns_ip: IpAddr) -> Self {
        let mut opts = ResolverOpts::default();
        opts.attempts = 2;
        opts.timeout = DNS_TIMEOUT;
        opts.ip_strategy = LookupIpStrategy::Ipv4AndIpv6;

        let mut name_servers = NameServerConfigGroup::new();
        name_servers.push(NameServerConfig {
            socket_addr: SocketAddr::new(dns_ip, DNS_PORT),
            protocol: Protocol::Udp,
            tls_dns_name: None,
            trust_negative_responses: false,
            bind_addr: None,
        });
        let config = ResolverConfig::from_parts(None, vec![], name_servers);

        Self {
            resolver: TokioAsyncResolver::tokio(config, opts),
        }
    }
}

impl HostLookup for DnsLookup {
    async fn lookup_host(&self, host: &str) -> Vec<IpAddr> {
        match self.resolver.lookup_ip(host).await {
            Ok(lookup) => lookup.iter().collect(),
            Err(e) => {
                warn!("dns lookup for {} failed: {}", host, e);
                Vec::new()
            }
        }
    }
}

/// Turns settings into a [`ProbeTarget`], consulting DNS only when no IP was given.
pub struct TargetResolver<L, R> {
    lookup: L,
    rng: R,
}

impl<L: HostLookup, R: Rng> TargetResolver<L, R> {
    pub fn new(lookup: L, rng: R) -> Self {
        Self { lookup, rng }
    }

    pub async fn resolve(&mut self, settings: ProbeSettings) -> Result<ProbeTarget, TargetError> {
        let display_url = normalize_target(&settings.target);
        let url = normalize_url(&settings.target)?;
        let port = resolve_port(&url)?;
        info!("target {} port {}", url, port);

        let ip = match settings.ip {
            Some(ip) => {
                info!("using pinned address {}", ip);
                ip
            }
            None => {
                let ip = self
                    .lookup_ipv4(&url)
                    .await
                    .ok_or_else(|| TargetError::Unresolvable(display_url.clone()))?;
                info!("resolved {} to {} via {}", url, ip, settings.dns_ip);
                ip
            }
        };

        Ok(ProbeTarget {
            display_url,
            url,
            ip,
            port,
            method: settings.method,
            body: settings.body,
            headers: settings.headers,
            timeout: settings.timeout,
            skip_verify: settings.skip_verify,
            dns_ip: settings.dns_ip,
            expected_status: settings.expected_status,
        })
    }

    async fn lookup_ipv4(&mut self, url: &Url) -> Option<IpAddr> {
        let addrs = match url.host()? {
            Host::Ipv4(ip) => vec![IpAddr::V4(ip)],
            Host::Ipv6(ip) => vec![IpAddr::V6(ip)],
            Host::Domain(name) => self.lookup.lookup_host(name).await,
        };
        debug!("lookup returned {:?}", addrs);
        select_ipv4(&addrs, &mut self.rng)
    }
}
