use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use reqwest::header::{CONNECTION, HOST, HeaderMap};
use reqwest::{Client, Response};
use tokio::time::Instant;
use tracing::{debug, trace};
use url::{Host, Url};

use super::ProbeOutcome;
use crate::target::ProbeTarget;
use crate::util::error_chain;

/// Answers every lookup with the pinned address so no request ever reaches DNS.
struct PinnedResolver {
    addr: SocketAddr,
}

impl Resolve for PinnedResolver {
    fn resolve(&self, name: Name) -> Resolving {
        let addr = self.addr;
        trace!("dialing {} for {}", addr, name.as_str());
        Box::pin(async move {
            let addrs: Addrs = Box::new(std::iter::once(addr));
            Ok::<_, Box<dyn std::error::Error + Send + Sync>>(addrs)
        })
    }
}

/// A fresh client per tick: no pool, so every probe pays for a full handshake.
/// A zero timeout leaves the request unbounded.
fn build_client(target: &ProbeTarget) -> reqwest::Result<Client> {
    let mut builder = Client::builder()
        .use_rustls_tls()
        .dns_resolver(Arc::new(PinnedResolver {
            addr: target.socket_addr(),
        }))
        .pool_max_idle_per_host(0)
        .http1_only()
        .no_proxy()
        .danger_accept_invalid_certs(target.skip_verify);
    if !target.timeout.is_zero() {
        builder = builder.connect_timeout(target.timeout).timeout(target.timeout);
    }
    builder.build()
}

/// The client never consults a resolver for IP literal hosts, so a literal that
/// differs from the pinned address is swapped out here. The original authority
/// goes along as the `Host` header.
fn pinned_url(url: &Url, pinned: IpAddr) -> (Url, Option<String>) {
    let literal = match url.host() {
        Some(Host::Ipv4(ip)) => IpAddr::V4(ip),
        Some(Host::Ipv6(ip)) => IpAddr::V6(ip),
        _ => return (url.clone(), None),
    };
    if literal == pinned {
        return (url.clone(), None);
    }

    let host = url.host_str().unwrap_or_default();
    let authority = match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    };
    let mut rewritten = url.clone();
    match rewritten.set_ip_host(pinned) {
        Ok(()) => (rewritten, Some(authority)),
        Err(()) => (url.clone(), None),
    }
}

fn first_values(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .keys()
        .filter_map(|name| {
            headers.get(name).map(|value| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
        })
        .collect()
}

/// Run one request against the pinned address and time it, body included.
pub async fn probe_http(target: &ProbeTarget) -> ProbeOutcome {
    let start = Instant::now();
    let pinned = target.ip.to_string();

    let client = match build_client(target) {
        Ok(client) => client,
        Err(e) => return ProbeOutcome::failed(pinned, start.elapsed(), error_chain(&e)),
    };

    let (url, host) = pinned_url(&target.url, target.ip);
    let mut request = client.request(target.method.clone(), url);
    if let Some(host) = host {
        if !target.headers.keys().any(|name| name.eq_ignore_ascii_case(HOST.as_str())) {
            request = request.header(HOST, host);
        }
    }
    if !target.body.is_empty() {
        request = request.body(target.body.clone());
    }
    if !target
        .headers
        .keys()
        .any(|name| name.eq_ignore_ascii_case(CONNECTION.as_str()))
    {
        request = request.header(CONNECTION, "close");
    }
    for (name, value) in &target.headers {
        request = request.header(name.as_str(), value.as_str());
    }

    let response = match request.send().await {
        Ok(response) => response,
        Err(e) => {
            let error = error_chain(&e);
            debug!("request to {} failed: {}", target.url, error);
            return ProbeOutcome::failed(pinned, start.elapsed(), error);
        }
    };

    read_response(response, pinned, start).await
}

async fn read_response(response: Response, pinned: String, start: Instant) -> ProbeOutcome {
    let remote = response.remote_addr();
    let status = response.status().as_u16();
    let headers = first_values(response.headers());

    match response.bytes().await {
        Ok(body) => {
            debug!("status {} body {} bytes headers {:?}", status, body.len(), headers);
            let remote_addr = remote.map(|addr| addr.to_string()).unwrap_or(pinned);
            ProbeOutcome::responded(remote_addr, start.elapsed(), status, headers, body.len())
        }
        Err(e) => {
            let error = error_chain(&e);
            debug!("reading body failed: {}", error);
            let remote_ip = remote.map(|addr| addr.ip().to_string()).unwrap_or(pinned);
            ProbeOutcome::failed(remote_ip, start.elapsed(), error)
        }
    }
}
