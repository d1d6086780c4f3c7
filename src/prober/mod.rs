use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use crate::target::ProbeTarget;

pub mod http;

/// Startup line echoing what is about to be probed.
pub fn banner(target: &ProbeTarget) -> String {
    format!(
        "Start probe url: {} port: {} method: {} timeout: {}",
        target.display_url,
        target.port,
        target.method,
        humantime::format_duration(target.timeout)
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Ok,
    Fail,
}

impl Verdict {
    pub fn classify(status: u16, expected_status: u16) -> Self {
        if status == expected_status {
            Verdict::Ok
        } else {
            Verdict::Fail
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Ok => f.write_str("OK"),
            Verdict::Fail => f.write_str("FAIL"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutcomeKind {
    /// No HTTP response: connect, TLS, timeout and similar failures.
    Transport { error: String },
    Response {
        status: u16,
        /// First value of each response header.
        headers: HashMap<String, String>,
        body_len: usize,
    },
}

/// Result of a single tick. Produced once per iteration and dropped after reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub remote_addr: String,
    pub elapsed: Duration,
    pub kind: OutcomeKind,
}

impl ProbeOutcome {
    pub fn failed(remote_addr: impl Into<String>, elapsed: Duration, error: String) -> Self {
        Self {
            remote_addr: remote_addr.into(),
            elapsed,
            kind: OutcomeKind::Transport { error },
        }
    }

    pub fn responded(
        remote_addr: impl Into<String>,
        elapsed: Duration,
        status: u16,
        headers: HashMap<String, String>,
        body_len: usize,
    ) -> Self {
        Self {
            remote_addr: remote_addr.into(),
            elapsed,
            kind: OutcomeKind::Response {
                status,
                headers,
                body_len,
            },
        }
    }

    pub fn status(&self) -> Option<u16> {
        match &self.kind {
            OutcomeKind::Response { status, .. } => Some(*status),
            OutcomeKind::Transport { .. } => None,
        }
    }

    /// `None` when the request never produced a response.
    pub fn verdict(&self, expected_status: u16) -> Option<Verdict> {
        self.status().map(|status| Verdict::classify(status, expected_status))
    }

    /// The line printed to stdout for this tick.
    pub fn report_line(&self, port: u16, expected_status: u16) -> String {
        let ms = millis(self.elapsed);
        match &self.kind {
            OutcomeKind::Transport { error } => {
                format!("Remote {}:{} time={}ms err={}", self.remote_addr, port, ms, error)
            }
            OutcomeKind::Response { status, .. } => {
                format!(
                    "Connected {} code={} time={}ms - {}",
                    self.remote_addr,
                    status,
                    ms,
                    Verdict::classify(*status, expected_status)
                )
            }
        }
    }
}

fn millis(d: Duration) -> String {
    format!("{:.2}", d.as_micros() as f64 / 1000.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::Method;
    use url::Url;

    fn target(raw: &str, port: u16, timeout: Duration) -> ProbeTarget {
        ProbeTarget {
            display_url: raw.to_string(),
            url: Url::parse(raw).unwrap(),
            ip: "192.0.2.1".parse().unwrap(),
            port,
            method: Method::GET,
            body: Vec::new(),
            headers: HashMap::new(),
            timeout,
            skip_verify: false,
            dns_ip: "1.1.1.1".parse().unwrap(),
            expected_status: 200,
        }
    }

    #[test]
    fn banner_echoes_target_as_typed() {
        let line = banner(&target("http://example.com", 80, Duration::from_secs(2)));
        assert_eq!(line, "Start probe url: http://example.com port: 80 method: GET timeout: 2s");

        let mut post = target("https://example.com:8443/health", 8443, Duration::from_millis(1500));
        post.method = Method::POST;
        assert_eq!(
            banner(&post),
            "Start probe url: https://example.com:8443/health port: 8443 method: POST timeout: 1s 500ms"
        );
    }

    #[test]
    fn status_match_is_ok() {
        let outcome = ProbeOutcome::responded(
            "192.0.2.1:80",
            Duration::from_micros(12_346),
            200,
            HashMap::new(),
            0,
        );
        assert_eq!(outcome.verdict(200), Some(Verdict::Ok));
        assert_eq!(
            outcome.report_line(80, 200),
            "Connected 192.0.2.1:80 code=200 time=12.35ms - OK"
        );
    }

    #[test]
    fn status_mismatch_is_fail() {
        let outcome = ProbeOutcome::responded(
            "192.0.2.1:443",
            Duration::from_millis(3),
            503,
            HashMap::new(),
            17,
        );
        assert_eq!(outcome.verdict(200), Some(Verdict::Fail));
        assert_eq!(
            outcome.report_line(443, 200),
            "Connected 192.0.2.1:443 code=503 time=3.00ms - FAIL"
        );
        assert_eq!(outcome.verdict(503), Some(Verdict::Ok));
    }

    #[test]
    fn transport_error_has_no_status() {
        let outcome = ProbeOutcome::failed(
            "192.0.2.1",
            Duration::from_micros(1_500),
            "connection refused".to_string(),
        );
        assert_eq!(outcome.status(), None);
        assert_eq!(outcome.verdict(200), None);
        assert_eq!(
            outcome.report_line(8080, 200),
            "Remote 192.0.2.1:8080 time=1.50ms err=connection refused"
        );
    }
}
