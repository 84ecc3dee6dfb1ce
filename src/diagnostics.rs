//! Network diagnostics for the remote endpoint.
//!
//! Each check returns a [`DiagnosticResult`] with a verdict, a one-line
//! detail, and the step-by-step log an operator can read back.

use std::time::{Duration, Instant};

use reqwest::Url;
use serde::Serialize;

use crate::connectivity::{bounded, ConnectivityMonitor, Reachability};
use crate::error::StorageError;

#[derive(Debug, Clone, Default, Serialize)]
pub struct DiagnosticResult {
    pub success: bool,
    pub detail: Option<String>,
    pub log: Vec<String>,
}

impl DiagnosticResult {
    fn pass(mut self, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        self.log.push(format!("ok: {detail}"));
        self.success = true;
        self.detail = Some(detail);
        self
    }

    fn fail(mut self, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        self.log.push(format!("failed: {detail}"));
        self.success = false;
        self.detail = Some(detail);
        self
    }

    fn step(&mut self, line: impl Into<String>) {
        self.log.push(line.into());
    }
}

fn host_and_port(url: &str) -> Result<(String, u16), String> {
    let parsed = Url::parse(url).map_err(|e| format!("\"{url}\" is not a valid URL: {e}"))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| format!("\"{url}\" has no host"))?
        .trim_start_matches('[')
        .trim_end_matches(']')
        .to_string();
    let port = parsed
        .port_or_known_default()
        .ok_or_else(|| format!("\"{url}\" has no known port"))?;
    Ok((host, port))
}

/// Resolve the URL's host.
pub async fn check_dns(url: &str, timeout: Duration) -> DiagnosticResult {
    let mut result = DiagnosticResult::default();
    let (host, port) = match host_and_port(url) {
        Ok(pair) => pair,
        Err(e) => return result.fail(e),
    };
    result.step(format!("resolving {host}"));

    let lookup = async {
        tokio::net::lookup_host((host.as_str(), port))
            .await
            .map(|addrs| addrs.collect::<Vec<_>>())
            .map_err(|e| StorageError::NetworkUnavailable(e.to_string()))
    };
    match bounded(timeout, lookup).await {
        Ok(addrs) if addrs.is_empty() => result.fail(format!("{host} resolved to no addresses")),
        Ok(addrs) => {
            let first = addrs[0].ip();
            result.pass(format!("{host} resolved to {} address(es), first {first}", addrs.len()))
        }
        Err(e) => result.fail(format!("cannot resolve {host}: {e}")),
    }
}

/// Issue one bounded request against `url`.
pub async fn check_reachability(
    reachability: &dyn Reachability,
    url: &str,
    timeout: Duration,
) -> DiagnosticResult {
    let mut result = DiagnosticResult::default();
    result.step(format!("requesting {url} (timeout {} ms)", timeout.as_millis()));
    let started = Instant::now();
    match bounded(timeout, reachability.check(url, timeout)).await {
        Ok(status) => result.pass(format!(
            "{url} answered HTTP {status} in {} ms",
            started.elapsed().as_millis()
        )),
        Err(e) => result.fail(format!("{url} is unreachable: {e}")),
    }
}

/// Walk platform connectivity, DNS and reachability in order and stop at
/// the first failing stage with a hint for the operator.
pub async fn diagnose_network(
    connectivity: &ConnectivityMonitor,
    reachability: &dyn Reachability,
    url: &str,
    timeout: Duration,
) -> DiagnosticResult {
    let mut result = DiagnosticResult::default();

    if !connectivity.is_online() {
        result.step("platform reports no network connection");
        return result.fail("offline: connect to a network and try again");
    }
    result.step("platform reports online");

    let dns = check_dns(url, timeout).await;
    result.log.extend(dns.log);
    if !dns.success {
        let detail = dns.detail.unwrap_or_default();
        return result.fail(format!("{detail}; check the remote URL and DNS settings"));
    }

    let reach = check_reachability(reachability, url, timeout).await;
    result.log.extend(reach.log);
    if !reach.success {
        let detail = reach.detail.unwrap_or_default();
        return result.fail(format!(
            "{detail}; a firewall, proxy or paused project may be blocking requests"
        ));
    }

    result.pass("remote endpoint is reachable")
}
