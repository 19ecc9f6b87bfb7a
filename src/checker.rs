use anyhow::{Context, Result};
use std::future::Future;
use std::time::Duration;
use tokio::net::TcpStream;

use crate::models::{ProbeVerdict, Protocol};

/// Reachability prober. Tries plain HTTP, then HTTPS with certificate
/// verification disabled (reachability, not trust), then a raw TCP connect.
/// The first tier that succeeds decides the reported protocol.
pub struct Checker {
    http: reqwest::Client,
    https_insecure: reqwest::Client,
}

impl Checker {
    pub fn new() -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .context("failed to build HTTP client")?;
        let https_insecure = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .build()
            .context("failed to build HTTPS client")?;
        Ok(Self { http, https_insecure })
    }

    /// One probe attempt, no retries. Success at the HTTP tiers means a 200
    /// response; anything else falls through to the next tier.
    pub async fn probe(&self, host: &str, port: u16, path: &str, timeout: Duration) -> ProbeVerdict {
        let path = normalize_path(path);

        let url = format!("http://{host}:{port}{path}");
        if get_ok(&self.http, &url, timeout).await {
            return ProbeVerdict::reachable(Protocol::Http);
        }

        let url = format!("https://{host}:{port}{path}");
        if get_ok(&self.https_insecure, &url, timeout).await {
            return ProbeVerdict::reachable(Protocol::Https);
        }

        match tokio::time::timeout(timeout, TcpStream::connect((host, port))).await {
            Ok(Ok(_stream)) => ProbeVerdict::reachable(Protocol::Tcp),
            _ => ProbeVerdict::unreachable(),
        }
    }

    /// Cycle verdict: up to `retry_count` probes, short-circuiting on the
    /// first success, so a transient blip does not register as an outage.
    pub async fn check_with_retry(
        &self,
        host: &str,
        port: u16,
        path: &str,
        retry_count: u32,
        retry_delay: Duration,
        timeout: Duration,
    ) -> ProbeVerdict {
        with_retry(retry_count, retry_delay, || self.probe(host, port, path, timeout)).await
    }
}

/// Runs `attempt` up to `attempts` times (at least once), sleeping
/// `delay` between attempts and never after the last one.
pub async fn with_retry<F, Fut>(attempts: u32, delay: Duration, mut attempt: F) -> ProbeVerdict
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ProbeVerdict>,
{
    let mut verdict = attempt().await;
    for _ in 1..attempts.max(1) {
        if verdict.up {
            break;
        }
        tokio::time::sleep(delay).await;
        verdict = attempt().await;
    }
    verdict
}

async fn get_ok(client: &reqwest::Client, url: &str, timeout: Duration) -> bool {
    match client.get(url).timeout(timeout).send().await {
        Ok(response) => response.status() == reqwest::StatusCode::OK,
        Err(_) => false,
    }
}

fn normalize_path(path: &str) -> String {
    if path.is_empty() {
        "/".to_string()
    } else if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}
