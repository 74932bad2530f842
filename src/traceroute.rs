//! Traceroute runner: invoke the system tool and scrape hop addresses and timings.

use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;
use thiserror::Error;
use tokio::process::Command;

#[derive(Error, Debug)]
pub enum TraceError {
    #[error("invalid web address: '{0}'")]
    InvalidHost(String),

    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {stderr}")]
    Failed { program: String, status: String, stderr: String },

    #[error("pattern compile error: {0}")]
    Pattern(#[from] regex::Error),
}

/// Round-trip time summary across all samples of a trace, in ms.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimeInfo {
    /// Largest increase between consecutive samples
    pub longest_diff: f64,
    /// Last sample seen
    pub total_time: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceResult {
    pub ip_addresses: Vec<String>,
    pub time_info: Option<TimeInfo>,
}

fn cached(cell: &'static OnceLock<Result<Regex, regex::Error>>, pattern: &str) -> Result<&'static Regex, TraceError> {
    cell.get_or_init(|| Regex::new(pattern))
        .as_ref()
        .map_err(|e| TraceError::Pattern(e.clone()))
}

/// Accept only DNS-style names ending in an alphabetic TLD. IP literals are rejected.
pub fn validate_host(host: &str) -> Result<&str, TraceError> {
    static HOST: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
    let re = cached(&HOST, r"^[a-zA-Z0-9][a-zA-Z0-9.-]*\.[a-zA-Z]{2,}$")?;
    if re.is_match(host) {
        Ok(host)
    } else {
        Err(TraceError::InvalidHost(host.to_string()))
    }
}

/// Program and arguments for the platform's traceroute.
pub fn command(host: &str, hops: u32, use_sudo: bool) -> Vec<String> {
    let hops = hops.to_string();
    if cfg!(windows) {
        return ["tracert", "-h", hops.as_str(), "-w", "1", host].map(String::from).to_vec();
    }

    let mut argv = Vec::with_capacity(11);
    if use_sudo {
        argv.push("sudo".to_string());
    }
    argv.extend(["tcptraceroute", "-m", hops.as_str(), "-q", "1", "-w", "1", host, "443"].map(String::from));
    argv
}

/// Every parenthesized dotted address in the output, in order of appearance.
pub fn parse_ip_addresses(output: &str) -> Vec<String> {
    static ADDR: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
    let Ok(re) = cached(&ADDR, r"\(([0-9.]+)\)") else {
        return Vec::new();
    };
    re.captures_iter(output)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Summarize every `N ms` / `N.N ms` sample. `None` when there are no samples.
pub fn parse_timing(output: &str) -> Option<TimeInfo> {
    static MS: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
    let re = cached(&MS, r"(\d+\.?\d*)\s*ms").ok()?;
    let samples: Vec<f64> = re
        .captures_iter(output)
        .filter_map(|c| c.get(1)?.as_str().parse().ok())
        .collect();

    let total_time = *samples.last()?;
    let longest_diff = samples
        .windows(2)
        .map(|w| w[1] - w[0])
        .fold(None, |best: Option<f64>, d| Some(best.map_or(d, |b| b.max(d))))
        .unwrap_or(0.0);

    Some(TimeInfo { longest_diff, total_time })
}

/// Run a traceroute to `host` and scrape the result.
pub async fn run(host: &str, hops: u32, use_sudo: bool) -> Result<TraceResult, TraceError> {
    let host = validate_host(host)?;
    let argv = command(host, hops, use_sudo);
    let (program, args) = argv.split_first().ok_or_else(|| TraceError::InvalidHost(host.to_string()))?;

    log::info!("Tracing route to {} (max {} hops)", host, hops);
    let output = Command::new(program)
        .args(args)
        .output()
        .await
        .map_err(|source| TraceError::Spawn { program: program.clone(), source })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        log::error!("{} failed ({}): {}", program, output.status, stderr);
        return Err(TraceError::Failed {
            program: program.clone(),
            status: output.status.to_string(),
            stderr,
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    if stdout.trim().is_empty() {
        log::warn!("{} produced no output for {}", program, host);
    }

    let result = TraceResult {
        ip_addresses: parse_ip_addresses(&stdout),
        time_info: parse_timing(&stdout),
    };
    log::debug!("{}: {} hops parsed", host, result.ip_addresses.len());
    Ok(result)
}
