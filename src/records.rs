//! Tolerant decoders for the JSON emitted by the external tools.
//!
//! Each decoder returns `None` for anything it cannot use (blank lines, invalid
//! JSON, missing fields); callers aggregate the hits and never see an error.

use std::collections::BTreeSet;

use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
struct NaabuRecord {
    host: Option<String>,
    ip: Option<String>,
    port: Option<Value>,
}

/// `host:port` from one line of `naabu -json`; `host` falls back to `ip`.
pub fn host_port(line: &str) -> Option<String> {
    let rec: NaabuRecord = decode(line)?;
    let host = [rec.host, rec.ip]
        .into_iter()
        .flatten()
        .map(|h| h.trim().to_string())
        .find(|h| !h.is_empty())?;
    let port = port_number(rec.port.as_ref()?)?;
    Some(format!("{host}:{port}"))
}

fn port_number(v: &Value) -> Option<u16> {
    let port = match v {
        Value::Number(n) => n.as_u64().and_then(|p| u16::try_from(p).ok()),
        Value::String(s) => s.trim().parse().ok(),
        // newer naabu releases nest the port: {"port": {"Port": 443, ...}}
        Value::Object(map) => map.get("Port").or_else(|| map.get("port")).and_then(port_number),
        _ => None,
    };
    port.filter(|p| *p > 0)
}

#[derive(Debug, Deserialize)]
struct HttpxRecord {
    url: Option<String>,
}

/// `url` from one line of `httpx -json`.
pub fn httpx_url(line: &str) -> Option<String> {
    let rec: HttpxRecord = decode(line)?;
    rec.url.map(|u| u.trim().to_string()).filter(|u| !u.is_empty())
}

#[derive(Debug, Deserialize)]
struct KatanaRecord {
    request: Option<KatanaRequest>,
}

#[derive(Debug, Deserialize)]
struct KatanaRequest {
    endpoint: Option<String>,
    url: Option<String>,
}

/// Crawled URL from one katana output line: `request.url` (or `request.endpoint`) of a JSON
/// record, or the line itself when katana printed plain URLs. Only http(s) URLs are kept.
pub fn katana_url(line: &str) -> Option<String> {
    let line = line.trim();
    let candidate = match decode::<KatanaRecord>(line) {
        Some(rec) => {
            let req = rec.request?;
            req.url.or(req.endpoint)?
        }
        None => line.to_string(),
    };
    is_http_url(&candidate).then_some(candidate)
}

pub fn is_http_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

#[derive(Debug, Deserialize)]
struct FfufReport {
    #[serde(default)]
    results: Vec<Value>,
}

/// URLs from an `ffuf -of json` report whose status is in `allowed`.
///
/// An unreadable report yields nothing; individual malformed results are skipped.
pub fn ffuf_urls(report: &str, allowed: &BTreeSet<u16>) -> Vec<String> {
    let Ok(parsed) = serde_json::from_str::<FfufReport>(report) else {
        return Vec::new();
    };
    parsed
        .results
        .iter()
        .filter_map(|item| {
            let status = item.get("status").and_then(status_code)?;
            let url = item.get("url")?.as_str()?.trim();
            (allowed.contains(&status) && !url.is_empty()).then(|| url.to_string())
        })
        .collect()
}

fn status_code(v: &Value) -> Option<u16> {
    match v {
        Value::Number(n) => n.as_u64().and_then(|c| u16::try_from(c).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn decode<T: serde::de::DeserializeOwned>(line: &str) -> Option<T> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    serde_json::from_str(line).ok()
}
