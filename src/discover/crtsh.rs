use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;

use crate::output::LineSet;

/// Certificate-transparency lookup used as the last-resort subdomain source.
#[async_trait]
pub trait CertTransparencySource: Send + Sync {
    /// Subdomains seen in certificates for `domain`. Failures yield an empty list.
    async fn subdomains(&self, domain: &str) -> Vec<String>;
}

pub struct CrtShSource {
    client: Client,
}

impl CrtShSource {
    pub fn new(proxy: Option<&str>) -> Result<Self> {
        let mut builder = Client::builder()
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .timeout(Duration::from_secs(60));
        if let Some(p) = proxy {
            builder = builder.proxy(reqwest::Proxy::all(p)?);
        }
        Ok(Self { client: builder.build()? })
    }

    async fn fetch(&self, domain: &str) -> Result<String> {
        let q = format!("%.{}", domain);
        let url = format!("https://crt.sh/?q={}&output=json", urlencoding::encode(&q));
        let resp = self.client.get(&url).send().await?;
        if !resp.status().is_success() {
            anyhow::bail!("crt.sh answered {}", resp.status());
        }
        Ok(resp.text().await?)
    }
}

#[async_trait]
impl CertTransparencySource for CrtShSource {
    async fn subdomains(&self, domain: &str) -> Vec<String> {
        match self.fetch(domain).await {
            Ok(body) => parse_crtsh(&body),
            Err(e) => {
                tracing::warn!(domain, error = %e, "crt.sh lookup failed");
                Vec::new()
            }
        }
    }
}

/// Extract names from a crt.sh JSON answer.
///
/// `name_value` may hold several newline-separated names; wildcard prefixes are stripped.
/// Non-JSON bodies (crt.sh returns HTML when overloaded) yield nothing.
pub fn parse_crtsh(body: &str) -> Vec<String> {
    let Ok(v) = serde_json::from_str::<serde_json::Value>(body) else {
        return Vec::new();
    };
    let mut out = LineSet::new();
    for item in v.as_array().into_iter().flatten() {
        if let Some(names) = item.get("name_value").and_then(|n| n.as_str()) {
            for name in names.split(['\n', '\r']) {
                out.insert(name.trim().trim_start_matches("*."));
            }
        }
    }
    out.into_vec()
}
