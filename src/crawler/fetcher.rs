//! HTTP probe implementation
//!
//! One probe per URL: HEAD first with a short timeout, falling back to GET
//! when the server mishandles HEAD. Redirects are followed manually so the
//! first hop survives alongside the final destination, and transport
//! failures collapse into a synthetic 503 so callers always get a result
//! they can persist.

use crate::config::FetcherConfig;
use crate::storage::{ProbeResult, RedirectHop};
use reqwest::header::{HeaderMap, HeaderValue, LOCATION};
use reqwest::{redirect::Policy, Client, Method};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use url::Url;

/// Redirect hops followed before a probe is abandoned.
const MAX_REDIRECTS: usize = 10;

/// Statuses that mean the server did not handle HEAD properly.
const HEAD_FALLBACK_STATUSES: [u16; 3] = [400, 404, 405];

/// Performs outbound probes against target URLs
pub struct Fetcher {
    client: Client,
    head_timeout: Duration,
    get_timeout: Duration,
    get_only_domains: Vec<String>,
}

#[derive(Debug)]
enum ProbeError {
    Transport(reqwest::Error),
    TooManyRedirects,
}

impl ProbeError {
    fn is_timeout(&self) -> bool {
        matches!(self, ProbeError::Transport(e) if e.is_timeout())
    }
}

impl fmt::Display for ProbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeError::Transport(e) => write!(f, "{}", e),
            ProbeError::TooManyRedirects => write!(f, "more than {} redirects", MAX_REDIRECTS),
        }
    }
}

impl Fetcher {
    pub fn new(config: &FetcherConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            // Redirects are followed manually to capture the first hop
            .redirect(Policy::none())
            .pool_max_idle_per_host(50)
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(Self {
            client,
            head_timeout: Duration::from_secs(config.head_timeout),
            get_timeout: Duration::from_secs(config.get_timeout),
            get_only_domains: config
                .get_only_domains
                .iter()
                .map(|domain| domain.to_lowercase())
                .collect(),
        })
    }

    /// Probes a URL for liveness and metadata.
    ///
    /// Always yields a result: connection-level failures (refused, reset,
    /// DNS) on either method become a synthetic 503 with empty headers so a
    /// record can be written either way. A HEAD that times out is treated
    /// like a 404 and falls through to the GET path.
    pub async fn probe(&self, url: &Url) -> ProbeResult {
        let outcome = if self.is_get_only(url) {
            tracing::debug!("Probing {} with GET (HEAD-unreliable domain)", url);
            self.request(Method::GET, url, self.get_timeout).await
        } else {
            match self.request(Method::HEAD, url, self.head_timeout).await {
                Ok(probe) if HEAD_FALLBACK_STATUSES.contains(&probe.status) => {
                    tracing::debug!("Checking {} with a GET", url);
                    self.request(Method::GET, url, self.get_timeout).await
                }
                Err(err) if err.is_timeout() => {
                    tracing::debug!("HEAD timed out for {}, checking with a GET", url);
                    self.request(Method::GET, url, self.get_timeout).await
                }
                other => other,
            }
        };

        match outcome {
            Ok(probe) => probe,
            Err(err) => {
                tracing::warn!("Probe failed for {}: {}", url, err);
                ProbeResult::synthetic_failure(url.as_str())
            }
        }
    }

    fn is_get_only(&self, url: &Url) -> bool {
        let host = match url.host_str() {
            Some(host) => host.to_lowercase(),
            None => return false,
        };
        self.get_only_domains
            .iter()
            .any(|domain| host == *domain || host.ends_with(&format!(".{}", domain)))
    }

    /// Issues one request, following redirects by hand.
    async fn request(
        &self,
        method: Method,
        url: &Url,
        timeout: Duration,
    ) -> Result<ProbeResult, ProbeError> {
        let mut current = url.clone();
        let mut first_hop: Option<RedirectHop> = None;

        for _ in 0..=MAX_REDIRECTS {
            let response = self
                .client
                .request(method.clone(), current.clone())
                .timeout(timeout)
                .send()
                .await
                .map_err(ProbeError::Transport)?;

            let status = response.status();
            if status.is_redirection() {
                if let Some(next) = redirect_target(&current, response.headers().get(LOCATION)) {
                    first_hop.get_or_insert_with(|| RedirectHop {
                        url: current.to_string(),
                        status: status.as_u16(),
                    });
                    current = next;
                    continue;
                }
            }

            // Terminal response. The body is never read: only headers and
            // status matter, and dropping the response closes the stream.
            return Ok(ProbeResult {
                status: status.as_u16(),
                headers: collect_headers(response.headers()),
                final_url: response.url().to_string(),
                redirect: first_hop,
            });
        }

        Err(ProbeError::TooManyRedirects)
    }
}

/// Resolves a Location header against the redirecting URL.
fn redirect_target(base: &Url, location: Option<&HeaderValue>) -> Option<Url> {
    let location = location?.to_str().ok()?;
    base.join(location).ok()
}

/// Lower-cased name → value map of the response headers.
fn collect_headers(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.as_str().to_string(), value.to_string()))
        })
        .collect()
}
