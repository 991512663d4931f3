use std::time::Duration;

use reqwest::header::LOCATION;
use reqwest::redirect::Policy;
use tracing::{debug, warn};

const EXPAND_TIMEOUT: Duration = Duration::from_secs(10);

/// True for `t.co` shortener links.
pub fn is_short_url(raw: &str) -> bool {
    url::Url::parse(raw)
        .ok()
        .and_then(|u| u.host_str().map(str::to_lowercase))
        .is_some_and(|h| h == "t.co")
}

/// Resolves `t.co` links by reading the redirect target without following it.
pub struct ShortUrlExpander {
    client: reqwest::Client,
}

impl ShortUrlExpander {
    pub fn new() -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .redirect(Policy::none())
            .timeout(EXPAND_TIMEOUT)
            .build()?;
        Ok(Self { client })
    }

    /// Redirect target of `short_url`, trying HEAD and then GET.
    /// `None` when neither yields a usable `Location`.
    pub async fn resolve(&self, short_url: &str) -> Option<String> {
        for method in [reqwest::Method::HEAD, reqwest::Method::GET] {
            match self.client.request(method.clone(), short_url).send().await {
                Ok(resp) => {
                    if let Some(target) = location(&resp, short_url) {
                        debug!(short_url, target = %target, %method, "Expanded short URL");
                        return Some(target);
                    }
                }
                Err(e) => {
                    debug!(short_url, %method, error = %e, "Short URL request failed");
                }
            }
        }
        warn!(short_url, "Could not expand short URL");
        None
    }
}

fn location(resp: &reqwest::Response, base: &str) -> Option<String> {
    if !resp.status().is_redirection() {
        return None;
    }
    let raw = resp.headers().get(LOCATION)?.to_str().ok()?;
    // Relative Location headers are resolved against the request URL.
    url::Url::parse(base)
        .ok()?
        .join(raw)
        .ok()
        .map(|u| u.to_string())
}
