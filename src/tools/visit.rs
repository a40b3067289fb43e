//! Fetch a web page and return a plain-text preview
//!
//! Requests to private and internal addresses are refused, including
//! redirects that point at them.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::redirect::{Attempt, Policy};
use scraper::{Html, Selector};
use url::{Host, Url};

use super::{ParamType, Tool, ToolArgs, ToolError, ToolHandler, ToolParam};
use crate::Result;

/// Maximum characters of page text returned
pub const PREVIEW_CHARS: usize = 1500;

/// Redirect hops followed before giving up
pub const MAX_REDIRECTS: usize = 10;

const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "noscript", "template", "svg", "head"];

/// Build the `visit_url` tool
///
/// # Errors
///
/// Returns error if the HTTP client cannot be built
pub fn tool(timeout: Duration) -> Result<Tool> {
    let client = Client::builder()
        .timeout(timeout)
        .redirect(Policy::custom(follow_redirect))
        .user_agent(concat!("camille/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(Tool::new("visit_url", VisitUrlTool { client }))
}

struct VisitUrlTool {
    client: Client,
}

impl VisitUrlTool {
    async fn fetch(&self, raw: &str) -> std::result::Result<String, String> {
        let url = Url::parse(raw).map_err(|e| format!("invalid URL: {e}"))?;

        let scheme = url.scheme();
        if scheme != "http" && scheme != "https" {
            return Err(format!("unsupported scheme {scheme}, only http and https are allowed"));
        }

        let host = url.host_str().ok_or("URL has no host")?;
        let port = url.port_or_known_default().unwrap_or(80);
        check_host(host, port).await?;

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| e.to_string())?;

        let body = response.text().await.map_err(|e| e.to_string())?;
        Ok(page_text(&body))
    }
}

#[async_trait]
impl ToolHandler for VisitUrlTool {
    fn doc(&self) -> &str {
        "Visit a URL and return a preview of the page's text content."
    }

    fn params(&self) -> Vec<ToolParam> {
        vec![ToolParam::required("url", ParamType::String).describe("The URL to visit")]
    }

    async fn call(&self, args: ToolArgs) -> std::result::Result<String, ToolError> {
        let url = args.str("url")?.trim();

        match self.fetch(url).await {
            Ok(text) => {
                let preview = truncate_chars(&text, PREVIEW_CHARS);
                tracing::debug!(url, chars = preview.chars().count(), "page visited");
                Ok(format!("Successfully visited {url}. Content preview:\n\n{preview}"))
            }
            Err(e) => {
                tracing::warn!(url, error = %e, "failed to visit page");
                Ok(format!("Error visiting URL: {e}"))
            }
        }
    }
}

/// Visible text of an HTML document with whitespace collapsed
#[must_use]
pub fn page_text(html: &str) -> String {
    let document = Html::parse_document(html);

    let root = Selector::parse("body")
        .ok()
        .and_then(|body| document.select(&body).next())
        .unwrap_or_else(|| document.root_element());

    let mut text = String::new();
    for node in root.descendants() {
        let Some(fragment) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .is_some_and(|e| SKIPPED_ELEMENTS.contains(&e.name()))
        });
        if !hidden {
            text.push_str(fragment);
            text.push(' ');
        }
    }

    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate_chars(s: &str, max: usize) -> &str {
    s.char_indices().nth(max).map_or(s, |(idx, _)| &s[..idx])
}

fn follow_redirect(attempt: Attempt) -> reqwest::redirect::Action {
    match check_redirect(attempt.url(), attempt.previous().len()) {
        Ok(()) => attempt.follow(),
        Err(reason) => {
            tracing::warn!(url = %attempt.url(), reason = %reason, "redirect refused");
            attempt.error(reason)
        }
    }
}

/// Decide whether to follow a redirect to `url` after `hops` earlier requests
///
/// Only the literal host is checked; names are resolved when the request is
/// made.
///
/// # Errors
///
/// Returns the reason the redirect is refused
pub fn check_redirect(url: &Url, hops: usize) -> std::result::Result<(), String> {
    if hops > MAX_REDIRECTS {
        return Err(format!("more than {MAX_REDIRECTS} redirects"));
    }

    let scheme = url.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(format!("redirect to unsupported scheme {scheme}"));
    }

    match url.host() {
        None => Err("redirect target has no host".to_string()),
        Some(Host::Ipv4(ip)) if is_blocked_ip(IpAddr::V4(ip)) => {
            Err(format!("redirect to private address {ip}"))
        }
        Some(Host::Ipv6(ip)) if is_blocked_ip(IpAddr::V6(ip)) => {
            Err(format!("redirect to private address {ip}"))
        }
        Some(Host::Domain(domain)) if is_local_name(domain) => {
            Err(format!("redirect to private address {domain}"))
        }
        Some(_) => Ok(()),
    }
}

fn is_local_name(domain: &str) -> bool {
    let domain = domain.trim_end_matches('.').to_ascii_lowercase();
    domain == "localhost" || domain.ends_with(".localhost")
}

async fn check_host(host: &str, port: u16) -> std::result::Result<(), String> {
    let host = host.trim_start_matches('[').trim_end_matches(']');
    let addrs = tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| format!("failed to resolve {host}: {e}"))?;

    for addr in addrs {
        if is_blocked_ip(addr.ip()) {
            return Err(format!("{host} resolves to private address {}", addr.ip()));
        }
    }
    Ok(())
}

/// Whether an address is loopback, private, link-local or unspecified
#[must_use]
pub fn is_blocked_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_blocked_ipv4(v4),
        IpAddr::V6(v6) => v6
            .to_ipv4_mapped()
            .map_or_else(|| is_blocked_ipv6(v6), is_blocked_ipv4),
    }
}

const fn is_blocked_ipv4(ip: Ipv4Addr) -> bool {
    let [a, b, ..] = ip.octets();
    matches!(
        (a, b),
        (0 | 10 | 127, _) | (172, 16..=31) | (192, 168) | (169, 254)
    )
}

fn is_blocked_ipv6(ip: Ipv6Addr) -> bool {
    let first = ip.segments()[0];
    ip.is_loopback()
        || ip.is_unspecified()
        // fc00::/7 unique local
        || first & 0xfe00 == 0xfc00
        // fe80::/10 link-local
        || first & 0xffc0 == 0xfe80
}
