// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Authenticated requests against one server, with conditional headers and
//! status mapping.

use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};

use crate::config::{AuthMethod, CalDavConfig};
use crate::error::CalDavError;
use crate::types::{ETag, Href};

/// Condition a request is sent under.
#[derive(Debug, Clone, Copy)]
pub enum Precondition<'a> {
    /// Unconditional.
    Always,
    /// The resource must not exist yet (`If-None-Match: *`).
    Absent,
    /// The resource must still carry this version (`If-Match`).
    Matches(&'a ETag),
}

/// Sends requests to the origin of the configured base URL.
#[derive(Debug)]
pub struct Transport {
    client: Client,
    auth: AuthMethod,
    origin: String,
}

impl Transport {
    /// Creates a transport for the server in `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: CalDavConfig) -> Result<Self, CalDavError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(&config.user_agent)
            .build()?;
        Ok(Self {
            client,
            origin: origin_of(&config.base_url).to_string(),
            auth: config.auth,
        })
    }

    /// Absolute URL of an href. Hrefs that already are URLs are kept.
    pub fn resolve(&self, href: &str) -> String {
        if href.starts_with("http://") || href.starts_with("https://") {
            return href.to_string();
        }
        format!("{}/{}", self.origin, href.trim_start_matches('/'))
    }

    /// Starts an authenticated request for `href`.
    pub fn request(&self, method: Method, href: &Href) -> RequestBuilder {
        let req = self.client.request(method, self.resolve(href.as_str()));
        match &self.auth {
            AuthMethod::Basic { username, password } => req.basic_auth(username, Some(password)),
            AuthMethod::Bearer { token } => req.bearer_auth(token),
            AuthMethod::None => req,
        }
    }

    /// Starts a request with a WebDAV extension method such as `PROPFIND`.
    ///
    /// # Errors
    ///
    /// Returns an error if `method` is not a valid method token.
    pub fn dav_request(&self, method: &str, href: &Href) -> Result<RequestBuilder, CalDavError> {
        let method = Method::from_bytes(method.as_bytes())
            .map_err(|e| CalDavError::Http(format!("Invalid method: {e}")))?;
        Ok(self.request(method, href))
    }

    /// Sends a request under `precondition` and maps failure statuses to errors.
    ///
    /// # Errors
    ///
    /// Returns [`CalDavError::PreconditionFailed`] on `412`,
    /// [`CalDavError::NotFound`] on `404`, [`CalDavError::Auth`] on `401` and
    /// `403`, and [`CalDavError::Http`] on anything else unexpected.
    pub async fn send(
        &self,
        req: RequestBuilder,
        precondition: Precondition<'_>,
    ) -> Result<Response, CalDavError> {
        let req = match precondition {
            Precondition::Always => req,
            Precondition::Absent => req.header("If-None-Match", "*"),
            Precondition::Matches(etag) => req.header("If-Match", etag.as_str()),
        };
        let resp = req.send().await?;
        let status = resp.status();
        if status.is_success() || status == StatusCode::MULTI_STATUS {
            return Ok(resp);
        }

        let path = resp.url().path().to_string();
        match status {
            StatusCode::PRECONDITION_FAILED => Err(CalDavError::PreconditionFailed(path)),
            StatusCode::NOT_FOUND => Err(CalDavError::NotFound(Href::new(path))),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(CalDavError::Auth(status.to_string()))
            }
            _ => {
                let text = resp
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unable to read response".to_string());
                Err(CalDavError::Http(format!("{status}: {text}")))
            }
        }
    }
}

/// The `ETag` header of a response, if the server sent one.
pub fn response_etag(resp: &Response) -> Option<ETag> {
    resp.headers()
        .get(reqwest::header::ETAG)
        .and_then(|v| v.to_str().ok())
        .map(|s| ETag::new(s.to_string()))
}

/// Scheme and authority of a URL, without a trailing slash.
fn origin_of(url: &str) -> &str {
    let origin = url
        .find("://")
        .and_then(|scheme| url[scheme + 3..].find('/').map(|i| &url[..scheme + 3 + i]))
        .unwrap_or(url);
    origin.trim_end_matches('/')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport(base: &str) -> Transport {
        Transport::new(CalDavConfig::new(base, AuthMethod::None)).unwrap()
    }

    #[test]
    fn resolve_joins_paths_to_origin() {
        let t = transport("https://dav.example.com/remote.php/dav/");
        assert_eq!(
            t.resolve("/cal/work/a.ics"),
            "https://dav.example.com/cal/work/a.ics"
        );
    }

    #[test]
    fn resolve_keeps_absolute_urls() {
        let t = transport("https://dav.example.com");
        assert_eq!(
            t.resolve("http://other.example.org/x.ics"),
            "http://other.example.org/x.ics"
        );
    }

    #[test]
    fn origin_without_path() {
        assert_eq!(origin_of("http://127.0.0.1:8080"), "http://127.0.0.1:8080");
        assert_eq!(origin_of("http://127.0.0.1:8080/"), "http://127.0.0.1:8080");
        assert_eq!(origin_of("https://a.example/dav/x"), "https://a.example");
    }
}
