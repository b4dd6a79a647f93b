use crate::base::context::OpContext;
use crate::base::error::WatchError;
use crate::cookies::jar::CookieJar;
use crate::net::stream::HttpStream;
use bytes::Bytes;
use http::{header, Method, Request, StatusCode};
use http_body_util::{BodyExt, Full};
use serde::de::DeserializeOwned;
use tracing::trace;
use url::form_urlencoded;
use url::Url;

/// Redirect budget for ordinary requests. The credential POST and the logout
/// GET override it to exactly one hop; that limit is part of the portal's
/// protocol and must not be generalized.
pub const DEFAULT_MAX_REDIRECTS: usize = 10;

/// Cookie-carrying HTTP session.
///
/// Wraps the per-request [`HttpStream`] with the three behaviors every hop of
/// the portal exchange needs: inject matching cookies from the jar, capture
/// `Set-Cookie` into the jar, and follow redirects up to a caller-chosen
/// budget. Requests past the budget return the redirect response itself.
pub struct HttpSession {
    jar: CookieJar,
    insecure: bool,
}

/// Response with the body fully collected.
#[derive(Debug)]
pub struct SessionResponse {
    status: StatusCode,
    body: Bytes,
}

impl SessionResponse {
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn text(&self) -> Result<&str, WatchError> {
        std::str::from_utf8(&self.body)
            .map_err(|_| WatchError::Parse("response body is not utf-8".into()))
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, WatchError> {
        serde_json::from_slice(&self.body).map_err(WatchError::from)
    }
}

impl HttpSession {
    pub fn new(insecure: bool) -> Self {
        Self {
            jar: CookieJar::new(),
            insecure,
        }
    }

    pub fn jar(&self) -> &CookieJar {
        &self.jar
    }

    pub async fn get(
        &mut self,
        ctx: &OpContext,
        url: &str,
        max_redirects: usize,
    ) -> Result<SessionResponse, WatchError> {
        let url = Url::parse(url).map_err(|_| WatchError::InvalidUrl(url.to_string()))?;
        ctx.run(self.execute(Method::GET, url, None, None, max_redirects))
            .await
    }

    /// POST `params` form-encoded. `accept` overrides the `Accept` header.
    pub async fn post_form(
        &mut self,
        ctx: &OpContext,
        url: &str,
        params: &[(&str, &str)],
        max_redirects: usize,
        accept: Option<&'static str>,
    ) -> Result<SessionResponse, WatchError> {
        let url = Url::parse(url).map_err(|_| WatchError::InvalidUrl(url.to_string()))?;
        let body = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(params)
            .finish();
        ctx.run(self.execute(Method::POST, url, Some(Bytes::from(body)), accept, max_redirects))
            .await
    }

    async fn execute(
        &mut self,
        method: Method,
        url: Url,
        body: Option<Bytes>,
        accept: Option<&'static str>,
        max_redirects: usize,
    ) -> Result<SessionResponse, WatchError> {
        let mut method = method;
        let mut url = url;
        let mut body = body;
        let mut hops = 0usize;
        loop {
            let response = self.request_once(&method, &url, body.clone(), accept).await?;

            let set_cookies: Vec<&str> = response
                .headers()
                .get_all(header::SET_COOKIE)
                .iter()
                .filter_map(|value| value.to_str().ok())
                .collect();
            self.jar.put(&url, set_cookies);

            let status = response.status();
            if status.is_redirection() && hops < max_redirects {
                if let Some(location) = response
                    .headers()
                    .get(header::LOCATION)
                    .and_then(|value| value.to_str().ok())
                {
                    let next = url
                        .join(location)
                        .map_err(|_| WatchError::InvalidUrl(location.to_string()))?;
                    trace!(%status, from = %url, to = %next, "following redirect");
                    hops += 1;
                    // 303, and 301/302 after a POST, demote to GET
                    if status == StatusCode::SEE_OTHER
                        || (method == Method::POST
                            && (status == StatusCode::MOVED_PERMANENTLY
                                || status == StatusCode::FOUND))
                    {
                        method = Method::GET;
                        body = None;
                    }
                    url = next;
                    continue;
                }
            }

            let (parts, incoming) = response.into_parts();
            let bytes = incoming
                .collect()
                .await
                .map_err(WatchError::transport)?
                .to_bytes();
            return Ok(SessionResponse {
                status: parts.status,
                body: bytes,
            });
        }
    }

    async fn request_once(
        &self,
        method: &Method,
        url: &Url,
        body: Option<Bytes>,
        accept: Option<&'static str>,
    ) -> Result<http::Response<hyper::body::Incoming>, WatchError> {
        let host = url
            .host_str()
            .ok_or_else(|| WatchError::InvalidUrl(url.to_string()))?;
        let host_header = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
        let target = match url.query() {
            Some(query) => format!("{}?{}", url.path(), query),
            None => url.path().to_string(),
        };

        let mut builder = Request::builder()
            .method(method.clone())
            .uri(target)
            .header(header::HOST, host_header);
        if let Some(cookies) = self.jar.header_value(url) {
            builder = builder.header(header::COOKIE, cookies);
        }
        if let Some(accept) = accept {
            builder = builder.header(header::ACCEPT, accept);
        }
        let request = match body {
            Some(bytes) => builder
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Full::new(bytes)),
            None => builder.body(Full::new(Bytes::new())),
        }
        .map_err(WatchError::transport)?;

        let mut stream = HttpStream::open(url, self.insecure).await?;
        stream.send(request).await
    }
}
