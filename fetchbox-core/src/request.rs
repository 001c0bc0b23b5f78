//! Intercepted request values.
//!
//! A [`Request`] is an owned, cheaply cloneable snapshot of an outgoing HTTP
//! request. Its URL is always absolute: relative request targets are resolved
//! against the origin when the request is taken from an [`http::Request`].
//!
//! [`RequestInfo`] is the "URL string or request" input accepted wherever a
//! request identity is needed (network fetches, cache keys).

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Method, Uri};
use serde::{Deserialize, Serialize};
use url::Url;

/// Header browsers use to announce the request mode.
pub const SEC_FETCH_MODE: HeaderName = HeaderName::from_static("sec-fetch-mode");

/// Mode of an intercepted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestMode {
    /// Regular cross-origin capable request.
    #[default]
    Cors,
    /// Request whose response is opaque to the caller.
    NoCors,
    /// Request restricted to the same origin.
    SameOrigin,
    /// Top-level document navigation.
    Navigate,
}

impl RequestMode {
    /// Parses a `Sec-Fetch-Mode` header value.
    pub fn from_header_value(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "cors" => Some(Self::Cors),
            "no-cors" => Some(Self::NoCors),
            "same-origin" => Some(Self::SameOrigin),
            "navigate" => Some(Self::Navigate),
            _ => None,
        }
    }
}

/// An intercepted request.
///
/// Cloning is cheap: the body is reference counted and headers are small.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    url: Url,
    headers: HeaderMap,
    mode: RequestMode,
    body: Bytes,
}

impl Request {
    /// Creates a request with an empty body and no headers.
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            mode: RequestMode::default(),
            body: Bytes::new(),
        }
    }

    /// Creates a `GET` request for `url`.
    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    /// Parses an absolute URL into a `GET` request.
    ///
    /// ```
    /// use fetchbox_core::Request;
    ///
    /// let request = Request::parse("https://example.com/app.js").unwrap();
    /// assert_eq!(request.method(), http::Method::GET);
    /// assert!(request.is_http());
    /// ```
    pub fn parse(url: &str) -> Result<Self, url::ParseError> {
        Url::parse(url).map(Self::get)
    }

    /// Converts an [`http::Request`] head and its buffered body.
    ///
    /// The request target is resolved against `base`, so both origin-form
    /// (`/path?query`) and absolute-form targets are accepted. A
    /// `Sec-Fetch-Mode` header sets the request mode.
    pub fn from_http(
        parts: http::request::Parts,
        body: Bytes,
        base: &Url,
    ) -> Result<Self, url::ParseError> {
        let url = base.join(&parts.uri.to_string())?;
        let mode = parts
            .headers
            .get(SEC_FETCH_MODE)
            .and_then(|value| value.to_str().ok())
            .and_then(RequestMode::from_header_value)
            .unwrap_or_default();

        Ok(Self {
            method: parts.method,
            url,
            headers: parts.headers,
            mode,
            body,
        })
    }

    /// Converts back into an [`http::Request`] with an absolute-form URI.
    pub fn into_http(self) -> Result<http::Request<Bytes>, http::Error> {
        let uri: Uri = self.url.as_str().parse()?;
        let mut request = http::Request::new(self.body);
        *request.method_mut() = self.method;
        *request.uri_mut() = uri;
        *request.headers_mut() = self.headers;
        Ok(request)
    }

    /// Request method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Absolute request URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Request headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Mutable request headers.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Request mode.
    pub fn mode(&self) -> RequestMode {
        self.mode
    }

    /// Request body.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Replaces the method.
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Replaces the URL.
    pub fn with_url(mut self, url: Url) -> Self {
        self.url = url;
        self
    }

    /// Sets a header, replacing previous values.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Replaces the mode.
    pub fn with_mode(mut self, mode: RequestMode) -> Self {
        self.mode = mode;
        self
    }

    /// Replaces the body.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Whether the URL is network addressable (`http` or `https`).
    pub fn is_http(&self) -> bool {
        matches!(self.url.scheme(), "http" | "https")
    }

    /// Whether this is a top-level navigation.
    pub fn is_navigation(&self) -> bool {
        self.mode == RequestMode::Navigate
    }
}

/// A URL string or a request, accepted wherever a request identity is needed.
#[derive(Debug, Clone)]
pub enum RequestInfo {
    /// A URL string. Must be absolute to become a request.
    Url(String),
    /// A complete request.
    Request(Request),
}

impl RequestInfo {
    /// The URL as written, for diagnostics.
    pub fn as_url_str(&self) -> &str {
        match self {
            RequestInfo::Url(url) => url,
            RequestInfo::Request(request) => request.url().as_str(),
        }
    }

    /// Turns the input into a request. URL strings become `GET` requests.
    pub fn into_request(self) -> Result<Request, url::ParseError> {
        match self {
            RequestInfo::Url(url) => Request::parse(&url),
            RequestInfo::Request(request) => Ok(request),
        }
    }
}

impl From<Request> for RequestInfo {
    fn from(request: Request) -> Self {
        RequestInfo::Request(request)
    }
}

impl From<&Request> for RequestInfo {
    fn from(request: &Request) -> Self {
        RequestInfo::Request(request.clone())
    }
}

impl From<Url> for RequestInfo {
    fn from(url: Url) -> Self {
        RequestInfo::Request(Request::get(url))
    }
}

impl From<String> for RequestInfo {
    fn from(url: String) -> Self {
        RequestInfo::Url(url)
    }
}

impl From<&str> for RequestInfo {
    fn from(url: &str) -> Self {
        RequestInfo::Url(url.to_owned())
    }
}
