//! Network adapter for bridging Tower services to fetchbox.
//!
//! [`TowerFetch`] implements fetchbox's [`Fetch`] capability on top of a Tower
//! service, so strategies reach the network through the wrapped service.
//!
//! Users typically don't interact with this module directly; it is used by
//! [`InterceptService`](crate::service::InterceptService).

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use fetchbox_core::{Fetch, FetchError, Request, Response};
use http_body::Body as HttpBody;
use http_body_util::{BodyExt, Full};
use tower::{BoxError, Service, ServiceExt};

/// Adapter that implements [`Fetch`] for Tower services.
///
/// Requests are sent with a buffered [`Full`] body and responses are collected
/// into memory before they reach the strategy.
#[derive(Clone)]
pub struct TowerFetch<S> {
    service: S,
}

impl<S> TowerFetch<S> {
    /// Creates a new adapter wrapping `service`.
    pub fn new(service: S) -> Self {
        Self { service }
    }
}

impl<S> fmt::Debug for TowerFetch<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TowerFetch")
            .field("service", &std::any::type_name::<S>())
            .finish()
    }
}

#[async_trait]
impl<S, ResBody> Fetch for TowerFetch<S>
where
    S: Service<http::Request<Full<Bytes>>, Response = http::Response<ResBody>>
        + Clone
        + Send
        + Sync
        + 'static,
    S::Future: Send,
    S::Error: Into<BoxError>,
    ResBody: HttpBody + Send + 'static,
    ResBody::Data: Send,
    ResBody::Error: Into<BoxError>,
{
    async fn fetch(&self, request: Request) -> Result<Response, FetchError> {
        let http_request = request
            .clone()
            .into_http()
            .map_err(|error| FetchError::network(&request, error))?
            .map(Full::new);

        let response = self
            .service
            .clone()
            .oneshot(http_request)
            .await
            .map_err(|error| FetchError::network(&request, error))?;

        let (parts, body) = response.into_parts();
        let body = body
            .collect()
            .await
            .map_err(|error| FetchError::network(&request, error))?
            .to_bytes();
        Ok(Response::from_http(http::Response::from_parts(parts, body)))
    }
}
