use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Future;
use futures::future::BoxFuture;
use pin_project::pin_project;
use tower::BoxError;

use crate::service::InterceptBody;

/// Response future of [`InterceptService`](crate::service::InterceptService).
///
/// Resolves with the routed response, or with the inner service's response
/// when no route applies.
#[pin_project]
pub struct InterceptFuture {
    #[pin]
    inner: BoxFuture<'static, Result<http::Response<InterceptBody>, BoxError>>,
}

impl InterceptFuture {
    pub(crate) fn new(
        inner: BoxFuture<'static, Result<http::Response<InterceptBody>, BoxError>>,
    ) -> Self {
        Self { inner }
    }
}

impl Future for InterceptFuture {
    type Output = Result<http::Response<InterceptBody>, BoxError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.project().inner.poll(cx)
    }
}
