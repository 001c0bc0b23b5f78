use fetchbox_core::{Request, Response};
use http::Method;

use crate::error::Error;
use crate::handler::StrategyHandler;
use crate::metrics::{ResponseSource, record_response};

use super::fetch_with_timeout;

pub(super) async fn handle(handler: &StrategyHandler, request: Request) -> Result<Response, Error> {
    // non-GET requests are never raced against the timeout
    let timeout = (request.method() == Method::GET).then(|| handler.network_timeout());
    let response = fetch_with_timeout(handler, request, timeout, false).await?;
    record_response(handler.strategy_name(), ResponseSource::Network);
    Ok(response)
}
