use fetchbox_core::{Request, Response};
use tracing::debug;

use crate::error::Error;
use crate::handler::StrategyHandler;
use crate::metrics::{ResponseSource, record_response};
use crate::synthetic;

use super::fetch_with_timeout;

pub(super) async fn handle(handler: &StrategyHandler, request: Request) -> Result<Response, Error> {
    let timeout = handler.network_timeout();
    let error = match fetch_with_timeout(handler, request.clone(), Some(timeout), true).await {
        Ok(response) => {
            record_response(handler.strategy_name(), ResponseSource::Network);
            return Ok(response);
        }
        Err(error) => error,
    };

    debug!(%error, url = %request.url(), "falling back to cache");
    match handler.cache_match(request).await? {
        Some(cached) => {
            record_response(handler.strategy_name(), ResponseSource::Cache);
            Ok(synthetic::mark_fallback(cached))
        }
        None => {
            record_response(handler.strategy_name(), ResponseSource::Synthetic);
            Ok(synthetic::network_error())
        }
    }
}
