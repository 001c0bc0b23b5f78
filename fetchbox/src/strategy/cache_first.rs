use fetchbox_core::{Request, Response};
use tracing::debug;

use crate::error::Error;
use crate::handler::StrategyHandler;
use crate::metrics::{ResponseSource, record_response};
use crate::synthetic;

use super::fetch_with_timeout;

pub(super) async fn handle(handler: &StrategyHandler, request: Request) -> Result<Response, Error> {
    if let Some(cached) = handler.cache_match(request.clone()).await? {
        record_response(handler.strategy_name(), ResponseSource::Cache);
        return Ok(if handler.is_loader() {
            synthetic::mark_fallback(cached)
        } else {
            cached
        });
    }

    match fetch_with_timeout(handler, request, None, true).await {
        Ok(response) => {
            record_response(handler.strategy_name(), ResponseSource::Network);
            Ok(response)
        }
        Err(error) => {
            debug!(%error, "cache miss and network failure");
            record_response(handler.strategy_name(), ResponseSource::Synthetic);
            Ok(if handler.is_loader() {
                synthetic::network_error()
            } else {
                synthetic::not_found()
            })
        }
    }
}
