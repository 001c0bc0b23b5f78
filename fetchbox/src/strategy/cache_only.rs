use fetchbox_core::{Request, Response};

use crate::error::Error;
use crate::handler::StrategyHandler;
use crate::metrics::{ResponseSource, record_response};
use crate::synthetic;

pub(super) async fn handle(handler: &StrategyHandler, request: Request) -> Result<Response, Error> {
    match handler.cache_match(request.clone()).await? {
        Some(cached) => {
            record_response(handler.strategy_name(), ResponseSource::Cache);
            Ok(if handler.is_loader() {
                synthetic::mark_fallback(cached)
            } else {
                cached
            })
        }
        None if handler.is_loader() => {
            record_response(handler.strategy_name(), ResponseSource::Synthetic);
            Ok(synthetic::cache_miss_payload())
        }
        None => Err(Error::CacheMiss {
            url: request.url().to_string(),
        }),
    }
}
