use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::Semaphore;

use crate::errors::CoreError;
use crate::models::quote::FundQuote;
use crate::providers::traits::QuoteSource;

/// Fetches live quotes through a [`QuoteSource`] with bounded concurrency.
///
/// Every call goes to the source; nothing is cached. A user with N funds costs
/// N outbound calls, at most `max_concurrent` of them in flight at once across
/// all callers sharing this service.
pub struct QuoteService {
    source: Arc<dyn QuoteSource>,
    permits: Arc<Semaphore>,
}

impl QuoteService {
    pub fn new(source: Arc<dyn QuoteSource>, max_concurrent: usize) -> Self {
        Self {
            source,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    /// Fetch a quote, surfacing the failure.
    pub async fn fetch(&self, fund_code: &str) -> Result<FundQuote, CoreError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| CoreError::Network(format!("Quote fetch limiter closed: {e}")))?;
        self.source.fetch_quote(fund_code).await
    }

    /// Fetch a quote, degrading any failure to `None` for this cycle.
    pub async fn latest(&self, fund_code: &str) -> Option<FundQuote> {
        match self.fetch(fund_code).await {
            Ok(quote) => Some(quote),
            Err(e) => {
                log::warn!(
                    "Quote fetch for fund {fund_code} via {} failed: {e}",
                    self.source.name()
                );
                None
            }
        }
    }

    /// Fetch several quotes concurrently; results line up with `fund_codes`.
    pub async fn latest_many(&self, fund_codes: &[String]) -> Vec<Option<FundQuote>> {
        join_all(fund_codes.iter().map(|code| self.latest(code))).await
    }
}
