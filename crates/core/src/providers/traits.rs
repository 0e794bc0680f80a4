use async_trait::async_trait;

use crate::errors::CoreError;
use crate::models::quote::FundQuote;

/// Abstraction over the external fund valuation feed.
///
/// Implementations perform exactly one outbound attempt per call and never
/// retry; callers decide how a failure degrades.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Human-readable name of this source (for logs/errors).
    fn name(&self) -> &str;

    /// Fetch the latest valuation for a fund.
    ///
    /// A missing or malformed payload is an error, not an empty quote.
    async fn fetch_quote(&self, fund_code: &str) -> Result<FundQuote, CoreError>;
}
