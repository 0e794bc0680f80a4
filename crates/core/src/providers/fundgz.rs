use async_trait::async_trait;
use reqwest::header::USER_AGENT;
use reqwest::Client;
use std::time::Duration;

use crate::errors::CoreError;
use crate::models::quote::FundQuote;
use crate::models::settings::TrackerSettings;
use super::parser::parse_fundgz_response;
use super::traits::QuoteSource;

/// Real-time fund valuation feed served as JSONP.
///
/// - **Free**: no API key.
/// - **Shape**: `jsonpgz({"fundcode":..,"name":..,"jzrq":..,"dwjz":..,"gsz":..,"gszzl":..,"gztime":..});`
/// - **Freshness**: estimates refresh during trading hours; a timestamp query
///   parameter defeats intermediate caches.
///
/// One attempt per call with a bounded client timeout; no retries.
pub struct FundgzProvider {
    client: Client,
    url_template: String,
    user_agent: String,
}

impl FundgzProvider {
    pub fn new(settings: &TrackerSettings) -> Result<Self, CoreError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            url_template: settings.quote_url_template.clone(),
            user_agent: settings.user_agent.clone(),
        })
    }

    /// Build the request URL for a fund at a given unix timestamp.
    pub fn quote_url(&self, fund_code: &str, timestamp: i64) -> String {
        self.url_template
            .replace("{fund_code}", fund_code)
            .replace("{timestamp}", &timestamp.to_string())
    }
}

#[async_trait]
impl QuoteSource for FundgzProvider {
    fn name(&self) -> &str {
        "fundgz"
    }

    async fn fetch_quote(&self, fund_code: &str) -> Result<FundQuote, CoreError> {
        let code = fund_code.trim();
        if code.is_empty() || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(CoreError::ValidationError(format!(
                "Invalid fund code '{fund_code}'"
            )));
        }

        let url = self.quote_url(code, chrono::Utc::now().timestamp());

        let body = self
            .client
            .get(&url)
            .header(USER_AGENT, &self.user_agent)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| CoreError::Api {
                provider: self.name().into(),
                message: format!(
                    "Quote request for {code} failed with status {}",
                    e.status().map(|s| s.to_string()).unwrap_or_else(|| "unknown".into())
                ),
            })?
            .text()
            .await?;

        parse_fundgz_response(code, &body)
    }
}
