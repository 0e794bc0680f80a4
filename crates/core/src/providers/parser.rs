use std::sync::OnceLock;

use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;
use serde::Deserialize;

use crate::errors::CoreError;
use crate::models::quote::FundQuote;

const PROVIDER: &str = "fundgz";

/// Raw payload inside the `jsonpgz(...)` wrapper. All values arrive as strings.
#[derive(Debug, Deserialize)]
struct RawFundPayload {
    #[serde(default)]
    fundcode: String,
    name: String,
    jzrq: String,
    #[serde(default)]
    dwjz: String,
    #[serde(default)]
    gsz: String,
    #[serde(default)]
    gszzl: String,
    gztime: String,
}

fn jsonp_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?s)jsonpgz\((\{.*\})\);?").expect("Invalid jsonpgz pattern")
    })
}

/// Turn a raw quote-source response body into a typed [`FundQuote`].
///
/// The body looks like `jsonpgz({"fundcode":"004253",...});`. Pure function:
/// no I/O, no clock.
pub fn parse_fundgz_response(fund_code: &str, body: &str) -> Result<FundQuote, CoreError> {
    let content = body.trim();
    let json = jsonp_pattern()
        .captures(content)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .ok_or_else(|| unavailable(fund_code, "response is not a jsonpgz(...) payload"))?;

    let raw: RawFundPayload = serde_json::from_str(json)
        .map_err(|e| unavailable(fund_code, &format!("malformed payload: {e}")))?;

    let code = if raw.fundcode.trim().is_empty() {
        fund_code.to_string()
    } else {
        raw.fundcode.trim().to_string()
    };

    Ok(FundQuote {
        fund_code: code,
        name: raw.name.trim().to_string(),
        net_value_date: parse_date(fund_code, "jzrq", &raw.jzrq)?,
        unit_net_value: parse_number(fund_code, "dwjz", &raw.dwjz)?,
        estimated_value: parse_number(fund_code, "gsz", &raw.gsz)?,
        estimated_change_pct: parse_number(fund_code, "gszzl", &raw.gszzl)?,
        estimated_at: parse_timestamp(fund_code, &raw.gztime)?,
    })
}

/// Numeric fields come as strings; an empty string means zero.
fn parse_number(fund_code: &str, field: &str, value: &str) -> Result<f64, CoreError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(0.0);
    }
    let parsed: f64 = trimmed
        .parse()
        .map_err(|_| unavailable(fund_code, &format!("field {field} is not a number: '{trimmed}'")))?;
    if !parsed.is_finite() {
        return Err(unavailable(fund_code, &format!("field {field} is not finite")));
    }
    Ok(parsed)
}

fn parse_date(fund_code: &str, field: &str, value: &str) -> Result<NaiveDate, CoreError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|e| unavailable(fund_code, &format!("field {field} is not a date: {e}")))
}

/// `gztime` is `YYYY-MM-DD HH:MM`; some responses carry seconds too.
fn parse_timestamp(fund_code: &str, value: &str) -> Result<NaiveDateTime, CoreError> {
    let trimmed = value.trim();
    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S"))
        .map_err(|e| unavailable(fund_code, &format!("field gztime is not a timestamp: {e}")))
}

fn unavailable(fund_code: &str, reason: &str) -> CoreError {
    CoreError::QuoteUnavailable {
        fund_code: fund_code.to_string(),
        reason: format!("{PROVIDER}: {reason}"),
    }
}
