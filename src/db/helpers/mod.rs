use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};

use crate::astigmatism::AstigmatismVerdict;
use crate::models::{PassFail, Tier, YesNo};

pub fn to_score(value: i64, field: &str) -> Result<u8> {
    u8::try_from(value)
        .ok()
        .filter(|score| *score <= 10)
        .ok_or_else(|| anyhow!("{field} contains out-of-range score {value}"))
}

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
}

pub fn parse_pass_fail(value: &str, field: &str) -> Result<PassFail> {
    match value {
        "PASS" => Ok(PassFail::Pass),
        "FAIL" => Ok(PassFail::Fail),
        other => Err(anyhow!("{field} has unknown result {other}")),
    }
}

pub fn parse_tier(value: &str) -> Result<Tier> {
    match value {
        "Healthy" => Ok(Tier::Healthy),
        "Mild" => Ok(Tier::Mild),
        "At Risk" => Ok(Tier::AtRisk),
        other => Err(anyhow!("unknown overall result {other}")),
    }
}

pub fn parse_yes_no(value: &str, field: &str) -> Result<YesNo> {
    match value {
        "Yes" => Ok(YesNo::Yes),
        "No" => Ok(YesNo::No),
        other => Err(anyhow!("{field} has unknown answer {other}")),
    }
}

pub fn parse_verdict(value: &str) -> Result<AstigmatismVerdict> {
    AstigmatismVerdict::from_message(value)
        .ok_or_else(|| anyhow!("unknown astigmatism result {value}"))
}
