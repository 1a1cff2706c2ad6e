use anyhow::{Context, Result};
use std::str::FromStr;
use std::time::Duration;

pub fn parse_duration(duration_str: &str) -> Result<Duration> {
    humantime::Duration::from_str(duration_str.trim())
        .map(Into::into)
        .with_context(|| format!("Invalid duration format: {}", duration_str))
}
