use chrono::DateTime;

const TSDB_CONFIG: &str = "TSDB_CONFIG";

pub fn get_config_path() -> Option<String> {
    std::env::var(TSDB_CONFIG).ok()
}

const TSDB_TABLE: &str = "TSDB_TABLE";

pub fn get_table_override() -> Option<String> {
    std::env::var(TSDB_TABLE).ok().filter(|table| !table.is_empty())
}

/// Parse a timestamp given either as epoch milliseconds or RFC 3339
pub fn parse_timestamp(input: &str) -> anyhow::Result<i64> {
    if let Ok(millis) = input.parse::<i64>() {
        return Ok(millis);
    }

    DateTime::parse_from_rfc3339(input)
        .map(|dt| dt.timestamp_millis())
        .map_err(|e| anyhow::anyhow!("invalid timestamp '{input}': {e}"))
}

/// Parse a `key=value` tag argument
pub fn parse_tag(input: &str) -> anyhow::Result<(String, String)> {
    match input.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(anyhow::anyhow!("invalid tag '{input}', expected key=value")),
    }
}
