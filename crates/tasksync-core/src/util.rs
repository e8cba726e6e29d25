//! Small helpers shared by config, storage, and sync code.

/// Trimmed text, or `None` for missing and blank input.
pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    let value = value?;
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

pub fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

/// Cap remote error text before it lands in logs or `sync_error`.
pub fn compact_text(value: &str) -> String {
    value.trim().chars().take(180).collect()
}

/// Current Unix timestamp in milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Next `updated_at` for a local mutation; never goes backwards even when
/// the wall clock does.
pub fn next_updated_at(previous: i64) -> i64 {
    now_millis().max(previous)
}
