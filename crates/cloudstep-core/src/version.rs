use chrono::{DateTime, Utc};

/// Format of generated App Engine version IDs: `YYYYMMDDtHHMMSS`.
pub const VERSION_ID_FORMAT: &str = "%Y%m%dt%H%M%S";

/// Version ID derived from a UTC timestamp.
pub fn generate_version_id(now: DateTime<Utc>) -> String {
    now.format(VERSION_ID_FORMAT).to_string()
}

/// Version ID for the current time.
pub fn current_version_id() -> String {
    generate_version_id(Utc::now())
}
