use regex::Regex;

use crate::errors::TryciError;

/// The HTML test runner only emits `total_error` / `total_fail` cells when
/// there was at least one error or failure.
const FAILURE_MARKERS: &str = r#"id\s*=\s*["']?total_(error|fail)\b"#;

pub fn test_report_passed(html: &str) -> Result<bool, TryciError> {
    let markers = Regex::new(FAILURE_MARKERS)?;
    Ok(!markers.is_match(html))
}
