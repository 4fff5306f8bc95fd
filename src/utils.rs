use crate::errors::Result;
use log::info;

/// Formats a duration in seconds as `HH:MM:SS`.
///
/// Negative durations keep their sign: `-5` becomes `-00:00:05`. Hours are not
/// wrapped, so very long durations print as `100:00:00` and beyond.
pub fn format_clock(seconds: i64) -> String {
    let sign = if seconds < 0 { "-" } else { "" };
    let total = seconds.unsigned_abs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;
    format!("{}{:02}:{:02}:{:02}", sign, hours, minutes, secs)
}

/// Sanitizes a filename by removing invalid characters
pub fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

/// Creates a directory if it doesn't exist
pub async fn ensure_dir_exists(path: &std::path::Path) -> Result<()> {
    if !path.exists() {
        tokio::fs::create_dir_all(path).await?;
        info!("Created directory: {:?}", path);
    }
    Ok(())
}

/// Generates a unique ID for a download session
pub fn generate_session_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
