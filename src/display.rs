use crate::progress::Snapshot;
use indicatif::{ProgressBar, ProgressStyle};

pub const DOWNLOAD_COMPLETE_MESSAGE: &str = "Download Complete";
pub const INVALID_URL_MESSAGE: &str = "Invalid Playlist Link";

/// Bar resolution: one step per tenth of a percent.
const BAR_LENGTH: u64 = 1000;

/// Terminal rendering of the session snapshot.
pub struct TerminalDisplay {
    bar: ProgressBar,
}

impl TerminalDisplay {
    pub fn new() -> Self {
        Self::with_bar(ProgressBar::new(BAR_LENGTH))
    }

    fn with_bar(bar: ProgressBar) -> Self {
        let style = ProgressStyle::with_template("{bar:40.green/black} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");
        bar.set_style(style);
        bar.set_length(BAR_LENGTH);
        Self { bar }
    }

    pub fn render(&self, snapshot: &Snapshot) {
        self.bar.set_position((snapshot.percentage * 10.0).round() as u64);

        let mut message = format!("{} {}", snapshot.percentage_label(), snapshot.time_label());
        if let Some(title) = &snapshot.current_track_title {
            message.push(' ');
            message.push_str(title);
        }
        self.bar.set_message(message);
    }

    pub fn notify_completed(&self) {
        self.bar.println(DOWNLOAD_COMPLETE_MESSAGE);
    }

    pub fn notify_invalid_source(&self, source: &str) {
        self.bar.println(format!("{}: {}", INVALID_URL_MESSAGE, source));
    }

    pub fn finish(&self) {
        self.bar.abandon();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_snapshot_fields() {
        let display = TerminalDisplay::with_bar(ProgressBar::hidden());
        display.render(&Snapshot {
            percentage: 50.0,
            elapsed_seconds: 30,
            eta_seconds: Some(90),
            eta_display: "00:01:30".to_string(),
            current_track_title: Some("Song A".to_string()),
        });

        assert_eq!(display.bar.position(), 500);
        assert_eq!(display.bar.message(), "50.0% [00:00:30<00:01:30] Song A");
    }

    #[test]
    fn renders_without_title() {
        let display = TerminalDisplay::with_bar(ProgressBar::hidden());
        display.render(&Snapshot {
            percentage: 12.5,
            elapsed_seconds: 3,
            eta_seconds: None,
            eta_display: "??:??:??".to_string(),
            current_track_title: None,
        });

        assert_eq!(display.bar.position(), 125);
        assert_eq!(display.bar.message(), "12.5% [00:00:03<??:??:??]");
    }
}
