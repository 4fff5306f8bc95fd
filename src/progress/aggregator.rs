use super::events::Event;
use crate::errors::AppError;
use crate::utils::format_clock;
use log::debug;
use std::time::Instant;

/// Shown in place of the ETA until the worker reports one.
pub const ETA_PLACEHOLDER: &str = "??:??:??";
/// Appended to track titles shortened for display.
pub const TRUNCATION_MARKER: &str = "...";

/// Outcome of feeding one event to the aggregator.
#[derive(Debug)]
pub enum Applied {
    Updated,
    /// Percentage reached 100 for the first time this session.
    Completed,
    /// Valid event with no effect on the display (the terminate signal).
    Ignored,
    Rejected(AppError),
}

/// What the display surface draws on each tick.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub percentage: f64,
    pub elapsed_seconds: u64,
    /// Seconds left, extrapolated from the last ETA report. Negative once overdue.
    pub eta_seconds: Option<i64>,
    pub eta_display: String,
    /// Possibly shortened with [`TRUNCATION_MARKER`].
    pub current_track_title: Option<String>,
}

impl Snapshot {
    /// One decimal, e.g. `50.0%`.
    pub fn percentage_label(&self) -> String {
        format!("{:.1}%", self.percentage)
    }

    pub fn elapsed_display(&self) -> String {
        format_clock(self.elapsed_seconds as i64)
    }

    /// `[elapsed<eta]`, e.g. `[00:00:30<00:01:30]`.
    pub fn time_label(&self) -> String {
        format!("[{}<{}]", self.elapsed_display(), self.eta_display)
    }
}

#[derive(Debug, Clone, Copy)]
struct EtaReport {
    remaining_seconds: u64,
    received_at: Instant,
}

/// Folds worker events into display state.
///
/// Time-derived fields are recomputed from the stored start and ETA timestamps
/// on every [`tick`](Self::tick), never accumulated, so irregular or skipped
/// ticks cannot introduce drift.
#[derive(Debug)]
pub struct ProgressAggregator {
    task_start_time: Instant,
    title_max_len: usize,
    percentage: f64,
    elapsed_seconds: u64,
    last_eta: Option<EtaReport>,
    displayed_eta: Option<i64>,
    current_track_title: Option<String>,
    completion_signalled: bool,
    rejected_events: u64,
}

impl ProgressAggregator {
    pub fn new(task_start_time: Instant, title_max_len: usize) -> Self {
        Self {
            task_start_time,
            title_max_len,
            percentage: 0.0,
            elapsed_seconds: 0,
            last_eta: None,
            displayed_eta: None,
            current_track_title: None,
            completion_signalled: false,
            rejected_events: 0,
        }
    }

    pub fn apply(&mut self, event: Event) -> Applied {
        self.apply_at(event, Instant::now())
    }

    /// Applies `event` as if it arrived at `now`.
    pub fn apply_at(&mut self, event: Event, now: Instant) -> Applied {
        if let Err(e) = event.validate() {
            self.rejected_events += 1;
            return Applied::Rejected(e);
        }

        match event {
            Event::Progress { completed, total } => {
                self.percentage = (100.0 * completed as f64 / total as f64).clamp(0.0, 100.0);
                if self.percentage >= 100.0 && !self.completion_signalled {
                    self.completion_signalled = true;
                    return Applied::Completed;
                }
                Applied::Updated
            }
            Event::TrackTitle(title) => {
                debug!("Now processing: {}", title);
                self.current_track_title = Some(title);
                Applied::Updated
            }
            Event::EtaUpdate { remaining_seconds, .. } => {
                // Each report replaces the previous one outright.
                self.last_eta = Some(EtaReport {
                    remaining_seconds,
                    received_at: now,
                });
                self.displayed_eta = Some(clamp_seconds(remaining_seconds));
                Applied::Updated
            }
            Event::Terminate => Applied::Ignored,
        }
    }

    /// Recomputes elapsed time and the extrapolated ETA for `now`.
    pub fn tick(&mut self, now: Instant) {
        self.elapsed_seconds = now.saturating_duration_since(self.task_start_time).as_secs();
        self.displayed_eta = self.last_eta.map(|eta| {
            let since = now.saturating_duration_since(eta.received_at).as_secs();
            clamp_seconds(eta.remaining_seconds).saturating_sub(clamp_seconds(since))
        });
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            percentage: self.percentage,
            elapsed_seconds: self.elapsed_seconds,
            eta_seconds: self.displayed_eta,
            eta_display: self
                .displayed_eta
                .map(format_clock)
                .unwrap_or_else(|| ETA_PLACEHOLDER.to_string()),
            current_track_title: self.display_title(),
        }
    }

    pub fn percentage(&self) -> f64 {
        self.percentage
    }

    /// Full, untruncated title of the current track.
    pub fn track_title(&self) -> Option<&str> {
        self.current_track_title.as_deref()
    }

    pub fn display_title(&self) -> Option<String> {
        self.current_track_title
            .as_deref()
            .map(|title| truncate_title(title, self.title_max_len))
    }

    pub fn is_complete(&self) -> bool {
        self.completion_signalled
    }

    pub fn rejected_events(&self) -> u64 {
        self.rejected_events
    }
}

/// Estimates beyond `i64::MAX` seconds are shown as `i64::MAX`.
fn clamp_seconds(seconds: u64) -> i64 {
    i64::try_from(seconds).unwrap_or(i64::MAX)
}

/// Keeps the first `max_len` characters and appends [`TRUNCATION_MARKER`].
pub fn truncate_title(title: &str, max_len: usize) -> String {
    if title.chars().count() > max_len {
        let mut shortened: String = title.chars().take(max_len).collect();
        shortened.push_str(TRUNCATION_MARKER);
        shortened
    } else {
        title.to_string()
    }
}
