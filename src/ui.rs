use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::{Duration, Instant};

use crate::orchestrator::StatsSnapshot;

pub const TITLE: &str = "Live Video Upscaling";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UiMode {
    Auto,
    Plain,
    Pretty,
}

#[derive(Clone, Debug)]
pub struct Ui {
    mode: UiMode,
    is_tty: bool,
}

impl Ui {
    pub fn new(mode: UiMode, is_tty: bool) -> Self {
        Self { mode, is_tty }
    }

    pub fn from_args(ui_flag: Option<&str>, is_tty: bool) -> Self {
        let mode = match ui_flag {
            Some("plain") => UiMode::Plain,
            Some("pretty") => UiMode::Pretty,
            _ => UiMode::Auto,
        };
        Self::new(mode, is_tty)
    }

    fn use_pretty(&self) -> bool {
        self.is_tty
            && match self.mode {
                UiMode::Pretty | UiMode::Auto => true,
                UiMode::Plain => false,
            }
    }

    /// Show the static title line. Counters are appended on `update`.
    pub fn status(&self) -> StatusLine {
        if self.use_pretty() {
            let spinner = ProgressBar::new_spinner();
            spinner.set_draw_target(ProgressDrawTarget::stderr());
            spinner.enable_steady_tick(Duration::from_millis(120));
            let style = ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner());
            spinner.set_style(style);
            spinner.set_message(TITLE);
            StatusLine::new(Some(spinner))
        } else {
            eprintln!("==> {}", TITLE);
            StatusLine::new(None)
        }
    }
}

pub struct StatusLine {
    start: Instant,
    spinner: Option<ProgressBar>,
}

impl StatusLine {
    fn new(spinner: Option<ProgressBar>) -> Self {
        Self {
            start: Instant::now(),
            spinner,
        }
    }

    /// Refresh the counters. Plain mode stays quiet; the log carries them.
    pub fn update(&self, stats: &StatsSnapshot) {
        if let Some(spinner) = &self.spinner {
            spinner.set_message(format_status(stats));
        }
    }
}

impl Drop for StatusLine {
    fn drop(&mut self) {
        let message = format!("✔ {} ({})", TITLE, format_duration(self.start.elapsed()));
        if let Some(spinner) = &self.spinner {
            spinner.finish_with_message(message);
        } else {
            eprintln!("{message}");
        }
    }
}

fn format_status(stats: &StatsSnapshot) -> String {
    format!(
        "{} | presented {} | dropped {} | failed {}",
        TITLE, stats.presented, stats.dropped_overload, stats.inference_failures
    )
}

fn format_duration(duration: Duration) -> String {
    if duration.as_secs() >= 1 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        format!("{}ms", duration.as_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_mode_never_uses_spinner() {
        assert!(!Ui::from_args(Some("plain"), true).use_pretty());
        assert!(!Ui::from_args(Some("pretty"), false).use_pretty());
        assert!(Ui::from_args(None, true).use_pretty());
    }

    #[test]
    fn status_message_includes_counters() {
        let stats = StatsSnapshot {
            presented: 12,
            dropped_overload: 3,
            inference_failures: 1,
            ..StatsSnapshot::default()
        };
        let message = format_status(&stats);
        assert!(message.starts_with(TITLE));
        assert!(message.contains("presented 12"));
        assert!(message.contains("dropped 3"));
        assert!(message.contains("failed 1"));
    }

    #[test]
    fn durations_switch_units_at_one_second() {
        assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
    }
}
