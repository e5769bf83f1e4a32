//! Progress indicators
//!
//! Bars are hidden when stderr is not a terminal, so piped output stays clean.

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Create a progress bar for a batch of images
pub fn image_progress(total: usize) -> ProgressBar {
    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} images ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░"),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// A bar that never draws, for machine-readable output
pub fn hidden() -> ProgressBar {
    ProgressBar::hidden()
}

/// A `(done, total)` callback that drives `pb`.
pub fn progress_sink(pb: &ProgressBar) -> impl FnMut(usize, usize) + '_ {
    move |done, total| {
        pb.set_length(total as u64);
        pb.set_position(done as u64);
    }
}

/// Finish a progress bar with a success message
pub fn finish_success(pb: &ProgressBar, message: &str) {
    pb.finish_with_message(format!("✓ {}", message));
}

/// Finish a progress bar with an error message
pub fn finish_error(pb: &ProgressBar, message: &str) {
    pb.finish_with_message(format!("✗ {}", message));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hidden_bar_accepts_updates() {
        let pb = hidden();
        let mut sink = progress_sink(&pb);
        sink(1, 1);
        finish_error(&pb, "stopped");
    }

    #[test]
    fn test_sink_tracks_position() {
        let pb = image_progress(3);
        {
            let mut sink = progress_sink(&pb);
            sink(1, 3);
            sink(2, 3);
        }
        assert_eq!(pb.position(), 2);
        assert_eq!(pb.length(), Some(3));
        finish_success(&pb, "done");
    }
}
