//! Progress indicators for the tagwarden CLI.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use tagengine::ScanObserver;

/// Draws a bar advancing once per scanned resource group.
pub struct ScanProgress {
    bar: ProgressBar,
    failed: usize,
}

impl ScanProgress {
    /// A bar on stderr, or a hidden one when `quiet`.
    pub fn new(quiet: bool) -> Self {
        let bar = ProgressBar::new(0);
        if quiet {
            bar.set_draw_target(ProgressDrawTarget::hidden());
        }
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} groups {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        bar.set_message("listing");
        Self { bar, failed: 0 }
    }

    /// Remove the bar from the terminal.
    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ScanObserver for ScanProgress {
    fn on_groups_listed(&mut self, count: usize) {
        self.bar.set_length(count as u64);
        self.bar.set_message("");
    }

    fn on_group_scanned(&mut self, group: &str, result: Result<usize, &armkit::Error>) {
        if result.is_err() {
            self.failed += 1;
            self.bar.set_message(format!("({} failed)", self.failed));
        } else {
            log::trace!("{group} done");
        }
        self.bar.inc(1);
    }
}
