//! Terminal progress for `rapt run`.

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use rapt_core::JobHandle;
use rapt_runtime::{JobState, PodInfo, RunObserver};
use std::sync::Mutex;
use std::time::Duration;

/// Prints run progress
///
/// Progress lines go to stdout ahead of any relayed output. When waiting
/// without following, a spinner on stderr shows the current state.
pub struct ConsoleObserver {
    follow: bool,
    wait: bool,
    spinner: Mutex<Option<ProgressBar>>,
}

impl ConsoleObserver {
    pub fn new(wait: bool, follow: bool) -> Self {
        Self {
            follow,
            wait,
            spinner: Mutex::new(None),
        }
    }

    /// Remove the spinner, if any
    pub fn finish(&self) {
        if let Ok(mut spinner) = self.spinner.lock() {
            if let Some(bar) = spinner.take() {
                bar.finish_and_clear();
            }
        }
    }
}

impl RunObserver for ConsoleObserver {
    fn on_submitted(&self, handle: &JobHandle) {
        println!(
            "{} Job '{}' created in namespace '{}'",
            style("✓").green(),
            style(&handle.name).bold(),
            handle.namespace
        );
        if self.follow {
            println!("Streaming logs... Press Ctrl+C to stop following (the job keeps running)");
            println!("{}", "=".repeat(50));
        } else if self.wait {
            let bar = ProgressBar::new_spinner();
            if let Ok(template) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
                bar.set_style(template);
            }
            bar.set_message(format!("Waiting for job '{}'", handle.name));
            bar.enable_steady_tick(Duration::from_millis(120));
            if let Ok(mut spinner) = self.spinner.lock() {
                *spinner = Some(bar);
            }
        }
    }

    fn on_state(&self, handle: &JobHandle, state: JobState) {
        if let Ok(spinner) = self.spinner.lock() {
            if let Some(bar) = spinner.as_ref() {
                bar.set_message(format!("Job '{}': {}", handle.name, state));
            }
        }
    }

    fn on_pod_ready(&self, pod: &PodInfo) {
        tracing::debug!(pod = %pod.name, phase = ?pod.phase, "Following pod");
    }

    fn on_log_unavailable(&self, reason: &str) {
        eprintln!("{} logs unavailable: {}", style("warning:").yellow().bold(), reason);
    }
}
