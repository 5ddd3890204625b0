use std::fmt::Write;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::RecvTimeoutError;
use std::time::Duration;

use human_repr::{HumanCount, HumanDuration};
use kdam::{term, tqdm, Bar, BarExt};

use crate::fstools::file_size;
use crate::job::{BatchReport, JobResult, JobStatus};
use crate::job_runner::{JobRunner, RunHandle, RunnerMessage};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Terminal front end: owns the progress bar and drains the runner's
/// messages on the main thread.
pub struct ConsolePresenter {
    pbar: Bar,
    interrupts: usize,
}

impl ConsolePresenter {
    pub fn new(total: usize) -> Self {
        term::init(false);
        let pbar = tqdm!(
            total = total,
            desc = "converting",
            position = 0,
            force_refresh = true
        );
        ConsolePresenter { pbar, interrupts: 0 }
    }

    /// Renders messages until the batch is done. `interrupt` is polled between
    /// messages: the first hit lets the current file finish, the second kills
    /// it. Returns `None` if the worker went away without a report.
    pub fn drain(&mut self, handle: &RunHandle, runner: &JobRunner, interrupt: &AtomicBool) -> Option<BatchReport> {
        loop {
            if interrupt.swap(false, Ordering::SeqCst) {
                self.handle_interrupt(runner);
            }

            match handle.messages.recv_timeout(POLL_INTERVAL) {
                Ok(RunnerMessage::Done(report)) => {
                    println!();
                    return Some(report);
                },
                Ok(msg) => self.render(msg),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return None,
            }
        }
    }

    fn handle_interrupt(&mut self, runner: &JobRunner) {
        self.interrupts += 1;
        if self.interrupts == 1 {
            runner.cancel();
            self.write("Stopping after the current file; press Ctrl-C again to abort it.");
        } else {
            runner.abort();
            self.write("Aborting the current file.");
        }
    }

    fn render(&mut self, msg: RunnerMessage) {
        match msg {
            RunnerMessage::Started { index, total, request } => {
                self.pbar.set_description(format!("[{}/{}] {}", index + 1, total, display_name(&request.input)));
                self.pbar.set_postfix("");
                let _ = self.pbar.refresh();
            },
            RunnerMessage::Progress { fraction, .. } => {
                self.pbar.set_postfix(format!("{:>3.0}%", fraction * 100.0));
                let _ = self.pbar.refresh();
            },
            RunnerMessage::Finished { index, result, .. } => {
                if !matches!(result.status, JobStatus::Succeeded) {
                    self.write(&summary_line(&result));
                }
                let _ = self.pbar.update_to(index + 1);
            },
            RunnerMessage::Done(_) => (),
        }
    }

    fn write(&mut self, text: &str) {
        if self.pbar.write(text).is_err() {
            eprintln!("{}", text);
        }
    }
}

fn display_name(path: &Path) -> String {
    match path.file_name() {
        Some(name) => name.to_string_lossy().to_string(),
        None => path.display().to_string(),
    }
}

fn summary_line(result: &JobResult) -> String {
    let mut line = format!("{:<24} {}", result.status.to_string(), display_name(&result.input));
    match result.status {
        JobStatus::Succeeded => {
            let size = file_size(&result.output).unwrap_or(0);
            let _ = write!(
                line,
                " -> {} ({}, {})",
                result.output.display(),
                size.human_count_bytes(),
                result.elapsed.as_secs_f64().human_duration()
            );
        },
        _ => {
            if let Some(detail) = &result.detail {
                let _ = write!(line, ": {}", detail);
            }
        },
    }
    line
}

/// The end-of-batch listing: every request with its final status, then the
/// totals.
pub fn render_summary(report: &BatchReport) -> String {
    let mut out = String::new();
    for result in &report.results {
        let _ = writeln!(out, "  {}", summary_line(result));
    }
    if let Some(fatal) = &report.fatal {
        let _ = writeln!(out, "Batch aborted: {}", fatal);
    }
    let _ = write!(
        out,
        "{} succeeded, {} failed, {} skipped",
        report.succeeded(),
        report.failed(),
        report.skipped()
    );
    out
}
