use std::cell::RefCell;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crate::error::{RunnerError, TranscodeError};
use crate::ffmpeg::transcoder::{TranscodeContext, Transcoder};
use crate::fstools::{classify_file, DirEntryCategory};
use crate::job::{BatchJob, BatchReport, JobResult, SkipReason};
use crate::request::ConversionRequest;

/// Everything the runner tells the front end, in the order it happens.
#[derive(Clone, Debug)]
pub enum RunnerMessage {
    /// The engine is about to be started for `request`.
    Started { index: usize, total: usize, request: ConversionRequest },
    Progress { index: usize, total: usize, fraction: f64 },
    Finished { index: usize, total: usize, result: JobResult },
    Done(BatchReport),
}

/// Handle to a batch running on the background worker.
pub struct RunHandle {
    pub messages: Receiver<RunnerMessage>,
    thread: JoinHandle<BatchReport>,
}

impl RunHandle {
    pub fn join(self) -> thread::Result<BatchReport> {
        self.thread.join()
    }
}

/// Clears the running flag however the run ends.
struct RunningGuard {
    running: Arc<AtomicBool>,
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

/// Runs conversion requests one at a time, in order.
#[derive(Clone)]
pub struct JobRunner {
    transcoder: Arc<dyn Transcoder>,
    cancel: Arc<AtomicBool>,
    abort: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
}

impl JobRunner {
    pub fn new(transcoder: Arc<dyn Transcoder>) -> Self {
        JobRunner {
            transcoder,
            cancel: Arc::new(AtomicBool::new(false)),
            abort: Arc::new(AtomicBool::new(false)),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Stops the batch before its next request. The current one finishes.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    /// Stops the batch and kills the current request.
    pub fn abort(&self) {
        self.cancel();
        self.abort.store(true, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn should_stop(&self) -> bool { self.cancel.load(Ordering::SeqCst) }

    fn begin(&self) -> Result<RunningGuard, RunnerError> {
        if self.running.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst).is_err() {
            return Err(RunnerError::AlreadyRunning);
        }
        self.cancel.store(false, Ordering::SeqCst);
        self.abort.store(false, Ordering::SeqCst);
        Ok(RunningGuard { running: Arc::clone(&self.running) })
    }

    /// Processes `batch` on the calling thread. `on_progress` is called with
    /// `(index, total, result)` after every request.
    pub fn run<F>(&self, batch: BatchJob, mut on_progress: F) -> Result<BatchReport, RunnerError>
    where
        F: FnMut(usize, usize, &JobResult),
    {
        let _guard = self.begin()?;
        let report = self.process(batch, &mut |msg: RunnerMessage| {
            if let RunnerMessage::Finished { index, total, result } = &msg {
                on_progress(*index, *total, result);
            }
        });
        Ok(report)
    }

    /// Processes `batch` on a worker thread and publishes every step on the
    /// returned handle's channel, ending with [`RunnerMessage::Done`].
    pub fn spawn(&self, batch: BatchJob) -> Result<RunHandle, RunnerError> {
        let guard = self.begin()?;
        let (tx, rx) = mpsc::channel();
        let runner = self.clone();
        let thread = thread::spawn(move || {
            let _guard = guard;
            runner.process(batch, &mut |msg: RunnerMessage| {
                let _ = tx.send(msg);
            })
        });
        Ok(RunHandle { messages: rx, thread })
    }

    fn process(&self, batch: BatchJob, publish: &mut dyn FnMut(RunnerMessage)) -> BatchReport {
        let total = batch.len();
        let mut report = BatchReport::default();
        log::info!("starting batch of {}", total);

        for (index, request) in batch.into_iter().enumerate() {
            let result = if report.fatal.is_some() {
                JobResult::skipped(&request, SkipReason::Aborted)
            } else if self.should_stop() {
                JobResult::skipped(&request, SkipReason::Cancelled)
            } else {
                self.process_request(index, total, &request, publish, &mut report.fatal)
            };

            log::info!("[{}/{}] {:?}: {}", index + 1, total, request.input, result.status);
            publish(RunnerMessage::Finished { index, total, result: result.clone() });
            report.results.push(result);
        }

        publish(RunnerMessage::Done(report.clone()));
        report
    }

    fn process_request(
        &self,
        index: usize,
        total: usize,
        request: &ConversionRequest,
        publish: &mut dyn FnMut(RunnerMessage),
        fatal: &mut Option<String>,
    ) -> JobResult {
        if !request.overwrite && request.output.exists() {
            return JobResult::skipped(request, SkipReason::OutputExists);
        }

        if classify_file(&request.input) != DirEntryCategory::RegularFile {
            let err = TranscodeError::filesystem(
                &request.input,
                io::Error::new(io::ErrorKind::NotFound, "input is no longer a readable file"),
            );
            return JobResult::failed(request, &err, Default::default());
        }

        publish(RunnerMessage::Started { index, total, request: request.clone() });

        let publish = RefCell::new(publish);
        let progress = |fraction: f64| {
            if let Ok(mut p) = publish.try_borrow_mut() {
                (*p)(RunnerMessage::Progress { index, total, fraction });
            }
        };
        let ctx = TranscodeContext {
            abort: &self.abort,
            progress: &progress,
        };

        let started = Instant::now();
        match self.transcoder.transcode(request, &ctx) {
            Ok(()) => JobResult::succeeded(request, started.elapsed()),
            Err(TranscodeError::Cancelled) => JobResult::skipped(request, SkipReason::Cancelled),
            Err(err) => {
                if err.is_fatal() {
                    log::error!("{}", err);
                    *fatal = Some(err.to_string());
                }
                JobResult::failed(request, &err, started.elapsed())
            },
        }
    }
}
