use std::fmt::Display;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::TranscodeError;
use crate::request::ConversionRequest;

/// The requests of one run, in the order they will be processed.
#[derive(Clone, Debug, Default)]
pub struct BatchJob {
    requests: Vec<ConversionRequest>,
}

impl BatchJob {
    pub fn new(requests: Vec<ConversionRequest>) -> Self {
        BatchJob { requests }
    }

    pub fn requests(&self) -> &[ConversionRequest] {
        &self.requests
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }
}

impl IntoIterator for BatchJob {
    type Item = ConversionRequest;
    type IntoIter = std::vec::IntoIter<ConversionRequest>;

    fn into_iter(self) -> Self::IntoIter {
        self.requests.into_iter()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    OutputExists,
    Cancelled,
    /// An earlier request could not start the engine at all.
    Aborted,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobStatus {
    Succeeded,
    Failed,
    Skipped(SkipReason),
}

impl Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status_str = match self {
            JobStatus::Succeeded => "ok",
            JobStatus::Failed => "failed",
            JobStatus::Skipped(SkipReason::OutputExists) => "skipped (output exists)",
            JobStatus::Skipped(SkipReason::Cancelled) => "skipped (cancelled)",
            JobStatus::Skipped(SkipReason::Aborted) => "skipped (aborted)",
        };
        write!(f, "{}", status_str)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct JobResult {
    pub input: PathBuf,
    pub output: PathBuf,
    pub status: JobStatus,
    pub exit_code: Option<i32>,
    pub detail: Option<String>,
    pub elapsed: Duration,
}

impl JobResult {
    fn new(request: &ConversionRequest, status: JobStatus) -> Self {
        JobResult {
            input: request.input.clone(),
            output: request.output.clone(),
            status,
            exit_code: None,
            detail: None,
            elapsed: Duration::ZERO,
        }
    }

    pub fn succeeded(request: &ConversionRequest, elapsed: Duration) -> Self {
        JobResult {
            elapsed,
            ..JobResult::new(request, JobStatus::Succeeded)
        }
    }

    pub fn failed(request: &ConversionRequest, err: &TranscodeError, elapsed: Duration) -> Self {
        let exit_code = match err {
            TranscodeError::Execution { code, .. } => *code,
            _ => None,
        };
        JobResult {
            exit_code,
            elapsed,
            detail: Some(err.to_string()),
            ..JobResult::new(request, JobStatus::Failed)
        }
    }

    pub fn skipped(request: &ConversionRequest, reason: SkipReason) -> Self {
        JobResult::new(request, JobStatus::Skipped(reason))
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.status, JobStatus::Skipped(_))
    }
}

/// Every result of a run, in request order.
#[derive(Clone, Debug, Default)]
pub struct BatchReport {
    pub results: Vec<JobResult>,
    /// Set when the run stopped early because the engine could not start.
    pub fatal: Option<String>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.count(|s| s == JobStatus::Succeeded)
    }

    pub fn failed(&self) -> usize {
        self.count(|s| s == JobStatus::Failed)
    }

    pub fn skipped(&self) -> usize {
        self.results.iter().filter(|r| r.is_skipped()).count()
    }

    pub fn is_clean(&self) -> bool {
        self.fatal.is_none() && self.failed() == 0
    }

    fn count(&self, f: impl Fn(JobStatus) -> bool) -> usize {
        self.results.iter().filter(|r| f(r.status)).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::OptionSet;
    use std::path::Path;

    fn request() -> ConversionRequest {
        ConversionRequest::new(PathBuf::from("song.mp3"), Path::new("out"), OptionSet::Audio { gain_db: 0.0 }, false)
    }

    #[test]
    fn test_failed_keeps_exit_code() {
        let err = TranscodeError::Execution { code: Some(69), stderr: String::from("Invalid data") };
        let result = JobResult::failed(&request(), &err, Duration::from_secs(1));
        assert_eq!(result.status, JobStatus::Failed);
        assert_eq!(result.exit_code, Some(69));
        assert_eq!(result.detail.as_deref(), Some("ffmpeg exited with 69: Invalid data"));
    }

    #[test]
    fn test_report_counts() {
        let r = request();
        let report = BatchReport {
            results: vec![
                JobResult::succeeded(&r, Duration::ZERO),
                JobResult::skipped(&r, SkipReason::OutputExists),
                JobResult::skipped(&r, SkipReason::Cancelled),
            ],
            fatal: None,
        };
        assert_eq!((report.succeeded(), report.failed(), report.skipped()), (1, 0, 2));
        assert!(report.is_clean());
    }

    #[test]
    fn test_status_display() {
        assert_eq!(JobStatus::Skipped(SkipReason::OutputExists).to_string(), "skipped (output exists)");
        assert_eq!(JobStatus::Succeeded.to_string(), "ok");
    }
}
