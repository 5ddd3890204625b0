use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::process::{Child, ChildStdout, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use crate::error::TranscodeError;
use crate::fstools::{normalize, remove_partial};
use crate::request::{ConversionRequest, OptionSet};
use super::parameter_factories::audio::listen_args;
use super::parameter_factories::conversion_args;
use super::parameter_factories::video::preview_args;
use super::probe::probe_duration;
use super::FFmpeg;

/// Number of trailing stderr lines attached to a failure.
const STDERR_TAIL: usize = 5;

/// How long a silent engine can go before the abort flag is looked at again.
const ABORT_POLL: Duration = Duration::from_millis(100);

/// What a running conversion can see of its surroundings.
pub struct TranscodeContext<'a> {
    /// Once set, the conversion should stop as soon as it can and leave no
    /// output behind.
    pub abort: &'a AtomicBool,
    /// Receives the completed fraction of the current request, `0.0..=1.0`.
    pub progress: &'a dyn Fn(f64),
}

impl TranscodeContext<'_> {
    pub fn aborted(&self) -> bool {
        self.abort.load(Ordering::SeqCst)
    }
}

/// Converts a single request. Implementations must not report success
/// unless the output is complete.
pub trait Transcoder: Send + Sync {
    fn transcode(&self, request: &ConversionRequest, ctx: &TranscodeContext) -> Result<(), TranscodeError>;
}

#[derive(Debug, Default)]
struct ProgressState {
    out_time: Duration,
}

enum FFmpegStdoutResult {
    Continue,
    Render,
}

pub struct FFmpegTranscoder {
    ffmpeg: FFmpeg,
}

impl FFmpegTranscoder {
    pub fn new(ffmpeg: FFmpeg) -> Self {
        FFmpegTranscoder { ffmpeg }
    }

    fn spawn(&self, request: &ConversionRequest) -> Result<Child, TranscodeError> {
        let args = conversion_args(request);
        log::debug!(
            "{} {}",
            self.ffmpeg.ffmpeg.display(),
            args.iter().map(|s| format!("{:?}", s)).collect::<Vec<String>>().join(" ")
        );

        let mut cmd = Command::new(&self.ffmpeg.ffmpeg);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        // Ctrl-C in the terminal must reach only us; the runner decides when
        // the engine dies.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        cmd.spawn().map_err(|source| TranscodeError::Invocation {
            program: self.ffmpeg.ffmpeg.clone(),
            source,
        })
    }

    /// Follows `-progress pipe:1` until the stream closes. Returns `true` when
    /// the child was killed because of an abort.
    fn consume_stdout(&self, stdout: ChildStdout, child: &mut Child, duration: Option<Duration>, ctx: &TranscodeContext) -> bool {
        let (tx, rx) = mpsc::channel();
        let reader = thread::spawn(move || {
            for line in BufReader::new(stdout).lines().map_while(Result::ok) {
                if tx.send(line).is_err() {
                    break;
                }
            }
        });

        let mut progress = ProgressState::default();
        let killed = loop {
            if ctx.aborted() {
                log::warn!("abort requested; killing ffmpeg ({})", child.id());
                if let Err(err) = child.kill() {
                    log::error!("error killing ffmpeg process ({}) {:?}", child.id(), err);
                }
                break true;
            }

            match rx.recv_timeout(ABORT_POLL) {
                Ok(l) => {
                    if let FFmpegStdoutResult::Render = handle_ffmpeg_stdout_line(&l, &mut progress) {
                        if let Some(total) = duration.filter(|d| !d.is_zero()) {
                            (ctx.progress)(f64::min(1.0, progress.out_time.as_secs_f64() / total.as_secs_f64()));
                        }
                    }
                },
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break false,
            }
        };

        drop(rx);
        if reader.join().is_err() {
            log::error!("ffmpeg stdout reader panicked");
        }
        killed
    }

    /// Writes a single scaled frame of a video request to `still`. Audio
    /// requests have nothing to show and are left alone.
    pub fn render_preview(&self, request: &ConversionRequest, still: &Path) -> Result<bool, TranscodeError> {
        let OptionSet::Video { target, fit } = request.options else {
            return Ok(false);
        };

        let output = Command::new(&self.ffmpeg.ffmpeg)
            .args(preview_args(&request.input, still, target, fit))
            .stdin(Stdio::null())
            .output()
            .map_err(|source| TranscodeError::Invocation {
                program: self.ffmpeg.ffmpeg.clone(),
                source,
            })?;

        if output.status.success() {
            Ok(true)
        } else {
            let stderr = read_stderr_tail(output.stderr.as_slice());
            if let Err(err) = remove_partial(still) {
                log::error!("unable to remove partial preview {:?}: {}", still, err);
            }
            Err(TranscodeError::Execution { code: output.status.code(), stderr })
        }
    }

    /// Plays the start of a music request through `ffplay` with its gain
    /// applied, blocking until playback ends. Video requests are left alone.
    pub fn play_preview(&self, request: &ConversionRequest) -> Result<bool, TranscodeError> {
        let OptionSet::Audio { gain_db } = request.options else {
            return Ok(false);
        };

        let ffplay = self.ffmpeg.ffplay_program();
        let args = listen_args(&request.input, gain_db);
        log::debug!(
            "{} {}",
            ffplay.display(),
            args.iter().map(|s| format!("{:?}", s)).collect::<Vec<String>>().join(" ")
        );

        let status = Command::new(&ffplay)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|source| TranscodeError::Invocation { program: ffplay.clone(), source })?;

        if status.success() {
            Ok(true)
        } else {
            Err(TranscodeError::Execution { code: status.code(), stderr: String::new() })
        }
    }
}

impl Transcoder for FFmpegTranscoder {
    fn transcode(&self, request: &ConversionRequest, ctx: &TranscodeContext) -> Result<(), TranscodeError> {
        let duration = match &self.ffmpeg.ffprobe {
            Some(ffprobe) => match probe_duration(ffprobe, &request.input) {
                Ok(d) => Some(d),
                Err(err) => {
                    log::debug!("unable to probe {:?}: {}", request.input, err);
                    None
                },
            },
            None => None,
        };

        let mut child = self.spawn(request)?;
        let stderr = child.stderr.take();
        let stderr_thread = thread::spawn(move || match stderr {
            Some(stream) => read_stderr_tail(stream),
            None => String::new(),
        });

        let killed = match child.stdout.take() {
            Some(stdout) => self.consume_stdout(stdout, &mut child, duration, ctx),
            None => false,
        };

        let status = child.wait();
        let stderr = stderr_thread.join().unwrap_or_default();

        let outcome = match status {
            _ if killed => Err(TranscodeError::Cancelled),
            Ok(status) if status.success() => {
                (ctx.progress)(1.0);
                Ok(())
            },
            Ok(status) => Err(TranscodeError::Execution { code: status.code(), stderr }),
            Err(err) => Err(TranscodeError::Execution {
                code: None,
                stderr: format!("error waiting for ffmpeg: {}", err),
            }),
        };

        if outcome.is_err() {
            discard_output(request);
        }

        outcome
    }
}

/// Removes what a failed run left at the output path, unless that path is
/// the input itself.
fn discard_output(request: &ConversionRequest) {
    if normalize(&request.output) == normalize(&request.input) {
        log::warn!("not removing {:?}: it is also the input", request.output);
        return;
    }
    if let Err(err) = remove_partial(&request.output) {
        log::error!("unable to remove partial output {:?}: {}", request.output, err);
    }
}

fn handle_ffmpeg_stdout_line(line: &str, progress: &mut ProgressState) -> FFmpegStdoutResult {
    match line.split_once('=') {
        // out_time_ms is microseconds as well
        Some(("out_time_us", value)) | Some(("out_time_ms", value)) => {
            if let Ok(us) = value.trim().parse::<u64>() {
                progress.out_time = Duration::from_micros(us);
            }
            FFmpegStdoutResult::Continue
        },
        Some(("progress", _)) => FFmpegStdoutResult::Render,
        _ => FFmpegStdoutResult::Continue,
    }
}

/// Logs every stderr line and keeps the last few for the failure report.
fn read_stderr_tail(stderr: impl Read) -> String {
    let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL);
    for line in BufReader::new(stderr).lines().map_while(Result::ok) {
        let line = line.trim().to_string();
        if line.is_empty() {
            continue;
        }
        log::warn!("ffmpeg: {}", line);
        if tail.len() == STDERR_TAIL {
            tail.pop_front();
        }
        tail.push_back(line);
    }
    Vec::from(tail).join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::path::{Path, PathBuf};
    use std::time::Instant;

    fn request(dir: &Path) -> ConversionRequest {
        let input = dir.join("song.mp3");
        std::fs::write(&input, b"id3").unwrap();
        ConversionRequest::new(input, dir, OptionSet::Audio { gain_db: 0.0 }, false)
    }

    /// Shell script standing in for ffmpeg; `$last` is the output path.
    #[cfg(unix)]
    fn fake_ffmpeg(dir: &Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("ffmpeg");
        std::fs::write(&path, format!("#!/bin/sh\nfor last; do :; done\n{}", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    // A freshly written script can briefly be "text file busy" while another
    // test forks; try again in that case.
    #[cfg(unix)]
    fn transcode_retrying(
        transcoder: &FFmpegTranscoder,
        request: &ConversionRequest,
        ctx: &TranscodeContext,
    ) -> Result<(), TranscodeError> {
        let mut attempts = 0;
        loop {
            match transcoder.transcode(request, ctx) {
                Err(TranscodeError::Invocation { source, .. }) if source.raw_os_error() == Some(26) && attempts < 10 => {
                    attempts += 1;
                    thread::sleep(Duration::from_millis(20));
                },
                other => return other,
            }
        }
    }

    #[test]
    fn test_handle_ffmpeg_stdout_line() {
        let mut progress = ProgressState::default();
        assert!(matches!(handle_ffmpeg_stdout_line("out_time_us=1500000", &mut progress), FFmpegStdoutResult::Continue));
        assert_eq!(progress.out_time, Duration::from_millis(1500));
        assert!(matches!(handle_ffmpeg_stdout_line("out_time_us=N/A", &mut progress), FFmpegStdoutResult::Continue));
        assert_eq!(progress.out_time, Duration::from_millis(1500));
        assert!(matches!(handle_ffmpeg_stdout_line("progress=continue", &mut progress), FFmpegStdoutResult::Render));
        assert!(matches!(handle_ffmpeg_stdout_line("bitrate=N/A", &mut progress), FFmpegStdoutResult::Continue));
    }

    #[test]
    fn test_read_stderr_tail_keeps_last_lines() {
        let text = "a\nb\n\nc\nd\ne\nf\ng\n";
        assert_eq!(read_stderr_tail(text.as_bytes()), "c; d; e; f; g");
    }

    #[test]
    fn test_missing_binary_is_an_invocation_error() {
        let dir = tempfile::tempdir().unwrap();
        let transcoder = FFmpegTranscoder::new(FFmpeg::at(PathBuf::from("/nonexistent/ffmpeg")));
        let abort = AtomicBool::new(false);
        let ctx = TranscodeContext { abort: &abort, progress: &|_: f64| () };
        let err = transcoder.transcode(&request(dir.path()), &ctx).unwrap_err();
        assert!(err.is_fatal());
    }

    #[cfg(unix)]
    #[test]
    fn test_nonzero_exit_is_an_execution_error() {
        let dir = tempfile::tempdir().unwrap();
        let transcoder = FFmpegTranscoder::new(FFmpeg::at(PathBuf::from("/bin/false")));
        let abort = AtomicBool::new(false);
        let ctx = TranscodeContext { abort: &abort, progress: &|_: f64| () };
        match transcoder.transcode(&request(dir.path()), &ctx) {
            Err(TranscodeError::Execution { code, .. }) => assert_eq!(code, Some(1)),
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_failure_never_removes_the_input() {
        let dir = tempfile::tempdir().unwrap();
        let song = dir.path().join("song.wav");
        std::fs::write(&song, b"RIFF").unwrap();
        let request = ConversionRequest {
            input: song.clone(),
            output: song.clone(),
            options: OptionSet::Audio { gain_db: 0.0 },
            overwrite: true,
        };
        let transcoder = FFmpegTranscoder::new(FFmpeg::at(PathBuf::from("/bin/false")));
        let abort = AtomicBool::new(false);
        let ctx = TranscodeContext { abort: &abort, progress: &|_: f64| () };
        assert!(transcoder.transcode(&request, &ctx).is_err());
        assert_eq!(std::fs::read(&song).unwrap(), b"RIFF");
    }

    #[cfg(unix)]
    #[test]
    fn test_abort_kills_engine_and_removes_partial_output() {
        let dir = tempfile::tempdir().unwrap();
        let script = fake_ffmpeg(
            dir.path(),
            "printf partial > \"$last\"\nwhile :; do echo progress=continue; sleep 0.1; done\n",
        );
        let transcoder = FFmpegTranscoder::new(FFmpeg::at(script));
        let request = request(dir.path());
        let abort = AtomicBool::new(false);

        let started = Instant::now();
        let outcome = thread::scope(|s| {
            s.spawn(|| {
                let deadline = Instant::now() + Duration::from_secs(10);
                while !request.output.exists() && Instant::now() < deadline {
                    thread::sleep(Duration::from_millis(10));
                }
                abort.store(true, Ordering::SeqCst);
            });
            let ctx = TranscodeContext { abort: &abort, progress: &|_: f64| () };
            transcode_retrying(&transcoder, &request, &ctx)
        });

        assert!(matches!(outcome, Err(TranscodeError::Cancelled)));
        assert!(!request.output.exists());
        assert!(request.input.exists());
        assert!(started.elapsed() < Duration::from_secs(15));
    }

    #[cfg(unix)]
    #[test]
    fn test_abort_reaches_a_silent_engine() {
        let dir = tempfile::tempdir().unwrap();
        let script = fake_ffmpeg(dir.path(), "exec sleep 30\n");
        let transcoder = FFmpegTranscoder::new(FFmpeg::at(script));
        let request = request(dir.path());
        let abort = AtomicBool::new(false);

        let outcome = thread::scope(|s| {
            s.spawn(|| {
                thread::sleep(Duration::from_millis(300));
                abort.store(true, Ordering::SeqCst);
            });
            let ctx = TranscodeContext { abort: &abort, progress: &|_: f64| () };
            transcode_retrying(&transcoder, &request, &ctx)
        });

        assert!(matches!(outcome, Err(TranscodeError::Cancelled)));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_engine_runs_in_its_own_process_group() {
        let dir = tempfile::tempdir().unwrap();
        let script = fake_ffmpeg(dir.path(), "cut -d' ' -f5 /proc/$$/stat > \"$last\"\n");
        let transcoder = FFmpegTranscoder::new(FFmpeg::at(script));
        let request = request(dir.path());
        let abort = AtomicBool::new(false);
        let ctx = TranscodeContext { abort: &abort, progress: &|_: f64| () };
        transcode_retrying(&transcoder, &request, &ctx).unwrap();

        let ours = std::fs::read_to_string("/proc/self/stat").unwrap();
        let ours = ours[ours.rfind(')').unwrap() + 1..].split_whitespace().nth(2).unwrap().to_string();
        let engine = std::fs::read_to_string(&request.output).unwrap();
        assert_ne!(engine.trim(), ours);
    }

    #[test]
    fn test_preview_skips_audio() {
        let dir = tempfile::tempdir().unwrap();
        let transcoder = FFmpegTranscoder::new(FFmpeg::at(PathBuf::from("/nonexistent/ffmpeg")));
        let still = dir.path().join("still.png");
        assert!(!transcoder.render_preview(&request(dir.path()), &still).unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn test_preview_failure_reports_exit_code() {
        use crate::fit_mode::FitMode;
        use crate::profile::Resolution;

        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("clip.mp4");
        std::fs::write(&input, b"ftyp").unwrap();
        let request = ConversionRequest::new(
            input,
            dir.path(),
            OptionSet::Video { target: Resolution { width: 480, height: 320 }, fit: FitMode::Contain },
            false,
        );
        let transcoder = FFmpegTranscoder::new(FFmpeg::at(PathBuf::from("/bin/false")));
        match transcoder.render_preview(&request, &dir.path().join("still.png")) {
            Err(TranscodeError::Execution { code, .. }) => assert_eq!(code, Some(1)),
            other => panic!("unexpected outcome {:?}", other),
        }
        assert!(transcoder.play_preview(&request).is_ok_and(|played| !played));
    }

    #[cfg(unix)]
    #[test]
    fn test_play_preview_uses_ffplay() {
        let dir = tempfile::tempdir().unwrap();
        let request = request(dir.path());
        let ffmpeg = FFmpeg {
            ffmpeg: PathBuf::from("/bin/false"),
            ffprobe: None,
            ffplay: Some(PathBuf::from("/bin/true")),
        };
        assert!(FFmpegTranscoder::new(ffmpeg).play_preview(&request).unwrap());

        let ffmpeg = FFmpeg {
            ffmpeg: PathBuf::from("/bin/true"),
            ffprobe: None,
            ffplay: Some(PathBuf::from("/nonexistent/ffplay")),
        };
        let err = FFmpegTranscoder::new(ffmpeg).play_preview(&request).unwrap_err();
        assert!(err.is_fatal());
    }

    #[cfg(unix)]
    #[test]
    fn test_zero_exit_is_success() {
        let dir = tempfile::tempdir().unwrap();
        let transcoder = FFmpegTranscoder::new(FFmpeg::at(PathBuf::from("/bin/true")));
        let abort = AtomicBool::new(false);
        let last = Cell::new(0.0);
        let ctx = TranscodeContext { abort: &abort, progress: &|p: f64| last.set(p) };
        transcoder.transcode(&request(dir.path()), &ctx).unwrap();
        assert_eq!(last.get(), 1.0);
    }
}
