pub mod config;
pub mod error;
pub mod ffmpeg;
pub mod fit_mode;
pub mod fstools;
pub mod job;
pub mod job_runner;
pub mod media_kind;
pub mod presenter;
pub mod profile;
pub mod request;

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use rustop::opts;

use config::{CommandLine, Settings};
use ffmpeg::parameter_factories::conversion_args;
use ffmpeg::transcoder::FFmpegTranscoder;
use ffmpeg::FFmpeg;
use job::BatchJob;
use job_runner::JobRunner;
use presenter::{render_summary, ConsolePresenter};
use request::{build_batch, OptionSet};

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let (args, _rest) = opts! {
        synopsis "Convert music and video for the Pip-Boy 3000 Mk V.";
        opt output:Option<String>, desc:"Output folder.";
        opt gain:Option<f64>, desc:"Music volume gain in dB, -20 to 20. Write negative values as --gain=-3.";
        opt profile:Option<String>, desc:"Video size. [full (480x320), map (408x248), player (340x210)]";
        opt width:Option<u32>, desc:"Custom video width; overrides the profile.";
        opt height:Option<u32>, desc:"Custom video height; overrides the profile.";
        opt fit:Option<String>, desc:"How video fills the frame. [contain, cover, stretch]";
        opt overwrite:bool=false, desc:"Replace output files that already exist.";
        opt ffmpeg:Option<String>, desc:"Path to the ffmpeg executable.";
        opt config:Option<String>, desc:"JSON file with default settings.";
        opt dry_run:bool=false, desc:"Print the ffmpeg commands without running them.";
        opt preview:Option<String>, desc:"Write a PNG still of the first video and exit.";
        opt listen:bool=false, desc:"Play the first seconds of the first music file with the gain applied and exit.";
        param kind:String, desc:"What to convert. [music, video]";
        param files:Vec<String>, desc:"Input files";
    }.parse_or_exit();

    let settings = match Settings::load_optional(args.config.as_deref().map(Path::new)) {
        Ok(s) => s,
        Err(err) => {
            println!("{}", err);
            return ExitCode::FAILURE;
        },
    };

    let ffmpeg = FFmpeg::locate(settings.ffmpeg_path(args.ffmpeg.as_deref()).as_deref());
    let selection = settings.merge(CommandLine {
        kind: args.kind,
        files: args.files,
        output: args.output,
        gain: args.gain,
        profile: args.profile,
        width: args.width,
        height: args.height,
        fit: args.fit,
        overwrite: args.overwrite,
    });

    let batch = match build_batch(&selection) {
        Ok(batch) => batch,
        Err(err) => {
            println!("{}", err);
            return ExitCode::FAILURE;
        },
    };

    if let Some(OptionSet::Video { target, fit }) = batch.requests().first().map(|r| r.options) {
        log::info!("video target {} ({})", target, fit);
    }

    if args.dry_run {
        print_commands(&ffmpeg.ffmpeg, &batch);
        return ExitCode::SUCCESS;
    }

    if !ffmpeg.is_installed() {
        println!(
            "ffmpeg was not found at {:?}. Install ffmpeg and add it to PATH, or place it in the bin/ folder next to this program.",
            ffmpeg.ffmpeg
        );
        return ExitCode::FAILURE;
    }

    let transcoder = FFmpegTranscoder::new(ffmpeg);

    if let Some(still) = args.preview {
        return preview(&transcoder, &batch, &PathBuf::from(still));
    }

    if args.listen {
        return listen(&transcoder, &batch);
    }

    let interrupt = Arc::new(AtomicBool::new(false));
    if let Err(err) = signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&interrupt)) {
        log::warn!("unable to watch for Ctrl-C: {}", err);
    }

    let total = batch.len();
    let runner = JobRunner::new(Arc::new(transcoder));
    let handle = match runner.spawn(batch) {
        Ok(handle) => handle,
        Err(err) => {
            println!("{}", err);
            return ExitCode::FAILURE;
        },
    };

    let mut presenter = ConsolePresenter::new(total);
    let drained = presenter.drain(&handle, &runner, &interrupt);
    let report = match drained {
        Some(report) => report,
        None => match handle.join() {
            Ok(report) => report,
            Err(_) => {
                println!("The conversion worker stopped unexpectedly.");
                return ExitCode::FAILURE;
            },
        },
    };

    println!("{}", render_summary(&report));
    if report.is_clean() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn print_commands(program: &Path, batch: &BatchJob) {
    for request in batch.requests() {
        let args: Vec<OsString> = conversion_args(request);
        println!(
            "{} {}",
            program.display(),
            args.iter().map(|a| format!("{:?}", a)).collect::<Vec<String>>().join(" ")
        );
    }
}

fn preview(transcoder: &FFmpegTranscoder, batch: &BatchJob, still: &Path) -> ExitCode {
    for request in batch.requests() {
        match transcoder.render_preview(request, still) {
            Ok(true) => {
                println!("Preview of {:?} written to {:?}.", request.input, still);
                return ExitCode::SUCCESS;
            },
            Ok(false) => continue,
            Err(err) => {
                println!("Preview of {:?} failed: {}", request.input, err);
                return ExitCode::FAILURE;
            },
        }
    }
    println!("Still previews are only available for video; use --listen for music.");
    ExitCode::FAILURE
}

fn listen(transcoder: &FFmpegTranscoder, batch: &BatchJob) -> ExitCode {
    for request in batch.requests() {
        if let OptionSet::Audio { .. } = request.options {
            println!("Playing {:?}...", request.input);
        }
        match transcoder.play_preview(request) {
            Ok(true) => return ExitCode::SUCCESS,
            Ok(false) => continue,
            Err(err) => {
                println!("Unable to play {:?}: {}. Install ffplay or place it next to ffmpeg.", request.input, err);
                return ExitCode::FAILURE;
            },
        }
    }
    println!("Listening is only available for music.");
    ExitCode::FAILURE
}
