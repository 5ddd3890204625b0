use std::env;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
pub mod parameter_factories;
pub mod probe;
pub mod transcoder;

const FFMPEG: &str = "ffmpeg";
const FFPROBE: &str = "ffprobe";
const FFPLAY: &str = "ffplay";

/// Where the engine binaries live.
#[derive(Clone, Debug)]
pub struct FFmpeg {
    pub ffmpeg: PathBuf,
    pub ffprobe: Option<PathBuf>,
    /// Only used to listen to a music preview.
    pub ffplay: Option<PathBuf>,
}

impl FFmpeg {
    /// Uses `ffmpeg` exactly as given; `ffprobe` and `ffplay` only if they
    /// sit next to it.
    pub fn at(ffmpeg: PathBuf) -> Self {
        let ffprobe = sibling(&ffmpeg, FFMPEG, FFPROBE).filter(|p| p.is_file());
        let ffplay = sibling(&ffmpeg, FFMPEG, FFPLAY).filter(|p| p.is_file());
        FFmpeg { ffmpeg, ffprobe, ffplay }
    }

    /// `ffplay` next to `ffmpeg` if there is one, otherwise whatever the
    /// search path provides.
    pub fn ffplay_program(&self) -> PathBuf {
        match &self.ffplay {
            Some(path) => path.clone(),
            None => PathBuf::from(exe_name(FFPLAY)),
        }
    }

    /// Resolves the engine: an explicit path, then `bin/` next to this
    /// executable, then the search path. When nothing is found the bundled
    /// location is returned anyway so that errors name where it was expected.
    pub fn locate(explicit: Option<&Path>) -> Self {
        if let Some(path) = explicit {
            return FFmpeg::at(PathBuf::from(path));
        }

        let bundled = bundled_dir().map(|dir| dir.join(exe_name(FFMPEG)));
        if let Some(path) = bundled.as_ref().filter(|p| p.is_file()) {
            return FFmpeg::at(path.clone());
        }

        match which::which(FFMPEG) {
            Ok(path) => {
                let mut located = FFmpeg::at(path);
                if located.ffprobe.is_none() {
                    located.ffprobe = which::which(FFPROBE).ok();
                }
                if located.ffplay.is_none() {
                    located.ffplay = which::which(FFPLAY).ok();
                }
                located
            },
            Err(_) => FFmpeg::at(bundled.unwrap_or_else(|| PathBuf::from(exe_name(FFMPEG)))),
        }
    }

    pub fn is_installed(&self) -> bool {
        let cmd = Command::new(&self.ffmpeg)
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        match cmd {
            Ok(status) => status.success(),
            Err(_) => false,
        }
    }
}

fn bundled_dir() -> Option<PathBuf> {
    let exe = env::current_exe().ok()?;
    exe.parent().map(|dir| dir.join("bin"))
}

fn exe_name(name: &str) -> String {
    format!("{}{}", name, env::consts::EXE_SUFFIX)
}

// `/opt/ffmpeg-7/bin/ffmpeg.exe` -> `/opt/ffmpeg-7/bin/ffprobe.exe`
fn sibling(path: &Path, from: &str, to: &str) -> Option<PathBuf> {
    let name = path.file_name()?.to_string_lossy().to_string();
    if name.to_lowercase().starts_with(from) {
        Some(path.with_file_name(format!("{}{}", to, &name[from.len()..])))
    } else {
        None
    }
}
