use std::error::Error;
use std::io;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Duration;
use serde::Deserialize;

#[derive(Deserialize, Debug)]
struct FFProbeJsonOutput {
    pub format: FFProbeJsonFormat,
}

#[derive(Deserialize, Debug)]
struct FFProbeJsonFormat {
    pub duration: Option<String>,
}

/// Container duration of `path`, used to turn `out_time` into a fraction.
pub fn probe_duration(ffprobe: &Path, path: &Path) -> Result<Duration, Box<dyn Error>> {
    let output = Command::new(ffprobe)
        .args(["-v", "error", "-of", "json", "-show_entries", "format=duration"])
        .arg(path)
        .stdin(Stdio::null())
        .output()?;
    if output.status.success() {
        let utf8 = String::from_utf8(output.stdout)?;
        parse_duration(&utf8)
    } else {
        Err(Box::new(io::Error::other(format!("ffprobe exited with {:?}", output.status.code()))))
    }
}

fn parse_duration(json: &str) -> Result<Duration, Box<dyn Error>> {
    let deserialized = serde_json::from_str::<FFProbeJsonOutput>(json)?;
    let seconds: f64 = match deserialized.format.duration {
        Some(d) => d.parse()?,
        None => return Err(Box::new(io::Error::other("no duration reported"))),
    };
    Ok(Duration::try_from_secs_f64(seconds)?)
}
