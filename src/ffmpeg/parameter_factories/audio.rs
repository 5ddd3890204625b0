use std::ffi::OsString;
use std::path::Path;
use super::{ParameterFactory, AUDIO_CHANNELS, AUDIO_SAMPLE_RATE};

/// Length of a music preview.
pub const PREVIEW_SECONDS: u32 = 8;

pub struct AudioParameterFactory {
    gain_db: f64,
}

impl AudioParameterFactory {
    pub fn new(gain_db: f64) -> Self {
        AudioParameterFactory { gain_db }
    }
}

impl ParameterFactory for AudioParameterFactory {
    fn parameters(&self) -> Vec<String> {
        let mut params = vec![
            String::from("-ac"), String::from(AUDIO_CHANNELS),
            String::from("-ar"), String::from(AUDIO_SAMPLE_RATE),
            String::from("-sample_fmt"), String::from("s16"),
            String::from("-c:a"), String::from("pcm_s16le"),
        ];

        if let Some(filter) = gain_filter(self.gain_db) {
            params.push(String::from("-af"));
            params.push(filter);
        }

        params.push(String::from("-f"));
        params.push(String::from("wav"));
        params
    }
}

/// `volume=` filter for a gain in dB, rounded to a tenth. No filter at all
/// when the rounded gain is zero.
pub fn gain_filter(gain_db: f64) -> Option<String> {
    let tenths = (gain_db * 10.0).round() as i64;
    match tenths {
        0 => None,
        t if t % 10 == 0 => Some(format!("volume={:+}dB", t / 10)),
        t => Some(format!("volume={:+.1}dB", t as f64 / 10.0)),
    }
}

/// `ffplay` arguments that play the start of `input` with the conversion's
/// gain applied and no window.
pub fn listen_args(input: &Path, gain_db: f64) -> Vec<OsString> {
    let mut args: Vec<OsString> = ["-nodisp", "-autoexit", "-vn", "-t"]
        .into_iter()
        .map(OsString::from)
        .collect();
    args.push(OsString::from(PREVIEW_SECONDS.to_string()));
    args.push(OsString::from("-i"));
    args.push(input.as_os_str().to_os_string());
    if let Some(filter) = gain_filter(gain_db) {
        args.push(OsString::from("-af"));
        args.push(OsString::from(filter));
    }
    args
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gain_filter() {
        assert_eq!(gain_filter(0.0), None);
        assert_eq!(gain_filter(0.04), None);
        assert_eq!(gain_filter(-0.04), None);
        assert_eq!(gain_filter(6.0).as_deref(), Some("volume=+6dB"));
        assert_eq!(gain_filter(-3.0).as_deref(), Some("volume=-3dB"));
        assert_eq!(gain_filter(2.5).as_deref(), Some("volume=+2.5dB"));
        assert_eq!(gain_filter(-0.06).as_deref(), Some("volume=-0.1dB"));
        assert_eq!(gain_filter(19.96).as_deref(), Some("volume=+20dB"));
    }

    #[test]
    fn test_listen_args() {
        let args: Vec<String> = listen_args(Path::new("song.mp3"), -2.5)
            .iter()
            .map(|a| a.to_string_lossy().to_string())
            .collect();
        assert_eq!(args.join(" "), "-nodisp -autoexit -vn -t 8 -i song.mp3 -af volume=-2.5dB");
        assert_eq!(listen_args(Path::new("song.mp3"), 0.0).len(), 7);
    }

    #[test]
    fn test_zero_gain_has_no_filter_args() {
        let params = AudioParameterFactory::new(0.0).parameters();
        assert!(!params.iter().any(|p| p == "-af"));
        assert_eq!(params.last().map(String::as_str), Some("wav"));
    }
}
