use std::ffi::OsString;
use std::path::Path;
use crate::fit_mode::FitMode;
use crate::profile::Resolution;
use super::{ParameterFactory, AUDIO_CHANNELS, AUDIO_SAMPLE_RATE};

/// The device plays 12 fps palettised RLE video.
pub const FRAME_RATE: u32 = 12;

pub struct VideoParameterFactory {
    target: Resolution,
    fit: FitMode,
}

impl VideoParameterFactory {
    pub fn new(target: Resolution, fit: FitMode) -> Self {
        VideoParameterFactory { target, fit }
    }

    pub fn video_filter(&self) -> String {
        format!("{},fps={},format=pal8", FitMode::scale_filter(self.fit, self.target), FRAME_RATE)
    }
}

impl ParameterFactory for VideoParameterFactory {
    fn parameters(&self) -> Vec<String> {
        vec![
            String::from("-vf"), self.video_filter(),
            String::from("-vsync"), String::from("cfr"),
            String::from("-r"), FRAME_RATE.to_string(),
            String::from("-c:v"), String::from("msrle"),
            String::from("-pix_fmt"), String::from("pal8"),
            String::from("-ac"), String::from(AUDIO_CHANNELS),
            String::from("-ar"), String::from(AUDIO_SAMPLE_RATE),
            String::from("-c:a"), String::from("pcm_s16le"),
            String::from("-max_interleave_delta"), String::from("0"),
            String::from("-use_odml"), String::from("0"),
            String::from("-f"), String::from("avi"),
        ]
    }
}

/// Renders the frame one second into `input` as an RGB still, scaled the way
/// a conversion would scale it.
pub fn preview_args(input: &Path, still: &Path, target: Resolution, fit: FitMode) -> Vec<OsString> {
    let mut args: Vec<OsString> = ["-hide_banner", "-loglevel", "error", "-y", "-ss", "1.0", "-i"]
        .into_iter()
        .map(OsString::from)
        .collect();
    args.push(input.as_os_str().to_os_string());
    args.push(OsString::from("-vframes"));
    args.push(OsString::from("1"));
    args.push(OsString::from("-vf"));
    args.push(OsString::from(format!("{},format=rgb24", FitMode::scale_filter(fit, target))));
    args.push(still.as_os_str().to_os_string());
    args
}
