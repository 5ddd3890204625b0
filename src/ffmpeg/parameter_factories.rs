use std::ffi::OsString;
use crate::request::{ConversionRequest, OptionSet};
use self::audio::AudioParameterFactory;
use self::video::VideoParameterFactory;
pub mod audio;
pub mod video;

/// Both kinds carry a mono 16 kHz PCM track.
pub const AUDIO_SAMPLE_RATE: &str = "16000";
pub const AUDIO_CHANNELS: &str = "1";

pub trait ParameterFactory {
    /// Everything between `-i <input>` and the output path.
    fn parameters(&self) -> Vec<String>;
}

pub fn create_parameter_factory(options: &OptionSet) -> Box<dyn ParameterFactory> {
    match *options {
        OptionSet::Audio { gain_db } => Box::new(AudioParameterFactory::new(gain_db)),
        OptionSet::Video { target, fit } => Box::new(VideoParameterFactory::new(target, fit)),
    }
}

/// The complete engine argument list for one request, program name excluded.
pub fn conversion_args(request: &ConversionRequest) -> Vec<OsString> {
    let mut args: Vec<OsString> = [
        "-hide_banner",
        "-loglevel", "error",
        "-nostats",
        "-progress", "pipe:1",
        if request.overwrite { "-y" } else { "-n" },
        "-i",
    ].into_iter().map(OsString::from).collect();
    args.push(request.input.clone().into_os_string());

    for param in create_parameter_factory(&request.options).parameters() {
        args.push(OsString::from(param));
    }

    args.push(request.output.clone().into_os_string());
    args
}
