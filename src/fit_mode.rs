use std::fmt::Display;

use crate::profile::Resolution;

/// How a source frame is mapped onto the fixed target resolution.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FitMode {
    /// Scale to fit inside the target and pad the remainder (letterbox).
    #[default]
    Contain,
    /// Scale to cover the target and crop the overflow (zoom).
    Cover,
    /// Scale each axis independently, ignoring aspect ratio.
    Stretch,
}

impl FitMode {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "contain" | "letterbox" | "pad" => Some(FitMode::Contain),
            "cover" | "zoom" | "crop" => Some(FitMode::Cover),
            "stretch" | "fill" => Some(FitMode::Stretch),
            _ => None,
        }
    }

    /// The scaling part of the video filter graph, shared by conversions and
    /// preview stills.
    pub fn scale_filter(fit: FitMode, target: Resolution) -> String {
        let (w, h) = (target.width, target.height);
        match fit {
            FitMode::Stretch => format!("scale={w}:{h}:flags=lanczos,setsar=1"),
            FitMode::Cover => format!(
                "{},crop={w}:{h}",
                even_scale(&format!("max({w}/iw\\,{h}/ih)")),
            ),
            FitMode::Contain => format!(
                "{},pad={w}:{h}:(ow-iw)/2:(oh-ih)/2",
                even_scale(&format!("min({w}/iw\\,{h}/ih)")),
            ),
        }
    }
}

// scale by factor `s`, truncating both axes to even sizes
fn even_scale(s: &str) -> String {
    format!("scale=trunc(iw*{s}/2)*2:trunc(ih*{s}/2)*2:flags=lanczos,setsar=1")
}

impl Display for FitMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FitMode::Contain => write!(f, "contain"),
            FitMode::Cover => write!(f, "cover"),
            FitMode::Stretch => write!(f, "stretch"),
        }
    }
}
