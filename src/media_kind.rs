use std::fmt::Display;
use std::path::Path;

const AUDIO_EXTENSIONS: [&str; 12] = [
    "mp3", "m4a", "aac", "wav", "flac", "ogg", "opus", "wma", "aif", "aiff", "alac", "ac3",
];

const VIDEO_EXTENSIONS: [&str; 12] = [
    "mp4", "mov", "m4v", "avi", "mkv", "webm", "wmv", "flv", "mts", "m2ts", "ts", "3gp",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaKind {
    Audio,
    Video,
}

impl MediaKind {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "audio" | "music" => Some(MediaKind::Audio),
            "video" => Some(MediaKind::Video),
            _ => None,
        }
    }

    pub fn extension(kind: MediaKind) -> &'static str {
        match kind {
            MediaKind::Audio => "wav",
            MediaKind::Video => "avi",
        }
    }

    pub fn accepted_extensions(kind: MediaKind) -> &'static [&'static str] {
        match kind {
            MediaKind::Audio => &AUDIO_EXTENSIONS,
            MediaKind::Video => &VIDEO_EXTENSIONS,
        }
    }

    pub fn accepts(&self, path: &Path) -> bool {
        match path.extension() {
            Some(ext) => {
                let ext = ext.to_string_lossy().to_lowercase();
                MediaKind::accepted_extensions(*self).contains(&ext.as_str())
            },
            None => false,
        }
    }
}

impl Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaKind::Audio => write!(f, "audio"),
            MediaKind::Video => write!(f, "video"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_str() {
        assert_eq!(MediaKind::from_str("Music"), Some(MediaKind::Audio));
        assert_eq!(MediaKind::from_str("audio"), Some(MediaKind::Audio));
        assert_eq!(MediaKind::from_str("VIDEO"), Some(MediaKind::Video));
        assert_eq!(MediaKind::from_str("photo"), None);
    }

    #[test]
    fn test_accepts_is_case_insensitive() {
        assert!(MediaKind::Audio.accepts(Path::new("/music/Track.FLAC")));
        assert!(MediaKind::Video.accepts(Path::new("clip.m2ts")));
        assert!(!MediaKind::Audio.accepts(Path::new("clip.mp4")));
        assert!(!MediaKind::Video.accepts(Path::new("README")));
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", MediaKind::Audio), "audio");
        assert_eq!(format!("{}", MediaKind::Video), "video");
    }
}
