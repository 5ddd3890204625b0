use std::fmt::Display;

use serde::Deserialize;

/// Largest edge accepted for a custom target size.
pub const MAX_DIMENSION: u32 = 4096;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Screen regions of the device that a video can be sized for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceProfile {
    #[default]
    Full,
    Map,
    Player,
}

impl DeviceProfile {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "full" | "fullscreen" => Some(DeviceProfile::Full),
            "map" => Some(DeviceProfile::Map),
            "player" | "piptube" => Some(DeviceProfile::Player),
            _ => None,
        }
    }

    pub fn resolution(profile: DeviceProfile) -> Resolution {
        match profile {
            DeviceProfile::Full => Resolution { width: 480, height: 320 },
            DeviceProfile::Map => Resolution { width: 408, height: 248 },
            DeviceProfile::Player => Resolution { width: 340, height: 210 },
        }
    }
}

impl Display for DeviceProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceProfile::Full => write!(f, "full"),
            DeviceProfile::Map => write!(f, "map"),
            DeviceProfile::Player => write!(f, "player"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_full_screen() {
        assert_eq!(
            DeviceProfile::resolution(DeviceProfile::default()),
            Resolution { width: 480, height: 320 }
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", DeviceProfile::resolution(DeviceProfile::Player)), "340x210");
        assert_eq!(DeviceProfile::Map.to_string(), "map");
    }
}
