//! The two debate voices.
//!
//! Carnegie speaks for the liberal side, Mellon for the conservative side.

use serde::{Deserialize, Serialize};

use crate::config::VoicesConfig;

/// Political side a persona argues for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Liberal,
    Conservative,
}

impl Side {
    pub fn label(&self) -> &'static str {
        match self {
            Side::Liberal => "liberal",
            Side::Conservative => "conservative",
        }
    }
}

/// A speaker in the generated script.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Persona {
    Carnegie,
    Mellon,
}

impl Persona {
    pub const ALL: [Persona; 2] = [Persona::Carnegie, Persona::Mellon];

    pub fn side(&self) -> Side {
        match self {
            Persona::Carnegie => Side::Liberal,
            Persona::Mellon => Side::Conservative,
        }
    }

    /// Name as written in scripts.
    pub fn display_name(&self) -> &'static str {
        match self {
            Persona::Carnegie => "Carnegie",
            Persona::Mellon => "Mellon",
        }
    }

    /// Upper-case tag used in audio file names.
    pub fn tag(&self) -> &'static str {
        match self {
            Persona::Carnegie => "CARNEGIE",
            Persona::Mellon => "MELLON",
        }
    }

    /// Case-insensitive lookup by script name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.display_name().eq_ignore_ascii_case(name.trim()))
    }

    pub fn voice<'a>(&self, voices: &'a VoicesConfig) -> &'a str {
        match self {
            Persona::Carnegie => &voices.carnegie_voice,
            Persona::Mellon => &voices.mellon_voice,
        }
    }

    /// Name with side, e.g. "Carnegie (liberal)".
    pub fn display_name_with_side(&self) -> String {
        format!("{} ({})", self.display_name(), self.side().label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_personas_map_to_sides() {
        assert_eq!(Persona::Carnegie.side(), Side::Liberal);
        assert_eq!(Persona::Mellon.side(), Side::Conservative);
        assert_eq!(Persona::Mellon.display_name_with_side(), "Mellon (conservative)");
    }

    #[test]
    fn test_from_name_ignores_case() {
        assert_eq!(Persona::from_name("CARNEGIE"), Some(Persona::Carnegie));
        assert_eq!(Persona::from_name(" mellon "), Some(Persona::Mellon));
        assert_eq!(Persona::from_name("Moderator"), None);
    }

    #[test]
    fn test_voice_comes_from_config() {
        let voices = VoicesConfig {
            carnegie_voice: "af_bella".to_string(),
            ..VoicesConfig::default()
        };
        assert_eq!(Persona::Carnegie.voice(&voices), "af_bella");
        assert_eq!(Persona::Mellon.voice(&voices), "bm_george");
    }
}
