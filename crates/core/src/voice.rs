//! Voice and emotion tables.
//!
//! Both are closed enumerations: every voice maps to a fixed profile and every
//! emotion to a fixed prosody adjustment, and unknown keys are rejected with
//! [`CompanionError::NotFound`] instead of silently falling back.

use crate::error::CompanionError;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Longest utterance handed to the synthesizer, in characters.
pub const MAX_SPOKEN_CHARS: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Voice {
    #[default]
    Nanami,
    Mayu,
    Aoi,
    Jenny,
    Aria,
    Maisie,
}

/// Static description of a voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoiceProfile {
    pub name: &'static str,
    pub language: &'static str,
    pub style: &'static str,
    /// Base pitch shift applied to every utterance in this voice.
    pub pitch_hz: i32,
}

impl Voice {
    pub const ALL: [Voice; 6] = [
        Voice::Nanami,
        Voice::Mayu,
        Voice::Aoi,
        Voice::Jenny,
        Voice::Aria,
        Voice::Maisie,
    ];

    /// The synthesizer voice identifier.
    pub fn id(self) -> &'static str {
        match self {
            Voice::Nanami => "ja-JP-NanamiNeural",
            Voice::Mayu => "ja-JP-MayuNeural",
            Voice::Aoi => "ja-JP-AoiNeural",
            Voice::Jenny => "en-US-JennyNeural",
            Voice::Aria => "en-US-AriaNeural",
            Voice::Maisie => "en-GB-MaisieNeural",
        }
    }

    pub fn profile(self) -> VoiceProfile {
        match self {
            Voice::Nanami => VoiceProfile {
                name: "Nanami",
                language: "ja-JP",
                style: "cute",
                pitch_hz: 20,
            },
            Voice::Mayu => VoiceProfile {
                name: "Mayu",
                language: "ja-JP",
                style: "gentle",
                pitch_hz: 15,
            },
            Voice::Aoi => VoiceProfile {
                name: "Aoi",
                language: "ja-JP",
                style: "energetic",
                pitch_hz: 10,
            },
            Voice::Jenny => VoiceProfile {
                name: "Jenny",
                language: "en-US",
                style: "cheerful",
                pitch_hz: 0,
            },
            Voice::Aria => VoiceProfile {
                name: "Aria",
                language: "en-US",
                style: "warm",
                pitch_hz: 0,
            },
            Voice::Maisie => VoiceProfile {
                name: "Maisie",
                language: "en-GB",
                style: "young",
                pitch_hz: 5,
            },
        }
    }

    /// Human description of the accent, used in tool replies.
    pub fn accent(self) -> &'static str {
        match self.profile().language {
            "ja-JP" => "Japanese accent",
            "en-GB" => "British",
            _ => "American",
        }
    }

    /// Combines the voice's base pitch with an emotion's adjustment.
    pub fn prosody_for(self, emotion: Emotion) -> Prosody {
        let mut prosody = emotion.prosody();
        prosody.pitch_hz += self.profile().pitch_hz;
        prosody
    }
}

impl fmt::Display for Voice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Voice {
    type Err = CompanionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Voice::ALL
            .into_iter()
            .find(|voice| voice.id().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| CompanionError::not_found("voice", wanted))
    }
}

/// Serializable row for the `list_voices` tool.
#[derive(Debug, Serialize)]
pub struct VoiceInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub language: &'static str,
    pub style: &'static str,
    pub pitch: String,
    pub note: &'static str,
}

impl From<Voice> for VoiceInfo {
    fn from(voice: Voice) -> Self {
        let profile = voice.profile();
        Self {
            id: voice.id(),
            name: profile.name,
            language: profile.language,
            style: profile.style,
            pitch: signed(profile.pitch_hz, "Hz"),
            note: if profile.language == "ja-JP" {
                "Japanese accent voice"
            } else {
                "Standard voice"
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Emotion {
    #[default]
    Neutral,
    Happy,
    Sad,
    Excited,
    Angry,
    Shy,
}

impl Emotion {
    pub const ALL: [Emotion; 6] = [
        Emotion::Neutral,
        Emotion::Happy,
        Emotion::Sad,
        Emotion::Excited,
        Emotion::Angry,
        Emotion::Shy,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Emotion::Neutral => "neutral",
            Emotion::Happy => "happy",
            Emotion::Sad => "sad",
            Emotion::Excited => "excited",
            Emotion::Angry => "angry",
            Emotion::Shy => "shy",
        }
    }

    pub fn prosody(self) -> Prosody {
        let (pitch_hz, rate_pct, volume_pct) = match self {
            Emotion::Neutral => (0, 0, 0),
            Emotion::Happy => (10, 5, 0),
            Emotion::Sad => (-5, -10, -10),
            Emotion::Excited => (15, 10, 5),
            Emotion::Angry => (-10, 5, 5),
            Emotion::Shy => (5, -5, -20),
        };
        Prosody {
            pitch_hz,
            rate_pct,
            volume_pct,
        }
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Emotion {
    type Err = CompanionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Emotion::ALL
            .into_iter()
            .find(|emotion| emotion.as_str() == wanted)
            .ok_or_else(|| CompanionError::not_found("emotion", s.trim()))
    }
}

/// Relative prosody adjustments passed to the synthesizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Prosody {
    pub pitch_hz: i32,
    pub rate_pct: i32,
    pub volume_pct: i32,
}

impl Prosody {
    pub fn pitch(&self) -> String {
        signed(self.pitch_hz, "Hz")
    }

    pub fn rate(&self) -> String {
        signed(self.rate_pct, "%")
    }

    pub fn volume(&self) -> String {
        signed(self.volume_pct, "%")
    }
}

fn signed(value: i32, unit: &str) -> String {
    format!("{value:+}{unit}")
}

/// Prepares free text for speech: strips markdown emphasis, spells out
/// decorative symbols, collapses whitespace and caps the length.
pub fn clean_text(text: &str) -> String {
    let mut cleaned = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '*' | '_' | '`' => {}
            '♡' | '♥' => cleaned.push_str("heart"),
            '★' | '☆' => cleaned.push_str("star"),
            '～' | '〜' => cleaned.push(' '),
            '・' => cleaned.push_str(", "),
            other => cleaned.push(other),
        }
    }

    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() > MAX_SPOKEN_CHARS {
        let mut truncated: String = collapsed.chars().take(MAX_SPOKEN_CHARS).collect();
        truncated.push_str("...");
        truncated
    } else {
        collapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voice_lookup_is_exhaustive() {
        for voice in Voice::ALL {
            assert_eq!(voice.id().parse::<Voice>().unwrap(), voice);
        }
        assert_eq!(
            "en-gb-maisieneural".parse::<Voice>().unwrap(),
            Voice::Maisie
        );
        assert!(matches!(
            "fr-FR-DeniseNeural".parse::<Voice>(),
            Err(CompanionError::NotFound { kind: "voice", .. })
        ));
    }

    #[test]
    fn test_unknown_emotion_is_rejected() {
        assert_eq!("Happy".parse::<Emotion>().unwrap(), Emotion::Happy);
        assert!(matches!(
            "furious".parse::<Emotion>(),
            Err(CompanionError::NotFound { kind: "emotion", .. })
        ));
    }

    #[test]
    fn test_prosody_combines_voice_and_emotion() {
        let prosody = Voice::Nanami.prosody_for(Emotion::Angry);
        assert_eq!(prosody.pitch(), "+10Hz");
        assert_eq!(prosody.rate(), "+5%");
        assert_eq!(prosody.volume(), "+5%");

        let prosody = Voice::Jenny.prosody_for(Emotion::Sad);
        assert_eq!(prosody.pitch(), "-5Hz");
        assert_eq!(prosody.rate(), "-10%");
        assert_eq!(prosody.volume(), "-10%");

        assert_eq!(Voice::Aria.prosody_for(Emotion::Neutral).pitch(), "+0Hz");
    }

    #[test]
    fn test_accent_description() {
        assert_eq!(Voice::Aoi.accent(), "Japanese accent");
        assert_eq!(Voice::Maisie.accent(), "British");
        assert_eq!(Voice::Jenny.accent(), "American");
    }

    #[test]
    fn test_clean_text() {
        assert_eq!(clean_text("**Hello**  _master_ `x`"), "Hello master x");
        assert_eq!(clean_text("I ♡ you ★"), "I heart you star");
        assert_eq!(clean_text("ね～ 猫・犬"), "ね 猫, 犬");
        assert_eq!(clean_text("  \n\t "), "");

        let long = "a".repeat(MAX_SPOKEN_CHARS + 20);
        let cleaned = clean_text(&long);
        assert_eq!(cleaned.chars().count(), MAX_SPOKEN_CHARS + 3);
        assert!(cleaned.ends_with("..."));
    }

    #[test]
    fn test_voice_info_rows() {
        let info = VoiceInfo::from(Voice::Mayu);
        assert_eq!(info.id, "ja-JP-MayuNeural");
        assert_eq!(info.pitch, "+15Hz");
        assert_eq!(info.note, "Japanese accent voice");
        assert_eq!(VoiceInfo::from(Voice::Aria).note, "Standard voice");
    }
}
