//! Capability tags.
//!
//! A [`Capability`] names a category of inference service. Providers register
//! against exactly one capability; requests name exactly one capability. The
//! set is closed by design so the registry and the FFI surface can treat it
//! as a stable enumeration.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ModalityError;

/// A category of inference service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    /// Speech-to-text transcription.
    Stt,
    /// Text-to-speech synthesis.
    Tts,
    /// Voice activity detection.
    Vad,
    /// Language-model generation.
    Llm,
}

impl Capability {
    /// All capabilities, in declaration order.
    pub const ALL: [Capability; 4] = [
        Capability::Stt,
        Capability::Tts,
        Capability::Vad,
        Capability::Llm,
    ];

    /// Lowercase name used in logs, request routing, and serialization.
    pub fn as_str(self) -> &'static str {
        match self {
            Capability::Stt => "stt",
            Capability::Tts => "tts",
            Capability::Vad => "vad",
            Capability::Llm => "llm",
        }
    }

    /// Bit assigned to this capability in the FFI capability mask.
    pub fn bit(self) -> u32 {
        match self {
            Capability::Stt => 1 << 0,
            Capability::Tts => 1 << 1,
            Capability::Vad => 1 << 2,
            Capability::Llm => 1 << 3,
        }
    }

    /// Decode a capability mask into a capability set.
    ///
    /// Unknown bits are ignored; the FFI surface treats them as reserved.
    pub fn set_from_bits(bits: u32) -> BTreeSet<Capability> {
        Capability::ALL
            .iter()
            .copied()
            .filter(|c| bits & c.bit() != 0)
            .collect()
    }

    /// Encode a capability set into the FFI capability mask.
    pub fn bits_from_set(set: &BTreeSet<Capability>) -> u32 {
        set.iter().fold(0, |acc, c| acc | c.bit())
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Capability {
    type Err = ModalityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "stt" => Ok(Capability::Stt),
            "tts" => Ok(Capability::Tts),
            "vad" => Ok(Capability::Vad),
            "llm" => Ok(Capability::Llm),
            other => Err(ModalityError::invalid_input(format!(
                "unknown capability '{}'",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_round_trip() {
        for cap in Capability::ALL {
            assert_eq!(cap.as_str().parse::<Capability>().unwrap(), cap);
        }
        assert!("speech".parse::<Capability>().is_err());
    }

    #[test]
    fn test_bitmask_round_trip() {
        let set: BTreeSet<Capability> = [Capability::Stt, Capability::Vad].into_iter().collect();
        let bits = Capability::bits_from_set(&set);
        assert_eq!(bits, 0b101);
        assert_eq!(Capability::set_from_bits(bits), set);

        // Reserved bits are ignored rather than rejected.
        assert_eq!(Capability::set_from_bits(bits | 0xF0), set);
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&Capability::Tts).unwrap();
        assert_eq!(json, "\"tts\"");
        let cap: Capability = serde_json::from_str("\"llm\"").unwrap();
        assert_eq!(cap, Capability::Llm);
    }
}
