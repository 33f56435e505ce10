use std::{fmt, str::FromStr};

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// Text encodings offered when importing a shapefile.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CharacterEncoding {
    Ascii,
    Latin1,
    #[default]
    Utf8,
}

impl CharacterEncoding {
    pub const ALL: [CharacterEncoding; 3] = [Self::Ascii, Self::Latin1, Self::Utf8];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Ascii => "ascii",
            Self::Latin1 => "latin1",
            Self::Utf8 => "utf8",
        }
    }

    /// Human-readable label for choice lists.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Ascii => "ASCII",
            Self::Latin1 => "Latin-1",
            Self::Utf8 => "UTF-8",
        }
    }

    /// Decode raw field bytes, or `None` if they are not valid in this encoding.
    pub fn decode(&self, bytes: &[u8]) -> Option<String> {
        match self {
            Self::Ascii => bytes.is_ascii().then(|| bytes.iter().map(|&b| b as char).collect()),
            Self::Latin1 => Some(bytes.iter().map(|&b| b as char).collect()),
            Self::Utf8 => std::str::from_utf8(bytes).ok().map(str::to_string),
        }
    }

    /// Encode text, or `None` if a character has no representation.
    pub fn encode(&self, text: &str) -> Option<Vec<u8>> {
        match self {
            Self::Ascii => text.is_ascii().then(|| text.as_bytes().to_vec()),
            Self::Latin1 => text.chars()
                .map(|c| u8::try_from(u32::from(c)).ok())
                .collect(),
            Self::Utf8 => Some(text.as_bytes().to_vec()),
        }
    }
}

impl fmt::Display for CharacterEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.name()) }
}

impl FromStr for CharacterEncoding {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ascii" | "us-ascii" => Ok(Self::Ascii),
            "latin1" | "latin-1" | "iso-8859-1" => Ok(Self::Latin1),
            "utf8" | "utf-8" => Ok(Self::Utf8),
            other => Err(anyhow!("unknown character encoding: {other:?}")),
        }
    }
}
