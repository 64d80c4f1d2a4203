use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::SessionError;

/// Browser-extension wallet family.
///
/// Each family is served by one [`crate::adapter::WalletAdapter`]; several
/// families may share one adapter when they pair over the same protocol.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WalletFamily {
    HashPack,
    Blade,
    Kabila,
}

impl WalletFamily {
    pub const ALL: [WalletFamily; 3] = [WalletFamily::HashPack, WalletFamily::Blade, WalletFamily::Kabila];

    pub fn as_str(&self) -> &'static str {
        match self {
            WalletFamily::HashPack => "hashpack",
            WalletFamily::Blade => "blade",
            WalletFamily::Kabila => "kabila",
        }
    }
}

impl Display for WalletFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if f.alternate() {
            f.write_str(self.as_str())
        } else {
            match self {
                WalletFamily::HashPack => write!(f, "HashPack"),
                WalletFamily::Blade => write!(f, "Blade"),
                WalletFamily::Kabila => write!(f, "Kabila"),
            }
        }
    }
}

impl FromStr for WalletFamily {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WalletFamily::ALL
            .into_iter()
            .find(|f| f.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| SessionError::InvalidArgument(format!("unknown wallet family: {}", s)))
    }
}

/// Cosmetic wallet card skin, one of the fixed set of bundled assets.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplaySkin {
    #[default]
    Classic,
    Aurora,
    Ember,
    Frost,
    Midnight,
}

impl DisplaySkin {
    pub const ALL: [DisplaySkin; 5] = [
        DisplaySkin::Classic,
        DisplaySkin::Aurora,
        DisplaySkin::Ember,
        DisplaySkin::Frost,
        DisplaySkin::Midnight,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DisplaySkin::Classic => "classic",
            DisplaySkin::Aurora => "aurora",
            DisplaySkin::Ember => "ember",
            DisplaySkin::Frost => "frost",
            DisplaySkin::Midnight => "midnight",
        }
    }
}

impl Display for DisplaySkin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for DisplaySkin {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DisplaySkin::ALL
            .into_iter()
            .find(|skin| skin.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| SessionError::InvalidArgument(format!("unknown display skin: {}", s)))
    }
}
