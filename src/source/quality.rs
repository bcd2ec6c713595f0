//! Quality tiers and the fallback selector handed to the extraction backend.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One quality preference the extraction backend can satisfy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QualityTier {
    #[serde(rename = "best")]
    Best,
    #[serde(rename = "worst")]
    Worst,
    #[serde(rename = "1080p")]
    P1080,
    #[serde(rename = "720p")]
    P720,
    #[serde(rename = "480p")]
    P480,
    #[serde(rename = "360p")]
    P360,
    #[serde(rename = "240p")]
    P240,
}

impl QualityTier {
    /// Format expression for this tier (yt-dlp `-f` syntax).
    pub fn selector(self) -> &'static str {
        match self {
            Self::Best => "best[ext=mp4]",
            Self::Worst => "worst[ext=mp4]",
            Self::P1080 => "best[height<=1080][ext=mp4]",
            Self::P720 => "best[height<=720][ext=mp4]",
            Self::P480 => "best[height<=480][ext=mp4]",
            Self::P360 => "best[height<=360][ext=mp4]",
            Self::P240 => "best[height<=240][ext=mp4]",
        }
    }

    /// Config/CLI spelling of this tier.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Best => "best",
            Self::Worst => "worst",
            Self::P1080 => "1080p",
            Self::P720 => "720p",
            Self::P480 => "480p",
            Self::P360 => "360p",
            Self::P240 => "240p",
        }
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QualityTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "best" => Ok(Self::Best),
            "worst" => Ok(Self::Worst),
            "1080p" | "1080" => Ok(Self::P1080),
            "720p" | "720" => Ok(Self::P720),
            "480p" | "480" => Ok(Self::P480),
            "360p" | "360" => Ok(Self::P360),
            "240p" | "240" => Ok(Self::P240),
            other => Err(format!("unknown quality '{other}'")),
        }
    }
}

/// Ordered quality preferences, always ending in a best-effort catch-all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualitySelector {
    tiers: Vec<QualityTier>,
}

impl QualitySelector {
    /// Terminal expression appended after every configured tier.
    pub const CATCH_ALL: &'static str = "best[ext=mp4]/best";

    /// Preferred tier first, then each fallback that is not already listed.
    pub fn new(preferred: QualityTier, fallbacks: &[QualityTier]) -> Self {
        let mut tiers = vec![preferred];
        for &tier in fallbacks {
            if !tiers.contains(&tier) {
                tiers.push(tier);
            }
        }
        Self { tiers }
    }

    pub fn tiers(&self) -> &[QualityTier] {
        &self.tiers
    }

    /// Render as a `/`-separated fallback chain.
    pub fn to_format_string(&self) -> String {
        self.tiers
            .iter()
            .map(|tier| tier.selector())
            .chain(std::iter::once(Self::CATCH_ALL))
            .collect::<Vec<_>>()
            .join("/")
    }
}

impl Default for QualitySelector {
    fn default() -> Self {
        Self::new(
            QualityTier::P720,
            &[QualityTier::P720, QualityTier::P480, QualityTier::P360],
        )
    }
}

impl fmt::Display for QualitySelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_format_string())
    }
}
