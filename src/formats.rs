pub(crate) mod mimes;

/// Orientation of a video, derived from the dimensions of its first video stream
///
/// Only ever used as the namespace folder of a stored object's key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum Orientation {
    Landscape,
    Portrait,
    Other,
}

impl Orientation {
    /// Classify a width and height
    ///
    /// 16:9 is checked before 9:16, so dimensions satisfying both resolve to `Landscape`.
    pub(crate) const fn classify(width: u64, height: u64) -> Self {
        if width as u128 == sixteen_ninths(height) {
            Orientation::Landscape
        } else if height as u128 == sixteen_ninths(width) {
            Orientation::Portrait
        } else {
            Orientation::Other
        }
    }

    pub(crate) const fn as_str(&self) -> &'static str {
        match self {
            Self::Landscape => "landscape",
            Self::Portrait => "portrait",
            Self::Other => "other",
        }
    }
}

// floor(16 * n / 9)
const fn sixteen_ninths(n: u64) -> u128 {
    (16 * n as u128) / 9
}

impl std::fmt::Display for Orientation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
