use uuid::Uuid;

use crate::formats::Orientation;

/// How the object name of an uploaded video is chosen
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, serde::Deserialize, serde::Serialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub(crate) enum KeyStrategy {
    /// A fresh random id per upload
    #[default]
    Random,

    /// The video's own id, so re-uploads overwrite the previous object
    VideoId,

    /// The sha256 of the uploaded bytes
    ContentHash,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct KeyPolicy {
    strategy: KeyStrategy,
    orientation_prefix: bool,
}

impl KeyPolicy {
    pub(crate) const fn new(strategy: KeyStrategy, orientation_prefix: bool) -> Self {
        KeyPolicy {
            strategy,
            orientation_prefix,
        }
    }

    pub(crate) fn key(
        &self,
        orientation: Orientation,
        video_id: Uuid,
        content_hash: &[u8; 32],
    ) -> String {
        let name = match self.strategy {
            KeyStrategy::Random => Uuid::new_v4().to_string(),
            KeyStrategy::VideoId => video_id.to_string(),
            KeyStrategy::ContentHash => hex::encode(content_hash),
        };

        if self.orientation_prefix {
            format!("{orientation}/{name}.mp4")
        } else {
            format!("{name}.mp4")
        }
    }
}

impl Default for KeyPolicy {
    fn default() -> Self {
        Self::new(KeyStrategy::Random, true)
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::{KeyPolicy, KeyStrategy};
    use crate::formats::Orientation;

    const HASH: [u8; 32] = [0xab; 32];

    #[test]
    fn random_keys_live_under_orientation() {
        let policy = KeyPolicy::default();
        let id = Uuid::new_v4();

        let one = policy.key(Orientation::Landscape, id, &HASH);
        let two = policy.key(Orientation::Landscape, id, &HASH);

        assert!(one.starts_with("landscape/"));
        assert!(one.ends_with(".mp4"));
        assert_ne!(one, two);
    }

    #[test]
    fn video_id_keys_are_stable() {
        let policy = KeyPolicy::new(KeyStrategy::VideoId, true);
        let id = Uuid::new_v4();

        assert_eq!(
            policy.key(Orientation::Portrait, id, &HASH),
            format!("portrait/{id}.mp4")
        );
    }

    #[test]
    fn content_hash_keys_use_hex_digest() {
        let policy = KeyPolicy::new(KeyStrategy::ContentHash, true);

        assert_eq!(
            policy.key(Orientation::Other, Uuid::new_v4(), &HASH),
            format!("other/{}.mp4", "ab".repeat(32))
        );
    }

    #[test]
    fn prefix_can_be_disabled() {
        let policy = KeyPolicy::new(KeyStrategy::VideoId, false);
        let id = Uuid::new_v4();

        assert_eq!(
            policy.key(Orientation::Landscape, id, &HASH),
            format!("{id}.mp4")
        );
    }

    #[test]
    fn strategy_names() {
        let strategy: KeyStrategy = serde_json::from_str(r#""content_hash""#).unwrap();

        assert_eq!(strategy, KeyStrategy::ContentHash);
    }
}
