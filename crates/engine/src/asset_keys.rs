use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssetKeyError {
    #[error("asset key must not be empty")]
    Empty,
    #[error("asset key must not start with '/'")]
    LeadingSlash,
    #[error("asset key must not contain '..'")]
    ParentTraversal,
    #[error("asset key contains invalid character '{character}'")]
    InvalidCharacter { character: char },
}

/// Keys are lowercase relative paths such as `adam` or `adam_idle_down`.
pub fn validate_asset_key(key: &str) -> Result<(), AssetKeyError> {
    if key.is_empty() {
        return Err(AssetKeyError::Empty);
    }
    if key.starts_with('/') {
        return Err(AssetKeyError::LeadingSlash);
    }
    if key.contains("..") {
        return Err(AssetKeyError::ParentTraversal);
    }
    if let Some(character) = key
        .chars()
        .find(|ch| !(ch.is_ascii_lowercase() || ch.is_ascii_digit() || matches!(ch, '_' | '/' | '-')))
    {
        return Err(AssetKeyError::InvalidCharacter { character });
    }
    Ok(())
}

pub(crate) fn sprite_image_path(assets_dir: &Path, key: &str) -> Result<PathBuf, AssetKeyError> {
    validate_asset_key(key)?;
    Ok(assets_dir.join("sprites").join(format!("{key}.png")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_avatar_and_animation_keys() {
        for key in ["adam", "nancy_idle_down", "props/vending-machine"] {
            assert!(validate_asset_key(key).is_ok(), "key={key}");
        }
    }

    #[test]
    fn rejects_escaping_or_uppercase_keys() {
        assert_eq!(validate_asset_key(""), Err(AssetKeyError::Empty));
        assert_eq!(validate_asset_key("/a"), Err(AssetKeyError::LeadingSlash));
        assert_eq!(
            validate_asset_key("a/../b"),
            Err(AssetKeyError::ParentTraversal)
        );
        assert_eq!(
            validate_asset_key(r"a\b"),
            Err(AssetKeyError::InvalidCharacter { character: '\\' })
        );
        assert!(validate_asset_key("Adam").is_err());
    }

    #[test]
    fn sprite_paths_live_under_sprites_dir() {
        let path = sprite_image_path(Path::new("assets"), "ash_idle_down").expect("path");
        assert_eq!(path, Path::new("assets/sprites/ash_idle_down.png"));
    }
}
