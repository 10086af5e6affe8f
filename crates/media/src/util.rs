//! Small helpers.

use base64::Engine;
use common::{MediafyError, MediafyResult};
use indexmap::IndexMap;
use std::hash::Hash;

/// Shallow-merge `other` into `target`; keys from `other` win.
///
/// Keys already in `target` keep their position, new keys are appended in
/// `other`'s order.
pub fn extend<K, V>(mut target: IndexMap<K, V>, other: &IndexMap<K, V>) -> IndexMap<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    for (name, value) in other {
        target.insert(name.clone(), value.clone());
    }
    target
}

/// Split a base64 `data:` URL into its MIME type and decoded bytes.
pub fn decode_data_url(url: &str) -> MediafyResult<(String, Vec<u8>)> {
    let rest = url
        .strip_prefix("data:")
        .ok_or_else(|| MediafyError::invalid("not a data URL"))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| MediafyError::invalid("data URL without payload"))?;
    let mime = header
        .strip_suffix(";base64")
        .ok_or_else(|| MediafyError::invalid("data URL is not base64 encoded"))?;
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload)
        .map_err(|e| MediafyError::invalid(format!("bad base64 payload: {}", e)))?;
    Ok((mime.to_string(), bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use dom::{PropertyMap, PropertyValue};

    fn map(pairs: &[(&str, PropertyValue)]) -> PropertyMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_later_keys_win() {
        let target = map(&[("a", 1.into()), ("b", 2.into())]);
        let other = map(&[("b", 3.into()), ("c", 4.into())]);

        let merged = extend(target, &other);
        let keys: Vec<_> = merged.keys().map(String::as_str).collect();
        assert_eq!(keys, ["a", "b", "c"]);
        assert_eq!(merged["b"], PropertyValue::Number(3.0));
    }

    #[test]
    fn test_decode_data_url() {
        let (mime, bytes) = decode_data_url("data:image/png;base64,aGk=").unwrap();
        assert_eq!(mime, "image/png");
        assert_eq!(bytes, b"hi");

        assert!(decode_data_url("data:,").is_err());
        assert!(decode_data_url("data:text/plain,hi").is_err());
        assert!(decode_data_url("blob:null/1").is_err());
    }

    #[test]
    fn test_empty_sides() {
        let other = map(&[("x", "y".into())]);
        assert_eq!(extend(PropertyMap::new(), &other), other);
        assert_eq!(extend(other.clone(), &PropertyMap::new()), other);
    }
}
