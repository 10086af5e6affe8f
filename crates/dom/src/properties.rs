//! Element property values.
//!
//! Attributes are always strings; properties carry a small dynamic value
//! type so that numeric and boolean state (`width`, `paused`) round-trips
//! without string parsing at every call site.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A dynamically typed property value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
}

/// Ordered map of property names to values.
pub type PropertyMap = IndexMap<String, PropertyValue>;

impl PropertyValue {
    /// Truthiness as a script engine would evaluate it.
    pub fn is_truthy(&self) -> bool {
        match self {
            PropertyValue::Null => false,
            PropertyValue::Bool(b) => *b,
            PropertyValue::Number(n) => *n != 0.0 && !n.is_nan(),
            PropertyValue::Text(s) => !s.is_empty(),
        }
    }

    /// Numeric view: numbers as-is, booleans as 0/1, numeric text parsed.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropertyValue::Number(n) => Some(*n),
            PropertyValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            PropertyValue::Text(s) => s.trim().parse().ok(),
            PropertyValue::Null => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Convert to a non-negative integer dimension, if representable.
    pub fn as_dimension(&self) -> Option<u32> {
        let n = self.as_f64()?;
        if n.is_finite() && n >= 0.0 && n <= u32::MAX as f64 {
            Some(n.trunc() as u32)
        } else {
            None
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Null => write!(f, "null"),
            PropertyValue::Bool(b) => write!(f, "{}", b),
            PropertyValue::Number(n) if n.fract() == 0.0 && n.is_finite() => {
                write!(f, "{}", *n as i64)
            }
            PropertyValue::Number(n) => write!(f, "{}", n),
            PropertyValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Bool(value)
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        PropertyValue::Number(value)
    }
}

impl From<u32> for PropertyValue {
    fn from(value: u32) -> Self {
        PropertyValue::Number(value as f64)
    }
}

impl From<i32> for PropertyValue {
    fn from(value: i32) -> Self {
        PropertyValue::Number(value as f64)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::Text(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::Text(value)
    }
}

impl<T: Into<PropertyValue>> From<Option<T>> for PropertyValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(PropertyValue::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(!PropertyValue::Number(0.0).is_truthy());
        assert!(!PropertyValue::Number(f64::NAN).is_truthy());
        assert!(!PropertyValue::Text(String::new()).is_truthy());
        assert!(!PropertyValue::Bool(false).is_truthy());
        assert!(!PropertyValue::Null.is_truthy());
        assert!(PropertyValue::Number(-1.0).is_truthy());
        assert!(PropertyValue::from("0").is_truthy());
    }

    #[test]
    fn test_dimension_conversion() {
        assert_eq!(PropertyValue::from("640").as_dimension(), Some(640));
        assert_eq!(PropertyValue::Number(12.9).as_dimension(), Some(12));
        assert_eq!(PropertyValue::Number(-1.0).as_dimension(), None);
        assert_eq!(PropertyValue::from("wide").as_dimension(), None);
    }

    #[test]
    fn test_untagged_json() {
        let map: PropertyMap =
            serde_json::from_str(r#"{"id":"cam","width":320,"muted":true,"poster":null}"#).unwrap();
        assert_eq!(map["id"], PropertyValue::from("cam"));
        assert_eq!(map["width"], PropertyValue::Number(320.0));
        assert_eq!(map["muted"], PropertyValue::Bool(true));
        assert_eq!(map["poster"], PropertyValue::Null);
    }

    #[test]
    fn test_display() {
        assert_eq!(PropertyValue::Number(300.0).to_string(), "300");
        assert_eq!(PropertyValue::Number(0.5).to_string(), "0.5");
    }
}
