//! Canonical serialization of runtime values.
//!
//! Values are normalized to [`serde_json::Value`] and rendered to a stable
//! string by an ordered chain of format handlers. The first handler that
//! accepts a value wins, and the built-in fallback accepts everything, so
//! rendering always succeeds once a value has normalized.

use serde::Serialize;
use serde_json::Value;

use crate::errors::{Error, SnapResult};

/// A single format handler in the canonical serializer chain.
///
/// Implementations inspect the normalized value and either claim it by
/// returning its rendering, or decline with `None` to let the next handler
/// in the chain try.
pub trait SnapshotFormatter {
    fn try_format(&self, value: &Value) -> Option<String>;
}

/// The built-in fallback: pretty-printed JSON with two-space indent.
///
/// Object keys render in sorted order, so structurally equal values always
/// produce byte-identical output.
#[derive(Debug, Default)]
pub struct DefaultFormatter;

impl SnapshotFormatter for DefaultFormatter {
    fn try_format(&self, value: &Value) -> Option<String> {
        let rendered = serde_json::to_string_pretty(value)
            .expect("a Value renders without error");
        Some(rendered)
    }
}

/// Ordered chain of format handlers with a guaranteed fallback.
pub struct FormatterChain {
    formatters: Vec<Box<dyn SnapshotFormatter>>,
}

impl FormatterChain {
    /// A chain holding only the built-in fallback.
    pub fn new() -> Self {
        Self {
            formatters: vec![Box::new(DefaultFormatter)],
        }
    }

    /// Register a handler. Handlers are consulted newest-first, so a
    /// freshly added one shadows everything registered before it.
    pub fn add_formatter(&mut self, formatter: Box<dyn SnapshotFormatter>) {
        self.formatters.insert(0, formatter);
    }

    /// Render an already-normalized value through the chain.
    pub fn format_value(&self, value: &Value) -> String {
        for formatter in &self.formatters {
            if let Some(rendered) = formatter.try_format(value) {
                return rendered;
            }
        }
        // Unreachable while the fallback sits at the end of the chain.
        DefaultFormatter
            .try_format(value)
            .expect("fallback formats every value")
    }

    /// Normalize a serializable value and render it to canonical form.
    pub fn serialize<V: Serialize + ?Sized>(&self, value: &V) -> SnapResult<String> {
        let normalized = serde_json::to_value(value).map_err(|e| Error::Serialize {
            message: e.to_string(),
        })?;
        Ok(self.format_value(&normalized))
    }
}

impl Default for FormatterChain {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FormatterChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormatterChain")
            .field("formatters", &self.formatters.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_formatter_renders_canonical_json() {
        let chain = FormatterChain::new();
        let rendered = chain
            .serialize(&json!({ "name": "plume", "id": 7, "tags": ["a", "b"] }))
            .unwrap();
        insta::assert_snapshot!(rendered, @r###"
        {
          "id": 7,
          "name": "plume",
          "tags": [
            "a",
            "b"
          ]
        }
        "###);
    }

    #[test]
    fn test_equal_values_render_identically() {
        let chain = FormatterChain::new();
        let a = chain.serialize(&json!({ "x": 1, "y": 2 })).unwrap();
        let b = chain.serialize(&json!({ "y": 2, "x": 1 })).unwrap();
        assert_eq!(a, b);
    }

    struct NumbersAsHex;

    impl SnapshotFormatter for NumbersAsHex {
        fn try_format(&self, value: &Value) -> Option<String> {
            value.as_u64().map(|n| format!("{:#x}", n))
        }
    }

    #[test]
    fn test_custom_formatter_claims_matching_values() {
        let mut chain = FormatterChain::new();
        chain.add_formatter(Box::new(NumbersAsHex));

        assert_eq!(chain.serialize(&255u32).unwrap(), "0xff");
        // Non-numbers fall through to the default.
        assert_eq!(chain.serialize(&"hi").unwrap(), "\"hi\"");
    }

    struct Uppercase;

    impl SnapshotFormatter for Uppercase {
        fn try_format(&self, value: &Value) -> Option<String> {
            value.as_str().map(|s| s.to_uppercase())
        }
    }

    struct Reversed;

    impl SnapshotFormatter for Reversed {
        fn try_format(&self, value: &Value) -> Option<String> {
            value.as_str().map(|s| s.chars().rev().collect())
        }
    }

    #[test]
    fn test_latest_registered_formatter_wins() {
        let mut chain = FormatterChain::new();
        chain.add_formatter(Box::new(Uppercase));
        chain.add_formatter(Box::new(Reversed));

        assert_eq!(chain.serialize(&"abc").unwrap(), "cba");
    }

    #[test]
    fn test_unserializable_value_reports_serialize_error() {
        let mut bad_keys = std::collections::HashMap::new();
        bad_keys.insert(vec![1u8, 2], "x");

        let chain = FormatterChain::new();
        let err = chain.serialize(&bad_keys).unwrap_err();
        assert!(matches!(err, Error::Serialize { .. }));
    }
}
