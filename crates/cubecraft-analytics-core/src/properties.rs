// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Opaque key/value bag carried by every event.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Free-form event properties.
///
/// Serializes as a plain JSON object.
///
/// # Example
///
/// ```
/// use cubecraft_analytics_core::Properties;
///
/// let props = Properties::new()
///     .insert("button_name", "checkout")
///     .insert("location", "/cart")
///     .insert("cart_value", 79.98);
/// assert_eq!(props.len(), 3);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Properties {
	inner: Map<String, Value>,
}

impl Properties {
	pub fn new() -> Self {
		Self { inner: Map::new() }
	}

	/// Inserts a key-value pair (builder style).
	pub fn insert<K, V>(mut self, key: K, value: V) -> Self
	where
		K: Into<String>,
		V: Into<Value>,
	{
		self.inner.insert(key.into(), value.into());
		self
	}

	/// Inserts a key-value pair in place.
	pub fn set<K, V>(&mut self, key: K, value: V)
	where
		K: Into<String>,
		V: Into<Value>,
	{
		self.inner.insert(key.into(), value.into());
	}

	pub fn is_empty(&self) -> bool {
		self.inner.is_empty()
	}

	pub fn len(&self) -> usize {
		self.inner.len()
	}

	pub fn get(&self, key: &str) -> Option<&Value> {
		self.inner.get(key)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	#[test]
	fn new_is_empty() {
		let props = Properties::new();
		assert!(props.is_empty());
		assert_eq!(props.len(), 0);
	}

	#[test]
	fn insert_mixed_values() {
		let props = Properties::new()
			.insert("product_id", "42")
			.insert("quantity", 2)
			.insert("cart_value", 79.98)
			.insert("first_purchase", true);

		assert_eq!(props.len(), 4);
		assert_eq!(props.get("product_id"), Some(&Value::String("42".to_string())));
		assert_eq!(props.get("quantity"), Some(&Value::Number(2.into())));
		assert!(props.get("cart_value").unwrap().is_f64());
		assert_eq!(props.get("first_purchase"), Some(&Value::Bool(true)));
	}

	#[test]
	fn optional_value_becomes_null() {
		let results: Option<u32> = None;
		let props = Properties::new().insert("results_count", results);
		assert_eq!(props.get("results_count"), Some(&Value::Null));
	}

	#[test]
	fn serializes_as_plain_object() {
		let props = Properties::new().insert("search_query", "megaminx");
		let json = serde_json::to_value(&props).unwrap();
		assert_eq!(json, serde_json::json!({"search_query": "megaminx"}));
	}

	proptest! {
		#[test]
		fn len_matches_unique_keys(keys in proptest::collection::vec("[a-z]{1,10}", 0..20)) {
			let unique: std::collections::HashSet<_> = keys.iter().cloned().collect();
			let mut props = Properties::new();
			for key in &keys {
				props.set(key.clone(), "value");
			}
			prop_assert_eq!(props.len(), unique.len());
		}
	}
}
