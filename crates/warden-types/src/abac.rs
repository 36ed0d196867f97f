//! Attribute lookup trait used by escalation predicates and constraint checks.

/// Attribute set trait - action contexts implement this
pub trait AttrSet: Send + Sync {
	/// Get a single string attribute
	fn get(&self, key: &str) -> Option<&str>;

	/// Get a numeric attribute
	fn get_number(&self, key: &str) -> Option<f64>;

	/// Get a list attribute
	fn get_list(&self, key: &str) -> Option<Vec<&str>>;

	/// Check if attribute equals value
	fn has(&self, key: &str, value: &str) -> bool {
		self.get(key) == Some(value)
	}

	/// Check if list attribute contains value
	fn contains(&self, key: &str, value: &str) -> bool {
		self.get_list(key).is_some_and(|list| list.contains(&value))
	}

	/// Check if the attribute is present in any form
	fn exists(&self, key: &str) -> bool {
		self.get(key).is_some() || self.get_number(key).is_some() || self.get_list(key).is_some()
	}
}

// vim: ts=4
