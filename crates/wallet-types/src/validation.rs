//! Validation of backend configuration sections.
//!
//! Storage and delivery implementations receive their section of the
//! configuration as a raw `toml::Value`. Each declares the keys it accepts
//! as a [`Schema`], so a typo or a malformed value fails at startup with
//! the key named.

use thiserror::Error;

/// Why a backend section was rejected.
#[derive(Debug, Error)]
pub enum ValidationError {
	#[error("Unknown field: {0}")]
	UnknownField(String),
	#[error("Invalid value for field '{field}': {message}")]
	InvalidValue { field: String, message: String },
	#[error("Type mismatch for field '{field}': expected {expected}, got {actual}")]
	TypeMismatch {
		field: String,
		expected: &'static str,
		actual: &'static str,
	},
}

/// Shape of a configuration value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
	String,
	StringList,
}

type Check = Box<dyn Fn(&toml::Value) -> Result<(), String> + Send + Sync>;

/// An optional key of a backend section.
pub struct Field {
	name: &'static str,
	field_type: FieldType,
	check: Option<Check>,
}

impl Field {
	pub fn new(name: &'static str, field_type: FieldType) -> Self {
		Self {
			name,
			field_type,
			check: None,
		}
	}

	/// Runs `check` on the value once its type is known to match.
	pub fn with_validator<F>(mut self, check: F) -> Self
	where
		F: Fn(&toml::Value) -> Result<(), String> + Send + Sync + 'static,
	{
		self.check = Some(Box::new(check));
		self
	}

	fn validate(&self, value: &toml::Value) -> Result<(), ValidationError> {
		let matches = match self.field_type {
			FieldType::String => value.is_str(),
			FieldType::StringList => value
				.as_array()
				.is_some_and(|items| items.iter().all(toml::Value::is_str)),
		};
		if !matches {
			return Err(ValidationError::TypeMismatch {
				field: self.name.to_string(),
				expected: match self.field_type {
					FieldType::String => "string",
					FieldType::StringList => "list of strings",
				},
				actual: value.type_str(),
			});
		}

		match &self.check {
			Some(check) => check(value).map_err(|message| ValidationError::InvalidValue {
				field: self.name.to_string(),
				message,
			}),
			None => Ok(()),
		}
	}
}

/// The keys a backend section accepts. Every key is optional.
pub struct Schema {
	fields: Vec<Field>,
}

impl Schema {
	pub fn new(fields: Vec<Field>) -> Self {
		Self { fields }
	}

	/// A section that accepts no keys.
	pub fn empty() -> Self {
		Self::new(Vec::new())
	}

	pub fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let table = config.as_table().ok_or(ValidationError::TypeMismatch {
			field: "root".to_string(),
			expected: "table",
			actual: config.type_str(),
		})?;

		for (key, value) in table {
			let field = self
				.fields
				.iter()
				.find(|field| field.name == key)
				.ok_or_else(|| ValidationError::UnknownField(key.clone()))?;
			field.validate(value)?;
		}
		Ok(())
	}
}

/// A configuration schema that can validate TOML values.
pub trait ConfigSchema: Send + Sync {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError>;
}

#[cfg(test)]
mod tests {
	use super::*;

	fn storage_schema() -> Schema {
		Schema::new(vec![
			Field::new("storage_path", FieldType::String).with_validator(|value| {
				match value.as_str() {
					Some(path) if !path.is_empty() => Ok(()),
					_ => Err("storage_path cannot be empty".to_string()),
				}
			}),
			Field::new("network_ids", FieldType::StringList),
		])
	}

	#[test]
	fn test_absent_and_valid_keys_pass() {
		let empty = toml::Value::Table(toml::Table::new());
		assert!(storage_schema().validate(&empty).is_ok());

		let config: toml::Value =
			toml::from_str("storage_path = \"./data\"\nnetwork_ids = [\"celo-mainnet\"]").unwrap();
		assert!(storage_schema().validate(&config).is_ok());
	}

	#[test]
	fn test_unknown_key_rejected() {
		let config: toml::Value = toml::from_str("storage_pth = \"./data\"").unwrap();
		assert!(matches!(
			storage_schema().validate(&config),
			Err(ValidationError::UnknownField(key)) if key == "storage_pth"
		));
		assert!(Schema::empty().validate(&config).is_err());
	}

	#[test]
	fn test_type_and_custom_checks() {
		let config: toml::Value = toml::from_str("network_ids = [\"celo-mainnet\", 3]").unwrap();
		let err = storage_schema().validate(&config).unwrap_err();
		assert_eq!(
			err.to_string(),
			"Type mismatch for field 'network_ids': expected list of strings, got array"
		);

		let config: toml::Value = toml::from_str("storage_path = \"\"").unwrap();
		let err = storage_schema().validate(&config).unwrap_err();
		assert!(err.to_string().contains("storage_path cannot be empty"));
	}
}
