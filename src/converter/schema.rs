use jsonschema::Validator;
use schemars::JsonSchema;
use serde_json::Value;

use super::ParseError;

/// Target type of a conversion: a name and its JSON Schema document.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetSchema {
    pub name: String,
    pub schema: Value,
}

impl TargetSchema {
    /// Schema derived from a Rust type.
    pub fn of<T: JsonSchema>() -> Self {
        let root = schemars::schema_for!(T);
        Self {
            name: T::schema_name(),
            schema: serde_json::to_value(root).unwrap_or_default(),
        }
    }

    /// Schema loaded from a JSON Schema document. The name comes from its
    /// `title`, falling back to `fallback_name`.
    pub fn from_document(schema: Value, fallback_name: &str) -> Self {
        let name = schema
            .get("title")
            .and_then(Value::as_str)
            .filter(|title| !title.is_empty())
            .unwrap_or(fallback_name)
            .to_string();
        Self { name, schema }
    }

    /// Compiles the schema document for validating model output.
    pub fn validator(&self) -> Result<Validator, ParseError> {
        Validator::new(&self.schema).map_err(|e| ParseError::InvalidSchema(e.to_string()))
    }

    pub fn pretty(&self) -> String {
        serde_json::to_string_pretty(&self.schema).unwrap_or_else(|_| self.schema.to_string())
    }
}

/// Formatting instructions sent with every conversion.
pub fn default_instructions(schema: &TargetSchema) -> String {
    format!(
        "I'm gonna convert this raw text into valid JSON.\n\n\
         The json should have the following structure, with the following keys:\n{}",
        schema.pretty()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[allow(dead_code)]
    #[derive(JsonSchema)]
    struct Invoice {
        number: String,
        total_cents: u64,
    }

    #[test]
    fn test_schema_of_type_lists_properties() {
        let schema = TargetSchema::of::<Invoice>();
        assert_eq!(schema.name, "Invoice");
        assert!(schema.schema["properties"]["number"].is_object());
        assert!(schema.schema["properties"]["total_cents"].is_object());
    }

    #[test]
    fn test_schema_from_document_uses_title() {
        let schema = TargetSchema::from_document(json!({"title": "Contact"}), "schema");
        assert_eq!(schema.name, "Contact");

        let schema = TargetSchema::from_document(json!({"type": "object"}), "contact");
        assert_eq!(schema.name, "contact");
    }

    #[test]
    fn test_default_instructions_embed_schema() {
        let schema = TargetSchema::of::<Invoice>();
        let instructions = default_instructions(&schema);
        assert!(instructions.starts_with("I'm gonna convert this raw text into valid JSON."));
        assert!(instructions.contains("total_cents"));
    }

    #[test]
    fn test_derived_schema_compiles_and_validates() {
        let validator = TargetSchema::of::<Invoice>().validator().unwrap();
        assert!(validator.is_valid(&json!({"number": "INV-1", "total_cents": 1200})));
        assert!(!validator.is_valid(&json!({"number": "INV-1"})));
        assert!(!validator.is_valid(&json!({"number": "INV-1", "total_cents": "a lot"})));
    }
}
