//! Tool definition helpers
//!
//! Re-exports ToolDefinition from the llm module and provides
//! helper functions for creating tool schemas.

use serde_json::{Value as JsonValue, json};

/// Tool descriptor sent to the planner
///
/// Re-exported from llm module for convenience.
pub use crate::llm::ToolDefinition;

/// Helper functions for creating tool schemas
pub struct SchemaBuilder;

impl SchemaBuilder {
    /// Schema for a tool that takes no arguments
    pub fn empty() -> JsonValue {
        json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    /// Create an object schema with descriptions for properties
    ///
    /// # Arguments
    /// * `properties` - A list of tuples (name, type, description, required)
    ///
    /// # Example
    /// ```ignore
    /// let schema = SchemaBuilder::object_schema(vec![
    ///     ("selector", "string", "CSS selector", true),
    ///     ("timeout_ms", "integer", "Wait budget", false),
    /// ]);
    /// ```
    pub fn object_schema(properties: Vec<(&str, &str, &str, bool)>) -> JsonValue {
        let props: serde_json::Map<String, JsonValue> = properties
            .iter()
            .map(|(name, type_str, desc, _)| {
                (
                    name.to_string(),
                    json!({"type": type_str, "description": desc}),
                )
            })
            .collect();

        let required: Vec<&str> = properties
            .iter()
            .filter(|(_, _, _, required)| *required)
            .map(|(name, _, _, _)| *name)
            .collect();

        json!({
            "type": "object",
            "properties": props,
            "required": required
        })
    }

    /// Add inclusive numeric bounds to one property of an object schema
    pub fn with_range(mut schema: JsonValue, property: &str, min: i64, max: i64) -> JsonValue {
        if let Some(prop) = schema
            .get_mut("properties")
            .and_then(|p| p.get_mut(property))
            .and_then(JsonValue::as_object_mut)
        {
            prop.insert("minimum".to_string(), json!(min));
            prop.insert("maximum".to_string(), json!(max));
        }
        schema
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_schema() {
        let schema = SchemaBuilder::object_schema(vec![
            ("selector", "string", "CSS selector", true),
            ("text", "string", "Value to enter", true),
            ("timeout_ms", "integer", "Wait budget", false),
        ]);

        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["selector"]["description"], "CSS selector");
        assert_eq!(schema["required"], json!(["selector", "text"]));
    }

    #[test]
    fn test_with_range() {
        let schema = SchemaBuilder::with_range(
            SchemaBuilder::object_schema(vec![("seconds", "integer", "Sleep", true)]),
            "seconds",
            1,
            10,
        );
        assert_eq!(schema["properties"]["seconds"]["minimum"], 1);
        assert_eq!(schema["properties"]["seconds"]["maximum"], 10);

        // unknown property leaves the schema untouched
        let untouched = SchemaBuilder::with_range(SchemaBuilder::empty(), "missing", 0, 1);
        assert_eq!(untouched, SchemaBuilder::empty());
    }
}
