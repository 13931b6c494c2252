//! Structured (JSON-schema constrained) model calls.
//!
//! The schema is generated from the target type with `schemars`, sent as an
//! `output_config`, and the response text is parsed back into the type.
//! Providers that ignore `output_config` still work as long as they answer
//! with JSON; surrounding Markdown code fences are tolerated.

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;

use studyflow_types::llm::{
    CompletionRequest, LlmError, OutputConfig, OutputFormat, OutputJsonSchema,
};

use super::box_provider::BoxLlmProvider;

#[derive(Debug, thiserror::Error)]
pub enum StructuredError {
    #[error("model call failed: {0}")]
    Llm(#[from] LlmError),

    #[error("schema generation failed: {0}")]
    Schema(String),

    #[error("failed to parse {type_name}: {message}")]
    Parse { type_name: String, message: String },
}

/// Build an `OutputConfig` constraining the response to `T`'s JSON schema.
pub fn output_config_for<T: JsonSchema>(name: &str) -> Result<OutputConfig, StructuredError> {
    let schema = schemars::schema_for!(T);
    let mut schema_value =
        serde_json::to_value(schema).map_err(|e| StructuredError::Schema(e.to_string()))?;
    add_additional_properties_false(&mut schema_value);

    Ok(OutputConfig {
        format: OutputFormat {
            type_field: "json_schema".to_string(),
            json_schema: OutputJsonSchema {
                name: name.to_string(),
                schema: schema_value,
                strict: Some(true),
            },
        },
    })
}

/// Recursively set `additionalProperties: false` on every object schema.
///
/// Strict structured output rejects schemas that leave it open.
pub fn add_additional_properties_false(value: &mut Value) {
    match value {
        Value::Object(map) => {
            if map.get("type").and_then(Value::as_str) == Some("object") {
                map.entry("additionalProperties".to_string())
                    .or_insert(Value::Bool(false));
            }
            for child in map.values_mut() {
                add_additional_properties_false(child);
            }
        }
        Value::Array(items) => {
            for item in items {
                add_additional_properties_false(item);
            }
        }
        _ => {}
    }
}

/// Parse model output into `T`, tolerating code fences and leading prose.
pub fn parse_structured<T: DeserializeOwned>(content: &str) -> Result<T, StructuredError> {
    let type_name = std::any::type_name::<T>()
        .rsplit("::")
        .next()
        .unwrap_or("value")
        .to_string();

    let body = extract_json_object(content).ok_or_else(|| StructuredError::Parse {
        type_name: type_name.clone(),
        message: "no JSON object in response".to_string(),
    })?;

    serde_json::from_str::<T>(body).map_err(|e| StructuredError::Parse {
        type_name,
        message: e.to_string(),
    })
}

/// Slice from the first `{` to the last `}`.
fn extract_json_object(content: &str) -> Option<&str> {
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    (end > start).then(|| &content[start..=end])
}

/// Send `request` with `T`'s schema attached and parse the answer.
pub async fn complete_structured<T>(
    provider: &BoxLlmProvider,
    mut request: CompletionRequest,
    schema_name: &str,
) -> Result<T, StructuredError>
where
    T: JsonSchema + DeserializeOwned,
{
    request.output_config = Some(output_config_for::<T>(schema_name)?);
    let response = provider.complete(&request).await?;
    parse_structured(&response.content)
}
