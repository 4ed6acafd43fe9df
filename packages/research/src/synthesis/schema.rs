//! Response schema for model synthesis and its decoder.

use schemars::gen::SchemaSettings;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ResearchError, Result};

/// Shape the language model must return.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SynthesisResponse {
    pub overview: String,
    pub key_findings: Vec<KeyFindingResponse>,
    pub timeline: Vec<TimelineResponse>,
    #[serde(default)]
    pub limitations: Vec<String>,
    #[serde(default)]
    pub next_questions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct KeyFindingResponse {
    pub title: String,
    pub insight: String,
    pub evidence: Vec<String>,
    /// Evidence ids, exactly as given in the prompt
    pub citations: Vec<String>,
    /// 0.0 to 1.0
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TimelineResponse {
    pub date: String,
    pub event: String,
    pub citations: Vec<String>,
}

/// Strict-mode JSON schema: subschemas inlined, every property required,
/// no additional properties.
pub fn response_schema() -> Value {
    let schema = SchemaSettings::draft07()
        .with(|s| {
            s.inline_subschemas = true;
            s.option_nullable = false;
        })
        .into_generator()
        .into_root_schema_for::<SynthesisResponse>();

    let mut value = serde_json::to_value(schema).unwrap_or_default();
    close_objects(&mut value);
    if let Value::Object(map) = &mut value {
        map.remove("$schema");
        map.remove("definitions");
    }
    value
}

fn close_objects(value: &mut Value) {
    match value {
        Value::Object(map) => {
            if map.get("type") == Some(&Value::String("object".to_string())) {
                map.insert("additionalProperties".to_string(), Value::Bool(false));
                if let Some(Value::Object(props)) = map.get("properties") {
                    let required: Vec<Value> = props.keys().cloned().map(Value::String).collect();
                    map.insert("required".to_string(), Value::Array(required));
                }
            }
            for child in map.values_mut() {
                close_objects(child);
            }
        }
        Value::Array(items) => items.iter_mut().for_each(close_objects),
        _ => {}
    }
}

/// Decode raw model output, tolerating markdown fences and surrounding prose.
///
/// Any shape mismatch is a [`ResearchError::SchemaValidationFailed`].
pub fn decode_response(raw: &str) -> Result<SynthesisResponse> {
    let body = strip_fences(raw);
    let json = match (body.find('{'), body.rfind('}')) {
        (Some(start), Some(end)) if end > start => &body[start..=end],
        _ => {
            return Err(ResearchError::SchemaValidationFailed(
                "response contains no JSON object".to_string(),
            ))
        }
    };

    let response: SynthesisResponse = serde_json::from_str(json)
        .map_err(|e| ResearchError::SchemaValidationFailed(e.to_string()))?;

    if response.overview.trim().is_empty() {
        return Err(ResearchError::SchemaValidationFailed(
            "overview is empty".to_string(),
        ));
    }
    if let Some(bad) = response
        .key_findings
        .iter()
        .find(|f| !(0.0..=1.0).contains(&f.confidence))
    {
        return Err(ResearchError::SchemaValidationFailed(format!(
            "confidence {} out of range for \"{}\"",
            bad.confidence, bad.title
        )));
    }
    Ok(response)
}

fn strip_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"{
        "overview": "The Ashby ferry served Harwood.",
        "keyFindings": [{"title": "Service", "insight": "Daily crossings.", "evidence": ["quote"], "citations": ["ARCHIVE:1"], "confidence": 0.8}],
        "timeline": [{"date": "1912", "event": "New punt", "citations": ["ARCHIVE:1"]}],
        "limitations": [],
        "nextQuestions": []
    }"#;

    #[test]
    fn test_decodes_plain_and_fenced() {
        assert!(decode_response(VALID).is_ok());
        let fenced = format!("```json\n{VALID}\n```");
        assert_eq!(decode_response(&fenced).unwrap().key_findings.len(), 1);
        let chatty = format!("Here is the report:\n{VALID}\nHope this helps.");
        assert!(decode_response(&chatty).is_ok());
    }

    #[test]
    fn test_rejects_wrong_shape() {
        for raw in [
            "not json at all",
            "{\"overview\": \"x\"}",
            "{\"overview\": \"\", \"keyFindings\": [], \"timeline\": []}",
            r#"{"overview": "x", "keyFindings": [{"title": "t", "insight": "i", "evidence": [], "citations": [], "confidence": 3.0}], "timeline": []}"#,
        ] {
            assert!(matches!(
                decode_response(raw),
                Err(ResearchError::SchemaValidationFailed(_))
            ));
        }
    }

    #[test]
    fn test_schema_is_strict() {
        let schema = response_schema();
        assert_eq!(schema["additionalProperties"], Value::Bool(false));
        let required = schema["required"].as_array().unwrap();
        assert!(required.contains(&Value::String("keyFindings".to_string())));
        let item = &schema["properties"]["keyFindings"]["items"];
        assert_eq!(item["additionalProperties"], Value::Bool(false));
        assert!(schema.get("definitions").is_none());
    }
}
