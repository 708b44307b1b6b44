use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Value, json};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisSource {
    #[default]
    Model,
    Fallback,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub summary: String,
    #[serde(default, deserialize_with = "lenient_list")]
    pub key_terms: Vec<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub main_clauses: Vec<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub critical_dates: Vec<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub parties: Vec<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub jurisdiction: String,
    #[serde(default, deserialize_with = "lenient_list")]
    pub obligations: Vec<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub risks: Vec<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub recommendations: Vec<String>,
    #[serde(default, alias = "missing_clauses", deserialize_with = "lenient_list")]
    pub missing_or_unusual: Vec<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub compliance_issues: Vec<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub next_steps: Vec<String>,
    #[serde(skip_deserializing)]
    pub source: AnalysisSource,
}

impl AnalysisResult {
    /// Every structural field present and empty, with the failure spelled out.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::default()
        }
    }
}

fn render_scalar(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.trim().to_string()),
        Value::Object(map) => {
            let fields: Vec<String> = map
                .iter()
                .filter_map(|(key, value)| render_scalar(value).map(|v| format!("{key}: {v}")))
                .collect();
            Some(fields.join(", "))
        }
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(render_scalar)
                .collect::<Vec<_>>()
                .join(", "),
        ),
        other => Some(other.to_string()),
    }
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(render_scalar(&value).unwrap_or_default())
}

fn lenient_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    let items: Vec<String> = match value {
        Value::Array(items) => items.iter().filter_map(render_scalar).collect(),
        other => render_scalar(&other).into_iter().collect(),
    };
    Ok(items
        .into_iter()
        .filter(|item| !item.is_empty())
        .collect())
}

pub const ANALYSIS_FIELDS: [&str; 12] = [
    "summary",
    "key_terms",
    "main_clauses",
    "critical_dates",
    "parties",
    "jurisdiction",
    "obligations",
    "risks",
    "recommendations",
    "missing_or_unusual",
    "compliance_issues",
    "next_steps",
];

pub fn analysis_schema() -> Value {
    let list = |description: &str| {
        json!({
            "type": "array",
            "items": { "type": "string" },
            "description": description
        })
    };

    json!({
        "type": "object",
        "additionalProperties": false,
        "properties": {
            "summary": {
                "type": "string",
                "description": "Plain-language overview of the document in 3-5 sentences."
            },
            "key_terms": list("Important defined terms and amounts, each as 'term: meaning'."),
            "main_clauses": list("The principal clauses, each summarised in one sentence."),
            "critical_dates": list("Deadlines, durations, renewal and notice dates."),
            "parties": list("Every party to the agreement and their role."),
            "jurisdiction": {
                "type": "string",
                "description": "Governing law / jurisdiction, or 'Not specified'."
            },
            "obligations": list("What each party must do, naming the party."),
            "risks": list("Clauses that are one-sided, ambiguous or costly for the reader."),
            "recommendations": list("Concrete suggestions for the reader before signing."),
            "missing_or_unusual": list("Standard clauses that are absent, or clauses that are atypical."),
            "compliance_issues": list("Provisions that may conflict with applicable law."),
            "next_steps": list("Practical next steps for the reader.")
        },
        "required": ANALYSIS_FIELDS
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_default_to_empty() {
        let parsed: AnalysisResult = serde_json::from_str(r#"{"summary":"ok"}"#).unwrap();
        assert_eq!(parsed.summary, "ok");
        assert!(parsed.key_terms.is_empty());
        assert_eq!(parsed.jurisdiction, "");
        assert!(parsed.error.is_none());
        assert_eq!(parsed.source, AnalysisSource::Model);
    }

    #[test]
    fn odd_shapes_are_rendered_as_strings() {
        let parsed: AnalysisResult = serde_json::from_value(json!({
            "summary": null,
            "key_terms": [{"term": "Rent"}, "Deposit", null, 3],
            "parties": "Landlord and Tenant",
            "jurisdiction": ["California", "USA"],
            "missing_clauses": ["Force majeure"]
        }))
        .unwrap();
        assert_eq!(parsed.summary, "");
        assert_eq!(
            parsed.key_terms,
            vec!["term: Rent", "Deposit", "3"]
        );
        assert_eq!(parsed.parties, vec!["Landlord and Tenant"]);
        assert_eq!(parsed.jurisdiction, "California, USA");
        assert_eq!(parsed.missing_or_unusual, vec!["Force majeure"]);
    }

    #[test]
    fn failed_result_keeps_the_full_shape() {
        let value = serde_json::to_value(AnalysisResult::failed("quota exceeded")).unwrap();
        let object = value.as_object().unwrap();
        assert_eq!(object["error"], "quota exceeded");
        for field in ANALYSIS_FIELDS {
            assert!(object.contains_key(field), "missing {field}");
        }
        assert_eq!(object["source"], "model");
    }

    #[test]
    fn schema_requires_every_field() {
        let schema = analysis_schema();
        let required = schema["required"].as_array().unwrap();
        assert_eq!(required.len(), 12);
        assert_eq!(schema["properties"]["risks"]["type"], "array");
    }
}
