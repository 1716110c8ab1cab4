//! Extraction schema
//!
//! Describes the exact shape the model must return. The same description is
//! sent to Gemini as `responseSchema` and used locally to reject responses
//! before they can reach the report layer.

use crate::error::AnalysisError;
use crate::models::ExtractionData;
use crate::Result;
use serde_json::{json, Map, Value};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    Number,
    Integer,
    Boolean,
    String,
    /// String restricted to a fixed set of values
    Enum(&'static [&'static str]),
    StringList,
    Object(Vec<FieldSpec>),
    ObjectList(Vec<FieldSpec>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    pub description: &'static str,
}

impl FieldSpec {
    fn required(name: &'static str, kind: FieldKind, description: &'static str) -> Self {
        Self { name, kind, required: true, description }
    }

    fn optional(name: &'static str, kind: FieldKind, description: &'static str) -> Self {
        Self { name, kind, required: false, description }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionSchema {
    fields: Vec<FieldSpec>,
}

impl ExtractionSchema {
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self { fields }
    }

    /// Family-law extraction contract: financial summary plus optional case,
    /// custody, obligation and risk sections.
    pub fn standard() -> Self {
        use FieldKind::*;

        let case_info = vec![
            FieldSpec::required("parties", String, "Names of the parties, e.g. 'Smith vs. Smith'"),
            FieldSpec::required("jurisdiction", String, "Court and jurisdiction"),
            FieldSpec::required("caseNumber", String, "Court file number"),
            FieldSpec::required("date", String, "Date of the order or filing"),
        ];

        let custody = vec![
            FieldSpec::required("id", Integer, "Sequential identifier"),
            FieldSpec::required("label", String, "Schedule name, e.g. 'Summer Break'"),
            FieldSpec::required("value", String, "Short arrangement, e.g. 'Week On / Week Off'"),
            FieldSpec::required("detail", String, "Exchange times and parenting details"),
        ];

        let financials = vec![
            FieldSpec::required("id", Integer, "Sequential identifier"),
            FieldSpec::required("type", Enum(&["support", "asset"]), "Support payment or asset/deadline item"),
            FieldSpec::required("title", String, "Obligation title"),
            FieldSpec::required("amount", String, "Amount as written, e.g. '$1,250/mo'"),
            FieldSpec::required("due", String, "Due date or duration"),
        ];

        let risks = vec![
            FieldSpec::required("id", Integer, "Sequential identifier"),
            FieldSpec::required("severity", Enum(&["high", "medium", "low"]), "Risk severity"),
            FieldSpec::required("title", String, "Short risk title"),
            FieldSpec::required("description", String, "Why this clause is a risk and a recommendation"),
        ];

        Self::new(vec![
            FieldSpec::required("applicantIncome", Number, "Annual income of the applicant in CAD"),
            FieldSpec::required("respondentIncome", Number, "Annual income of the respondent in CAD"),
            FieldSpec::optional("childSupport", Number, "Monthly child support amount"),
            FieldSpec::optional("spousalSupport", Number, "Monthly spousal support amount"),
            FieldSpec::required("hasODSP", Boolean, "True if ODSP is mentioned/relevant"),
            FieldSpec::required("hasCPP", Boolean, "True if CPP Disability is mentioned"),
            FieldSpec::required("complianceNotes", StringList, "List of brief compliance observations"),
            FieldSpec::optional("caseInfo", Object(case_info), "Case metadata"),
            FieldSpec::optional("custody", ObjectList(custody), "Parenting time schedule entries"),
            FieldSpec::optional("financials", ObjectList(financials), "Support obligations, assets and deadlines"),
            FieldSpec::optional("risks", ObjectList(risks), "Drafting risks found in the document"),
        ])
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn required_fields(&self) -> Vec<&'static str> {
        self.fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.name)
            .collect()
    }

    /// Non-empty, no duplicate names at any level, no empty enums or objects.
    pub fn is_well_formed(&self) -> bool {
        fields_well_formed(&self.fields)
    }

    /// Gemini `responseSchema` (OpenAPI subset).
    pub fn response_schema(&self) -> Value {
        object_schema(&self.fields)
    }

    /// Validate a parsed model response and convert it into typed data.
    ///
    /// Rejects the whole response on the first violation.
    pub fn validate(&self, value: &Value) -> Result<ExtractionData> {
        validate_object(&self.fields, value, "$")?;

        serde_json::from_value(value.clone())
            .map_err(|e| AnalysisError::SchemaViolation(e.to_string()))
    }
}

impl Default for ExtractionSchema {
    fn default() -> Self {
        Self::standard()
    }
}

fn fields_well_formed(fields: &[FieldSpec]) -> bool {
    if fields.is_empty() {
        return false;
    }

    let mut seen = HashSet::new();
    fields.iter().all(|field| {
        let nested_ok = match &field.kind {
            FieldKind::Enum(values) => !values.is_empty(),
            FieldKind::Object(inner) | FieldKind::ObjectList(inner) => fields_well_formed(inner),
            _ => true,
        };
        !field.name.is_empty() && seen.insert(field.name) && nested_ok
    })
}

fn object_schema(fields: &[FieldSpec]) -> Value {
    let mut properties = Map::new();
    for field in fields {
        let mut schema = kind_schema(&field.kind);
        if let Value::Object(map) = &mut schema {
            map.insert("description".to_string(), json!(field.description));
        }
        properties.insert(field.name.to_string(), schema);
    }

    let required: Vec<&str> = fields.iter().filter(|f| f.required).map(|f| f.name).collect();

    json!({
        "type": "OBJECT",
        "properties": properties,
        "required": required,
    })
}

fn kind_schema(kind: &FieldKind) -> Value {
    match kind {
        FieldKind::Number => json!({ "type": "NUMBER" }),
        FieldKind::Integer => json!({ "type": "INTEGER" }),
        FieldKind::Boolean => json!({ "type": "BOOLEAN" }),
        FieldKind::String => json!({ "type": "STRING" }),
        FieldKind::Enum(values) => json!({ "type": "STRING", "enum": values }),
        FieldKind::StringList => json!({ "type": "ARRAY", "items": { "type": "STRING" } }),
        FieldKind::Object(fields) => object_schema(fields),
        FieldKind::ObjectList(fields) => json!({ "type": "ARRAY", "items": object_schema(fields) }),
    }
}

fn violation(path: &str, message: impl AsRef<str>) -> AnalysisError {
    AnalysisError::SchemaViolation(format!("{}: {}", path, message.as_ref()))
}

fn validate_object(fields: &[FieldSpec], value: &Value, path: &str) -> Result<()> {
    let object = value
        .as_object()
        .ok_or_else(|| violation(path, "expected an object"))?;

    for field in fields {
        let field_path = format!("{}.{}", path, field.name);
        match object.get(field.name) {
            None | Some(Value::Null) if field.required => {
                return Err(violation(
                    &field_path,
                    format!("missing required field `{}`", field.name),
                ));
            }
            None | Some(Value::Null) => {}
            Some(v) => validate_value(&field.kind, v, &field_path)?,
        }
    }

    Ok(())
}

fn validate_value(kind: &FieldKind, value: &Value, path: &str) -> Result<()> {
    match kind {
        FieldKind::Number if value.is_number() => Ok(()),
        FieldKind::Number => Err(violation(path, "expected a number")),
        FieldKind::Integer if value.is_u64() => Ok(()),
        FieldKind::Integer => Err(violation(path, "expected a non-negative integer")),
        FieldKind::Boolean if value.is_boolean() => Ok(()),
        FieldKind::Boolean => Err(violation(path, "expected a boolean")),
        FieldKind::String if value.is_string() => Ok(()),
        FieldKind::String => Err(violation(path, "expected a string")),
        FieldKind::Enum(allowed) => match value.as_str() {
            Some(s) if allowed.contains(&s) => Ok(()),
            Some(s) => Err(violation(
                path,
                format!("`{}` is not one of {}", s, allowed.join("|")),
            )),
            None => Err(violation(path, "expected a string")),
        },
        FieldKind::StringList => {
            let items = value
                .as_array()
                .ok_or_else(|| violation(path, "expected an array of strings"))?;
            for (i, item) in items.iter().enumerate() {
                if !item.is_string() {
                    return Err(violation(&format!("{}[{}]", path, i), "expected a string"));
                }
            }
            Ok(())
        }
        FieldKind::Object(fields) => validate_object(fields, value, path),
        FieldKind::ObjectList(fields) => {
            let items = value
                .as_array()
                .ok_or_else(|| violation(path, "expected an array"))?;
            for (i, item) in items.iter().enumerate() {
                validate_object(fields, item, &format!("{}[{}]", path, i))?;
            }
            Ok(())
        }
    }
}
