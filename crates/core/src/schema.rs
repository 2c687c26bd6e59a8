//! Introspected workflow schema.
//!
//! Parses the backend's `/workflow/{name}/introspect` payload into an
//! immutable [`WorkflowSchema`]. Parsing is all-or-nothing: any missing
//! or malformed field fails the whole payload with a [`SchemaError`].
//!
//! ```json
//! {
//!   "nodes": [
//!     {
//!       "id": "3",
//!       "type": "KSampler",
//!       "label": "Sampler",
//!       "inputs": [
//!         { "name": "seed", "type": "int", "default": 42, "is_seed": true }
//!       ]
//!     }
//!   ]
//! }
//! ```

use std::collections::HashSet;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SchemaError;
use crate::heuristics::{classify_input, Category};
use crate::types::{NodeId, ValueKey};
use crate::value::InputValue;

// ---------------------------------------------------------------------------
// Data structures
// ---------------------------------------------------------------------------

/// One entry of the `/workflows` listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowSummary {
    /// Stable unique id (the workflow's file name on the backend).
    #[serde(alias = "fileName")]
    pub file_name: String,
    /// Display label.
    pub name: String,
    /// Raw timestamp string as issued by the server.
    #[serde(alias = "lastModified")]
    pub last_modified: String,
}

impl WorkflowSummary {
    /// Parse [`last_modified`](Self::last_modified) as UTC.
    ///
    /// Accepts RFC 3339 and naive ISO 8601 (assumed UTC). Returns `None`
    /// for anything else; the raw string stays authoritative.
    pub fn last_modified_at(&self) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(&self.last_modified) {
            return Some(dt.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(&self.last_modified, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| naive.and_utc())
    }
}

/// Declared type of an input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclaredType {
    Int,
    Float,
    Bool,
    String,
    Object,
}

impl DeclaredType {
    /// Map a wire type name. Unrecognised names edit as strings.
    pub fn from_wire(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "int" | "integer" => Self::Int,
            "float" | "number" | "double" => Self::Float,
            "bool" | "boolean" => Self::Bool,
            "object" | "dict" | "json" => Self::Object,
            _ => Self::String,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::Float => "float",
            Self::Bool => "bool",
            Self::String => "string",
            Self::Object => "object",
        }
    }
}

/// One editable parameter of a node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InputSpec {
    pub name: String,
    pub declared_type: DeclaredType,
    /// `None` when the payload omits the default or sends `null`.
    pub default: Option<InputValue>,
    pub is_seed: bool,
}

/// A named step in the workflow graph.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeSpec {
    pub id: NodeId,
    pub type_name: String,
    pub label: Option<String>,
    pub inputs: Vec<InputSpec>,
}

impl NodeSpec {
    /// Label when present, otherwise the node type.
    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.type_name)
    }
}

/// Immutable schema of one workflow, replaced wholesale on every fetch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowSchema {
    pub workflow_name: String,
    pub nodes: Vec<NodeSpec>,
}

impl WorkflowSchema {
    /// Parse an introspection payload.
    pub fn parse(workflow_name: &str, payload: &serde_json::Value) -> Result<Self, SchemaError> {
        let obj = payload.as_object().ok_or(SchemaError::NotAnObject)?;

        let raw_nodes = obj
            .get("nodes")
            .ok_or_else(|| SchemaError::MissingField {
                path: "$".to_string(),
                field: "nodes",
            })?
            .as_array()
            .ok_or_else(|| SchemaError::InvalidField {
                path: "$".to_string(),
                field: "nodes",
                expected: "an array",
            })?;

        let mut seen = HashSet::new();
        let mut nodes = Vec::with_capacity(raw_nodes.len());

        for (index, raw) in raw_nodes.iter().enumerate() {
            let node = parse_node(&format!("$.nodes[{index}]"), raw)?;
            if !seen.insert(node.id.clone()) {
                return Err(SchemaError::DuplicateNode(node.id));
            }
            nodes.push(node);
        }

        Ok(Self {
            workflow_name: workflow_name.to_string(),
            nodes,
        })
    }

    /// Parse an introspection payload from its JSON text.
    pub fn parse_str(workflow_name: &str, text: &str) -> Result<Self, SchemaError> {
        let payload: serde_json::Value =
            serde_json::from_str(text).map_err(|e| SchemaError::Json(e.to_string()))?;
        Self::parse(workflow_name, &payload)
    }

    pub fn node(&self, node_id: &str) -> Option<&NodeSpec> {
        self.nodes.iter().find(|n| n.id == node_id)
    }

    pub fn input(&self, key: &ValueKey) -> Option<&InputSpec> {
        self.node(&key.node_id)?
            .inputs
            .iter()
            .find(|i| i.name == key.input_name)
    }

    pub fn contains(&self, key: &ValueKey) -> bool {
        self.input(key).is_some()
    }

    /// Every `(node, input)` key in schema order.
    pub fn keys(&self) -> impl Iterator<Item = ValueKey> + '_ {
        self.nodes.iter().flat_map(|node| {
            node.inputs
                .iter()
                .map(move |input| ValueKey::new(node.id.clone(), input.name.clone()))
        })
    }

    /// Every input together with its category, in schema order.
    pub fn classified_inputs(&self) -> impl Iterator<Item = (&NodeSpec, &InputSpec, Category)> {
        self.nodes.iter().flat_map(|node| {
            node.inputs
                .iter()
                .map(move |input| (node, input, classify_input(input)))
        })
    }

    /// Inputs a driver may render and edit: everything except
    /// header/widget inputs.
    pub fn editable_inputs(&self) -> impl Iterator<Item = (&NodeSpec, &InputSpec, Category)> {
        self.classified_inputs()
            .filter(|(_, _, category)| *category != Category::Suppressed)
    }

    pub fn has_seed_input(&self) -> bool {
        self.nodes
            .iter()
            .any(|node| node.inputs.iter().any(|i| i.is_seed))
    }
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn parse_node(path: &str, raw: &serde_json::Value) -> Result<NodeSpec, SchemaError> {
    let obj = raw.as_object().ok_or_else(|| SchemaError::InvalidField {
        path: path.to_string(),
        field: "node",
        expected: "an object",
    })?;

    let id = required_str(path, obj, "id")?;
    let type_name = required_str(path, obj, "type")?;
    let label = optional_str(path, obj, "label")?;

    let raw_inputs = obj
        .get("inputs")
        .ok_or_else(|| SchemaError::MissingField {
            path: path.to_string(),
            field: "inputs",
        })?
        .as_array()
        .ok_or_else(|| SchemaError::InvalidField {
            path: path.to_string(),
            field: "inputs",
            expected: "an array",
        })?;

    let inputs = raw_inputs
        .iter()
        .enumerate()
        .map(|(index, raw)| parse_input(&format!("{path}.inputs[{index}]"), raw))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(NodeSpec {
        id,
        type_name,
        label,
        inputs,
    })
}

fn parse_input(path: &str, raw: &serde_json::Value) -> Result<InputSpec, SchemaError> {
    let obj = raw.as_object().ok_or_else(|| SchemaError::InvalidField {
        path: path.to_string(),
        field: "input",
        expected: "an object",
    })?;

    let name = required_str(path, obj, "name")?;
    let declared_type = DeclaredType::from_wire(&required_str(path, obj, "type")?);

    let default = match obj.get("default") {
        None | Some(serde_json::Value::Null) => None,
        Some(value) => Some(InputValue::from(value.clone())),
    };

    let is_seed = match obj.get("is_seed") {
        None | Some(serde_json::Value::Null) => false,
        Some(value) => value.as_bool().ok_or_else(|| SchemaError::InvalidField {
            path: path.to_string(),
            field: "is_seed",
            expected: "a boolean",
        })?,
    };

    Ok(InputSpec {
        name,
        declared_type,
        default,
        is_seed,
    })
}

fn required_str(
    path: &str,
    obj: &serde_json::Map<String, serde_json::Value>,
    field: &'static str,
) -> Result<String, SchemaError> {
    let value = obj.get(field).ok_or_else(|| SchemaError::MissingField {
        path: path.to_string(),
        field,
    })?;
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| SchemaError::InvalidField {
            path: path.to_string(),
            field,
            expected: "a string",
        })
}

fn optional_str(
    path: &str,
    obj: &serde_json::Map<String, serde_json::Value>,
    field: &'static str,
) -> Result<Option<String>, SchemaError> {
    match obj.get(field) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(value) => value
            .as_str()
            .map(|s| Some(s.to_string()))
            .ok_or_else(|| SchemaError::InvalidField {
                path: path.to_string(),
                field,
                expected: "a string",
            }),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
