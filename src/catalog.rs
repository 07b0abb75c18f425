//! Tool Catalog (C2) — the registry of tools a model may be offered and the
//! gate for validating a model's arguments before execution.
//!
//! spec.md §9 calls for a "tagged variant" redesign: rather than a
//! `HashMap<String, Arc<dyn ToolProvider>>` of heterogeneous trait objects
//! (the teacher's `ToolRegistry` shape), callable tools are a closed
//! `ToolKind` enum. Dispatch on `ToolKind` is exhaustive and checked at
//! compile time; adding a new tool means adding a match arm, not hoping every
//! caller remembered to check a runtime flag.

use crate::error::ToolError;
use jsonschema::Validator;
use serde_json::Value;
use std::collections::HashMap;

/// The closed set of side-effecting tools the orchestrator can offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    VaultSearch,
    FileRead,
    WebSearch,
}

impl ToolKind {
    pub fn name(&self) -> &'static str {
        match self {
            ToolKind::VaultSearch => "vault_search",
            ToolKind::FileRead => "file_read",
            ToolKind::WebSearch => "web_search",
        }
    }

    /// Whether this tool's output passes through the Disclosure Filter
    /// before reaching the model (spec.md §4.5 — file-read is explicitly
    /// excluded).
    pub fn requires_disclosure_review(&self) -> bool {
        match self {
            ToolKind::VaultSearch | ToolKind::WebSearch => true,
            ToolKind::FileRead => false,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "vault_search" => Some(ToolKind::VaultSearch),
            "file_read" => Some(ToolKind::FileRead),
            "web_search" => Some(ToolKind::WebSearch),
            _ => None,
        }
    }
}

/// A tool as advertised to the model: name, description, and a JSON Schema
/// for its arguments.
pub struct ToolDescriptor {
    pub kind: ToolKind,
    pub description: &'static str,
    pub schema: Value,
    validator: Validator,
}

impl ToolDescriptor {
    fn new(kind: ToolKind, description: &'static str, schema: Value) -> Self {
        let validator = jsonschema::validator_for(&schema).expect("built-in tool schema is valid");
        Self {
            kind,
            description,
            schema,
            validator,
        }
    }

    /// Validate a model-supplied arguments object against this tool's
    /// schema, producing a human-readable error on the first mismatch.
    pub fn validate(&self, arguments: &Value) -> Result<(), ToolError> {
        if let Some(first) = self.validator.iter_errors(arguments).next() {
            return Err(ToolError::SchemaValidation {
                tool: self.kind.name().to_string(),
                detail: first.to_string(),
            });
        }
        Ok(())
    }
}

/// Registry of the known tool descriptors, built once at startup.
///
/// Grounded on `km-tools::llm::registry::ToolRegistry`'s register/get shape,
/// generalized from trait-object storage to enum-keyed descriptor storage.
pub struct ToolCatalog {
    descriptors: HashMap<ToolKind, ToolDescriptor>,
}

impl ToolCatalog {
    pub fn new() -> Self {
        let mut descriptors = HashMap::new();
        descriptors.insert(
            ToolKind::VaultSearch,
            ToolDescriptor::new(
                ToolKind::VaultSearch,
                "Case-insensitive substring search over the configured vault directory tree.",
                serde_json::json!({
                    "type": "object",
                    "properties": {
                        "query": { "type": "string", "minLength": 1 },
                        "limit": { "type": "integer", "minimum": 0, "maximum": 50 }
                    },
                    "required": ["query"],
                    "additionalProperties": false
                }),
            ),
        );
        descriptors.insert(
            ToolKind::FileRead,
            ToolDescriptor::new(
                ToolKind::FileRead,
                "Read the full contents of one or more files by path.",
                serde_json::json!({
                    "type": "object",
                    "properties": {
                        "filePaths": {
                            "type": "array",
                            "items": { "type": "string", "minLength": 1 }
                        }
                    },
                    "required": ["filePaths"],
                    "additionalProperties": false
                }),
            ),
        );
        descriptors.insert(
            ToolKind::WebSearch,
            ToolDescriptor::new(
                ToolKind::WebSearch,
                "Search the web and return ranked result snippets.",
                serde_json::json!({
                    "type": "object",
                    "properties": {
                        "query": { "type": "string", "minLength": 1 },
                        "maxResults": { "type": "integer", "minimum": 1, "maximum": 10 }
                    },
                    "required": ["query"],
                    "additionalProperties": false
                }),
            ),
        );
        Self { descriptors }
    }

    pub fn get(&self, kind: ToolKind) -> &ToolDescriptor {
        self.descriptors
            .get(&kind)
            .expect("ToolCatalog::new registers every ToolKind variant")
    }

    pub fn lookup(&self, name: &str) -> Result<&ToolDescriptor, ToolError> {
        match ToolKind::from_name(name) {
            Some(kind) => Ok(self.get(kind)),
            None => Err(ToolError::UnknownTool(name.to_string())),
        }
    }

    /// The tools to advertise for a given request, respecting the
    /// Capability Gate's allow/deny decision upstream: callers pass
    /// `enabled = false` when `gate::may_use_tools` said no, in which case
    /// this returns an empty list rather than every tool minus some.
    pub fn tools_for_request(&self, enabled: bool) -> Vec<&ToolDescriptor> {
        if !enabled {
            return Vec::new();
        }
        let mut all: Vec<&ToolDescriptor> = self.descriptors.values().collect();
        all.sort_by_key(|d| d.kind.name());
        all
    }

    pub fn validate_call(&self, name: &str, arguments: &Value) -> Result<ToolKind, ToolError> {
        let descriptor = self.lookup(name)?;
        descriptor.validate(arguments)?;
        Ok(descriptor.kind)
    }
}

impl Default for ToolCatalog {
    fn default() -> Self {
        Self::new()
    }
}
