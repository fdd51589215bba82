use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde_json::Value;

use crate::{ApiResponse, HarnessError, Result};

/// Expected JSON type of a schema node.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SchemaType {
    Null,
    Boolean,
    Integer,
    Number,
    String,
    Array,
    Object,
}

impl SchemaType {
    fn accepts(self, value: &Value) -> bool {
        match self {
            Self::Null => value.is_null(),
            Self::Boolean => value.is_boolean(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Number => value.is_number(),
            Self::String => value.is_string(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::String => "string",
            Self::Array => "array",
            Self::Object => "object",
        }
    }
}

fn type_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Structural description of an expected body shape.
///
/// Deliberately small: expected type, required fields, per-property
/// sub-schemas, an item schema for arrays, and optional length bounds.
#[derive(Clone, Debug)]
pub struct Schema {
    kind: SchemaType,
    required: Vec<String>,
    properties: BTreeMap<String, Schema>,
    items: Option<Box<Schema>>,
    min_items: Option<usize>,
    max_items: Option<usize>,
}

impl Schema {
    pub fn of(kind: SchemaType) -> Self {
        Self {
            kind,
            required: Vec::new(),
            properties: BTreeMap::new(),
            items: None,
            min_items: None,
            max_items: None,
        }
    }

    pub fn null() -> Self {
        Self::of(SchemaType::Null)
    }

    pub fn boolean() -> Self {
        Self::of(SchemaType::Boolean)
    }

    pub fn integer() -> Self {
        Self::of(SchemaType::Integer)
    }

    pub fn number() -> Self {
        Self::of(SchemaType::Number)
    }

    pub fn string() -> Self {
        Self::of(SchemaType::String)
    }

    pub fn object() -> Self {
        Self::of(SchemaType::Object)
    }

    pub fn array() -> Self {
        Self::of(SchemaType::Array)
    }

    pub fn array_of(items: Schema) -> Self {
        let mut schema = Self::of(SchemaType::Array);
        schema.items = Some(Box::new(items));
        schema
    }

    /// Declares a required property with its sub-schema.
    pub fn require(mut self, name: impl Into<String>, schema: Schema) -> Self {
        let name = name.into();
        self.required.push(name.clone());
        self.properties.insert(name, schema);
        self
    }

    /// Declares an optional property; only validated when present.
    pub fn field(mut self, name: impl Into<String>, schema: Schema) -> Self {
        self.properties.insert(name.into(), schema);
        self
    }

    pub fn min_items(mut self, count: usize) -> Self {
        self.min_items = Some(count);
        self
    }

    pub fn max_items(mut self, count: usize) -> Self {
        self.max_items = Some(count);
        self
    }
}

/// A single violated field path and the rule it broke.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Violation {
    /// JSONPath-style location, e.g. `$.products[3].price`.
    pub path: String,
    /// Human-readable description of the broken rule.
    pub rule: String,
}

/// Validation-ready form of a [`Schema`].
///
/// Compilation snapshots the schema so repeated validations under the same
/// cache key skip rebuilding it.
#[derive(Debug)]
pub struct CompiledSchema {
    root: Schema,
}

impl CompiledSchema {
    pub fn compile(schema: &Schema) -> Self {
        Self {
            root: schema.clone(),
        }
    }

    /// Walks `value`, collecting every violation rather than stopping at
    /// the first.
    pub fn check(&self, value: &Value) -> Vec<Violation> {
        let mut violations = Vec::new();
        walk(&self.root, value, "$", &mut violations);
        violations
    }
}

fn walk(schema: &Schema, value: &Value, path: &str, out: &mut Vec<Violation>) {
    if !schema.kind.accepts(value) {
        out.push(Violation {
            path: path.to_owned(),
            rule: format!("expected {}, got {}", schema.kind.name(), type_of(value)),
        });
        return;
    }

    match schema.kind {
        SchemaType::Object => {
            let Some(map) = value.as_object() else { return };
            for name in &schema.required {
                if !map.contains_key(name) {
                    out.push(Violation {
                        path: format!("{path}.{name}"),
                        rule: "required field missing".to_owned(),
                    });
                }
            }
            for (name, sub) in &schema.properties {
                if let Some(child) = map.get(name) {
                    walk(sub, child, &format!("{path}.{name}"), out);
                }
            }
        }
        SchemaType::Array => {
            let Some(items) = value.as_array() else { return };
            if let Some(min) = schema.min_items {
                if items.len() < min {
                    out.push(Violation {
                        path: path.to_owned(),
                        rule: format!("expected at least {min} items, got {}", items.len()),
                    });
                }
            }
            if let Some(max) = schema.max_items {
                if items.len() > max {
                    out.push(Violation {
                        path: path.to_owned(),
                        rule: format!("expected at most {max} items, got {}", items.len()),
                    });
                }
            }
            if let Some(item_schema) = &schema.items {
                for (index, item) in items.iter().enumerate() {
                    walk(item_schema, item, &format!("{path}[{index}]"), out);
                }
            }
        }
        _ => {}
    }
}

/// Validates decoded response bodies against named structural schemas.
///
/// Compiled schemas are cached by caller-supplied name for the lifetime of
/// the validator and never evicted. Known limitation: passing a different
/// schema under an already-used name silently reuses the stale compiled
/// form. Construct one validator per test run.
#[derive(Debug, Default)]
pub struct SchemaValidator {
    cache: HashMap<String, Arc<CompiledSchema>>,
}

impl SchemaValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates a response's JSON body against `schema`.
    ///
    /// Returns the decoded body unchanged when the schema accepts it.
    /// A non-JSON body is a [`HarnessError::Decode`]; a rejected body is a
    /// [`HarnessError::Schema`] listing every violated field path.
    pub fn validate(&mut self, response: &ApiResponse, schema: &Schema, name: &str) -> Result<Value> {
        let body = response.body.as_json().ok_or_else(|| {
            HarnessError::Decode(format!("schema '{name}' requires a JSON body"))
        })?;
        self.validate_value(body, schema, name)?;
        Ok(body.clone())
    }

    /// Validates a bare JSON value against `schema`.
    pub fn validate_value(&mut self, value: &Value, schema: &Schema, name: &str) -> Result<()> {
        let compiled = self
            .cache
            .entry(name.to_owned())
            .or_insert_with(|| Arc::new(CompiledSchema::compile(schema)))
            .clone();

        let violations = compiled.check(value);
        if violations.is_empty() {
            Ok(())
        } else {
            Err(HarnessError::Schema {
                name: name.to_owned(),
                violations,
            })
        }
    }

    /// Number of distinct schema names compiled so far.
    pub fn cached_schemas(&self) -> usize {
        self.cache.len()
    }
}
