//! Turning input documents into value trees.
//!
//! Documents are plain JSON, YAML or TOML. Three directive objects add the
//! parts of a lazy configuration language that plain data lacks:
//!
//! - `{"$thunk": X}` is an unevaluated node that becomes `X` when forced
//! - `{"$id": "name", ...}` anchors a record
//! - `{"$ref": "name"}` is the anchored record itself, shared by identity
//!
//! References may point forward or back to an enclosing record, so cyclic
//! trees can be written down directly.

use crate::value::{Node, Scalar, ValueId, ValueTree};
use confdiff_common::EvalError;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

const THUNK_KEY: &str = "$thunk";
const ID_KEY: &str = "$id";
const REF_KEY: &str = "$ref";

/// Where an evaluator reads its input from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    File(PathBuf),
    /// Document text given directly on the command line
    Inline(String),
}

impl Source {
    pub fn describe(&self) -> String {
        match self {
            Source::File(path) => path.display().to_string(),
            Source::Inline(_) => "<inline>".to_string(),
        }
    }
}

/// Produces the value tree a diff run works on
pub trait Evaluator {
    fn evaluate(&self, source: &Source) -> Result<ValueTree, EvalError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Json,
    Yaml,
    Toml,
}

impl DocumentFormat {
    /// Guess the format from a file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_string_lossy().to_lowercase();
        Self::from_name(&ext)
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "json" | "jsonc" => Some(DocumentFormat::Json),
            "yaml" | "yml" => Some(DocumentFormat::Yaml),
            "toml" => Some(DocumentFormat::Toml),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            DocumentFormat::Json => "json",
            DocumentFormat::Yaml => "yaml",
            DocumentFormat::Toml => "toml",
        }
    }

    fn parse(self, content: &str) -> Result<JsonValue, EvalError> {
        let parse_error = |message: String| EvalError::Parse {
            format: self.name().to_string(),
            message,
        };

        match self {
            DocumentFormat::Json => {
                serde_json::from_str(content).map_err(|e| parse_error(e.to_string()))
            }
            #[cfg(feature = "yaml")]
            DocumentFormat::Yaml => serde_yml::from_str::<serde_yml::Value>(content)
                .map(yaml_to_json)
                .map_err(|e| parse_error(e.to_string())),
            #[cfg(feature = "toml-input")]
            DocumentFormat::Toml => toml::from_str::<toml::Value>(content)
                .map(toml_to_json)
                .map_err(|e| parse_error(e.to_string())),
            #[allow(unreachable_patterns)]
            other => Err(EvalError::UnsupportedFormat(other.name().to_string())),
        }
    }
}

impl FromStr for DocumentFormat {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| EvalError::UnsupportedFormat(s.to_string()))
    }
}

/// Loads JSON, YAML or TOML documents
#[derive(Debug, Clone, Default)]
pub struct DocumentEvaluator {
    format: Option<DocumentFormat>,
}

impl DocumentEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `format` regardless of file extension
    pub fn with_format(mut self, format: DocumentFormat) -> Self {
        self.format = Some(format);
        self
    }

    fn format_for(&self, source: &Source) -> Result<DocumentFormat, EvalError> {
        if let Some(format) = self.format {
            return Ok(format);
        }
        match source {
            Source::File(path) => DocumentFormat::from_path(path)
                .ok_or_else(|| EvalError::UnsupportedFormat(path.display().to_string())),
            Source::Inline(_) => Ok(DocumentFormat::Json),
        }
    }

    pub fn evaluate_str(&self, content: &str, format: DocumentFormat) -> Result<ValueTree, EvalError> {
        let document = format.parse(content)?;
        let mut builder = TreeBuilder::default();
        let root = builder.build(&document)?;
        let mut tree = builder.finish()?;
        tree.set_root(root);
        Ok(tree)
    }
}

impl Evaluator for DocumentEvaluator {
    fn evaluate(&self, source: &Source) -> Result<ValueTree, EvalError> {
        let format = self.format_for(source)?;
        let tree = match source {
            Source::File(path) => {
                let content = std::fs::read_to_string(path).map_err(|e| EvalError::Read {
                    path: path.display().to_string(),
                    source: e,
                })?;
                self.evaluate_str(&content, format)?
            }
            Source::Inline(content) => self.evaluate_str(content, format)?,
        };

        debug!(
            source = %source.describe(),
            format = format.name(),
            nodes = tree.len(),
            "Evaluated document"
        );
        Ok(tree)
    }
}

#[derive(Default)]
struct TreeBuilder {
    tree: ValueTree,
    anchors: HashMap<String, ValueId>,
    /// `$ref` placeholders, patched once every anchor is known
    pending: Vec<(ValueId, String)>,
}

impl TreeBuilder {
    fn build(&mut self, value: &JsonValue) -> Result<ValueId, EvalError> {
        let id = match value {
            JsonValue::Null => self.tree.scalar(Scalar::Null),
            JsonValue::Bool(b) => self.tree.scalar(Scalar::Bool(*b)),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => self.tree.scalar(Scalar::Int(i)),
                None => self.tree.scalar(Scalar::Float(n.as_f64().unwrap_or(f64::NAN))),
            },
            JsonValue::String(s) => self.tree.text(s.as_str()),
            JsonValue::Array(items) => {
                let items = items
                    .iter()
                    .map(|item| self.build(item))
                    .collect::<Result<Vec<_>, _>>()?;
                self.tree.list(items)
            }
            JsonValue::Object(map) => self.build_object(map)?,
        };
        Ok(id)
    }

    fn build_object(&mut self, map: &serde_json::Map<String, JsonValue>) -> Result<ValueId, EvalError> {
        if let Some(target) = map.get(THUNK_KEY) {
            if map.len() != 1 {
                return Err(EvalError::InvalidDirective(format!(
                    "'{}' cannot be combined with other attributes",
                    THUNK_KEY
                )));
            }
            let target = self.build(target)?;
            return Ok(self.tree.thunk(target));
        }

        if let Some(name) = map.get(REF_KEY) {
            if map.len() != 1 {
                return Err(EvalError::InvalidDirective(format!(
                    "'{}' cannot be combined with other attributes",
                    REF_KEY
                )));
            }
            let name = name.as_str().ok_or_else(|| {
                EvalError::InvalidDirective(format!("'{}' must name an anchor", REF_KEY))
            })?;
            let placeholder = self.tree.scalar(Scalar::Null);
            self.pending.push((placeholder, name.to_string()));
            return Ok(placeholder);
        }

        let anchor = match map.get(ID_KEY) {
            Some(JsonValue::String(name)) => Some(name.clone()),
            Some(_) => {
                return Err(EvalError::InvalidDirective(format!(
                    "'{}' must be a string",
                    ID_KEY
                )))
            }
            None => None,
        };

        let mut fields = Vec::with_capacity(map.len());
        for (name, value) in map {
            if name == ID_KEY {
                continue;
            }
            fields.push((name.as_str(), self.build(value)?));
        }
        let id = self.tree.record(fields);

        if let Some(name) = anchor {
            if self.anchors.insert(name.clone(), id).is_some() {
                return Err(EvalError::InvalidDirective(format!(
                    "anchor '{}' is defined more than once",
                    name
                )));
            }
        }
        Ok(id)
    }

    fn finish(mut self) -> Result<ValueTree, EvalError> {
        for (placeholder, name) in std::mem::take(&mut self.pending) {
            let target = *self
                .anchors
                .get(&name)
                .ok_or(EvalError::UnresolvedReference(name))?;
            self.tree.replace(placeholder, Node::Alias(target));
        }
        Ok(self.tree)
    }
}

/// Convert YAML value to JSON value
#[cfg(feature = "yaml")]
fn yaml_to_json(yaml: serde_yml::Value) -> JsonValue {
    use serde_yml::Value as YamlValue;

    match yaml {
        YamlValue::Null => JsonValue::Null,
        YamlValue::Bool(b) => JsonValue::Bool(b),
        YamlValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                JsonValue::Number(serde_json::Number::from(i))
            } else if let Some(u) = n.as_u64() {
                JsonValue::Number(serde_json::Number::from(u))
            } else if let Some(f) = n.as_f64() {
                serde_json::Number::from_f64(f)
                    .map(JsonValue::Number)
                    .unwrap_or_else(|| JsonValue::String(f.to_string()))
            } else {
                JsonValue::Null
            }
        }
        YamlValue::String(s) => JsonValue::String(s),
        YamlValue::Sequence(seq) => JsonValue::Array(seq.into_iter().map(yaml_to_json).collect()),
        YamlValue::Mapping(map) => {
            let mut obj = serde_json::Map::new();
            for (k, v) in map {
                let key = match k {
                    YamlValue::String(key) => key,
                    YamlValue::Bool(b) => b.to_string(),
                    YamlValue::Number(n) => n.to_string(),
                    other => format!("{:?}", other),
                };
                obj.insert(key, yaml_to_json(v));
            }
            JsonValue::Object(obj)
        }
        YamlValue::Tagged(tagged) => yaml_to_json(tagged.value),
    }
}

/// Convert TOML value to JSON value; datetimes become strings
#[cfg(feature = "toml-input")]
fn toml_to_json(value: toml::Value) -> JsonValue {
    match value {
        toml::Value::String(s) => JsonValue::String(s),
        toml::Value::Integer(i) => JsonValue::Number(serde_json::Number::from(i)),
        toml::Value::Float(f) => serde_json::Number::from_f64(f)
            .map(JsonValue::Number)
            .unwrap_or_else(|| JsonValue::String(f.to_string())),
        toml::Value::Boolean(b) => JsonValue::Bool(b),
        toml::Value::Datetime(dt) => JsonValue::String(dt.to_string()),
        toml::Value::Array(items) => JsonValue::Array(items.into_iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => JsonValue::Object(
            table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect(),
        ),
    }
}
