//! Arena-backed model of evaluated configuration values.
//!
//! Every node lives in a [`ValueTree`] and is addressed by a [`ValueId`].
//! The id is the node's identity: shared or cyclic substructure is expressed
//! by several parents holding the same id, never by copying.

use crate::path::{AttrPath, Segment};
use confdiff_common::{AtomicMarker, EvalError};
use std::collections::HashMap;
use tracing::debug;

/// Stable handle of a node inside one [`ValueTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueId(u32);

impl ValueId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Interned attribute name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Symbol(u32);

#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    names: Vec<String>,
    index: HashMap<String, Symbol>,
}

impl SymbolTable {
    pub fn intern(&mut self, name: &str) -> Symbol {
        if let Some(symbol) = self.index.get(name) {
            return *symbol;
        }
        let symbol = Symbol(self.names.len() as u32);
        self.names.push(name.to_string());
        self.index.insert(name.to_string(), symbol);
        symbol
    }

    pub fn lookup(&self, name: &str) -> Option<Symbol> {
        self.index.get(name).copied()
    }

    pub fn resolve(&self, symbol: Symbol) -> &str {
        &self.names[symbol.0 as usize]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Not yet evaluated; becomes `target` once forced
    Thunk { target: ValueId, forced: bool },
    Scalar(Scalar),
    Text(String),
    List(Vec<ValueId>),
    /// Attribute set; names are unique within one record
    Record(Vec<(Symbol, ValueId)>),
    /// Transparent reference to another node (shared identity)
    Alias(ValueId),
}

/// Observable kind of a node, without forcing it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Unevaluated,
    Scalar,
    Text,
    List,
    Record,
}

#[derive(Debug, Clone, Default)]
pub struct ValueTree {
    nodes: Vec<Node>,
    symbols: SymbolTable,
    root: Option<ValueId>,
}

impl ValueTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn root(&self) -> Option<ValueId> {
        self.root
    }

    pub fn set_root(&mut self, id: ValueId) {
        self.root = Some(id);
    }

    pub fn push(&mut self, node: Node) -> ValueId {
        let id = ValueId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    /// Replace a node in place. Used to patch forward references.
    pub fn replace(&mut self, id: ValueId, node: Node) {
        self.nodes[id.index()] = node;
    }

    pub fn scalar(&mut self, scalar: Scalar) -> ValueId {
        self.push(Node::Scalar(scalar))
    }

    pub fn text(&mut self, text: impl Into<String>) -> ValueId {
        self.push(Node::Text(text.into()))
    }

    pub fn list(&mut self, items: Vec<ValueId>) -> ValueId {
        self.push(Node::List(items))
    }

    /// Build a record. A repeated name keeps its last value.
    pub fn record<S: AsRef<str>>(&mut self, fields: impl IntoIterator<Item = (S, ValueId)>) -> ValueId {
        let mut entries: Vec<(Symbol, ValueId)> = Vec::new();
        for (name, id) in fields {
            let symbol = self.symbols.intern(name.as_ref());
            match entries.iter_mut().find(|(existing, _)| *existing == symbol) {
                Some(entry) => entry.1 = id,
                None => entries.push((symbol, id)),
            }
        }
        self.push(Node::Record(entries))
    }

    pub fn thunk(&mut self, target: ValueId) -> ValueId {
        self.push(Node::Thunk {
            target,
            forced: false,
        })
    }

    pub fn alias(&mut self, target: ValueId) -> ValueId {
        self.push(Node::Alias(target))
    }

    /// Display string of an interned attribute name
    pub fn name(&self, symbol: Symbol) -> &str {
        self.symbols.resolve(symbol)
    }

    /// Follow aliases and forced thunks to the node that carries identity.
    pub fn resolve(&self, mut id: ValueId) -> ValueId {
        // Bounded so a malformed alias loop cannot hang the traversal.
        for _ in 0..=self.nodes.len() {
            match &self.nodes[id.index()] {
                Node::Alias(target) => id = *target,
                Node::Thunk {
                    target,
                    forced: true,
                } => id = *target,
                _ => return id,
            }
        }
        id
    }

    pub fn get(&self, id: ValueId) -> &Node {
        &self.nodes[self.resolve(id).index()]
    }

    pub fn kind(&self, id: ValueId) -> ValueKind {
        match self.get(id) {
            Node::Thunk { .. } | Node::Alias(_) => ValueKind::Unevaluated,
            Node::Scalar(_) => ValueKind::Scalar,
            Node::Text(_) => ValueKind::Text,
            Node::List(_) => ValueKind::List,
            Node::Record(_) => ValueKind::Record,
        }
    }

    /// Force a node to a concrete kind. Forcing is sticky for the lifetime
    /// of the tree.
    pub fn force(&mut self, id: ValueId) -> ValueId {
        for _ in 0..=self.nodes.len() {
            let current = self.resolve(id);
            match &mut self.nodes[current.index()] {
                Node::Thunk { forced, .. } if !*forced => {
                    *forced = true;
                }
                _ => return current,
            }
        }
        self.resolve(id)
    }

    pub fn as_text(&self, id: ValueId) -> Option<&str> {
        match self.get(id) {
            Node::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_scalar(&self, id: ValueId) -> Option<&Scalar> {
        match self.get(id) {
            Node::Scalar(scalar) => Some(scalar),
            _ => None,
        }
    }

    pub fn items(&self, id: ValueId) -> Option<&[ValueId]> {
        match self.get(id) {
            Node::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn fields(&self, id: ValueId) -> Option<&[(Symbol, ValueId)]> {
        match self.get(id) {
            Node::Record(fields) => Some(fields),
            _ => None,
        }
    }

    /// Record fields with their names resolved
    pub fn named_fields(&self, id: ValueId) -> Vec<(String, ValueId)> {
        self.fields(id)
            .map(|fields| {
                fields
                    .iter()
                    .map(|(symbol, value)| (self.name(*symbol).to_string(), *value))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn attr(&self, id: ValueId, name: &str) -> Option<ValueId> {
        let symbol = self.symbols.lookup(name)?;
        self.fields(id)?
            .iter()
            .find(|(candidate, _)| *candidate == symbol)
            .map(|(_, value)| *value)
    }

    /// Walk `path` from `start`, forcing every node on the way.
    pub fn select(&mut self, start: ValueId, path: &AttrPath) -> Result<ValueId, EvalError> {
        let mut current = self.force(start);
        let mut walked = AttrPath::root();

        for segment in path.segments() {
            walked = walked.child(segment.clone());
            let next = match segment {
                Segment::Name(name) => self.attr(current, name),
                // A numeric segment on a record names a field like "0"
                Segment::Index(index) => match self.items(current) {
                    Some(items) => items.get(*index).copied(),
                    None => self.attr(current, &index.to_string()),
                },
            };
            current = match next {
                Some(id) => self.force(id),
                None => return Err(EvalError::MissingAttribute(walked.to_string())),
            };
        }

        debug!(path = %path, "Selected diff root");
        Ok(current)
    }
}

/// Decides which records are opaque units compared only as a whole.
pub trait AtomicPredicate {
    fn is_atomic(&self, tree: &mut ValueTree, id: ValueId) -> bool;
}

/// Atomic when the record's marker attribute forces to a given text,
/// e.g. `type = "derivation"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttrMarker {
    attribute: String,
    value: String,
}

impl AttrMarker {
    pub fn new(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            value: value.into(),
        }
    }
}

impl From<&AtomicMarker> for AttrMarker {
    fn from(marker: &AtomicMarker) -> Self {
        Self::new(marker.attribute.clone(), marker.value.clone())
    }
}

impl Default for AttrMarker {
    fn default() -> Self {
        Self::from(&AtomicMarker::default())
    }
}

impl AtomicPredicate for AttrMarker {
    fn is_atomic(&self, tree: &mut ValueTree, id: ValueId) -> bool {
        if tree.kind(id) != ValueKind::Record {
            return false;
        }
        let Some(marker) = tree.attr(id, &self.attribute) else {
            return false;
        };
        let marker = tree.force(marker);
        tree.as_text(marker) == Some(self.value.as_str())
    }
}
