//! Literal rendering of values, used both for display and as the canonical
//! serialization behind equality checks.

use crate::path::{quote_attribute, quote_string};
use crate::value::{AtomicPredicate, Node, Scalar, ValueId, ValueTree};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrintMode {
    /// Render what is already evaluated; unforced nodes show as `«thunk»`
    Display,
    /// Force everything; atomic records collapse to their derivation path
    Canonical,
}

pub struct ValuePrinter<'a> {
    mode: PrintMode,
    atomic: &'a dyn AtomicPredicate,
}

impl<'a> ValuePrinter<'a> {
    pub fn new(mode: PrintMode, atomic: &'a dyn AtomicPredicate) -> Self {
        Self { mode, atomic }
    }

    /// Render a value as it would appear on the right of `path = ...;`.
    ///
    /// Multi-line text at the top level uses the indented-string form so
    /// that each line of the value lands on its own output line.
    pub fn render_top(&self, tree: &mut ValueTree, id: ValueId) -> String {
        let id = self.maybe_force(tree, id);
        if let Some(text) = tree.as_text(id) {
            if text.contains('\n') {
                return indented_string(text);
            }
        }
        self.render(tree, id)
    }

    pub fn render(&self, tree: &mut ValueTree, id: ValueId) -> String {
        let mut out = String::new();
        let mut seen = HashSet::new();
        self.write_value(tree, id, &mut seen, &mut out);
        out
    }

    fn maybe_force(&self, tree: &mut ValueTree, id: ValueId) -> ValueId {
        match self.mode {
            PrintMode::Canonical => tree.force(id),
            PrintMode::Display => tree.resolve(id),
        }
    }

    fn write_value(
        &self,
        tree: &mut ValueTree,
        id: ValueId,
        seen: &mut HashSet<ValueId>,
        out: &mut String,
    ) {
        let id = self.maybe_force(tree, id);

        match tree.get(id) {
            Node::Thunk { .. } | Node::Alias(_) => out.push_str("«thunk»"),
            Node::Scalar(scalar) => out.push_str(&render_scalar(scalar)),
            Node::Text(text) => out.push_str(&quote_string(text)),
            Node::List(items) => {
                if !seen.insert(id) {
                    out.push_str("«repeated»");
                    return;
                }
                let items = items.clone();
                out.push('[');
                for item in items {
                    out.push(' ');
                    self.write_value(tree, item, seen, out);
                }
                out.push_str(" ]");
            }
            Node::Record(_) => {
                if !seen.insert(id) {
                    out.push_str("«repeated»");
                    return;
                }
                if self.mode == PrintMode::Canonical && self.atomic.is_atomic(tree, id) {
                    if let Some(drv_path) = derivation_path(tree, id) {
                        out.push_str("«derivation ");
                        out.push_str(&drv_path);
                        out.push('»');
                        return;
                    }
                }

                let mut fields = tree.named_fields(id);
                fields.sort_by(|a, b| a.0.cmp(&b.0));
                out.push('{');
                for (name, value) in fields {
                    out.push(' ');
                    out.push_str(&quote_attribute(&name));
                    out.push_str(" = ");
                    self.write_value(tree, value, seen, out);
                    out.push(';');
                }
                out.push_str(" }");
            }
        }
    }
}

fn derivation_path(tree: &mut ValueTree, id: ValueId) -> Option<String> {
    let drv_path = tree.attr(id, "drvPath")?;
    let drv_path = tree.force(drv_path);
    tree.as_text(drv_path).map(str::to_string)
}

pub fn render_scalar(scalar: &Scalar) -> String {
    match scalar {
        Scalar::Null => "null".to_string(),
        Scalar::Bool(b) => b.to_string(),
        Scalar::Int(i) => i.to_string(),
        Scalar::Float(f) => f.to_string(),
    }
}

/// `''`-delimited form for multi-line text, one source line per output line.
pub fn indented_string(text: &str) -> String {
    let mut out = String::from("''\n  ");
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\'' if chars.peek() == Some(&'\'') => {
                chars.next();
                out.push_str("'''");
            }
            '$' if chars.peek() == Some(&'{') => out.push_str("''$"),
            '\n' => out.push_str("\n  "),
            other => out.push(other),
        }
    }
    out.push_str("''");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::AttrMarker;

    fn display(tree: &mut ValueTree, id: ValueId) -> String {
        let marker = AttrMarker::default();
        ValuePrinter::new(PrintMode::Display, &marker).render_top(tree, id)
    }

    fn canonical(tree: &mut ValueTree, id: ValueId) -> String {
        let marker = AttrMarker::default();
        ValuePrinter::new(PrintMode::Canonical, &marker).render_top(tree, id)
    }

    #[test]
    fn test_scalars() {
        assert_eq!(render_scalar(&Scalar::Null), "null");
        assert_eq!(render_scalar(&Scalar::Bool(false)), "false");
        assert_eq!(render_scalar(&Scalar::Int(-7)), "-7");
        assert_eq!(render_scalar(&Scalar::Float(2.5)), "2.5");
    }

    #[test]
    fn test_records_sorted_and_quoted() {
        let mut tree = ValueTree::new();
        let one = tree.scalar(Scalar::Int(1));
        let text = tree.text("x");
        let empty = tree.list(Vec::new());
        let record = tree.record([("zeta", one), ("1st", text), ("alpha", empty)]);

        assert_eq!(
            display(&mut tree, record),
            "{ \"1st\" = \"x\"; alpha = [ ]; zeta = 1; }"
        );
    }

    #[test]
    fn test_display_does_not_force() {
        let mut tree = ValueTree::new();
        let inner = tree.scalar(Scalar::Int(5));
        let thunk = tree.thunk(inner);
        let list = tree.list(vec![thunk]);

        assert_eq!(display(&mut tree, list), "[ «thunk» ]");
        assert_eq!(canonical(&mut tree, list), "[ 5 ]");
        // Forcing is sticky, so display now sees the value.
        assert_eq!(display(&mut tree, list), "[ 5 ]");
    }

    #[test]
    fn test_cycles_render_as_repeated() {
        let mut tree = ValueTree::new();
        let placeholder = tree.scalar(Scalar::Null);
        let record = tree.record([("self", placeholder)]);
        tree.replace(placeholder, Node::Alias(record));

        assert_eq!(display(&mut tree, record), "{ self = «repeated»; }");
    }

    #[test]
    fn test_canonical_collapses_derivations() {
        let mut tree = ValueTree::new();
        let kind = tree.text("derivation");
        let drv_path = tree.text("/store/abc-hello.drv");
        let name = tree.text("hello");
        let drv = tree.record([("type", kind), ("drvPath", drv_path), ("name", name)]);

        assert_eq!(canonical(&mut tree, drv), "«derivation /store/abc-hello.drv»");
        assert!(display(&mut tree, drv).starts_with("{ drvPath = "));
    }

    #[test]
    fn test_multiline_top_level_text() {
        let mut tree = ValueTree::new();
        let text = tree.text("a\nb''c\n");
        assert_eq!(display(&mut tree, text), "''\n  a\n  b'''c\n  ''");

        let nested = tree.list(vec![text]);
        assert_eq!(display(&mut tree, nested), "[ \"a\\nb''c\\n\" ]");
    }
}
