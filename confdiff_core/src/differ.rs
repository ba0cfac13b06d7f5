//! Recursive comparison of two value trees.
//!
//! The traversal walks both trees in lock-step and reports every difference
//! to a [`DiffSink`] in path order: root to leaf, record names ascending,
//! list positions ascending. Given the same inputs the event sequence is
//! always the same.

use crate::path::AttrPath;
use crate::printer::{PrintMode, ValuePrinter};
use crate::text_diff::TextDiffer;
use crate::value::{AtomicPredicate, AttrMarker, ValueId, ValueKind, ValueTree};
use confdiff_common::{AppConfig, Change, DiffEvent};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

/// Receives the differencer's events
pub trait DiffSink {
    fn emit(&mut self, event: DiffEvent);

    /// A halted sink takes no more events and the traversal stops early.
    fn is_halted(&self) -> bool {
        false
    }
}

impl DiffSink for Vec<DiffEvent> {
    fn emit(&mut self, event: DiffEvent) {
        self.push(event);
    }
}

#[derive(Debug, Clone)]
pub struct DifferOptions {
    /// Context lines around each text hunk
    pub context_lines: usize,
    /// Attribute names whose values are forced before comparison
    pub discriminators: Vec<String>,
    /// Predicate selecting records compared as opaque units
    pub atomic: AttrMarker,
}

impl Default for DifferOptions {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for DifferOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            context_lines: config.context_lines,
            discriminators: config.discriminators.clone(),
            atomic: AttrMarker::from(&config.atomic_marker),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Left,
    Right,
}

/// One diff run over a pair of trees.
///
/// The seen sets live and die with the run, so every invocation starts from
/// a clean slate.
pub struct Differencer<'a, S: DiffSink> {
    left: &'a mut ValueTree,
    right: &'a mut ValueTree,
    sink: &'a mut S,
    text: TextDiffer,
    discriminators: Vec<String>,
    atomic: AttrMarker,
    seen_left: HashSet<ValueId>,
    seen_right: HashSet<ValueId>,
}

impl<'a, S: DiffSink> Differencer<'a, S> {
    pub fn new(
        left: &'a mut ValueTree,
        right: &'a mut ValueTree,
        sink: &'a mut S,
        options: DifferOptions,
    ) -> Self {
        Self {
            left,
            right,
            sink,
            text: TextDiffer::new().with_context(options.context_lines),
            discriminators: options.discriminators,
            atomic: options.atomic,
            seen_left: HashSet::new(),
            seen_right: HashSet::new(),
        }
    }

    /// Compare `left` against `right`, labelling output relative to `path`.
    pub fn run(mut self, path: &AttrPath, left: ValueId, right: ValueId) {
        self.diff_values(path, left, right);
        debug!(
            left_visited = self.seen_left.len(),
            right_visited = self.seen_right.len(),
            "Diff traversal finished"
        );
    }

    fn tree(&mut self, side: Side) -> &mut ValueTree {
        match side {
            Side::Left => &mut *self.left,
            Side::Right => &mut *self.right,
        }
    }

    fn diff_values(&mut self, path: &AttrPath, left: ValueId, right: ValueId) {
        if self.sink.is_halted() {
            return;
        }

        let left_seen = !self.seen_left.insert(self.left.resolve(left));
        let right_seen = !self.seen_right.insert(self.right.resolve(right));
        if left_seen && right_seen {
            debug!(path = %path, "Skipping pair already visited on both sides");
            return;
        }
        if left_seen || right_seen {
            // Known gap: a node shared on one side only is not reported.
            debug!(path = %path, left_seen, right_seen, "Skipping pair visited on one side");
            return;
        }

        if self.is_discriminator(path) {
            debug!(path = %path, "Forcing discriminator");
            self.left.force(left);
            self.right.force(right);
        }

        let left_kind = self.left.kind(left);
        let right_kind = self.right.kind(right);

        match (left_kind, right_kind) {
            (ValueKind::Unevaluated, ValueKind::Unevaluated) => {}
            (ValueKind::Unevaluated, ValueKind::Record) if !self.is_atomic(Side::Right, right) => {
                let fields = self.right.named_fields(right);
                self.diff_fields(path, Vec::new(), fields);
            }
            (ValueKind::Record, ValueKind::Unevaluated) if !self.is_atomic(Side::Left, left) => {
                let fields = self.left.named_fields(left);
                self.diff_fields(path, fields, Vec::new());
            }
            (ValueKind::Unevaluated, _) => {
                let text = self.literal(Side::Right, path, right);
                self.emit_change(Change::addition(path.to_string(), text));
            }
            (_, ValueKind::Unevaluated) => {
                let text = self.literal(Side::Left, path, left);
                self.emit_change(Change::deletion(path.to_string(), text));
            }
            (ValueKind::Record, ValueKind::Record) => {
                let left_atomic = self.is_atomic(Side::Left, left);
                let right_atomic = self.is_atomic(Side::Right, right);
                match (left_atomic, right_atomic) {
                    (true, true) => self.diff_atomic(path, left, right),
                    (false, false) => {
                        let left_fields = self.left.named_fields(left);
                        let right_fields = self.right.named_fields(right);
                        self.diff_fields(path, left_fields, right_fields);
                    }
                    _ => self.replace(path, left, right),
                }
            }
            (ValueKind::List, ValueKind::List) => self.diff_lists(path, left, right),
            (ValueKind::Text, ValueKind::Text) => self.diff_texts(path, left, right),
            (ValueKind::Scalar, ValueKind::Scalar) => {
                if self.canonical(Side::Left, left) != self.canonical(Side::Right, right) {
                    self.replace(path, left, right);
                }
            }
            _ => self.replace(path, left, right),
        }
    }

    /// Merge-key comparison over the sorted union of both sides' names.
    fn diff_fields(
        &mut self,
        path: &AttrPath,
        left: Vec<(String, ValueId)>,
        right: Vec<(String, ValueId)>,
    ) {
        let mut names: BTreeMap<String, (Option<ValueId>, Option<ValueId>)> = BTreeMap::new();
        for (name, id) in left {
            names.entry(name).or_default().0 = Some(id);
        }
        for (name, id) in right {
            names.entry(name).or_default().1 = Some(id);
        }

        for (name, pair) in names {
            if self.sink.is_halted() {
                return;
            }
            let child = path.name(name);
            match pair {
                (Some(l), Some(r)) => self.diff_values(&child, l, r),
                (Some(l), None) => {
                    let text = self.literal(Side::Left, &child, l);
                    self.emit_change(Change::deletion(child.to_string(), text));
                }
                (None, Some(r)) => {
                    let text = self.literal(Side::Right, &child, r);
                    self.emit_change(Change::addition(child.to_string(), text));
                }
                (None, None) => {}
            }
        }
    }

    /// Positional comparison; no alignment is attempted.
    fn diff_lists(&mut self, path: &AttrPath, left: ValueId, right: ValueId) {
        let left_items = self.left.items(left).map(<[ValueId]>::to_vec).unwrap_or_default();
        let right_items = self.right.items(right).map(<[ValueId]>::to_vec).unwrap_or_default();
        let shared = left_items.len().min(right_items.len());

        for i in 0..shared {
            if self.sink.is_halted() {
                return;
            }
            self.diff_values(&path.index(i), left_items[i], right_items[i]);
        }

        for (i, item) in left_items.iter().enumerate().skip(shared) {
            let child = path.index(i);
            let text = self.literal(Side::Left, &child, *item);
            self.emit_change(Change::deletion(child.to_string(), text));
        }
        for (i, item) in right_items.iter().enumerate().skip(shared) {
            let child = path.index(i);
            let text = self.literal(Side::Right, &child, *item);
            self.emit_change(Change::addition(child.to_string(), text));
        }
    }

    fn diff_texts(&mut self, path: &AttrPath, left: ValueId, right: ValueId) {
        let left_text = self.left.as_text(left).unwrap_or_default().to_string();
        let right_text = self.right.as_text(right).unwrap_or_default().to_string();
        if left_text == right_text {
            return;
        }
        if !left_text.contains('\n') && !right_text.contains('\n') {
            self.replace(path, left, right);
            return;
        }

        let hunks = self.text.diff(&left_text, &right_text);
        if hunks.is_empty() {
            // Same lines, different line endings or trailing break.
            self.replace(path, left, right);
            return;
        }
        if self.sink.is_halted() {
            return;
        }
        self.sink.emit(DiffEvent::Text {
            path: path.to_string(),
            hunks,
        });
    }

    /// Atomic records are equal exactly when their canonical forms are.
    fn diff_atomic(&mut self, path: &AttrPath, left: ValueId, right: ValueId) {
        let left_canonical = self.canonical(Side::Left, left);
        let right_canonical = self.canonical(Side::Right, right);
        if left_canonical != right_canonical {
            self.emit_change(Change::replacement(
                path.to_string(),
                assignment(path, &left_canonical),
                assignment(path, &right_canonical),
            ));
        }
    }

    fn replace(&mut self, path: &AttrPath, left: ValueId, right: ValueId) {
        let deletion = self.literal(Side::Left, path, left);
        let addition = self.literal(Side::Right, path, right);
        self.emit_change(Change::replacement(path.to_string(), deletion, addition));
    }

    fn emit_change(&mut self, change: Change) {
        if change.is_noop() || self.sink.is_halted() {
            return;
        }
        self.sink.emit(DiffEvent::Change(change));
    }

    fn is_discriminator(&self, path: &AttrPath) -> bool {
        path.last_name()
            .map_or(false, |name| self.discriminators.iter().any(|d| d == name))
    }

    fn is_atomic(&mut self, side: Side, id: ValueId) -> bool {
        let tree = match side {
            Side::Left => &mut *self.left,
            Side::Right => &mut *self.right,
        };
        self.atomic.is_atomic(tree, id)
    }

    fn print(&mut self, side: Side, mode: PrintMode, id: ValueId) -> String {
        let tree = match side {
            Side::Left => &mut *self.left,
            Side::Right => &mut *self.right,
        };
        ValuePrinter::new(mode, &self.atomic).render_top(tree, id)
    }

    fn canonical(&mut self, side: Side, id: ValueId) -> String {
        self.print(side, PrintMode::Canonical, id)
    }

    /// `path = value;` with the value shown as evaluated so far; atomic
    /// records use their canonical form.
    fn literal(&mut self, side: Side, path: &AttrPath, id: ValueId) -> String {
        let rendered = if self.tree(side).kind(id) == ValueKind::Record && self.is_atomic(side, id) {
            self.canonical(side, id)
        } else {
            self.print(side, PrintMode::Display, id)
        };
        assignment(path, &rendered)
    }
}

fn assignment(path: &AttrPath, rendered: &str) -> String {
    if path.is_empty() {
        rendered.to_string()
    } else {
        format!("{} = {};", path, rendered)
    }
}
