use serde::{Deserialize, Serialize};

/// A deletion and/or addition at one location of the value tree.
///
/// Both fragments present is a replacement, one present is a pure
/// deletion or addition, and neither is a no-op.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    /// Rendered location path (e.g. `services.nginx.enable`)
    pub path: String,
    /// Text shown on the `-` side
    pub deletion: Option<String>,
    /// Text shown on the `+` side
    pub addition: Option<String>,
}

impl Change {
    pub fn replacement(
        path: impl Into<String>,
        deletion: impl Into<String>,
        addition: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            deletion: Some(deletion.into()),
            addition: Some(addition.into()),
        }
    }

    pub fn deletion(path: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            deletion: Some(text.into()),
            addition: None,
        }
    }

    pub fn addition(path: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            deletion: None,
            addition: Some(text.into()),
        }
    }

    pub fn is_noop(&self) -> bool {
        self.deletion.is_none() && self.addition.is_none()
    }

    /// Swap the two sides, turning deletions into additions and back.
    pub fn inverted(&self) -> Self {
        Self {
            path: self.path.clone(),
            deletion: self.addition.clone(),
            addition: self.deletion.clone(),
        }
    }
}

/// A single line operation inside a hunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HunkLine {
    Context(String),
    Deleted(String),
    Added(String),
}

/// A unified-diff block of a multi-line text comparison
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
    /// First line of the hunk on the left side (1-based)
    pub old_start: usize,
    /// Number of left-side lines covered
    pub old_count: usize,
    /// First line of the hunk on the right side (1-based)
    pub new_start: usize,
    /// Number of right-side lines covered
    pub new_count: usize,
    /// Context, deleted and added lines in their original relative order
    pub lines: Vec<HunkLine>,
}

impl Hunk {
    pub fn additions(&self) -> usize {
        self.lines
            .iter()
            .filter(|l| matches!(l, HunkLine::Added(_)))
            .count()
    }

    pub fn deletions(&self) -> usize {
        self.lines
            .iter()
            .filter(|l| matches!(l, HunkLine::Deleted(_)))
            .count()
    }
}

/// Everything the differencer can report
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffEvent {
    Change(Change),
    /// Line-level diff of a multi-line text leaf
    Text { path: String, hunks: Vec<Hunk> },
}

impl DiffEvent {
    pub fn path(&self) -> &str {
        match self {
            DiffEvent::Change(change) => &change.path,
            DiffEvent::Text { path, .. } => path,
        }
    }
}

/// Counters reported once a run finishes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiffSummary {
    pub changes: usize,
    pub hunks: usize,
    /// The run was interrupted before the traversal completed
    pub cancelled: bool,
}

impl DiffSummary {
    pub fn is_empty(&self) -> bool {
        self.changes == 0 && self.hunks == 0
    }
}

/// When to emit ANSI colors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    /// Color only when stdout is a terminal
    #[default]
    Auto,
    Always,
    Never,
}

impl ColorMode {
    pub fn enabled(self, is_terminal: bool) -> bool {
        match self {
            ColorMode::Auto => is_terminal,
            ColorMode::Always => true,
            ColorMode::Never => false,
        }
    }
}

/// Marks records that are compared as opaque units.
///
/// A record is atomic when its `attribute` field evaluates to the text
/// `value`, e.g. `type = "derivation"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtomicMarker {
    pub attribute: String,
    pub value: String,
}

impl Default for AtomicMarker {
    fn default() -> Self {
        Self {
            attribute: "type".to_string(),
            value: "derivation".to_string(),
        }
    }
}

fn default_context_lines() -> usize {
    3
}

fn default_discriminators() -> Vec<String> {
    vec!["type".to_string()]
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Unchanged lines shown around each text hunk
    #[serde(default = "default_context_lines")]
    pub context_lines: usize,

    /// Color policy for diff output
    #[serde(default)]
    pub color: ColorMode,

    /// Attribute names whose values are forced before comparison
    #[serde(default = "default_discriminators")]
    pub discriminators: Vec<String>,

    /// Which records are compared without field-level recursion
    #[serde(default)]
    pub atomic_marker: AtomicMarker,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            context_lines: default_context_lines(),
            color: ColorMode::default(),
            discriminators: default_discriminators(),
            atomic_marker: AtomicMarker::default(),
        }
    }
}
