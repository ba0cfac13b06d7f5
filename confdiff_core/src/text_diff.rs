//! Line-level unified diff for multi-line text values.

use confdiff_common::{Hunk, HunkLine};
use similar::{capture_diff_slices, group_diff_ops, Algorithm, DiffOp, DiffTag};

/// Groups a Myers edit script into unified hunks
#[derive(Debug, Clone)]
pub struct TextDiffer {
    context_lines: usize,
}

impl Default for TextDiffer {
    fn default() -> Self {
        Self { context_lines: 3 }
    }
}

impl TextDiffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_context(mut self, lines: usize) -> Self {
        self.context_lines = lines;
        self
    }

    /// Diff two texts line by line. Identical line sequences yield no hunks.
    pub fn diff(&self, old: &str, new: &str) -> Vec<Hunk> {
        let old_lines = split_lines(old);
        let new_lines = split_lines(new);

        let ops = capture_diff_slices(Algorithm::Myers, &old_lines, &new_lines);
        group_diff_ops(ops, self.context_lines)
            .iter()
            .map(|group| build_hunk(group, &old_lines, &new_lines))
            .collect()
    }
}

/// Split on line breaks; a trailing break does not start an empty line.
pub fn split_lines(text: &str) -> Vec<&str> {
    text.lines().collect()
}

fn build_hunk(group: &[DiffOp], old_lines: &[&str], new_lines: &[&str]) -> Hunk {
    let mut lines = Vec::new();

    for op in group {
        let (tag, old_range, new_range) = op.as_tag_tuple();
        match tag {
            DiffTag::Equal => {
                lines.extend(old_range.map(|i| HunkLine::Context(old_lines[i].to_string())));
            }
            DiffTag::Delete => {
                lines.extend(old_range.map(|i| HunkLine::Deleted(old_lines[i].to_string())));
            }
            DiffTag::Insert => {
                lines.extend(new_range.map(|i| HunkLine::Added(new_lines[i].to_string())));
            }
            DiffTag::Replace => {
                lines.extend(old_range.map(|i| HunkLine::Deleted(old_lines[i].to_string())));
                lines.extend(new_range.map(|i| HunkLine::Added(new_lines[i].to_string())));
            }
        }
    }

    let (old_start, old_count) = span(group.iter().map(|op| op.old_range()));
    let (new_start, new_count) = span(group.iter().map(|op| op.new_range()));

    Hunk {
        old_start,
        old_count,
        new_start,
        new_count,
        lines,
    }
}

/// 1-based start and length of the union of consecutive ranges.
/// An empty span points at the line before it, as unified diffs do.
fn span(mut ranges: impl Iterator<Item = std::ops::Range<usize>>) -> (usize, usize) {
    let Some(first) = ranges.next() else {
        return (0, 0);
    };
    let end = ranges.last().map_or(first.end, |last| last.end);
    let count = end - first.start;
    let start = if count == 0 { first.start } else { first.start + 1 };
    (start, count)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(text: &str) -> HunkLine {
        HunkLine::Context(text.to_string())
    }

    fn deleted(text: &str) -> HunkLine {
        HunkLine::Deleted(text.to_string())
    }

    fn added(text: &str) -> HunkLine {
        HunkLine::Added(text.to_string())
    }

    #[test]
    fn test_single_line_replacement() {
        let hunks = TextDiffer::new().diff("a\nb\nc", "a\nx\nc");

        assert_eq!(hunks.len(), 1);
        let hunk = &hunks[0];
        assert_eq!(
            hunk.lines,
            vec![context("a"), deleted("b"), added("x"), context("c")]
        );
        assert_eq!((hunk.old_start, hunk.old_count), (1, 3));
        assert_eq!((hunk.new_start, hunk.new_count), (1, 3));
    }

    #[test]
    fn test_identical_lines_produce_nothing() {
        assert!(TextDiffer::new().diff("a\nb\n", "a\nb").is_empty());
    }

    #[test]
    fn test_distant_changes_split_into_hunks() {
        let old: Vec<String> = (1..=20).map(|i| format!("line{i}")).collect();
        let mut new = old.clone();
        new[1] = "changed2".to_string();
        new[17] = "changed18".to_string();

        let hunks = TextDiffer::new()
            .with_context(2)
            .diff(&old.join("\n"), &new.join("\n"));

        assert_eq!(hunks.len(), 2);
        assert_eq!((hunks[0].old_start, hunks[0].old_count), (1, 4));
        assert_eq!((hunks[1].old_start, hunks[1].old_count), (16, 5));
        assert_eq!(hunks[1].deletions(), 1);
        assert_eq!(hunks[1].additions(), 1);
    }

    #[test]
    fn test_context_window_limits_leading_lines() {
        let old = "1\n2\n3\n4\n5\n6\n7";
        let new = "1\n2\n3\n4\n5\n6\nseven";
        let hunks = TextDiffer::new().with_context(1).diff(old, new);

        assert_eq!(hunks.len(), 1);
        assert_eq!(hunks[0].lines, vec![context("6"), deleted("7"), added("seven")]);
        assert_eq!((hunks[0].old_start, hunks[0].old_count), (6, 2));
    }

    #[test]
    fn test_insertion_into_empty_side() {
        let hunks = TextDiffer::new().diff("", "first\nsecond\n");

        assert_eq!(hunks.len(), 1);
        assert_eq!((hunks[0].old_start, hunks[0].old_count), (0, 0));
        assert_eq!((hunks[0].new_start, hunks[0].new_count), (1, 2));
        assert_eq!(hunks[0].lines, vec![added("first"), added("second")]);
    }

    #[test]
    fn test_one_sided_multiline() {
        let hunks = TextDiffer::new().diff("single", "single\nextra");

        assert_eq!(hunks.len(), 1);
        assert_eq!(hunks[0].lines, vec![context("single"), added("extra")]);
    }

    #[test]
    fn test_split_lines() {
        assert_eq!(split_lines("a\nb\n"), vec!["a", "b"]);
        assert_eq!(split_lines("a\n\nb"), vec!["a", "", "b"]);
        assert!(split_lines("").is_empty());
    }
}
