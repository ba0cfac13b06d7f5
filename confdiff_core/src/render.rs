//! Line-oriented diff output.
//!
//! Every event is formatted into a buffer and written with a single
//! `write_all`, after flushing what came before and checking the cancel
//! flag. An interrupt therefore never leaves half an event on screen.

use crate::differ::DiffSink;
use confdiff_common::{Change, ColorMode, ConfdiffError, DiffEvent, DiffSummary, Hunk, HunkLine};
use std::cell::Cell;
use std::fmt::Write as _;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Escape sequences wrapped around each output line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub deletion: &'static str,
    pub addition: &'static str,
    pub marker: &'static str,
    pub reset: &'static str,
}

impl Palette {
    pub fn ansi() -> Self {
        Self {
            deletion: "\x1b[31m", // Red
            addition: "\x1b[32m", // Green
            marker: "\x1b[36m",   // Cyan
            reset: "\x1b[0m",
        }
    }

    pub fn plain() -> Self {
        Self {
            deletion: "",
            addition: "",
            marker: "",
            reset: "",
        }
    }

    pub fn for_mode(mode: ColorMode, is_terminal: bool) -> Self {
        if mode.enabled(is_terminal) {
            Self::ansi()
        } else {
            Self::plain()
        }
    }
}

pub struct OutputRenderer<W: Write> {
    out: W,
    palette: Palette,
    cancel: Option<Arc<AtomicBool>>,
    summary: DiffSummary,
    error: Option<io::Error>,
    closed: bool,
    // Set once the differ has been told to stop because of the flag
    halted_by_cancel: Cell<bool>,
}

impl<W: Write> OutputRenderer<W> {
    pub fn new(out: W, palette: Palette) -> Self {
        Self {
            out,
            palette,
            cancel: None,
            summary: DiffSummary::default(),
            error: None,
            closed: false,
            halted_by_cancel: Cell::new(false),
        }
    }

    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn cancel_requested(&self) -> bool {
        self.cancel
            .as_ref()
            .map_or(false, |flag| flag.load(Ordering::SeqCst))
    }

    /// Record a write failure. A closed pipe ends output quietly.
    fn latch(&mut self, err: io::Error) {
        if err.kind() == io::ErrorKind::BrokenPipe {
            debug!("Output closed by reader");
            self.closed = true;
        } else {
            self.error = Some(err);
        }
    }

    /// Flush and report the run's counters, or the first write error.
    /// A flag raised after the last event does not mark the run cancelled.
    pub fn finish(mut self) -> Result<DiffSummary, ConfdiffError> {
        if self.error.is_none() && !self.closed {
            if let Err(err) = self.out.flush() {
                self.latch(err);
            }
        }
        if let Some(err) = self.error {
            return Err(ConfdiffError::Render(err.to_string()));
        }
        self.summary.cancelled |= self.halted_by_cancel.get();
        Ok(self.summary)
    }
}

impl<W: Write> DiffSink for OutputRenderer<W> {
    fn emit(&mut self, event: DiffEvent) {
        if self.error.is_some() || self.closed || self.summary.cancelled {
            return;
        }
        if let Err(err) = self.out.flush() {
            self.latch(err);
            return;
        }
        if self.cancel_requested() {
            info!("Interrupted, stopping output");
            self.summary.cancelled = true;
            return;
        }

        let buf = match &event {
            DiffEvent::Change(change) => format_change(change, &self.palette),
            DiffEvent::Text { path, hunks } => format_text(path, hunks, &self.palette),
        };
        if let Err(err) = self.out.write_all(buf.as_bytes()) {
            self.latch(err);
            return;
        }

        match event {
            DiffEvent::Change(_) => self.summary.changes += 1,
            DiffEvent::Text { hunks, .. } => self.summary.hunks += hunks.len(),
        }
    }

    fn is_halted(&self) -> bool {
        if self.error.is_some() || self.closed || self.summary.cancelled {
            return true;
        }
        if self.cancel_requested() {
            self.halted_by_cancel.set(true);
            return true;
        }
        false
    }
}

/// `-deletion` then `+addition`; every line of a multi-line fragment
/// carries the marker.
pub fn format_change(change: &Change, palette: &Palette) -> String {
    let mut out = String::new();
    if let Some(deletion) = &change.deletion {
        push_marked(&mut out, '-', deletion, palette.deletion, palette.reset);
    }
    if let Some(addition) = &change.addition {
        push_marked(&mut out, '+', addition, palette.addition, palette.reset);
    }
    out
}

fn push_marked(out: &mut String, marker: char, text: &str, color: &str, reset: &str) {
    for line in text.split('\n') {
        let _ = writeln!(out, "{}{}{}{}", color, marker, line, reset);
    }
}

pub fn format_text(path: &str, hunks: &[Hunk], palette: &Palette) -> String {
    let mut out = String::new();
    if !path.is_empty() {
        let _ = writeln!(out, " {} =", path);
    }
    for hunk in hunks {
        let _ = writeln!(
            out,
            "{}  @@ -{},{} +{},{} @@{}",
            palette.marker,
            hunk.old_start,
            hunk.old_count,
            hunk.new_start,
            hunk.new_count,
            palette.reset
        );
        for line in &hunk.lines {
            let _ = match line {
                HunkLine::Context(text) => writeln!(out, "    {}", text),
                HunkLine::Deleted(text) => {
                    writeln!(out, "{}   -{}{}", palette.deletion, text, palette.reset)
                }
                HunkLine::Added(text) => {
                    writeln!(out, "{}   +{}{}", palette.addition, text, palette.reset)
                }
            };
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_event() -> DiffEvent {
        DiffEvent::Text {
            path: "script".to_string(),
            hunks: vec![Hunk {
                old_start: 1,
                old_count: 3,
                new_start: 1,
                new_count: 3,
                lines: vec![
                    HunkLine::Context("a".to_string()),
                    HunkLine::Deleted("b".to_string()),
                    HunkLine::Added("x".to_string()),
                    HunkLine::Context("c".to_string()),
                ],
            }],
        }
    }

    fn render(events: Vec<DiffEvent>, palette: Palette) -> (String, DiffSummary) {
        let mut buf = Vec::new();
        let mut renderer = OutputRenderer::new(&mut buf, palette);
        for event in events {
            renderer.emit(event);
        }
        let summary = renderer.finish().unwrap();
        (String::from_utf8(buf).unwrap(), summary)
    }

    #[test]
    fn test_plain_change() {
        let (out, summary) = render(
            vec![DiffEvent::Change(Change::replacement("a", "a = 1;", "a = 2;"))],
            Palette::plain(),
        );
        assert_eq!(out, "-a = 1;\n+a = 2;\n");
        assert_eq!(summary.changes, 1);
        assert!(!summary.cancelled);
    }

    #[test]
    fn test_colored_change() {
        let (out, _) = render(
            vec![DiffEvent::Change(Change::deletion("c.2", "c.2 = 3;"))],
            Palette::ansi(),
        );
        assert_eq!(out, "\x1b[31m-c.2 = 3;\x1b[0m\n");
    }

    #[test]
    fn test_multiline_fragment_marks_every_line() {
        let (out, _) = render(
            vec![DiffEvent::Change(Change::addition("t", "t = ''\n  a\n  '';"))],
            Palette::plain(),
        );
        assert_eq!(out, "+t = ''\n+  a\n+  '';\n");
    }

    #[test]
    fn test_text_hunks() {
        let (out, summary) = render(vec![text_event()], Palette::plain());
        assert_eq!(
            out,
            " script =\n  @@ -1,3 +1,3 @@\n    a\n   -b\n   +x\n    c\n"
        );
        assert_eq!(summary.hunks, 1);
        assert_eq!(summary.changes, 0);
    }

    #[test]
    fn test_root_text_has_no_header() {
        let hunks = match text_event() {
            DiffEvent::Text { hunks, .. } => hunks,
            DiffEvent::Change(_) => unreachable!(),
        };
        let (out, _) = render(
            vec![DiffEvent::Text {
                path: String::new(),
                hunks,
            }],
            Palette::plain(),
        );
        assert!(out.starts_with("  @@ -1,3 +1,3 @@\n"), "got: {out:?}");
    }

    #[test]
    fn test_colored_hunk_marker() {
        let (out, _) = render(vec![text_event()], Palette::ansi());
        assert!(out.contains("\x1b[36m  @@ -1,3 +1,3 @@\x1b[0m\n"));
        assert!(out.contains("\x1b[31m   -b\x1b[0m\n"));
        assert!(out.contains("\x1b[32m   +x\x1b[0m\n"));
    }

    #[test]
    fn test_palette_for_mode() {
        assert_eq!(Palette::for_mode(ColorMode::Never, true), Palette::plain());
        assert_eq!(Palette::for_mode(ColorMode::Always, false), Palette::ansi());
        assert_eq!(Palette::for_mode(ColorMode::Auto, false), Palette::plain());
    }

    #[test]
    fn test_cancel_before_first_event_writes_nothing() {
        let cancel = Arc::new(AtomicBool::new(true));
        let mut buf = Vec::new();
        let mut renderer = OutputRenderer::new(&mut buf, Palette::plain()).with_cancel(cancel);

        assert!(renderer.is_halted());
        renderer.emit(DiffEvent::Change(Change::deletion("a", "a = 1;")));
        let summary = renderer.finish().unwrap();

        assert!(buf.is_empty());
        assert!(summary.cancelled);
        assert_eq!(summary.changes, 0);
    }

    #[test]
    fn test_cancel_mid_run_keeps_earlier_output() {
        let cancel = Arc::new(AtomicBool::new(false));
        let mut buf = Vec::new();
        let mut renderer =
            OutputRenderer::new(&mut buf, Palette::plain()).with_cancel(Arc::clone(&cancel));

        renderer.emit(DiffEvent::Change(Change::deletion("a", "a = 1;")));
        cancel.store(true, Ordering::SeqCst);
        renderer.emit(DiffEvent::Change(Change::deletion("b", "b = 2;")));
        let summary = renderer.finish().unwrap();

        assert_eq!(String::from_utf8(buf).unwrap(), "-a = 1;\n");
        assert_eq!(summary.changes, 1);
        assert!(summary.cancelled);
    }

    #[test]
    fn test_flag_raised_after_last_event_is_not_cancelled() {
        let cancel = Arc::new(AtomicBool::new(false));
        let mut buf = Vec::new();
        let mut renderer =
            OutputRenderer::new(&mut buf, Palette::plain()).with_cancel(Arc::clone(&cancel));

        renderer.emit(DiffEvent::Change(Change::deletion("a", "a = 1;")));
        cancel.store(true, Ordering::SeqCst);
        let summary = renderer.finish().unwrap();

        assert_eq!(String::from_utf8(buf).unwrap(), "-a = 1;\n");
        assert_eq!(summary.changes, 1);
        assert!(!summary.cancelled);
    }

    struct FailingWriter(io::ErrorKind);

    impl Write for FailingWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(self.0, "write failed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_broken_pipe_halts_quietly() {
        let mut renderer = OutputRenderer::new(FailingWriter(io::ErrorKind::BrokenPipe), Palette::plain());
        renderer.emit(DiffEvent::Change(Change::deletion("a", "a = 1;")));
        assert!(renderer.is_halted());

        let summary = renderer.finish().unwrap();
        assert_eq!(summary.changes, 0);
    }

    #[test]
    fn test_write_error_is_reported() {
        let mut renderer = OutputRenderer::new(FailingWriter(io::ErrorKind::Other), Palette::plain());
        renderer.emit(DiffEvent::Change(Change::deletion("a", "a = 1;")));
        assert!(renderer.is_halted());
        assert!(matches!(renderer.finish(), Err(ConfdiffError::Render(_))));
    }
}
