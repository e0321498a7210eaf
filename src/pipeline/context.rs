//! Context windows: the text around an image that grounds its description.
//!
//! Windows are measured in lines of the extracted Markdown. Two ways to get
//! one exist and must agree:
//!
//! * [`build_context`] — pure slice arithmetic over the whole stream.
//! * [`RollingContext`] — the bounded queue the orchestrator threads through
//!   its single pass, so the before-window never requires re-scanning the
//!   stream.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Text before and after an image, each at most `context_size` lines.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextWindow {
    pub before: String,
    pub after: String,
}

/// Slice `window_size` lines on either side of `placeholder_index`.
///
/// Windows shrink at the document boundaries. An index past the end yields
/// empty windows.
pub fn build_context<S: AsRef<str>>(
    lines: &[S],
    placeholder_index: usize,
    window_size: usize,
) -> ContextWindow {
    if placeholder_index >= lines.len() {
        return ContextWindow::default();
    }
    let start = placeholder_index.saturating_sub(window_size);
    ContextWindow {
        before: join(&lines[start..placeholder_index]),
        after: after_window(lines, placeholder_index, window_size),
    }
}

/// The `window_size` lines following `placeholder_index`.
pub fn after_window<S: AsRef<str>>(lines: &[S], placeholder_index: usize, window_size: usize) -> String {
    let start = (placeholder_index + 1).min(lines.len());
    let end = start.saturating_add(window_size).min(lines.len());
    join(&lines[start..end])
}

fn join<S: AsRef<str>>(lines: &[S]) -> String {
    let mut out = String::new();
    for (i, line) in lines.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        out.push_str(line.as_ref());
    }
    out
}

/// Bounded queue of the most recent lines seen during a scan.
///
/// Holds at most `2 × context_size` lines; the before-window is the newest
/// `context_size` of them.
#[derive(Debug, Clone)]
pub struct RollingContext {
    buffer: VecDeque<String>,
    context_size: usize,
    capacity: usize,
}

impl RollingContext {
    pub fn new(context_size: usize) -> Self {
        let capacity = context_size.saturating_mul(2).max(1);
        Self {
            buffer: VecDeque::with_capacity(capacity),
            context_size,
            capacity,
        }
    }

    /// Record a line after it has been processed.
    pub fn push(&mut self, line: &str) {
        if self.buffer.len() == self.capacity {
            self.buffer.pop_front();
        }
        self.buffer.push_back(line.to_string());
    }

    /// The newest `context_size` lines, joined with `'\n'`.
    pub fn before(&self) -> String {
        let skip = self.buffer.len().saturating_sub(self.context_size);
        let recent: Vec<&str> = self.buffer.iter().skip(skip).map(String::as_str).collect();
        join(&recent)
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Window for the placeholder at `index`, peeking forward in `lines`.
    pub fn window<S: AsRef<str>>(&self, lines: &[S], index: usize) -> ContextWindow {
        ContextWindow {
            before: self.before(),
            after: after_window(lines, index, self.context_size),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream() -> Vec<&'static str> {
        vec!["# Title", "Intro text", "![](img1.png)", "More text", "![](img2.png)", "End"]
    }

    #[test]
    fn window_of_one_line() {
        let w = build_context(&stream(), 2, 1);
        assert_eq!(w.before, "Intro text");
        assert_eq!(w.after, "More text");
    }

    #[test]
    fn window_is_clamped_at_start() {
        let w = build_context(&stream(), 0, 3);
        assert_eq!(w.before, "");
        assert_eq!(w.after, "Intro text\n![](img1.png)\nMore text");
    }

    #[test]
    fn window_is_clamped_at_end() {
        let s = stream();
        let w = build_context(&s, s.len() - 1, 3);
        assert_eq!(w.before, "![](img1.png)\nMore text\n![](img2.png)");
        assert_eq!(w.after, "");
    }

    #[test]
    fn window_larger_than_document() {
        let w = build_context(&stream(), 2, 500);
        assert_eq!(w.before, "# Title\nIntro text");
        assert_eq!(w.after, "More text\n![](img2.png)\nEnd");
    }

    #[test]
    fn out_of_range_index_is_empty() {
        assert_eq!(build_context(&stream(), 99, 2), ContextWindow::default());
    }

    #[test]
    fn build_context_is_pure() {
        let s = stream();
        let a = build_context(&s, 4, 2);
        let b = build_context(&s, 4, 2);
        assert_eq!(a, b);
    }

    #[test]
    fn rolling_buffer_is_bounded() {
        let mut r = RollingContext::new(2);
        for i in 0..10 {
            r.push(&format!("line {i}"));
        }
        assert_eq!(r.len(), 4);
        assert_eq!(r.before(), "line 8\nline 9");
    }

    #[test]
    fn rolling_window_matches_build_context() {
        let s = stream();
        for size in 1..=4 {
            let mut r = RollingContext::new(size);
            for (i, line) in s.iter().enumerate() {
                assert_eq!(r.window(&s, i), build_context(&s, i, size), "size={size} index={i}");
                r.push(line);
            }
        }
    }
}
