//! # Page and Cursor State
//!
//! The drawing surface is an append-only command log. Pages are ranges of
//! that log, so a snapshot is just the cursor state plus two lengths, and
//! restoring one truncates everything drawn since. This is the only way the
//! cursor ever moves backward.

use crate::draw::{DrawCommand, RenderedDocument, RenderedPage};
use crate::style::FontSpec;

/// Position of the pen.
#[derive(Debug, Clone, PartialEq)]
pub struct PageState {
    /// 1-based index of the current page; 0 before the first page.
    pub page: usize,
    pub x: f64,
    pub y: f64,
    pub font: FontSpec,
    /// Where content starts on the current page, below the furniture.
    pub content_top: f64,
}

impl Default for PageState {
    fn default() -> Self {
        Self {
            page: 0,
            x: 0.0,
            y: 0.0,
            font: FontSpec::default(),
            content_top: 0.0,
        }
    }
}

/// A restorable point in the render.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    state: PageState,
    log_len: usize,
    page_count: usize,
}

impl Snapshot {
    pub fn state(&self) -> &PageState {
        &self.state
    }

    pub fn log_len(&self) -> usize {
        self.log_len
    }
}

/// Command log plus the cursor drawing into it.
#[derive(Debug, Clone, Default)]
pub struct Canvas {
    state: PageState,
    commands: Vec<DrawCommand>,
    /// Index into `commands` where each page begins.
    page_starts: Vec<usize>,
}

impl Canvas {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &PageState {
        &self.state
    }

    pub fn page(&self) -> usize {
        self.state.page
    }

    pub fn page_count(&self) -> usize {
        self.page_starts.len()
    }

    pub fn y(&self) -> f64 {
        self.state.y
    }

    pub fn set_y(&mut self, y: f64) {
        self.state.y = y;
    }

    pub fn set_x(&mut self, x: f64) {
        self.state.x = x;
    }

    pub fn advance(&mut self, dy: f64) {
        self.state.y += dy;
    }

    /// Open a new page with the cursor at (`x`, `y`).
    pub fn begin_page(&mut self, x: f64, y: f64) {
        self.page_starts.push(self.commands.len());
        self.state.page += 1;
        self.state.x = x;
        self.state.y = y;
        self.state.content_top = y;
    }

    /// Mark the current cursor row as the top of the page's content area.
    pub fn mark_content_top(&mut self) {
        self.state.content_top = self.state.y;
    }

    /// True when nothing but furniture has been drawn on the current page.
    pub fn at_page_top(&self) -> bool {
        self.state.page > 0 && (self.state.y - self.state.content_top).abs() < 1e-6
    }

    pub fn push(&mut self, command: DrawCommand) {
        if let DrawCommand::Text { font, .. } = &command {
            if *font != self.state.font {
                self.state.font = font.clone();
            }
        }
        self.commands.push(command);
    }

    pub fn extend(&mut self, commands: impl IntoIterator<Item = DrawCommand>) {
        for c in commands {
            self.push(c);
        }
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            state: self.state.clone(),
            log_len: self.commands.len(),
            page_count: self.page_starts.len(),
        }
    }

    /// Erase everything drawn since `snapshot` and put the cursor back.
    pub fn restore(&mut self, snapshot: &Snapshot) {
        self.commands.truncate(snapshot.log_len);
        self.page_starts.truncate(snapshot.page_count);
        self.state = snapshot.state.clone();
    }

    /// Split the log into pages.
    pub fn into_document(self, width: f64, height: f64) -> RenderedDocument {
        let mut pages = Vec::with_capacity(self.page_starts.len());
        let mut commands = self.commands;
        for (i, start) in self.page_starts.iter().enumerate().rev() {
            let page_commands = commands.split_off(*start);
            pages.push(RenderedPage {
                number: i + 1,
                width,
                height,
                commands: page_commands,
            });
        }
        pages.reverse();
        RenderedDocument { pages }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restore_truncates_log_and_pages() {
        let mut canvas = Canvas::new();
        canvas.begin_page(10.0, 10.0);
        canvas.push(DrawCommand::line(0.0, 0.0, 1.0, 1.0));
        let snap = canvas.snapshot();

        canvas.advance(50.0);
        canvas.push(DrawCommand::rect(0.0, 0.0, 1.0, 1.0));
        canvas.begin_page(10.0, 10.0);
        canvas.push(DrawCommand::line(0.0, 0.0, 2.0, 2.0));
        assert_eq!(canvas.page_count(), 2);

        canvas.restore(&snap);
        assert_eq!(canvas.page_count(), 1);
        assert_eq!(canvas.page(), 1);
        assert_eq!(canvas.commands().len(), 1);
        assert_eq!(canvas.y(), 10.0);
    }

    #[test]
    fn at_page_top_tracks_content_start() {
        let mut canvas = Canvas::new();
        assert!(!canvas.at_page_top());
        canvas.begin_page(10.0, 10.0);
        canvas.advance(8.0);
        canvas.mark_content_top();
        assert!(canvas.at_page_top());
        canvas.advance(4.0);
        assert!(!canvas.at_page_top());
    }

    #[test]
    fn into_document_splits_by_page() {
        let mut canvas = Canvas::new();
        canvas.begin_page(0.0, 0.0);
        canvas.push(DrawCommand::line(0.0, 0.0, 1.0, 0.0));
        canvas.push(DrawCommand::line(0.0, 1.0, 1.0, 1.0));
        canvas.begin_page(0.0, 0.0);
        canvas.begin_page(0.0, 0.0);
        canvas.push(DrawCommand::line(0.0, 2.0, 1.0, 2.0));

        let doc = canvas.into_document(210.0, 297.0);
        assert_eq!(doc.page_count(), 3);
        assert_eq!(doc.pages[0].commands.len(), 2);
        assert!(doc.pages[1].commands.is_empty());
        assert_eq!(doc.pages[2].number, 3);
        assert_eq!(doc.pages[2].commands.len(), 1);
    }
}
