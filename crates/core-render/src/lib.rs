//! Frame assembly and row-diff repaint for the chat screen.
//!
//! `frame::compose` turns the transcript, the input surface and the status
//! context into a `Frame` of width-fitted rows. `RenderEngine` keeps the last
//! frame it emitted and repaints only the rows whose text changed; a size
//! change (or the first frame) clears the screen and repaints everything.
//!
//! All emission goes through `writer::Writer`, so tests can flush into a
//! `Vec<u8>` and inspect the exact escape stream.

pub mod frame;
pub mod status;
pub mod writer;

pub use frame::{ChatView, Frame, compose};
pub use status::{StatusContext, StatusSegment, build_status, compose_status, format_status};

use anyhow::Result;
use std::io::Write;
use tracing::trace;
use writer::Writer;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderMetrics {
    pub full_frames: u64,
    pub partial_frames: u64,
    pub rows_repainted: u64,
}

/// Owns the previously emitted frame.
#[derive(Debug, Default)]
pub struct RenderEngine {
    prev: Option<Frame>,
    metrics: RenderMetrics,
}

impl RenderEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn metrics(&self) -> RenderMetrics {
        self.metrics
    }

    /// Forget the previous frame so the next render is a full repaint.
    pub fn invalidate(&mut self) {
        self.prev = None;
    }

    /// Compute the commands needed to move the screen from the previous frame to `next`.
    pub fn plan(&mut self, next: Frame) -> Writer {
        let mut w = Writer::new();
        let full = match &self.prev {
            Some(prev) => prev.width != next.width || prev.rows.len() != next.rows.len(),
            None => true,
        };
        let mut repainted = 0u64;
        if full {
            w.clear_all();
            for (y, row) in next.rows.iter().enumerate() {
                w.move_to(0, y as u16);
                w.print(row.as_str());
                repainted += 1;
            }
            self.metrics.full_frames += 1;
        } else if let Some(prev) = &self.prev {
            for (y, (old, new)) in prev.rows.iter().zip(next.rows.iter()).enumerate() {
                if old == new {
                    continue;
                }
                w.move_to(0, y as u16);
                w.clear_line();
                w.print(new.as_str());
                repainted += 1;
            }
            self.metrics.partial_frames += 1;
        }
        self.metrics.rows_repainted += repainted;
        w.move_to(next.cursor.0, next.cursor.1);
        w.show_cursor();
        trace!(target: "render", full, rows = repainted, "frame_planned");
        self.prev = Some(next);
        w
    }

    pub fn render<W: Write>(&mut self, next: Frame, out: &mut W) -> Result<()> {
        self.plan(next).flush_to(out)
    }
}
