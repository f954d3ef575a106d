//! Overlay rendering seam.
//!
//! The control loop hands every frame to a `DisplaySink` after
//! actuation, together with the selected target (if any) and its
//! confidence label. Rendering is fire-and-forget: the loop never
//! consumes a return value and never waits on the sink.

use crate::capture::Frame;
use crate::detect::{class_name, Detection};

/// Display sink seam.
pub trait DisplaySink: Send {
    /// Render one frame, optionally highlighting the tracked target.
    fn render(&mut self, frame: &Frame, highlight: Option<&Detection>, label: Option<&str>);
}

/// Sink that reports the tracked target through the log instead of a
/// screen. Useful for headless deployments and the stub pipeline.
pub struct LogSink {
    frames_rendered: u64,
}

impl LogSink {
    pub fn new() -> Self {
        Self { frames_rendered: 0 }
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }
}

impl Default for LogSink {
    fn default() -> Self {
        Self::new()
    }
}

impl DisplaySink for LogSink {
    fn render(&mut self, _frame: &Frame, highlight: Option<&Detection>, label: Option<&str>) {
        self.frames_rendered += 1;
        if let Some(target) = highlight {
            let (cx, cy) = target.bbox.center();
            log::debug!(
                "frame {}: target {} at ({:.1}, {:.1}) {}",
                self.frames_rendered,
                class_name(target.class_id).unwrap_or("unknown"),
                cx,
                cy,
                label.unwrap_or("")
            );
        } else {
            log::trace!("frame {}: no target", self.frames_rendered);
        }
    }
}

/// Sink that discards everything.
pub struct NullSink;

impl DisplaySink for NullSink {
    fn render(&mut self, _frame: &Frame, _highlight: Option<&Detection>, _label: Option<&str>) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_sink_counts_rendered_frames() {
        let frame = Frame::new(vec![0; 12], 2, 2);
        let mut sink = LogSink::new();
        sink.render(&frame, None, None);
        sink.render(&frame, None, None);
        assert_eq!(sink.frames_rendered(), 2);
    }
}
