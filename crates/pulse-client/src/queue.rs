//! Outbound control-frame queue.
//!
//! Frames drain in strict FIFO order and only while a connection is up.
//! A frame is removed only after a successful send, so a failure mid-
//! drain leaves it at the front for the next connection.

use std::collections::VecDeque;

use pulse_core::ControlFrame;

/// FIFO queue of control frames awaiting transmission.
#[derive(Debug, Default)]
pub struct ControlQueue {
    frames: VecDeque<ControlFrame>,
}

impl ControlQueue {
    /// Empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a frame to the back.
    pub fn push(&mut self, frame: ControlFrame) {
        self.frames.push_back(frame);
    }

    /// The frame that must be sent next, if any.
    pub fn front(&self) -> Option<&ControlFrame> {
        self.frames.front()
    }

    /// Discard the front frame after it was sent successfully.
    pub fn ack_front(&mut self) {
        let _ = self.frames.pop_front();
    }

    /// Number of queued frames.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}
