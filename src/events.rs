//! The single dispatch point between the pipeline and its UI.
//!
//! Background tasks never call into the UI. They push [`OverlayEvent`]s into
//! an unbounded channel and the UI drains it on its own schedule with
//! [`EventQueue::try_recv_events`].

use crate::core::viewport::MapRect;
use crate::LoopError;
use chrono::NaiveDateTime;
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use image::RgbaImage;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
pub enum OverlayEvent {
    /// A valid-times poll succeeded
    TimesUpdated { changed: bool },
    /// A valid-times poll failed; the previous axis stays in effect
    TimesFailed(LoopError),
    /// Every frame of the current fetch is downloaded (and composited)
    FramesReady { frame_count: usize },
    /// The displayed frame changed. `image` is `None` when the display is
    /// cleared or the frame has no composite.
    FrameChanged {
        index: usize,
        timestamp: String,
        frame_date: Option<NaiveDateTime>,
        image: Option<Arc<RgbaImage>>,
    },
    /// A tile requested by the renderer arrived; redraw this area
    TileReady { rect: MapRect },
}

/// Cloneable producer side handed to background tasks
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: Sender<OverlayEvent>,
}

impl EventSender {
    pub fn send(&self, event: OverlayEvent) {
        // The UI may have gone away; events are then dropped
        if self.tx.send(event).is_err() {
            log::debug!("overlay event dropped, no receiver");
        }
    }
}

/// Consumer side owned by the UI
#[derive(Debug)]
pub struct EventQueue {
    rx: Receiver<OverlayEvent>,
}

impl EventQueue {
    /// Try to receive pending events (non-blocking)
    pub fn try_recv_events(&self) -> Vec<OverlayEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        events
    }

    /// Blocks the calling thread until an event arrives or `timeout` passes
    pub fn recv_timeout(&self, timeout: Duration) -> Option<OverlayEvent> {
        match self.rx.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    pub fn has_pending_events(&self) -> bool {
        !self.rx.is_empty()
    }
}

pub fn channel() -> (EventSender, EventQueue) {
    let (tx, rx) = unbounded();
    (EventSender { tx }, EventQueue { rx })
}
