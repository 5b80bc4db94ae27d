//! FIFO of host events produced during protocol dispatch.
//!
//! Listener callbacks append here; the host's read hook drains it. The queue
//! is shared between every connection's dispatch state and the registry, so
//! it lives behind an `Arc<Mutex<_>>`. The lock is only held to push or pop a
//! single event, never while a consumer handles one.

use crate::host::FrameId;
use crate::keyboard::modifiers::HostModifiers;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

const INITIAL_CAPACITY: usize = 4;

/// Scroll axis of a wheel event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WheelAxis {
    Vertical,
    Horizontal,
}

/// Payload of a [`BufferedEvent`].
#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    NoEvent,
    /// Keystroke the host resolves itself from a raw code.
    KeyStroke { code: u32 },
    AsciiKeystroke { code: u32 },
    MultibyteKeystroke { code: u32 },
    /// Symbolic key; carries the raw keysym.
    NonAsciiKeystroke { keysym: u32 },
    DeleteWindow,
    SelectionRequest,
    SelectionClear,
    MouseMovement { x: f64, y: f64 },
    /// Up/down is carried in the modifier bits.
    MouseClick { button: u32, x: f64, y: f64 },
    Wheel {
        axis: WheelAxis,
        value: f64,
        discrete: i32,
        x: f64,
        y: f64,
    },
    FocusIn,
    FocusOut,
}

/// One input or window event waiting for the host.
#[derive(Debug, Clone, PartialEq)]
pub struct BufferedEvent {
    pub kind: EventKind,
    pub frame: Option<FrameId>,
    pub modifiers: HostModifiers,
    /// Protocol timestamp in milliseconds.
    pub timestamp: u32,
}

impl BufferedEvent {
    pub fn new(kind: EventKind, frame: Option<FrameId>, timestamp: u32) -> Self {
        Self {
            kind,
            frame,
            modifiers: HostModifiers::NONE,
            timestamp,
        }
    }

    pub fn with_modifiers(mut self, modifiers: HostModifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    /// Selection traffic is directed at the display, not a frame.
    pub fn is_selection(&self) -> bool {
        matches!(
            self.kind,
            EventKind::SelectionRequest | EventKind::SelectionClear
        )
    }
}

/// Append-only FIFO with 50% growth steps.
#[derive(Debug)]
pub struct EventQueue {
    events: VecDeque<BufferedEvent>,
    capacity: usize,
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl EventQueue {
    pub fn new() -> Self {
        Self {
            events: VecDeque::with_capacity(INITIAL_CAPACITY),
            capacity: INITIAL_CAPACITY,
        }
    }

    pub fn push(&mut self, event: BufferedEvent) {
        if self.events.len() == self.capacity {
            self.capacity += (self.capacity / 2).max(1);
            let additional = self.capacity - self.events.len();
            self.events.reserve_exact(additional);
        }
        self.events.push_back(event);
    }

    pub fn pop(&mut self) -> Option<BufferedEvent> {
        self.events.pop_front()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Slots available before the next growth step.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Keep only the events `keep` accepts, preserving their order.
    pub fn retain(&mut self, keep: impl FnMut(&BufferedEvent) -> bool) {
        self.events.retain(keep);
    }
}

/// Queue handle shared by every connection of a registry.
pub type SharedEventQueue = Arc<Mutex<EventQueue>>;

pub fn shared_queue() -> SharedEventQueue {
    Arc::new(Mutex::new(EventQueue::new()))
}

/// Hand every queued event to `sink` in arrival order.
///
/// Each event is removed before the sink sees it, so a sink that enqueues
/// more events (directly or by dispatching) does not deadlock and sees them
/// on a later iteration.
pub fn drain(queue: &SharedEventQueue, mut sink: impl FnMut(BufferedEvent)) -> usize {
    let mut count = 0;
    loop {
        let next = queue.lock().pop();
        match next {
            Some(event) => {
                sink(event);
                count += 1;
            }
            None => break,
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: u32) -> BufferedEvent {
        BufferedEvent::new(EventKind::AsciiKeystroke { code }, Some(FrameId(1)), code)
    }

    #[test]
    fn test_growth_steps() {
        let mut queue = EventQueue::new();
        assert_eq!(queue.capacity(), 4);
        for i in 0..5 {
            queue.push(key(i));
        }
        assert_eq!(queue.capacity(), 6);
        for i in 5..7 {
            queue.push(key(i));
        }
        assert_eq!(queue.capacity(), 9);
    }

    #[test]
    fn test_fifo_order_across_many_operations() {
        let mut queue = EventQueue::new();
        let mut expected = VecDeque::new();
        let mut next = 0u32;

        // Interleave bursts of pushes with partial drains.
        for round in 0..40 {
            for _ in 0..(round % 7 + 1) {
                queue.push(key(next));
                expected.push_back(next);
                next += 1;
            }
            for _ in 0..(round % 3) {
                let got = queue.pop().map(|e| e.timestamp);
                assert_eq!(got, expected.pop_front());
            }
        }
        assert!(next >= 100);
        assert!(queue.capacity() > INITIAL_CAPACITY);

        while let Some(event) = queue.pop() {
            assert_eq!(Some(event.timestamp), expected.pop_front());
        }
        assert!(expected.is_empty());
        assert!(queue.is_empty());
    }

    #[test]
    fn test_drain_releases_lock_before_sink() {
        let queue = shared_queue();
        queue.lock().push(key(1));
        queue.lock().push(key(2));

        let mut seen = Vec::new();
        let reentrant = queue.clone();
        let count = drain(&queue, |event| {
            if event.timestamp == 1 {
                reentrant.lock().push(key(3));
            }
            seen.push(event.timestamp);
        });

        assert_eq!(count, 3);
        assert_eq!(seen, vec![1, 2, 3]);
    }

    #[test]
    fn test_retain_keeps_order_of_survivors() {
        let mut queue = EventQueue::new();
        for (code, frame) in [(1, 1), (2, 2), (3, 1), (4, 2)] {
            queue.push(BufferedEvent::new(
                EventKind::AsciiKeystroke { code },
                Some(FrameId(frame)),
                code,
            ));
        }
        queue.retain(|e| e.frame != Some(FrameId(2)));

        let codes: Vec<u32> = std::iter::from_fn(|| queue.pop()).map(|e| e.timestamp).collect();
        assert_eq!(codes, vec![1, 3]);
    }

    #[test]
    fn test_selection_events_flagged() {
        let clear = BufferedEvent::new(EventKind::SelectionClear, None, 0);
        assert!(clear.is_selection());
        assert!(!key(1).is_selection());
    }
}
