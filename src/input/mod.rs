//! Seat input: pointer and touch accumulation and conversion to host events.
//!
//! Keyboard translation lives in [`crate::keyboard`]; this module covers the
//! frame-batched devices.

pub mod pointer;
pub mod touch;

use crate::event_queue::{BufferedEvent, EventKind, WheelAxis};
use crate::host::FrameId;
use crate::keyboard::modifiers::HostModifiers;
use log::debug;
use pointer::{
    PointerAccumulator, PointerFrame, AXIS_HORIZONTAL, AXIS_VERTICAL, POINTER_BUTTON,
    POINTER_ENTER, POINTER_LEAVE, POINTER_MOTION,
};

/// Linux input event codes for mouse buttons.
pub const BTN_LEFT: u32 = 0x110;
pub const BTN_RIGHT: u32 = 0x111;
pub const BTN_MIDDLE: u32 = 0x112;

/// Host button number for an evdev button code.
pub fn host_button(code: u32) -> u32 {
    match code {
        BTN_LEFT => 1,
        BTN_MIDDLE => 2,
        BTN_RIGHT => 3,
        other => other.saturating_sub(BTN_LEFT) + 1,
    }
}

/// Pointer accumulator plus the frame currently under the pointer.
#[derive(Debug, Default)]
pub struct PointerBridge {
    pub accumulator: PointerAccumulator,
    mouse_frame: Option<FrameId>,
    position: (f64, f64),
}

impl PointerBridge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mouse_frame(&self) -> Option<FrameId> {
        self.mouse_frame
    }

    pub fn position(&self) -> (f64, f64) {
        self.position
    }

    /// Forget `frame` if the pointer is over it.
    pub fn forget_frame(&mut self, frame: FrameId) {
        if self.mouse_frame == Some(frame) {
            self.mouse_frame = None;
        }
    }

    /// Close the pending group and produce host events for it.
    pub fn finish_frame(&mut self, modifiers: HostModifiers) -> Vec<BufferedEvent> {
        let frame = self.accumulator.take_frame();
        self.translate(&frame, modifiers)
    }

    fn translate(&mut self, frame: &PointerFrame, modifiers: HostModifiers) -> Vec<BufferedEvent> {
        let mut events = Vec::new();

        if frame.has(POINTER_ENTER) {
            self.mouse_frame = frame.entered;
        }
        if frame.has(POINTER_ENTER | POINTER_MOTION) {
            self.position = (frame.surface_x, frame.surface_y);
        }
        let target = self.mouse_frame.or(frame.left);
        let (x, y) = self.position;

        if frame.has(POINTER_ENTER | POINTER_MOTION) && target.is_some() {
            events.push(
                BufferedEvent::new(EventKind::MouseMovement { x, y }, target, frame.time)
                    .with_modifiers(modifiers),
            );
        }

        if frame.has(POINTER_BUTTON) && target.is_some() {
            let updown = if frame.pressed {
                HostModifiers::DOWN
            } else {
                HostModifiers::UP
            };
            events.push(
                BufferedEvent::new(
                    EventKind::MouseClick {
                        button: host_button(frame.button),
                        x,
                        y,
                    },
                    target,
                    frame.time,
                )
                .with_modifiers(modifiers | updown),
            );
        }

        for (index, axis) in [(AXIS_VERTICAL, WheelAxis::Vertical), (AXIS_HORIZONTAL, WheelAxis::Horizontal)] {
            let state = frame.axes[index];
            if !state.valid || target.is_none() {
                continue;
            }
            // axis_stop alone marks the end of a kinetic scroll
            if state.value == 0.0 && state.discrete == 0 {
                continue;
            }
            events.push(
                BufferedEvent::new(
                    EventKind::Wheel {
                        axis,
                        value: state.value,
                        discrete: state.discrete,
                        x,
                        y,
                    },
                    target,
                    frame.time,
                )
                .with_modifiers(modifiers),
            );
        }

        if frame.has(POINTER_LEAVE) && (frame.left.is_none() || frame.left == self.mouse_frame) {
            self.mouse_frame = None;
        }

        if !events.is_empty() {
            debug!("🖱️ pointer frame @{} -> {} event(s)", frame.time, events.len());
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_button_numbers() {
        assert_eq!(host_button(BTN_LEFT), 1);
        assert_eq!(host_button(BTN_MIDDLE), 2);
        assert_eq!(host_button(BTN_RIGHT), 3);
        assert_eq!(host_button(0x113), 4);
    }

    #[test]
    fn test_enter_motion_click_sequence() {
        let mut bridge = PointerBridge::new();
        bridge.accumulator.enter(1, Some(FrameId(7)), 3.0, 4.0);
        let events = bridge.finish_frame(HostModifiers::NONE);
        assert_eq!(bridge.mouse_frame(), Some(FrameId(7)));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::MouseMovement { x: 3.0, y: 4.0 });

        bridge.accumulator.button(2, 50, BTN_LEFT, true);
        let events = bridge.finish_frame(HostModifiers::SHIFT);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].frame, Some(FrameId(7)));
        assert_eq!(
            events[0].kind,
            EventKind::MouseClick { button: 1, x: 3.0, y: 4.0 }
        );
        assert_eq!(events[0].modifiers, HostModifiers::SHIFT | HostModifiers::DOWN);

        bridge.accumulator.button(3, 60, BTN_LEFT, false);
        let events = bridge.finish_frame(HostModifiers::NONE);
        assert!(events[0].modifiers.contains(HostModifiers::UP));
    }

    #[test]
    fn test_wheel_and_leave() {
        let mut bridge = PointerBridge::new();
        bridge.accumulator.enter(1, Some(FrameId(2)), 0.0, 0.0);
        bridge.finish_frame(HostModifiers::NONE);

        bridge.accumulator.axis(10, AXIS_VERTICAL, 10.0);
        bridge.accumulator.axis_discrete(AXIS_VERTICAL, 1);
        let events = bridge.finish_frame(HostModifiers::NONE);
        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0].kind,
            EventKind::Wheel { axis: WheelAxis::Vertical, discrete: 1, .. }
        ));

        bridge.accumulator.axis_stop(11, AXIS_VERTICAL);
        assert!(bridge.finish_frame(HostModifiers::NONE).is_empty());

        bridge.accumulator.leave(4, Some(FrameId(2)));
        bridge.finish_frame(HostModifiers::NONE);
        assert_eq!(bridge.mouse_frame(), None);
    }

    #[test]
    fn test_no_events_without_frame_under_pointer() {
        let mut bridge = PointerBridge::new();
        bridge.accumulator.motion(1, 5.0, 5.0);
        bridge.accumulator.button(1, 1, BTN_RIGHT, true);
        assert!(bridge.finish_frame(HostModifiers::NONE).is_empty());
    }
}
