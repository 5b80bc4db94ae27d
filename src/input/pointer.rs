//! Per-frame accumulation of `wl_pointer` events.
//!
//! The compositor groups pointer events and closes each group with `frame`.
//! Events are recorded here as they arrive and taken as one [`PointerFrame`]
//! when the group ends.

use crate::host::FrameId;

pub const POINTER_ENTER: u32 = 1 << 0;
pub const POINTER_LEAVE: u32 = 1 << 1;
pub const POINTER_MOTION: u32 = 1 << 2;
pub const POINTER_BUTTON: u32 = 1 << 3;
pub const POINTER_AXIS: u32 = 1 << 4;
pub const POINTER_AXIS_SOURCE: u32 = 1 << 5;
pub const POINTER_AXIS_STOP: u32 = 1 << 6;
pub const POINTER_AXIS_DISCRETE: u32 = 1 << 7;

/// Index into [`PointerFrame::axes`].
pub const AXIS_VERTICAL: usize = 0;
pub const AXIS_HORIZONTAL: usize = 1;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AxisState {
    pub valid: bool,
    pub value: f64,
    pub discrete: i32,
}

/// Everything reported between two `frame` events.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointerFrame {
    pub mask: u32,
    /// Surface entered, when `POINTER_ENTER` is set.
    pub entered: Option<FrameId>,
    /// Surface left, when `POINTER_LEAVE` is set.
    pub left: Option<FrameId>,
    pub surface_x: f64,
    pub surface_y: f64,
    pub button: u32,
    pub pressed: bool,
    pub time: u32,
    pub serial: u32,
    pub axes: [AxisState; 2],
    pub axis_source: Option<u32>,
}

impl PointerFrame {
    pub fn has(&self, bit: u32) -> bool {
        self.mask & bit != 0
    }
}

#[derive(Debug, Default)]
pub struct PointerAccumulator {
    pending: PointerFrame,
}

impl PointerAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.pending == PointerFrame::default()
    }

    pub fn enter(&mut self, serial: u32, frame: Option<FrameId>, x: f64, y: f64) {
        let p = &mut self.pending;
        p.mask |= POINTER_ENTER;
        p.entered = frame;
        p.serial = serial;
        p.surface_x = x;
        p.surface_y = y;
    }

    pub fn leave(&mut self, serial: u32, frame: Option<FrameId>) {
        let p = &mut self.pending;
        p.mask |= POINTER_LEAVE;
        p.left = frame;
        p.serial = serial;
    }

    pub fn motion(&mut self, time: u32, x: f64, y: f64) {
        let p = &mut self.pending;
        p.mask |= POINTER_MOTION;
        p.time = time;
        p.surface_x = x;
        p.surface_y = y;
    }

    pub fn button(&mut self, serial: u32, time: u32, button: u32, pressed: bool) {
        let p = &mut self.pending;
        p.mask |= POINTER_BUTTON;
        p.serial = serial;
        p.time = time;
        p.button = button;
        p.pressed = pressed;
    }

    pub fn axis(&mut self, time: u32, axis: usize, value: f64) {
        let p = &mut self.pending;
        p.mask |= POINTER_AXIS;
        p.time = time;
        if let Some(slot) = p.axes.get_mut(axis) {
            slot.valid = true;
            slot.value = value;
        }
    }

    pub fn axis_source(&mut self, source: u32) {
        let p = &mut self.pending;
        p.mask |= POINTER_AXIS_SOURCE;
        p.axis_source = Some(source);
    }

    pub fn axis_stop(&mut self, time: u32, axis: usize) {
        let p = &mut self.pending;
        p.mask |= POINTER_AXIS_STOP;
        p.time = time;
        if let Some(slot) = p.axes.get_mut(axis) {
            slot.valid = true;
        }
    }

    pub fn axis_discrete(&mut self, axis: usize, discrete: i32) {
        let p = &mut self.pending;
        p.mask |= POINTER_AXIS_DISCRETE;
        if let Some(slot) = p.axes.get_mut(axis) {
            slot.valid = true;
            slot.discrete = discrete;
        }
    }

    /// Close the current group, leaving the accumulator empty.
    pub fn take_frame(&mut self) -> PointerFrame {
        std::mem::take(&mut self.pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_resets_everything() {
        let mut acc = PointerAccumulator::new();
        acc.enter(5, Some(FrameId(1)), 10.0, 20.0);
        acc.motion(100, 11.0, 21.5);
        acc.button(6, 101, 0x110, true);
        acc.axis(102, AXIS_VERTICAL, 15.0);
        acc.axis_source(0);
        acc.axis_discrete(AXIS_VERTICAL, 1);
        acc.axis_stop(103, AXIS_HORIZONTAL);
        assert!(!acc.is_empty());

        let frame = acc.take_frame();
        assert!(frame.has(POINTER_ENTER | POINTER_MOTION | POINTER_BUTTON));
        assert_eq!(frame.surface_x, 11.0);
        assert_eq!(frame.axes[AXIS_VERTICAL].discrete, 1);
        assert!(frame.axes[AXIS_HORIZONTAL].valid);

        assert!(acc.is_empty());
        let next = acc.take_frame();
        assert_eq!(next.mask, 0);
        assert!(!next.axes[AXIS_VERTICAL].valid);
        assert!(!next.axes[AXIS_HORIZONTAL].valid);
        assert_eq!(next.axis_source, None);
    }

    #[test]
    fn test_axis_discrete_sets_discrete_bit() {
        let mut acc = PointerAccumulator::new();
        acc.axis_discrete(AXIS_VERTICAL, -2);
        let frame = acc.take_frame();
        assert!(frame.has(POINTER_AXIS_DISCRETE));
        assert!(!frame.has(POINTER_AXIS_STOP));
    }

    #[test]
    fn test_out_of_range_axis_ignored() {
        let mut acc = PointerAccumulator::new();
        acc.axis(1, 7, 3.0);
        let frame = acc.take_frame();
        assert!(frame.has(POINTER_AXIS));
        assert!(frame.axes.iter().all(|a| !a.valid));
    }
}
