//! Fixed arena of touch contacts accumulated between `wl_touch.frame` events.

use log::{debug, warn};
use thiserror::Error;

pub const MAX_TOUCH_POINTS: usize = 10;

pub const TOUCH_DOWN: u32 = 1 << 0;
pub const TOUCH_UP: u32 = 1 << 1;
pub const TOUCH_MOTION: u32 = 1 << 2;
pub const TOUCH_CANCEL: u32 = 1 << 3;
pub const TOUCH_SHAPE: u32 = 1 << 4;
pub const TOUCH_ORIENTATION: u32 = 1 << 5;

/// Every slot holds a live contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("all {MAX_TOUCH_POINTS} touch slots are in use, dropping contact {id}")]
pub struct TouchSlotsExhausted {
    pub id: i32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TouchPoint {
    pub valid: bool,
    pub id: i32,
    pub mask: u32,
    pub surface_x: f64,
    pub surface_y: f64,
    pub major: f64,
    pub minor: f64,
    pub orientation: f64,
}

/// Contacts reported by one `frame`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TouchFrame {
    pub points: Vec<TouchPoint>,
    pub cancelled: bool,
    pub time: u32,
    pub serial: u32,
}

#[derive(Debug, Default)]
pub struct TouchAccumulator {
    points: [TouchPoint; MAX_TOUCH_POINTS],
    cancelled: bool,
    time: u32,
    serial: u32,
    dropped: u64,
}

impl TouchAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Contacts that could not be tracked since creation.
    pub fn dropped_contacts(&self) -> u64 {
        self.dropped
    }

    pub fn active_slots(&self) -> usize {
        self.points.iter().filter(|p| p.valid).count()
    }

    /// Slot for contact `id`, allocating a free one on first sight.
    fn slot(&mut self, id: i32) -> Result<&mut TouchPoint, TouchSlotsExhausted> {
        let index = match self.points.iter().position(|p| p.valid && p.id == id) {
            Some(index) => index,
            None => match self.points.iter().position(|p| !p.valid) {
                Some(free) => {
                    self.points[free] = TouchPoint {
                        valid: true,
                        id,
                        ..TouchPoint::default()
                    };
                    free
                }
                None => {
                    self.dropped += 1;
                    warn!("👆 touch contact {} dropped, all slots busy", id);
                    return Err(TouchSlotsExhausted { id });
                }
            },
        };
        Ok(&mut self.points[index])
    }

    pub fn down(
        &mut self,
        serial: u32,
        time: u32,
        id: i32,
        x: f64,
        y: f64,
    ) -> Result<(), TouchSlotsExhausted> {
        let point = self.slot(id)?;
        point.mask |= TOUCH_DOWN;
        point.surface_x = x;
        point.surface_y = y;
        self.time = time;
        self.serial = serial;
        Ok(())
    }

    pub fn up(&mut self, serial: u32, time: u32, id: i32) -> Result<(), TouchSlotsExhausted> {
        let point = self.slot(id)?;
        point.mask |= TOUCH_UP;
        self.time = time;
        self.serial = serial;
        Ok(())
    }

    pub fn motion(&mut self, time: u32, id: i32, x: f64, y: f64) -> Result<(), TouchSlotsExhausted> {
        let point = self.slot(id)?;
        point.mask |= TOUCH_MOTION;
        point.surface_x = x;
        point.surface_y = y;
        self.time = time;
        Ok(())
    }

    pub fn shape(&mut self, id: i32, major: f64, minor: f64) -> Result<(), TouchSlotsExhausted> {
        let point = self.slot(id)?;
        point.mask |= TOUCH_SHAPE;
        point.major = major;
        point.minor = minor;
        Ok(())
    }

    pub fn orientation(&mut self, id: i32, orientation: f64) -> Result<(), TouchSlotsExhausted> {
        let point = self.slot(id)?;
        point.mask |= TOUCH_ORIENTATION;
        point.orientation = orientation;
        Ok(())
    }

    pub fn cancel(&mut self) {
        self.cancelled = true;
    }

    /// Report and free every valid slot, then clear the cancel flag.
    pub fn frame(&mut self) -> TouchFrame {
        let mut reported = TouchFrame {
            points: Vec::new(),
            cancelled: self.cancelled,
            time: self.time,
            serial: self.serial,
        };

        for point in self.points.iter_mut().filter(|p| p.valid) {
            debug!(
                "touch @{} id={} mask={:#x} at {:.1},{:.1} shape {:.1}x{:.1} orientation {:.1}",
                self.time,
                point.id,
                point.mask,
                point.surface_x,
                point.surface_y,
                point.major,
                point.minor,
                point.orientation
            );
            reported.points.push(*point);
            *point = TouchPoint::default();
        }

        if self.cancelled {
            debug!("touch sequence cancelled");
        }
        self.cancelled = false;
        reported
    }
}
