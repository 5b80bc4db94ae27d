//! Protocol listeners for the registry, seat and input devices.
//!
//! Surface-role listeners live next to the surface state in
//! [`crate::surface`]; buffer listeners in [`crate::surface::shm`].

use super::ConnectionState;
use crate::event_queue::{BufferedEvent, EventKind};
use crate::host::FrameId;
use crate::input::pointer::{AXIS_HORIZONTAL, AXIS_VERTICAL};
use log::{debug, info, warn};
use wayland_client::protocol::{
    wl_compositor, wl_keyboard, wl_pointer, wl_registry, wl_seat, wl_shm, wl_surface, wl_touch,
};
use wayland_client::{Connection, Dispatch, Proxy, QueueHandle, WEnum};
use wayland_protocols::xdg::decoration::zv1::client::zxdg_decoration_manager_v1;
use wayland_protocols::xdg::shell::client::xdg_wm_base;

/// Highest versions of each global the bridge speaks.
const COMPOSITOR_VERSION: u32 = 4;
const WM_BASE_VERSION: u32 = 2;
const SEAT_VERSION: u32 = 7;

/// `wl_pointer.frame` exists from seat version 5 on.
const POINTER_FRAME_SINCE: u32 = 5;

fn frame_of(surface: &wl_surface::WlSurface) -> Option<FrameId> {
    surface.data::<FrameId>().copied()
}

fn wheel_axis(axis: WEnum<wl_pointer::Axis>) -> Option<usize> {
    match axis {
        WEnum::Value(wl_pointer::Axis::VerticalScroll) => Some(AXIS_VERTICAL),
        WEnum::Value(wl_pointer::Axis::HorizontalScroll) => Some(AXIS_HORIZONTAL),
        _ => None,
    }
}

impl ConnectionState {
    /// Close the pending pointer group and queue the resulting events.
    fn flush_pointer_frame(&mut self) {
        let prefs = self.host.modifier_preferences();
        let modifiers = self.keyboard.host_modifiers(&prefs);
        for event in self.pointer.finish_frame(modifiers) {
            self.enqueue(event);
        }
    }

    /// Seats older than version 5 never send `frame`; every event is its
    /// own group.
    fn pointer_event_done(&mut self, pointer: &wl_pointer::WlPointer) {
        if pointer.version() < POINTER_FRAME_SINCE {
            self.flush_pointer_frame();
        }
    }

    fn apply_capabilities(
        &mut self,
        seat: &wl_seat::WlSeat,
        caps: wl_seat::Capability,
        qh: &QueueHandle<Self>,
    ) {
        let release = seat.version() >= 3;

        if caps.contains(wl_seat::Capability::Pointer) {
            if self.devices.pointer.is_none() {
                self.devices.pointer = Some(seat.get_pointer(qh, ()));
                debug!("🖱️ pointer acquired");
            }
        } else if let Some(pointer) = self.devices.pointer.take() {
            if release {
                pointer.release();
            }
            debug!("🖱️ pointer removed");
        }

        if caps.contains(wl_seat::Capability::Keyboard) {
            if self.devices.keyboard.is_none() {
                self.devices.keyboard = Some(seat.get_keyboard(qh, ()));
                debug!("⌨️ keyboard acquired");
            }
        } else if let Some(keyboard) = self.devices.keyboard.take() {
            if release {
                keyboard.release();
            }
            self.focus_frame = None;
            debug!("⌨️ keyboard removed");
        }

        if caps.contains(wl_seat::Capability::Touch) {
            if self.devices.touch.is_none() {
                self.devices.touch = Some(seat.get_touch(qh, ()));
                debug!("touch acquired");
            }
        } else if let Some(touch) = self.devices.touch.take() {
            if release {
                touch.release();
            }
            debug!("touch removed");
        }
    }
}

impl Dispatch<wl_registry::WlRegistry, ()> for ConnectionState {
    fn event(
        state: &mut Self,
        registry: &wl_registry::WlRegistry,
        event: wl_registry::Event,
        _: &(),
        _: &Connection,
        qh: &QueueHandle<Self>,
    ) {
        match event {
            wl_registry::Event::Global {
                name,
                interface,
                version,
            } => {
                let bound: Option<&'static str> = match interface.as_str() {
                    "wl_compositor" => {
                        state.globals.compositor =
                            Some(registry.bind(name, version.min(COMPOSITOR_VERSION), qh, ()));
                        Some("wl_compositor")
                    }
                    "wl_shm" => {
                        state.globals.shm = Some(registry.bind(name, 1, qh, ()));
                        Some("wl_shm")
                    }
                    "wp_viewporter" => {
                        state.globals.viewporter = Some(registry.bind(name, 1, qh, ()));
                        Some("wp_viewporter")
                    }
                    "xdg_wm_base" => {
                        state.globals.wm_base =
                            Some(registry.bind(name, version.min(WM_BASE_VERSION), qh, ()));
                        Some("xdg_wm_base")
                    }
                    "wl_seat" if state.globals.seat.is_none() => {
                        state.globals.seat =
                            Some(registry.bind(name, version.min(SEAT_VERSION), qh, ()));
                        Some("wl_seat")
                    }
                    "zxdg_decoration_manager_v1" => {
                        state.globals.decoration_manager = Some(registry.bind(name, 1, qh, ()));
                        Some("zxdg_decoration_manager_v1")
                    }
                    _ => None,
                };
                if let Some(interface) = bound {
                    debug!("bound {} (name {}, v{})", interface, name, version);
                    state.globals.names.insert(name, interface);
                }
            }
            wl_registry::Event::GlobalRemove { name } => {
                match state.globals.names.remove(&name) {
                    Some("wl_seat") => {
                        info!("seat removed by the compositor");
                        state.devices.release_all();
                        state.focus_frame = None;
                        if let Some(seat) = state.globals.seat.take() {
                            if seat.version() >= 5 {
                                seat.release();
                            }
                        }
                    }
                    Some(interface) => warn!("global {} ({}) removed", interface, name),
                    None => debug!("unbound global {} removed", name),
                }
            }
            _ => {}
        }
    }
}

impl Dispatch<wl_compositor::WlCompositor, ()> for ConnectionState {
    fn event(
        _: &mut Self,
        _: &wl_compositor::WlCompositor,
        _: wl_compositor::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
    }
}

impl Dispatch<wl_shm::WlShm, ()> for ConnectionState {
    fn event(
        _: &mut Self,
        _: &wl_shm::WlShm,
        event: wl_shm::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        if let wl_shm::Event::Format { format } = event {
            debug!("shm format {:?}", format);
        }
    }
}

impl Dispatch<zxdg_decoration_manager_v1::ZxdgDecorationManagerV1, ()> for ConnectionState {
    fn event(
        _: &mut Self,
        _: &zxdg_decoration_manager_v1::ZxdgDecorationManagerV1,
        _: zxdg_decoration_manager_v1::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
    }
}

impl Dispatch<xdg_wm_base::XdgWmBase, ()> for ConnectionState {
    fn event(
        _: &mut Self,
        wm_base: &xdg_wm_base::XdgWmBase,
        event: xdg_wm_base::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        if let xdg_wm_base::Event::Ping { serial } = event {
            wm_base.pong(serial);
        }
    }
}

impl Dispatch<wl_seat::WlSeat, ()> for ConnectionState {
    fn event(
        state: &mut Self,
        seat: &wl_seat::WlSeat,
        event: wl_seat::Event,
        _: &(),
        _: &Connection,
        qh: &QueueHandle<Self>,
    ) {
        match event {
            wl_seat::Event::Capabilities { capabilities } => {
                let caps = match capabilities {
                    WEnum::Value(caps) => caps,
                    WEnum::Unknown(bits) => wl_seat::Capability::from_bits_truncate(bits),
                };
                state.apply_capabilities(seat, caps, qh);
            }
            wl_seat::Event::Name { name } => {
                info!("🪑 seat '{}'", name);
                state.seat_name = Some(name);
            }
            _ => {}
        }
    }
}

impl Dispatch<wl_pointer::WlPointer, ()> for ConnectionState {
    fn event(
        state: &mut Self,
        pointer: &wl_pointer::WlPointer,
        event: wl_pointer::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        let acc = &mut state.pointer.accumulator;
        match event {
            wl_pointer::Event::Enter {
                serial,
                surface,
                surface_x,
                surface_y,
            } => acc.enter(serial, frame_of(&surface), surface_x, surface_y),
            wl_pointer::Event::Leave { serial, surface } => acc.leave(serial, frame_of(&surface)),
            wl_pointer::Event::Motion {
                time,
                surface_x,
                surface_y,
            } => acc.motion(time, surface_x, surface_y),
            wl_pointer::Event::Button {
                serial,
                time,
                button,
                state: button_state,
            } => {
                let pressed = matches!(button_state, WEnum::Value(wl_pointer::ButtonState::Pressed));
                acc.button(serial, time, button, pressed);
            }
            wl_pointer::Event::Axis { time, axis, value } => {
                if let Some(axis) = wheel_axis(axis) {
                    acc.axis(time, axis, value);
                }
            }
            wl_pointer::Event::AxisSource { axis_source } => {
                let source = match axis_source {
                    WEnum::Value(source) => u32::from(source),
                    WEnum::Unknown(raw) => raw,
                };
                acc.axis_source(source)
            },
            wl_pointer::Event::AxisStop { time, axis } => {
                if let Some(axis) = wheel_axis(axis) {
                    acc.axis_stop(time, axis);
                }
            }
            wl_pointer::Event::AxisDiscrete { axis, discrete } => {
                if let Some(axis) = wheel_axis(axis) {
                    acc.axis_discrete(axis, discrete);
                }
            }
            wl_pointer::Event::Frame => {
                state.flush_pointer_frame();
                return;
            }
            _ => return,
        }
        state.pointer_event_done(pointer);
    }
}

impl Dispatch<wl_keyboard::WlKeyboard, ()> for ConnectionState {
    fn event(
        state: &mut Self,
        _: &wl_keyboard::WlKeyboard,
        event: wl_keyboard::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        match event {
            wl_keyboard::Event::Keymap { format, fd, size } => {
                if !matches!(format, WEnum::Value(wl_keyboard::KeymapFormat::XkbV1)) {
                    warn!("⌨️ ignoring keymap in unsupported format {:?}", format);
                    return;
                }
                if let Err(e) = state.keyboard.load_keymap_fd(fd, size) {
                    warn!("⌨️ keymap rejected: {}", e);
                }
            }
            wl_keyboard::Event::Enter { serial, surface, .. } => {
                let Some(frame) = frame_of(&surface) else {
                    return;
                };
                debug!("⌨️ focus in {:?} (serial {})", frame, serial);
                state.focus_frame = Some(frame);
                let time = state.last_interaction;
                state.enqueue(BufferedEvent::new(EventKind::FocusIn, Some(frame), time));
            }
            wl_keyboard::Event::Leave { surface, .. } => {
                let frame = frame_of(&surface);
                if frame.is_some() && state.focus_frame == frame {
                    state.focus_frame = None;
                    let time = state.last_interaction;
                    state.enqueue(BufferedEvent::new(EventKind::FocusOut, frame, time));
                }
            }
            wl_keyboard::Event::Key {
                time,
                key,
                state: key_state,
                ..
            } => {
                if !matches!(key_state, WEnum::Value(wl_keyboard::KeyState::Pressed)) {
                    return;
                }
                let Some(frame) = state.focus_frame else {
                    return;
                };
                let prefs = state.host.modifier_preferences();
                let extra = state.host.extra_keyboard_modifiers();
                if let Some(press) = state.keyboard.key_press(key, &prefs, extra) {
                    debug!("⌨️ key {} -> keysym {:#x} {:?}", key, press.keysym, press.kind);
                    state.enqueue(
                        BufferedEvent::new(press.kind, Some(frame), time)
                            .with_modifiers(press.modifiers),
                    );
                }
            }
            wl_keyboard::Event::Modifiers {
                mods_depressed,
                mods_latched,
                mods_locked,
                group,
                ..
            } => state
                .keyboard
                .update_modifiers(mods_depressed, mods_latched, mods_locked, group),
            wl_keyboard::Event::RepeatInfo { rate, delay } => {
                state.keyboard.set_repeat_info(rate, delay)
            }
            _ => {}
        }
    }
}

impl Dispatch<wl_touch::WlTouch, ()> for ConnectionState {
    fn event(
        state: &mut Self,
        _: &wl_touch::WlTouch,
        event: wl_touch::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        let touch = &mut state.touch;
        // overflow is already logged and counted by the accumulator
        let _ = match event {
            wl_touch::Event::Down {
                serial,
                time,
                id,
                x,
                y,
                ..
            } => touch.down(serial, time, id, x, y),
            wl_touch::Event::Up { serial, time, id } => touch.up(serial, time, id),
            wl_touch::Event::Motion { time, id, x, y } => touch.motion(time, id, x, y),
            wl_touch::Event::Shape { id, major, minor } => touch.shape(id, major, minor),
            wl_touch::Event::Orientation { id, orientation } => touch.orientation(id, orientation),
            wl_touch::Event::Cancel => {
                touch.cancel();
                Ok(())
            }
            wl_touch::Event::Frame => {
                let frame = touch.frame();
                if frame.cancelled {
                    debug!("touch sequence cancelled");
                }
                Ok(())
            }
            _ => Ok(()),
        };
    }
}
