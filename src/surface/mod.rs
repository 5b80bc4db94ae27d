//! Per-frame surface lifecycle.
//!
//! Each realized frame owns a `wl_surface` with a viewport, wrapped in an
//! xdg toplevel and optionally a server-side decoration. [`SurfaceLifecycle`]
//! is the pure part of the state machine; [`SurfaceState`] holds the protocol
//! objects and issues requests.
//!
//! ```text
//! Unrealized -> SurfaceCreated -> ToplevelRequested -> AwaitingConfigure -> Ready
//!                                                                         \-> Closed
//! ```

pub mod shm;

use crate::display::{ConnectionState, Globals};
use crate::error::{BridgeError, BridgeResult};
use crate::event_queue::{BufferedEvent, EventKind};
use crate::host::{ConnectionId, FrameId};
use log::{debug, info, warn};
use wayland_client::protocol::{wl_callback, wl_surface};
use wayland_client::{Connection, Dispatch, Proxy, QueueHandle, WEnum};
use wayland_protocols::wp::viewporter::client::{wp_viewport, wp_viewporter};
use wayland_protocols::xdg::decoration::zv1::client::{
    zxdg_decoration_manager_v1, zxdg_toplevel_decoration_v1,
};
use wayland_protocols::xdg::shell::client::{xdg_surface, xdg_toplevel};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfacePhase {
    Unrealized,
    SurfaceCreated,
    ToplevelRequested,
    AwaitingConfigure,
    Ready,
    Closed,
}

/// Decoration mode negotiated with the compositor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecorationMode {
    ClientSide,
    ServerSide,
}

/// Configure/ack bookkeeping for one frame surface.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceLifecycle {
    pub phase: SurfacePhase,
    pub wait_for_configure: bool,
    pub width: i32,
    pub height: i32,
    pub viewport_destination: (i32, i32),
    /// Time of the previous frame callback, 0 before the first.
    pub last_frame_time: u32,
    pub scroll_offset: f64,
    pub decoration_mode: Option<DecorationMode>,
}

impl SurfaceLifecycle {
    pub fn new(width: i32, height: i32) -> Self {
        Self {
            phase: SurfacePhase::Unrealized,
            wait_for_configure: false,
            width,
            height,
            viewport_destination: (width, height),
            last_frame_time: 0,
            scroll_offset: 0.0,
            decoration_mode: None,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.phase == SurfacePhase::Closed
    }

    pub fn surface_created(&mut self) {
        self.phase = SurfacePhase::SurfaceCreated;
        self.viewport_destination = (self.width, self.height);
    }

    pub fn toplevel_requested(&mut self) {
        self.phase = SurfacePhase::ToplevelRequested;
        self.wait_for_configure = true;
    }

    pub fn awaiting_configure(&mut self) {
        if self.phase == SurfacePhase::ToplevelRequested {
            self.phase = SurfacePhase::AwaitingConfigure;
        }
    }

    /// Apply an `xdg_toplevel.configure` size.
    ///
    /// Returns the new viewport destination, or `None` when the geometry is
    /// unchanged: a zero dimension leaves the choice to us, and nothing is
    /// applied once closed.
    pub fn toplevel_configure(&mut self, width: i32, height: i32) -> Option<(i32, i32)> {
        if self.is_closed() || width <= 0 || height <= 0 {
            return None;
        }
        self.width = width;
        self.height = height;
        self.viewport_destination = (width, height);
        if self.wait_for_configure {
            self.wait_for_configure = false;
            self.phase = SurfacePhase::Ready;
        }
        Some(self.viewport_destination)
    }

    /// Handle `xdg_surface.configure`; returns whether a buffer should be
    /// attached after the ack.
    pub fn surface_configure(&mut self) -> bool {
        if self.is_closed() {
            return false;
        }
        self.wait_for_configure = false;
        self.phase = SurfacePhase::Ready;
        true
    }

    /// Handle a frame callback at `time`; returns whether to repaint.
    pub fn frame_done(&mut self, time: u32) -> bool {
        if self.is_closed() {
            return false;
        }
        if self.last_frame_time != 0 {
            let elapsed = time.wrapping_sub(self.last_frame_time);
            self.scroll_offset += elapsed as f64 / 1000.0 * 24.0;
        }
        self.last_frame_time = time;
        true
    }

    /// Move to `Closed`; returns `false` when already closed.
    pub fn close(&mut self) -> bool {
        if self.is_closed() {
            return false;
        }
        self.phase = SurfacePhase::Closed;
        self.wait_for_configure = false;
        true
    }
}

/// Protocol objects of one realized frame.
#[derive(Debug)]
pub struct SurfaceState {
    pub frame: FrameId,
    pub connection: ConnectionId,
    pub lifecycle: SurfaceLifecycle,
    surface: wl_surface::WlSurface,
    viewport: wp_viewport::WpViewport,
    xdg_surface: Option<xdg_surface::XdgSurface>,
    toplevel: Option<xdg_toplevel::XdgToplevel>,
    decoration: Option<zxdg_toplevel_decoration_v1::ZxdgToplevelDecorationV1>,
    buffer_size: (i32, i32),
}

impl SurfaceState {
    /// Create the surface and its viewport sized to the frame.
    pub fn create(
        globals: &Globals,
        qh: &QueueHandle<ConnectionState>,
        connection: ConnectionId,
        frame: FrameId,
        width: i32,
        height: i32,
        buffer_size: (i32, i32),
    ) -> BridgeResult<Self> {
        let compositor = globals
            .compositor
            .as_ref()
            .ok_or_else(|| BridgeError::Protocol("wl_compositor is gone".into()))?;
        let viewporter = globals
            .viewporter
            .as_ref()
            .ok_or_else(|| BridgeError::Protocol("wp_viewporter is gone".into()))?;

        let surface = compositor.create_surface(qh, frame);
        let viewport = viewporter.get_viewport(&surface, qh, ());
        let mut lifecycle = SurfaceLifecycle::new(width, height);
        lifecycle.surface_created();
        if width > 0 && height > 0 {
            viewport.set_destination(width, height);
        }

        Ok(Self {
            frame,
            connection,
            lifecycle,
            surface,
            viewport,
            xdg_surface: None,
            toplevel: None,
            decoration: None,
            buffer_size,
        })
    }

    pub fn surface(&self) -> &wl_surface::WlSurface {
        &self.surface
    }

    /// Wrap the surface in an xdg toplevel and commit the initial state.
    pub fn request_toplevel(
        &mut self,
        globals: &Globals,
        qh: &QueueHandle<ConnectionState>,
        title: &str,
        x: i32,
        y: i32,
    ) -> BridgeResult<()> {
        let wm_base = globals
            .wm_base
            .as_ref()
            .ok_or_else(|| BridgeError::Protocol("xdg_wm_base is gone".into()))?;

        let xdg_surface = wm_base.get_xdg_surface(&self.surface, qh, self.frame);
        let toplevel = xdg_surface.get_toplevel(qh, self.frame);
        toplevel.set_title(title.to_string());
        xdg_surface.set_window_geometry(x, y, self.lifecycle.width, self.lifecycle.height);
        self.surface.commit();

        self.xdg_surface = Some(xdg_surface);
        self.toplevel = Some(toplevel);
        self.lifecycle.toplevel_requested();
        debug!("{:?}: toplevel requested '{}'", self.frame, title);
        Ok(())
    }

    /// Ask for server-side decorations when the compositor offers them.
    ///
    /// Returns `true` when a decoration object was created; the caller then
    /// round-trips so the mode is known before the first paint.
    pub fn request_decoration(
        &mut self,
        manager: Option<&zxdg_decoration_manager_v1::ZxdgDecorationManagerV1>,
        qh: &QueueHandle<ConnectionState>,
    ) -> bool {
        self.lifecycle.awaiting_configure();
        let (Some(manager), Some(toplevel)) = (manager, self.toplevel.as_ref()) else {
            return false;
        };
        let decoration = manager.get_toplevel_decoration(toplevel, qh, self.frame);
        decoration.set_mode(zxdg_toplevel_decoration_v1::Mode::ServerSide);
        self.decoration = Some(decoration);
        true
    }

    pub fn request_frame_callback(&self, qh: &QueueHandle<ConnectionState>) {
        if !self.lifecycle.is_closed() {
            self.surface.frame(qh, self.frame);
        }
    }

    /// Attach a freshly painted buffer and commit.
    pub fn paint(&self, globals: &Globals, qh: &QueueHandle<ConnectionState>, full_damage: bool) {
        if self.lifecycle.is_closed() {
            return;
        }
        let Some(shm) = globals.shm.as_ref() else {
            return;
        };
        let (w, h) = self.buffer_size;
        let Some(buffer) = shm::checkerboard_buffer(shm, qh, w, h) else {
            return;
        };
        self.surface.attach(Some(&buffer), 0, 0);
        if full_damage {
            // damage_buffer arrived in wl_surface version 4
            if self.surface.version() >= 4 {
                self.surface.damage_buffer(0, 0, i32::MAX, i32::MAX);
            } else {
                self.surface.damage(0, 0, i32::MAX, i32::MAX);
            }
        }
        self.surface.commit();
    }

    fn set_viewport_destination(&self, (width, height): (i32, i32)) {
        self.viewport.set_destination(width, height);
    }

    /// Destroy every protocol object, innermost role first.
    pub fn destroy(self) {
        if let Some(decoration) = self.decoration {
            decoration.destroy();
        }
        if let Some(toplevel) = self.toplevel {
            toplevel.destroy();
        }
        if let Some(xdg_surface) = self.xdg_surface {
            xdg_surface.destroy();
        }
        self.viewport.destroy();
        self.surface.destroy();
        debug!("{:?}: surface destroyed", self.frame);
    }
}

impl Dispatch<wl_surface::WlSurface, FrameId> for ConnectionState {
    fn event(
        _: &mut Self,
        _: &wl_surface::WlSurface,
        event: wl_surface::Event,
        frame: &FrameId,
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        match event {
            wl_surface::Event::Enter { .. } => debug!("{:?} entered an output", frame),
            wl_surface::Event::Leave { .. } => debug!("{:?} left an output", frame),
            _ => {}
        }
    }
}

impl Dispatch<xdg_surface::XdgSurface, FrameId> for ConnectionState {
    fn event(
        state: &mut Self,
        xdg_surface: &xdg_surface::XdgSurface,
        event: xdg_surface::Event,
        frame: &FrameId,
        _: &Connection,
        qh: &QueueHandle<Self>,
    ) {
        let xdg_surface::Event::Configure { serial } = event else {
            return;
        };
        let Some(surface) = state.surfaces.get_mut(frame) else {
            return;
        };
        if surface.lifecycle.is_closed() {
            return;
        }
        xdg_surface.ack_configure(serial);
        if surface.lifecycle.surface_configure() {
            surface.paint(&state.globals, qh, false);
        }
    }
}

impl Dispatch<xdg_toplevel::XdgToplevel, FrameId> for ConnectionState {
    fn event(
        state: &mut Self,
        _: &xdg_toplevel::XdgToplevel,
        event: xdg_toplevel::Event,
        frame: &FrameId,
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        match event {
            xdg_toplevel::Event::Configure { width, height, .. } => {
                let Some(surface) = state.surfaces.get_mut(frame) else {
                    return;
                };
                match surface.lifecycle.toplevel_configure(width, height) {
                    Some(destination) => {
                        info!("📐 {:?} configured to {}x{}", frame, width, height);
                        surface.set_viewport_destination(destination);
                    }
                    None => debug!("{:?}: configure {}x{} left to client", frame, width, height),
                }
            }
            xdg_toplevel::Event::Close => {
                let closed = state
                    .surfaces
                    .get_mut(frame)
                    .map(|surface| surface.lifecycle.close())
                    .unwrap_or(false);
                if closed {
                    info!("{:?}: close requested by compositor", frame);
                    let time = state.last_interaction;
                    state.enqueue(BufferedEvent::new(EventKind::DeleteWindow, Some(*frame), time));
                }
            }
            _ => {}
        }
    }
}

impl Dispatch<wl_callback::WlCallback, FrameId> for ConnectionState {
    fn event(
        state: &mut Self,
        _: &wl_callback::WlCallback,
        event: wl_callback::Event,
        frame: &FrameId,
        _: &Connection,
        qh: &QueueHandle<Self>,
    ) {
        let wl_callback::Event::Done { callback_data } = event else {
            return;
        };
        let Some(surface) = state.surfaces.get_mut(frame) else {
            return;
        };
        if surface.lifecycle.frame_done(callback_data) {
            surface.request_frame_callback(qh);
            surface.paint(&state.globals, qh, true);
        }
    }
}

impl Dispatch<zxdg_toplevel_decoration_v1::ZxdgToplevelDecorationV1, FrameId> for ConnectionState {
    fn event(
        state: &mut Self,
        _: &zxdg_toplevel_decoration_v1::ZxdgToplevelDecorationV1,
        event: zxdg_toplevel_decoration_v1::Event,
        frame: &FrameId,
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        let zxdg_toplevel_decoration_v1::Event::Configure { mode } = event else {
            return;
        };
        let mode = match mode {
            WEnum::Value(zxdg_toplevel_decoration_v1::Mode::ClientSide) => DecorationMode::ClientSide,
            WEnum::Value(zxdg_toplevel_decoration_v1::Mode::ServerSide) => DecorationMode::ServerSide,
            other => {
                warn!("{:?}: unknown decoration mode {:?}", frame, other);
                return;
            }
        };
        debug!("{:?}: using {:?} decorations", frame, mode);
        if let Some(surface) = state.surfaces.get_mut(frame) {
            surface.lifecycle.decoration_mode = Some(mode);
        }
    }
}

impl Dispatch<wp_viewport::WpViewport, ()> for ConnectionState {
    fn event(
        _: &mut Self,
        _: &wp_viewport::WpViewport,
        _: wp_viewport::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
    }
}

impl Dispatch<wp_viewporter::WpViewporter, ()> for ConnectionState {
    fn event(
        _: &mut Self,
        _: &wp_viewporter::WpViewporter,
        _: wp_viewporter::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
    }
}
