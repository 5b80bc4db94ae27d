//! Wayland display connections.
//!
//! A [`DisplayConnection`] owns the protocol connection, its event queue and
//! the [`ConnectionState`] that listener callbacks mutate during dispatch.
//! Connections live in a [`ConnectionRegistry`]; frames refer to them by
//! [`ConnectionId`].

pub mod dispatch;
pub mod name;
pub mod registry;

pub use registry::{ConnectionRegistry, DisplaySelector, RegistryOptions};

use crate::error::{BridgeError, BridgeResult};
use crate::event_queue::{BufferedEvent, SharedEventQueue};
use crate::host::{ConnectionId, FrameId, Host, KboardId, TerminalHandle, BackendKind};
use crate::input::touch::TouchAccumulator;
use crate::input::PointerBridge;
use crate::keyboard::KeyboardTranslator;
use crate::surface::{SurfacePhase, SurfaceState};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use wayland_client::backend::WaylandError;
use wayland_client::protocol::{
    wl_compositor, wl_keyboard, wl_pointer, wl_registry, wl_seat, wl_shm, wl_touch,
};
use wayland_client::{Connection, EventQueue as WlEventQueue, Proxy, QueueHandle};
use wayland_protocols::wp::viewporter::client::wp_viewporter;
use wayland_protocols::xdg::decoration::zv1::client::zxdg_decoration_manager_v1;
use wayland_protocols::xdg::shell::client::xdg_wm_base;

/// Globals bound from the registry.
#[derive(Debug, Default)]
pub struct Globals {
    pub compositor: Option<wl_compositor::WlCompositor>,
    pub shm: Option<wl_shm::WlShm>,
    pub viewporter: Option<wp_viewporter::WpViewporter>,
    pub wm_base: Option<xdg_wm_base::XdgWmBase>,
    pub seat: Option<wl_seat::WlSeat>,
    pub decoration_manager: Option<zxdg_decoration_manager_v1::ZxdgDecorationManagerV1>,
    /// Registry name of each bound global.
    pub(crate) names: HashMap<u32, &'static str>,
}

impl Globals {
    /// First global every frame needs that the compositor did not offer.
    pub fn missing_required(&self) -> Option<&'static str> {
        if self.compositor.is_none() {
            Some("wl_compositor")
        } else if self.shm.is_none() {
            Some("wl_shm")
        } else if self.viewporter.is_none() {
            Some("wp_viewporter")
        } else if self.wm_base.is_none() {
            Some("xdg_wm_base")
        } else if self.decoration_manager.is_none() {
            Some("zxdg_decoration_manager_v1")
        } else {
            None
        }
    }
}

/// Input devices obtained from the seat.
#[derive(Debug, Default)]
pub struct SeatDevices {
    pub pointer: Option<wl_pointer::WlPointer>,
    pub keyboard: Option<wl_keyboard::WlKeyboard>,
    pub touch: Option<wl_touch::WlTouch>,
}

impl SeatDevices {
    /// Release every device; `release` exists from version 3 on.
    pub fn release_all(&mut self) {
        if let Some(pointer) = self.pointer.take() {
            if pointer.version() >= 3 {
                pointer.release();
            }
        }
        if let Some(keyboard) = self.keyboard.take() {
            if keyboard.version() >= 3 {
                keyboard.release();
            }
        }
        if let Some(touch) = self.touch.take() {
            if touch.version() >= 3 {
                touch.release();
            }
        }
    }
}

/// Mutable state reached from protocol dispatch.
pub struct ConnectionState {
    pub(crate) id: ConnectionId,
    pub(crate) host: Arc<dyn Host>,
    pub(crate) events: SharedEventQueue,
    pub(crate) globals: Globals,
    pub(crate) devices: SeatDevices,
    pub(crate) keyboard: KeyboardTranslator,
    pub(crate) pointer: PointerBridge,
    pub(crate) touch: TouchAccumulator,
    pub(crate) focus_frame: Option<FrameId>,
    pub(crate) last_interaction: u32,
    pub(crate) surfaces: HashMap<FrameId, SurfaceState>,
    pub(crate) buffer_size: (i32, i32),
    pub(crate) seat_name: Option<String>,
}

impl std::fmt::Debug for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionState")
            .field("id", &self.id)
            .field("globals", &self.globals)
            .field("focus_frame", &self.focus_frame)
            .field("last_interaction", &self.last_interaction)
            .field("surfaces", &self.surfaces.len())
            .finish()
    }
}

impl ConnectionState {
    pub fn new(
        id: ConnectionId,
        host: Arc<dyn Host>,
        events: SharedEventQueue,
        buffer_size: (i32, i32),
    ) -> Self {
        Self {
            id,
            host,
            events,
            globals: Globals::default(),
            devices: SeatDevices::default(),
            keyboard: KeyboardTranslator::new(),
            pointer: PointerBridge::new(),
            touch: TouchAccumulator::new(),
            focus_frame: None,
            last_interaction: 0,
            surfaces: HashMap::new(),
            buffer_size,
            seat_name: None,
        }
    }

    /// Queue an event for the host and wake its wait loop.
    ///
    /// Events aimed at one of this connection's frames advance the
    /// last-interaction time; selection traffic never does.
    pub fn enqueue(&mut self, event: BufferedEvent) {
        if !event.is_selection() {
            let ours = event.frame.map_or(false, |f| self.surfaces.contains_key(&f));
            if ours && event.timestamp > self.last_interaction {
                self.last_interaction = event.timestamp;
            }
        }
        self.events.lock().push(event);
        self.host.notify_input_pending();
    }

    /// Forget per-frame back references before the frame goes away.
    pub(crate) fn forget_frame(&mut self, frame: FrameId) {
        if self.focus_frame == Some(frame) {
            self.focus_frame = None;
        }
        self.pointer.forget_frame(frame);
    }
}

/// Name used for a connection opened from the environment.
pub fn default_display_name() -> String {
    std::env::var("WAYLAND_DISPLAY").unwrap_or_else(|_| "wayland-0".to_string())
}

/// Socket path for a display name: absolute paths are used as is, anything
/// else is resolved in `$XDG_RUNTIME_DIR`.
pub fn socket_path(name: &str) -> BridgeResult<PathBuf> {
    let path = Path::new(name);
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let runtime = std::env::var_os("XDG_RUNTIME_DIR")
        .ok_or_else(|| BridgeError::connection_failed(name, "XDG_RUNTIME_DIR is not set"))?;
    Ok(PathBuf::from(runtime).join(name))
}

fn connect_socket(name: Option<&str>, label: &str) -> BridgeResult<Connection> {
    match name {
        None => Connection::connect_to_env().map_err(|e| BridgeError::connection_failed(label, e)),
        Some(name) => {
            let path = socket_path(name)?;
            let stream =
                UnixStream::connect(&path).map_err(|e| BridgeError::connection_failed(label, e))?;
            Connection::from_socket(stream).map_err(|e| BridgeError::connection_failed(label, e))
        }
    }
}

/// One open connection to a compositor.
pub struct DisplayConnection {
    pub(crate) id: ConnectionId,
    conn: Connection,
    queue: WlEventQueue<ConnectionState>,
    qh: QueueHandle<ConnectionState>,
    _registry: wl_registry::WlRegistry,
    pub(crate) state: ConnectionState,
    name: String,
    terminal: TerminalHandle,
    terminal_live: bool,
    pub(crate) kboard: KboardId,
    pub(crate) reference_count: usize,
    fd: RawFd,
}

impl std::fmt::Debug for DisplayConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DisplayConnection")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kboard", &self.kboard)
            .field("reference_count", &self.reference_count)
            .field("fd", &self.fd)
            .finish()
    }
}

impl DisplayConnection {
    /// Connect, bind the globals and check the required ones are present.
    pub fn open(
        id: ConnectionId,
        name: Option<&str>,
        host: Arc<dyn Host>,
        events: SharedEventQueue,
        kboard: KboardId,
        buffer_size: (i32, i32),
    ) -> BridgeResult<Self> {
        let label = name.map(str::to_string).unwrap_or_else(default_display_name);
        let conn = connect_socket(name, &label)?;

        let mut queue = conn.new_event_queue();
        let qh = queue.handle();
        let registry = conn.display().get_registry(&qh, ());
        let mut state = ConnectionState::new(id, host, events, buffer_size);

        queue
            .roundtrip(&mut state)
            .map_err(|e| BridgeError::connection_failed(&label, e))?;
        queue
            .dispatch_pending(&mut state)
            .map_err(|e| BridgeError::connection_failed(&label, e))?;

        if let Some(interface) = state.globals.missing_required() {
            return Err(BridgeError::MissingRequiredGlobal {
                display: label,
                interface,
            });
        }

        let fd = conn.backend().poll_fd().as_raw_fd();
        info!("🔌 connected to Wayland display {} (fd {})", label, fd);

        Ok(Self {
            id,
            conn,
            queue,
            qh,
            _registry: registry,
            state,
            name: label,
            terminal: TerminalHandle {
                id: id.0,
                kind: BackendKind::Wayland,
            },
            terminal_live: true,
            kboard,
            reference_count: 0,
            fd,
        })
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn terminal(&self) -> TerminalHandle {
        self.terminal
    }

    pub fn terminal_live(&self) -> bool {
        self.terminal_live
    }

    pub fn kboard(&self) -> KboardId {
        self.kboard
    }

    pub fn fd(&self) -> RawFd {
        self.fd
    }

    /// Number of official frames on this connection.
    pub fn reference_count(&self) -> usize {
        self.reference_count
    }

    pub fn last_interaction(&self) -> u32 {
        self.state.last_interaction
    }

    pub fn focus_frame(&self) -> Option<FrameId> {
        self.state.focus_frame
    }

    pub fn mouse_frame(&self) -> Option<FrameId> {
        self.state.pointer.mouse_frame()
    }

    pub fn globals(&self) -> &Globals {
        &self.state.globals
    }

    pub fn has_seat(&self) -> bool {
        self.state.globals.seat.is_some()
    }

    pub fn seat_name(&self) -> Option<&str> {
        self.state.seat_name.as_deref()
    }

    pub fn keyboard(&self) -> &KeyboardTranslator {
        &self.state.keyboard
    }

    pub fn dropped_touch_contacts(&self) -> u64 {
        self.state.touch.dropped_contacts()
    }

    pub fn surface(&self, frame: FrameId) -> Option<&SurfaceState> {
        self.state.surfaces.get(&frame)
    }

    pub fn surface_phase(&self, frame: FrameId) -> Option<SurfacePhase> {
        self.state.surfaces.get(&frame).map(|s| s.lifecycle.phase)
    }

    pub fn flush(&self) -> BridgeResult<()> {
        match self.conn.flush() {
            Ok(()) => Ok(()),
            // the socket buffer is full; the rest goes out on the next flush
            Err(WaylandError::Io(e)) if e.kind() == ErrorKind::WouldBlock => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn dispatch_pending(&mut self) -> BridgeResult<usize> {
        Ok(self.queue.dispatch_pending(&mut self.state)?)
    }

    pub fn roundtrip(&mut self) -> BridgeResult<usize> {
        Ok(self.queue.roundtrip(&mut self.state)?)
    }

    /// Block until at least one event has been dispatched.
    pub fn blocking_dispatch(&mut self) -> BridgeResult<usize> {
        Ok(self.queue.blocking_dispatch(&mut self.state)?)
    }

    /// Obtain a read guard, dispatching already queued events until the
    /// queue is empty enough to read.
    pub(crate) fn prepare_read(&mut self) -> BridgeResult<wayland_client::backend::ReadEventsGuard> {
        loop {
            if let Some(guard) = self.queue.prepare_read() {
                return Ok(guard);
            }
            self.dispatch_pending()?;
        }
    }

    /// Read whatever the socket has without blocking, then dispatch.
    pub fn read_nonblocking(&mut self) -> BridgeResult<usize> {
        let guard = self.prepare_read()?;
        self.flush()?;
        read_tolerant(guard)?;
        self.dispatch_pending()
    }

    /// Create and map the surface for `frame`.
    pub fn realize_surface(
        &mut self,
        frame: FrameId,
        title: &str,
        position: (i32, i32),
        size: (i32, i32),
    ) -> BridgeResult<()> {
        let mut surface = SurfaceState::create(
            &self.state.globals,
            &self.qh,
            self.id,
            frame,
            size.0,
            size.1,
            self.state.buffer_size,
        )?;
        surface.request_toplevel(&self.state.globals, &self.qh, title, position.0, position.1)?;
        let decorated =
            surface.request_decoration(self.state.globals.decoration_manager.as_ref(), &self.qh);
        self.state.surfaces.insert(frame, surface);

        if decorated {
            self.roundtrip()?;
        }

        if let Some(surface) = self.state.surfaces.get(&frame) {
            surface.request_frame_callback(&self.qh);
            if surface.lifecycle.phase == SurfacePhase::Ready {
                surface.surface().commit();
            }
        }
        self.flush()?;
        debug!("{:?} realized on {}", frame, self.name);
        Ok(())
    }

    /// Destroy the surface of `frame`, if it has one.
    pub fn destroy_surface(&mut self, frame: FrameId) -> BridgeResult<()> {
        self.state.forget_frame(frame);
        if let Some(surface) = self.state.surfaces.remove(&frame) {
            surface.destroy();
            self.flush()?;
        }
        Ok(())
    }

    /// Tear the connection down: surfaces, devices, then globals.
    pub fn close(mut self) {
        let frames: Vec<FrameId> = self.state.surfaces.keys().copied().collect();
        for &frame in &frames {
            if let Some(surface) = self.state.surfaces.remove(&frame) {
                surface.destroy();
            }
        }
        self.state.devices.release_all();

        let globals = std::mem::take(&mut self.state.globals);
        if let Some(manager) = globals.decoration_manager {
            manager.destroy();
        }
        if let Some(viewporter) = globals.viewporter {
            viewporter.destroy();
        }
        if let Some(wm_base) = globals.wm_base {
            wm_base.destroy();
        }
        if let Some(seat) = globals.seat {
            if seat.version() >= 5 {
                seat.release();
            }
        }
        if let Some(shm) = globals.shm {
            if shm.version() >= 2 {
                shm.release();
            }
        }

        if let Err(e) = self.flush() {
            warn!("flush during close of {} failed: {}", self.name, e);
        }
        self.terminal_live = false;
        self.state.host.remove_wait_descriptor(self.fd);
        // other connections share the queue; drop only this one's frames
        self.state
            .events
            .lock()
            .retain(|e| e.frame.map_or(true, |f| !frames.contains(&f)));
        info!("🔌 closed Wayland display {}", self.name);
    }
}

/// `read()` on a guard, treating an empty socket as zero events.
pub(crate) fn read_tolerant(guard: wayland_client::backend::ReadEventsGuard) -> BridgeResult<usize> {
    match guard.read() {
        Ok(n) => Ok(n),
        Err(WaylandError::Io(e)) if e.kind() == ErrorKind::WouldBlock => Ok(0),
        Err(e) => Err(e.into()),
    }
}
