//! In-process compositor for integration tests.
//!
//! Runs a `wayland-server` display on a socket inside a temporary directory
//! and advertises the globals a frame needs. Tests steer it through
//! [`TestCompositor`] and inspect what clients asked for through
//! [`Observed`].

#![allow(dead_code)]

use parking_lot::Mutex;
use std::fs::File;
use std::io::Write;
use std::os::fd::AsFd;
use std::os::unix::net::UnixListener;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tempfile::TempDir;
use wayland_protocols::wp::viewporter::server::{wp_viewport, wp_viewporter};
use wayland_protocols::xdg::decoration::zv1::server::{
    zxdg_decoration_manager_v1, zxdg_toplevel_decoration_v1,
};
use wayland_protocols::xdg::shell::server::{xdg_surface, xdg_toplevel, xdg_wm_base};
use wayland_server::{
    backend::ClientData,
    protocol::{
        wl_buffer, wl_callback, wl_compositor, wl_keyboard, wl_pointer, wl_region, wl_seat,
        wl_shm, wl_shm_pool, wl_surface, wl_touch,
    },
    Client, DataInit, Dispatch, Display, DisplayHandle, GlobalDispatch, New, Resource,
};

/// Keymap sent to every keyboard; letter `a`, Return and the usual modifiers.
pub const TEST_KEYMAP: &str = include_str!("../data/test_keymap.xkb");

/// Repeat parameters announced on seats of version 4 and up.
pub const REPEAT_RATE: i32 = 25;
pub const REPEAT_DELAY: i32 = 600;

/// Which globals the compositor advertises.
#[derive(Debug, Clone, Copy)]
pub struct Advertise {
    pub wm_base: bool,
    pub decoration: bool,
    pub seat: bool,
}

impl Default for Advertise {
    fn default() -> Self {
        Self {
            wm_base: true,
            decoration: true,
            seat: true,
        }
    }
}

/// Requests the compositor has seen, in arrival order.
#[derive(Debug, Default, Clone)]
pub struct Observed {
    pub surfaces_created: usize,
    pub titles: Vec<String>,
    pub acked_serials: Vec<u32>,
    pub decoration_requests: usize,
    pub buffers_created: usize,
    pub clients: usize,
}

enum Command {
    Configure { width: i32, height: i32 },
    Close,
    PointerMotion { x: f64, y: f64 },
    KeyboardEnter { window: usize },
    KeyboardLeave { window: usize },
    Key { time: u32, key: u32, pressed: bool },
    Modifiers { depressed: u32 },
}

struct Window {
    surface: wl_surface::WlSurface,
    xdg_surface: xdg_surface::XdgSurface,
    toplevel: Option<xdg_toplevel::XdgToplevel>,
    configured: bool,
}

struct Server {
    observed: Arc<Mutex<Observed>>,
    windows: Vec<Window>,
    pointers: Vec<wl_pointer::WlPointer>,
    keyboards: Vec<wl_keyboard::WlKeyboard>,
    serial: u32,
}

impl Server {
    fn next_serial(&mut self) -> u32 {
        self.serial = self.serial.wrapping_add(1);
        self.serial
    }

    fn run_command(&mut self, command: Command) {
        match command {
            Command::Configure { width, height } => {
                let serial = self.next_serial();
                for window in &self.windows {
                    if let Some(toplevel) = &window.toplevel {
                        toplevel.configure(width, height, vec![]);
                        window.xdg_surface.configure(serial);
                    }
                }
            }
            Command::Close => {
                for window in &self.windows {
                    if let Some(toplevel) = &window.toplevel {
                        toplevel.close();
                    }
                }
            }
            Command::PointerMotion { x, y } => {
                let serial = self.next_serial();
                let Some(surface) = self.windows.first().map(|w| w.surface.clone()) else {
                    return;
                };
                for pointer in &self.pointers {
                    pointer.enter(serial, &surface, x, y);
                    pointer.motion(1000, x, y);
                    if pointer.version() >= 5 {
                        pointer.frame();
                    }
                }
            }
            Command::KeyboardEnter { window } => {
                let serial = self.next_serial();
                let Some(surface) = self.windows.get(window).map(|w| w.surface.clone()) else {
                    return;
                };
                for keyboard in &self.keyboards {
                    keyboard.enter(serial, &surface, vec![]);
                }
            }
            Command::KeyboardLeave { window } => {
                let serial = self.next_serial();
                let Some(surface) = self.windows.get(window).map(|w| w.surface.clone()) else {
                    return;
                };
                for keyboard in &self.keyboards {
                    keyboard.leave(serial, &surface);
                }
            }
            Command::Key { time, key, pressed } => {
                let serial = self.next_serial();
                let state = if pressed {
                    wl_keyboard::KeyState::Pressed
                } else {
                    wl_keyboard::KeyState::Released
                };
                for keyboard in &self.keyboards {
                    keyboard.key(serial, time, key, state);
                }
            }
            Command::Modifiers { depressed } => {
                let serial = self.next_serial();
                for keyboard in &self.keyboards {
                    keyboard.modifiers(serial, depressed, 0, 0, 0);
                }
            }
        }
    }
}

/// Unlinked file holding [`TEST_KEYMAP`] plus the trailing NUL the protocol
/// counts in the keymap size.
fn keymap_file() -> std::io::Result<File> {
    let mut file = tempfile::tempfile()?;
    file.write_all(TEST_KEYMAP.as_bytes())?;
    file.write_all(b"\0")?;
    Ok(file)
}

struct TestClient;
impl ClientData for TestClient {}

/// Handle on a running in-process compositor.
pub struct TestCompositor {
    dir: TempDir,
    socket: PathBuf,
    observed: Arc<Mutex<Observed>>,
    commands: Sender<(Command, Sender<()>)>,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl TestCompositor {
    pub fn start() -> Self {
        Self::start_with(Advertise::default())
    }

    pub fn start_with(advertise: Advertise) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let socket = dir.path().join("wayland-test");
        let listener = UnixListener::bind(&socket).expect("bind test socket");
        listener.set_nonblocking(true).expect("nonblocking listener");

        let observed = Arc::new(Mutex::new(Observed::default()));
        let stop = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::channel();

        let thread = {
            let observed = observed.clone();
            let stop = stop.clone();
            std::thread::spawn(move || serve(listener, advertise, observed, rx, stop))
        };

        Self {
            dir,
            socket,
            observed,
            commands: tx,
            stop,
            thread: Some(thread),
        }
    }

    /// Absolute socket path, usable as a display name.
    pub fn display_name(&self) -> String {
        self.socket.to_string_lossy().into_owned()
    }

    pub fn observed(&self) -> Observed {
        self.observed.lock().clone()
    }

    /// Send `xdg_toplevel.configure` plus `xdg_surface.configure` to every
    /// toplevel and wait until they are flushed.
    pub fn configure_all(&self, width: i32, height: i32) {
        self.send(Command::Configure { width, height });
    }

    pub fn close_all(&self) {
        self.send(Command::Close);
    }

    pub fn pointer_motion(&self, x: f64, y: f64) {
        self.send(Command::PointerMotion { x, y });
    }

    /// Give keyboard focus to the `window`th toplevel, in creation order.
    pub fn keyboard_enter(&self, window: usize) {
        self.send(Command::KeyboardEnter { window });
    }

    pub fn keyboard_leave(&self, window: usize) {
        self.send(Command::KeyboardLeave { window });
    }

    /// Send one `wl_keyboard.key` with an evdev code.
    pub fn key(&self, time: u32, key: u32, pressed: bool) {
        self.send(Command::Key { time, key, pressed });
    }

    pub fn modifiers(&self, depressed: u32) {
        self.send(Command::Modifiers { depressed });
    }

    fn send(&self, command: Command) {
        let (done_tx, done_rx) = mpsc::channel();
        self.commands.send((command, done_tx)).expect("compositor thread alive");
        done_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("compositor ran command");
    }
}

impl Drop for TestCompositor {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn serve(
    listener: UnixListener,
    advertise: Advertise,
    observed: Arc<Mutex<Observed>>,
    commands: Receiver<(Command, Sender<()>)>,
    stop: Arc<AtomicBool>,
) {
    let mut display: Display<Server> = Display::new().expect("create display");
    let mut dh = display.handle();

    dh.create_global::<Server, wl_compositor::WlCompositor, _>(4, ());
    dh.create_global::<Server, wl_shm::WlShm, _>(1, ());
    dh.create_global::<Server, wp_viewporter::WpViewporter, _>(1, ());
    if advertise.wm_base {
        dh.create_global::<Server, xdg_wm_base::XdgWmBase, _>(2, ());
    }
    if advertise.decoration {
        dh.create_global::<Server, zxdg_decoration_manager_v1::ZxdgDecorationManagerV1, _>(1, ());
    }
    if advertise.seat {
        dh.create_global::<Server, wl_seat::WlSeat, _>(7, ());
    }

    let mut state = Server {
        observed,
        windows: Vec::new(),
        pointers: Vec::new(),
        keyboards: Vec::new(),
        serial: 0,
    };

    while !stop.load(Ordering::SeqCst) {
        while let Ok((stream, _)) = listener.accept() {
            if dh.insert_client(stream, Arc::new(TestClient)).is_ok() {
                state.observed.lock().clients += 1;
            }
        }

        let _ = display.dispatch_clients(&mut state);

        while let Ok((command, done)) = commands.try_recv() {
            state.run_command(command);
            let _ = display.flush_clients();
            let _ = done.send(());
        }

        let _ = display.flush_clients();
        std::thread::sleep(Duration::from_millis(2));
    }
}

macro_rules! simple_global {
    ($iface:ty) => {
        impl GlobalDispatch<$iface, ()> for Server {
            fn bind(
                _state: &mut Self,
                _handle: &DisplayHandle,
                _client: &Client,
                resource: New<$iface>,
                _global_data: &(),
                data_init: &mut DataInit<'_, Self>,
            ) {
                data_init.init(resource, ());
            }
        }
    };
}

macro_rules! inert_resource {
    ($iface:ty, $request:ty) => {
        impl Dispatch<$iface, ()> for Server {
            fn request(
                _state: &mut Self,
                _client: &Client,
                _resource: &$iface,
                _request: $request,
                _data: &(),
                _dhandle: &DisplayHandle,
                _data_init: &mut DataInit<'_, Self>,
            ) {
            }
        }
    };
}

simple_global!(wl_compositor::WlCompositor);
simple_global!(wp_viewporter::WpViewporter);
simple_global!(xdg_wm_base::XdgWmBase);
simple_global!(zxdg_decoration_manager_v1::ZxdgDecorationManagerV1);

inert_resource!(wl_region::WlRegion, wl_region::Request);
inert_resource!(wl_callback::WlCallback, wl_callback::Request);
inert_resource!(wl_buffer::WlBuffer, wl_buffer::Request);
inert_resource!(wp_viewport::WpViewport, wp_viewport::Request);
inert_resource!(wl_keyboard::WlKeyboard, wl_keyboard::Request);
inert_resource!(wl_pointer::WlPointer, wl_pointer::Request);
inert_resource!(wl_touch::WlTouch, wl_touch::Request);

impl Dispatch<wl_compositor::WlCompositor, ()> for Server {
    fn request(
        state: &mut Self,
        _client: &Client,
        _resource: &wl_compositor::WlCompositor,
        request: wl_compositor::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            wl_compositor::Request::CreateSurface { id } => {
                data_init.init(id, ());
                state.observed.lock().surfaces_created += 1;
            }
            wl_compositor::Request::CreateRegion { id } => {
                data_init.init(id, ());
            }
            _ => {}
        }
    }
}

impl Dispatch<wl_surface::WlSurface, ()> for Server {
    fn request(
        state: &mut Self,
        _client: &Client,
        resource: &wl_surface::WlSurface,
        request: wl_surface::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            wl_surface::Request::Frame { callback } => {
                data_init.init(callback, ());
            }
            wl_surface::Request::Commit => {
                // the first commit of a toplevel gets the initial configure
                let serial = state.next_serial();
                if let Some(window) = state
                    .windows
                    .iter_mut()
                    .find(|w| w.surface == *resource && w.toplevel.is_some() && !w.configured)
                {
                    if let Some(toplevel) = &window.toplevel {
                        toplevel.configure(0, 0, vec![]);
                    }
                    window.xdg_surface.configure(serial);
                    window.configured = true;
                }
            }
            _ => {}
        }
    }
}

impl GlobalDispatch<wl_shm::WlShm, ()> for Server {
    fn bind(
        _state: &mut Self,
        _handle: &DisplayHandle,
        _client: &Client,
        resource: New<wl_shm::WlShm>,
        _global_data: &(),
        data_init: &mut DataInit<'_, Self>,
    ) {
        let shm = data_init.init(resource, ());
        shm.format(wl_shm::Format::Argb8888);
        shm.format(wl_shm::Format::Xrgb8888);
    }
}

impl Dispatch<wl_shm::WlShm, ()> for Server {
    fn request(
        _state: &mut Self,
        _client: &Client,
        _resource: &wl_shm::WlShm,
        request: wl_shm::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, Self>,
    ) {
        if let wl_shm::Request::CreatePool { id, .. } = request {
            data_init.init(id, ());
        }
    }
}

impl Dispatch<wl_shm_pool::WlShmPool, ()> for Server {
    fn request(
        state: &mut Self,
        _client: &Client,
        _resource: &wl_shm_pool::WlShmPool,
        request: wl_shm_pool::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, Self>,
    ) {
        if let wl_shm_pool::Request::CreateBuffer { id, .. } = request {
            data_init.init(id, ());
            state.observed.lock().buffers_created += 1;
        }
    }
}

impl Dispatch<wp_viewporter::WpViewporter, ()> for Server {
    fn request(
        _state: &mut Self,
        _client: &Client,
        _resource: &wp_viewporter::WpViewporter,
        request: wp_viewporter::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, Self>,
    ) {
        if let wp_viewporter::Request::GetViewport { id, .. } = request {
            data_init.init(id, ());
        }
    }
}

impl Dispatch<xdg_wm_base::XdgWmBase, ()> for Server {
    fn request(
        state: &mut Self,
        _client: &Client,
        _resource: &xdg_wm_base::XdgWmBase,
        request: xdg_wm_base::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, Self>,
    ) {
        if let xdg_wm_base::Request::GetXdgSurface { id, surface } = request {
            let xdg_surface = data_init.init(id, ());
            state.windows.push(Window {
                surface,
                xdg_surface,
                toplevel: None,
                configured: false,
            });
        }
    }
}

impl Dispatch<xdg_surface::XdgSurface, ()> for Server {
    fn request(
        state: &mut Self,
        _client: &Client,
        resource: &xdg_surface::XdgSurface,
        request: xdg_surface::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            xdg_surface::Request::GetToplevel { id } => {
                let toplevel = data_init.init(id, ());
                if let Some(window) = state.windows.iter_mut().find(|w| w.xdg_surface == *resource) {
                    window.toplevel = Some(toplevel);
                }
            }
            xdg_surface::Request::AckConfigure { serial } => {
                state.observed.lock().acked_serials.push(serial);
            }
            xdg_surface::Request::Destroy => {
                state.windows.retain(|w| w.xdg_surface != *resource);
            }
            _ => {}
        }
    }
}

impl Dispatch<xdg_toplevel::XdgToplevel, ()> for Server {
    fn request(
        state: &mut Self,
        _client: &Client,
        _resource: &xdg_toplevel::XdgToplevel,
        request: xdg_toplevel::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
        if let xdg_toplevel::Request::SetTitle { title } = request {
            state.observed.lock().titles.push(title);
        }
    }
}

impl Dispatch<zxdg_decoration_manager_v1::ZxdgDecorationManagerV1, ()> for Server {
    fn request(
        state: &mut Self,
        _client: &Client,
        _resource: &zxdg_decoration_manager_v1::ZxdgDecorationManagerV1,
        request: zxdg_decoration_manager_v1::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, Self>,
    ) {
        if let zxdg_decoration_manager_v1::Request::GetToplevelDecoration { id, .. } = request {
            data_init.init(id, ());
            state.observed.lock().decoration_requests += 1;
        }
    }
}

impl Dispatch<zxdg_toplevel_decoration_v1::ZxdgToplevelDecorationV1, ()> for Server {
    fn request(
        _state: &mut Self,
        _client: &Client,
        resource: &zxdg_toplevel_decoration_v1::ZxdgToplevelDecorationV1,
        request: zxdg_toplevel_decoration_v1::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
        if let zxdg_toplevel_decoration_v1::Request::SetMode { .. } = request {
            resource.configure(zxdg_toplevel_decoration_v1::Mode::ServerSide);
        }
    }
}

impl GlobalDispatch<wl_seat::WlSeat, ()> for Server {
    fn bind(
        _state: &mut Self,
        _handle: &DisplayHandle,
        _client: &Client,
        resource: New<wl_seat::WlSeat>,
        _global_data: &(),
        data_init: &mut DataInit<'_, Self>,
    ) {
        let seat = data_init.init(resource, ());
        seat.capabilities(wl_seat::Capability::Keyboard | wl_seat::Capability::Pointer);
        if seat.version() >= 2 {
            seat.name("seat0".to_string());
        }
    }
}

impl Dispatch<wl_seat::WlSeat, ()> for Server {
    fn request(
        state: &mut Self,
        _client: &Client,
        _resource: &wl_seat::WlSeat,
        request: wl_seat::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            wl_seat::Request::GetPointer { id } => {
                let pointer = data_init.init(id, ());
                state.pointers.push(pointer);
            }
            wl_seat::Request::GetKeyboard { id } => {
                let keyboard = data_init.init(id, ());
                match keymap_file() {
                    Ok(file) => keyboard.keymap(
                        wl_keyboard::KeymapFormat::XkbV1,
                        file.as_fd(),
                        TEST_KEYMAP.len() as u32 + 1,
                    ),
                    Err(e) => eprintln!("test compositor: keymap file: {}", e),
                }
                if keyboard.version() >= 4 {
                    keyboard.repeat_info(REPEAT_RATE, REPEAT_DELAY);
                }
                state.keyboards.push(keyboard);
            }
            wl_seat::Request::GetTouch { id } => {
                data_init.init(id, ());
            }
            _ => {}
        }
    }
}
