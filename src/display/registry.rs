//! The set of open display connections and the frames realized on them.

use super::name::same_server;
use super::{default_display_name, DisplayConnection};
use crate::color::ColorMap;
use crate::error::{BridgeError, BridgeResult};
use crate::event_queue::{self, BufferedEvent, SharedEventQueue};
use crate::frame::Frame;
use crate::host::{BackendKind, ConnectionId, FrameId, Host, KboardId, TerminalHandle};
use crate::redisplay::{NullRedisplay, RedisplayInterface, DEFAULT_FONT_CANDIDATES};
use crate::wait;
use log::{debug, info, warn};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

/// How a caller names the display it wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplaySelector<'a> {
    /// The selected frame's display, else the most recently opened one.
    Default,
    Terminal(TerminalHandle),
    /// A display name; opens a new connection when none matches.
    Name(&'a str),
    Frame(FrameId),
}

/// Settings shared by every connection in a registry.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistryOptions {
    /// Size of the placeholder buffer attached to each surface.
    pub buffer_size: (i32, i32),
    /// Reported bit planes per pixel.
    pub planes: u32,
    /// X11-style `rgb.txt` for named colors.
    pub color_file: Option<PathBuf>,
    pub default_title: String,
    pub default_cols: u32,
    pub default_lines: u32,
    pub font_candidates: Vec<String>,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            buffer_size: (640, 480),
            planes: 16,
            color_file: None,
            default_title: "wlframe".to_string(),
            default_cols: 80,
            default_lines: 36,
            font_candidates: DEFAULT_FONT_CANDIDATES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Owns every open [`DisplayConnection`], most recent first.
pub struct ConnectionRegistry {
    pub(crate) host: Arc<dyn Host>,
    pub(crate) events: SharedEventQueue,
    pub(crate) connections: Vec<DisplayConnection>,
    pub(crate) frames: BTreeMap<FrameId, Frame>,
    pub(crate) options: RegistryOptions,
    pub(crate) colors: ColorMap,
    pub(crate) redisplay: Box<dyn RedisplayInterface + Send>,
    kboards: HashMap<KboardId, usize>,
    next_connection: u64,
    next_kboard: u64,
    next_frame: u64,
}

impl std::fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("connections", &self.connections)
            .field("frames", &self.frames.keys().collect::<Vec<_>>())
            .field("options", &self.options)
            .finish()
    }
}

impl ConnectionRegistry {
    pub fn new(host: Arc<dyn Host>, options: RegistryOptions) -> Self {
        let colors = match options.color_file.as_ref() {
            Some(path) => ColorMap::load_or_empty(path),
            None => ColorMap::new(),
        };
        debug!("{} named colors loaded", colors.len());
        Self {
            host,
            events: event_queue::shared_queue(),
            connections: Vec::new(),
            frames: BTreeMap::new(),
            options,
            colors,
            redisplay: Box::new(NullRedisplay),
            kboards: HashMap::new(),
            next_connection: 1,
            next_kboard: 1,
            next_frame: 1,
        }
    }

    /// Replace the redisplay hooks used for new frames.
    pub fn set_redisplay(&mut self, redisplay: Box<dyn RedisplayInterface + Send>) {
        self.redisplay = redisplay;
    }

    pub fn host(&self) -> &Arc<dyn Host> {
        &self.host
    }

    pub fn events(&self) -> &SharedEventQueue {
        &self.events
    }

    pub fn options(&self) -> &RegistryOptions {
        &self.options
    }

    pub fn colors(&self) -> &ColorMap {
        &self.colors
    }

    pub fn set_colors(&mut self, colors: ColorMap) {
        self.colors = colors;
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn connections(&self) -> impl Iterator<Item = &DisplayConnection> {
        self.connections.iter()
    }

    /// The most recently opened connection.
    pub fn head(&self) -> Option<&DisplayConnection> {
        self.connections.first()
    }

    pub fn connection(&self, id: ConnectionId) -> Option<&DisplayConnection> {
        self.connections.iter().find(|c| c.id == id)
    }

    pub fn connection_mut(&mut self, id: ConnectionId) -> Option<&mut DisplayConnection> {
        self.connections.iter_mut().find(|c| c.id == id)
    }

    /// Number of terminals sharing `kboard`.
    pub fn kboard_references(&self, kboard: KboardId) -> usize {
        self.kboards.get(&kboard).copied().unwrap_or(0)
    }

    fn find_same_server(&self, name: &str) -> Option<&DisplayConnection> {
        let system = self.host.system_name();
        self.connections
            .iter()
            .find(|c| same_server(c.name(), name, &system))
    }

    /// Connect to `name` (or the environment's display) and put the new
    /// connection at the head of the registry.
    pub fn open_connection(&mut self, name: Option<&str>) -> BridgeResult<ConnectionId> {
        let label = name.map(str::to_string).unwrap_or_else(default_display_name);
        let shared = self.find_same_server(&label).map(|c| c.kboard);
        let kboard = shared.unwrap_or(KboardId(self.next_kboard));

        let id = ConnectionId(self.next_connection);
        let connection = DisplayConnection::open(
            id,
            name,
            self.host.clone(),
            self.events.clone(),
            kboard,
            self.options.buffer_size,
        )?;
        self.next_connection += 1;
        if shared.is_none() {
            self.next_kboard += 1;
        }
        *self.kboards.entry(kboard).or_insert(0) += 1;

        self.host.add_wait_descriptor(connection.fd());
        info!(
            "display {} opened as {:?} ({:?}{})",
            connection.name(),
            id,
            kboard,
            if shared.is_some() { ", shared" } else { "" }
        );
        self.connections.insert(0, connection);
        Ok(id)
    }

    /// Resolve `selector` to an open connection.
    pub fn lookup(&mut self, selector: DisplaySelector<'_>) -> BridgeResult<ConnectionId> {
        match selector {
            DisplaySelector::Default => {
                let selected = self
                    .host
                    .selected_frame()
                    .and_then(|f| self.frames.get(&f))
                    .map(|f| f.connection)
                    .filter(|id| self.connection(*id).is_some());
                selected
                    .or_else(|| self.head().map(|c| c.id))
                    .ok_or_else(|| {
                        BridgeError::NoSuchDisplay(
                            "Wayland windows are not in use or not initialized".into(),
                        )
                    })
            }
            DisplaySelector::Terminal(terminal) => {
                if terminal.kind != BackendKind::Wayland {
                    return Err(BridgeError::NoSuchDisplay(format!(
                        "Terminal {} is not a Wayland display",
                        terminal.id
                    )));
                }
                self.connections
                    .iter()
                    .find(|c| c.terminal() == terminal && c.terminal_live())
                    .map(|c| c.id)
                    .ok_or_else(|| BridgeError::NoSuchDisplay(format!("terminal {}", terminal.id)))
            }
            DisplaySelector::Name(name) => match self.find_same_server(name) {
                Some(connection) => Ok(connection.id),
                None => self.open_connection(Some(name)),
            },
            DisplaySelector::Frame(frame) => self
                .frames
                .get(&frame)
                .map(|f| f.connection)
                .filter(|id| self.connection(*id).is_some())
                .ok_or_else(|| BridgeError::NoSuchDisplay(format!("frame {}", frame.0))),
        }
    }

    /// Close one connection, deleting every frame on it.
    pub fn close_connection(&mut self, id: ConnectionId) -> BridgeResult<()> {
        let index = self
            .connections
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| BridgeError::NoSuchDisplay(format!("connection {}", id.0)))?;
        let connection = self.connections.remove(index);

        self.frames.retain(|_, f| f.connection != id);

        let kboard = connection.kboard;
        if let Some(count) = self.kboards.get_mut(&kboard) {
            *count -= 1;
            if *count == 0 {
                self.kboards.remove(&kboard);
                debug!("{:?} released", kboard);
            }
        }
        connection.close();
        Ok(())
    }

    /// Close every connection.
    pub fn shutdown(&mut self) {
        let ids: Vec<ConnectionId> = self.connections.iter().map(|c| c.id).collect();
        for id in ids {
            if let Err(e) = self.close_connection(id) {
                warn!("closing {:?} failed: {}", id, e);
            }
        }
    }

    /// Hand queued events to `sink`; when none are queued, read and dispatch
    /// the terminal's connection once and try again.
    pub fn read_socket(
        &mut self,
        terminal: TerminalHandle,
        mut sink: impl FnMut(BufferedEvent),
    ) -> BridgeResult<usize> {
        let count = event_queue::drain(&self.events, &mut sink);
        if count > 0 {
            return Ok(count);
        }

        let id = self.lookup(DisplaySelector::Terminal(terminal))?;
        if let Some(connection) = self.connection_mut(id) {
            connection.read_nonblocking()?;
        }
        Ok(event_queue::drain(&self.events, &mut sink))
    }

    /// Run a blocking wait around the head connection's read cycle.
    pub fn wait<T>(&mut self, wait: impl FnOnce() -> T) -> BridgeResult<T> {
        wait::wait_with(self.connections.first_mut(), wait)
    }

    pub(crate) fn allocate_frame_id(&mut self) -> FrameId {
        let id = FrameId(self.next_frame);
        self.next_frame += 1;
        id
    }

    pub(crate) fn insert_frame(&mut self, frame: Frame) {
        self.frames.insert(frame.id, frame);
    }

    pub fn frame(&self, id: FrameId) -> Option<&Frame> {
        self.frames.get(&id)
    }

    pub fn frame_mut(&mut self, id: FrameId) -> Option<&mut Frame> {
        self.frames.get_mut(&id)
    }

    pub fn frames(&self) -> impl Iterator<Item = &Frame> {
        self.frames.values()
    }

    /// Delete a frame: destroy its surface and drop its reference on the
    /// connection. The connection stays open at zero references.
    pub fn delete_frame(&mut self, id: FrameId) -> BridgeResult<()> {
        let frame = self
            .frames
            .remove(&id)
            .ok_or(BridgeError::NoSuchFrame(id.0))?;
        if let Some(connection) = self.connection_mut(frame.connection) {
            connection.destroy_surface(id)?;
            if frame.official {
                connection.reference_count = connection.reference_count.saturating_sub(1);
            }
            debug!(
                "{:?} deleted, {} has {} frame(s) left",
                id,
                connection.name(),
                connection.reference_count
            );
        }
        Ok(())
    }
}

impl Drop for ConnectionRegistry {
    fn drop(&mut self) {
        self.shutdown();
    }
}
