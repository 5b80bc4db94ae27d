//! Shared-memory buffers for frame surfaces.
//!
//! Drawing is not implemented yet; every paint attaches a checkerboard so the
//! compositor maps the toplevel.

use crate::display::ConnectionState;
use log::debug;
use memmap2::MmapOptions;
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::ffi::CString;
use std::fs::File;
use std::io;
use std::os::fd::{AsFd, FromRawFd, OwnedFd};
use wayland_client::protocol::{wl_buffer, wl_shm, wl_shm_pool};
use wayland_client::{Connection, Dispatch, QueueHandle};

const DARK: u32 = 0xFF66_6666;
const LIGHT: u32 = 0xFFEE_EEEE;

/// Checkerboard pixel at `(x, y)`: 8-pixel columns offset every 8 rows.
pub fn checker_pixel(x: u32, y: u32) -> u32 {
    if (x + y / 8 * 8) % 16 < 8 {
        DARK
    } else {
        LIGHT
    }
}

/// Fill an XRGB8888 pixel buffer of `width` pixels per row.
pub fn fill_checkerboard(pixels: &mut [u8], width: u32) {
    for (i, px) in pixels.chunks_exact_mut(4).enumerate() {
        let i = i as u32;
        px.copy_from_slice(&checker_pixel(i % width, i / width).to_ne_bytes());
    }
}

#[cfg(target_os = "linux")]
fn memfd() -> io::Result<OwnedFd> {
    let name = CString::new("wlframe-shm").map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    let fd = unsafe { libc::memfd_create(name.as_ptr(), libc::MFD_CLOEXEC) };
    if fd < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(unsafe { OwnedFd::from_raw_fd(fd) })
}

#[cfg(not(target_os = "linux"))]
fn memfd() -> io::Result<OwnedFd> {
    Err(io::Error::from(io::ErrorKind::Unsupported))
}

/// POSIX shm object with a random name, unlinked straight away.
fn shm_object() -> io::Result<OwnedFd> {
    let mut last = io::Error::from(io::ErrorKind::AlreadyExists);
    for _ in 0..100 {
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(6)
            .map(char::from)
            .collect();
        let name = CString::new(format!("/wl_shm-{}", suffix))
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let fd = unsafe {
            libc::shm_open(
                name.as_ptr(),
                libc::O_RDWR | libc::O_CREAT | libc::O_EXCL,
                0o600,
            )
        };
        if fd >= 0 {
            unsafe { libc::shm_unlink(name.as_ptr()) };
            return Ok(unsafe { OwnedFd::from_raw_fd(fd) });
        }
        last = io::Error::last_os_error();
        if last.kind() != io::ErrorKind::AlreadyExists {
            break;
        }
    }
    Err(last)
}

/// Anonymous file of `size` bytes suitable for `wl_shm.create_pool`.
pub fn allocate_shm_file(size: u64) -> io::Result<File> {
    let fd = memfd().or_else(|_| shm_object())?;
    let file = File::from(fd);
    file.set_len(size)?;
    Ok(file)
}

/// Create a `width`x`height` checkerboard buffer, or `None` when shared
/// memory is unavailable.
pub fn checkerboard_buffer(
    shm: &wl_shm::WlShm,
    qh: &QueueHandle<ConnectionState>,
    width: i32,
    height: i32,
) -> Option<wl_buffer::WlBuffer> {
    if width <= 0 || height <= 0 {
        return None;
    }
    let stride = width * 4;
    let size = stride.checked_mul(height)?;

    let file = match allocate_shm_file(size as u64) {
        Ok(file) => file,
        Err(e) => {
            debug!("shm allocation of {} bytes failed: {}", size, e);
            return None;
        }
    };
    let mut map = match unsafe { MmapOptions::new().len(size as usize).map_mut(&file) } {
        Ok(map) => map,
        Err(e) => {
            debug!("shm mapping failed: {}", e);
            return None;
        }
    };
    fill_checkerboard(&mut map, width as u32);
    drop(map);

    let pool = shm.create_pool(file.as_fd(), size, qh, ());
    let buffer = pool.create_buffer(0, width, height, stride, wl_shm::Format::Xrgb8888, qh, ());
    pool.destroy();
    Some(buffer)
}

impl Dispatch<wl_buffer::WlBuffer, ()> for ConnectionState {
    fn event(
        _state: &mut Self,
        buffer: &wl_buffer::WlBuffer,
        event: wl_buffer::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        if let wl_buffer::Event::Release = event {
            buffer.destroy();
        }
    }
}

impl Dispatch<wl_shm_pool::WlShmPool, ()> for ConnectionState {
    fn event(
        _: &mut Self,
        _: &wl_shm_pool::WlShmPool,
        _: wl_shm_pool::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
    }
}
