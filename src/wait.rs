//! Blocking waits that keep the Wayland socket serviced.
//!
//! Before blocking, queued events are dispatched until a read can be
//! prepared and outgoing requests are flushed; after waking, whatever the
//! compositor sent is read and dispatched and the socket flushed again.

use crate::display::{read_tolerant, DisplayConnection};
use crate::error::BridgeResult;
use std::io;
use std::os::fd::RawFd;
use std::time::Duration;

/// Run `wait` inside the prepare-read / read cycle of `connection`.
///
/// Without a connection `wait` simply runs.
pub fn wait_with<T>(
    connection: Option<&mut DisplayConnection>,
    wait: impl FnOnce() -> T,
) -> BridgeResult<T> {
    let Some(connection) = connection else {
        return Ok(wait());
    };

    let guard = connection.prepare_read()?;
    connection.flush()?;

    let result = wait();

    read_tolerant(guard)?;
    connection.dispatch_pending()?;
    connection.flush()?;
    Ok(result)
}

/// Descriptors `pselect` reported readable, or an error such as `EINTR`.
pub fn pselect_readable(
    fds: &[RawFd],
    timeout: Option<Duration>,
    sigmask: Option<&libc::sigset_t>,
) -> io::Result<Vec<RawFd>> {
    let mut set: libc::fd_set = unsafe { std::mem::zeroed() };
    unsafe { libc::FD_ZERO(&mut set) };

    let mut nfds = 0;
    for &fd in fds {
        if fd < 0 || fd as usize >= libc::FD_SETSIZE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("descriptor {} out of select range", fd),
            ));
        }
        unsafe { libc::FD_SET(fd, &mut set) };
        nfds = nfds.max(fd + 1);
    }

    let ts = timeout.map(|d| libc::timespec {
        tv_sec: d.as_secs() as libc::time_t,
        tv_nsec: d.subsec_nanos() as libc::c_long,
    });
    let ts_ptr = ts
        .as_ref()
        .map_or(std::ptr::null(), |t| t as *const libc::timespec);
    let mask_ptr = sigmask.map_or(std::ptr::null(), |m| m as *const libc::sigset_t);

    let rc = unsafe {
        libc::pselect(
            nfds,
            &mut set,
            std::ptr::null_mut(),
            std::ptr::null_mut(),
            ts_ptr,
            mask_ptr,
        )
    };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }

    Ok(fds
        .iter()
        .copied()
        .filter(|&fd| unsafe { libc::FD_ISSET(fd, &set) })
        .collect())
}
