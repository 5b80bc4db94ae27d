//! Display-name equivalence.

/// Whether two display names refer to the same logical server.
///
/// Names agree when they match up to a trailing `.screen` qualifier after
/// the colon. A `unix` host, this machine's name and its domainless form all
/// count as the empty host. Identical names always match, which covers
/// colon-less Wayland socket names such as `wayland-0`.
pub fn same_server(name1: &str, name2: &str, system_name: &str) -> bool {
    if name1 == name2 {
        return true;
    }

    let short_system = system_name.split('.').next().unwrap_or("");
    let a = strip_local_host(name1.as_bytes(), system_name.as_bytes(), short_system.as_bytes());
    let b = strip_local_host(name2.as_bytes(), system_name.as_bytes(), short_system.as_bytes());

    let mut seen_colon = false;
    let mut i = 0;
    while i < a.len() && i < b.len() && a[i] == b[i] {
        if a[i] == b':' {
            seen_colon = true;
        }
        if seen_colon && a[i] == b'.' {
            return true;
        }
        i += 1;
    }

    let at_end = |s: &[u8]| s.get(i).map_or(true, |&c| c == b'.');
    seen_colon && at_end(a) && at_end(b)
}

fn strip_local_host<'a>(mut name: &'a [u8], system: &[u8], short_system: &[u8]) -> &'a [u8] {
    if name.starts_with(b"unix:") {
        name = &name[4..];
    }
    for host in [system, short_system] {
        if name.starts_with(host) && name.get(host.len()) == Some(&b':') {
            name = &name[host.len()..];
        }
    }
    name
}
