//! Primitives the host exposes to its extension language.

use crate::color::Rgb16;
use crate::display::{ConnectionRegistry, DisplaySelector};
use crate::error::{BridgeError, BridgeResult};
use crate::frame::{self, Frame, FrameParams, ParamContext, ParamValue};
use crate::host::{BackendKind, ConnectionId, FrameId, TerminalHandle};
use crate::redisplay::{default_parameter, set_frame_parameter};
use log::{debug, error, info, warn};

/// Open a connection to `display`.
///
/// `resources` is accepted for compatibility and ignored. When
/// `must_succeed` is set a failure terminates the process.
pub fn open_connection(
    registry: &mut ConnectionRegistry,
    display: Option<&str>,
    resources: Option<&str>,
    must_succeed: bool,
) -> BridgeResult<ConnectionId> {
    if let Some(resources) = resources {
        debug!("ignoring {} bytes of resources", resources.len());
    }
    match registry.open_connection(display) {
        Ok(id) => Ok(id),
        Err(e) if must_succeed => {
            error!("{}", e);
            std::process::exit(1);
        }
        Err(e) => Err(e),
    }
}

fn check_frame(registry: &ConnectionRegistry, frame: Option<FrameId>) -> BridgeResult<()> {
    match frame {
        Some(id) if registry.frame(id).is_none() => Err(BridgeError::NoSuchFrame(id.0)),
        _ => Ok(()),
    }
}

pub fn color_defined_p(
    registry: &ConnectionRegistry,
    name: &str,
    frame: Option<FrameId>,
) -> BridgeResult<bool> {
    check_frame(registry, frame)?;
    Ok(registry.colors().lookup(name).is_some())
}

/// 16-bit red, green and blue of `name`, or `None` when undefined.
pub fn color_values(
    registry: &ConnectionRegistry,
    name: &str,
    frame: Option<FrameId>,
) -> BridgeResult<Option<Rgb16>> {
    check_frame(registry, frame)?;
    Ok(registry.colors().lookup(name))
}

pub fn display_color_p(
    registry: &mut ConnectionRegistry,
    selector: DisplaySelector<'_>,
) -> BridgeResult<bool> {
    registry.lookup(selector)?;
    Ok(true)
}

pub fn display_grayscale_p(_selector: DisplaySelector<'_>) -> bool {
    false
}

/// Number of color cells, capped at 2^24.
pub fn display_color_cells(
    registry: &mut ConnectionRegistry,
    selector: DisplaySelector<'_>,
) -> BridgeResult<u32> {
    registry.lookup(selector)?;
    Ok(1u32 << registry.options().planes.min(24))
}

/// Tooltips are not supported; there is never one to hide.
pub fn hide_tip() -> bool {
    false
}

/// Resolve the `terminal` parameter, else `display`, to a connection.
fn frame_connection(
    registry: &mut ConnectionRegistry,
    params: &mut FrameParams,
) -> BridgeResult<ConnectionId> {
    match params.take("terminal") {
        Some(ParamValue::Int(id)) if id >= 0 => {
            return registry.lookup(DisplaySelector::Terminal(TerminalHandle {
                id: id as u64,
                kind: BackendKind::Wayland,
            }))
        }
        Some(ParamValue::Nil) | None => {}
        Some(_) => return Err(BridgeError::NoSuchDisplay("invalid terminal parameter".into())),
    }
    match params.take("display") {
        Some(ParamValue::Str(name)) => registry.lookup(DisplaySelector::Name(&name)),
        Some(ParamValue::Nil) | None => registry.lookup(DisplaySelector::Default),
        Some(_) => Err(BridgeError::NoSuchDisplay("invalid display parameter".into())),
    }
}

/// Create and realize a frame from `params`.
///
/// The frame becomes official only once its surface exists; any failure
/// before that discards it.
pub fn create_frame(
    registry: &mut ConnectionRegistry,
    mut params: FrameParams,
) -> BridgeResult<FrameId> {
    let connection = frame_connection(registry, &mut params)?;
    let live = registry
        .connection(connection)
        .map_or(false, |c| c.terminal_live());
    if !live {
        return Err(BridgeError::TerminalNotLive);
    }

    let name = match params.take("name") {
        Some(ParamValue::Str(name)) => Some(name),
        Some(ParamValue::Nil) | None => None,
        Some(_) => return Err(BridgeError::InvalidFrameName),
    };

    let id = registry.allocate_frame_id();
    let mut f = Frame::new(id, connection);
    f.explicit_name = name.is_some();
    f.name = name;

    let host = registry.host.clone();
    let ctx = ParamContext {
        host: host.as_ref(),
        colors: &registry.colors,
    };

    default_parameter(&mut f, &ctx, &mut params, "font-backend", ParamValue::Nil)?;

    let font = registry.redisplay.default_font_parameter(
        host.as_ref(),
        id,
        &params,
        &registry.options.font_candidates,
    )?;
    params.take("font");
    f.store_param("font", ParamValue::Str(font.name.clone()));
    f.set_font(font);

    default_parameter(&mut f, &ctx, &mut params, "border-width", ParamValue::Int(0))?;
    default_parameter(&mut f, &ctx, &mut params, "right-divider-width", ParamValue::Int(0))?;
    default_parameter(&mut f, &ctx, &mut params, "bottom-divider-width", ParamValue::Int(0))?;
    default_parameter(
        &mut f,
        &ctx,
        &mut params,
        "vertical-scroll-bars",
        ParamValue::Symbol("right".into()),
    )?;
    default_parameter(&mut f, &ctx, &mut params, "horizontal-scroll-bars", ParamValue::Nil)?;

    // without an rgb.txt "white" has no definition
    let white = if ctx.colors.lookup("white").is_some() { "white" } else { "#ffffff" };
    default_parameter(
        &mut f,
        &ctx,
        &mut params,
        "background-color",
        ParamValue::Str(white.into()),
    )?;
    for name in ["no-special-glyphs", "screen-gamma", "line-spacing", "left-fringe", "right-fringe"] {
        default_parameter(&mut f, &ctx, &mut params, name, ParamValue::Nil)?;
    }

    let width = params.take("width");
    let height = params.take("height");
    f.cols = width
        .as_ref()
        .and_then(ParamValue::as_int)
        .filter(|w| *w > 0)
        .map_or(registry.options.default_cols, |w| w as u32);
    f.lines = height
        .as_ref()
        .and_then(ParamValue::as_int)
        .filter(|h| *h > 0)
        .map_or(registry.options.default_lines, |h| h as u32);
    if let Some(left) = params.take("left").as_ref().and_then(ParamValue::as_int) {
        f.left = left as i32;
    }
    if let Some(top) = params.take("top").as_ref().and_then(ParamValue::as_int) {
        f.top = top as i32;
    }

    f.title = match params.take("title") {
        Some(ParamValue::Str(title)) => Some(title),
        _ => None,
    };
    default_parameter(&mut f, &ctx, &mut params, "unsplittable", ParamValue::Nil)?;

    let title = f
        .title
        .clone()
        .or_else(|| f.name.clone())
        .unwrap_or_else(|| registry.options.default_title.clone());
    let size = f.pixel_size();

    {
        let conn = registry
            .connections
            .iter_mut()
            .find(|c| c.id == connection)
            .ok_or_else(|| BridgeError::NoSuchDisplay(format!("connection {}", connection.0)))?;
        if let Err(e) = conn.realize_surface(id, &title, (f.left, f.top), size) {
            // the frame never became official; drop what was created
            if let Err(flush) = conn.destroy_surface(id) {
                warn!("cleanup of {:?} on {} failed: {}", id, conn.name(), flush);
            }
            return Err(e);
        }
        conn.reference_count += 1;
    }
    f.official = true;

    let late = ["auto-raise", "auto-lower", "scroll-bar-width", "scroll-bar-height", "fullscreen"]
        .into_iter()
        .try_for_each(|name| default_parameter(&mut f, &ctx, &mut params, name, ParamValue::Nil));
    if let Err(e) = late {
        // not in the live list yet, so undo the realization
        if let Some(conn) = registry.connections.iter_mut().find(|c| c.id == connection) {
            if let Err(flush) = conn.destroy_surface(id) {
                warn!("cleanup of {:?} on {} failed: {}", id, conn.name(), flush);
            }
            conn.reference_count = conn.reference_count.saturating_sub(1);
        }
        return Err(e);
    }

    let visibility = params.take("visibility");
    match &visibility {
        Some(ParamValue::Symbol(s)) if s == "icon" => {
            f.was_invisible = true;
            frame::iconify_frame(&mut f);
        }
        Some(ParamValue::Nil) => f.was_invisible = true,
        _ => frame::make_frame_visible(&mut f),
    }
    f.was_invisible = f.was_invisible && (width.is_some() || height.is_some());
    f.store_param("visibility", visibility.unwrap_or(ParamValue::True));

    for (name, value) in params.into_entries() {
        f.params.entry(name).or_insert(value);
    }

    info!(
        "🪟 {:?} created on {:?}: '{}' {}x{} cells",
        id, connection, title, f.cols, f.lines
    );
    registry.insert_frame(f);
    Ok(id)
}

pub fn delete_frame(registry: &mut ConnectionRegistry, frame: FrameId) -> BridgeResult<()> {
    registry.delete_frame(frame)
}

/// Assign one parameter on a live frame.
pub fn modify_frame_parameter(
    registry: &mut ConnectionRegistry,
    frame: FrameId,
    name: &str,
    value: ParamValue,
) -> BridgeResult<()> {
    let host = registry.host.clone();
    let ctx = ParamContext {
        host: host.as_ref(),
        colors: &registry.colors,
    };
    let f = registry
        .frames
        .get_mut(&frame)
        .ok_or(BridgeError::NoSuchFrame(frame.0))?;
    set_frame_parameter(f, &ctx, name, value)
}

pub fn make_frame_visible_invisible(
    registry: &mut ConnectionRegistry,
    frame: FrameId,
    visible: bool,
) -> BridgeResult<()> {
    let f = registry
        .frame_mut(frame)
        .ok_or(BridgeError::NoSuchFrame(frame.0))?;
    frame::make_frame_visible_invisible(f, visible);
    Ok(())
}

pub fn iconify_frame(registry: &mut ConnectionRegistry, frame: FrameId) -> BridgeResult<()> {
    let f = registry
        .frame_mut(frame)
        .ok_or(BridgeError::NoSuchFrame(frame.0))?;
    frame::iconify_frame(f);
    Ok(())
}
