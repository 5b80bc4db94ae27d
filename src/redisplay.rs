//! Redisplay hooks and the frame-parameter table.
//!
//! This backend paints nothing itself, so every drawing hook defaults to a
//! no-op; hosts may override individual hooks. The parameter table keeps the
//! host's canonical parameter order, with `None` for parameters this backend
//! does not handle.

use crate::error::{BridgeError, BridgeResult};
use crate::frame::{self, Frame, FrameParams, ParamContext, ParamHandler, ParamValue};
use crate::host::{FontInfo, FrameId, Host};
use log::debug;

/// Fonts tried in order when a frame names none.
pub const DEFAULT_FONT_CANDIDATES: [&str; 3] =
    ["monospace-12", "Noto Sans Mono-12", "Source Code Pro-12"];

/// A rectangle in frame pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorKind {
    Box,
    HollowBox,
    Bar,
    Hbar,
    NoCursor,
}

/// Drawing entry points the host calls during redisplay.
#[allow(unused_variables)]
pub trait RedisplayInterface {
    fn produce_glyphs(&mut self, frame: FrameId) {}

    fn write_glyphs(&mut self, frame: FrameId, row: i32, col: i32, glyphs: &[u32]) {}

    fn insert_glyphs(&mut self, frame: FrameId, row: i32, col: i32, glyphs: &[u32]) {}

    fn clear_end_of_line(&mut self, frame: FrameId, row: i32, from_x: i32) {}

    fn scroll_run(&mut self, frame: FrameId, from_y: i32, to_y: i32, height: i32) {}

    fn after_update_window_line(&mut self, frame: FrameId, row: i32) {}

    fn update_window_begin(&mut self, frame: FrameId) {}

    fn update_window_end(&mut self, frame: FrameId, cursor_on: bool, mouse_face_overwritten: bool) {}

    fn flush_display(&mut self, frame: FrameId) {}

    fn clear_window_mouse_face(&mut self, frame: FrameId) {}

    /// Left and right overhang of a glyph, in pixels.
    fn get_glyph_overhangs(&mut self, frame: FrameId, glyph: u32) -> (i32, i32) {
        (0, 0)
    }

    fn fix_overlapping_area(&mut self, frame: FrameId, row: i32, area: Rect) {}

    fn draw_fringe_bitmap(&mut self, frame: FrameId, row: i32, bitmap: u32) {}

    fn draw_glyph_string(&mut self, frame: FrameId, area: Rect, glyphs: &[u32]) {}

    fn clear_frame_area(&mut self, frame: FrameId, area: Rect) {}

    fn draw_window_cursor(&mut self, frame: FrameId, area: Rect, kind: CursorKind, on: bool) {}

    fn draw_vertical_window_border(&mut self, frame: FrameId, x: i32, y0: i32, y1: i32) {}

    fn draw_window_divider(&mut self, frame: FrameId, area: Rect) {}

    /// Pick the frame's font from `params`, falling back to the
    /// [`DEFAULT_FONT_CANDIDATES`].
    fn default_font_parameter(
        &mut self,
        host: &dyn Host,
        frame: FrameId,
        params: &FrameParams,
        candidates: &[String],
    ) -> BridgeResult<FontInfo> {
        default_font_parameter(host, frame, params, candidates)
    }
}

/// The stock hook table: paints nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullRedisplay;

impl RedisplayInterface for NullRedisplay {}

/// An explicit `font` parameter must open; otherwise the first candidate
/// that opens is used.
pub fn default_font_parameter(
    host: &dyn Host,
    frame: FrameId,
    params: &FrameParams,
    candidates: &[String],
) -> BridgeResult<FontInfo> {
    match params.get("font") {
        Some(ParamValue::Str(name)) => host.open_font(frame, name).ok_or(BridgeError::InvalidFrameFont),
        Some(ParamValue::Nil) | None => {
            let names: Vec<String> = if candidates.is_empty() {
                DEFAULT_FONT_CANDIDATES.iter().map(|s| s.to_string()).collect()
            } else {
                candidates.to_vec()
            };
            names
                .iter()
                .find_map(|name| host.open_font(frame, name))
                .ok_or(BridgeError::InvalidFrameFont)
        }
        Some(_) => Err(BridgeError::InvalidFrameFont),
    }
}

/// Frame parameters in the host's canonical order.
pub const FRAME_PARAMETERS: [(&str, Option<ParamHandler>); 51] = [
    ("auto-raise", Some(frame::set_auto_raise)),
    ("auto-lower", Some(frame::set_auto_lower)),
    ("background-color", Some(frame::set_background_color)),
    ("border-color", None),
    ("border-width", Some(frame::set_border_width)),
    ("cursor-color", None),
    ("cursor-type", None),
    ("font", Some(frame::set_font)),
    ("foreground-color", None),
    ("icon-name", None),
    ("icon-type", None),
    ("child-frame-border-width", None),
    ("internal-border-width", None),
    ("right-divider-width", Some(frame::set_right_divider_width)),
    ("bottom-divider-width", Some(frame::set_bottom_divider_width)),
    ("menu-bar-lines", None),
    ("mouse-color", None),
    ("name", None),
    ("scroll-bar-width", Some(frame::set_scroll_bar_width)),
    ("scroll-bar-height", Some(frame::set_scroll_bar_height)),
    ("title", None),
    ("unsplittable", Some(frame::set_unsplittable)),
    ("vertical-scroll-bars", Some(frame::set_vertical_scroll_bars)),
    ("horizontal-scroll-bars", Some(frame::set_horizontal_scroll_bars)),
    ("visibility", Some(frame::set_visibility)),
    ("tab-bar-lines", None),
    ("tool-bar-lines", None),
    ("scroll-bar-foreground", None),
    ("scroll-bar-background", None),
    ("screen-gamma", Some(frame::set_screen_gamma)),
    ("line-spacing", Some(frame::set_line_spacing)),
    ("left-fringe", Some(frame::set_left_fringe)),
    ("right-fringe", Some(frame::set_right_fringe)),
    ("wait-for-wm", None),
    ("fullscreen", Some(frame::set_fullscreen)),
    ("font-backend", Some(frame::set_font_backend)),
    ("alpha", None),
    ("sticky", None),
    ("tool-bar-position", None),
    ("inhibit-double-buffering", None),
    ("undecorated", None),
    ("parent-frame", None),
    ("skip-taskbar", None),
    ("no-focus-on-map", None),
    ("no-accept-focus", None),
    ("z-group", None),
    ("override-redirect", None),
    ("no-special-glyphs", Some(frame::set_no_special_glyphs)),
    ("alpha-background", None),
    ("use-frame-synchronization", None),
    ("shaded", None),
];

/// Handler registered for `name`, if the parameter is known and supported.
pub fn parameter_handler(name: &str) -> Option<ParamHandler> {
    FRAME_PARAMETERS
        .iter()
        .find(|(n, _)| *n == name)
        .and_then(|(_, handler)| *handler)
}

/// Assign `value` to `name` on `f`: run the handler, if any, then record the
/// value. A failing handler leaves the previous value recorded.
pub fn set_frame_parameter(
    f: &mut Frame,
    ctx: &ParamContext<'_>,
    name: &str,
    value: ParamValue,
) -> BridgeResult<()> {
    let old = f.param(name).cloned().unwrap_or(ParamValue::Nil);
    match parameter_handler(name) {
        Some(handler) => handler(f, ctx, &value, &old)?,
        None => debug!("{:?}: no handler for '{}'", f.id, name),
    }
    f.store_param(name, value);
    Ok(())
}

/// Take `name` from `params` (or use `default`) and apply it to `f`.
pub fn default_parameter(
    f: &mut Frame,
    ctx: &ParamContext<'_>,
    params: &mut FrameParams,
    name: &str,
    default: ParamValue,
) -> BridgeResult<()> {
    let value = params.take(name).unwrap_or(default);
    set_frame_parameter(f, ctx, name, value)
}
