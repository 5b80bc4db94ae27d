//! Minimal frame record and frame-parameter handlers.
//!
//! The host owns the full frame object; the backend keeps only what it needs
//! to realize a surface and to answer parameter changes. Parameters arrive as
//! an ordered list of `(name, value)` pairs where the first occurrence wins.

use crate::color::ColorMap;
use crate::error::{BridgeError, BridgeResult};
use crate::host::{ConnectionId, FontInfo, FrameId, Host};
use log::debug;
use std::collections::BTreeMap;

/// Scroll bar size used when none is configured, in pixels.
const DEFAULT_SCROLL_BAR_SIZE: i64 = 14;

/// Background used when the requested color does not resolve.
pub const WHITE_PIXEL: u32 = 0x00ff_ffff;

/// A frame parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Nil,
    True,
    Int(i64),
    Float(f64),
    Str(String),
    Symbol(String),
}

impl ParamValue {
    pub fn is_nil(&self) -> bool {
        matches!(self, ParamValue::Nil)
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParamValue::Int(v) => Some(*v),
            ParamValue::Float(v) => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            ParamValue::Float(v) => Some(*v),
            ParamValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            ParamValue::Symbol(s) => Some(s),
            _ => None,
        }
    }

    /// Anything but nil counts as true.
    pub fn truthy(&self) -> bool {
        !self.is_nil()
    }
}

/// Ordered parameter list; lookups consume the first matching entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameParams {
    entries: Vec<(String, ParamValue)>,
}

impl FrameParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: ParamValue) -> Self {
        self.push(name, value);
        self
    }

    pub fn push(&mut self, name: &str, value: ParamValue) {
        self.entries.push((name.to_string(), value));
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Remove every entry for `name`, returning the first value.
    pub fn take(&mut self, name: &str) -> Option<ParamValue> {
        let first = self.get(name).cloned();
        self.entries.retain(|(n, _)| n != name);
        first
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_entries(self) -> Vec<(String, ParamValue)> {
        self.entries
    }
}

/// Backend-side state of one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub id: FrameId,
    pub connection: ConnectionId,
    pub name: Option<String>,
    pub explicit_name: bool,
    pub title: Option<String>,
    pub font: Option<FontInfo>,
    pub font_backend: Option<String>,
    pub column_width: u32,
    pub line_height: u32,
    pub cols: u32,
    pub lines: u32,
    pub left: i32,
    pub top: i32,
    pub background_pixel: u32,
    pub border_width: i64,
    pub right_divider_width: i64,
    pub bottom_divider_width: i64,
    pub scroll_bar_width: Option<i64>,
    pub scroll_bar_height: Option<i64>,
    pub scroll_bar_cols: u32,
    pub scroll_bar_lines: u32,
    /// `left`, `right` or `None` for no vertical scroll bars.
    pub vertical_scroll_bars: Option<String>,
    pub horizontal_scroll_bars: bool,
    pub left_fringe: Option<i64>,
    pub right_fringe: Option<i64>,
    pub screen_gamma: Option<f64>,
    pub line_spacing: Option<i64>,
    pub fullscreen: Option<String>,
    pub auto_raise: bool,
    pub auto_lower: bool,
    pub no_split: bool,
    pub no_special_glyphs: bool,
    pub visible: bool,
    pub iconified: bool,
    pub was_invisible: bool,
    /// Registered in the host's frame list.
    pub official: bool,
    /// Needs a full redraw.
    pub garbaged: bool,
    /// Parameters not consumed during creation, and later assignments.
    pub params: BTreeMap<String, ParamValue>,
}

impl Frame {
    pub fn new(id: FrameId, connection: ConnectionId) -> Self {
        Self {
            id,
            connection,
            name: None,
            explicit_name: false,
            title: None,
            font: None,
            font_backend: None,
            column_width: 0,
            line_height: 0,
            cols: 80,
            lines: 36,
            left: 0,
            top: 0,
            background_pixel: WHITE_PIXEL,
            border_width: 0,
            right_divider_width: 0,
            bottom_divider_width: 0,
            scroll_bar_width: None,
            scroll_bar_height: None,
            scroll_bar_cols: 0,
            scroll_bar_lines: 0,
            vertical_scroll_bars: None,
            horizontal_scroll_bars: false,
            left_fringe: None,
            right_fringe: None,
            screen_gamma: None,
            line_spacing: None,
            fullscreen: None,
            auto_raise: false,
            auto_lower: false,
            no_split: false,
            no_special_glyphs: false,
            visible: false,
            iconified: false,
            was_invisible: false,
            official: false,
            garbaged: false,
            params: BTreeMap::new(),
        }
    }

    /// Pixel size of the text area.
    pub fn pixel_size(&self) -> (i32, i32) {
        (
            (self.cols * self.column_width) as i32,
            (self.lines * self.line_height) as i32,
        )
    }

    pub fn store_param(&mut self, name: &str, value: ParamValue) {
        self.params.insert(name.to_string(), value);
    }

    pub fn param(&self, name: &str) -> Option<&ParamValue> {
        self.params.get(name)
    }

    /// Install `font` and derive the cell metrics from it.
    pub fn set_font(&mut self, font: FontInfo) {
        if self.font.as_ref() == Some(&font) {
            return;
        }
        self.column_width = font.average_width.max(1);
        self.line_height = font.line_height.max(1);

        let width = self.scroll_bar_width.filter(|w| *w > 0).unwrap_or(DEFAULT_SCROLL_BAR_SIZE);
        let col = self.column_width as i64;
        self.scroll_bar_cols = ((width + col - 1) / col) as u32;

        let height = self.scroll_bar_height.filter(|h| *h > 0).unwrap_or(DEFAULT_SCROLL_BAR_SIZE);
        let line = self.line_height as i64;
        self.scroll_bar_lines = ((height + line - 1) / line) as u32;

        debug!(
            "{:?}: font '{}' ({}x{} cells)",
            self.id, font.name, self.column_width, self.line_height
        );
        self.font = Some(font);
    }

    pub fn mark_garbaged(&mut self) {
        if self.visible {
            self.garbaged = true;
        }
    }
}

/// What handlers may consult besides the frame itself.
pub struct ParamContext<'a> {
    pub host: &'a dyn Host,
    pub colors: &'a ColorMap,
}

/// A frame-parameter handler: `(frame, context, new value, old value)`.
pub type ParamHandler =
    fn(&mut Frame, &ParamContext<'_>, &ParamValue, &ParamValue) -> BridgeResult<()>;

fn invalid(name: &str, reason: &str) -> BridgeError {
    BridgeError::InvalidParameter {
        name: name.to_string(),
        reason: reason.to_string(),
    }
}

fn optional_int(name: &str, value: &ParamValue) -> BridgeResult<Option<i64>> {
    match value {
        ParamValue::Nil => Ok(None),
        other => other
            .as_int()
            .map(Some)
            .ok_or_else(|| invalid(name, "expected an integer or nil")),
    }
}

fn non_negative(name: &str, value: &ParamValue) -> BridgeResult<i64> {
    match optional_int(name, value)? {
        Some(v) if v < 0 => Err(invalid(name, "must not be negative")),
        Some(v) => Ok(v),
        None => Ok(0),
    }
}

pub fn set_auto_raise(f: &mut Frame, _: &ParamContext<'_>, value: &ParamValue, _: &ParamValue) -> BridgeResult<()> {
    f.auto_raise = value.truthy();
    Ok(())
}

pub fn set_auto_lower(f: &mut Frame, _: &ParamContext<'_>, value: &ParamValue, _: &ParamValue) -> BridgeResult<()> {
    f.auto_lower = value.truthy();
    Ok(())
}

pub fn set_background_color(
    f: &mut Frame,
    ctx: &ParamContext<'_>,
    value: &ParamValue,
    _: &ParamValue,
) -> BridgeResult<()> {
    let pixel = match value {
        ParamValue::Nil => WHITE_PIXEL,
        ParamValue::Str(name) => ctx
            .colors
            .lookup(name)
            .map(|rgb| rgb.pixel())
            .ok_or_else(|| BridgeError::UndefinedColor(name.clone()))?,
        _ => return Err(invalid("background-color", "expected a color name")),
    };
    f.background_pixel = pixel;
    f.mark_garbaged();
    Ok(())
}

pub fn set_border_width(f: &mut Frame, _: &ParamContext<'_>, value: &ParamValue, _: &ParamValue) -> BridgeResult<()> {
    f.border_width = non_negative("border-width", value)?;
    Ok(())
}

pub fn set_font(f: &mut Frame, ctx: &ParamContext<'_>, value: &ParamValue, _: &ParamValue) -> BridgeResult<()> {
    let name = value.as_str().ok_or(BridgeError::InvalidFrameFont)?;
    let font = ctx.host.open_font(f.id, name).ok_or(BridgeError::InvalidFrameFont)?;
    f.set_font(font);
    f.mark_garbaged();
    Ok(())
}

pub fn set_right_divider_width(
    f: &mut Frame,
    _: &ParamContext<'_>,
    value: &ParamValue,
    _: &ParamValue,
) -> BridgeResult<()> {
    f.right_divider_width = non_negative("right-divider-width", value)?;
    Ok(())
}

pub fn set_bottom_divider_width(
    f: &mut Frame,
    _: &ParamContext<'_>,
    value: &ParamValue,
    _: &ParamValue,
) -> BridgeResult<()> {
    f.bottom_divider_width = non_negative("bottom-divider-width", value)?;
    Ok(())
}

pub fn set_scroll_bar_width(
    f: &mut Frame,
    _: &ParamContext<'_>,
    value: &ParamValue,
    _: &ParamValue,
) -> BridgeResult<()> {
    f.scroll_bar_width = optional_int("scroll-bar-width", value)?.filter(|w| *w > 0);
    if f.column_width > 0 {
        let width = f.scroll_bar_width.unwrap_or(DEFAULT_SCROLL_BAR_SIZE);
        let col = f.column_width as i64;
        f.scroll_bar_cols = ((width + col - 1) / col) as u32;
    }
    Ok(())
}

pub fn set_scroll_bar_height(
    f: &mut Frame,
    _: &ParamContext<'_>,
    value: &ParamValue,
    _: &ParamValue,
) -> BridgeResult<()> {
    f.scroll_bar_height = optional_int("scroll-bar-height", value)?.filter(|h| *h > 0);
    if f.line_height > 0 {
        let height = f.scroll_bar_height.unwrap_or(DEFAULT_SCROLL_BAR_SIZE);
        let line = f.line_height as i64;
        f.scroll_bar_lines = ((height + line - 1) / line) as u32;
    }
    Ok(())
}

pub fn set_unsplittable(f: &mut Frame, _: &ParamContext<'_>, value: &ParamValue, _: &ParamValue) -> BridgeResult<()> {
    f.no_split = value.truthy();
    Ok(())
}

pub fn set_vertical_scroll_bars(
    f: &mut Frame,
    _: &ParamContext<'_>,
    value: &ParamValue,
    _: &ParamValue,
) -> BridgeResult<()> {
    f.vertical_scroll_bars = match value {
        ParamValue::Nil => None,
        ParamValue::Symbol(side) if side == "left" => Some("left".to_string()),
        // any other non-nil value puts them on the right
        _ => Some("right".to_string()),
    };
    Ok(())
}

pub fn set_horizontal_scroll_bars(
    f: &mut Frame,
    _: &ParamContext<'_>,
    value: &ParamValue,
    _: &ParamValue,
) -> BridgeResult<()> {
    f.horizontal_scroll_bars = value.truthy();
    Ok(())
}

pub fn set_visibility(f: &mut Frame, _: &ParamContext<'_>, value: &ParamValue, _: &ParamValue) -> BridgeResult<()> {
    match value {
        ParamValue::Nil => make_frame_visible_invisible(f, false),
        ParamValue::Symbol(s) if s == "icon" => iconify_frame(f),
        _ => make_frame_visible_invisible(f, true),
    }
    Ok(())
}

pub fn set_screen_gamma(f: &mut Frame, _: &ParamContext<'_>, value: &ParamValue, _: &ParamValue) -> BridgeResult<()> {
    f.screen_gamma = match value {
        ParamValue::Nil => None,
        other => {
            let gamma = other
                .as_float()
                .filter(|g| *g > 0.0)
                .ok_or_else(|| invalid("screen-gamma", "expected a positive number or nil"))?;
            Some(gamma)
        }
    };
    f.mark_garbaged();
    Ok(())
}

pub fn set_line_spacing(f: &mut Frame, _: &ParamContext<'_>, value: &ParamValue, _: &ParamValue) -> BridgeResult<()> {
    f.line_spacing = match optional_int("line-spacing", value)? {
        Some(v) if v < 0 => return Err(invalid("line-spacing", "must not be negative")),
        other => other,
    };
    f.mark_garbaged();
    Ok(())
}

pub fn set_left_fringe(f: &mut Frame, _: &ParamContext<'_>, value: &ParamValue, _: &ParamValue) -> BridgeResult<()> {
    f.left_fringe = optional_int("left-fringe", value)?.map(|w| w.max(0));
    Ok(())
}

pub fn set_right_fringe(f: &mut Frame, _: &ParamContext<'_>, value: &ParamValue, _: &ParamValue) -> BridgeResult<()> {
    f.right_fringe = optional_int("right-fringe", value)?.map(|w| w.max(0));
    Ok(())
}

pub fn set_fullscreen(f: &mut Frame, _: &ParamContext<'_>, value: &ParamValue, _: &ParamValue) -> BridgeResult<()> {
    f.fullscreen = match value {
        ParamValue::Nil => None,
        ParamValue::Symbol(mode)
            if matches!(mode.as_str(), "fullboth" | "fullwidth" | "fullheight" | "maximized") =>
        {
            Some(mode.clone())
        }
        _ => return Err(invalid("fullscreen", "expected fullboth, fullwidth, fullheight, maximized or nil")),
    };
    Ok(())
}

pub fn set_font_backend(f: &mut Frame, _: &ParamContext<'_>, value: &ParamValue, _: &ParamValue) -> BridgeResult<()> {
    f.font_backend = match value {
        ParamValue::Nil => None,
        ParamValue::Str(s) | ParamValue::Symbol(s) => Some(s.clone()),
        _ => return Err(invalid("font-backend", "expected a backend name")),
    };
    Ok(())
}

pub fn set_no_special_glyphs(
    f: &mut Frame,
    _: &ParamContext<'_>,
    value: &ParamValue,
    _: &ParamValue,
) -> BridgeResult<()> {
    f.no_special_glyphs = value.truthy();
    f.mark_garbaged();
    Ok(())
}

/// Terminal hook for showing or hiding a frame.
///
/// Wayland toplevels cannot be unmapped without destroying the role, so
/// only the recorded state changes.
pub fn make_frame_visible_invisible(f: &mut Frame, visible: bool) {
    f.visible = visible;
    if visible {
        f.iconified = false;
    }
}

pub fn make_frame_visible(f: &mut Frame) {
    make_frame_visible_invisible(f, true);
}

pub fn iconify_frame(f: &mut Frame) {
    f.iconified = true;
    f.visible = false;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::StandaloneHost;

    fn frame() -> Frame {
        Frame::new(FrameId(1), ConnectionId(1))
    }

    fn with_ctx<R>(f: impl FnOnce(&ParamContext<'_>) -> R) -> R {
        let host = StandaloneHost::new();
        let mut colors = ColorMap::new();
        colors.insert("red", 255, 0, 0);
        let ctx = ParamContext {
            host: &host,
            colors: &colors,
        };
        f(&ctx)
    }

    #[test]
    fn test_params_first_entry_wins() {
        let mut params = FrameParams::new()
            .with("name", ParamValue::Str("one".into()))
            .with("width", ParamValue::Int(80))
            .with("name", ParamValue::Str("two".into()));
        assert_eq!(params.take("name"), Some(ParamValue::Str("one".into())));
        assert!(!params.contains("name"));
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn test_background_color_resolves_names_and_specs() {
        with_ctx(|ctx| {
            let mut f = frame();
            set_background_color(&mut f, ctx, &ParamValue::Str("Red".into()), &ParamValue::Nil).unwrap();
            assert_eq!(f.background_pixel, 0xff0000);
            set_background_color(&mut f, ctx, &ParamValue::Str("#00ff00".into()), &ParamValue::Nil).unwrap();
            assert_eq!(f.background_pixel, 0x00ff00);
            let err = set_background_color(&mut f, ctx, &ParamValue::Str("nope".into()), &ParamValue::Nil);
            assert!(matches!(err, Err(BridgeError::UndefinedColor(_))));
            assert_eq!(f.background_pixel, 0x00ff00);
        });
    }

    #[test]
    fn test_garbaged_only_when_visible() {
        with_ctx(|ctx| {
            let mut f = frame();
            set_line_spacing(&mut f, ctx, &ParamValue::Int(2), &ParamValue::Nil).unwrap();
            assert!(!f.garbaged);
            make_frame_visible(&mut f);
            set_line_spacing(&mut f, ctx, &ParamValue::Int(3), &ParamValue::Nil).unwrap();
            assert!(f.garbaged);
            assert_eq!(f.line_spacing, Some(3));
        });
    }

    #[test]
    fn test_numeric_validation() {
        with_ctx(|ctx| {
            let mut f = frame();
            assert!(set_border_width(&mut f, ctx, &ParamValue::Int(-1), &ParamValue::Nil).is_err());
            assert!(set_border_width(&mut f, ctx, &ParamValue::Str("x".into()), &ParamValue::Nil).is_err());
            set_border_width(&mut f, ctx, &ParamValue::Int(2), &ParamValue::Nil).unwrap();
            assert_eq!(f.border_width, 2);
            assert!(set_screen_gamma(&mut f, ctx, &ParamValue::Float(0.0), &ParamValue::Nil).is_err());
            set_screen_gamma(&mut f, ctx, &ParamValue::Float(2.2), &ParamValue::Nil).unwrap();
            assert_eq!(f.screen_gamma, Some(2.2));
        });
    }

    #[test]
    fn test_font_metrics_and_scroll_bar_cells() {
        let mut f = frame();
        f.set_font(FontInfo {
            name: "mono-12".into(),
            average_width: 8,
            line_height: 16,
        });
        assert_eq!((f.column_width, f.line_height), (8, 16));
        assert_eq!(f.scroll_bar_cols, 2);
        assert_eq!(f.scroll_bar_lines, 1);
        assert_eq!(f.pixel_size(), (640, 576));
    }

    #[test]
    fn test_unknown_font_rejected() {
        with_ctx(|ctx| {
            let mut f = frame();
            let result = set_font(&mut f, ctx, &ParamValue::Int(3), &ParamValue::Nil);
            assert!(matches!(result, Err(BridgeError::InvalidFrameFont)));
        });
    }

    #[test]
    fn test_visibility_states() {
        with_ctx(|ctx| {
            let mut f = frame();
            set_visibility(&mut f, ctx, &ParamValue::Symbol("icon".into()), &ParamValue::Nil).unwrap();
            assert!(f.iconified && !f.visible);
            set_visibility(&mut f, ctx, &ParamValue::True, &ParamValue::Nil).unwrap();
            assert!(f.visible && !f.iconified);
            set_visibility(&mut f, ctx, &ParamValue::Nil, &ParamValue::True).unwrap();
            assert!(!f.visible);
        });
    }

    #[test]
    fn test_scroll_bar_and_fullscreen_symbols() {
        with_ctx(|ctx| {
            let mut f = frame();
            set_vertical_scroll_bars(&mut f, ctx, &ParamValue::Symbol("left".into()), &ParamValue::Nil).unwrap();
            assert_eq!(f.vertical_scroll_bars.as_deref(), Some("left"));
            set_vertical_scroll_bars(&mut f, ctx, &ParamValue::True, &ParamValue::Nil).unwrap();
            assert_eq!(f.vertical_scroll_bars.as_deref(), Some("right"));
            set_fullscreen(&mut f, ctx, &ParamValue::Symbol("maximized".into()), &ParamValue::Nil).unwrap();
            assert_eq!(f.fullscreen.as_deref(), Some("maximized"));
            assert!(set_fullscreen(&mut f, ctx, &ParamValue::Symbol("huge".into()), &ParamValue::Nil).is_err());
        });
    }
}
