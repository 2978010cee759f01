//! Seam to the vector-graphics content library.
//!
//! The content model (paths, images, text shaping, markup parsing) is an
//! external collaborator. These traits capture exactly what the controls
//! consume from it: a viewport, asynchronous self-rasterization into a
//! [`RasterSurface`], interactive-region reporting, and - for flowing text -
//! natural-content-size queries.

use std::rc::Rc;

use crate::color::Color;
use crate::geometry::{NaturalSize, Point, Rect, Viewport};
use crate::observable::Observable;
use crate::promise::Promise;
use crate::surface::RasterSurface;

/// A declarative tree of drawable entities with a bounding viewport
pub trait VectorScene {
    fn viewport(&self) -> Viewport;

    fn set_viewport(&self, viewport: Viewport);

    /// Asynchronously rasterize into `surface`. Content may depend on
    /// not-yet-loaded assets (fonts, images), so completion can be deferred
    /// arbitrarily.
    fn render_into(&self, surface: &RasterSurface) -> Promise<()>;

    /// Whether the scene contains dynamic (interactive) sub-regions
    fn is_interactive(&self) -> bool {
        false
    }

    /// The interactive sub-regions of the last rasterization, in scene units
    fn dynamic_regions(&self) -> Vec<DynamicRegion> {
        Vec::new()
    }

    /// Push pointer-hover state for a region into the scene (it may restyle
    /// the region and ask for a redraw)
    fn set_region_hover(&self, region_id: u64, hovered: bool) {
        let _ = (region_id, hovered);
    }

    /// Fired when the scene restyled itself and its owner should repaint
    fn on_needs_redraw(&self) -> Option<Observable<()>> {
        None
    }
}

/// A scene wrapping a single flowing-text entity
pub trait TextScene: VectorScene {
    /// Natural (unclipped) bounding box of the laid-out text
    fn content_bounding_box(&self) -> Promise<NaturalSize>;

    fn content_width(&self) -> Promise<f32>;

    fn content_height(&self) -> Promise<f32>;

    /// Move/resize the text entity itself (the scene viewport is set
    /// separately through [`VectorScene::set_viewport`])
    fn set_text_area(&self, area: Viewport);
}

/// Factory for text scenes; implemented by the vector library adapter
pub trait TextEngine {
    fn create_text_scene(&self, params: &TextSceneParams) -> Rc<dyn TextScene>;
}

/// An interactive sub-region of a rasterized scene
#[derive(Clone, Debug, PartialEq)]
pub struct DynamicRegion {
    pub id: u64,
    /// Bounds in scene units
    pub bounds: Rect,
    pub action: RegionAction,
}

/// What pointing at a dynamic region means
#[derive(Clone, Debug, PartialEq)]
pub enum RegionAction {
    /// A link with its target
    Link(String),
    /// An on-demand annotation, carrying its markup payload
    Infotip(String),
}

/// A region interaction bubbled out of a control
#[derive(Clone, Debug, PartialEq)]
pub struct RegionEvent {
    pub region_id: u64,
    pub action: RegionAction,
    /// Region bounds in scene units
    pub bounds: Rect,
    /// Pointer position in screen pixels
    pub position: Point,
}

/// Content of a flowing-text entity - exactly one representation at a time
#[derive(Clone, Debug, PartialEq)]
pub enum TextSource {
    /// Plain text
    Plain(String),
    /// Inline-markup text
    Markup(String),
    /// Pre-structured spans
    Structured(Vec<TextSpan>),
}

/// One span of structured text with an optional attribute override
#[derive(Clone, Debug, PartialEq)]
pub struct TextSpan {
    pub text: String,
    pub attr: Option<TextAttributes>,
}

impl TextSpan {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            attr: None,
        }
    }

    pub fn styled(text: impl Into<String>, attr: TextAttributes) -> Self {
        Self {
            text: text.into(),
            attr: Some(attr),
        }
    }
}

/// Typographic attributes. Unset fields inherit from the enclosing context;
/// [`apply`](Self::apply) folds a patch over a base, so attribute updates
/// merge instead of replacing wholesale.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TextAttributes {
    pub font_size: Option<f32>,
    pub color: Option<Color>,
    pub outline: Option<bool>,
    pub outline_color: Option<Color>,
    pub outline_width: Option<f32>,
    pub underline: Option<bool>,
    pub line_through: Option<bool>,
    pub line_color: Option<Color>,
    pub frame: Option<bool>,
    pub frame_color: Option<Color>,
    pub frame_corner_radius: Option<f32>,
    pub frame_outline_width: Option<f32>,
    pub frame_outline_color: Option<Color>,
}

impl TextAttributes {
    /// Fold every set field of `patch` over `self`
    pub fn apply(&mut self, patch: &TextAttributes) {
        macro_rules! fold {
            ($($field:ident),* $(,)?) => {
                $( if patch.$field.is_some() { self.$field = patch.$field; } )*
            };
        }
        fold!(
            font_size,
            color,
            outline,
            outline_color,
            outline_width,
            underline,
            line_through,
            line_color,
            frame,
            frame_color,
            frame_corner_radius,
            frame_outline_width,
            frame_outline_color,
        );
    }
}

/// Coloring of the dynamic per-feature text styles (links, infotips)
#[derive(Clone, Debug, PartialEq)]
pub struct DynamicTextStyles {
    pub link_underline: bool,
    pub link_color: Color,
    pub link_hover_color: Color,
    pub link_press_color: Color,
    pub infotip_underline: bool,
    pub infotip_color: Color,
    pub infotip_hover_color: Color,
}

impl Default for DynamicTextStyles {
    fn default() -> Self {
        Self {
            link_underline: true,
            link_color: Color::srgb(0xcc, 0x88, 0x88),
            link_hover_color: Color::srgb(0xaa, 0xaa, 0xee),
            link_press_color: Color::srgb(0xbb, 0xbb, 0xff),
            infotip_underline: true,
            infotip_color: Color::srgb(0x44, 0x44, 0x88),
            infotip_hover_color: Color::srgb(0x44, 0x88, 0x88),
        }
    }
}

/// Text wrapping behavior
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TextWrapping {
    None,
    #[default]
    WordWrap,
    Ellipsis,
}

/// Horizontal alignment of text within its area
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HorizontalAlign {
    #[default]
    Left,
    Center,
    Right,
}

/// Vertical alignment of text within its area
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum VerticalAlign {
    #[default]
    Top,
    Center,
    Bottom,
}

/// Everything a [`TextEngine`] needs to build a flowing-text scene
#[derive(Clone, Debug, PartialEq)]
pub struct TextSceneParams {
    pub area: Viewport,
    pub source: Option<TextSource>,
    pub attr: TextAttributes,
    pub clip: bool,
    pub line_spacing: f32,
    pub wrapping: TextWrapping,
    pub horizontal_align: HorizontalAlign,
    pub vertical_align: VerticalAlign,
    pub dynamic_styles: DynamicTextStyles,
    /// Opaque visual-effects descriptor, passed through to the library
    pub fx: Option<String>,
}
