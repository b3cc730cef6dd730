//! Style descriptors and the stateless style functions used by the layers.
//!
//! Styles are plain values derived from feature properties on every call.
//! Nothing here is cached; the renderer asks again each frame.

use crate::map::Feature;

/// Path of the icon every marker uses
pub const MARKER_ICON_SRC: &str = "/images/icons/marker.svg";

/// Boundary label font
pub const LABEL_FONT: &str = "14px \"ZCOOL KuaiLe\", \"Nunito\", sans-serif";

/// RGBA colour, alpha in `0.0..=1.0`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f32,
}

impl Rgba {
    pub const fn new(r: u8, g: u8, b: u8, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 1.0)
    }

    /// Parse `#rrggbb`
    pub fn from_hex(hex: &str) -> Option<Self> {
        let digits = hex.strip_prefix('#')?;
        if digits.len() != 6 || !digits.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).ok();
        Some(Self::opaque(channel(0)?, channel(2)?, channel(4)?))
    }
}

pub const WHITE: Rgba = Rgba::opaque(255, 255, 255);
pub const MARKER_RED: Rgba = Rgba::opaque(229, 57, 53);
const LAND_YELLOW: Rgba = Rgba::opaque(0xFF, 0xF9, 0xC4);
const LABEL_BROWN: Rgba = Rgba::opaque(0x5D, 0x40, 0x37);
const COAST_CYAN: Rgba = Rgba::opaque(0, 188, 212);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fill {
    pub color: Rgba,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stroke {
    pub color: Rgba,
    pub width: f32,
    /// Dash and gap lengths; solid when absent
    pub line_dash: Option<[u8; 2]>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Text {
    pub text: String,
    pub font: &'static str,
    pub fill: Fill,
    pub stroke: Stroke,
    pub offset_y: i16,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Icon {
    pub src: &'static str,
    pub color: Rgba,
    pub scale: f32,
    /// Fraction of the icon size, `[0.5, 1.0]` is bottom center
    pub anchor: [f32; 2],
}

/// Visual description of a feature
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Style {
    pub fill: Option<Fill>,
    pub stroke: Option<Stroke>,
    pub text: Option<Text>,
    pub image: Option<Icon>,
}

/// Layer-level style function: properties in, styles out
pub type StyleFunction = fn(&Feature) -> Vec<Style>;

/// Style of a province boundary: light land fill, dashed orange outline,
/// and a label from `name_zh` falling back to `name`
pub fn boundary_style(feature: &Feature) -> Vec<Style> {
    let text = feature
        .get_str("name_zh")
        .or_else(|| feature.get_str("name"))
        .map(|name| Text {
            text: name.to_string(),
            font: LABEL_FONT,
            fill: Fill { color: LABEL_BROWN },
            stroke: Stroke {
                color: WHITE,
                width: 3.0,
                line_dash: None,
            },
            offset_y: 0,
        });

    let alpha = if feature.get_str("name") == Some("China") { 0.8 } else { 0.6 };

    vec![Style {
        fill: Some(Fill { color: LAND_YELLOW }),
        stroke: Some(Stroke {
            color: Rgba::new(255, 167, 38, alpha),
            width: 2.0,
            line_dash: Some([5, 5]),
        }),
        text,
        image: None,
    }]
}

/// Style of the base world outline
pub fn base_style(_feature: &Feature) -> Vec<Style> {
    vec![Style {
        stroke: Some(Stroke {
            color: COAST_CYAN,
            width: 1.0,
            line_dash: None,
        }),
        ..Style::default()
    }]
}

/// Fixed icon style shared by every marker
pub fn marker_icon_style() -> Style {
    Style {
        image: Some(Icon {
            src: MARKER_ICON_SRC,
            color: MARKER_RED,
            scale: 1.0,
            anchor: [0.15, 0.9],
        }),
        ..Style::default()
    }
}
