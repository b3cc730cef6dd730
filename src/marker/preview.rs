use glam::DVec2;
use tracing::warn;

use crate::map::{Overlay, OverlayBody};
use crate::marker::{InteractionEvent, MarkerRecord};
use crate::style::{Rgba, MARKER_RED};

pub const PREVIEW_MIN_WIDTH: u16 = 18;
pub const PREVIEW_MAX_WIDTH: u16 = 40;

/// Cell offset of the preview box from the hovered marker
pub const PREVIEW_OFFSET: (i16, i16) = (2, -1);

/// Border and padding cells around the longest line
const PREVIEW_CHROME: usize = 4;

/// Text shown in the preview
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewContent {
    pub title: String,
    pub lines: Vec<String>,
}

impl PreviewContent {
    pub fn from_record(record: &MarkerRecord) -> Self {
        let display = &record.display;
        let lines = [display.date.as_deref(), display.summary.as_deref()]
            .into_iter()
            .flatten()
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        Self {
            title: display.title.clone(),
            lines,
        }
    }

    fn longest_line(&self) -> usize {
        std::iter::once(&self.title)
            .chain(&self.lines)
            .map(|l| l.chars().count())
            .max()
            .unwrap_or(0)
    }
}

/// Visual style of the preview box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreviewStyle {
    pub accent: Rgba,
    pub width: u16,
}

impl Default for PreviewStyle {
    fn default() -> Self {
        Self {
            accent: MARKER_RED,
            width: PREVIEW_MIN_WIDTH,
        }
    }
}

impl PreviewStyle {
    /// Accent from the record's `#rrggbb` colour, width fitted to the content
    pub fn for_record(record: Option<&MarkerRecord>) -> Self {
        let Some(record) = record else {
            return Self::default();
        };
        let accent = record
            .display
            .accent
            .as_deref()
            .and_then(Rgba::from_hex)
            .unwrap_or(MARKER_RED);
        let wanted = PreviewContent::from_record(record).longest_line() + PREVIEW_CHROME;
        let width = u16::try_from(wanted).unwrap_or(u16::MAX).clamp(PREVIEW_MIN_WIDTH, PREVIEW_MAX_WIDTH);
        Self { accent, width }
    }
}

/// Current content and visibility of the hover preview
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreviewState {
    pub content: Option<PreviewContent>,
    pub style: PreviewStyle,
    pub position: Option<DVec2>,
}

impl PreviewState {
    pub fn is_visible(&self) -> bool {
        self.content.is_some() && self.position.is_some()
    }
}

/// Owns the preview overlay and keeps its element in step with the state
#[derive(Debug)]
pub struct MarkerPreviewController {
    overlay: Overlay,
    state: PreviewState,
}

impl Default for MarkerPreviewController {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkerPreviewController {
    pub fn new() -> Self {
        Self {
            overlay: Overlay::new(PREVIEW_OFFSET),
            state: PreviewState::default(),
        }
    }

    /// The overlay to register on a map. Clones share the same element.
    pub fn overlay(&self) -> &Overlay {
        &self.overlay
    }

    pub fn state(&self) -> &PreviewState {
        &self.state
    }

    pub fn is_visible(&self) -> bool {
        self.state.is_visible()
    }

    pub fn set_preview(&mut self, info: Option<&MarkerRecord>) {
        self.state.content = info.map(PreviewContent::from_record);
    }

    pub fn set_style(&mut self, info: Option<&MarkerRecord>) {
        self.state.style = PreviewStyle::for_record(info);
    }

    pub fn set_position(&mut self, coords: Option<DVec2>) {
        self.state.position = coords;
    }

    /// Apply a hover event: content, style and position all follow it
    pub fn handle(&mut self, event: &InteractionEvent) {
        let info = event.info.as_deref();
        self.set_preview(info);
        self.set_style(info);
        self.set_position(event.coords);
        self.sync();
    }

    pub fn hide(&mut self) {
        self.state = PreviewState::default();
        self.sync();
    }

    /// Mirror the state into the overlay element. Returns false if the
    /// element is borrowed elsewhere; the next event retries.
    fn sync(&self) -> bool {
        let element = self.overlay.element();
        let Ok(mut element) = element.try_borrow_mut() else {
            warn!(overlay = %self.overlay.id(), "preview element busy, skipping update");
            return false;
        };

        element.position = self.state.position;
        element.body = self.state.content.as_ref().map(|content| OverlayBody {
            title: content.title.clone(),
            lines: content.lines.clone(),
            accent: self.state.style.accent,
            width: self.state.style.width,
        });
        true
    }
}
