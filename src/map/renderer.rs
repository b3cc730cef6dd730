use crate::braille::BrailleCanvas;
use crate::map::geometry::{draw_circle, draw_dashed_line, draw_line};
use crate::map::{Geometry, Layer, MapInstance, Path, View};
use crate::style::{Rgba, Stroke, Style};

/// Labels are hidden below this zoom to keep the map readable
pub const LABEL_MIN_ZOOM: f64 = 3.0;

/// Glyph drawn for point features with an icon style
pub const MARKER_GLYPH: char = '◆';

/// A text label positioned in character cells
#[derive(Debug, Clone, PartialEq)]
pub struct TextLabel {
    pub col: u16,
    pub row: u16,
    pub text: String,
    pub color: Rgba,
}

/// A point marker positioned in character cells
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkerGlyph {
    pub col: u16,
    pub row: u16,
    pub glyph: char,
    pub color: Rgba,
}

/// One rasterised frame of the map, back to front
#[derive(Debug, Default)]
pub struct MapFrame {
    /// One canvas per stroke colour, in first-drawn order
    pub strokes: Vec<(Rgba, BrailleCanvas)>,
    pub labels: Vec<TextLabel>,
    pub markers: Vec<MarkerGlyph>,
}

impl MapFrame {
    fn canvas_for(&mut self, color: Rgba, cols: usize, rows: usize) -> &mut BrailleCanvas {
        let idx = match self.strokes.iter().position(|(c, _)| *c == color) {
            Some(idx) => idx,
            None => {
                self.strokes.push((color, BrailleCanvas::new(cols, rows)));
                self.strokes.len() - 1
            }
        };
        &mut self.strokes[idx].1
    }
}

/// Rasterise every layer of the map into a `cols` x `rows` character area
pub fn render_map(map: &MapInstance, cols: usize, rows: usize) -> MapFrame {
    // Braille gives 2x4 resolution per character
    let mut view = map.view().clone();
    view.set_size(cols * 2, rows * 4);

    let mut layers: Vec<&Layer> = map.layers().iter().collect();
    layers.sort_by_key(|l| l.tier());

    let mut frame = MapFrame::default();
    for layer in layers {
        render_layer(&mut frame, layer, &view, cols, rows);
    }
    frame
}

fn render_layer(frame: &mut MapFrame, layer: &Layer, view: &View, cols: usize, rows: usize) {
    let handle = layer.source();
    // A source being cleared or loaded elsewhere is skipped for this frame
    let Ok(source) = handle.try_borrow() else {
        return;
    };

    for feature in source.features() {
        for style in layer.styles_for(feature) {
            match &feature.geometry {
                Geometry::Point(p) => {
                    let (px, py) = view.project_coord(*p);
                    if !view.is_visible(px, py) || px < 0 || py < 0 {
                        continue;
                    }
                    if let Some(icon) = style.image {
                        let (col, row) = ((px / 2) as u16, (py / 4) as u16);
                        if (col as usize) < cols && (row as usize) < rows {
                            frame.markers.push(MarkerGlyph {
                                col,
                                row,
                                glyph: MARKER_GLYPH,
                                color: icon.color,
                            });
                        }
                    } else if let Some(stroke) = style.stroke {
                        draw_circle(frame.canvas_for(stroke.color, cols, rows), px, py, 1);
                    }
                }
                geometry => {
                    if let Some(stroke) = style.stroke {
                        let canvas = frame.canvas_for(stroke.color, cols, rows);
                        for outline in geometry.outlines() {
                            draw_path(canvas, outline, view, &stroke);
                        }
                    }
                    push_label(frame, geometry, &style, view, cols, rows);
                }
            }
        }
    }
}

/// Draw a path with viewport culling
fn draw_path(canvas: &mut BrailleCanvas, path: &Path, view: &View, stroke: &Stroke) {
    if path.len() < 2 {
        return;
    }

    let mut prev: Option<(i32, i32)> = None;
    for &coord in path {
        let (px, py) = view.project_coord(coord);

        if let Some((prev_x, prev_y)) = prev {
            // Skip segments that wrap around the antimeridian
            let dist = ((px - prev_x).abs() + (py - prev_y).abs()) as usize;
            if dist < view.width && view.line_might_be_visible((prev_x, prev_y), (px, py)) {
                match stroke.line_dash {
                    Some([dash, gap]) => draw_dashed_line(canvas, (prev_x, prev_y), (px, py), dash, gap),
                    None => draw_line(canvas, prev_x, prev_y, px, py),
                }
            }
        }

        prev = Some((px, py));
    }
}

fn push_label(frame: &mut MapFrame, geometry: &Geometry, style: &Style, view: &View, cols: usize, rows: usize) {
    if view.zoom < LABEL_MIN_ZOOM {
        return;
    }
    let (Some(text), Some(anchor)) = (&style.text, geometry.label_anchor()) else {
        return;
    };
    let (px, py) = view.project_coord(anchor);
    if px < 0 || py < 0 {
        return;
    }

    // Center the label on its anchor cell
    let half = (text.text.chars().count() / 2) as i32;
    let col = (px / 2 - half).max(0) as usize;
    let row = (py / 4 + text.offset_y as i32).max(0) as usize;
    if col < cols && row < rows {
        frame.labels.push(TextLabel {
            col: col as u16,
            row: row as u16,
            text: text.text.clone(),
            color: text.fill.color,
        });
    }
}
