use crate::app::{App, Screen};
use crate::map::{render_map, Cursor, MapFrame, MapInstance, OverlayBody};
use crate::style::Rgba;
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Widget, Wrap},
    Frame,
};

/// Render the UI
pub fn render(frame: &mut Frame, app: &App) {
    let area = frame.area();

    // Split into main area and status bar
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(3),    // Map or page
            Constraint::Length(1), // Status bar
        ])
        .split(area);

    match &app.screen {
        Screen::Map => render_map_pane(frame, app, chunks[0]),
        Screen::Page(route) => render_page(frame, app, route, chunks[0]),
    }
    render_status_bar(frame, app, chunks[1]);
}

fn color(rgba: Rgba) -> Color {
    Color::Rgb(rgba.r, rgba.g, rgba.b)
}

fn render_map_pane(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(Span::styled(
            " Travel Map ",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let Some(map) = app.lifecycle.map() else {
        let message = app.status.as_deref().unwrap_or("map not initialised, press r");
        frame.render_widget(Paragraph::new(message).style(Style::default().fg(Color::Red)), inner);
        return;
    };

    let map_frame = render_map(map, inner.width as usize, inner.height as usize);

    // Convert braille pixels to character position
    let cursor = app.mouse_pixel_pos().and_then(|(px, py)| {
        let cx = (px / 2) as u16;
        let cy = (py / 4) as u16;
        (cx < inner.width && cy < inner.height).then_some((cx, cy))
    });
    let pointer = map.target().map_or(Cursor::Default, |t| t.cursor());

    frame.render_widget(
        MapWidget {
            frame: map_frame,
            cursor,
            pointer,
        },
        inner,
    );

    render_overlays(frame, map, inner);
}

/// Custom widget that renders the braille map with labels and markers overlaid
struct MapWidget {
    frame: MapFrame,
    cursor: Option<(u16, u16)>,
    pointer: Cursor,
}

impl Widget for MapWidget {
    fn render(self, area: Rect, buf: &mut Buffer) {
        // Stroke canvases back to front
        for (rgba, canvas) in &self.frame.strokes {
            let fg = color(*rgba);
            for row in 0..canvas.height().min(area.height as usize) {
                for col in 0..canvas.width().min(area.width as usize) {
                    if let Some(ch) = canvas.glyph(col, row) {
                        buf[(area.x + col as u16, area.y + row as u16)].set_char(ch).set_fg(fg);
                    }
                }
            }
        }

        for label in &self.frame.labels {
            let max_len = area.width.saturating_sub(label.col) as usize;
            let style = Style::default().fg(color(label.color));
            for (i, ch) in label.text.chars().take(max_len.min(24)).enumerate() {
                buf[(area.x + label.col + i as u16, area.y + label.row)].set_char(ch).set_style(style);
            }
        }

        for marker in &self.frame.markers {
            if marker.col < area.width && marker.row < area.height {
                buf[(area.x + marker.col, area.y + marker.row)]
                    .set_char(marker.glyph)
                    .set_style(Style::default().fg(color(marker.color)).add_modifier(Modifier::BOLD));
            }
        }

        if let Some((cx, cy)) = self.cursor {
            let (ch, fg) = match self.pointer {
                Cursor::Pointer => ('◎', Color::Yellow),
                Cursor::Default => ('╋', Color::Red),
            };
            buf[(area.x + cx, area.y + cy)].set_char(ch).set_fg(fg);
        }
    }
}

/// Draw every shown overlay next to its anchor
fn render_overlays(frame: &mut Frame, map: &MapInstance, inner: Rect) {
    let view = map.view();
    for overlay in map.overlays() {
        let element = overlay.element();
        let Ok(element) = element.try_borrow() else {
            continue;
        };
        let (Some(position), Some(body)) = (element.position, element.body.as_ref()) else {
            continue;
        };

        // The map view is sized in braille pixels of the inner area
        let (px, py) = view.project_coord(position);
        let col = px / 2 + overlay.offset.0 as i32;
        let row = py / 4 + overlay.offset.1 as i32;
        if let Some(rect) = popup_rect(inner, col, row, body) {
            render_preview(frame, body, rect);
        }
    }
}

fn popup_rect(inner: Rect, col: i32, row: i32, body: &OverlayBody) -> Option<Rect> {
    let width = body.width.min(inner.width);
    let height = (body.lines.len() as u16 + 2).min(inner.height);
    if width < 4 || height < 3 {
        return None;
    }
    // Keep the box inside the pane
    let max_col = (inner.width - width) as i32;
    let max_row = (inner.height - height) as i32;
    let x = inner.x + col.clamp(0, max_col) as u16;
    let y = inner.y + row.clamp(0, max_row) as u16;
    Some(Rect::new(x, y, width, height))
}

fn render_preview(frame: &mut Frame, body: &OverlayBody, rect: Rect) {
    let accent = color(body.accent);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(accent))
        .title(Span::styled(
            format!(" {} ", body.title),
            Style::default().fg(accent).add_modifier(Modifier::BOLD),
        ));
    let lines: Vec<Line> = body.lines.iter().map(|l| Line::from(l.as_str())).collect();

    frame.render_widget(Clear, rect);
    frame.render_widget(Paragraph::new(lines).block(block).wrap(Wrap { trim: true }), rect);
}

fn render_page(frame: &mut Frame, app: &App, route: &str, area: Rect) {
    let title = app.page_title().unwrap_or(route);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(Span::styled(
            format!(" {title} "),
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        ));

    let text = vec![
        Line::from(Span::styled(route.to_string(), Style::default().fg(Color::DarkGray))),
        Line::from(""),
        Line::from("Esc: back to the map"),
    ];
    frame.render_widget(Paragraph::new(text).block(block), area);
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let mut spans = vec![
        Span::styled(" Zoom: ", Style::default().fg(Color::DarkGray)),
        Span::styled(app.zoom_level(), Style::default().fg(Color::Yellow)),
        Span::styled(" | ", Style::default().fg(Color::DarkGray)),
        Span::styled(app.center_coords(), Style::default().fg(Color::Cyan)),
        Span::styled(
            format!(" | map #{} ", app.lifecycle.generation()),
            Style::default().fg(Color::DarkGray),
        ),
    ];
    if let Some(status) = &app.status {
        spans.push(Span::styled(format!("| {status} "), Style::default().fg(Color::Red)));
    }
    spans.push(Span::styled(
        "| hjkl:pan +/-:zoom click:open r:rebuild esc:back q:quit",
        Style::default().fg(Color::DarkGray),
    ));

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::MARKER_RED;

    fn body(lines: usize) -> OverlayBody {
        OverlayBody {
            title: "Beijing".into(),
            lines: vec!["2023-10-01".into(); lines],
            accent: MARKER_RED,
            width: 20,
        }
    }

    #[test]
    fn popup_stays_inside_pane() {
        let inner = Rect::new(1, 1, 60, 20);
        let rect = popup_rect(inner, 55, 19, &body(2)).unwrap();
        assert_eq!(rect, Rect::new(41, 17, 20, 4));

        let rect = popup_rect(inner, -5, -5, &body(1)).unwrap();
        assert_eq!((rect.x, rect.y), (1, 1));
    }

    #[test]
    fn popup_needs_room() {
        assert!(popup_rect(Rect::new(0, 0, 3, 20), 0, 0, &body(1)).is_none());
    }
}
