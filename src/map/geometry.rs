use crate::braille::BrailleCanvas;

/// Draw a line using Bresenham's algorithm
pub fn draw_line(canvas: &mut BrailleCanvas, x0: i32, y0: i32, x1: i32, y1: i32) {
    draw_pattern(canvas, (x0, y0), (x1, y1), None);
}

/// Draw a line that alternates `dash` set pixels with `gap` blank ones
pub fn draw_dashed_line(canvas: &mut BrailleCanvas, from: (i32, i32), to: (i32, i32), dash: u8, gap: u8) {
    draw_pattern(canvas, from, to, Some((dash.max(1) as u32, gap as u32)));
}

fn draw_pattern(canvas: &mut BrailleCanvas, (x0, y0): (i32, i32), (x1, y1): (i32, i32), dash: Option<(u32, u32)>) {
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    let mut x = x0;
    let mut y = y0;
    let mut step = 0u32;

    loop {
        let on = match dash {
            Some((dash, gap)) => step % (dash + gap) < dash,
            None => true,
        };
        if on {
            canvas.set_pixel_signed(x, y);
        }
        step += 1;

        if x == x1 && y == y1 {
            break;
        }

        let e2 = 2 * err;

        if e2 >= dy {
            if x == x1 {
                break;
            }
            err += dy;
            x += sx;
        }

        if e2 <= dx {
            if y == y1 {
                break;
            }
            err += dx;
            y += sy;
        }
    }
}

/// Draw a filled circle
pub fn draw_circle(canvas: &mut BrailleCanvas, cx: i32, cy: i32, radius: i32) {
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy <= radius * radius {
                canvas.set_pixel_signed(cx + dx, cy + dy);
            }
        }
    }
}
