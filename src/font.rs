//! Tiny 3x5 bitmap font for on-frame text. Lowercase is drawn as uppercase.

use image::{Rgb, RgbImage};

/// Pixel advance of one character at `scale`
pub fn char_advance(scale: usize) -> usize {
    (3 * scale) + scale
}

pub fn measure_text_width(text: &str, scale: usize) -> usize {
    text.chars().count() * char_advance(scale)
}

pub fn draw_text_line(image: &mut RgbImage, x: i32, y: i32, text: &str, color: Rgb<u8>, scale: usize) {
    let mut cx = x;
    for c in text.chars() {
        draw_char(image, cx, y, c, color, scale);
        cx += char_advance(scale) as i32;
    }
}

/// Rows top to bottom, bit 2 is the left column
fn glyph(c: char) -> [u8; 5] {
    match c.to_ascii_uppercase() {
        '0' => [0x7, 0x5, 0x5, 0x5, 0x7],
        '1' => [0x2, 0x6, 0x2, 0x2, 0x7],
        '2' => [0x7, 0x1, 0x7, 0x4, 0x7],
        '3' => [0x7, 0x1, 0x7, 0x1, 0x7],
        '4' => [0x5, 0x5, 0x7, 0x1, 0x1],
        '5' => [0x7, 0x4, 0x7, 0x1, 0x7],
        '6' => [0x7, 0x4, 0x7, 0x5, 0x7],
        '7' => [0x7, 0x1, 0x2, 0x4, 0x4],
        '8' => [0x7, 0x5, 0x7, 0x5, 0x7],
        '9' => [0x7, 0x5, 0x7, 0x1, 0x7],
        'A' => [0x2, 0x5, 0x7, 0x5, 0x5],
        'B' => [0x6, 0x5, 0x6, 0x5, 0x6],
        'C' => [0x7, 0x4, 0x4, 0x4, 0x7],
        'D' => [0x6, 0x5, 0x5, 0x5, 0x6],
        'E' => [0x7, 0x4, 0x6, 0x4, 0x7],
        'F' => [0x7, 0x4, 0x6, 0x4, 0x4],
        'G' => [0x7, 0x4, 0x5, 0x5, 0x7],
        'H' => [0x5, 0x5, 0x7, 0x5, 0x5],
        'I' => [0x7, 0x2, 0x2, 0x2, 0x7],
        'J' => [0x1, 0x1, 0x1, 0x5, 0x7],
        'K' => [0x5, 0x5, 0x6, 0x5, 0x5],
        'L' => [0x4, 0x4, 0x4, 0x4, 0x7],
        'M' => [0x5, 0x7, 0x7, 0x5, 0x5],
        'N' => [0x6, 0x5, 0x5, 0x5, 0x5],
        'O' => [0x2, 0x5, 0x5, 0x5, 0x2],
        'P' => [0x7, 0x5, 0x7, 0x4, 0x4],
        'Q' => [0x2, 0x5, 0x5, 0x6, 0x3],
        'R' => [0x6, 0x5, 0x6, 0x5, 0x5],
        'S' => [0x3, 0x4, 0x2, 0x1, 0x6],
        'T' => [0x7, 0x2, 0x2, 0x2, 0x2],
        'U' => [0x5, 0x5, 0x5, 0x5, 0x7],
        'V' => [0x5, 0x5, 0x5, 0x5, 0x2],
        'W' => [0x5, 0x5, 0x7, 0x7, 0x5],
        'X' => [0x5, 0x5, 0x2, 0x5, 0x5],
        'Y' => [0x5, 0x5, 0x2, 0x2, 0x2],
        'Z' => [0x7, 0x1, 0x2, 0x4, 0x7],
        ' ' => [0x0, 0x0, 0x0, 0x0, 0x0],
        ':' => [0x0, 0x2, 0x0, 0x2, 0x0],
        '.' => [0x0, 0x0, 0x0, 0x0, 0x2],
        ',' => [0x0, 0x0, 0x0, 0x2, 0x4],
        '-' => [0x0, 0x0, 0x7, 0x0, 0x0],
        '+' => [0x0, 0x2, 0x7, 0x2, 0x0],
        '_' => [0x0, 0x0, 0x0, 0x0, 0x7],
        '=' => [0x0, 0x7, 0x0, 0x7, 0x0],
        '/' => [0x1, 0x1, 0x2, 0x4, 0x4],
        '(' => [0x2, 0x4, 0x4, 0x4, 0x2],
        ')' => [0x2, 0x1, 0x1, 0x1, 0x2],
        '[' => [0x6, 0x4, 0x4, 0x4, 0x6],
        ']' => [0x3, 0x1, 0x1, 0x1, 0x3],
        _ => [0x7, 0x7, 0x7, 0x7, 0x7],
    }
}

fn draw_char(image: &mut RgbImage, x: i32, y: i32, c: char, color: Rgb<u8>, scale: usize) {
    let (width, height) = (image.width() as i32, image.height() as i32);
    let scale = scale as i32;

    for (row, bits) in glyph(c).iter().enumerate() {
        for col in 0..3 {
            if (bits >> (2 - col)) & 1 == 0 {
                continue;
            }
            for dy in 0..scale {
                for dx in 0..scale {
                    let px = x + col * scale + dx;
                    let py = y + row as i32 * scale + dy;
                    if px >= 0 && py >= 0 && px < width && py < height {
                        image.put_pixel(px as u32, py as u32, color);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_width_counts_chars() {
        assert_eq!(measure_text_width("FPS:30", 2), 6 * 8);
    }

    #[test]
    fn test_lowercase_matches_uppercase() {
        assert_eq!(glyph('g'), glyph('G'));
        assert_ne!(glyph('g'), glyph('?'));
    }

    #[test]
    fn test_text_is_clipped_at_edges() {
        let mut img = RgbImage::new(6, 6);
        draw_text_line(&mut img, -2, 4, "8", Rgb([255, 0, 0]), 2);
        assert_eq!(*img.get_pixel(0, 4), Rgb([255, 0, 0]));
    }
}
