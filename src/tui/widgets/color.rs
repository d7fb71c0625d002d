use ratatui::style::Color;

/// Parse a theme color string into a ratatui Color.
///
/// Accepts the terminal color names (`red`, `lightblue`, `darkgray`, ...),
/// `#RRGGBB`, `#RGB` and `rgb(r, g, b)`. Anything else falls back to white.
pub fn parse_color(color_str: &str) -> Color {
    let s = color_str.trim().to_lowercase();

    match s.as_str() {
        "black" => Color::Black,
        "red" => Color::Red,
        "green" => Color::Green,
        "yellow" => Color::Yellow,
        "blue" => Color::Blue,
        "magenta" => Color::Magenta,
        "cyan" => Color::Cyan,
        "white" => Color::White,
        "gray" | "grey" | "lightgray" | "lightgrey" => Color::Gray,
        "darkgray" | "darkgrey" => Color::DarkGray,
        "lightred" => Color::LightRed,
        "lightgreen" => Color::LightGreen,
        "lightyellow" => Color::LightYellow,
        "lightblue" => Color::LightBlue,
        "lightmagenta" => Color::LightMagenta,
        "lightcyan" => Color::LightCyan,
        _ => {
            let parsed = if s.starts_with('#') {
                parse_hex_color(&s)
            } else if s.starts_with("rgb(") {
                parse_rgb_color(&s)
            } else {
                None
            };
            parsed.unwrap_or(Color::White)
        }
    }
}

fn parse_hex_color(s: &str) -> Option<Color> {
    let hex = s.trim_start_matches('#');
    match hex.len() {
        6 => Some(Color::Rgb(
            u8::from_str_radix(hex.get(0..2)?, 16).ok()?,
            u8::from_str_radix(hex.get(2..4)?, 16).ok()?,
            u8::from_str_radix(hex.get(4..6)?, 16).ok()?,
        )),
        3 => {
            // #RGB expands each nibble: 0xF -> 0xFF
            let nibble = |i: usize| -> Option<u8> {
                let v = u8::from_str_radix(hex.get(i..i + 1)?, 16).ok()?;
                Some((v << 4) | v)
            };
            Some(Color::Rgb(nibble(0)?, nibble(1)?, nibble(2)?))
        }
        _ => None,
    }
}

fn parse_rgb_color(s: &str) -> Option<Color> {
    let content = s.strip_prefix("rgb(")?.strip_suffix(')')?;
    let parts: Vec<u8> = content
        .split(',')
        .map(|p| p.trim().parse::<u8>().ok())
        .collect::<Option<Vec<u8>>>()?;
    match parts.as_slice() {
        [r, g, b] => Some(Color::Rgb(*r, *g, *b)),
        _ => None,
    }
}

/// Inverse of [`parse_color`] for the colors it produces
pub fn format_color_for_display(color: &Color) -> String {
    match color {
        Color::Black => "black".to_string(),
        Color::Red => "red".to_string(),
        Color::Green => "green".to_string(),
        Color::Yellow => "yellow".to_string(),
        Color::Blue => "blue".to_string(),
        Color::Magenta => "magenta".to_string(),
        Color::Cyan => "cyan".to_string(),
        Color::White => "white".to_string(),
        Color::Gray => "gray".to_string(),
        Color::DarkGray => "darkgray".to_string(),
        Color::LightRed => "lightred".to_string(),
        Color::LightGreen => "lightgreen".to_string(),
        Color::LightYellow => "lightyellow".to_string(),
        Color::LightBlue => "lightblue".to_string(),
        Color::LightMagenta => "lightmagenta".to_string(),
        Color::LightCyan => "lightcyan".to_string(),
        Color::Rgb(r, g, b) => format!("#{:02X}{:02X}{:02X}", r, g, b),
        Color::Indexed(_) => "indexed".to_string(),
        Color::Reset => "reset".to_string(),
    }
}

/// WCAG relative luminance of an RGB color, 0.0 (dark) to 1.0 (light)
fn calculate_luminance(r: u8, g: u8, b: u8) -> f64 {
    let linear = |c: u8| {
        let c = c as f64 / 255.0;
        if c <= 0.03928 {
            c / 12.92
        } else {
            ((c + 0.055) / 1.055).powf(2.4)
        }
    };
    0.2126 * linear(r) + 0.7152 * linear(g) + 0.0722 * linear(b)
}

/// Black or white text, whichever reads better on `background`.
/// Gray renders light in most terminals, so it counts as light here.
pub fn get_contrast_text_color(background: Color) -> Color {
    let dark = match background {
        Color::Rgb(r, g, b) => calculate_luminance(r, g, b) < 0.5,
        Color::Black | Color::Blue | Color::Magenta | Color::Red | Color::DarkGray => true,
        _ => false,
    };
    if dark { Color::White } else { Color::Black }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_color_forms() {
        assert_eq!(parse_color(" Cyan "), Color::Cyan);
        assert_eq!(parse_color("lightgrey"), Color::Gray);
        assert_eq!(parse_color("#FF8000"), Color::Rgb(255, 128, 0));
        assert_eq!(parse_color("#0f0"), Color::Rgb(0, 255, 0));
        assert_eq!(parse_color("rgb(1, 2, 3)"), Color::Rgb(1, 2, 3));
        assert_eq!(parse_color("rgb(1,2)"), Color::White);
        assert_eq!(parse_color("#12345"), Color::White);
        assert_eq!(parse_color("chartreuse"), Color::White);
    }

    #[test]
    fn test_format_round_trips_named_and_hex() {
        for name in ["black", "lightmagenta", "darkgray", "#1A2B3C"] {
            assert_eq!(format_color_for_display(&parse_color(name)), name);
        }
    }

    #[test]
    fn test_contrast_text_color() {
        assert_eq!(get_contrast_text_color(Color::Black), Color::White);
        assert_eq!(get_contrast_text_color(Color::Yellow), Color::Black);
        assert_eq!(get_contrast_text_color(Color::Rgb(20, 20, 40)), Color::White);
        assert_eq!(get_contrast_text_color(Color::Rgb(240, 240, 200)), Color::Black);
    }
}
