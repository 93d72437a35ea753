use once_cell::sync::Lazy;
use std::collections::HashMap;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rgba {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub a: f64,
}

impl Rgba {
    pub fn new(r: f64, g: f64, b: f64, a: f64) -> Self {
        Self { r, g, b, a }.clamp()
    }

    /// 以 0-255 通道值构造。
    pub fn from_channels(r: f64, g: f64, b: f64, a: f64) -> Self {
        Self {
            r: r / 255.0,
            g: g / 255.0,
            b: b / 255.0,
            a,
        }
        .clamp()
    }

    pub fn clamp(self) -> Self {
        Self {
            r: self.r.clamp(0.0, 1.0),
            g: self.g.clamp(0.0, 1.0),
            b: self.b.clamp(0.0, 1.0),
            a: self.a.clamp(0.0, 1.0),
        }
    }
}

/// 常用 CSS 颜色关键字。
static NAMED_COLORS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("aqua", "#00ffff"),
        ("black", "#000000"),
        ("blue", "#0000ff"),
        ("brown", "#a52a2a"),
        ("coral", "#ff7f50"),
        ("crimson", "#dc143c"),
        ("cyan", "#00ffff"),
        ("darkblue", "#00008b"),
        ("darkgray", "#a9a9a9"),
        ("darkgreen", "#006400"),
        ("darkred", "#8b0000"),
        ("fuchsia", "#ff00ff"),
        ("gold", "#ffd700"),
        ("gray", "#808080"),
        ("green", "#008000"),
        ("grey", "#808080"),
        ("indigo", "#4b0082"),
        ("ivory", "#fffff0"),
        ("khaki", "#f0e68c"),
        ("lavender", "#e6e6fa"),
        ("lightblue", "#add8e6"),
        ("lightgray", "#d3d3d3"),
        ("lightgreen", "#90ee90"),
        ("lime", "#00ff00"),
        ("magenta", "#ff00ff"),
        ("maroon", "#800000"),
        ("navy", "#000080"),
        ("olive", "#808000"),
        ("orange", "#ffa500"),
        ("orchid", "#da70d6"),
        ("pink", "#ffc0cb"),
        ("plum", "#dda0dd"),
        ("purple", "#800080"),
        ("red", "#ff0000"),
        ("salmon", "#fa8072"),
        ("silver", "#c0c0c0"),
        ("teal", "#008080"),
        ("tomato", "#ff6347"),
        ("violet", "#ee82ee"),
        ("white", "#ffffff"),
        ("yellow", "#ffff00"),
    ])
});

pub fn parse_color(input: &str) -> Option<Rgba> {
    let trimmed = input.trim();
    if let Some(stripped) = trimmed.strip_prefix('#') {
        return parse_hex(stripped);
    }
    let lowered = trimmed.to_ascii_lowercase();
    if lowered.starts_with("rgba") {
        return parse_rgb_function(&lowered, true);
    }
    if lowered.starts_with("rgb") {
        return parse_rgb_function(&lowered, false);
    }
    if let Some(hex) = NAMED_COLORS.get(lowered.as_str()) {
        return parse_color(hex);
    }
    None
}

/// 仅识别颜色关键字。
pub fn named_color(keyword: &str) -> Option<Rgba> {
    NAMED_COLORS
        .get(keyword.to_ascii_lowercase().as_str())
        .and_then(|hex| parse_color(hex))
}

pub fn lighten(color: Rgba, amount: f64) -> Rgba {
    let (h, s, l) = rgb_to_hsl(color);
    let new_l = (l + amount).clamp(0.0, 1.0);
    hsl_to_rgb(h, s, new_l, color.a)
}

pub fn darken(color: Rgba, amount: f64) -> Rgba {
    let (h, s, l) = rgb_to_hsl(color);
    let new_l = (l - amount).clamp(0.0, 1.0);
    hsl_to_rgb(h, s, new_l, color.a)
}

pub fn saturate(color: Rgba, amount: f64) -> Rgba {
    let (h, s, l) = rgb_to_hsl(color);
    let new_s = (s + amount).clamp(0.0, 1.0);
    hsl_to_rgb(h, new_s, l, color.a)
}

pub fn desaturate(color: Rgba, amount: f64) -> Rgba {
    let (h, s, l) = rgb_to_hsl(color);
    let new_s = (s - amount).clamp(0.0, 1.0);
    hsl_to_rgb(h, new_s, l, color.a)
}

pub fn fade(color: Rgba, amount: f64) -> Rgba {
    Rgba {
        a: amount.clamp(0.0, 1.0),
        ..color
    }
    .clamp()
}

pub fn fadein(color: Rgba, amount: f64) -> Rgba {
    Rgba {
        a: (color.a + amount).clamp(0.0, 1.0),
        ..color
    }
}

pub fn fadeout(color: Rgba, amount: f64) -> Rgba {
    Rgba {
        a: (color.a - amount).clamp(0.0, 1.0),
        ..color
    }
}

pub fn spin(color: Rgba, degrees: f64) -> Rgba {
    let (h, s, l) = rgb_to_hsl(color);
    let new_h = (h * 360.0 + degrees).rem_euclid(360.0) / 360.0;
    hsl_to_rgb(new_h, s, l, color.a)
}

/// 按权重线性混合两个颜色，weight 为第一个颜色的占比。
pub fn mix(first: Rgba, second: Rgba, weight: f64) -> Rgba {
    let w = weight.clamp(0.0, 1.0);
    Rgba {
        r: first.r * w + second.r * (1.0 - w),
        g: first.g * w + second.g * (1.0 - w),
        b: first.b * w + second.b * (1.0 - w),
        a: first.a * w + second.a * (1.0 - w),
    }
    .clamp()
}

/// 根据亮度在深浅两色中挑选可读性更好的一个。
pub fn contrast(color: Rgba, dark: Rgba, light: Rgba, threshold: f64) -> Rgba {
    if luma(color) < threshold {
        light
    } else {
        dark
    }
}

pub fn luma(color: Rgba) -> f64 {
    0.2126 * color.r + 0.7152 * color.g + 0.0722 * color.b
}

pub fn multiply(first: Rgba, second: Rgba) -> Rgba {
    color_blend(blend_multiply, first, second)
}

pub fn screen(first: Rgba, second: Rgba) -> Rgba {
    color_blend(blend_screen, first, second)
}

pub fn overlay(top: Rgba, bottom: Rgba) -> Rgba {
    color_blend(blend_overlay, top, bottom)
}

pub fn format_hex(color: Rgba) -> String {
    let c = color.clamp();
    format!(
        "#{:02x}{:02x}{:02x}",
        to_channel(c.r),
        to_channel(c.g),
        to_channel(c.b)
    )
}

pub fn format_rgba(color: Rgba) -> String {
    let c = color.clamp();
    let alpha = format_float(c.a);
    format!(
        "rgba({}, {}, {}, {})",
        to_channel(c.r),
        to_channel(c.g),
        to_channel(c.b),
        alpha
    )
}

/// alpha < 1 时输出 rgba()，否则输出十六进制。
pub fn format_color(color: Rgba) -> String {
    if color.a < 1.0 {
        format_rgba(color)
    } else {
        format_hex(color)
    }
}

fn parse_hex(hex: &str) -> Option<Rgba> {
    match hex.len() {
        3 => {
            let r = hex_value(&hex[0..1])?;
            let g = hex_value(&hex[1..2])?;
            let b = hex_value(&hex[2..3])?;
            Some(Rgba {
                r: (r * 17) as f64 / 255.0,
                g: (g * 17) as f64 / 255.0,
                b: (b * 17) as f64 / 255.0,
                a: 1.0,
            })
        }
        6 => {
            let r = hex_value(&hex[0..2])?;
            let g = hex_value(&hex[2..4])?;
            let b = hex_value(&hex[4..6])?;
            Some(Rgba {
                r: r as f64 / 255.0,
                g: g as f64 / 255.0,
                b: b as f64 / 255.0,
                a: 1.0,
            })
        }
        8 => {
            let r = hex_value(&hex[0..2])?;
            let g = hex_value(&hex[2..4])?;
            let b = hex_value(&hex[4..6])?;
            let a = hex_value(&hex[6..8])?;
            Some(Rgba {
                r: r as f64 / 255.0,
                g: g as f64 / 255.0,
                b: b as f64 / 255.0,
                a: a as f64 / 255.0,
            })
        }
        _ => None,
    }
}

fn parse_rgb_function(input: &str, has_alpha: bool) -> Option<Rgba> {
    let start = input.find('(')? + 1;
    let end = input.rfind(')')?;
    let body = &input[start..end];
    let parts: Vec<&str> = body.split(',').map(|s| s.trim()).collect();
    if (has_alpha && parts.len() != 4) || (!has_alpha && parts.len() != 3) {
        return None;
    }
    let r = parse_channel(parts[0])?;
    let g = parse_channel(parts[1])?;
    let b = parse_channel(parts[2])?;
    let a = if has_alpha {
        parse_alpha(parts[3])?
    } else {
        1.0
    };
    Some(Rgba {
        r: r / 255.0,
        g: g / 255.0,
        b: b / 255.0,
        a,
    })
}

fn parse_channel(input: &str) -> Option<f64> {
    if let Some(value) = input.strip_suffix('%') {
        let num: f64 = value.trim().parse().ok()?;
        return Some((num / 100.0 * 255.0).clamp(0.0, 255.0));
    }
    input.parse().ok()
}

fn parse_alpha(input: &str) -> Option<f64> {
    if let Some(value) = input.strip_suffix('%') {
        let num: f64 = value.parse().ok()?;
        Some((num / 100.0).clamp(0.0, 1.0))
    } else {
        input.parse().ok().map(|v: f64| v.clamp(0.0, 1.0))
    }
}

fn color_blend<F>(mode: F, bottom: Rgba, top: Rgba) -> Rgba
where
    F: Fn(f64, f64) -> f64 + Copy,
{
    let ab = bottom.a;
    let at = top.a;
    let ar = at + ab * (1.0 - at);
    let bottom_channels = [bottom.r, bottom.g, bottom.b];
    let top_channels = [top.r, top.g, top.b];
    let mut result = [0.0; 3];
    for i in 0..3 {
        let cb = bottom_channels[i];
        let cs = top_channels[i];
        let mut cr = mode(cb, cs);
        if ar > 0.0 {
            cr = (at * cs + ab * (cb - at * (cb + cs - cr))) / ar;
        }
        result[i] = cr;
    }
    Rgba {
        r: result[0],
        g: result[1],
        b: result[2],
        a: ar,
    }
    .clamp()
}

fn blend_multiply(a: f64, b: f64) -> f64 {
    a * b
}

fn blend_screen(a: f64, b: f64) -> f64 {
    a + b - a * b
}

fn blend_overlay(base: f64, overlay: f64) -> f64 {
    if base <= 0.5 {
        blend_multiply(base * 2.0, overlay)
    } else {
        blend_screen(base * 2.0 - 1.0, overlay)
    }
}

fn hex_value(hex: &str) -> Option<u8> {
    u8::from_str_radix(hex, 16).ok()
}

pub fn rgb_to_hsl(color: Rgba) -> (f64, f64, f64) {
    let r = color.r;
    let g = color.g;
    let b = color.b;

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let l = (max + min) / 2.0;

    if (max - min).abs() < f64::EPSILON {
        return (0.0, 0.0, l);
    }

    let d = max - min;
    let s = if l > 0.5 {
        d / (2.0 - max - min)
    } else {
        d / (max + min)
    };

    let h = if (max - r).abs() < f64::EPSILON {
        (g - b) / d + if g < b { 6.0 } else { 0.0 }
    } else if (max - g).abs() < f64::EPSILON {
        (b - r) / d + 2.0
    } else {
        (r - g) / d + 4.0
    } / 6.0;

    (h, s, l)
}

pub fn hsl_to_rgb(h: f64, s: f64, l: f64, alpha: f64) -> Rgba {
    if s <= 0.0 {
        return Rgba {
            r: l,
            g: l,
            b: l,
            a: alpha,
        };
    }

    let q = if l < 0.5 {
        l * (1.0 + s)
    } else {
        l + s - l * s
    };
    let p = 2.0 * l - q;

    let r = hue_to_rgb(p, q, h + 1.0 / 3.0);
    let g = hue_to_rgb(p, q, h);
    let b = hue_to_rgb(p, q, h - 1.0 / 3.0);

    Rgba { r, g, b, a: alpha }.clamp()
}

fn hue_to_rgb(p: f64, q: f64, mut t: f64) -> f64 {
    if t < 0.0 {
        t += 1.0;
    }
    if t > 1.0 {
        t -= 1.0;
    }
    match t {
        _ if t < 1.0 / 6.0 => p + (q - p) * 6.0 * t,
        _ if t < 1.0 / 2.0 => q,
        _ if t < 2.0 / 3.0 => p + (q - p) * (2.0 / 3.0 - t) * 6.0,
        _ => p,
    }
}

pub fn to_channel(value: f64) -> u8 {
    (value * 255.0).round().clamp(0.0, 255.0) as u8
}

pub fn format_float(value: f64) -> String {
    let mut formatted = format!("{value:.3}");
    while formatted.contains('.') && formatted.ends_with('0') {
        formatted.pop();
    }
    if formatted.ends_with('.') {
        formatted.pop();
    }
    if formatted.is_empty() {
        "0".to_string()
    } else {
        formatted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_colors_resolve() {
        assert_eq!(format_hex(named_color("red").unwrap()), "#ff0000");
        assert_eq!(format_hex(named_color("Teal").unwrap()), "#008080");
        assert!(named_color("not-a-color").is_none());
    }

    #[test]
    fn lighten_and_darken_roundtrip() {
        let base = parse_color("#336699").unwrap();
        assert_eq!(format_hex(lighten(base, 0.2)), "#6699cc");
        assert_eq!(format_hex(darken(base, 0.1)), "#264c73");
    }

    #[test]
    fn mix_even_weight() {
        let black = parse_color("#000").unwrap();
        let white = parse_color("#fff").unwrap();
        assert_eq!(format_hex(mix(black, white, 0.5)), "#808080");
    }

    #[test]
    fn overlay_blend() {
        let top = parse_color("rgba(255, 255, 255, 0.05)").unwrap();
        let bottom = parse_color("#2c2c2c").unwrap();
        assert_eq!(format_hex(overlay(top, bottom)), "#373737");
    }

    #[test]
    fn format_rgba_trims_alpha() {
        let color = Rgba::from_channels(255.0, 255.0, 255.0, 0.4);
        assert_eq!(format_rgba(color), "rgba(255, 255, 255, 0.4)");
    }

    #[test]
    fn percentage_channels() {
        let color = parse_color("rgb(100%, 0%, 50%)").unwrap();
        assert_eq!(format_hex(color), "#ff0080");
    }
}
