/// 24-bit color; alpha lives on the primitive that uses it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const WHITE: Color = Color::from_hex(0xffffff);
    pub const BLACK: Color = Color::from_hex(0x000000);

    pub const fn from_hex(hex: u32) -> Self {
        Self {
            r: ((hex >> 16) & 0xff) as u8,
            g: ((hex >> 8) & 0xff) as u8,
            b: (hex & 0xff) as u8,
        }
    }

    /// Parses `#rrggbb` (the leading `#` is optional).
    pub fn parse_css_hex(raw: &str) -> Option<Self> {
        let digits = raw.strip_prefix('#').unwrap_or(raw);
        if digits.len() != 6 {
            return None;
        }
        u32::from_str_radix(digits, 16).ok().map(Self::from_hex)
    }

    pub fn to_rgba(self, alpha: f32) -> [u8; 4] {
        [self.r, self.g, self.b, alpha_to_u8(alpha)]
    }

    /// Multiplicative tint, matching how sprite tints darken toward the tint color.
    pub fn multiply(self, other: Color) -> Color {
        Color {
            r: ((self.r as u16 * other.r as u16) / 255) as u8,
            g: ((self.g as u16 * other.g as u16) / 255) as u8,
            b: ((self.b as u16 * other.b as u16) / 255) as u8,
        }
    }
}

pub(crate) fn alpha_to_u8(alpha: f32) -> u8 {
    if !alpha.is_finite() {
        return 255;
    }
    (alpha.clamp(0.0, 1.0) * 255.0).round() as u8
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    FillCircle {
        radius: f32,
        color: Color,
        alpha: f32,
    },
    StrokeCircle {
        radius: f32,
        line_width: f32,
        color: Color,
        alpha: f32,
    },
}

/// Retained list of vector primitives drawn relative to the owning node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Graphics {
    shapes: Vec<Shape>,
}

impl Graphics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.shapes.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    pub fn fill_circle(&mut self, radius: f32, color: Color, alpha: f32) -> &mut Self {
        self.shapes.push(Shape::FillCircle {
            radius,
            color,
            alpha,
        });
        self
    }

    pub fn stroke_circle(
        &mut self,
        radius: f32,
        line_width: f32,
        color: Color,
        alpha: f32,
    ) -> &mut Self {
        self.shapes.push(Shape::StrokeCircle {
            radius,
            line_width,
            color,
            alpha,
        });
        self
    }
}
