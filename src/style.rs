use crate::color::Color;
use crate::id::TextureId;
use crate::stroke::Stroke;

/// Lighting channels carried per vertex into the fill stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    pub ambient: Color,
    pub specular: Color,
    pub emissive: Color,
    pub shininess: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            ambient: Color::rgb(204, 204, 204),
            specular: Color::rgb(128, 128, 128),
            emissive: Color::BLACK,
            shininess: 1.0,
        }
    }
}

/// How authored texture coordinates are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextureMode {
    /// Coordinates are already in `0.0..=1.0`.
    #[default]
    Normal,
    /// Coordinates are in texels and get divided by the texture size.
    Image,
}

/// Winding rule used by the general polygon tessellator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FillRule {
    #[default]
    EvenOdd,
    NonZero,
}

/// Visual state of a shape node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Style {
    pub fill: bool,
    pub fill_color: Color,
    pub stroke_enabled: bool,
    pub stroke: Stroke,
    pub material: Material,
    pub texture: Option<TextureId>,
    pub texture_mode: TextureMode,
    /// Fill color of textured shapes, which ignore `fill_color`. White when unset.
    pub tint: Option<Color>,
    pub fill_rule: FillRule,
}

impl Default for Style {
    fn default() -> Self {
        Self {
            fill: true,
            fill_color: Color::WHITE,
            stroke_enabled: true,
            stroke: Stroke::default(),
            material: Material::default(),
            texture: None,
            texture_mode: TextureMode::default(),
            tint: None,
            fill_rule: FillRule::default(),
        }
    }
}

impl Style {
    pub fn fill_only(color: Color) -> Self {
        Self {
            fill_color: color,
            stroke_enabled: false,
            ..Self::default()
        }
    }

    pub fn stroke_only(stroke: Stroke) -> Self {
        Self {
            fill: false,
            stroke,
            ..Self::default()
        }
    }

    /// Color written to the fill of a shape drawn with a texture.
    #[inline]
    pub fn tint_color(&self) -> Color {
        self.tint.unwrap_or(Color::WHITE)
    }

    #[inline]
    pub fn has_stroke(&self) -> bool {
        self.stroke_enabled && self.stroke.weight > 0.0
    }
}
