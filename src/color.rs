/// Represents a color in RGBA format.
///
/// Each channel is an 8-bit unsigned integer. Output streams store colors in this packed
/// form so a color channel upload is exactly four bytes per vertex.
///
/// # Examples
///
/// ```
/// use tessera::Color;
///
/// let red = Color::rgb(255, 0, 0);
/// assert_eq!(red.normalize(), [1.0, 0.0, 0.0, 1.0]);
///
/// let semi_blue = Color::rgba(0, 0, 255, 128);
/// assert_eq!(semi_blue.to_array(), [0, 0, 255, 128]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Color(pub [u8; 4]);

impl Color {
    /// A fully transparent color.
    pub const TRANSPARENT: Self = Self([0, 0, 0, 0]);
    /// Opaque black.
    pub const BLACK: Self = Self([0, 0, 0, 255]);
    /// Opaque white.
    pub const WHITE: Self = Self([255, 255, 255, 255]);

    /// Creates a new color with the specified RGB values and full opacity.
    ///
    /// # Examples
    ///
    /// ```
    /// use tessera::Color;
    ///
    /// let green = Color::rgb(0, 255, 0);
    /// assert_eq!(green, Color([0, 255, 0, 255]));
    /// ```
    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self([r, g, b, 255])
    }

    /// Creates a new color with the specified RGBA values.
    pub fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self([r, g, b, a])
    }

    /// Normalizes the color values to the range [0.0, 1.0].
    pub fn normalize(&self) -> [f32; 4] {
        [
            self.0[0] as f32 / 255.0,
            self.0[1] as f32 / 255.0,
            self.0[2] as f32 / 255.0,
            self.0[3] as f32 / 255.0,
        ]
    }

    /// Returns the color as an array of 4 `u8` values.
    pub fn to_array(&self) -> [u8; 4] {
        self.0
    }

    /// Linear interpolation between two colors, channel by channel.
    ///
    /// ```
    /// use tessera::Color;
    ///
    /// let mid = Color::BLACK.lerp(Color::WHITE, 0.5);
    /// assert_eq!(mid, Color([128, 128, 128, 255]));
    /// ```
    pub fn lerp(self, other: Color, t: f32) -> Color {
        let mut out = [0u8; 4];
        for (i, channel) in out.iter_mut().enumerate() {
            let a = self.0[i] as f32;
            let b = other.0[i] as f32;
            *channel = (a + (b - a) * t).round().clamp(0.0, 255.0) as u8;
        }
        Color(out)
    }
}

impl From<[u8; 4]> for Color {
    fn from(value: [u8; 4]) -> Self {
        Color(value)
    }
}
