//! Стили субтитров
//!
//! Четыре взаимоисключающих режима отрисовки. В проекте стиль хранится
//! как строковый тег ([`SubtitleStyleKind`]), а при отрисовке разворачивается
//! в [`SubtitleStyle`] с параметрами, нужными только этому режиму.

use serde::{Deserialize, Serialize};

/// Цвет RGBA, 8 бит на канал, без предумножения альфы
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const WHITE: Rgba = Rgba::rgb(255, 255, 255);
    pub const BLACK: Rgba = Rgba::rgb(0, 0, 0);
    pub const MAGENTA: Rgba = Rgba::rgb(255, 0, 255);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Цвет из HSL: тон в градусах, насыщенность и светлота в [0, 1]
    pub fn from_hsl(hue: f32, saturation: f32, lightness: f32) -> Self {
        let h = hue.rem_euclid(360.0) / 60.0;
        let c = (1.0 - (2.0 * lightness - 1.0).abs()) * saturation;
        let x = c * (1.0 - (h % 2.0 - 1.0).abs());
        let m = lightness - c / 2.0;

        let (r, g, b) = match h as u32 {
            0 => (c, x, 0.0),
            1 => (x, c, 0.0),
            2 => (0.0, c, x),
            3 => (0.0, x, c),
            4 => (x, 0.0, c),
            _ => (c, 0.0, x),
        };

        let to_u8 = |v: f32| ((v + m).clamp(0.0, 1.0) * 255.0).round() as u8;
        Self::rgb(to_u8(r), to_u8(g), to_u8(b))
    }
}

/// Насыщенность начертания, как в CSS
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FontWeight {
    Medium,
    Bold,
    Heavy,
}

impl FontWeight {
    pub fn css_value(&self) -> u16 {
        match self {
            Self::Medium => 500,
            Self::Bold => 700,
            Self::Heavy => 900,
        }
    }

    pub fn is_bold(&self) -> bool {
        self.css_value() >= 600
    }
}

/// Тег стиля в сохраненном проекте
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SubtitleStyleKind {
    #[default]
    Viral,
    Minimal,
    Neon,
    Karaoke,
}

/// Крупный текст с черной обводкой и желтым градиентом
#[derive(Debug, Clone, PartialEq)]
pub struct ViralStyle {
    pub gradient_top: Rgba,
    pub gradient_bottom: Rgba,
    pub outline: Rgba,
    /// Толщина обводки в долях размера шрифта
    pub outline_ratio: f32,
}

impl Default for ViralStyle {
    fn default() -> Self {
        Self {
            gradient_top: Rgba::rgb(255, 242, 0),
            gradient_bottom: Rgba::rgb(255, 184, 0),
            outline: Rgba::BLACK,
            outline_ratio: 0.2,
        }
    }
}

/// Белый текст на полупрозрачной черной «таблетке»
#[derive(Debug, Clone, PartialEq)]
pub struct MinimalStyle {
    pub text: Rgba,
    pub background: Rgba,
    /// Горизонтальный отступ в долях размера шрифта
    pub padding_x: f32,
    /// Вертикальный отступ в долях размера шрифта
    pub padding_y: f32,
}

impl Default for MinimalStyle {
    fn default() -> Self {
        Self {
            text: Rgba::WHITE,
            background: Rgba::rgba(0, 0, 0, 153),
            padding_x: 0.5,
            padding_y: 0.25,
        }
    }
}

/// Белый текст со свечением, тон которого меняется со временем
#[derive(Debug, Clone, PartialEq)]
pub struct NeonStyle {
    pub text: Rgba,
    /// Скорость вращения тона, градусов в секунду
    pub hue_speed: f32,
    /// Радиус свечения в долях размера шрифта
    pub glow_ratio: f32,
}

impl Default for NeonStyle {
    fn default() -> Self {
        Self {
            text: Rgba::WHITE,
            hue_speed: 50.0,
            glow_ratio: 0.35,
        }
    }
}

impl NeonStyle {
    /// `hue = (time * 50) mod 360`
    pub fn hue_at(&self, time: f64) -> f32 {
        ((time * self.hue_speed as f64).rem_euclid(360.0)) as f32
    }

    pub fn glow_color(&self, time: f64) -> Rgba {
        Rgba::from_hsl(self.hue_at(time), 1.0, 0.5)
    }
}

/// Белый текст с пурпурной заливкой, которая «бежит» по строке.
///
/// Доля заливки периодична по времени и не привязана к фонемам.
#[derive(Debug, Clone, PartialEq)]
pub struct KaraokeStyle {
    pub base: Rgba,
    pub highlight: Rgba,
    /// Период одного прохода заливки, секунды
    pub sweep_period: f64,
}

impl Default for KaraokeStyle {
    fn default() -> Self {
        Self {
            base: Rgba::WHITE,
            highlight: Rgba::MAGENTA,
            sweep_period: 2.0,
        }
    }
}

impl KaraokeStyle {
    /// Доля ширины строки под заливкой, в [0, 1)
    pub fn sweep_fraction(&self, time: f64) -> f32 {
        if self.sweep_period <= 0.0 || !time.is_finite() {
            return 0.0;
        }
        (time / self.sweep_period).rem_euclid(1.0) as f32
    }
}

/// Стиль отрисовки субтитров
#[derive(Debug, Clone, PartialEq)]
pub enum SubtitleStyle {
    Viral(ViralStyle),
    Minimal(MinimalStyle),
    Neon(NeonStyle),
    Karaoke(KaraokeStyle),
}

impl SubtitleStyle {
    pub fn kind(&self) -> SubtitleStyleKind {
        match self {
            Self::Viral(_) => SubtitleStyleKind::Viral,
            Self::Minimal(_) => SubtitleStyleKind::Minimal,
            Self::Neon(_) => SubtitleStyleKind::Neon,
            Self::Karaoke(_) => SubtitleStyleKind::Karaoke,
        }
    }

    /// Начертание текста для стиля
    pub fn weight(&self) -> FontWeight {
        match self {
            Self::Viral(_) => FontWeight::Heavy,
            Self::Minimal(_) => FontWeight::Medium,
            Self::Neon(_) | Self::Karaoke(_) => FontWeight::Bold,
        }
    }
}

impl Default for SubtitleStyle {
    fn default() -> Self {
        SubtitleStyleKind::default().into()
    }
}

impl From<SubtitleStyleKind> for SubtitleStyle {
    fn from(kind: SubtitleStyleKind) -> Self {
        match kind {
            SubtitleStyleKind::Viral => Self::Viral(ViralStyle::default()),
            SubtitleStyleKind::Minimal => Self::Minimal(MinimalStyle::default()),
            SubtitleStyleKind::Neon => Self::Neon(NeonStyle::default()),
            SubtitleStyleKind::Karaoke => Self::Karaoke(KaraokeStyle::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hsl_primaries() {
        assert_eq!(Rgba::from_hsl(0.0, 1.0, 0.5), Rgba::rgb(255, 0, 0));
        assert_eq!(Rgba::from_hsl(120.0, 1.0, 0.5), Rgba::rgb(0, 255, 0));
        assert_eq!(Rgba::from_hsl(240.0, 1.0, 0.5), Rgba::rgb(0, 0, 255));
        assert_eq!(Rgba::from_hsl(360.0, 1.0, 0.5), Rgba::rgb(255, 0, 0));
    }

    #[test]
    fn test_neon_hue_cycles() {
        let neon = NeonStyle::default();
        assert_eq!(neon.hue_at(0.0), 0.0);
        assert_eq!(neon.hue_at(2.0), 100.0);
        assert_eq!(neon.hue_at(7.2), 0.0);
        assert!((neon.hue_at(8.0) - 40.0).abs() < 1e-3);
    }

    #[test]
    fn test_karaoke_sweep_is_periodic() {
        let karaoke = KaraokeStyle::default();
        assert_eq!(karaoke.sweep_fraction(0.0), 0.0);
        assert_eq!(karaoke.sweep_fraction(1.0), 0.5);
        assert_eq!(karaoke.sweep_fraction(2.0), 0.0);
        assert_eq!(karaoke.sweep_fraction(3.5), 0.75);
    }

    #[test]
    fn test_kind_round_trip() {
        for kind in [
            SubtitleStyleKind::Viral,
            SubtitleStyleKind::Minimal,
            SubtitleStyleKind::Neon,
            SubtitleStyleKind::Karaoke,
        ] {
            assert_eq!(SubtitleStyle::from(kind).kind(), kind);
        }
        let kind: SubtitleStyleKind = serde_json::from_str("\"karaoke\"").unwrap();
        assert_eq!(kind, SubtitleStyleKind::Karaoke);
    }
}
