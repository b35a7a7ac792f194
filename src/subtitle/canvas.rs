//! Поверхность рисования субтитров
//!
//! [`SubtitleCanvas`] описывает ровно те операции, которые нужны стилям:
//! измерить строку, залить скругленный прямоугольник, нарисовать строку
//! с заливкой, обводкой, свечением и горизонтальной обрезкой.
//! Рабочая реализация [`PixmapCanvas`] рисует в `tiny_skia::Pixmap`,
//! глифы растеризует `fontdue`.

use std::fs;
use std::path::Path;

use fontdue::{Font, FontSettings};
use tiny_skia::{FillRule, Paint, Path as SkPath, PathBuilder, Pixmap, Transform};

use crate::error::{ClipSyncError, Result};
use crate::subtitle::style::{FontWeight, Rgba};

/// Шрифт для измерения и отрисовки
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FontSpec {
    pub size: f32,
    pub weight: FontWeight,
}

/// Прямоугольник в координатах холста
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Заливка текста
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Fill {
    Solid(Rgba),
    /// Вертикальный градиент в пределах `center_y ± size / 2`
    VerticalGradient { top: Rgba, bottom: Rgba },
}

/// Обводка, рисуется под заливкой
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stroke {
    pub color: Rgba,
    /// Полная толщина линии, снаружи глифа остается половина
    pub width: f32,
}

/// Размытое свечение вокруг текста
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Glow {
    pub color: Rgba,
    pub radius: f32,
}

/// Видимая по горизонтали полоса `[left, left + width)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HorizontalClip {
    pub left: f32,
    pub width: f32,
}

/// Параметры отрисовки одной строки
#[derive(Debug, Clone, PartialEq)]
pub struct TextPaint {
    pub font: FontSpec,
    pub fill: Fill,
    pub stroke: Option<Stroke>,
    pub glow: Option<Glow>,
    pub clip: Option<HorizontalClip>,
}

impl TextPaint {
    pub fn solid(font: FontSpec, color: Rgba) -> Self {
        Self {
            font,
            fill: Fill::Solid(color),
            stroke: None,
            glow: None,
            clip: None,
        }
    }
}

/// Поверхность, на которой стили рисуют субтитры.
///
/// Текст всегда центрируется по `center_x` и по вертикальной середине строки.
pub trait SubtitleCanvas {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn measure_text(&self, text: &str, font: &FontSpec) -> f32;
    fn fill_rounded_rect(&mut self, bounds: Bounds, radius: f32, color: Rgba);
    fn draw_text(&mut self, text: &str, center_x: f32, center_y: f32, paint: &TextPaint);
}

/// Растр одного глифа, покрытие 0..=255 построчно
#[derive(Debug, Clone, Default)]
pub struct GlyphBitmap {
    pub width: usize,
    pub height: usize,
    /// Смещение левого края от пера
    pub xmin: i32,
    /// Смещение нижнего края от базовой линии, вверх положительно
    pub ymin: i32,
    pub coverage: Vec<u8>,
}

/// Источник глифов
pub trait GlyphSource: Send + Sync {
    fn advance(&self, ch: char, size: f32, weight: FontWeight) -> f32;
    fn rasterize(&self, ch: char, size: f32, weight: FontWeight) -> GlyphBitmap;
    /// `(ascent, descent)`, descent отрицательный
    fn line_metrics(&self, size: f32) -> (f32, f32);
    /// Есть ли настоящее начертание для `weight`
    fn has_weight(&self, weight: FontWeight) -> bool;
}

/// Глифы из TTF/OTF через fontdue
pub struct FontdueGlyphs {
    regular: Font,
    bold: Option<Font>,
}

impl FontdueGlyphs {
    pub fn from_bytes(regular: Vec<u8>, bold: Option<Vec<u8>>) -> Result<Self> {
        let parse = |bytes: Vec<u8>| {
            Font::from_bytes(bytes, FontSettings::default())
                .map_err(|e| ClipSyncError::InvalidFormat(format!("Failed to parse font: {}", e)))
        };
        Ok(Self {
            regular: parse(regular)?,
            bold: bold.map(parse).transpose()?,
        })
    }

    pub fn load<P: AsRef<Path>>(regular: P, bold: Option<P>) -> Result<Self> {
        let regular = fs::read(regular.as_ref())?;
        let bold = match bold {
            Some(path) => Some(fs::read(path.as_ref())?),
            None => None,
        };
        Self::from_bytes(regular, bold)
    }

    fn font_for(&self, weight: FontWeight) -> &Font {
        match (&self.bold, weight.is_bold()) {
            (Some(bold), true) => bold,
            _ => &self.regular,
        }
    }
}

impl GlyphSource for FontdueGlyphs {
    fn advance(&self, ch: char, size: f32, weight: FontWeight) -> f32 {
        self.font_for(weight).metrics(ch, size).advance_width
    }

    fn rasterize(&self, ch: char, size: f32, weight: FontWeight) -> GlyphBitmap {
        let (metrics, coverage) = self.font_for(weight).rasterize(ch, size);
        GlyphBitmap {
            width: metrics.width,
            height: metrics.height,
            xmin: metrics.xmin,
            ymin: metrics.ymin,
            coverage,
        }
    }

    fn line_metrics(&self, size: f32) -> (f32, f32) {
        self.regular
            .horizontal_line_metrics(size)
            .map(|m| (m.ascent, m.descent))
            .unwrap_or((size * 0.8, -size * 0.2))
    }

    fn has_weight(&self, weight: FontWeight) -> bool {
        !weight.is_bold() || self.bold.is_some()
    }
}

/// Маска покрытия с собственным началом координат
#[derive(Debug, Clone)]
struct Coverage {
    x0: i32,
    y0: i32,
    width: usize,
    height: usize,
    data: Vec<u8>,
}

impl Coverage {
    fn new(x0: i32, y0: i32, width: usize, height: usize) -> Self {
        Self {
            x0,
            y0,
            width,
            height,
            data: vec![0; width * height],
        }
    }

    fn with_data(&self, data: Vec<u8>) -> Self {
        Self {
            data,
            ..*self
        }
    }

    fn stamp(&mut self, glyph: &GlyphBitmap, left: i32, top: i32) {
        for gy in 0..glyph.height {
            let y = top + gy as i32 - self.y0;
            if y < 0 || y as usize >= self.height {
                continue;
            }
            for gx in 0..glyph.width {
                let x = left + gx as i32 - self.x0;
                if x < 0 || x as usize >= self.width {
                    continue;
                }
                let idx = y as usize * self.width + x as usize;
                let value = glyph.coverage[gy * glyph.width + gx];
                self.data[idx] = self.data[idx].max(value);
            }
        }
    }

    /// Расширение формы на `radius` пикселей, квадратное ядро
    fn dilate(&self, radius: usize) -> Self {
        if radius == 0 {
            return self.clone();
        }
        let (w, h) = (self.width, self.height);
        let mut horizontal = vec![0u8; w * h];
        for y in 0..h {
            let row = &self.data[y * w..(y + 1) * w];
            for x in 0..w {
                let from = x.saturating_sub(radius);
                let to = (x + radius + 1).min(w);
                horizontal[y * w + x] = row[from..to].iter().copied().max().unwrap_or(0);
            }
        }
        let mut out = vec![0u8; w * h];
        for x in 0..w {
            for y in 0..h {
                let from = y.saturating_sub(radius);
                let to = (y + radius + 1).min(h);
                out[y * w + x] = (from..to).map(|yy| horizontal[yy * w + x]).max().unwrap_or(0);
            }
        }
        self.with_data(out)
    }

    /// Размытие прямоугольным окном, отдельно по строкам и столбцам
    fn blur(&self, radius: usize) -> Self {
        if radius == 0 {
            return self.clone();
        }
        let (w, h) = (self.width, self.height);
        let window = (2 * radius + 1) as u32;
        let mut horizontal = vec![0u8; w * h];
        for y in 0..h {
            for x in 0..w {
                let from = x.saturating_sub(radius);
                let to = (x + radius + 1).min(w);
                let sum: u32 = self.data[y * w + from..y * w + to].iter().map(|&v| v as u32).sum();
                horizontal[y * w + x] = (sum / window) as u8;
            }
        }
        let mut out = vec![0u8; w * h];
        for x in 0..w {
            for y in 0..h {
                let from = y.saturating_sub(radius);
                let to = (y + radius + 1).min(h);
                let sum: u32 = (from..to).map(|yy| horizontal[yy * w + x] as u32).sum();
                out[y * w + x] = (sum / window) as u8;
            }
        }
        self.with_data(out)
    }
}

/// Холст поверх кадра `tiny_skia::Pixmap`
pub struct PixmapCanvas<'a> {
    pixmap: &'a mut Pixmap,
    glyphs: &'a dyn GlyphSource,
}

impl<'a> PixmapCanvas<'a> {
    pub fn new(pixmap: &'a mut Pixmap, glyphs: &'a dyn GlyphSource) -> Self {
        Self { pixmap, glyphs }
    }

    /// Толщина искусственного полужирного, когда нет отдельного начертания
    fn faux_bold_radius(&self, font: &FontSpec) -> usize {
        if font.weight.is_bold() && !self.glyphs.has_weight(font.weight) {
            let factor = match font.weight {
                FontWeight::Heavy => 0.04,
                _ => 0.025,
            };
            (font.size * factor).round().max(1.0) as usize
        } else {
            0
        }
    }

    fn rasterize_line(&self, text: &str, center_x: f32, center_y: f32, font: &FontSpec, pad: usize) -> Coverage {
        let width = self.measure_text(text, font);
        let (ascent, descent) = self.glyphs.line_metrics(font.size);
        let baseline = center_y + (ascent + descent) / 2.0;
        let left = center_x - width / 2.0;

        let x0 = left.floor() as i32 - pad as i32;
        let y0 = (baseline - ascent).floor() as i32 - pad as i32;
        let cov_width = width.ceil() as usize + 2 * pad + 2;
        let cov_height = (ascent - descent).ceil() as usize + 2 * pad + 2;
        let mut coverage = Coverage::new(x0, y0, cov_width, cov_height);

        let mut pen = left;
        for ch in text.chars() {
            let glyph = self.glyphs.rasterize(ch, font.size, font.weight);
            if glyph.width > 0 && glyph.height > 0 {
                let glyph_left = (pen + glyph.xmin as f32).round() as i32;
                let glyph_top = (baseline - (glyph.ymin + glyph.height as i32) as f32).round() as i32;
                coverage.stamp(&glyph, glyph_left, glyph_top);
            }
            pen += self.glyphs.advance(ch, font.size, font.weight);
        }
        coverage
    }

    fn composite(&mut self, coverage: &Coverage, fill: &Fill, center_y: f32, size: f32, clip: Option<&HorizontalClip>) {
        let canvas_w = self.pixmap.width() as i32;
        let canvas_h = self.pixmap.height() as i32;
        let (clip_left, clip_right) = match clip {
            Some(c) => (c.left, c.left + c.width),
            None => (f32::NEG_INFINITY, f32::INFINITY),
        };
        let data = self.pixmap.data_mut();

        for cy in 0..coverage.height {
            let y = coverage.y0 + cy as i32;
            if y < 0 || y >= canvas_h {
                continue;
            }
            let color = match fill {
                Fill::Solid(color) => *color,
                Fill::VerticalGradient { top, bottom } => {
                    let t = ((y as f32 + 0.5 - (center_y - size / 2.0)) / size).clamp(0.0, 1.0);
                    lerp(*top, *bottom, t)
                }
            };
            for cx in 0..coverage.width {
                let x = coverage.x0 + cx as i32;
                if x < 0 || x >= canvas_w {
                    continue;
                }
                let px = x as f32 + 0.5;
                if px < clip_left || px >= clip_right {
                    continue;
                }
                let value = coverage.data[cy * coverage.width + cx];
                if value == 0 {
                    continue;
                }
                let idx = (y as usize * canvas_w as usize + x as usize) * 4;
                blend_pixel(data, idx, color, value);
            }
        }
    }
}

impl SubtitleCanvas for PixmapCanvas<'_> {
    fn width(&self) -> u32 {
        self.pixmap.width()
    }

    fn height(&self) -> u32 {
        self.pixmap.height()
    }

    fn measure_text(&self, text: &str, font: &FontSpec) -> f32 {
        text.chars()
            .map(|ch| self.glyphs.advance(ch, font.size, font.weight))
            .sum()
    }

    fn fill_rounded_rect(&mut self, bounds: Bounds, radius: f32, color: Rgba) {
        let Some(path) = rounded_rect_path(bounds, radius) else {
            return;
        };
        let mut paint = Paint::default();
        paint.set_color_rgba8(color.r, color.g, color.b, color.a);
        paint.anti_alias = true;
        self.pixmap
            .fill_path(&path, &paint, FillRule::Winding, Transform::identity(), None);
    }

    fn draw_text(&mut self, text: &str, center_x: f32, center_y: f32, paint: &TextPaint) {
        if text.trim().is_empty() {
            return;
        }

        let bold = self.faux_bold_radius(&paint.font);
        let stroke = paint
            .stroke
            .map(|s| (s.width / 2.0).round().max(0.0) as usize)
            .unwrap_or(0);
        let glow = paint.glow.map(|g| g.radius.round().max(0.0) as usize).unwrap_or(0);
        let pad = bold + stroke + 2 * glow + 1;

        let base = self
            .rasterize_line(text, center_x, center_y, &paint.font, pad)
            .dilate(bold);
        let clip = paint.clip.as_ref();
        let size = paint.font.size;

        if let Some(g) = &paint.glow {
            let halo = base.dilate(glow / 3).blur(glow.max(1));
            self.composite(&halo, &Fill::Solid(g.color), center_y, size, clip);
        }
        if let Some(s) = &paint.stroke {
            let outline = base.dilate(stroke);
            self.composite(&outline, &Fill::Solid(s.color), center_y, size, clip);
        }
        self.composite(&base, &paint.fill, center_y, size, clip);
    }
}

fn rounded_rect_path(bounds: Bounds, radius: f32) -> Option<SkPath> {
    let Bounds { x, y, width: w, height: h } = bounds;
    if w <= 0.0 || h <= 0.0 {
        return None;
    }
    let r = radius.min(w / 2.0).min(h / 2.0).max(0.0);

    let mut pb = PathBuilder::new();
    pb.move_to(x + r, y);
    pb.line_to(x + w - r, y);
    pb.quad_to(x + w, y, x + w, y + r);
    pb.line_to(x + w, y + h - r);
    pb.quad_to(x + w, y + h, x + w - r, y + h);
    pb.line_to(x + r, y + h);
    pb.quad_to(x, y + h, x, y + h - r);
    pb.line_to(x, y + r);
    pb.quad_to(x, y, x + r, y);
    pb.close();
    pb.finish()
}

fn lerp(a: Rgba, b: Rgba, t: f32) -> Rgba {
    let mix = |x: u8, y: u8| (x as f32 + (y as f32 - x as f32) * t).round() as u8;
    Rgba::rgba(mix(a.r, b.r), mix(a.g, b.g), mix(a.b, b.b), mix(a.a, b.a))
}

/// Source-over поверх предумноженного RGBA
fn blend_pixel(data: &mut [u8], idx: usize, color: Rgba, coverage: u8) {
    let alpha = (coverage as u32 * color.a as u32 + 127) / 255;
    if alpha == 0 {
        return;
    }
    let inverse = 255 - alpha;
    for (offset, channel) in [color.r, color.g, color.b].into_iter().enumerate() {
        let src = (channel as u32 * alpha + 127) / 255;
        let dst = (data[idx + offset] as u32 * inverse + 127) / 255;
        data[idx + offset] = (src + dst).min(255) as u8;
    }
    let dst_alpha = (data[idx + 3] as u32 * inverse + 127) / 255;
    data[idx + 3] = (alpha + dst_alpha).min(255) as u8;
}


#[cfg(test)]
mod tests {
    use super::testing::BlockGlyphs;
    use super::*;

    fn font(size: f32) -> FontSpec {
        FontSpec {
            size,
            weight: FontWeight::Bold,
        }
    }

    fn pixel(pixmap: &Pixmap, x: u32, y: u32) -> [u8; 4] {
        let idx = ((y * pixmap.width() + x) * 4) as usize;
        let d = pixmap.data();
        [d[idx], d[idx + 1], d[idx + 2], d[idx + 3]]
    }

    #[test]
    fn test_measure_sums_advances() {
        let mut pixmap = Pixmap::new(100, 100).unwrap();
        let canvas = PixmapCanvas::new(&mut pixmap, &BlockGlyphs);
        assert_eq!(canvas.measure_text("abc", &font(20.0)), 36.0);
    }

    #[test]
    fn test_text_is_centered() {
        let mut pixmap = Pixmap::new(100, 100).unwrap();
        {
            let mut canvas = PixmapCanvas::new(&mut pixmap, &BlockGlyphs);
            canvas.draw_text("A", 50.0, 50.0, &TextPaint::solid(font(20.0), Rgba::WHITE));
        }
        // Перо с 44, глиф 10x14, базовая линия на 56
        assert_eq!(pixel(&pixmap, 48, 50), [255, 255, 255, 255]);
        assert_eq!(pixel(&pixmap, 44, 42), [255, 255, 255, 255]);
        assert_eq!(pixel(&pixmap, 43, 50)[3], 0);
        assert_eq!(pixel(&pixmap, 54, 50)[3], 0);
        assert_eq!(pixel(&pixmap, 0, 0)[3], 0);
    }

    #[test]
    fn test_stroke_surrounds_fill() {
        let mut pixmap = Pixmap::new(100, 100).unwrap();
        {
            let mut canvas = PixmapCanvas::new(&mut pixmap, &BlockGlyphs);
            let paint = TextPaint {
                stroke: Some(Stroke {
                    color: Rgba::BLACK,
                    width: 4.0,
                }),
                ..TextPaint::solid(font(20.0), Rgba::WHITE)
            };
            canvas.draw_text("A", 50.0, 50.0, &paint);
        }
        assert_eq!(pixel(&pixmap, 48, 50), [255, 255, 255, 255]);
        assert_eq!(pixel(&pixmap, 42, 50), [0, 0, 0, 255]);
        assert_eq!(pixel(&pixmap, 39, 50)[3], 0);
    }

    #[test]
    fn test_clip_limits_columns() {
        let mut pixmap = Pixmap::new(100, 100).unwrap();
        {
            let mut canvas = PixmapCanvas::new(&mut pixmap, &BlockGlyphs);
            let paint = TextPaint {
                clip: Some(HorizontalClip {
                    left: 44.0,
                    width: 5.0,
                }),
                ..TextPaint::solid(font(20.0), Rgba::MAGENTA)
            };
            canvas.draw_text("A", 50.0, 50.0, &paint);
        }
        assert_eq!(pixel(&pixmap, 46, 50), [255, 0, 255, 255]);
        assert_eq!(pixel(&pixmap, 50, 50)[3], 0);
    }

    #[test]
    fn test_rounded_rect_fills_interior() {
        let mut pixmap = Pixmap::new(100, 100).unwrap();
        {
            let mut canvas = PixmapCanvas::new(&mut pixmap, &BlockGlyphs);
            let bounds = Bounds {
                x: 10.0,
                y: 10.0,
                width: 80.0,
                height: 40.0,
            };
            canvas.fill_rounded_rect(bounds, 20.0, Rgba::rgba(0, 0, 0, 153));
        }
        let alpha = pixel(&pixmap, 50, 30)[3];
        assert!((150..=156).contains(&alpha), "alpha = {}", alpha);
        assert_eq!(pixel(&pixmap, 11, 11)[3], 0);
        assert_eq!(pixel(&pixmap, 50, 80)[3], 0);
    }

    #[test]
    fn test_gradient_goes_top_to_bottom() {
        let mut pixmap = Pixmap::new(100, 100).unwrap();
        {
            let mut canvas = PixmapCanvas::new(&mut pixmap, &BlockGlyphs);
            let paint = TextPaint {
                fill: Fill::VerticalGradient {
                    top: Rgba::rgb(255, 242, 0),
                    bottom: Rgba::rgb(255, 184, 0),
                },
                ..TextPaint::solid(font(20.0), Rgba::WHITE)
            };
            canvas.draw_text("A", 50.0, 50.0, &paint);
        }
        let top = pixel(&pixmap, 48, 43);
        let bottom = pixel(&pixmap, 48, 55);
        assert!(top[1] > bottom[1]);
        assert_eq!(top[2], 0);
    }
}
