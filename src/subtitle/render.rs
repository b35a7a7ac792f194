//! Отрисовка активного субтитра выбранным стилем

use crate::config::SubtitleMetrics;
use crate::subtitle::canvas::{Bounds, Fill, FontSpec, Glow, HorizontalClip, Stroke, SubtitleCanvas, TextPaint};
use crate::subtitle::layout::{layout_block, LaidOutLine};
use crate::subtitle::style::{KaraokeStyle, MinimalStyle, NeonStyle, SubtitleStyle, ViralStyle};

/// Геометрия блока субтитров на кадре
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubtitlePlacement {
    pub anchor_x: f32,
    pub anchor_y: f32,
    pub font_size: f32,
    /// Доля ширины холста, доступная строке
    pub wrap_fraction: f32,
    pub line_height: f32,
}

impl SubtitlePlacement {
    /// Размещение по умолчанию для кадра `width x height`
    pub fn for_frame(width: u32, height: u32, metrics: &SubtitleMetrics) -> Self {
        let short_side = width.min(height) as f32;
        Self {
            anchor_x: width as f32 / 2.0,
            anchor_y: height as f32 * metrics.anchor,
            font_size: (short_side * metrics.font_scale).max(8.0),
            wrap_fraction: metrics.wrap_fraction,
            line_height: metrics.line_height,
        }
    }
}

/// Нарисовать `text` в стиле `style` для момента `time`.
///
/// Возвращает разложенные строки, пустой текст ничего не рисует.
pub fn render_subtitle<C>(
    canvas: &mut C,
    text: &str,
    placement: &SubtitlePlacement,
    style: &SubtitleStyle,
    time: f64,
) -> Vec<LaidOutLine>
where
    C: SubtitleCanvas + ?Sized,
{
    let font = FontSpec {
        size: placement.font_size,
        weight: style.weight(),
    };
    let max_width = canvas.width() as f32 * placement.wrap_fraction;
    let lines = layout_block(
        text,
        max_width,
        placement.anchor_y,
        font.size,
        placement.line_height,
        |line| canvas.measure_text(line, &font),
    );

    for line in &lines {
        match style {
            SubtitleStyle::Viral(viral) => draw_viral(canvas, line, placement.anchor_x, font, viral),
            SubtitleStyle::Minimal(minimal) => draw_minimal(canvas, line, placement.anchor_x, font, minimal),
            SubtitleStyle::Neon(neon) => draw_neon(canvas, line, placement.anchor_x, font, neon, time),
            SubtitleStyle::Karaoke(karaoke) => draw_karaoke(canvas, line, placement.anchor_x, font, karaoke, time),
        }
    }
    lines
}

fn draw_viral<C: SubtitleCanvas + ?Sized>(canvas: &mut C, line: &LaidOutLine, cx: f32, font: FontSpec, style: &ViralStyle) {
    let paint = TextPaint {
        font,
        fill: Fill::VerticalGradient {
            top: style.gradient_top,
            bottom: style.gradient_bottom,
        },
        stroke: Some(Stroke {
            color: style.outline,
            width: font.size * style.outline_ratio,
        }),
        glow: None,
        clip: None,
    };
    canvas.draw_text(&line.text, cx, line.center_y, &paint);
}

fn draw_minimal<C: SubtitleCanvas + ?Sized>(canvas: &mut C, line: &LaidOutLine, cx: f32, font: FontSpec, style: &MinimalStyle) {
    let pad_x = font.size * style.padding_x;
    let pad_y = font.size * style.padding_y;
    let bounds = Bounds {
        x: cx - line.width / 2.0 - pad_x,
        y: line.center_y - font.size / 2.0 - pad_y,
        width: line.width + 2.0 * pad_x,
        height: font.size + 2.0 * pad_y,
    };
    canvas.fill_rounded_rect(bounds, bounds.height / 2.0, style.background);
    canvas.draw_text(&line.text, cx, line.center_y, &TextPaint::solid(font, style.text));
}

fn draw_neon<C: SubtitleCanvas + ?Sized>(
    canvas: &mut C,
    line: &LaidOutLine,
    cx: f32,
    font: FontSpec,
    style: &NeonStyle,
    time: f64,
) {
    let paint = TextPaint {
        glow: Some(Glow {
            color: style.glow_color(time),
            radius: font.size * style.glow_ratio,
        }),
        ..TextPaint::solid(font, style.text)
    };
    canvas.draw_text(&line.text, cx, line.center_y, &paint);
}

fn draw_karaoke<C: SubtitleCanvas + ?Sized>(
    canvas: &mut C,
    line: &LaidOutLine,
    cx: f32,
    font: FontSpec,
    style: &KaraokeStyle,
    time: f64,
) {
    canvas.draw_text(&line.text, cx, line.center_y, &TextPaint::solid(font, style.base));

    let swept = line.width * style.sweep_fraction(time);
    if swept <= 0.0 {
        return;
    }
    let paint = TextPaint {
        clip: Some(HorizontalClip {
            left: cx - line.width / 2.0,
            width: swept,
        }),
        ..TextPaint::solid(font, style.highlight)
    };
    canvas.draw_text(&line.text, cx, line.center_y, &paint);
}
