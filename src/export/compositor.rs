//! Наложение субтитра на кадр

use tiny_skia::Pixmap;

use crate::script::ScriptBeat;
use crate::subtitle::canvas::{GlyphSource, PixmapCanvas};
use crate::subtitle::render::{render_subtitle, SubtitlePlacement};
use crate::subtitle::resolver::active_beat;
use crate::subtitle::style::SubtitleStyle;

/// Нарисовать на кадре субтитр, активный в момент `time`.
///
/// Возвращает индекс нарисованного бита; вне сценария кадр не меняется.
pub fn compose_subtitle(
    frame: &mut Pixmap,
    glyphs: &dyn GlyphSource,
    beats: &[ScriptBeat],
    time: f64,
    style: &SubtitleStyle,
    placement: &SubtitlePlacement,
) -> Option<usize> {
    let (index, beat) = active_beat(beats, time)?;
    if beat.content.trim().is_empty() {
        return None;
    }
    let mut canvas = PixmapCanvas::new(frame, glyphs);
    render_subtitle(&mut canvas, &beat.content, placement, style, time);
    Some(index)
}
