//! Модуль субтитров
//!
//! Поиск активной реплики, раскладка блока, стили и их отрисовка,
//! экспорт в WebVTT.

pub mod canvas;
pub mod layout;
pub mod render;
pub mod resolver;
pub mod style;
pub mod vtt;

pub use canvas::{FontdueGlyphs, GlyphSource, PixmapCanvas, SubtitleCanvas};
pub use render::{render_subtitle, SubtitlePlacement};
pub use resolver::{active_beat, active_text};
pub use style::{SubtitleStyle, SubtitleStyleKind};
