//! Перенос строк и вертикальная раскладка блока субтитров

/// Одна строка блока с центром по вертикали
#[derive(Debug, Clone, PartialEq)]
pub struct LaidOutLine {
    pub text: String,
    pub width: f32,
    /// Вертикальный центр строки
    pub center_y: f32,
}

/// Жадный перенос по словам.
///
/// Строка обрывается, когда следующее слово сделало бы ее шире `max_width`.
/// Слово, которое шире лимита само по себе, занимает отдельную строку.
pub fn wrap_lines<F>(text: &str, max_width: f32, measure: F) -> Vec<String>
where
    F: Fn(&str) -> f32,
{
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if current.is_empty() {
            current.push_str(word);
            continue;
        }

        let candidate = format!("{} {}", current, word);
        if measure(&candidate) > max_width {
            lines.push(std::mem::take(&mut current));
            current.push_str(word);
        } else {
            current = candidate;
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Разложить текст в блок строк, центрированный на `anchor_y`.
///
/// Высота блока равна `lines * font_size * line_height`.
pub fn layout_block<F>(
    text: &str,
    max_width: f32,
    anchor_y: f32,
    font_size: f32,
    line_height: f32,
    measure: F,
) -> Vec<LaidOutLine>
where
    F: Fn(&str) -> f32,
{
    let lines = wrap_lines(text, max_width, &measure);
    let step = font_size * line_height;
    let block_height = lines.len() as f32 * step;
    let top = anchor_y - block_height / 2.0;

    lines
        .into_iter()
        .enumerate()
        .map(|(i, line)| LaidOutLine {
            width: measure(&line),
            center_y: top + step * (i as f32 + 0.5),
            text: line,
        })
        .collect()
}
