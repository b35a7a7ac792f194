//! Поиск активного субтитра для момента воспроизведения

use crate::script::ScriptBeat;

/// Найти бит, чей интервал `[start, start + duration)` содержит `time`.
///
/// Линейный проход с накоплением длительностей. Для отрицательного,
/// нечислового времени и времени за пределами сценария возвращает `None`.
pub fn active_beat(beats: &[ScriptBeat], time: f64) -> Option<(usize, &ScriptBeat)> {
    if !time.is_finite() || time < 0.0 {
        return None;
    }

    let mut accumulated = 0.0;
    for (index, beat) in beats.iter().enumerate() {
        if time >= accumulated && time < accumulated + beat.duration {
            return Some((index, beat));
        }
        accumulated += beat.duration;
    }
    None
}

/// Текст активного субтитра или `None`
pub fn active_text(beats: &[ScriptBeat], time: f64) -> Option<&str> {
    active_beat(beats, time).map(|(_, beat)| beat.content.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::BeatRole;

    fn beats() -> Vec<ScriptBeat> {
        vec![
            ScriptBeat::new(BeatRole::Hook, "Xin chào", 3.0),
            ScriptBeat::new(BeatRole::Cta, "Theo dõi ngay", 2.0),
        ]
    }

    #[test]
    fn test_boundary_belongs_to_next_beat() {
        let beats = beats();
        assert_eq!(active_text(&beats, 2.999), Some("Xin chào"));
        assert_eq!(active_text(&beats, 3.0), Some("Theo dõi ngay"));
        assert_eq!(active_text(&beats, 0.0), Some("Xin chào"));
    }

    #[test]
    fn test_outside_of_script() {
        let beats = beats();
        assert_eq!(active_text(&beats, -0.001), None);
        assert_eq!(active_text(&beats, 5.0), None);
        assert_eq!(active_text(&beats, 42.0), None);
        assert_eq!(active_text(&beats, f64::NAN), None);
        assert_eq!(active_text(&[], 0.0), None);
    }

    #[test]
    fn test_at_most_one_beat_for_any_time() {
        let beats = vec![
            ScriptBeat::new(BeatRole::Hook, "a", 0.7),
            ScriptBeat::new(BeatRole::Body, "b", 1.3),
            ScriptBeat::new(BeatRole::Body, "c", 0.25),
            ScriptBeat::new(BeatRole::Cta, "d", 2.0),
        ];
        let total: f64 = beats.iter().map(|b| b.duration).sum();

        let mut t = -0.5;
        while t < total + 0.5 {
            let hits = beats
                .iter()
                .scan(0.0, |start, beat| {
                    let hit = t >= *start && t < *start + beat.duration;
                    *start += beat.duration;
                    Some(hit)
                })
                .filter(|hit| *hit)
                .count();
            assert!(hits <= 1);

            let resolved = active_beat(&beats, t);
            if t < 0.0 || t >= total {
                assert!(resolved.is_none(), "t = {}", t);
            } else {
                assert!(resolved.is_some(), "t = {}", t);
            }
            t += 0.01;
        }
    }
}
