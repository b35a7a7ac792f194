//! Модуль для работы с FFmpeg
//!
//! Проверка наличия бинарников и нужных кодировщиков, запуск ffprobe.

use std::process::{Command, Stdio};

use log::debug;

use crate::error::{ClipSyncError, Result};

/// Проверка наличия FFmpeg. Отсутствующий бинарник дает `Ok(false)`.
pub fn check_ffmpeg_installed(ffmpeg: &str) -> Result<bool> {
    match Command::new(ffmpeg)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
    {
        Ok(status) => Ok(status.success()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Имена кодировщиков из `ffmpeg -encoders`
pub fn list_encoders(ffmpeg: &str) -> Result<Vec<String>> {
    let output = Command::new(ffmpeg)
        .args(["-hide_banner", "-encoders"])
        .output()?;
    if !output.status.success() {
        return Err(ClipSyncError::VideoProcessing(format!(
            "FFmpeg -encoders failed with status: {}",
            output.status
        )));
    }
    let encoders = parse_encoder_list(&String::from_utf8_lossy(&output.stdout));
    debug!("FFmpeg reports {} encoders", encoders.len());
    Ok(encoders)
}

/// Запуск ffprobe, возвращает stdout
pub fn run_ffprobe_command(ffprobe: &str, args: &[&str]) -> Result<String> {
    let output = Command::new(ffprobe).args(args).output()?;
    if !output.status.success() {
        return Err(ClipSyncError::VideoProcessing(format!(
            "FFprobe command failed with status {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// Строки вида ` V....D libvpx-vp9  libvpx VP9`; заголовок до `------` пропускается
fn parse_encoder_list(output: &str) -> Vec<String> {
    output
        .lines()
        .skip_while(|line| !line.trim_start().starts_with("------"))
        .skip(1)
        .filter_map(|line| line.split_whitespace().nth(1))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_encoder_list() {
        let output = "Encoders:\n V..... = Video\n A..... = Audio\n ------\n V....D libvpx-vp9           libvpx VP9 (codec vp9)\n A....D libopus              libopus Opus (codec opus)\n";
        assert_eq!(parse_encoder_list(output), vec!["libvpx-vp9", "libopus"]);
    }

    #[test]
    fn test_missing_binary_is_not_an_error() {
        assert!(!check_ffmpeg_installed("definitely-not-ffmpeg-binary").unwrap());
    }
}
