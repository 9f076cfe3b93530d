use std::path::{Path, PathBuf};

use anyhow::Context;

const EXPORT_SUFFIX: &str = "-slowedandreverb.wav";

// A file read off disk, ready to hand to the engine for decoding
#[derive(Debug)]
pub struct InputFile {
    pub name: String,
    pub extension: Option<String>,
    pub bytes: Vec<u8>,
}

pub fn read_input(path: &Path) -> anyhow::Result<InputFile> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase());
    Ok(InputFile { name, extension, bytes })
}

// "song.mp3" -> "song-slowedandreverb.wav"
pub fn export_file_name(name: &str) -> String {
    let stem = Path::new(name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "audio".to_string());
    format!("{stem}{EXPORT_SUFFIX}")
}

pub fn write_export(dir: &Path, name: &str, bytes: &[u8]) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let path = dir.join(export_file_name(name));
    std::fs::write(&path, bytes).with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}

// Terminals "drop" a file by pasting its path, quoted or shell-escaped
pub fn parse_pasted_path(text: &str) -> Option<PathBuf> {
    let text = text.trim();
    let unquoted = ['\'', '"']
        .iter()
        .find_map(|q| text.strip_prefix(*q).and_then(|t| t.strip_suffix(*q)))
        .unwrap_or(text);
    let unprefixed = unquoted.strip_prefix("file://").unwrap_or(unquoted);
    let path = unprefixed.replace("\\ ", " ");
    (!path.is_empty()).then(|| PathBuf::from(path))
}
