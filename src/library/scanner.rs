use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::metadata::reader;
use crate::playlist::TrackDescriptor;

const AUDIO_EXTENSIONS: &[&str] = &[
    "flac", "mp3", "wav", "ogg", "m4a", "aac", "alac", "opus",
];

/// Scan a directory recursively for audio files, sorted by path.
pub fn scan_directory(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(e) => Some(e),
            Err(err) => {
                log::warn!("Skipping unreadable entry: {}", err);
                None
            }
        })
        .filter(|e| e.file_type().is_file() && is_audio_file(e.path()))
        .map(|e| e.into_path())
        .collect();

    files.sort();
    files
}

/// Scan and read tags. Ids follow queue order.
pub fn scan_tracks(root: &Path) -> Vec<TrackDescriptor> {
    let tracks: Vec<TrackDescriptor> = scan_directory(root)
        .iter()
        .enumerate()
        .map(|(i, path)| reader::read_track(i as u64, path))
        .collect();
    log::info!("Found {} tracks under {}", tracks.len(), root.display());
    tracks
}

pub fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| AUDIO_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}
