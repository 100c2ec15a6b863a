use base64::Engine;
use lofty::prelude::*;
use lofty::probe::Probe;
use lofty::tag::Tag;
use std::path::Path;

use crate::error::{EngineError, EngineResult};
use crate::playlist::{TrackDescriptor, UNKNOWN};

/// Build a descriptor from the file's tags. Missing title falls back to the
/// file name, missing artist/album to "Unknown". Unreadable tags are not an
/// error: the bare filename descriptor is returned instead.
pub fn read_track(id: u64, path: &Path) -> TrackDescriptor {
    match read_tagged(id, path) {
        Ok(track) => track,
        Err(e) => {
            log::debug!("{}", e);
            TrackDescriptor::from_path(id, path)
        }
    }
}

fn read_tagged(id: u64, path: &Path) -> EngineResult<TrackDescriptor> {
    let display = path.to_string_lossy();
    let tagged_file = Probe::open(path)
        .map_err(|e| EngineError::source_load(display.as_ref(), format!("Failed to open file: {}", e)))?
        .read()
        .map_err(|e| EngineError::source_load(display.as_ref(), format!("Failed to read tags: {}", e)))?;

    let mut track = TrackDescriptor::from_path(id, path);

    let duration = tagged_file.properties().duration().as_secs_f64();
    if duration > 0.0 {
        track = track.with_duration(duration);
    }

    if let Some(tag) = tagged_file.primary_tag().or_else(|| tagged_file.first_tag()) {
        if let Some(title) = non_empty(tag.title().map(|s| s.to_string())) {
            track.title = title;
        }
        track.artist = non_empty(tag.artist().map(|s| s.to_string())).unwrap_or_else(|| UNKNOWN.into());
        track.album = non_empty(tag.album().map(|s| s.to_string())).unwrap_or_else(|| UNKNOWN.into());
        track.artwork = artwork_data_uri(tag);
    }

    Ok(track)
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// First embedded picture as a `data:` URI.
fn artwork_data_uri(tag: &Tag) -> Option<String> {
    let picture = tag.pictures().first()?;
    let mime = picture.mime_type().map(|m| m.as_str()).unwrap_or("image/jpeg");
    let b64 = base64::engine::general_purpose::STANDARD.encode(picture.data());
    Some(format!("data:{};base64,{}", mime, b64))
}

pub fn get_album_art_base64(path: &Path) -> EngineResult<Option<String>> {
    let display = path.to_string_lossy();
    let tagged_file = Probe::open(path)
        .map_err(|e| EngineError::source_load(display.as_ref(), format!("Failed to open file: {}", e)))?
        .read()
        .map_err(|e| EngineError::source_load(display.as_ref(), format!("Failed to read tags: {}", e)))?;

    Ok(tagged_file
        .primary_tag()
        .or_else(|| tagged_file.first_tag())
        .and_then(artwork_data_uri))
}
