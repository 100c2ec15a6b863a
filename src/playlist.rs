/// Track descriptors and the play queue handed to the engine.
///
/// The queue itself belongs to the host: the engine reads entries and asks
/// for index changes, it never edits the track list.
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Playable source reference. Resolved to a decoder on demand.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceHandle(PathBuf);

impl SourceHandle {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &Path {
        &self.0
    }

    pub fn display(&self) -> String {
        self.0.to_string_lossy().to_string()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackDescriptor {
    pub id: u64,
    pub source: SourceHandle,
    pub title: String,
    pub artist: String,
    pub album: String,
    /// Artwork as a data URI, when the file carries a picture.
    pub artwork: Option<String>,
    /// Duration in seconds. `None` when the container does not say.
    pub duration_secs: Option<f64>,
}

impl TrackDescriptor {
    /// Bare descriptor with the title derived from the file name.
    pub fn from_path(id: u64, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let title = title_from_path(&path);
        Self {
            id,
            source: SourceHandle::new(path),
            title,
            artist: UNKNOWN.to_string(),
            album: UNKNOWN.to_string(),
            artwork: None,
            duration_secs: None,
        }
    }

    pub fn with_duration(mut self, secs: f64) -> Self {
        self.duration_secs = if secs.is_finite() && secs >= 0.0 {
            Some(secs)
        } else {
            None
        };
        self
    }
}

pub const UNKNOWN: &str = "Unknown";

/// File name without its extension ("01 - Intro.flac" → "01 - Intro").
pub fn title_from_path(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}

#[derive(Clone, Debug, Default)]
pub struct Queue {
    tracks: Vec<TrackDescriptor>,
    current: Option<usize>,
}

impl Queue {
    pub fn new(tracks: Vec<TrackDescriptor>) -> Self {
        Self {
            tracks,
            current: None,
        }
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&TrackDescriptor> {
        self.tracks.get(index)
    }

    pub fn tracks(&self) -> &[TrackDescriptor] {
        &self.tracks
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn current(&self) -> Option<&TrackDescriptor> {
        self.current.and_then(|i| self.tracks.get(i))
    }

    /// Returns false (and leaves the index alone) when `index` is out of range.
    pub fn set_current(&mut self, index: Option<usize>) -> bool {
        match index {
            Some(i) if i >= self.tracks.len() => false,
            other => {
                self.current = other;
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue(n: usize) -> Queue {
        Queue::new(
            (0..n)
                .map(|i| TrackDescriptor::from_path(i as u64, format!("/music/{i}.flac")))
                .collect(),
        )
    }

    #[test]
    fn title_strips_extension() {
        assert_eq!(title_from_path(Path::new("/a/01 - Intro.flac")), "01 - Intro");
        assert_eq!(title_from_path(Path::new("noext")), "noext");
    }

    #[test]
    fn set_current_rejects_out_of_range() {
        let mut q = queue(2);
        assert_eq!(q.current_index(), None);
        assert!(q.set_current(Some(1)));
        assert!(!q.set_current(Some(2)));
        assert_eq!(q.current_index(), Some(1));
        assert!(q.set_current(None));
        assert!(q.current().is_none());
    }

    #[test]
    fn negative_or_nan_duration_is_unknown() {
        let t = TrackDescriptor::from_path(0, "/x.mp3");
        assert_eq!(t.clone().with_duration(-1.0).duration_secs, None);
        assert_eq!(t.clone().with_duration(f64::NAN).duration_secs, None);
        assert_eq!(t.with_duration(12.5).duration_secs, Some(12.5));
    }
}
