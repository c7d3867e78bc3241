use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::model::ids::VideoId;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum VideoError {
    #[error("video title cannot be empty")]
    EmptyTitle,

    #[error("video order must be >= 1")]
    InvalidOrder,

    #[error("invalid video url: {0}")]
    InvalidUrl(String),
}

//
// ─── VIDEO ─────────────────────────────────────────────────────────────────────
//

/// An instructional video in the gated sequence.
///
/// The media itself is an opaque URL; the engine only cares about the ordinal
/// position and the authoritative duration. Videos are never hard-deleted,
/// retiring one flips `is_active` so historical reports keep resolving.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    id: VideoId,
    order: u32,
    title: String,
    url: Option<Url>,
    duration_seconds: u32,
    is_active: bool,
}

impl Video {
    /// Creates a video.
    ///
    /// # Errors
    ///
    /// Returns `VideoError::EmptyTitle` for a blank title and
    /// `VideoError::InvalidOrder` when `order` is zero.
    pub fn new(
        id: VideoId,
        order: u32,
        title: impl Into<String>,
        url: Option<Url>,
        duration_seconds: u32,
        is_active: bool,
    ) -> Result<Self, VideoError> {
        let title = title.into();
        let title = title.trim();
        if title.is_empty() {
            return Err(VideoError::EmptyTitle);
        }
        if order == 0 {
            return Err(VideoError::InvalidOrder);
        }

        Ok(Self {
            id,
            order,
            title: title.to_owned(),
            url,
            duration_seconds,
            is_active,
        })
    }

    /// Parses an optional raw URL, treating blank input as absent.
    ///
    /// # Errors
    ///
    /// Returns `VideoError::InvalidUrl` if the string is not an absolute URL.
    pub fn parse_url(raw: Option<&str>) -> Result<Option<Url>, VideoError> {
        match raw.map(str::trim).filter(|s| !s.is_empty()) {
            None => Ok(None),
            Some(s) => Url::parse(s)
                .map(Some)
                .map_err(|e| VideoError::InvalidUrl(format!("{s}: {e}"))),
        }
    }

    #[must_use]
    pub fn id(&self) -> VideoId {
        self.id
    }

    #[must_use]
    pub fn order(&self) -> u32 {
        self.order
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn url(&self) -> Option<&Url> {
        self.url.as_ref()
    }

    #[must_use]
    pub fn duration_seconds(&self) -> u32 {
        self.duration_seconds
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.is_active
    }

    #[must_use]
    pub fn deactivated(mut self) -> Self {
        self.is_active = false;
        self
    }
}

/// Returns active videos sorted by ascending `order` (ties broken by id).
#[must_use]
pub fn active_in_order(videos: &[Video]) -> Vec<Video> {
    let mut active: Vec<Video> = videos.iter().filter(|v| v.is_active()).cloned().collect();
    active.sort_by_key(|v| (v.order(), v.id()));
    active
}

/// The last active video in the sequence, whose first access anchors the
/// follow-up window.
#[must_use]
pub fn last_active(videos: &[Video]) -> Option<&Video> {
    videos
        .iter()
        .filter(|v| v.is_active())
        .max_by_key(|v| (v.order(), v.id()))
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    fn video(id: u64, order: u32, active: bool) -> Video {
        Video::new(VideoId::new(id), order, format!("Video {id}"), None, 600, active).unwrap()
    }

    #[test]
    fn rejects_blank_title() {
        let err = Video::new(VideoId::new(1), 1, "  ", None, 10, true).unwrap_err();
        assert_eq!(err, VideoError::EmptyTitle);
    }

    #[test]
    fn rejects_zero_order() {
        let err = Video::new(VideoId::new(1), 0, "Intro", None, 10, true).unwrap_err();
        assert_eq!(err, VideoError::InvalidOrder);
    }

    #[test]
    fn trims_title() {
        let v = Video::new(VideoId::new(1), 1, "  Intro ", None, 10, true).unwrap();
        assert_eq!(v.title(), "Intro");
    }

    #[test]
    fn parse_url_handles_blank_and_invalid() {
        assert_eq!(Video::parse_url(None).unwrap(), None);
        assert_eq!(Video::parse_url(Some("  ")).unwrap(), None);
        assert!(Video::parse_url(Some("https://example.com/1.mp4")).unwrap().is_some());
        assert!(matches!(
            Video::parse_url(Some("not a url")),
            Err(VideoError::InvalidUrl(_))
        ));
    }

    #[test]
    fn active_in_order_skips_inactive_and_sorts() {
        let videos = vec![video(3, 3, true), video(1, 1, true), video(2, 2, false)];
        let ordered: Vec<u64> = active_in_order(&videos)
            .iter()
            .map(|v| v.id().value())
            .collect();
        assert_eq!(ordered, vec![1, 3]);
    }

    #[test]
    fn last_active_ignores_retired_tail() {
        let videos = vec![video(1, 1, true), video(2, 2, true), video(3, 3, false)];
        assert_eq!(last_active(&videos).map(Video::id), Some(VideoId::new(2)));
    }
}
