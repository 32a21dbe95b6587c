use serde::Serialize;

/// A playable track as listed by search and trending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Song {
    pub title: String,
    pub artists: Vec<String>,
    pub thumbnail_url: Option<String>,
    pub video_id: String,
}

/// A suggestion for what to play after a given track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpNext {
    pub id: String,
    pub title: String,
    pub artist: Vec<String>,
    pub thumbnail: String,
    pub duration: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionItem {
    Song(Song),
    Playlist { playlist_id: String },
}

/// One shelf of the home feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HomeSection {
    pub title: String,
    pub items: Vec<SectionItem>,
}
