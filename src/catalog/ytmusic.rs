// YouTube Music InnerTube client (WEB_REMIX) implementing the metadata provider.
//
// Response layouts shift often; extraction walks the JSON tree for known
// renderer nodes instead of following fixed paths from the root.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, ORIGIN, REFERER, USER_AGENT};
use serde_json::{json, Value};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use super::traits::MetadataProvider;
use super::types::{HomeSection, SectionItem, Song, UpNext};

const YTM_ORIGIN: &str = "https://music.youtube.com";
const CLIENT_NAME: &str = "WEB_REMIX";
const CLIENT_NAME_ID: &str = "67";
const FALLBACK_CLIENT_VERSION: &str = "1.20250101.01.00";
/// Search params restricting results to songs.
const SONGS_FILTER_PARAMS: &str = "EgWKAQIIAWoKEAkQBRAKEAMQBA%3D%3D";
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36";

const ARTIST_PAGE_TYPE: &str = "MUSIC_PAGE_TYPE_ARTIST";
const SEPARATORS: [&str; 3] = [" • ", " & ", ", "];

#[derive(Debug, Clone)]
struct Bootstrap {
    api_key: Option<String>,
    client_version: String,
    visitor_data: Option<String>,
}

pub struct YtMusicClient {
    http: reqwest::Client,
    bootstrap: OnceCell<Bootstrap>,
}

impl YtMusicClient {
    pub fn new() -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
        headers.insert(ORIGIN, HeaderValue::from_static(YTM_ORIGIN));
        headers.insert(REFERER, HeaderValue::from_static("https://music.youtube.com/"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .context("build ytmusic client")?;

        Ok(Self {
            http,
            bootstrap: OnceCell::new(),
        })
    }

    /// Scrape ytcfg values from the landing page once; fall back to built-in defaults.
    async fn bootstrap(&self) -> &Bootstrap {
        self.bootstrap
            .get_or_init(|| async {
                match self.fetch_bootstrap().await {
                    Ok(b) => b,
                    Err(e) => {
                        warn!("ytmusic bootstrap failed, using defaults: {:#}", e);
                        Bootstrap {
                            api_key: None,
                            client_version: FALLBACK_CLIENT_VERSION.to_string(),
                            visitor_data: None,
                        }
                    }
                }
            })
            .await
    }

    async fn fetch_bootstrap(&self) -> Result<Bootstrap> {
        let html = self
            .http
            .get(format!("{YTM_ORIGIN}/"))
            .send()
            .await
            .context("fetch music.youtube.com for bootstrap")?
            .error_for_status()
            .context("bootstrap http status")?
            .text()
            .await
            .context("read bootstrap html")?;

        let client_version = parse_ytcfg_value(&html, "INNERTUBE_CLIENT_VERSION")
            .context("parse INNERTUBE_CLIENT_VERSION")?;
        Ok(Bootstrap {
            api_key: parse_ytcfg_value(&html, "INNERTUBE_API_KEY"),
            client_version,
            visitor_data: parse_ytcfg_value(&html, "VISITOR_DATA"),
        })
    }

    async fn innertube(&self, endpoint: &str, mut body: Value) -> Result<Value> {
        let b = self.bootstrap().await;
        body["context"] = json!({
            "client": {
                "clientName": CLIENT_NAME,
                "clientVersion": b.client_version,
                "hl": "en",
                "gl": "US",
            }
        });

        let mut url = format!("{YTM_ORIGIN}/youtubei/v1/{endpoint}?prettyPrint=false");
        if let Some(key) = &b.api_key {
            url.push_str("&key=");
            url.push_str(key);
        }

        let mut rb = self
            .http
            .post(url)
            .header("X-Youtube-Client-Name", CLIENT_NAME_ID)
            .header("X-Youtube-Client-Version", b.client_version.as_str());
        if let Some(v) = b.visitor_data.as_deref() {
            rb = rb.header("X-Goog-Visitor-Id", v);
        }

        debug!("innertube request endpoint={}", endpoint);
        rb.json(&body)
            .send()
            .await
            .with_context(|| format!("send {endpoint} request"))?
            .error_for_status()
            .with_context(|| format!("{endpoint} http status"))?
            .json()
            .await
            .with_context(|| format!("parse {endpoint} json"))
    }
}

#[async_trait]
impl MetadataProvider for YtMusicClient {
    async fn search(&self, query: &str) -> Result<Vec<Song>> {
        let v = self
            .innertube(
                "search",
                json!({ "query": query, "params": SONGS_FILTER_PARAMS }),
            )
            .await?;
        Ok(songs_from_list_items(&v))
    }

    async fn home_sections(&self) -> Result<Vec<HomeSection>> {
        let v = self
            .innertube("browse", json!({ "browseId": "FEmusic_home" }))
            .await?;
        Ok(sections_from_home(&v))
    }

    async fn playlist(&self, playlist_id: &str) -> Result<Vec<Song>> {
        let browse_id = if playlist_id.starts_with("VL") {
            playlist_id.to_string()
        } else {
            format!("VL{}", playlist_id)
        };
        let v = self
            .innertube("browse", json!({ "browseId": browse_id }))
            .await?;
        Ok(songs_from_list_items(&v))
    }

    async fn up_next(&self, video_id: &str) -> Result<Vec<UpNext>> {
        let v = self
            .innertube(
                "next",
                json!({
                    "videoId": video_id,
                    "playlistId": format!("RDAMVM{}", video_id),
                    "isAudioOnly": true,
                }),
            )
            .await?;
        Ok(up_next_from_response(&v, video_id))
    }
}

fn parse_ytcfg_value(html: &str, key: &str) -> Option<String> {
    let needle = format!("\"{key}\":\"");
    let start = html.find(&needle)? + needle.len();
    let rest = &html[start..];
    let end = rest.find('"')?;
    Some(rest[..end].to_string())
}

/// Depth-first walk. `f` returns true when it consumed a node, which stops descent there.
fn walk<'a, F>(v: &'a Value, f: &mut F)
where
    F: FnMut(&'a Value) -> bool,
{
    if f(v) {
        return;
    }
    match v {
        Value::Array(items) => {
            for x in items {
                walk(x, f);
            }
        }
        Value::Object(map) => {
            for x in map.values() {
                walk(x, f);
            }
        }
        _ => {}
    }
}

fn text_at<'a>(v: &'a Value, pointer: &str) -> Option<&'a str> {
    v.pointer(pointer).and_then(Value::as_str)
}

/// Artist names from a `runs` array: artist-linked runs, else the first run.
fn artists_from_runs(runs: Option<&Value>) -> Vec<String> {
    let Some(runs) = runs.and_then(Value::as_array) else {
        return Vec::new();
    };
    let linked: Vec<String> = runs
        .iter()
        .filter(|r| {
            text_at(
                r,
                "/navigationEndpoint/browseEndpoint/browseEndpointContextSupportedConfigs/browseEndpointContextMusicConfig/pageType",
            ) == Some(ARTIST_PAGE_TYPE)
        })
        .filter_map(|r| text_at(r, "/text"))
        .map(str::to_string)
        .collect();
    if !linked.is_empty() {
        return linked;
    }
    runs.iter()
        .filter_map(|r| text_at(r, "/text"))
        .find(|t| !SEPARATORS.contains(t))
        .map(|t| vec![t.to_string()])
        .unwrap_or_default()
}

fn song_from_list_item(r: &Value) -> Option<Song> {
    let video_id = text_at(r, "/playlistItemData/videoId")
        .or_else(|| text_at(r, "/navigationEndpoint/watchEndpoint/videoId"))
        .or_else(|| {
            text_at(
                r,
                "/flexColumns/0/musicResponsiveListItemFlexColumnRenderer/text/runs/0/navigationEndpoint/watchEndpoint/videoId",
            )
        })?;

    let title = text_at(
        r,
        "/flexColumns/0/musicResponsiveListItemFlexColumnRenderer/text/runs/0/text",
    )
    .unwrap_or("Unknown");

    Some(Song {
        title: title.to_string(),
        artists: artists_from_runs(
            r.pointer("/flexColumns/1/musicResponsiveListItemFlexColumnRenderer/text/runs"),
        ),
        thumbnail_url: text_at(r, "/thumbnail/musicThumbnailRenderer/thumbnail/thumbnails/0/url")
            .map(str::to_string),
        video_id: video_id.to_string(),
    })
}

fn item_from_two_row(r: &Value) -> Option<SectionItem> {
    let title = text_at(r, "/title/runs/0/text").unwrap_or("Unknown");

    if let Some(video_id) = text_at(r, "/navigationEndpoint/watchEndpoint/videoId") {
        return Some(SectionItem::Song(Song {
            title: title.to_string(),
            artists: artists_from_runs(r.pointer("/subtitle/runs")),
            thumbnail_url: text_at(
                r,
                "/thumbnailRenderer/musicThumbnailRenderer/thumbnail/thumbnails/0/url",
            )
            .map(str::to_string),
            video_id: video_id.to_string(),
        }));
    }

    let playlist_id = text_at(r, "/navigationEndpoint/browseEndpoint/browseId")
        .and_then(|id| id.strip_prefix("VL"))
        .or_else(|| {
            text_at(
                r,
                "/thumbnailOverlay/musicItemThumbnailOverlayRenderer/content/musicPlayButtonRenderer/playNavigationEndpoint/watchPlaylistEndpoint/playlistId",
            )
        })?;
    Some(SectionItem::Playlist {
        playlist_id: playlist_id.to_string(),
    })
}

fn songs_from_list_items(v: &Value) -> Vec<Song> {
    let mut out = Vec::new();
    walk(v, &mut |node| match node.get("musicResponsiveListItemRenderer") {
        Some(r) => {
            out.extend(song_from_list_item(r));
            true
        }
        None => false,
    });
    out
}

fn sections_from_home(v: &Value) -> Vec<HomeSection> {
    let mut out = Vec::new();
    walk(v, &mut |node| {
        let Some(shelf) = node.get("musicCarouselShelfRenderer") else {
            return false;
        };
        let title = text_at(
            shelf,
            "/header/musicCarouselShelfBasicHeaderRenderer/title/runs/0/text",
        )
        .unwrap_or_default();
        let items = shelf
            .get("contents")
            .and_then(Value::as_array)
            .map(|contents| {
                contents
                    .iter()
                    .filter_map(|c| {
                        if let Some(r) = c.get("musicTwoRowItemRenderer") {
                            item_from_two_row(r)
                        } else {
                            c.get("musicResponsiveListItemRenderer")
                                .and_then(song_from_list_item)
                                .map(SectionItem::Song)
                        }
                    })
                    .collect()
            })
            .unwrap_or_default();
        out.push(HomeSection {
            title: title.to_string(),
            items,
        });
        true
    });
    out
}

fn up_next_from_response(v: &Value, seed: &str) -> Vec<UpNext> {
    let mut out = Vec::new();
    walk(v, &mut |node| {
        let Some(r) = node.get("playlistPanelVideoRenderer") else {
            return false;
        };
        let id = text_at(r, "/videoId")
            .or_else(|| text_at(r, "/navigationEndpoint/watchEndpoint/videoId"));
        if let Some(id) = id.filter(|id| *id != seed) {
            let byline = r
                .pointer("/longBylineText/runs")
                .or_else(|| r.pointer("/shortBylineText/runs"));
            out.push(UpNext {
                id: id.to_string(),
                title: text_at(r, "/title/runs/0/text").unwrap_or_default().to_string(),
                artist: artists_from_runs(byline),
                thumbnail: text_at(r, "/thumbnail/thumbnails/0/url")
                    .unwrap_or_default()
                    .to_string(),
                duration: text_at(r, "/lengthText/runs/0/text")
                    .unwrap_or_default()
                    .to_string(),
            });
        }
        true
    });
    out
}
