//! YouTube helpers: video IDs, transcripts, and search.
//!
//! Transcripts and search go through YouTube's Innertube endpoints. The
//! transcript comes back as newline-joined `[MM:SS] <text>` lines; callers
//! treat it as opaque text.

use anyhow::{Context, Result, anyhow, bail};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Value, json};

const INNERTUBE_PLAYER_URL: &str = "https://www.youtube.com/youtubei/v1/player";
const INNERTUBE_SEARCH_URL: &str = "https://www.youtube.com/youtubei/v1/search";

// The ANDROID client gets caption tracks without a signature dance.
const ANDROID_CLIENT_VERSION: &str = "20.10.38";
const WEB_CLIENT_VERSION: &str = "2.20250101.00.00";

static WATCH_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?:youtube\.com/watch\?v=|youtu\.be/)([\w-]+)",
        r"youtube\.com/embed/([\w-]+)",
        r"youtube\.com/v/([\w-]+)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("video id pattern compiles"))
    .collect()
});

/// One YouTube search hit.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub video_id: String,
    pub title: String,
    pub url: String,
    pub channel: String,
    pub duration: String,
}

fn is_youtube_host(url: &str) -> bool {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url);
    let host = rest.split(['/', '?']).next().unwrap_or("");
    host == "youtu.be"
        || host == "youtube.com"
        || host.ends_with(".youtube.com")
        || host.ends_with(".youtu.be")
}

fn is_video_id(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Extract the video ID from the common YouTube URL shapes: `youtu.be/<id>`,
/// `watch?v=<id>` (any query position), `/embed/<id>`, `/v/<id>`.
pub fn extract_video_id(url: &str) -> Option<String> {
    if is_youtube_host(url) {
        if let Some((_, query)) = url.split_once('?') {
            for pair in query.split('&') {
                if let Some(id) = pair.strip_prefix("v=") {
                    if is_video_id(id) {
                        return Some(id.to_string());
                    }
                }
            }
        }
    }

    for pattern in WATCH_PATTERNS.iter() {
        if let Some(captures) = pattern.captures(url) {
            return Some(captures[1].to_string());
        }
    }

    None
}

/// Whether the URL is a YouTube URL with an extractable video ID. Subdomains
/// like `m.youtube.com` and `music.youtube.com` count.
pub fn validate_url(url: &str) -> bool {
    is_youtube_host(url) && extract_video_id(url).is_some()
}

/// Seconds to `MM:SS`, or `H:MM:SS` above an hour.
pub fn format_timestamp(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{:02}:{:02}", minutes, secs)
    }
}

async fn player_response(http: &reqwest::Client, video_id: &str) -> Result<Value> {
    let body = json!({
        "context": {
            "client": {
                "clientName": "ANDROID",
                "clientVersion": ANDROID_CLIENT_VERSION,
                "androidSdkVersion": 30,
            }
        },
        "videoId": video_id,
    });

    let response = http
        .post(INNERTUBE_PLAYER_URL)
        .header(
            "User-Agent",
            format!("com.google.android.youtube/{} (Linux; U; Android 11) gzip", ANDROID_CLIENT_VERSION),
        )
        .json(&body)
        .send()
        .await
        .context("YouTube player request failed")?;

    let status = response.status();
    if !status.is_success() {
        bail!("YouTube player request returned HTTP {}", status);
    }
    response
        .json()
        .await
        .context("Failed to parse YouTube player response")
}

fn caption_tracks(player: &Value) -> Option<&Vec<Value>> {
    player
        .pointer("/captions/playerCaptionsTracklistRenderer/captionTracks")
        .and_then(Value::as_array)
}

/// Fetch the transcript for a video as timestamp-prefixed lines.
pub async fn fetch_transcript(video_id: &str) -> Result<String> {
    let http = reqwest::Client::new();
    let player = player_response(&http, video_id).await?;

    let tracks = caption_tracks(&player)
        .ok_or_else(|| anyhow!("No captions available for video {}", video_id))?;
    // Prefer a manually created track over auto-generated ("asr")
    let track = tracks
        .iter()
        .find(|t| t["kind"].as_str() != Some("asr"))
        .or_else(|| tracks.first())
        .ok_or_else(|| anyhow!("No captions available for video {}", video_id))?;
    let base_url = track["baseUrl"]
        .as_str()
        .ok_or_else(|| anyhow!("Caption track has no URL"))?;

    log::debug!("fetching captions for {} from {}", video_id, base_url);

    let url = format!("{}&fmt=json3", base_url);
    let response = http
        .get(&url)
        .send()
        .await
        .context("Caption download failed")?;
    let status = response.status();
    if !status.is_success() {
        bail!("Caption download returned HTTP {}", status);
    }
    let payload: Value = response
        .json()
        .await
        .context("Failed to parse caption payload")?;

    let transcript = format_transcript(&payload);
    if transcript.is_empty() {
        bail!("Empty transcript received");
    }
    Ok(transcript)
}

fn format_transcript(payload: &Value) -> String {
    let Some(events) = payload["events"].as_array() else {
        return String::new();
    };

    let mut lines = Vec::new();
    for event in events {
        let Some(segs) = event["segs"].as_array() else {
            continue;
        };
        let text: String = segs.iter().filter_map(|s| s["utf8"].as_str()).collect();
        let text = text.replace('\n', " ");
        let text = text.trim();
        if text.is_empty() {
            continue;
        }
        let start_ms = event["tStartMs"].as_f64().unwrap_or(0.0);
        lines.push(format!("[{}] {}", format_timestamp(start_ms / 1000.0), text));
    }
    lines.join("\n")
}

/// Search YouTube and return up to `max_results` videos.
pub async fn search_videos(query: &str, max_results: usize) -> Result<Vec<SearchResult>> {
    if query.trim().is_empty() {
        bail!("Search query cannot be empty");
    }

    let http = reqwest::Client::new();
    let body = json!({
        "context": {
            "client": {
                "clientName": "WEB",
                "clientVersion": WEB_CLIENT_VERSION,
            }
        },
        "query": query,
    });

    let response = http
        .post(INNERTUBE_SEARCH_URL)
        .json(&body)
        .send()
        .await
        .context("YouTube search request failed")?;
    let status = response.status();
    if !status.is_success() {
        bail!("YouTube search returned HTTP {}", status);
    }
    let payload: Value = response
        .json()
        .await
        .context("Failed to parse YouTube search response")?;

    Ok(collect_search_results(&payload, max_results))
}

fn collect_search_results(payload: &Value, max_results: usize) -> Vec<SearchResult> {
    let mut results = Vec::new();
    let Some(sections) = payload
        .pointer("/contents/twoColumnSearchResultsRenderer/primaryContents/sectionListRenderer/contents")
        .and_then(Value::as_array)
    else {
        return results;
    };

    for section in sections {
        let Some(items) = section
            .pointer("/itemSectionRenderer/contents")
            .and_then(Value::as_array)
        else {
            continue;
        };
        for item in items {
            // Skip ads, shelves, and other non-video renderers
            let Some(video) = item.get("videoRenderer") else {
                continue;
            };
            let Some(video_id) = video["videoId"].as_str() else {
                continue;
            };
            let title = video
                .pointer("/title/runs/0/text")
                .and_then(Value::as_str)
                .unwrap_or("(untitled)")
                .to_string();
            let channel = video
                .pointer("/ownerText/runs/0/text")
                .and_then(Value::as_str)
                .unwrap_or("(unknown)")
                .to_string();
            let duration = video
                .pointer("/lengthText/simpleText")
                .and_then(Value::as_str)
                .unwrap_or("??:??")
                .to_string();

            results.push(SearchResult {
                url: format!("https://www.youtube.com/watch?v={}", video_id),
                video_id: video_id.to_string(),
                title,
                channel,
                duration,
            });
            if results.len() >= max_results {
                return results;
            }
        }
    }
    results
}
