//! Turn a Kodi item into the title, message and image used by notifications.

use tracing::debug;
use tracing::info;

use super::item::Item;
use super::item::ItemType;

const IMAGE_SCHEME: &str = "image://";

/// Text and image derived from a playing item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfoParams {
    pub title: String,
    pub message: String,
    pub image_url: Option<String>,
}

/// A lookup needed to resolve the item image found nothing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("missing key '{0}'")]
pub struct MissingKey(pub &'static str);

/// Derive title, message and optional image URL from an item.
///
/// `local_network` marks LAN image URLs, which keep their plain-http scheme.
pub fn info_params(item: &Item, local_network: &str) -> InfoParams {
    let title = title(item);
    let message = message(item);

    let image_url = match image_url(item, local_network) {
        Ok(url) => Some(url),
        Err(e) => {
            info!("No image for '{}': {}; art={:?}", title, e, item.art);
            None
        }
    };

    debug!("Notification params: T={}, M={}, URL={:?}", title, message, image_url);

    InfoParams {
        title,
        message,
        image_url,
    }
}

pub fn title(item: &Item) -> String {
    match item.kind {
        ItemType::Episode => format!(
            "{} S{:02}E{:02} {}",
            item.showtitle.as_deref().unwrap_or_default(),
            item.season.unwrap_or_default(),
            item.episode.unwrap_or_default(),
            item.title
        ),
        _ => match item.year {
            Some(year) if year != 0 => format!("Playing: {} [{}]", item.title, year),
            _ => format!("Playing: {}", item.title),
        },
    }
}

pub fn message(item: &Item) -> String {
    format!(
        "{}\n∆T: {}.",
        item.plot.as_deref().unwrap_or_default(),
        format_runtime(item.runtime.unwrap_or_default())
    )
}

/// Render seconds as `H:MM:SS`, prefixed with `N day(s), ` past 24 hours.
pub fn format_runtime(seconds: i64) -> String {
    let seconds = seconds.max(0);
    let days = seconds / 86_400;
    let rem = seconds % 86_400;
    let hms = format!("{}:{:02}:{:02}", rem / 3600, (rem % 3600) / 60, rem % 60);

    match days {
        0 => hms,
        1 => format!("1 day, {}", hms),
        n => format!("{} days, {}", n, hms),
    }
}

/// Resolve the best image for an item.
///
/// Tries `thumbnail`, `thumb`, `art.poster`, `art["season.poster"]`, then the
/// first entry of `art`. Kodi wraps paths as `image://<percent-encoded url>/`;
/// the wrapper is removed and non-LAN http URLs are upgraded to https.
pub fn image_url(item: &Item, local_network: &str) -> Result<String, MissingKey> {
    let raw = raw_image_path(item)?;

    let decoded = percent_decode_plus(raw);
    let trimmed = decoded.trim_end_matches('/');
    let url = trimmed.strip_prefix(IMAGE_SCHEME).unwrap_or(trimmed);

    if !url.contains(local_network) && url.starts_with("http://") {
        Ok(url.replacen("http:", "https:", 1))
    } else {
        Ok(url.to_string())
    }
}

fn raw_image_path(item: &Item) -> Result<&str, MissingKey> {
    fn non_empty(s: &Option<String>) -> Option<&str> {
        s.as_deref().filter(|s| !s.is_empty())
    }

    if let Some(thumbnail) = non_empty(&item.thumbnail) {
        return Ok(thumbnail);
    }
    if let Some(thumb) = non_empty(&item.thumb) {
        return Ok(thumb);
    }

    let art = item.art.as_ref().ok_or(MissingKey("art"))?;
    let art_str = |key: &str| art.get(key).and_then(|v| v.as_str()).filter(|s| !s.is_empty());

    if let Some(poster) = art_str("poster") {
        return Ok(poster);
    }
    if let Some(poster) = art_str("season.poster") {
        return Ok(poster);
    }

    debug!("No poster in item art: {:?}", art);
    art.values()
        .filter_map(|v| v.as_str())
        .find(|s| !s.is_empty())
        .ok_or(MissingKey("art.*"))
}

/// Percent-decode with `+` meaning space, falling back to the raw text on invalid UTF-8.
fn percent_decode_plus(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => spaced,
    }
}
