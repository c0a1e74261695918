use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

/// Kind of item Kodi reports as playing
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ItemType {
    Movie,
    Episode,
    #[default]
    #[serde(other)]
    Other,
}

impl ItemType {
    /// Only movies and episodes trigger the light override and notifications.
    pub fn is_notifiable(self) -> bool {
        matches!(self, ItemType::Movie | ItemType::Episode)
    }
}

/// The now-playing descriptor returned by `Player.GetItem`.
///
/// Only the fields used for notifications are typed; everything else Kodi
/// returns is kept in `extra` so two items compare equal only when Kodi
/// reported exactly the same descriptor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Item {
    #[serde(rename = "type", default)]
    pub kind: ItemType,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub showtitle: Option<String>,

    #[serde(default)]
    pub season: Option<i64>,

    #[serde(default)]
    pub episode: Option<i64>,

    #[serde(default)]
    pub year: Option<i64>,

    #[serde(default)]
    pub plot: Option<String>,

    /// Runtime in seconds
    #[serde(default)]
    pub runtime: Option<i64>,

    #[serde(default)]
    pub thumbnail: Option<String>,

    #[serde(default)]
    pub thumb: Option<String>,

    #[serde(default)]
    pub art: Option<Map<String, Value>>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_parse_episode() {
        let item: Item = serde_json::from_value(json!({
            "type": "episode",
            "label": "The One Where Chandler Takes A Bath",
            "title": "The One Where Chandler Takes A Bath",
            "showtitle": "Friends",
            "season": 8,
            "episode": 13,
            "runtime": 1297,
            "art": {"season.poster": "image://foo/"}
        }))
        .unwrap();

        assert_eq!(item.kind, ItemType::Episode);
        assert!(item.kind.is_notifiable());
        assert_eq!(item.showtitle.as_deref(), Some("Friends"));
        assert_eq!(item.season, Some(8));
        assert_eq!(item.extra.get("label"), Some(&json!("The One Where Chandler Takes A Bath")));
    }

    #[test]
    fn test_unknown_type_is_other() {
        let item: Item = serde_json::from_value(json!({"type": "channel", "title": "La 1"})).unwrap();
        assert_eq!(item.kind, ItemType::Other);
        assert!(!item.kind.is_notifiable());
        assert_eq!(item.kind.to_string(), "other");
    }

    #[test]
    fn test_null_year_is_none() {
        let item: Item = serde_json::from_value(json!({"type": "movie", "title": "X", "year": null}))
            .unwrap();
        assert_eq!(item.year, None);
    }

    #[test]
    fn test_equality_includes_extra_fields() {
        let a: Item = serde_json::from_value(json!({"type": "movie", "title": "X", "file": "a.mkv"}))
            .unwrap();
        let b: Item = serde_json::from_value(json!({"type": "movie", "title": "X", "file": "b.mkv"}))
            .unwrap();
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }
}
