//! Push and messaging-bot notifications for a playing item.

use serde_json::json;

use super::config::KodiAmbientConfig;
use super::format::InfoParams;
use crate::engine::ServiceCall;

/// Reply keyboard attached to the photo message
const BOT_KEYBOARD: [&str; 3] = [
    "/luceson",
    "/ambilighttoggle, /ambilightconfig",
    "/pitemps, /tvshowsnext",
];

/// Inline keyboard attached to the text message: rows of (label, command)
const BOT_INLINE_KEYBOARD: [&[(&str, &str)]; 3] = [
    &[("Lights ON", "/luceson")],
    &[
        ("Switch Ambilight", "/ambilighttoggle"),
        ("Ch. config", "/ambilightconfig"),
    ],
    &[("Temps", "/pitemps"), ("Next TvShows", "/tvshowsnext")],
];

/// Mobile push notification, with the image as attachment when there is one.
pub fn push_notification(config: &KodiAmbientConfig, params: &InfoParams) -> ServiceCall {
    let mut data = json!({"push": {"category": config.push_category}});
    if let Some(url) = &params.image_url {
        data["attachment"] = json!({"url": url});
    }

    ServiceCall::new(&config.notifier.domain, &config.notifier.service)
        .with("title", params.title.as_str())
        .with("message", params.message.as_str())
        .with("data", data)
}

/// Bot messages: an optional silent photo, then the silent text message.
pub fn bot_notifications(config: &KodiAmbientConfig, params: &InfoParams) -> Vec<ServiceCall> {
    let mut calls = Vec::with_capacity(2);

    if let Some(url) = &params.image_url {
        calls.push(
            ServiceCall::new(&config.bot, "send_photo")
                .with("target", config.bot_target)
                .with("url", url.as_str())
                .with("keyboard", json!(BOT_KEYBOARD))
                .with("disable_notification", true),
        );
    }

    let inline_keyboard: Vec<Vec<[&str; 2]>> = BOT_INLINE_KEYBOARD
        .iter()
        .map(|row| row.iter().map(|(label, cmd)| [*label, *cmd]).collect())
        .collect();

    calls.push(
        ServiceCall::new(&config.bot, "send_message")
            .with("target", config.bot_target)
            .with("title", format!("*{}*", params.title))
            .with("message", params.message.as_str())
            .with("inline_keyboard", json!(inline_keyboard))
            .with("disable_notification", true),
    );

    calls
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> KodiAmbientConfig {
        toml::from_str(
            r#"
            media_player = "media_player.kodi"
            notifier = "notify.ios_phone"
            bot = "mytelegram_bot"
            bot_target = -1001234
            "#,
        )
        .unwrap()
    }

    fn params(image_url: Option<&str>) -> InfoParams {
        InfoParams {
            title: "Playing: Amélie [2001]".to_string(),
            message: "A shy waitress.\n∆T: 2:02:00.".to_string(),
            image_url: image_url.map(str::to_string),
        }
    }

    #[test]
    fn test_push_with_image() {
        let call = push_notification(&config(), &params(Some("https://example.com/p.jpg")));

        assert_eq!(call.to_string(), "notify.ios_phone");
        assert_eq!(
            serde_json::Value::Object(call.data),
            json!({
                "title": "Playing: Amélie [2001]",
                "message": "A shy waitress.\n∆T: 2:02:00.",
                "data": {
                    "push": {"category": "KODIPLAY"},
                    "attachment": {"url": "https://example.com/p.jpg"}
                }
            })
        );
    }

    #[test]
    fn test_push_without_image() {
        let call = push_notification(&config(), &params(None));
        assert_eq!(call.data["data"], json!({"push": {"category": "KODIPLAY"}}));
    }

    #[test]
    fn test_bot_photo_then_message() {
        let calls = bot_notifications(&config(), &params(Some("https://example.com/p.jpg")));

        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].to_string(), "mytelegram_bot.send_photo");
        assert_eq!(calls[0].data["target"], json!(-1001234));
        assert_eq!(calls[0].data["url"], json!("https://example.com/p.jpg"));
        assert_eq!(calls[0].data["keyboard"][0], json!("/luceson"));
        assert_eq!(calls[0].data["disable_notification"], json!(true));

        assert_eq!(calls[1].to_string(), "mytelegram_bot.send_message");
        assert_eq!(calls[1].data["title"], json!("*Playing: Amélie [2001]*"));
        assert_eq!(
            calls[1].data["inline_keyboard"][1],
            json!([["Switch Ambilight", "/ambilighttoggle"], ["Ch. config", "/ambilightconfig"]])
        );
        assert_eq!(calls[1].data["disable_notification"], json!(true));
    }

    #[test]
    fn test_bot_message_only_without_image() {
        let calls = bot_notifications(&config(), &params(None));

        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].to_string(), "mytelegram_bot.send_message");
    }
}
