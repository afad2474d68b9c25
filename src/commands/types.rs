use serde::{Deserialize, Serialize};

use crate::{common::types::ChannelId, ui::RenderPayload};

/// A command delivered by the chat command layer for one guild.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(
    tag = "kind",
    content = "args",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum Command {
    Play {
        query: String,
        /// Shown while loading and used when the resolver returns no title.
        #[serde(default)]
        title: Option<String>,
        /// Album art the caller already knows about (Spotify lookups).
        #[serde(default)]
        image_url: Option<String>,
    },
    Skip,
    Stop,
    Pause,
    Resume,
    /// Out-of-range levels are clamped to 0..=100.
    Volume { level: i64 },
    Mute,
    Queue,
    NowPlaying,
    /// 1-based position in the upcoming queue.
    Remove { index: usize },
    SetChannel { channel_id: ChannelId },
    Leave,
    /// The streaming collaborator finished the current track.
    TrackFinished,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Play { .. } => "play",
            Self::Skip => "skip",
            Self::Stop => "stop",
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Volume { .. } => "volume",
            Self::Mute => "mute",
            Self::Queue => "queue",
            Self::NowPlaying => "nowPlaying",
            Self::Remove { .. } => "remove",
            Self::SetChannel { .. } => "setChannel",
            Self::Leave => "leave",
            Self::TrackFinished => "trackFinished",
        }
    }
}

/// What the command layer should show in reply.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum CommandResponse {
    Message { content: String, ephemeral: bool },
    Render(RenderPayload),
}

impl CommandResponse {
    pub fn public(content: impl Into<String>) -> Self {
        Self::Message {
            content: content.into(),
            ephemeral: false,
        }
    }

    pub fn ephemeral(content: impl Into<String>) -> Self {
        Self::Message {
            content: content.into(),
            ephemeral: true,
        }
    }

    pub fn content(&self) -> Option<&str> {
        match self {
            Self::Message { content, .. } => Some(content),
            Self::Render(_) => None,
        }
    }

    pub fn render_payload(&self) -> Option<&RenderPayload> {
        match self {
            Self::Render(payload) => Some(payload),
            Self::Message { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Command {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            parse(r#"{"kind":"play","args":{"query":"lofi"}}"#),
            Command::Play {
                query: "lofi".into(),
                title: None,
                image_url: None
            }
        );
        assert_eq!(
            parse(r#"{"kind":"play","args":{"query":"x","title":"X","imageUrl":"https://a"}}"#),
            Command::Play {
                query: "x".into(),
                title: Some("X".into()),
                image_url: Some("https://a".into())
            }
        );
        assert_eq!(parse(r#"{"kind":"skip"}"#), Command::Skip);
        assert_eq!(parse(r#"{"kind":"nowPlaying"}"#), Command::NowPlaying);
        assert_eq!(
            parse(r#"{"kind":"volume","args":{"level":250}}"#),
            Command::Volume { level: 250 }
        );
        assert_eq!(
            parse(r#"{"kind":"setChannel","args":{"channelId":123456789012345678}}"#),
            Command::SetChannel {
                channel_id: ChannelId(123456789012345678)
            }
        );
    }

    #[test]
    fn test_unknown_command_is_rejected() {
        assert!(serde_json::from_str::<Command>(r#"{"kind":"dance"}"#).is_err());
        assert!(serde_json::from_str::<Command>(r#"{"kind":"play","args":{}}"#).is_err());
    }

    #[test]
    fn test_message_response_shape() {
        let json = serde_json::to_value(CommandResponse::ephemeral("hi")).unwrap();
        assert_eq!(json["type"], "message");
        assert_eq!(json["content"], "hi");
        assert_eq!(json["ephemeral"], true);
    }
}
