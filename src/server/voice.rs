use dashmap::DashMap;
use serde::Serialize;
use tracing::{debug, warn};

use crate::common::types::{ChannelId, GuildId};

/// Requests for the external voice transport. The core never speaks the voice protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum VoiceRequest {
    Join {
        guild_id: GuildId,
        channel_id: ChannelId,
    },
    Leave {
        guild_id: GuildId,
    },
}

/// Sending half of the voice transport channel.
#[derive(Clone)]
pub struct VoiceLink {
    tx: flume::Sender<VoiceRequest>,
}

impl VoiceLink {
    pub fn new() -> (Self, flume::Receiver<VoiceRequest>) {
        let (tx, rx) = flume::unbounded();
        (Self { tx }, rx)
    }

    pub fn join(&self, guild_id: &GuildId, channel_id: ChannelId) -> bool {
        self.send(VoiceRequest::Join {
            guild_id: guild_id.clone(),
            channel_id,
        })
    }

    pub fn leave(&self, guild_id: &GuildId) -> bool {
        self.send(VoiceRequest::Leave {
            guild_id: guild_id.clone(),
        })
    }

    fn send(&self, request: VoiceRequest) -> bool {
        debug!("Voice request: {:?}", request);
        match self.tx.send(request) {
            Ok(()) => true,
            Err(flume::SendError(request)) => {
                warn!("Voice transport is gone, dropped {:?}", request);
                false
            }
        }
    }
}

/// Sticky voice channel per guild.
#[derive(Default)]
pub struct VoiceChannels {
    channels: DashMap<GuildId, ChannelId>,
}

impl VoiceChannels {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the channel it replaced.
    pub fn set(&self, guild_id: GuildId, channel_id: ChannelId) -> Option<ChannelId> {
        self.channels.insert(guild_id, channel_id)
    }

    pub fn get(&self, guild_id: &GuildId) -> Option<ChannelId> {
        self.channels.get(guild_id).map(|c| *c)
    }

    pub fn remove(&self, guild_id: &GuildId) -> bool {
        self.channels.remove(guild_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn snapshot(&self) -> Vec<(GuildId, ChannelId)> {
        self.channels
            .iter()
            .map(|e| (e.key().clone(), *e.value()))
            .collect()
    }

    pub fn clear(&self) {
        self.channels.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_forwards_requests() {
        let (link, rx) = VoiceLink::new();
        let guild = GuildId::from("1");
        assert!(link.join(&guild, ChannelId(42)));
        assert!(link.leave(&guild));

        assert_eq!(
            rx.try_recv().unwrap(),
            VoiceRequest::Join {
                guild_id: guild.clone(),
                channel_id: ChannelId(42)
            }
        );
        assert_eq!(rx.try_recv().unwrap(), VoiceRequest::Leave { guild_id: guild });
    }

    #[test]
    fn test_link_survives_closed_transport() {
        let (link, rx) = VoiceLink::new();
        drop(rx);
        assert!(!link.leave(&GuildId::from("1")));
    }

    #[test]
    fn test_request_json_shape() {
        let json = serde_json::to_value(VoiceRequest::Join {
            guild_id: GuildId::from("1"),
            channel_id: ChannelId(9),
        })
        .unwrap();
        assert_eq!(json["op"], "join");
        assert_eq!(json["guildId"], "1");
        assert_eq!(json["channelId"], 9);
    }

    #[test]
    fn test_channels_are_sticky() {
        let channels = VoiceChannels::new();
        let guild = GuildId::from("1");
        assert_eq!(channels.set(guild.clone(), ChannelId(1)), None);
        assert_eq!(channels.set(guild.clone(), ChannelId(2)), Some(ChannelId(1)));
        assert_eq!(channels.get(&guild), Some(ChannelId(2)));
        assert!(channels.remove(&guild));
        assert!(!channels.remove(&guild));
    }
}
