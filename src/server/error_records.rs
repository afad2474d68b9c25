use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;
use tracing::debug;

use crate::{
    common::types::{ChannelId, GuildId, MessageId},
    configs::CleanupConfig,
};

/// Delivery errors accumulated for one guild.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorRecord {
    /// Last error message posted, so it can be edited instead of re-posted.
    pub message_id: Option<MessageId>,
    pub channel_id: Option<ChannelId>,
    pub error_count: u32,
    pub last_error_timestamp: u64,
}

/// Where a command's reply lands in the chat client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyTarget {
    pub channel_id: Option<ChannelId>,
    pub message_id: Option<MessageId>,
}

/// Rate-aware error bookkeeping per guild.
pub struct ErrorRecords {
    records: DashMap<GuildId, ErrorRecord>,
    cooldown_ms: u64,
    max_notifications: u32,
}

impl ErrorRecords {
    pub fn new(config: &CleanupConfig) -> Self {
        Self {
            records: DashMap::new(),
            cooldown_ms: config.error_notify_cooldown_secs * 1000,
            max_notifications: config.max_error_notifications,
        }
    }

    /// Counts one more error. The count starts over once the guild has been quiet for the
    /// cooldown.
    pub fn record(&self, guild_id: &GuildId, target: ReplyTarget, now: u64) -> ErrorRecord {
        let mut record = self.records.entry(guild_id.clone()).or_default();
        if now.saturating_sub(record.last_error_timestamp) >= self.cooldown_ms {
            record.error_count = 0;
        }
        record.error_count += 1;
        record.last_error_timestamp = now;
        if target.channel_id.is_some() {
            record.channel_id = target.channel_id;
        }
        if target.message_id.is_some() {
            record.message_id = target.message_id;
        }
        debug!("[{}] Error #{} recorded", guild_id, record.error_count);
        record.clone()
    }

    /// Whether the guild should still be told about errors.
    pub fn should_notify(&self, guild_id: &GuildId, now: u64) -> bool {
        match self.records.get(guild_id) {
            None => true,
            Some(record) => {
                record.error_count <= self.max_notifications
                    || now.saturating_sub(record.last_error_timestamp) >= self.cooldown_ms
            }
        }
    }

    pub fn get(&self, guild_id: &GuildId) -> Option<ErrorRecord> {
        self.records.get(guild_id).map(|r| r.value().clone())
    }

    /// Last writer wins.
    pub fn insert(&self, guild_id: GuildId, record: ErrorRecord) {
        self.records.insert(guild_id, record);
    }

    pub fn remove(&self, guild_id: &GuildId) -> bool {
        self.records.remove(guild_id).is_some()
    }

    /// Drops records whose last error is older than `retention`. Returns how many went.
    pub fn sweep_older_than(&self, now: u64, retention: Duration) -> usize {
        let retention_ms = retention.as_millis() as u64;
        let mut removed = 0;
        self.records.retain(|_, r| {
            let keep = now.saturating_sub(r.last_error_timestamp) <= retention_ms;
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn snapshot(&self) -> Vec<(GuildId, ErrorRecord)> {
        self.records
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect()
    }

    pub fn clear(&self) {
        self.records.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records() -> ErrorRecords {
        ErrorRecords::new(&CleanupConfig {
            error_notify_cooldown_secs: 60,
            max_error_notifications: 3,
            ..CleanupConfig::default()
        })
    }

    #[test]
    fn test_notifications_capped_until_cooldown() {
        let records = records();
        let guild = GuildId::from("1");
        let t0 = 1_000_000;

        assert!(records.should_notify(&guild, t0));
        for i in 0..3 {
            records.record(&guild, ReplyTarget::default(), t0 + i * 1_000);
            assert!(records.should_notify(&guild, t0 + i * 1_000));
        }
        let fourth = records.record(&guild, ReplyTarget::default(), t0 + 4_000);
        assert_eq!(fourth.error_count, 4);
        assert!(!records.should_notify(&guild, t0 + 4_000));

        // Quiet for the cooldown: notify again, and the next error starts a new count.
        assert!(records.should_notify(&guild, t0 + 64_000));
        let fresh = records.record(&guild, ReplyTarget::default(), t0 + 64_000);
        assert_eq!(fresh.error_count, 1);
    }

    #[test]
    fn test_record_keeps_last_reply_target() {
        let records = records();
        let guild = GuildId::from("1");
        records.record(
            &guild,
            ReplyTarget {
                channel_id: Some(ChannelId(5)),
                message_id: Some(MessageId(50)),
            },
            10,
        );
        let record = records.record(&guild, ReplyTarget::default(), 20);
        assert_eq!(record.channel_id, Some(ChannelId(5)));
        assert_eq!(record.message_id, Some(MessageId(50)));
        assert_eq!(record.last_error_timestamp, 20);
    }

    #[test]
    fn test_sweep_respects_retention() {
        let records = records();
        let hour = 3_600_000;
        let now = 100 * hour;
        records.insert(
            GuildId::from("old"),
            ErrorRecord {
                last_error_timestamp: now - 25 * hour,
                ..ErrorRecord::default()
            },
        );
        records.insert(
            GuildId::from("new"),
            ErrorRecord {
                last_error_timestamp: now - hour,
                ..ErrorRecord::default()
            },
        );

        assert_eq!(records.sweep_older_than(now, Duration::from_secs(24 * 3600)), 1);
        assert!(records.get(&GuildId::from("old")).is_none());
        assert!(records.get(&GuildId::from("new")).is_some());
    }
}
