//! Push Notification Dispatcher
//!
//! Classifies server-initiated frames by their type tag and folds them into
//! the session's account snapshot or turns them into typed events.
//!
//! Tags are matched by substring, not equality: the server namespaces them
//! (for example `gamepb.userpb.BasicNotify`). A longer unrelated tag that
//! happens to contain one of the fragments below would be misclassified;
//! the full tag vocabulary is not known, so the looser match stays.

use prost::Message;

use super::events::{AccountSnapshot, SessionEvent};
use super::messages::{
    BasicNotify, EventMessage, FriendAddedNotify, FriendApplicationReceivedNotify,
    GoodsUnlockNotify, ItemNotify, LandsNotify, TaskInfoNotify,
};
use crate::infrastructure::metrics;
use crate::shared::error::ProtocolError;

/// Item ids whose count is the player's gold balance.
pub const GOLD_ITEM_IDS: [i64; 2] = [1, 1001];

/// Item ids whose count is the player's experience.
pub const EXP_ITEM_IDS: [i64; 2] = [1101, 2];

/// Recognized push notification kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushKind {
    Kickout,
    Basic,
    Item,
    Lands,
    FriendApplication,
    FriendAdded,
    GoodsUnlock,
    TaskInfo,
}

/// Checked in order; first fragment contained in the tag wins.
const TAG_TABLE: [(&str, PushKind); 8] = [
    ("Kickout", PushKind::Kickout),
    ("BasicNotify", PushKind::Basic),
    ("ItemNotify", PushKind::Item),
    ("LandsNotify", PushKind::Lands),
    ("FriendApplicationReceivedNotify", PushKind::FriendApplication),
    ("FriendAddedNotify", PushKind::FriendAdded),
    ("GoodsUnlockNotify", PushKind::GoodsUnlock),
    ("TaskInfoNotify", PushKind::TaskInfo),
];

impl PushKind {
    /// Classify a push tag; `None` for tags this client does not handle.
    pub fn classify(tag: &str) -> Option<Self> {
        TAG_TABLE
            .iter()
            .find(|(fragment, _)| tag.contains(fragment))
            .map(|(_, kind)| *kind)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PushKind::Kickout => "kickout",
            PushKind::Basic => "basic",
            PushKind::Item => "item",
            PushKind::Lands => "lands",
            PushKind::FriendApplication => "friend_application",
            PushKind::FriendAdded => "friend_added",
            PushKind::GoodsUnlock => "goods_unlock",
            PushKind::TaskInfo => "task_info",
        }
    }
}

/// Stateless push handler; all state lives in the snapshot passed in.
#[derive(Debug, Default, Clone, Copy)]
pub struct NotificationDispatcher;

impl NotificationDispatcher {
    pub fn new() -> Self {
        Self
    }

    /// Handle the body of one push envelope.
    ///
    /// Never fails: undecodable payloads are logged and dropped, leaving the
    /// snapshot untouched.
    pub fn dispatch(
        &self,
        push_body: &[u8],
        snapshot: &mut AccountSnapshot,
    ) -> Option<SessionEvent> {
        if push_body.is_empty() {
            return None;
        }

        let event = match EventMessage::decode(push_body) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to decode push envelope");
                return None;
            }
        };

        let Some(kind) = PushKind::classify(&event.message_type) else {
            tracing::trace!(tag = %event.message_type, "Ignoring unrecognized push");
            return None;
        };
        metrics::record_push_notification(kind.as_str());

        match Self::apply(kind, &event, snapshot) {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(tag = %event.message_type, error = %e, "Dropping malformed push");
                None
            }
        }
    }

    fn apply(
        kind: PushKind,
        event: &EventMessage,
        snapshot: &mut AccountSnapshot,
    ) -> Result<Option<SessionEvent>, ProtocolError> {
        let body = event.body.as_slice();
        match kind {
            PushKind::Kickout => {
                tracing::warn!(
                    tag = %event.message_type,
                    gid = snapshot.gid,
                    "Kicked out by server"
                );
                Ok(Some(SessionEvent::Kickout {
                    tag: event.message_type.clone(),
                }))
            }
            PushKind::Basic => {
                let notify = BasicNotify::decode(body)?;
                let Some(basic) = notify.basic else {
                    return Ok(None);
                };
                let old_level = snapshot.level;
                if basic.level != 0 {
                    snapshot.level = basic.level;
                }
                if basic.gold != 0 {
                    snapshot.gold = basic.gold;
                }
                if basic.exp > 0 {
                    snapshot.exp = basic.exp;
                }
                if snapshot.level != old_level {
                    tracing::info!(
                        gid = snapshot.gid,
                        from = old_level,
                        to = snapshot.level,
                        "Level up"
                    );
                }
                Ok(Some(SessionEvent::StatsUpdate {
                    level: snapshot.level,
                    gold: snapshot.gold,
                    exp: snapshot.exp,
                }))
            }
            PushKind::Item => {
                let notify = ItemNotify::decode(body)?;
                for item in notify.items.iter().filter_map(|change| change.item.as_ref()) {
                    if GOLD_ITEM_IDS.contains(&item.id) {
                        snapshot.gold = item.count;
                    } else if EXP_ITEM_IDS.contains(&item.id) {
                        snapshot.exp = item.count;
                    }
                }
                Ok(None)
            }
            PushKind::Lands => {
                let notify = LandsNotify::decode(body)?;
                if notify.lands.is_empty() {
                    return Ok(None);
                }
                if notify.host_gid == 0 || notify.host_gid == snapshot.gid {
                    Ok(Some(SessionEvent::LandsChanged(notify.lands)))
                } else {
                    Ok(Some(SessionEvent::FriendLandsChanged {
                        host_gid: notify.host_gid,
                        lands: notify.lands,
                    }))
                }
            }
            PushKind::FriendApplication => {
                let notify = FriendApplicationReceivedNotify::decode(body)?;
                if notify.applications.is_empty() {
                    return Ok(None);
                }
                Ok(Some(SessionEvent::FriendApplicationReceived(notify.applications)))
            }
            PushKind::FriendAdded => {
                let notify = FriendAddedNotify::decode(body)?;
                if notify.friends.is_empty() {
                    return Ok(None);
                }
                let names: Vec<String> = notify
                    .friends
                    .iter()
                    .map(|f| {
                        if !f.name.is_empty() {
                            f.name.clone()
                        } else if !f.remark.is_empty() {
                            f.remark.clone()
                        } else {
                            format!("GID:{}", f.gid)
                        }
                    })
                    .collect();
                tracing::info!(friends = %names.join(", "), "New friends");
                Ok(Some(SessionEvent::FriendAdded(notify.friends)))
            }
            PushKind::GoodsUnlock => {
                let notify = GoodsUnlockNotify::decode(body)?;
                if notify.goods_list.is_empty() {
                    return Ok(None);
                }
                tracing::info!(count = notify.goods_list.len(), "Shop goods unlocked");
                Ok(Some(SessionEvent::GoodsUnlocked(notify.goods_list)))
            }
            PushKind::TaskInfo => {
                let notify = TaskInfoNotify::decode(body)?;
                Ok(notify.task_info.map(SessionEvent::TaskInfo))
            }
        }
    }
}
