//! Events broadcast by the organizer for live dashboards

use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use super::types::OrganizationResult;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum OrganizerEvent {
    ResultUpdated(Box<OrganizationResult>),
    ResultDeleted(Uuid),
    LogCleared,
    /// The result was claimed for sorting
    ItemLocked(Uuid),
    ItemUnlocked(Uuid),
}

pub type EventSender = broadcast::Sender<OrganizerEvent>;

/// Send without caring whether anyone listens
pub fn emit(sender: &EventSender, event: OrganizerEvent) {
    let _ = sender.send(event);
}
