use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A task as it appears on the wire — in REST responses and in gateway
/// events. The owner is fixed at creation from the verified token subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub completed: bool,
    pub owner_id: Uuid,
}
