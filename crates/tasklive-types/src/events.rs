use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Task;

/// Events pushed over the WebSocket gateway after a mutation has been
/// durably applied. Every open channel receives every event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum GatewayEvent {
    /// A task was created
    TaskAdded(Task),

    /// A task's title or completion state changed
    TaskUpdated(Task),

    /// A task was removed
    #[serde(rename_all = "camelCase")]
    TaskDeleted { task_id: Uuid },
}
