use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::ResourceOwner;

/// Write acknowledgement returned to callers.
///
/// Derived from the last event touched by a command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectDetails {
    pub sequence: u64,
    pub change_date: DateTime<Utc>,
    pub resource_owner: ResourceOwner,
}
