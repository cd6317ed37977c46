//! Team and app identity types.
//!
//! Teams are the tenants of the system; every app belongs to exactly one
//! team. All processor state is scoped to a (team, app) pair.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A team row from the metadata store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Team {
    /// Unique team ID
    pub id: Uuid,
}

/// An app row from the metadata store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct App {
    /// Unique app ID
    pub id: Uuid,
    /// Owning team ID
    pub team_id: Uuid,
}

impl Team {
    pub fn new(id: Uuid) -> Self {
        Self { id }
    }
}

impl App {
    pub fn new(id: Uuid, team_id: Uuid) -> Self {
        Self { id, team_id }
    }

    /// Returns the (team, app) key this app's state is scoped to.
    pub fn scope(&self) -> (Uuid, Uuid) {
        (self.team_id, self.id)
    }
}
