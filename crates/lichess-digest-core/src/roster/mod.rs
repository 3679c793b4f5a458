mod in_memory;
mod postgres;

use async_trait::async_trait;

use crate::types::{DestinationId, TrackedUser};

pub use in_memory::InMemoryRosterStore;
pub use postgres::PostgresRosterStore;

/// Tracked users, the daily schedule time and the chats that receive the
/// scheduled digest. Handles compare case-insensitively everywhere.
#[async_trait]
pub trait RosterStore: Send + Sync {
    /// Users in the order they were added.
    async fn list_users(&self) -> anyhow::Result<Vec<TrackedUser>>;

    async fn find_user(&self, handle: &str) -> anyhow::Result<Option<TrackedUser>>;

    /// Returns false when the handle is already tracked.
    async fn add_user(&self, user: TrackedUser) -> anyhow::Result<bool>;

    /// Returns false when `old_handle` is unknown or the new handle belongs to
    /// another tracked user.
    async fn edit_user(&self, old_handle: &str, updated: TrackedUser) -> anyhow::Result<bool>;

    async fn remove_user(&self, handle: &str) -> anyhow::Result<bool>;

    /// `None` until a time has been stored.
    async fn schedule_time(&self) -> anyhow::Result<Option<String>>;

    /// Returns false for anything that is not a valid `HH:MM` time.
    async fn set_schedule_time(&self, time: &str) -> anyhow::Result<bool>;

    /// Returns false when the destination is already registered.
    async fn add_destination(&self, destination: &DestinationId) -> anyhow::Result<bool>;

    async fn list_destinations(&self) -> anyhow::Result<Vec<DestinationId>>;
}
