use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::types::{DestinationId, TrackedUser, parse_time_of_day};

use super::RosterStore;

#[derive(Debug, Default)]
pub struct InMemoryRosterStore {
    users: Arc<RwLock<Vec<TrackedUser>>>,
    schedule_time: Arc<RwLock<Option<String>>>,
    destinations: Arc<RwLock<Vec<DestinationId>>>,
}

#[async_trait]
impl RosterStore for InMemoryRosterStore {
    async fn list_users(&self) -> anyhow::Result<Vec<TrackedUser>> {
        Ok(self.users.read().await.clone())
    }

    async fn find_user(&self, handle: &str) -> anyhow::Result<Option<TrackedUser>> {
        Ok(self
            .users
            .read()
            .await
            .iter()
            .find(|user| user.matches_handle(handle))
            .cloned())
    }

    async fn add_user(&self, user: TrackedUser) -> anyhow::Result<bool> {
        let mut users = self.users.write().await;
        if users.iter().any(|existing| existing.matches_handle(&user.handle)) {
            return Ok(false);
        }
        users.push(user);
        Ok(true)
    }

    async fn edit_user(&self, old_handle: &str, updated: TrackedUser) -> anyhow::Result<bool> {
        let mut users = self.users.write().await;
        let Some(index) = users.iter().position(|user| user.matches_handle(old_handle)) else {
            return Ok(false);
        };

        let collides = users
            .iter()
            .enumerate()
            .any(|(other, user)| other != index && user.matches_handle(&updated.handle));
        if collides {
            return Ok(false);
        }

        users[index] = updated;
        Ok(true)
    }

    async fn remove_user(&self, handle: &str) -> anyhow::Result<bool> {
        let mut users = self.users.write().await;
        let initial_len = users.len();
        users.retain(|user| !user.matches_handle(handle));
        Ok(users.len() != initial_len)
    }

    async fn schedule_time(&self) -> anyhow::Result<Option<String>> {
        Ok(self.schedule_time.read().await.clone())
    }

    async fn set_schedule_time(&self, time: &str) -> anyhow::Result<bool> {
        let Ok(parsed) = parse_time_of_day(time) else {
            return Ok(false);
        };
        *self.schedule_time.write().await = Some(parsed.format("%H:%M").to_string());
        Ok(true)
    }

    async fn add_destination(&self, destination: &DestinationId) -> anyhow::Result<bool> {
        let mut destinations = self.destinations.write().await;
        if destinations.contains(destination) {
            return Ok(false);
        }
        destinations.push(destination.clone());
        Ok(true)
    }

    async fn list_destinations(&self) -> anyhow::Result<Vec<DestinationId>> {
        Ok(self.destinations.read().await.clone())
    }
}
