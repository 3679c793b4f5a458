use async_trait::async_trait;
use futures_util::future::join_all;
use serde::Serialize;
use tracing::{info, warn};

use crate::types::{DestinationId, FormattingMode};

#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    async fn send(
        &self,
        destination: &DestinationId,
        text: &str,
        mode: FormattingMode,
    ) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Serialize)]
pub struct DeliveryFailure {
    pub destination: DestinationId,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DeliveryReport {
    pub delivered: Vec<DestinationId>,
    pub failed: Vec<DeliveryFailure>,
}

impl DeliveryReport {
    pub fn is_partial(&self) -> bool {
        !self.failed.is_empty()
    }
}

/// Sends `text` to every destination independently. A failed destination is
/// logged and reported; it never aborts or rolls back the others.
pub async fn broadcast(
    channel: &dyn DeliveryChannel,
    text: &str,
    mode: FormattingMode,
    destinations: &[DestinationId],
) -> DeliveryReport {
    let attempts = destinations.iter().map(|destination| async move {
        let outcome = channel.send(destination, text, mode).await;
        (destination, outcome)
    });

    let mut report = DeliveryReport::default();
    for (destination, outcome) in join_all(attempts).await {
        match outcome {
            Ok(()) => report.delivered.push(destination.clone()),
            Err(error) => {
                warn!(%destination, ?error, "failed to deliver message");
                report.failed.push(DeliveryFailure {
                    destination: destination.clone(),
                    error: format!("{error:#}"),
                });
            }
        }
    }

    info!(
        delivered = report.delivered.len(),
        failed = report.failed.len(),
        "broadcast finished"
    );
    report
}

/// Channel used when no chat transport is configured: messages only go to
/// the log.
#[derive(Debug, Clone, Default)]
pub struct LogChannel;

#[async_trait]
impl DeliveryChannel for LogChannel {
    async fn send(
        &self,
        destination: &DestinationId,
        text: &str,
        mode: FormattingMode,
    ) -> anyhow::Result<()> {
        info!(%destination, ?mode, chars = text.chars().count(), "message (log channel)\n{text}");
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashSet;

    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use crate::types::{DestinationId, FormattingMode};

    use super::DeliveryChannel;

    /// Records every attempt and fails for the configured destinations.
    #[derive(Debug, Default)]
    pub struct RecordingChannel {
        pub failing: HashSet<DestinationId>,
        pub attempts: Mutex<Vec<(DestinationId, String, FormattingMode)>>,
    }

    impl RecordingChannel {
        pub fn failing_for(destinations: &[&str]) -> Self {
            Self {
                failing: destinations.iter().map(|id| DestinationId::from(*id)).collect(),
                attempts: Mutex::default(),
            }
        }

        pub async fn attempts_for(&self, destination: &str) -> usize {
            self.attempts
                .lock()
                .await
                .iter()
                .filter(|(id, _, _)| id.as_str() == destination)
                .count()
        }
    }

    #[async_trait]
    impl DeliveryChannel for RecordingChannel {
        async fn send(
            &self,
            destination: &DestinationId,
            text: &str,
            mode: FormattingMode,
        ) -> anyhow::Result<()> {
            self.attempts
                .lock()
                .await
                .push((destination.clone(), text.to_owned(), mode));
            if self.failing.contains(destination) {
                anyhow::bail!("channel {destination} is gone");
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::types::{DestinationId, FormattingMode};

    use super::{LogChannel, broadcast, testing::RecordingChannel};

    #[tokio::test]
    async fn failed_destination_does_not_block_the_rest() {
        let channel = RecordingChannel::failing_for(&["2"]);
        let destinations = ["1", "2", "3"].map(DestinationId::from);

        let report = broadcast(&channel, "digest", FormattingMode::Markdown, &destinations).await;

        assert_eq!(channel.attempts_for("1").await, 1);
        assert_eq!(channel.attempts_for("2").await, 1);
        assert_eq!(channel.attempts_for("3").await, 1);
        assert_eq!(
            report.delivered,
            vec![DestinationId::from("1"), DestinationId::from("3")]
        );
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].destination.as_str(), "2");
        assert!(report.failed[0].error.contains("is gone"));
        assert!(report.is_partial());
    }

    #[tokio::test]
    async fn broadcast_to_nobody_is_a_no_op() {
        let report = broadcast(&LogChannel, "digest", FormattingMode::Plain, &[]).await;
        assert!(report.delivered.is_empty());
        assert!(!report.is_partial());
    }
}
