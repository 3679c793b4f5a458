use std::sync::Arc;

use tracing::{debug, info};

use crate::{
    commands::{
        Command, EDIT_REPLY_USAGE, START_TEXT, format_user_list, help_text, parse_command,
        parse_user_line,
    },
    digest::{DailyReport, DigestService, ScheduleController, UserReport},
    sessions::EditSessionStore,
    types::{DestinationId, FormattingMode, TrackedUser},
};

#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub chat: DestinationId,
    pub author: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatReply {
    pub text: String,
    pub mode: FormattingMode,
}

impl ChatReply {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            mode: FormattingMode::Plain,
        }
    }

    pub fn markdown(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            mode: FormattingMode::Markdown,
        }
    }
}

/// Turns chat messages into roster changes and reports. Transport agnostic:
/// the Discord handler feeds it messages and sends back whatever it returns.
pub struct ChatBot {
    digest: Arc<DigestService>,
    schedule: Arc<ScheduleController>,
    sessions: EditSessionStore,
}

impl ChatBot {
    pub fn new(digest: Arc<DigestService>, schedule: Arc<ScheduleController>) -> Self {
        Self::with_sessions(digest, schedule, EditSessionStore::default())
    }

    pub fn with_sessions(
        digest: Arc<DigestService>,
        schedule: Arc<ScheduleController>,
        sessions: EditSessionStore,
    ) -> Self {
        Self {
            digest,
            schedule,
            sessions,
        }
    }

    /// Registers the chat for the daily digest and answers the message.
    /// `None` means the message needs no reply.
    pub async fn handle_message(
        &self,
        message: IncomingMessage,
    ) -> anyhow::Result<Option<ChatReply>> {
        if self.digest.roster().add_destination(&message.chat).await? {
            info!(chat = %message.chat, "registered new digest destination");
        }

        match parse_command(&message.text) {
            Some(command) => {
                debug!(chat = %message.chat, author = %message.author, ?command, "chat command");
                self.run_command(&message.chat, command).await.map(Some)
            }
            None => self.continue_edit(&message.chat, &message.text).await,
        }
    }

    async fn run_command(&self, chat: &DestinationId, command: Command) -> anyhow::Result<ChatReply> {
        let roster = self.digest.roster();

        let reply = match command {
            Command::Start => ChatReply::plain(START_TEXT),
            Command::Help => ChatReply::plain(help_text()),
            Command::Usage(usage) => ChatReply::plain(usage),
            Command::Unknown(name) => {
                ChatReply::plain(format!("Unknown command /{name}. Use /help to see every command."))
            }
            Command::List => ChatReply::plain(format_user_list(&roster.list_users().await?)),
            Command::Add {
                handle,
                display_name,
            } => {
                if self.digest.aggregator().fetch_profile(&handle).await.is_none() {
                    return Ok(ChatReply::plain(format!(
                        "Player {handle} was not found on Lichess"
                    )));
                }
                let user = TrackedUser::new(handle, display_name);
                if roster.add_user(user.clone()).await? {
                    info!(handle = %user.handle, "tracked user added");
                    ChatReply::plain(format!("Added {} ({})", user.handle, user.display_name))
                } else {
                    ChatReply::plain(format!("{} is already tracked", user.handle))
                }
            }
            Command::Edit { handle } => match roster.find_user(&handle).await? {
                Some(user) => {
                    self.sessions.start(chat, user.handle.clone()).await;
                    ChatReply::plain(format!(
                        "Editing {} ({}).\nSend the new handle and name as: {{handle}} {{display name}}",
                        user.handle, user.display_name
                    ))
                }
                None => ChatReply::plain(format!("{handle} is not tracked")),
            },
            Command::Remove { handle } => {
                if roster.remove_user(&handle).await? {
                    info!(%handle, "tracked user removed");
                    ChatReply::plain(format!("Removed {handle}"))
                } else {
                    ChatReply::plain(format!("{handle} is not tracked"))
                }
            }
            Command::DailyStats { handle: None } => match self.digest.daily_report_all().await? {
                DailyReport::Ready(text) => ChatReply::markdown(text),
                DailyReport::NoUsers => {
                    ChatReply::plain("No players are tracked yet. Add one with /add.")
                }
                DailyReport::NoData => {
                    ChatReply::plain("Could not fetch stats for any tracked player.")
                }
            },
            Command::DailyStats {
                handle: Some(handle),
            } => match self.digest.daily_report_for(&handle).await? {
                UserReport::Ready(text) => ChatReply::markdown(text),
                other => user_report_error(&handle, other),
            },
            Command::FullStats { handle } => {
                match self.digest.full_profile_report(&handle).await? {
                    UserReport::Ready(text) => ChatReply::plain(text),
                    other => user_report_error(&handle, other),
                }
            }
            Command::SetTime { time } => match self.schedule.set_time(&time).await? {
                Some(config) => ChatReply::plain(format!("Daily digest time set to {config}")),
                None => ChatReply::plain("Invalid time. Use HH:MM, for example 22:00"),
            },
        };
        Ok(reply)
    }

    async fn continue_edit(
        &self,
        chat: &DestinationId,
        text: &str,
    ) -> anyhow::Result<Option<ChatReply>> {
        let Some(old_handle) = self.sessions.active(chat).await else {
            return Ok(None);
        };

        let Some(updated) = parse_user_line(text) else {
            return Ok(Some(ChatReply::plain(EDIT_REPLY_USAGE)));
        };
        if self
            .digest
            .aggregator()
            .fetch_profile(&updated.handle)
            .await
            .is_none()
        {
            return Ok(Some(ChatReply::plain(format!(
                "Player {} was not found on Lichess",
                updated.handle
            ))));
        }

        let edited = self
            .digest
            .roster()
            .edit_user(&old_handle, updated.clone())
            .await?;
        self.sessions.clear(chat).await;

        let reply = if edited {
            info!(old = %old_handle, new = %updated.handle, "tracked user edited");
            format!(
                "Updated {old_handle} to {} ({})",
                updated.handle, updated.display_name
            )
        } else {
            format!(
                "Could not update {old_handle}: it is no longer tracked or {} is already tracked",
                updated.handle
            )
        };
        Ok(Some(ChatReply::plain(reply)))
    }
}

fn user_report_error(handle: &str, report: UserReport) -> ChatReply {
    match report {
        UserReport::UnknownUser => ChatReply::plain(format!("{handle} is not tracked")),
        _ => ChatReply::plain(format!("Could not fetch stats for {handle}")),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono_tz::Europe::Kyiv;
    use serde_json::json;

    use crate::{
        delivery::testing::RecordingChannel,
        digest::{DigestService, ScheduleController},
        format::ReportFormatter,
        lichess::{Profile, testing::FakeSource},
        roster::{InMemoryRosterStore, RosterStore},
        stats::StatsAggregator,
        types::{DestinationId, FormattingMode, TrackedUser},
    };

    use super::{ChatBot, ChatReply, IncomingMessage};

    fn profile(username: &str) -> Profile {
        Profile::from_value(&json!({
            "username": username,
            "perfs": {"rapid": {"rating": 1500, "games": 12}},
            "count": {"all": 12, "rated": 12, "win": 6, "draw": 0, "loss": 6}
        }))
        .expect("profile")
    }

    struct Harness {
        bot: ChatBot,
        roster: Arc<InMemoryRosterStore>,
        schedule: Arc<ScheduleController>,
    }

    fn harness() -> Harness {
        let source = FakeSource::default()
            .with_user("Hikaru", profile("Hikaru"), Vec::new())
            .with_user("Alireza2003", profile("alireza2003"), Vec::new());
        let roster = Arc::new(InMemoryRosterStore::default());
        let digest = Arc::new(DigestService::new(
            roster.clone(),
            StatsAggregator::new(Arc::new(source), Kyiv),
            ReportFormatter::new(Kyiv),
            Arc::new(RecordingChannel::default()),
        ));
        let schedule = Arc::new(ScheduleController::new(digest.clone(), Kyiv, "22:00"));

        Harness {
            bot: ChatBot::new(digest, schedule.clone()),
            roster,
            schedule,
        }
    }

    async fn send(bot: &ChatBot, chat: &str, text: &str) -> Option<ChatReply> {
        bot.handle_message(IncomingMessage {
            chat: DestinationId::from(chat),
            author: "tester".to_owned(),
            text: text.to_owned(),
        })
        .await
        .expect("message should be handled")
    }

    async fn reply_text(bot: &ChatBot, chat: &str, text: &str) -> String {
        send(bot, chat, text).await.expect("reply").text
    }

    #[tokio::test]
    async fn every_message_registers_its_chat() {
        let h = harness();
        assert_eq!(send(&h.bot, "100", "just chatting").await, None);
        send(&h.bot, "200", "/help").await;
        send(&h.bot, "100", "/list").await;

        assert_eq!(
            h.roster.list_destinations().await.unwrap(),
            vec![DestinationId::from("100"), DestinationId::from("200")]
        );
    }

    #[tokio::test]
    async fn add_verifies_the_handle_on_lichess() {
        let h = harness();
        assert_eq!(
            reply_text(&h.bot, "1", "/add ghost Nobody Here").await,
            "Player ghost was not found on Lichess"
        );
        assert_eq!(
            reply_text(&h.bot, "1", "/add Hikaru Hikaru Nakamura").await,
            "Added Hikaru (Hikaru Nakamura)"
        );
        assert_eq!(
            reply_text(&h.bot, "1", "/add Hikaru Again").await,
            "Hikaru is already tracked"
        );
        assert_eq!(
            reply_text(&h.bot, "1", "/list").await,
            "Tracked players:\nHikaru (Hikaru Nakamura)"
        );
    }

    #[tokio::test]
    async fn edit_session_completes_with_the_next_plain_message() {
        let h = harness();
        h.roster
            .add_user(TrackedUser::new("Hikaru", "Hikaru N"))
            .await
            .unwrap();

        assert_eq!(
            reply_text(&h.bot, "1", "/edit nobody").await,
            "nobody is not tracked"
        );
        assert!(
            reply_text(&h.bot, "1", "/edit hikaru")
                .await
                .starts_with("Editing Hikaru (Hikaru N).")
        );

        // Another chat has no session.
        assert_eq!(send(&h.bot, "2", "Alireza2003 Alireza").await, None);

        assert_eq!(
            reply_text(&h.bot, "1", "onlyhandle").await,
            "Usage: {handle} {display name}"
        );
        assert_eq!(
            reply_text(&h.bot, "1", "ghost Nobody").await,
            "Player ghost was not found on Lichess"
        );
        assert_eq!(
            reply_text(&h.bot, "1", "Alireza2003 Alireza Firouzja").await,
            "Updated Hikaru to Alireza2003 (Alireza Firouzja)"
        );
        assert_eq!(
            h.roster.list_users().await.unwrap(),
            vec![TrackedUser::new("Alireza2003", "Alireza Firouzja")]
        );

        // The session was cleared.
        assert_eq!(send(&h.bot, "1", "Hikaru Back Again").await, None);
    }

    #[tokio::test]
    async fn remove_reports_unknown_handles() {
        let h = harness();
        h.roster
            .add_user(TrackedUser::new("Hikaru", "Hikaru N"))
            .await
            .unwrap();

        assert_eq!(reply_text(&h.bot, "1", "/remove HIKARU").await, "Removed HIKARU");
        assert_eq!(
            reply_text(&h.bot, "1", "/remove Hikaru").await,
            "Hikaru is not tracked"
        );
    }

    #[tokio::test]
    async fn stats_commands_pick_reply_format() {
        let h = harness();
        assert_eq!(
            reply_text(&h.bot, "1", "/daily_stats").await,
            "No players are tracked yet. Add one with /add."
        );

        h.roster
            .add_user(TrackedUser::new("Hikaru", "Hikaru N"))
            .await
            .unwrap();
        // No activity history, so nothing to summarize.
        assert_eq!(
            reply_text(&h.bot, "1", "/daily_stats").await,
            "Could not fetch stats for any tracked player."
        );
        assert_eq!(
            reply_text(&h.bot, "1", "/daily_stats magnus").await,
            "magnus is not tracked"
        );

        let full = send(&h.bot, "1", "/full_stats hikaru").await.expect("reply");
        assert_eq!(full.mode, FormattingMode::Plain);
        assert!(full.text.starts_with("Full stats for Hikaru (Hikaru N):"));
    }

    #[tokio::test(start_paused = true)]
    async fn set_time_persists_and_rearms() {
        let h = harness();
        h.schedule.apply().await.unwrap();

        assert_eq!(
            reply_text(&h.bot, "1", "/set_time 25:00").await,
            "Invalid time. Use HH:MM, for example 22:00"
        );
        assert_eq!(
            reply_text(&h.bot, "1", "/set_time 07:30").await,
            "Daily digest time set to 07:30 Europe/Kyiv"
        );
        assert_eq!(
            h.schedule.active_config().await.map(|config| config.time_label()),
            Some("07:30".to_owned())
        );
        assert_eq!(
            h.roster.schedule_time().await.unwrap().as_deref(),
            Some("07:30")
        );
        h.schedule.shutdown().await;
    }

    #[tokio::test]
    async fn usage_and_unknown_commands_get_guidance() {
        let h = harness();
        assert_eq!(
            reply_text(&h.bot, "1", "/add").await,
            "Usage: /add {handle} {display name}"
        );
        assert_eq!(
            reply_text(&h.bot, "1", "/opening_stats x").await,
            "Unknown command /opening_stats. Use /help to see every command."
        );
    }
}
