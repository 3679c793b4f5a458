use std::sync::Arc;

use anyhow::anyhow;
use serenity::{
    async_trait,
    http::Http,
    model::{channel::Message, gateway::GatewayIntents, gateway::Ready, id::ChannelId},
    prelude::*,
};
use tracing::{error, info, warn};

use crate::{
    chat::{ChatBot, IncomingMessage},
    delivery::DeliveryChannel,
    types::{DestinationId, FormattingMode},
};

/// Discord rejects messages longer than this many characters.
pub const DISCORD_MESSAGE_LIMIT: usize = 2000;

const FENCE: &str = "```";

/// Sends to Discord text channels; the destination id is the channel id.
#[derive(Clone)]
pub struct DiscordChannel {
    http: Arc<Http>,
}

impl DiscordChannel {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }

    pub fn from_token(token: &str) -> Self {
        Self::new(Arc::new(Http::new(token)))
    }
}

#[async_trait]
impl DeliveryChannel for DiscordChannel {
    async fn send(
        &self,
        destination: &DestinationId,
        text: &str,
        mode: FormattingMode,
    ) -> anyhow::Result<()> {
        let channel = destination
            .as_str()
            .parse::<u64>()
            .ok()
            .filter(|id| *id != 0)
            .map(ChannelId::new)
            .ok_or_else(|| anyhow!("invalid Discord channel id {destination}"))?;

        // Plain and Markdown both go out as-is: the digest escapes its own
        // variable text, and Discord honours backslash escapes.
        let parts = split_message(text, DISCORD_MESSAGE_LIMIT);
        if parts.len() > 1 {
            info!(%destination, parts = parts.len(), ?mode, "splitting long Discord message");
        }
        for part in parts {
            channel.say(&self.http, part).await?;
        }
        Ok(())
    }
}

struct Handler {
    bot: Arc<ChatBot>,
    channel: DiscordChannel,
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!(user = %ready.user.name, guilds = ready.guilds.len(), "Discord gateway ready");
    }

    async fn message(&self, _ctx: Context, msg: Message) {
        if msg.author.bot {
            return;
        }

        let chat = DestinationId(msg.channel_id.to_string());
        let request = IncomingMessage {
            chat: chat.clone(),
            author: msg.author.name.clone(),
            text: msg.content.clone(),
        };

        match self.bot.handle_message(request).await {
            Ok(Some(reply)) => {
                if let Err(error) = self.channel.send(&chat, &reply.text, reply.mode).await {
                    error!(?error, %chat, "failed to send Discord message");
                }
            }
            Ok(None) => {}
            Err(error) => {
                error!(?error, %chat, "failed to process Discord message");
                if let Err(error) = self
                    .channel
                    .send(&chat, "Something went wrong, please try again later.", FormattingMode::Plain)
                    .await
                {
                    warn!(?error, %chat, "failed to report error to Discord");
                }
            }
        }
    }
}

pub async fn start_discord_bot(token: String, bot: Arc<ChatBot>) -> anyhow::Result<()> {
    let intents = GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::DIRECT_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    let handler = Handler {
        bot,
        channel: DiscordChannel::from_token(&token),
    };
    let mut client = Client::builder(token, intents)
        .event_handler(handler)
        .await?;

    info!("starting Discord gateway client");
    client.start().await?;
    Ok(())
}

/// Splits `text` into messages of at most `limit` characters.
///
/// Breaks prefer blank lines outside code fences, so digest blocks stay
/// whole. A block that is too long on its own is cut on line boundaries and
/// any fence open at the cut is closed and reopened in the next part.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    if char_len(text) <= limit {
        return vec![text.to_owned()];
    }

    let mut parts = Vec::new();
    let mut current = String::new();
    for block in top_level_blocks(text) {
        let block_len = char_len(&block);
        if block_len > limit {
            if !current.is_empty() {
                parts.push(std::mem::take(&mut current));
            }
            parts.extend(hard_split(&block, limit));
        } else if current.is_empty() {
            current = block;
        } else if char_len(&current) + 2 + block_len <= limit {
            current.push_str("\n\n");
            current.push_str(&block);
        } else {
            parts.push(std::mem::replace(&mut current, block));
        }
    }
    if !current.is_empty() {
        parts.push(current);
    }
    parts
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

fn is_fence(line: &str) -> bool {
    line.trim_start().starts_with(FENCE)
}

/// Paragraphs separated by blank lines that sit outside code fences.
fn top_level_blocks(text: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut lines: Vec<&str> = Vec::new();
    let mut in_fence = false;

    for line in text.lines() {
        if !in_fence && line.trim().is_empty() {
            if !lines.is_empty() {
                blocks.push(lines.join("\n"));
                lines.clear();
            }
            continue;
        }
        if is_fence(line) {
            in_fence = !in_fence;
        }
        lines.push(line);
    }
    if !lines.is_empty() {
        blocks.push(lines.join("\n"));
    }
    blocks
}

fn hard_split(block: &str, limit: usize) -> Vec<String> {
    // Room for the closing fence of a part cut inside a code block.
    let budget = limit.saturating_sub(FENCE.len() + 1).max(FENCE.len() + 2);
    let piece_len = budget - (FENCE.len() + 1);

    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_fence = false;

    for line in block.lines() {
        for (index, piece) in chunk_chars(line, piece_len).into_iter().enumerate() {
            // Pieces of one line are glued back together; only whole lines
            // and a reopened fence get a newline in front.
            let mut separator = !current.is_empty() && (index == 0 || current == FENCE);
            let needed = char_len(&current) + usize::from(separator) + char_len(&piece);
            if needed > budget && !current.is_empty() {
                let mut finished = std::mem::take(&mut current);
                if in_fence {
                    finished.push('\n');
                    finished.push_str(FENCE);
                    current.push_str(FENCE);
                }
                parts.push(finished);
                separator = !current.is_empty();
            }
            if separator {
                current.push('\n');
            }
            current.push_str(&piece);
        }
        if is_fence(line) {
            in_fence = !in_fence;
        }
    }
    if !current.is_empty() {
        parts.push(current);
    }
    parts
}

fn chunk_chars(line: &str, size: usize) -> Vec<String> {
    if line.is_empty() {
        return vec![String::new()];
    }
    let chars = line.chars().collect::<Vec<_>>();
    chars
        .chunks(size.max(1))
        .map(|chunk| chunk.iter().collect())
        .collect()
}
