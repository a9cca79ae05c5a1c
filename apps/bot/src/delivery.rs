use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Url;
use teloxide::prelude::*;
use tracing::{debug, info};

use crate::bridge::{Delivery, Recipient};

/// Telegram rejects longer messages.
pub const MAX_MESSAGE_CHARS: usize = 4096;

pub struct TelegramDelivery {
    bot: Bot,
}

impl TelegramDelivery {
    pub fn new(token: &str) -> Self {
        Self {
            bot: Bot::new(token),
        }
    }
}

#[async_trait]
impl Delivery for TelegramDelivery {
    async fn deliver(&self, recipient: Recipient, text: &str) -> Result<()> {
        for chunk in split_message(text, MAX_MESSAGE_CHARS) {
            self.bot
                .send_message(ChatId(recipient), chunk)
                .await
                .with_context(|| format!("send to chat {recipient}"))?;
        }
        debug!(recipient, chars = text.chars().count(), "message sent");
        Ok(())
    }
}

/// Points the bot at `<public_url>/webhook/<token>`, dropping queued updates.
pub async fn register_webhook(public_url: &str, token: &str) -> Result<()> {
    let bot = Bot::new(token);
    let url = Url::parse(&format!(
        "{}/webhook/{}",
        public_url.trim_end_matches('/'),
        token
    ))
    .context("PUBLIC_URL is not a valid url")?;

    bot.delete_webhook()
        .drop_pending_updates(true)
        .await
        .context("delete webhook")?;
    bot.set_webhook(url).await.context("set webhook")?;

    info!(public_url, "webhook registered");
    Ok(())
}

/// Splits on line breaks where possible, never inside a character.
pub fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.split_inclusive('\n') {
        let line_len = line.chars().count();

        if current_len + line_len <= max_chars {
            current.push_str(line);
            current_len += line_len;
            continue;
        }

        if !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if line_len <= max_chars {
            current.push_str(line);
            current_len = line_len;
            continue;
        }

        let chars: Vec<char> = line.chars().collect();
        for piece in chars.chunks(max_chars) {
            if piece.len() == max_chars {
                chunks.push(piece.iter().collect());
            } else {
                current = piece.iter().collect();
                current_len = piece.len();
            }
        }
    }

    if !current.is_empty() || chunks.is_empty() {
        chunks.push(current);
    }
    chunks
}
