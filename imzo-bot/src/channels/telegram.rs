//! Telegram channel using teloxide long polling.
//!
//! Only text messages are forwarded to the bus. Outbound Markdown is split at
//! the message size limit first, then each chunk is rendered to Telegram HTML,
//! so no tag ever spans two messages.

use crate::bus::{InboundHandle, MessageBus};
use crate::channel::{Channel, ChannelBase, ChannelState, ChannelStatus};
use crate::error::{ChannelError, ChannelResult};
use crate::events::{InboundMessage, MessageFormat, OutboundMessage};
use async_trait::async_trait;
use regex::Regex;
use std::sync::{Arc, LazyLock};
use teloxide::dispatching::ShutdownToken;
use teloxide::prelude::*;
use teloxide::types::ParseMode;
use teloxide::{ApiError, RequestError};
use tokio::sync::{RwLock, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Channel name used for routing.
pub const CHANNEL_NAME: &str = "telegram";

/// Telegram's limit on the length of one message, in characters.
///
/// Telegram counts it after entity parsing, so a Markdown chunk of this
/// length never renders to a longer message.
pub const MAX_MESSAGE_LENGTH: usize = 4096;

const FENCE: &str = "```";
const FENCE_CLOSE: &str = "\n```";

/// Telegram bot channel.
pub struct TelegramChannel {
    base: Arc<ChannelBase>,
    token: String,
    max_message_length: usize,
    dispatcher: RwLock<Option<ShutdownToken>>,
    outbound_stop: RwLock<Option<CancellationToken>>,
}

impl std::fmt::Debug for TelegramChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramChannel")
            .field("base", &self.base)
            .field("token", &"<redacted>")
            .field("max_message_length", &self.max_message_length)
            .finish_non_exhaustive()
    }
}

impl TelegramChannel {
    /// Create a channel for the bot with the given token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            base: Arc::new(ChannelBase::new(CHANNEL_NAME)),
            token: token.into(),
            max_message_length: MAX_MESSAGE_LENGTH,
            dispatcher: RwLock::new(None),
            outbound_stop: RwLock::new(None),
        }
    }

    /// Override the split length.
    #[must_use]
    pub const fn max_message_length(mut self, len: usize) -> Self {
        self.max_message_length = len;
        self
    }

    async fn on_message(msg: Message, inbound: InboundHandle, base: Arc<ChannelBase>) {
        let Some(text) = msg.text() else {
            debug!(chat_id = msg.chat.id.0, "ignoring non-text message");
            return;
        };
        let sender = msg
            .from
            .as_ref()
            .map_or_else(|| msg.chat.id.0.to_string(), |u| u.id.0.to_string());
        let inbound_msg =
            InboundMessage::new(CHANNEL_NAME, sender, msg.chat.id.0.to_string(), text);

        base.record_received().await;
        if let Err(e) = inbound.publish(inbound_msg).await {
            base.record_error(format!("publish inbound: {e}")).await;
        }
    }

    async fn run_outbound(
        bot: Bot,
        base: Arc<ChannelBase>,
        mut rx: mpsc::Receiver<OutboundMessage>,
        stop: CancellationToken,
        max_len: usize,
    ) {
        loop {
            let msg = tokio::select! {
                () = stop.cancelled() => break,
                msg = rx.recv() => match msg {
                    Some(msg) => msg,
                    None => break,
                },
            };
            match deliver(&bot, &msg, max_len).await {
                Ok(()) => base.record_sent().await,
                Err(e) => base.record_error(e.to_string()).await,
            }
        }
        debug!("telegram outbound loop finished");
    }
}

async fn deliver(bot: &Bot, msg: &OutboundMessage, max_len: usize) -> ChannelResult<()> {
    let chat_id: i64 = msg
        .address
        .chat_id
        .parse()
        .map_err(|_| ChannelError::send(format!("invalid chat id: {}", msg.address.chat_id)))?;
    let chat_id = ChatId(chat_id);

    for chunk in split_message(&msg.content, max_len) {
        if msg.format == MessageFormat::Markdown {
            let html = markdown_to_telegram_html(&chunk);
            match bot.send_message(chat_id, html).parse_mode(ParseMode::Html).await {
                Ok(_) => continue,
                Err(e) if is_parse_error(&e) => {
                    warn!(chat = %msg.address, error = %e, "html rejected, resending as plain text");
                }
                Err(e) => return Err(ChannelError::send(e.to_string())),
            }
        }
        bot.send_message(chat_id, chunk)
            .await
            .map_err(|e| ChannelError::send(e.to_string()))?;
    }
    Ok(())
}

/// Whether Telegram refused the message because of its markup.
fn is_parse_error(err: &RequestError) -> bool {
    matches!(err, RequestError::Api(ApiError::CantParseEntities(_)))
}

/// Regexes for the Markdown subset answers use.
struct MarkdownPatterns {
    code_block: Regex,
    code_inline: Regex,
    bold_asterisk: Regex,
    bold_underscore: Regex,
    italic_asterisk: Regex,
    italic_underscore: Regex,
    strikethrough: Regex,
    link: Regex,
}

static PATTERNS: LazyLock<MarkdownPatterns> = LazyLock::new(|| MarkdownPatterns {
    code_block: Regex::new(r"```\w*\n?([\s\S]*?)```").expect("valid regex"),
    code_inline: Regex::new(r"`([^`\n]+)`").expect("valid regex"),
    bold_asterisk: Regex::new(r"\*\*(.+?)\*\*").expect("valid regex"),
    bold_underscore: Regex::new(r"__(.+?)__").expect("valid regex"),
    italic_asterisk: Regex::new(r"(^|[^*])\*([^*\n]+)\*").expect("valid regex"),
    italic_underscore: Regex::new(r"(^|\W)_([^_\n]+)_(\W|$)").expect("valid regex"),
    strikethrough: Regex::new(r"~~(.+?)~~").expect("valid regex"),
    link: Regex::new(r"\[([^\]]+)\]\(([^)\s]+)\)").expect("valid regex"),
});

/// Render Markdown as the HTML subset Telegram accepts.
///
/// HTML special characters are escaped first. Markdown inside code spans is
/// not protected.
#[must_use]
pub fn markdown_to_telegram_html(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    let p = &*PATTERNS;

    let escaped = text
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;");

    let steps: [(&Regex, &str); 8] = [
        (&p.code_block, "<pre>$1</pre>"),
        (&p.code_inline, "<code>$1</code>"),
        (&p.bold_asterisk, "<b>$1</b>"),
        (&p.bold_underscore, "<b>$1</b>"),
        (&p.italic_asterisk, "${1}<i>${2}</i>"),
        (&p.italic_underscore, "${1}<i>${2}</i>${3}"),
        (&p.strikethrough, "<s>$1</s>"),
        (&p.link, r#"<a href="$2">$1</a>"#),
    ];
    steps.iter().fold(escaped, |acc, (re, rep)| {
        re.replace_all(&acc, *rep).into_owned()
    })
}

/// Split Markdown `text` into chunks of at most `max_chars` characters,
/// preferring line boundaries.
///
/// A fenced code block cut by a chunk boundary is closed at the end of the
/// chunk and reopened, with its info string, at the start of the next one.
#[must_use]
pub fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    if max_chars == 0 || text.chars().count() <= max_chars {
        return vec![text.to_string()];
    }

    let mut splitter = Splitter {
        max_chars,
        chunks: Vec::new(),
        current: String::new(),
        current_len: 0,
        fence: None,
    };
    for line in text.lines() {
        splitter.push_line(line);
    }
    if !splitter.current.is_empty() {
        splitter.chunks.push(splitter.current);
    }
    splitter.chunks
}

struct Splitter {
    max_chars: usize,
    chunks: Vec<String>,
    current: String,
    current_len: usize,
    /// Opening line of the fenced block the current chunk is inside.
    fence: Option<String>,
}

impl Splitter {
    fn push_line(&mut self, line: &str) {
        let is_fence = line.trim_start().starts_with(FENCE);
        let open_after = self.fence.is_some() != is_fence;
        let reserve = if open_after { FENCE_CLOSE.len() } else { 0 };
        let reopen = self.fence.as_ref().map_or(0, |f| f.chars().count() + 1);
        let budget = self.max_chars.saturating_sub(reopen + reserve).max(1);

        let chars: Vec<char> = line.chars().collect();
        if chars.is_empty() {
            self.push_piece("", reserve);
        }
        for piece in chars.chunks(budget) {
            self.push_piece(&piece.iter().collect::<String>(), reserve);
        }

        if is_fence {
            self.fence = match self.fence {
                Some(_) => None,
                None => Some(line.trim().to_string()),
            };
        }
    }

    fn push_piece(&mut self, piece: &str, reserve: usize) {
        let len = piece.chars().count();
        if !self.current.is_empty() && self.current_len + 1 + len + reserve > self.max_chars {
            self.flush();
        }
        if !self.current.is_empty() {
            self.current.push('\n');
            self.current_len += 1;
        }
        self.current.push_str(piece);
        self.current_len += len;
    }

    fn flush(&mut self) {
        let mut chunk = std::mem::take(&mut self.current);
        self.current_len = 0;
        if let Some(opener) = &self.fence {
            chunk.push_str(FENCE_CLOSE);
            self.current.clone_from(opener);
            self.current_len = opener.chars().count();
        }
        self.chunks.push(chunk);
    }
}

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        self.base.name()
    }

    async fn start(&self, bus: &MessageBus) -> ChannelResult<()> {
        self.base.set_state(ChannelState::Starting).await;

        let bot = Bot::new(&self.token);
        if let Err(e) = bot.get_me().await {
            self.base.set_state(ChannelState::Error).await;
            self.base.record_error(e.to_string()).await;
            return Err(ChannelError::start(format!("telegram: {e}")));
        }

        let stop = CancellationToken::new();
        *self.outbound_stop.write().await = Some(stop.clone());
        let outbound_rx = bus.subscribe_channel(CHANNEL_NAME).await;
        tokio::spawn(Self::run_outbound(
            bot.clone(),
            Arc::clone(&self.base),
            outbound_rx,
            stop,
            self.max_message_length,
        ));

        let inbound = bus.inbound_handle();
        let base = Arc::clone(&self.base);
        let handler = Update::filter_message().endpoint(move |msg: Message| {
            let inbound = inbound.clone();
            let base = Arc::clone(&base);
            async move {
                Self::on_message(msg, inbound, base).await;
                Ok::<(), teloxide::RequestError>(())
            }
        });

        let mut dispatcher = Dispatcher::builder(bot, handler).build();
        *self.dispatcher.write().await = Some(dispatcher.shutdown_token());
        tokio::spawn(async move {
            dispatcher.dispatch().await;
        });

        self.base.set_state(ChannelState::Running).await;
        info!("telegram channel started");
        Ok(())
    }

    async fn stop(&self) -> ChannelResult<()> {
        self.base.set_state(ChannelState::Stopping).await;

        if let Some(token) = self.dispatcher.write().await.take() {
            match token.shutdown() {
                Ok(done) => done.await,
                Err(e) => warn!(error = %e, "telegram dispatcher was not running"),
            }
        }
        if let Some(stop) = self.outbound_stop.write().await.take() {
            stop.cancel();
        }

        self.base.set_state(ChannelState::Stopped).await;
        info!("telegram channel stopped");
        Ok(())
    }

    async fn status(&self) -> ChannelStatus {
        self.base.build_status().await
    }
}
