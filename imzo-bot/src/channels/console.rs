//! Local console channel.
//!
//! Reads questions from stdin as a single chat and prints replies to stdout.
//! Handy for trying the login flow against a backend without a Telegram bot.

use crate::bus::{InboundHandle, MessageBus};
use crate::channel::{Channel, ChannelBase, ChannelState, ChannelStatus};
use crate::error::{ChannelError, ChannelResult};
use crate::events::{InboundMessage, OutboundMessage};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::{RwLock, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Channel name used for routing.
pub const CHANNEL_NAME: &str = "console";

/// Chat id of the single console conversation.
pub const CONSOLE_CHAT_ID: &str = "local";

/// Stdin/stdout channel.
#[derive(Debug)]
pub struct ConsoleChannel {
    base: Arc<ChannelBase>,
    stop: RwLock<Option<CancellationToken>>,
}

impl Default for ConsoleChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleChannel {
    /// Create a stopped console channel.
    #[must_use]
    pub fn new() -> Self {
        Self {
            base: Arc::new(ChannelBase::new(CHANNEL_NAME)),
            stop: RwLock::new(None),
        }
    }

    #[allow(clippy::print_stdout)]
    fn print(msg: &OutboundMessage) {
        println!("\n{}\n", msg.content);
    }
}

/// Publish each non-empty line of `reader` until EOF or `stop`.
///
/// Returns the number of lines published.
pub(crate) async fn pump_lines<R>(
    reader: R,
    inbound: InboundHandle,
    base: Arc<ChannelBase>,
    stop: CancellationToken,
) -> usize
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut published = 0;
    loop {
        let line = tokio::select! {
            () = stop.cancelled() => break,
            line = lines.next_line() => line,
        };
        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                base.record_error(format!("read stdin: {e}")).await;
                break;
            }
        };
        let text = line.trim();
        if text.is_empty() {
            continue;
        }

        base.record_received().await;
        let msg = InboundMessage::new(CHANNEL_NAME, "user", CONSOLE_CHAT_ID, text);
        if let Err(e) = inbound.publish(msg).await {
            base.record_error(format!("publish inbound: {e}")).await;
            break;
        }
        published += 1;
    }
    debug!(published, "console input finished");
    published
}

async fn print_outbound(
    base: Arc<ChannelBase>,
    mut rx: mpsc::Receiver<OutboundMessage>,
    stop: CancellationToken,
) {
    loop {
        let msg = tokio::select! {
            () = stop.cancelled() => break,
            msg = rx.recv() => match msg {
                Some(msg) => msg,
                None => break,
            },
        };
        ConsoleChannel::print(&msg);
        base.record_sent().await;
    }
}

#[async_trait]
impl Channel for ConsoleChannel {
    fn name(&self) -> &str {
        self.base.name()
    }

    async fn start(&self, bus: &MessageBus) -> ChannelResult<()> {
        let mut slot = self.stop.write().await;
        if slot.is_some() {
            return Err(ChannelError::start("console channel already started"));
        }
        self.base.set_state(ChannelState::Starting).await;

        let stop = CancellationToken::new();
        let outbound_rx = bus.subscribe_channel(CHANNEL_NAME).await;
        tokio::spawn(print_outbound(
            Arc::clone(&self.base),
            outbound_rx,
            stop.clone(),
        ));
        tokio::spawn(pump_lines(
            BufReader::new(tokio::io::stdin()),
            bus.inbound_handle(),
            Arc::clone(&self.base),
            stop.clone(),
        ));
        *slot = Some(stop);

        self.base.set_state(ChannelState::Running).await;
        info!("console channel started, type /start to log in");
        Ok(())
    }

    async fn stop(&self) -> ChannelResult<()> {
        self.base.set_state(ChannelState::Stopping).await;
        if let Some(stop) = self.stop.write().await.take() {
            stop.cancel();
        }
        self.base.set_state(ChannelState::Stopped).await;
        info!("console channel stopped");
        Ok(())
    }

    async fn status(&self) -> ChannelStatus {
        self.base.build_status().await
    }
}
