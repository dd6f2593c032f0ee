use std::io;

use homecat_agent::{AgentRuntime, TurnReply};
use homecat_core::config::{AppConfig, LoadOptions};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info};
use uuid::Uuid;

use super::{CommandResult, EXIT_CONFIG, EXIT_IO, EXIT_RUNTIME};
use crate::logging;

const EXIT_COMMANDS: [&str; 2] = ["/salir", "/exit"];
const RESET_COMMANDS: [&str; 2] = ["/reiniciar", "/reset"];

pub fn run(options: &LoadOptions, session: Option<String>) -> CommandResult {
    let config = match AppConfig::load(options.clone()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure("chat", "config_validation", error.to_string(), EXIT_CONFIG)
        }
    };
    if let Err(error) = logging::init(&config.logging) {
        debug!(%error, "keeping the existing log subscriber");
    }

    let runtime = match AgentRuntime::from_config(&config) {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure("chat", "runtime_build", error.to_string(), EXIT_RUNTIME)
        }
    };
    let executor = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(executor) => executor,
        Err(error) => {
            return CommandResult::failure(
                "chat",
                "runtime_build",
                format!("failed to initialize async runtime: {error}"),
                EXIT_RUNTIME,
            )
        }
    };

    let session_id = session.unwrap_or_else(|| Uuid::new_v4().to_string());
    let result = executor.block_on(async {
        let sweeper = runtime.store.start_eviction();
        let mut stdout = tokio::io::stdout();
        let outcome =
            converse(&runtime, &session_id, BufReader::new(tokio::io::stdin()), &mut stdout).await;
        if let Some(handle) = sweeper {
            handle.abort();
        }
        outcome
    });

    match result {
        Ok(turns) => {
            info!(session_id = %session_id, turns, "chat session closed");
            CommandResult::success("chat", format!("session {session_id} closed after {turns} turns"))
        }
        Err(error) => CommandResult::failure("chat", "io", error.to_string(), EXIT_IO),
    }
}

/// Reads one message per line until EOF or an exit command and writes each
/// reply. Returns how many messages were answered.
pub async fn converse<R, W>(
    runtime: &AgentRuntime,
    session_id: &str,
    reader: R,
    writer: &mut W,
) -> io::Result<usize>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    let mut turns = 0;

    while let Some(line) = lines.next_line().await? {
        let message = line.trim();
        if message.is_empty() {
            continue;
        }
        if EXIT_COMMANDS.contains(&message) {
            break;
        }
        if RESET_COMMANDS.contains(&message) {
            runtime.store.reset(session_id);
            writer.write_all("(conversación reiniciada)\n".as_bytes()).await?;
            continue;
        }

        let reply = runtime.handle_turn(session_id, message).await;
        turns += 1;
        writer.write_all(render_reply(&reply).as_bytes()).await?;
        writer.flush().await?;
    }

    Ok(turns)
}

pub fn render_reply(reply: &TurnReply) -> String {
    let mut rendered = format!("{}\n", reply.text);
    if let Some(card) = &reply.card {
        rendered.push_str(&format!("  [{}] {}\n", card.title, card.url));
        for image in &card.images {
            rendered.push_str(&format!("  - {image}\n"));
        }
    }
    rendered
}
