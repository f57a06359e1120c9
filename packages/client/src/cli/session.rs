//! One room session of the terminal client: prompt input, room updates and
//! session changes multiplexed on a single task.

use std::time::Duration;

use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tokio::sync::{mpsc, watch};

use crate::chat::{RoomSession, RoomState, RoomUpdate};
use crate::error::ClientError;
use crate::session::{TokenPair, TokenStore};

use super::command::InputCommand;
use super::formatter::MessageFormatter;
use super::ui::{prompt, show};

/// How often the persisted session is re-read for changes by other processes
const SESSION_RELOAD_INTERVAL: Duration = Duration::from_secs(5);

/// Start the blocking line editor; every non-empty line is forwarded.
///
/// The channel closes on Ctrl+C, Ctrl+D or a readline failure.
pub fn spawn_input_thread(member: &str) -> mpsc::UnboundedReceiver<String> {
    let (input_tx, input_rx) = mpsc::unbounded_channel::<String>();
    let prompt = prompt(member);

    std::thread::spawn(move || {
        let mut rl = match DefaultEditor::new() {
            Ok(rl) => rl,
            Err(e) => {
                eprintln!("Failed to initialize readline: {}", e);
                return;
            }
        };

        loop {
            match rl.readline(&prompt) {
                Ok(line) => {
                    let line = line.trim();
                    if !line.is_empty() {
                        rl.add_history_entry(line).ok();
                        if input_tx.send(line.to_string()).is_err() {
                            break;
                        }
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    tracing::info!("Interrupted");
                    break;
                }
                Err(ReadlineError::Eof) => {
                    tracing::info!("EOF");
                    break;
                }
                Err(err) => {
                    tracing::error!("Readline error: {}", err);
                    break;
                }
            }
        }
    });

    input_rx
}

/// Run the room until the user leaves (`Ok`) or the session ends (`Err`).
///
/// `on_joined` is called every time the room acknowledges the join.
pub async fn run_room_session(
    room: &mut RoomSession,
    input: &mut mpsc::UnboundedReceiver<String>,
    tokens: &TokenStore,
    session_changes: &mut watch::Receiver<Option<TokenPair>>,
    mut on_joined: impl FnMut(),
) -> Result<(), ClientError> {
    let member = room.options().member.clone();
    let mut reload = tokio::time::interval(SESSION_RELOAD_INTERVAL);

    room.connect();

    loop {
        tokio::select! {
            update = room.next_update() => match update {
                Some(RoomUpdate::Disconnected { reason }) => {
                    show(&MessageFormatter::format_disconnected(reason.as_deref()), &member);
                    return Err(ClientError::ConnectionError(
                        reason.unwrap_or_else(|| "closed by server".to_string()),
                    ));
                }
                Some(RoomUpdate::Joined) => {
                    on_joined();
                    let options = room.options();
                    show(
                        &MessageFormatter::format_joined(&options.room, &member, options.is_owner),
                        &member,
                    );
                }
                Some(update) => {
                    if let Some(output) = render_update(&update, room) {
                        show(&output, &member);
                    }
                }
                None => {
                    return Err(ClientError::ConnectionError("not connected".to_string()));
                }
            },
            line = input.recv() => match line {
                Some(line) => match InputCommand::parse(&line) {
                    Ok(InputCommand::Leave) => {
                        room.leave();
                        return Ok(());
                    }
                    Ok(command) => {
                        if let Some(output) = execute(room, command) {
                            show(&output, &member);
                        }
                    }
                    Err(e) => show(&format!("\n{}\n", e), &member),
                },
                None => {
                    room.leave();
                    return Ok(());
                }
            },
            changed = session_changes.changed() => {
                if changed.is_err() || session_changes.borrow_and_update().is_none() {
                    room.leave();
                    return Err(ClientError::NotAuthenticated("session was cleared".to_string()));
                }
                tracing::debug!("Session tokens changed");
            }
            _ = reload.tick() => {
                if tokens.reload() {
                    tracing::info!("Session changed by another process");
                }
            }
        }
    }
}

/// Text shown for a room update, if any
pub fn render_update(update: &RoomUpdate, room: &RoomSession) -> Option<String> {
    let me = room.options().member.as_str();
    let output = match update {
        RoomUpdate::AwaitingJoin => {
            tracing::debug!("Waiting for join acknowledgement");
            return None;
        }
        RoomUpdate::Joined => {
            let options = room.options();
            MessageFormatter::format_joined(&options.room, me, options.is_owner)
        }
        RoomUpdate::MemberJoined(member) => MessageFormatter::format_member_joined(member),
        RoomUpdate::MemberLeft(member) => MessageFormatter::format_member_left(member),
        RoomUpdate::MemberCount(count) => MessageFormatter::format_member_count(*count),
        RoomUpdate::MessageAdded(id) | RoomUpdate::MessageEdited(id) => {
            let message = room.messages().get(*id)?;
            MessageFormatter::format_chat_message(message, me)
        }
        RoomUpdate::MessageDeleted(id) => MessageFormatter::format_deleted(*id),
        RoomUpdate::Blocked(member) => MessageFormatter::format_blocked(member, me),
        RoomUpdate::Unblocked(member) => MessageFormatter::format_unblocked(member, me),
        RoomUpdate::ParamChanged { key, value } => MessageFormatter::format_param(key, value),
        RoomUpdate::Named(member) => MessageFormatter::format_param("name", member),
        RoomUpdate::Echo(text) => MessageFormatter::format_raw_message(text),
        RoomUpdate::ServerError(message) | RoomUpdate::TransportError(message) => {
            MessageFormatter::format_server_error(message)
        }
        RoomUpdate::Disconnected { reason } => {
            MessageFormatter::format_disconnected(reason.as_deref())
        }
    };
    Some(output)
}

/// Apply a prompt command to the room; returns feedback for the user
pub fn execute(room: &RoomSession, command: InputCommand) -> Option<String> {
    if command == InputCommand::Help {
        return Some(MessageFormatter::format_help());
    }
    if room.state() != RoomState::Joined {
        return Some("\nNot in the room yet, please wait\n".to_string());
    }

    let accepted = match command {
        InputCommand::Send(text) => {
            if room.is_self_blocked() {
                return Some("\nYou are blocked in this room\n".to_string());
            }
            room.send_message(&text)
        }
        InputCommand::Edit { id, text } => room.edit_message(id, &text),
        InputCommand::Delete(id) => room.delete_message(id),
        InputCommand::Block(member) => room.block_member(&member),
        InputCommand::Unblock(member) => room.unblock_member(&member),
        InputCommand::Status(value) => {
            if !room.options().is_owner {
                return Some("\nOnly the stream owner can change the status\n".to_string());
            }
            room.broadcast_param("status", &value, false)
        }
        InputCommand::Help => return Some(MessageFormatter::format_help()),
        InputCommand::Leave => return None,
    };

    if accepted {
        None
    } else {
        Some("\nNot sent\n".to_string())
    }
}
