//! Room session coordinator.
//!
//! Sits on top of [`Connection`] and the frame codec and implements the room
//! state machine:
//!
//! ```text
//! Disconnected --connect()--> Connecting --opened / send Join--> AwaitingJoinAck
//! AwaitingJoinAck --Join for the local member--> Joined
//! any state --closed / disconnect()--> Disconnected
//! ```
//!
//! Inbound frames are applied only while `Joined` (errors are always
//! recorded). Outbound actions are local no-ops outside `Joined`.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use castline_shared::time::{Clock, SystemClock};

use crate::session::TokenStore;

use super::codec;
use super::connection::{Connection, ConnectionEvent, ConnectionEvents};
use super::event::{ChatEvent, MessageId};
use super::message::{ChatMessage, MessageLog};

/// Default chat endpoint path
pub const DEFAULT_CHAT_PATH: &str = "/ws";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomState {
    Disconnected,
    Connecting,
    AwaitingJoinAck,
    Joined,
}

/// Who joins which room, and where
#[derive(Debug, Clone)]
pub struct RoomOptions {
    pub room: String,
    pub member: String,
    /// The local user owns the room (the stream)
    pub is_owner: bool,
    pub path: String,
    /// Overrides the connection's default host
    pub host: Option<String>,
}

impl RoomOptions {
    pub fn new(room: impl Into<String>, member: impl Into<String>) -> Self {
        Self {
            room: room.into(),
            member: member.into(),
            is_owner: false,
            path: DEFAULT_CHAT_PATH.to_string(),
            host: None,
        }
    }

    pub fn owner(mut self, is_owner: bool) -> Self {
        self.is_owner = is_owner;
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }
}

/// Membership state scoped to one connection lifetime
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoomMembership {
    pub joined: bool,
    pub member_count: u32,
    pub blocked_members: BTreeSet<String>,
}

/// Visible outcome of one connection event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomUpdate {
    /// Transport open, join request sent
    AwaitingJoin,
    Joined,
    MemberJoined(String),
    MemberLeft(String),
    MemberCount(u32),
    MessageAdded(MessageId),
    MessageEdited(MessageId),
    MessageDeleted(MessageId),
    Blocked(String),
    Unblocked(String),
    ParamChanged { key: String, value: String },
    Named(String),
    Echo(String),
    /// `err` frame from the server
    ServerError(String),
    TransportError(String),
    Disconnected { reason: Option<String> },
}

pub struct RoomSession {
    connection: Connection,
    options: RoomOptions,
    tokens: Option<Arc<TokenStore>>,
    clock: Arc<dyn Clock>,
    events: Option<ConnectionEvents>,
    state: RoomState,
    membership: RoomMembership,
    messages: MessageLog,
    params: HashMap<String, String>,
    last_error: Option<String>,
}

impl RoomSession {
    pub fn new(connection: Connection, options: RoomOptions) -> Self {
        Self {
            connection,
            options,
            tokens: None,
            clock: Arc::new(SystemClock),
            events: None,
            state: RoomState::Disconnected,
            membership: RoomMembership::default(),
            messages: MessageLog::new(),
            params: HashMap::new(),
            last_error: None,
        }
    }

    /// Send the session's access token with the join request
    pub fn with_tokens(mut self, tokens: Arc<TokenStore>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn options(&self) -> &RoomOptions {
        &self.options
    }

    pub fn state(&self) -> RoomState {
        self.state
    }

    pub fn membership(&self) -> &RoomMembership {
        &self.membership
    }

    pub fn messages(&self) -> &MessageLog {
        &self.messages
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// The local member appears in the blocked set
    pub fn is_self_blocked(&self) -> bool {
        self.membership
            .blocked_members
            .contains(&self.options.member)
    }

    /// Open (or re-open) the room connection
    pub fn connect(&mut self) {
        self.reset_membership();
        let events = self
            .connection
            .connect(&self.options.path, self.options.host.as_deref());
        self.events = Some(events);
        self.state = RoomState::Connecting;
        tracing::info!(
            "Joining room '{}' as '{}'",
            self.options.room,
            self.options.member
        );
    }

    /// Close the connection and drop its listener
    pub fn disconnect(&mut self) {
        self.connection.disconnect();
        self.events = None;
        self.reset_membership();
        self.state = RoomState::Disconnected;
    }

    /// Announce leaving the room, then disconnect
    pub fn leave(&mut self) {
        if self.state == RoomState::Joined {
            self.send_event(&ChatEvent::Leave {
                member: self.options.member.clone(),
            });
        }
        self.disconnect();
    }

    /// Wait for the next visible update.
    ///
    /// Returns `None` when there is no connection listener (never connected,
    /// or disconnected). Dropped frames are skipped.
    pub async fn next_update(&mut self) -> Option<RoomUpdate> {
        loop {
            let event = self.events.as_mut()?.recv().await;
            let event = match event {
                Some(event) => event,
                None => ConnectionEvent::Closed { reason: None },
            };
            if let Some(update) = self.handle_event(event) {
                return Some(update);
            }
        }
    }

    /// Apply one connection event to the room state
    pub fn handle_event(&mut self, event: ConnectionEvent) -> Option<RoomUpdate> {
        match event {
            ConnectionEvent::Opened => {
                if self.state != RoomState::Connecting {
                    return None;
                }
                let access_token = self.tokens.as_ref().and_then(|tokens| tokens.access_token());
                self.send_event(&ChatEvent::Join {
                    room: self.options.room.clone(),
                    member: self.options.member.clone(),
                    access_token,
                });
                self.state = RoomState::AwaitingJoinAck;
                Some(RoomUpdate::AwaitingJoin)
            }
            ConnectionEvent::Message(frame) => match codec::parse(&frame) {
                Ok(event) => self.apply(event),
                Err(e) => {
                    tracing::warn!("Dropping frame ({}): {}", e, frame);
                    None
                }
            },
            ConnectionEvent::Error(message) => {
                self.last_error = Some(message.clone());
                Some(RoomUpdate::TransportError(message))
            }
            ConnectionEvent::Closed { reason } => {
                self.events = None;
                self.reset_membership();
                self.state = RoomState::Disconnected;
                tracing::info!("Left room '{}'", self.options.room);
                Some(RoomUpdate::Disconnected { reason })
            }
        }
    }

    fn apply(&mut self, event: ChatEvent) -> Option<RoomUpdate> {
        if let ChatEvent::Error { message } = event {
            tracing::warn!("Room '{}' error: {}", self.options.room, message);
            self.last_error = Some(message.clone());
            return Some(RoomUpdate::ServerError(message));
        }

        match self.state {
            RoomState::AwaitingJoinAck => match event {
                ChatEvent::Join { member, .. } if member == self.options.member => {
                    self.state = RoomState::Joined;
                    self.membership.joined = true;
                    tracing::info!("Joined room '{}'", self.options.room);
                    Some(RoomUpdate::Joined)
                }
                other => {
                    tracing::debug!("Ignoring {:?} before join", other.command());
                    None
                }
            },
            RoomState::Joined => self.apply_joined(event),
            RoomState::Disconnected | RoomState::Connecting => None,
        }
    }

    fn apply_joined(&mut self, event: ChatEvent) -> Option<RoomUpdate> {
        match event {
            ChatEvent::Join { member, .. } => Some(RoomUpdate::MemberJoined(member)),
            ChatEvent::Leave { member } => Some(RoomUpdate::MemberLeft(member)),
            ChatEvent::Count { value } => {
                self.membership.member_count = value;
                Some(RoomUpdate::MemberCount(value))
            }
            ChatEvent::Block { member } => {
                if !self.may_apply_block(&member) {
                    return None;
                }
                self.membership.blocked_members.insert(member.clone());
                Some(RoomUpdate::Blocked(member))
            }
            ChatEvent::Unblock { member } => {
                if !self.may_apply_block(&member) {
                    return None;
                }
                self.membership.blocked_members.remove(&member);
                Some(RoomUpdate::Unblocked(member))
            }
            ChatEvent::Msg {
                id,
                member,
                text,
                date,
            } => {
                let Some(id) = id else {
                    tracing::debug!("Ignoring message without id from '{}'", member);
                    return None;
                };
                let date = date.unwrap_or_else(|| self.clock.now());
                self.messages
                    .insert(ChatMessage::new(id, member, text, date))
                    .then_some(RoomUpdate::MessageAdded(id))
            }
            ChatEvent::MsgEdit { id, text, date } => {
                let date = date.unwrap_or_else(|| self.clock.now());
                self.messages
                    .edit(id, &text, date)
                    .then_some(RoomUpdate::MessageEdited(id))
            }
            ChatEvent::MsgDelete { id } => self
                .messages
                .delete(id, self.clock.now())
                .then_some(RoomUpdate::MessageDeleted(id)),
            ChatEvent::ParamString {
                key,
                value,
                is_owner_only,
                room,
            } => {
                // only room-scoped params meant for every member apply
                if is_owner_only || room.as_deref() != Some(self.options.room.as_str()) {
                    return None;
                }
                self.params.insert(key.clone(), value.clone());
                Some(RoomUpdate::ParamChanged { key, value })
            }
            ChatEvent::Name { member } => Some(RoomUpdate::Named(member)),
            ChatEvent::Echo { text } => Some(RoomUpdate::Echo(text)),
            ChatEvent::Error { message } => Some(RoomUpdate::ServerError(message)),
        }
    }

    /// Block effects apply to the owner's view, or to the affected member
    fn may_apply_block(&self, member: &str) -> bool {
        self.options.is_owner || member == self.options.member
    }

    fn reset_membership(&mut self) {
        self.membership = RoomMembership::default();
    }

    fn can_send(&self, argument: &str) -> bool {
        if self.state != RoomState::Joined {
            tracing::debug!("Action rejected: not joined");
            return false;
        }
        !argument.trim().is_empty()
    }

    fn send_event(&self, event: &ChatEvent) -> bool {
        self.connection.send(codec::serialize(event))
    }

    /// Returns `true` if the frame was queued
    pub fn send_message(&self, text: &str) -> bool {
        if !self.can_send(text) {
            return false;
        }
        self.send_event(&ChatEvent::Msg {
            id: None,
            member: self.options.member.clone(),
            text: text.trim().to_string(),
            date: None,
        })
    }

    pub fn edit_message(&self, id: MessageId, text: &str) -> bool {
        if !self.can_send(text) {
            return false;
        }
        self.send_event(&ChatEvent::MsgEdit {
            id,
            text: text.trim().to_string(),
            date: None,
        })
    }

    pub fn delete_message(&self, id: MessageId) -> bool {
        if self.state != RoomState::Joined {
            return false;
        }
        self.send_event(&ChatEvent::MsgDelete { id })
    }

    pub fn block_member(&self, member: &str) -> bool {
        if !self.can_send(member) {
            return false;
        }
        self.send_event(&ChatEvent::Block {
            member: member.trim().to_string(),
        })
    }

    pub fn unblock_member(&self, member: &str) -> bool {
        if !self.can_send(member) {
            return false;
        }
        self.send_event(&ChatEvent::Unblock {
            member: member.trim().to_string(),
        })
    }

    /// Broadcast a shared room parameter; owner only
    pub fn broadcast_param(&self, key: &str, value: &str, owner_only: bool) -> bool {
        if !self.options.is_owner || !self.can_send(key) {
            return false;
        }
        self.send_event(&ChatEvent::ParamString {
            key: key.trim().to_string(),
            value: value.to_string(),
            is_owner_only: owner_only,
            room: Some(self.options.room.clone()),
        })
    }
}
