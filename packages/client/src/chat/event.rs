//! Chat events exchanged with the room server.

use std::fmt;

use chrono::{DateTime, Utc};

/// Server-assigned message identifier (always greater than zero)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MessageId(u64);

impl MessageId {
    pub fn new(raw: u64) -> Option<Self> {
        (raw > 0).then_some(Self(raw))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One decoded frame of the chat protocol
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    /// Join request (outbound) or join announcement (inbound)
    Join {
        room: String,
        member: String,
        access_token: Option<String>,
    },
    Leave {
        member: String,
    },
    /// New message. `id` and `date` are assigned by the server and absent on
    /// an outbound send.
    Msg {
        id: Option<MessageId>,
        member: String,
        text: String,
        date: Option<DateTime<Utc>>,
    },
    MsgEdit {
        id: MessageId,
        text: String,
        date: Option<DateTime<Utc>>,
    },
    MsgDelete {
        id: MessageId,
    },
    Block {
        member: String,
    },
    Unblock {
        member: String,
    },
    Count {
        value: u32,
    },
    Error {
        message: String,
    },
    Echo {
        text: String,
    },
    Name {
        member: String,
    },
    /// Shared out-of-band room parameter (e.g. stream status)
    ParamString {
        key: String,
        value: String,
        is_owner_only: bool,
        room: Option<String>,
    },
}

impl ChatEvent {
    pub fn command(&self) -> Command {
        match self {
            ChatEvent::Join { .. } => Command::Join,
            ChatEvent::Leave { .. } => Command::Leave,
            ChatEvent::Msg { .. } => Command::Msg,
            ChatEvent::MsgEdit { .. } => Command::MsgEdit,
            ChatEvent::MsgDelete { .. } => Command::MsgDelete,
            ChatEvent::Block { .. } => Command::Block,
            ChatEvent::Unblock { .. } => Command::Unblock,
            ChatEvent::Count { .. } => Command::Count,
            ChatEvent::Error { .. } => Command::Error,
            ChatEvent::Echo { .. } => Command::Echo,
            ChatEvent::Name { .. } => Command::Name,
            ChatEvent::ParamString { .. } => Command::ParamString,
        }
    }
}

/// Command tag of a frame: the first key of its JSON object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Join,
    Leave,
    Msg,
    MsgEdit,
    MsgDelete,
    Block,
    Unblock,
    Count,
    Error,
    Echo,
    Name,
    ParamString,
}

impl Command {
    const ALL: [Command; 12] = [
        Command::Join,
        Command::Leave,
        Command::Msg,
        Command::MsgEdit,
        Command::MsgDelete,
        Command::Block,
        Command::Unblock,
        Command::Count,
        Command::Error,
        Command::Echo,
        Command::Name,
        Command::ParamString,
    ];

    /// Spelling used when encoding
    pub fn tag(self) -> &'static str {
        match self {
            Command::Join => "join",
            Command::Leave => "leave",
            Command::Msg => "msg",
            Command::MsgEdit => "msgPut",
            Command::MsgDelete => "msgCut",
            Command::Block => "block",
            Command::Unblock => "unblock",
            Command::Count => "count",
            Command::Error => "err",
            Command::Echo => "echo",
            Command::Name => "name",
            Command::ParamString => "prmStr",
        }
    }

    /// Case-insensitive lookup; `msgRmv` is an alias of `msgCut`
    pub fn from_tag(tag: &str) -> Option<Self> {
        if tag.eq_ignore_ascii_case("msgRmv") {
            return Some(Command::MsgDelete);
        }
        Self::ALL
            .into_iter()
            .find(|command| command.tag().eq_ignore_ascii_case(tag))
    }
}
