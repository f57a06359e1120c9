//! Frame codec of the chat protocol.
//!
//! A frame is one JSON object whose first key is the command tag. The value of
//! the tag key carries the command's primary argument; the remaining keys are
//! auxiliary fields:
//!
//! ```text
//! {"join":"42","member":"alice","accessToken":"T1"}
//! {"msg":"hello","id":7,"member":"alice","date":"2024-05-01T10:00:00Z"}
//! {"msgPut":"hello again","id":7}
//! {"msgCut":7}
//! {"prmStr":"status","value":"live","isOwnerOnly":false,"room":"42"}
//! ```
//!
//! Decoding first flattens the object into a string map (numbers and booleans
//! coerced to text), then builds the typed [`ChatEvent`] from that map.

use std::collections::HashMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};

use crate::error::FrameError;

use super::event::{ChatEvent, Command, MessageId};

/// Encode an event; the command key is always emitted first
pub fn serialize(event: &ChatEvent) -> String {
    let mut object = Map::new();
    let tag = event.command().tag().to_string();

    match event {
        ChatEvent::Join {
            room,
            member,
            access_token,
        } => {
            object.insert(tag, Value::from(room.as_str()));
            object.insert("member".into(), Value::from(member.as_str()));
            if let Some(token) = access_token {
                object.insert("accessToken".into(), Value::from(token.as_str()));
            }
        }
        ChatEvent::Msg {
            id,
            member,
            text,
            date,
        } => {
            object.insert(tag, Value::from(text.as_str()));
            if let Some(id) = id {
                object.insert("id".into(), Value::from(id.get()));
            }
            object.insert("member".into(), Value::from(member.as_str()));
            if let Some(date) = date {
                object.insert("date".into(), Value::from(encode_date(date)));
            }
        }
        ChatEvent::MsgEdit { id, text, date } => {
            object.insert(tag, Value::from(text.as_str()));
            object.insert("id".into(), Value::from(id.get()));
            if let Some(date) = date {
                object.insert("date".into(), Value::from(encode_date(date)));
            }
        }
        ChatEvent::MsgDelete { id } => {
            object.insert(tag, Value::from(id.get()));
        }
        ChatEvent::Leave { member }
        | ChatEvent::Block { member }
        | ChatEvent::Unblock { member }
        | ChatEvent::Name { member } => {
            object.insert(tag, Value::from(member.as_str()));
        }
        ChatEvent::Count { value } => {
            object.insert(tag, Value::from(*value));
        }
        ChatEvent::Error { message } => {
            object.insert(tag, Value::from(message.as_str()));
        }
        ChatEvent::Echo { text } => {
            object.insert(tag, Value::from(text.as_str()));
        }
        ChatEvent::ParamString {
            key,
            value,
            is_owner_only,
            room,
        } => {
            object.insert(tag, Value::from(key.as_str()));
            object.insert("value".into(), Value::from(value.as_str()));
            object.insert("isOwnerOnly".into(), Value::from(*is_owner_only));
            if let Some(room) = room {
                object.insert("room".into(), Value::from(room.as_str()));
            }
        }
    }

    Value::Object(object).to_string()
}

/// Decode one inbound frame.
///
/// # Errors
///
/// * [`FrameError::MalformedFrame`] - not enclosed in `{` `}`
/// * [`FrameError::UnknownCommand`] - the first quoted token is not a command
/// * [`FrameError::InvalidJson`] - the frame is not valid JSON
/// * [`FrameError::MissingField`] / [`FrameError::InvalidField`] - a field of
///   the command is absent or has the wrong shape
pub fn parse(frame: &str) -> Result<ChatEvent, FrameError> {
    let frame = frame.trim();
    if !(frame.starts_with('{') && frame.ends_with('}')) {
        return Err(FrameError::MalformedFrame);
    }

    let tag = first_quoted_token(frame).ok_or(FrameError::MalformedFrame)?;
    let command =
        Command::from_tag(tag).ok_or_else(|| FrameError::UnknownCommand(tag.to_string()))?;

    let object = match serde_json::from_str::<Value>(frame) {
        Ok(Value::Object(object)) => object,
        Ok(_) => return Err(FrameError::InvalidJson("not an object".to_string())),
        Err(e) => return Err(FrameError::InvalidJson(e.to_string())),
    };

    let fields = Fields {
        tag,
        values: flatten(object),
    };
    decode(command, &fields)
}

/// The text between the first two double quotes
fn first_quoted_token(frame: &str) -> Option<&str> {
    let start = frame.find('"')? + 1;
    let len = frame[start..].find('"')?;
    Some(&frame[start..start + len])
}

fn flatten(object: Map<String, Value>) -> HashMap<String, String> {
    object
        .into_iter()
        .filter_map(|(key, value)| {
            let text = match value {
                Value::Null => return None,
                Value::String(s) => s,
                Value::Bool(b) => b.to_string(),
                Value::Number(n) => n.to_string(),
                other => other.to_string(),
            };
            Some((key, text))
        })
        .collect()
}

struct Fields<'a> {
    tag: &'a str,
    values: HashMap<String, String>,
}

impl Fields<'_> {
    fn primary(&self, name: &'static str) -> Result<String, FrameError> {
        self.values
            .get(self.tag)
            .cloned()
            .ok_or(FrameError::MissingField(name))
    }

    fn optional(&self, name: &str) -> Option<String> {
        self.values.get(name).cloned()
    }

    fn required(&self, name: &'static str) -> Result<String, FrameError> {
        self.optional(name).ok_or(FrameError::MissingField(name))
    }
}

fn decode(command: Command, fields: &Fields<'_>) -> Result<ChatEvent, FrameError> {
    let event = match command {
        Command::Join => ChatEvent::Join {
            room: fields.primary("join")?,
            member: fields.required("member")?,
            access_token: fields.optional("accessToken"),
        },
        Command::Leave => ChatEvent::Leave {
            member: fields.primary("leave")?,
        },
        Command::Msg => ChatEvent::Msg {
            id: fields
                .optional("id")
                .map(|raw| parse_id("id", &raw))
                .transpose()?,
            member: fields.required("member")?,
            text: fields.primary("msg")?,
            date: fields
                .optional("date")
                .map(|raw| parse_date("date", &raw))
                .transpose()?,
        },
        Command::MsgEdit => ChatEvent::MsgEdit {
            id: parse_id("id", &fields.required("id")?)?,
            text: fields.primary("msgPut")?,
            date: fields
                .optional("date")
                .map(|raw| parse_date("date", &raw))
                .transpose()?,
        },
        Command::MsgDelete => ChatEvent::MsgDelete {
            id: parse_id("msgCut", &fields.primary("msgCut")?)?,
        },
        Command::Block => ChatEvent::Block {
            member: fields.primary("block")?,
        },
        Command::Unblock => ChatEvent::Unblock {
            member: fields.primary("unblock")?,
        },
        Command::Count => {
            let raw = fields.primary("count")?;
            ChatEvent::Count {
                value: raw.parse().map_err(|_| FrameError::InvalidField {
                    field: "count",
                    value: raw,
                })?,
            }
        }
        Command::Error => ChatEvent::Error {
            message: fields.primary("err")?,
        },
        Command::Echo => ChatEvent::Echo {
            text: fields.primary("echo")?,
        },
        Command::Name => ChatEvent::Name {
            member: fields.primary("name")?,
        },
        Command::ParamString => ChatEvent::ParamString {
            key: fields.primary("prmStr")?,
            value: fields.required("value")?,
            is_owner_only: fields
                .optional("isOwnerOnly")
                .map(|raw| parse_bool("isOwnerOnly", &raw))
                .transpose()?
                .unwrap_or(false),
            room: fields.optional("room"),
        },
    };
    Ok(event)
}

fn parse_id(field: &'static str, raw: &str) -> Result<MessageId, FrameError> {
    raw.trim()
        .parse::<u64>()
        .ok()
        .and_then(MessageId::new)
        .ok_or_else(|| FrameError::InvalidField {
            field,
            value: raw.to_string(),
        })
}

fn parse_bool(field: &'static str, raw: &str) -> Result<bool, FrameError> {
    match raw {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(FrameError::InvalidField {
            field,
            value: raw.to_string(),
        }),
    }
}

/// RFC 3339 text or Unix milliseconds
fn parse_date(field: &'static str, raw: &str) -> Result<DateTime<Utc>, FrameError> {
    if let Ok(date) = DateTime::parse_from_rfc3339(raw) {
        return Ok(date.with_timezone(&Utc));
    }
    raw.parse::<i64>()
        .ok()
        .and_then(castline_shared::time::from_millis)
        .ok_or_else(|| FrameError::InvalidField {
            field,
            value: raw.to_string(),
        })
}

fn encode_date(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}
