//! Prompt input parsing.

use crate::chat::MessageId;
use crate::error::ClientError;

/// One line typed at the prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputCommand {
    /// Plain text: post a chat message
    Send(String),
    Edit { id: MessageId, text: String },
    Delete(MessageId),
    Block(String),
    Unblock(String),
    /// Broadcast the stream status (owner only)
    Status(String),
    Leave,
    Help,
}

impl InputCommand {
    /// Parse a non-empty prompt line.
    ///
    /// Lines starting with `/` are commands; anything else is message text.
    pub fn parse(line: &str) -> Result<Self, ClientError> {
        let line = line.trim();
        let Some(command) = line.strip_prefix('/') else {
            return Ok(InputCommand::Send(line.to_string()));
        };

        let (name, rest) = match command.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (command, ""),
        };

        match name {
            "edit" => {
                let (id, text) = rest
                    .split_once(char::is_whitespace)
                    .ok_or_else(|| usage("/edit <id> <text>"))?;
                Ok(InputCommand::Edit {
                    id: parse_id(id)?,
                    text: text.trim().to_string(),
                })
            }
            "delete" => Ok(InputCommand::Delete(parse_id(rest)?)),
            "block" => Ok(InputCommand::Block(required(rest, "/block <member>")?)),
            "unblock" => Ok(InputCommand::Unblock(required(rest, "/unblock <member>")?)),
            "status" => Ok(InputCommand::Status(required(rest, "/status <value>")?)),
            "leave" | "quit" => Ok(InputCommand::Leave),
            "help" => Ok(InputCommand::Help),
            other => Err(ClientError::Input(format!(
                "unknown command '/{}' (try /help)",
                other
            ))),
        }
    }
}

fn usage(text: &str) -> ClientError {
    ClientError::Input(format!("usage: {}", text))
}

fn required(rest: &str, usage_text: &str) -> Result<String, ClientError> {
    if rest.is_empty() {
        return Err(usage(usage_text));
    }
    Ok(rest.to_string())
}

fn parse_id(raw: &str) -> Result<MessageId, ClientError> {
    raw.trim()
        .trim_start_matches('#')
        .parse::<u64>()
        .ok()
        .and_then(MessageId::new)
        .ok_or_else(|| ClientError::Input(format!("invalid message id '{}'", raw)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: u64) -> MessageId {
        MessageId::new(raw).unwrap()
    }

    #[test]
    fn test_plain_text_is_a_message() {
        // テスト項目: スラッシュで始まらない行はメッセージ送信になる
        // given (前提条件):
        let line = "  hello everyone ";

        // when (操作):
        let command = InputCommand::parse(line).unwrap();

        // then (期待する結果):
        assert_eq!(command, InputCommand::Send("hello everyone".to_string()));
    }

    #[test]
    fn test_edit_and_delete_take_message_id() {
        // テスト項目: /edit と /delete はメッセージ ID を解釈する（# 付きも可）
        // given (前提条件) / when (操作) / then (期待する結果):
        assert_eq!(
            InputCommand::parse("/edit 7 fixed typo").unwrap(),
            InputCommand::Edit {
                id: id(7),
                text: "fixed typo".to_string()
            }
        );
        assert_eq!(
            InputCommand::parse("/delete #7").unwrap(),
            InputCommand::Delete(id(7))
        );
    }

    #[test]
    fn test_member_commands() {
        // テスト項目: /block /unblock /status /leave が解釈される
        // given (前提条件) / when (操作) / then (期待する結果):
        assert_eq!(
            InputCommand::parse("/block mallory").unwrap(),
            InputCommand::Block("mallory".to_string())
        );
        assert_eq!(
            InputCommand::parse("/unblock mallory").unwrap(),
            InputCommand::Unblock("mallory".to_string())
        );
        assert_eq!(
            InputCommand::parse("/status live").unwrap(),
            InputCommand::Status("live".to_string())
        );
        assert_eq!(InputCommand::parse("/leave").unwrap(), InputCommand::Leave);
    }

    #[test]
    fn test_invalid_input_is_rejected() {
        // テスト項目: 引数不足・不正な ID・未知のコマンドは Input エラーになる
        // given (前提条件) / when (操作) / then (期待する結果):
        for line in ["/edit 7", "/delete 0", "/delete abc", "/block", "/shout hi"] {
            assert!(
                matches!(InputCommand::parse(line), Err(ClientError::Input(_))),
                "line: {}",
                line
            );
        }
    }
}
