//! Message formatting utilities for the terminal client.

use castline_shared::time::to_jst_rfc3339;

use crate::chat::{ChatMessage, MessageId};

const RULE: &str = "------------------------------------------------------------";
const BANNER: &str = "============================================================";

/// Message formatter for client display
pub struct MessageFormatter;

impl MessageFormatter {
    /// Format the banner shown once the room acknowledged the join
    ///
    /// # Arguments
    ///
    /// * `room` - Room (stream) id
    /// * `member` - The local member name
    /// * `is_owner` - Whether the local user owns the stream
    pub fn format_joined(room: &str, member: &str, is_owner: bool) -> String {
        let role = if is_owner { " (owner)" } else { "" };
        format!(
            "\n\n{}\nJoined room {} as {}{}\nType /help for commands.\n{}\n",
            BANNER, room, member, role, BANNER
        )
    }

    pub fn format_member_joined(member: &str) -> String {
        format!("\n+ {} joined\n", member)
    }

    pub fn format_member_left(member: &str) -> String {
        format!("\n- {} left\n", member)
    }

    pub fn format_member_count(count: u32) -> String {
        let noun = if count == 1 { "viewer" } else { "viewers" };
        format!("\n{} {} in the room\n", count, noun)
    }

    /// Format a chat message
    ///
    /// # Arguments
    ///
    /// * `message` - The message as stored in the room log
    /// * `me` - The local member name (to mark own messages)
    pub fn format_chat_message(message: &ChatMessage, me: &str) -> String {
        if message.is_deleted() {
            return Self::format_deleted(message.id);
        }
        let me_suffix = if message.member == me { " (me)" } else { "" };
        let edited = match &message.edited_at {
            Some(at) => format!(", edited at {}", to_jst_rfc3339(at)),
            None => String::new(),
        };
        format!(
            "\n\n{}\n[#{}] @{}{}: {}\nsent at {}{}\n{}\n",
            RULE,
            message.id,
            message.member,
            me_suffix,
            message.text,
            to_jst_rfc3339(&message.date),
            edited,
            RULE
        )
    }

    pub fn format_deleted(id: MessageId) -> String {
        format!("\n[#{}] (message deleted)\n", id)
    }

    pub fn format_blocked(member: &str, me: &str) -> String {
        if member == me {
            "\n! You have been blocked in this room\n".to_string()
        } else {
            format!("\n! {} was blocked\n", member)
        }
    }

    pub fn format_unblocked(member: &str, me: &str) -> String {
        if member == me {
            "\n! You have been unblocked\n".to_string()
        } else {
            format!("\n! {} was unblocked\n", member)
        }
    }

    pub fn format_param(key: &str, value: &str) -> String {
        format!("\n* {} is now '{}'\n", key, value)
    }

    pub fn format_server_error(message: &str) -> String {
        format!("\n! Server error: {}\n", message)
    }

    pub fn format_disconnected(reason: Option<&str>) -> String {
        match reason {
            Some(reason) => format!("\nDisconnected: {}\n", reason),
            None => "\nDisconnected by server\n".to_string(),
        }
    }

    /// Format the raw text of a frame the client does not display otherwise
    pub fn format_raw_message(text: &str) -> String {
        format!("\n← {}\n", text)
    }

    pub fn format_help() -> String {
        [
            "",
            "Commands:",
            "  <text>              send a message",
            "  /edit <id> <text>   edit one of your messages",
            "  /delete <id>        delete a message",
            "  /block <member>     block a member",
            "  /unblock <member>   unblock a member",
            "  /status <value>     broadcast the stream status (owner only)",
            "  /leave              leave the room and exit",
            "",
        ]
        .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use castline_shared::time::from_millis;

    fn message(member: &str, text: &str) -> ChatMessage {
        ChatMessage::new(
            MessageId::new(7).unwrap(),
            member.to_string(),
            text.to_string(),
            from_millis(1_672_498_800_000).unwrap(),
        )
    }

    #[test]
    fn test_format_joined_marks_owner() {
        // テスト項目: join 完了バナーにルームとオーナー表示が含まれる
        // given (前提条件):
        let room = "42";

        // when (操作):
        let owner = MessageFormatter::format_joined(room, "alice", true);
        let viewer = MessageFormatter::format_joined(room, "bob", false);

        // then (期待する結果):
        assert!(owner.contains("Joined room 42 as alice (owner)"));
        assert!(viewer.contains("as bob\n"));
        assert!(owner.contains(BANNER));
    }

    #[test]
    fn test_format_chat_message() {
        // テスト項目: チャットメッセージが ID・送信者・JST 時刻付きでフォーマットされる
        // given (前提条件):
        let message = message("alice", "Hello, world!");

        // when (操作):
        let mine = MessageFormatter::format_chat_message(&message, "alice");
        let theirs = MessageFormatter::format_chat_message(&message, "bob");

        // then (期待する結果):
        assert!(mine.contains("[#7] @alice (me): Hello, world!"));
        assert!(theirs.contains("[#7] @alice: Hello, world!"));
        assert!(mine.contains("sent at 2023-01-01T00:00:00+09:00"));
        assert!(!mine.contains("edited"));
    }

    #[test]
    fn test_format_edited_and_deleted_message() {
        // テスト項目: 編集済みは編集時刻付き、削除済みは本文なしで表示される
        // given (前提条件):
        let mut edited = message("alice", "fixed");
        edited.edited_at = from_millis(1_672_498_860_000);
        let mut deleted = message("alice", "secret");
        deleted.deleted_at = from_millis(1_672_498_900_000);

        // when (操作):
        let edited = MessageFormatter::format_chat_message(&edited, "bob");
        let deleted = MessageFormatter::format_chat_message(&deleted, "bob");

        // then (期待する結果):
        assert!(edited.contains("edited at 2023-01-01T00:01:00+09:00"));
        assert!(deleted.contains("(message deleted)"));
        assert!(!deleted.contains("secret"));
    }

    #[test]
    fn test_format_block_for_self_and_others() {
        // テスト項目: 自分がブロックされた場合は専用の文言になる
        // given (前提条件) / when (操作) / then (期待する結果):
        assert!(MessageFormatter::format_blocked("alice", "alice").contains("You have been blocked"));
        assert!(MessageFormatter::format_blocked("mallory", "alice").contains("mallory was blocked"));
        assert!(MessageFormatter::format_unblocked("alice", "alice").contains("unblocked"));
    }

    #[test]
    fn test_format_member_count() {
        // テスト項目: 人数表示が単数・複数で切り替わる
        // given (前提条件) / when (操作) / then (期待する結果):
        assert!(MessageFormatter::format_member_count(1).contains("1 viewer in"));
        assert!(MessageFormatter::format_member_count(3).contains("3 viewers in"));
    }

    #[test]
    fn test_format_disconnected() {
        // テスト項目: 切断理由の有無で表示が変わる
        // given (前提条件) / when (操作) / then (期待する結果):
        assert!(MessageFormatter::format_disconnected(None).contains("by server"));
        assert!(MessageFormatter::format_disconnected(Some("timeout")).contains("timeout"));
    }
}
