//! Message protocol definitions
//!
//! Plain-text wire protocol. Inbound payloads (after the nickname
//! handshake) parse into `ClientMessage`; outbound notices are
//! `ServerMessage` values rendered through `Display`.

use std::fmt;

use crate::client::ClientSummary;

/// User-list query, matched case-insensitively
pub const SHOW_USERS_COMMAND: &str = "$ show users";

/// Leading character of a directed message
pub const DIRECT_SIGIL: char = '>';

const SYSTEM_PREFIX: &str = "\x1b[31mSYSTEM MESSAGE:\x1b[0m";
const LISTING_COLOR: &str = "\x1b[32m";
const RESET_COLOR: &str = "\x1b[0m";

/// Decode one accumulated payload
///
/// Lossy UTF-8, with a single trailing `\n` or `\r\n` removed. Returns
/// None when nothing is left.
pub fn decode_payload(bytes: &[u8]) -> Option<String> {
    let decoded = String::from_utf8_lossy(bytes);
    let text: &str = &decoded;
    let text = text.strip_suffix('\n').unwrap_or(text);
    let text = text.strip_suffix('\r').unwrap_or(text);
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

/// Client → Server message (any payload after the handshake)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    /// `$ show users`
    ShowUsers,
    /// `> <nickname> <message>`
    Direct { target: String, body: String },
    /// Anything else, broadcast as-is
    Chat(String),
}

impl ClientMessage {
    /// Interpret a payload; malformed directed messages become chat lines
    pub fn parse(text: &str) -> Self {
        if text.eq_ignore_ascii_case(SHOW_USERS_COMMAND) {
            return ClientMessage::ShowUsers;
        }
        if let Some((target, body)) = parse_direct(text) {
            return ClientMessage::Direct {
                target: target.to_string(),
                body: body.to_string(),
            };
        }
        ClientMessage::Chat(text.to_string())
    }
}

/// Split `> target body` into its trimmed parts
fn parse_direct(text: &str) -> Option<(&str, &str)> {
    let rest = text.strip_prefix(DIRECT_SIGIL)?.strip_prefix(' ')?;
    let (target, body) = rest.trim_start_matches(' ').split_once(' ')?;
    let body = body.trim_matches(' ');
    if target.is_empty() || body.is_empty() {
        return None;
    }
    Some((target, body))
}

/// Server → Client message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// Another client completed its handshake
    Welcome { nickname: String },
    /// A client disconnected
    Leave { nickname: String },
    /// The recipient is the only registered client
    Caution,
    /// Public chat line
    Chat { from: String, content: String },
    /// Body of a directed message, delivered verbatim
    Direct { body: String },
    /// Response to `$ show users`
    UserList(Vec<ClientSummary>),
}

impl fmt::Display for ServerMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerMessage::Welcome { nickname } => {
                write!(f, "{SYSTEM_PREFIX}[{nickname}] joined to the chat room,welcome!")
            }
            ServerMessage::Leave { nickname } => {
                write!(f, "{SYSTEM_PREFIX}[{nickname}] leaved the chat room!")
            }
            ServerMessage::Caution => {
                write!(f, "{SYSTEM_PREFIX}Only you in the chat room now!")
            }
            ServerMessage::Chat { from, content } => write!(f, "[{from}] say >> {content}"),
            ServerMessage::Direct { body } => f.write_str(body),
            ServerMessage::UserList(rows) => {
                write!(f, "{LISTING_COLOR}Here are {} users online now!", rows.len())?;
                write!(
                    f,
                    "\nHOST        PORT    JOIN_TIME                  USERNAME"
                )?;
                for row in rows {
                    write!(
                        f,
                        "\n{}   {}   {}   {}",
                        row.host, row.port, row.joined_at, row.nickname
                    )?;
                }
                f.write_str(RESET_COLOR)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_strips_one_line_terminator() {
        assert_eq!(decode_payload(b"alice\n").as_deref(), Some("alice"));
        assert_eq!(decode_payload(b"alice\r\n").as_deref(), Some("alice"));
        assert_eq!(decode_payload(b"a\n\n").as_deref(), Some("a\n"));
        assert_eq!(decode_payload(b"  bob ").as_deref(), Some("  bob "));
        assert!(decode_payload(b"\r\n").is_none());
        assert!(decode_payload(b"").is_none());
    }

    #[test]
    fn test_show_users_any_case() {
        assert_eq!(ClientMessage::parse("$ show users"), ClientMessage::ShowUsers);
        assert_eq!(ClientMessage::parse("$ SHOW USERS"), ClientMessage::ShowUsers);
        assert_eq!(ClientMessage::parse("$ Show Users"), ClientMessage::ShowUsers);
        assert!(matches!(
            ClientMessage::parse("$ show users please"),
            ClientMessage::Chat(_)
        ));
    }

    #[test]
    fn test_direct_message_trimmed() {
        assert_eq!(
            ClientMessage::parse("> alice  hello there "),
            ClientMessage::Direct {
                target: "alice".to_string(),
                body: "hello there".to_string(),
            }
        );
        assert_eq!(
            ClientMessage::parse(">   bob hi"),
            ClientMessage::Direct {
                target: "bob".to_string(),
                body: "hi".to_string(),
            }
        );
    }

    #[test]
    fn test_malformed_direct_falls_back_to_chat() {
        for text in [">alice hi", "> alice", "> alice   ", ">", "> "] {
            assert_eq!(
                ClientMessage::parse(text),
                ClientMessage::Chat(text.to_string()),
                "{text:?}"
            );
        }
    }

    #[test]
    fn test_chat_line_format() {
        let msg = ServerMessage::Chat {
            from: "alice".to_string(),
            content: "hi everyone".to_string(),
        };
        assert_eq!(msg.to_string(), "[alice] say >> hi everyone");
    }

    #[test]
    fn test_notices_name_the_client() {
        let welcome = ServerMessage::Welcome {
            nickname: "bob".to_string(),
        };
        assert!(welcome.to_string().contains("[bob] joined"));

        let leave = ServerMessage::Leave {
            nickname: String::new(),
        };
        assert!(leave.to_string().contains("[] leaved"));

        let leave = ServerMessage::Leave {
            nickname: "bob".to_string(),
        };
        assert_eq!(
            leave.to_string(),
            "\x1b[31mSYSTEM MESSAGE:\x1b[0m[bob] leaved the chat room!"
        );

        assert!(ServerMessage::Caution.to_string().contains("Only you"));
    }

    #[test]
    fn test_user_list_rows() {
        let rows = vec![ClientSummary {
            host: "127.0.0.1".to_string(),
            port: "40000".to_string(),
            joined_at: "Mon Oct 19 10:00:00 2026".to_string(),
            nickname: "alice".to_string(),
        }];
        let text = ServerMessage::UserList(rows).to_string();
        assert!(text.contains("Here are 1 users online now!"));
        assert!(text.contains("127.0.0.1   40000   Mon Oct 19 10:00:00 2026   alice"));
        assert!(text.ends_with(RESET_COLOR));
    }
}
