use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use crate::protocol::Typology;

static JOIN_ARGS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<address>\S+)\s+(?P<port>\S+)\s+(?P<chat>\S.*?)\s*$")
        .expect("join pattern is valid")
});

pub const HELP: &str = "\
/create <name>                 create a chat and make it current
/join <address> <port> <chat>  connect to a peer and join one of its chats
/msg <text>                    send a message (plain text works too)
/leave                         leave the current chat
/users                         list members of the current chat
/chats                         list known chats
/quit                          stop the node
/help                          show this help";

/// A command typed on the console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    CreateChat { name: String },
    Join { address: String, port: u16, chat: String },
    Message { text: String },
    Leave,
    ListUsers,
    ListChats,
    Quit,
    Help,
}

impl Command {
    /// Operation kind this command produces; `None` for console-only commands.
    pub fn typology(&self) -> Option<Typology> {
        match self {
            Command::CreateChat { .. } => Some(Typology::CreateChat),
            Command::Join { .. } => Some(Typology::JoinChatByName),
            Command::Message { .. } => Some(Typology::AddMessage),
            Command::Leave => Some(Typology::LeaveChat),
            Command::ListUsers => Some(Typology::ListUsers),
            Command::ListChats => Some(Typology::ListChatsCommand),
            Command::Quit => Some(Typology::Quit),
            Command::Help => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("empty input")]
    Empty,
    #[error("unknown command `/{0}` (try /help)")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error("invalid port `{0}`")]
    InvalidPort(String),
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        if line.is_empty() {
            return Err(CommandError::Empty);
        }
        let Some(command_line) = line.strip_prefix('/') else {
            return Ok(Command::Message {
                text: line.to_string(),
            });
        };

        let (name, args) = match command_line.split_once(char::is_whitespace) {
            Some((name, args)) => (name, args.trim()),
            None => (command_line, ""),
        };

        match name {
            "create" => required(args, "/create <name>").map(|name| Command::CreateChat { name }),
            "join" => parse_join(args),
            "msg" => required(args, "/msg <text>").map(|text| Command::Message { text }),
            "leave" => no_args(args, "/leave", Command::Leave),
            "users" => no_args(args, "/users", Command::ListUsers),
            "chats" => no_args(args, "/chats", Command::ListChats),
            "quit" | "exit" => no_args(args, "/quit", Command::Quit),
            "help" => Ok(Command::Help),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}

fn required(args: &str, usage: &'static str) -> Result<String, CommandError> {
    if args.is_empty() {
        Err(CommandError::Usage(usage))
    } else {
        Ok(args.to_string())
    }
}

fn no_args(args: &str, usage: &'static str, command: Command) -> Result<Command, CommandError> {
    if args.is_empty() {
        Ok(command)
    } else {
        Err(CommandError::Usage(usage))
    }
}

fn parse_join(args: &str) -> Result<Command, CommandError> {
    let captures = JOIN_ARGS
        .captures(args)
        .ok_or(CommandError::Usage("/join <address> <port> <chat>"))?;
    let port = &captures["port"];
    let port = port
        .parse::<u16>()
        .ok()
        .filter(|port| *port != 0)
        .ok_or_else(|| CommandError::InvalidPort(port.to_string()))?;
    Ok(Command::Join {
        address: captures["address"].to_string(),
        port,
        chat: captures["chat"].to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_a_message() {
        assert_eq!(
            "  hello there ".parse::<Command>(),
            Ok(Command::Message {
                text: "hello there".to_string()
            })
        );
        assert_eq!(
            "/msg /not a command".parse::<Command>(),
            Ok(Command::Message {
                text: "/not a command".to_string()
            })
        );
    }

    #[test]
    fn test_parse_join() {
        assert_eq!(
            "/join 127.0.0.1 9001 rust lovers".parse::<Command>(),
            Ok(Command::Join {
                address: "127.0.0.1".to_string(),
                port: 9001,
                chat: "rust lovers".to_string(),
            })
        );
        assert_eq!(
            "/join 127.0.0.1 99999 room".parse::<Command>(),
            Err(CommandError::InvalidPort("99999".to_string()))
        );
        assert!(matches!(
            "/join 127.0.0.1".parse::<Command>(),
            Err(CommandError::Usage(_))
        ));
    }

    #[test]
    fn test_argument_shapes() {
        assert_eq!(
            "/create room".parse::<Command>(),
            Ok(Command::CreateChat {
                name: "room".to_string()
            })
        );
        assert!(matches!("/create".parse::<Command>(), Err(CommandError::Usage(_))));
        assert_eq!("/leave".parse::<Command>(), Ok(Command::Leave));
        assert!(matches!("/leave now".parse::<Command>(), Err(CommandError::Usage(_))));
        assert_eq!("/users".parse::<Command>(), Ok(Command::ListUsers));
        assert_eq!("/chats".parse::<Command>(), Ok(Command::ListChats));
        assert_eq!("/quit".parse::<Command>(), Ok(Command::Quit));
        assert_eq!("   ".parse::<Command>(), Err(CommandError::Empty));
        assert_eq!(
            "/dance".parse::<Command>(),
            Err(CommandError::Unknown("dance".to_string()))
        );
    }

    #[test]
    fn test_every_command_maps_to_one_typology() {
        assert_eq!(Command::Leave.typology(), Some(Typology::LeaveChat));
        assert_eq!(Command::ListChats.typology(), Some(Typology::ListChatsCommand));
        assert_eq!(Command::Help.typology(), None);
    }
}
