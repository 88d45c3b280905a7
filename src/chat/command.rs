// Line protocol: inbound commands and outbound frames

use std::fmt;

/// Prompt sent until the client submits an acceptable name
pub const SUBMIT_NAME: &str = "SUBMITNAME";
/// Prefix of the handshake acknowledgement
pub const NAME_ACCEPTED: &str = "NAMEACCEPTED";
/// Prefix of every chat or presence line
pub const MESSAGE: &str = "MESSAGE";
/// Case-insensitive prefix that ends a session
pub const QUIT: &str = "/quit";

/// A parsed client line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `BLOCK <names...>`
    Block(Vec<String>),
    /// `UNBLOCK <names...>`
    Unblock(Vec<String>),
    /// `PM ADD <names...>`
    GroupAdd(Vec<String>),
    /// `PM REMOVE <names...>`
    GroupRemove(Vec<String>),
    /// `/quit...`
    Quit,
    /// `;<bool>;<text>`, or any other line as a broadcast
    Message { private: bool, text: String },
}

impl Command {
    /// Classify one line (without its terminator).
    ///
    /// Never fails: anything that is not a control command becomes a
    /// message, and a malformed message frame is broadcast verbatim.
    pub fn parse(line: &str) -> Self {
        if is_quit(line) {
            return Command::Quit;
        }

        parse_control(line).unwrap_or_else(|| parse_message(line))
    }
}

// Keywords only count at the first byte of the line.
fn parse_control(line: &str) -> Option<Command> {
    if line.starts_with(char::is_whitespace) {
        return None;
    }

    let mut words = line.split_whitespace();
    match words.next()? {
        "BLOCK" => Some(Command::Block(collect_names(words))),
        "UNBLOCK" => Some(Command::Unblock(collect_names(words))),
        "PM" => match words.next()? {
            "ADD" => Some(Command::GroupAdd(collect_names(words))),
            "REMOVE" => Some(Command::GroupRemove(collect_names(words))),
            _ => None,
        },
        _ => None,
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Block(names) => write_names(f, "BLOCK", names),
            Command::Unblock(names) => write_names(f, "UNBLOCK", names),
            Command::GroupAdd(names) => write_names(f, "PM ADD", names),
            Command::GroupRemove(names) => write_names(f, "PM REMOVE", names),
            Command::Quit => f.write_str(QUIT),
            Command::Message { private, text } => write!(f, ";{};{}", private, text),
        }
    }
}

fn write_names(f: &mut fmt::Formatter<'_>, keyword: &str, names: &[String]) -> fmt::Result {
    f.write_str(keyword)?;
    for name in names {
        write!(f, " {}", name)?;
    }
    Ok(())
}

fn collect_names<'a>(words: impl Iterator<Item = &'a str>) -> Vec<String> {
    words.map(str::to_string).collect()
}

/// Whether `line` starts with the quit sentinel, ignoring case
pub fn is_quit(line: &str) -> bool {
    line.get(..QUIT.len())
        .map(|prefix| prefix.eq_ignore_ascii_case(QUIT))
        .unwrap_or(false)
}

fn parse_message(line: &str) -> Command {
    let broadcast_raw = || Command::Message {
        private: false,
        text: line.to_string(),
    };

    let Some(rest) = line.strip_prefix(';') else {
        return broadcast_raw();
    };
    let Some((flag, text)) = rest.split_once(';') else {
        return broadcast_raw();
    };

    let private = if flag.eq_ignore_ascii_case("true") {
        true
    } else if flag.eq_ignore_ascii_case("false") {
        false
    } else {
        return broadcast_raw();
    };

    Command::Message {
        private,
        text: text.to_string(),
    }
}

/// A line sent from the server to a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerLine {
    SubmitName,
    NameAccepted(String),
    Message(String),
}

impl ServerLine {
    /// Chat line from `sender`
    pub fn chat(sender: &str, text: &str) -> Self {
        ServerLine::Message(format!("{}: {}", sender, text))
    }

    pub fn joined(name: &str) -> Self {
        ServerLine::Message(format!("{} has joined", name))
    }

    pub fn left(name: &str) -> Self {
        ServerLine::Message(format!("{} has left", name))
    }

    /// Parse a server line; unknown lines yield `None`
    pub fn parse(line: &str) -> Option<Self> {
        if line == SUBMIT_NAME {
            return Some(ServerLine::SubmitName);
        }
        if let Some(name) = line.strip_prefix(NAME_ACCEPTED) {
            return name
                .strip_prefix(' ')
                .map(|n| ServerLine::NameAccepted(n.to_string()));
        }
        if let Some(text) = line.strip_prefix(MESSAGE) {
            return text
                .strip_prefix(' ')
                .map(|t| ServerLine::Message(t.to_string()));
        }
        None
    }
}

impl fmt::Display for ServerLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerLine::SubmitName => f.write_str(SUBMIT_NAME),
            ServerLine::NameAccepted(name) => write!(f, "{} {}", NAME_ACCEPTED, name),
            ServerLine::Message(text) => write!(f, "{} {}", MESSAGE, text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_control_commands() {
        assert_eq!(Command::parse("BLOCK bob"), Command::Block(names(&["bob"])));
        assert_eq!(
            Command::parse("UNBLOCK bob  carol"),
            Command::Unblock(names(&["bob", "carol"]))
        );
        assert_eq!(
            Command::parse("PM ADD bob carol"),
            Command::GroupAdd(names(&["bob", "carol"]))
        );
        assert_eq!(
            Command::parse("PM REMOVE bob"),
            Command::GroupRemove(names(&["bob"]))
        );
        assert_eq!(Command::parse("BLOCK"), Command::Block(vec![]));
    }

    #[test]
    fn test_parse_quit_is_case_insensitive_prefix() {
        assert_eq!(Command::parse("/quit"), Command::Quit);
        assert_eq!(Command::parse("/QUIT"), Command::Quit);
        assert_eq!(Command::parse("/Quit now please"), Command::Quit);
        assert_ne!(Command::parse("/qui"), Command::Quit);
        assert_ne!(Command::parse(" /quit"), Command::Quit);
    }

    #[test]
    fn test_indented_keyword_is_a_message() {
        assert_eq!(
            Command::parse(" BLOCK bob"),
            Command::Message {
                private: false,
                text: " BLOCK bob".to_string()
            }
        );
        assert_eq!(
            Command::parse("\tPM ADD bob"),
            Command::Message {
                private: false,
                text: "\tPM ADD bob".to_string()
            }
        );
    }

    #[test]
    fn test_parse_message_frames() {
        assert_eq!(
            Command::parse(";true;secret"),
            Command::Message {
                private: true,
                text: "secret".to_string()
            }
        );
        assert_eq!(
            Command::parse(";FALSE;hello; world"),
            Command::Message {
                private: false,
                text: "hello; world".to_string()
            }
        );
        assert_eq!(
            Command::parse(";false;"),
            Command::Message {
                private: false,
                text: String::new()
            }
        );
    }

    #[test]
    fn test_malformed_frames_broadcast_raw_line() {
        for line in ["hello there", ";maybe;hi", ";true", "PM hello", "PMADD bob"] {
            assert_eq!(
                Command::parse(line),
                Command::Message {
                    private: false,
                    text: line.to_string()
                },
                "line: {line}"
            );
        }
    }

    #[test]
    fn test_keywords_are_case_sensitive() {
        assert!(matches!(Command::parse("block bob"), Command::Message { .. }));
        assert!(matches!(Command::parse("pm add bob"), Command::Message { .. }));
    }

    #[test]
    fn test_command_display_matches_wire_form() {
        assert_eq!(Command::GroupAdd(names(&["a", "b"])).to_string(), "PM ADD a b");
        assert_eq!(
            Command::Message {
                private: true,
                text: "hi".to_string()
            }
            .to_string(),
            ";true;hi"
        );
    }

    #[test]
    fn test_server_lines() {
        assert_eq!(ServerLine::SubmitName.to_string(), "SUBMITNAME");
        assert_eq!(
            ServerLine::NameAccepted("bob".to_string()).to_string(),
            "NAMEACCEPTED bob"
        );
        assert_eq!(ServerLine::chat("A", "secret").to_string(), "MESSAGE A: secret");
        assert_eq!(ServerLine::joined("bob").to_string(), "MESSAGE bob has joined");
        assert_eq!(ServerLine::left("bob").to_string(), "MESSAGE bob has left");

        assert_eq!(
            ServerLine::parse("MESSAGE A: secret"),
            Some(ServerLine::Message("A: secret".to_string()))
        );
        assert_eq!(ServerLine::parse("SUBMITNAME"), Some(ServerLine::SubmitName));
        assert_eq!(ServerLine::parse("garbage"), None);
    }
}
