//! Stdin line parsing.
//!
//! Plain lines are chat messages. Lines starting with `/` are commands:
//!
//! ```text
//! /to <name>               set the recipient (no name clears it)
//! /encrypt on|off          toggle encryption for following messages
//! /key                     show the local public key
//! /addkey <name> <base64>  register a peer public key
//! /keys                    list registered public keys
//! /clearkeys               forget all registered public keys
//! /help                    show this list
//! /quit                    leave the chat
//! ```

use parley_client::SessionCommand;

/// Command reference shown by `/help`.
pub const HELP: &str = "\
/to <имя>                 получатель сообщений
/encrypt on|off           шифровать сообщения
/key                      показать свой публичный ключ
/addkey <имя> <ключ>      добавить публичный ключ собеседника
/keys                     показать сохранённые ключи
/clearkeys                удалить все публичные ключи
/quit                     выйти";

/// One parsed line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// Chat message text, as typed
    Message(String),
    /// Change the recipient; `None` clears it
    To(Option<String>),
    /// Turn encryption on or off
    Encrypt(bool),
    /// Forward a command to the session unchanged
    Command(SessionCommand),
    /// Show the command list
    Help,
    /// Unrecognized or malformed command, with a usage hint
    Invalid(String),
}

/// Parse one line read from stdin (without its newline).
pub fn parse_line(line: &str) -> Input {
    let Some(command) = line.trim_start().strip_prefix('/') else {
        return Input::Message(line.to_string());
    };

    let mut words = command.split_whitespace();
    let name = words.next().unwrap_or_default();
    let args: Vec<&str> = words.collect();

    match (name, args.as_slice()) {
        ("to", []) => Input::To(None),
        ("to", [recipient]) => Input::To(Some((*recipient).to_string())),
        ("encrypt", ["on"]) => Input::Encrypt(true),
        ("encrypt", ["off"]) => Input::Encrypt(false),
        ("encrypt", _) => Input::Invalid("использование: /encrypt on|off".to_string()),
        ("key", []) => Input::Command(SessionCommand::ShowPublicKey),
        ("addkey", [username, public_key]) => Input::Command(SessionCommand::RegisterPeer {
            username: (*username).to_string(),
            public_key: (*public_key).to_string(),
        }),
        ("addkey", _) => Input::Invalid("использование: /addkey <имя> <ключ>".to_string()),
        ("keys", []) => Input::Command(SessionCommand::ListPeers),
        ("clearkeys", []) => Input::Command(SessionCommand::ClearPeers),
        ("quit" | "exit", []) => Input::Command(SessionCommand::Exit),
        ("help", _) => Input::Help,
        _ => Input::Invalid(format!("неизвестная команда: /{command}")),
    }
}

/// Result of applying one input to the composer.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Outcome {
    /// Commands to submit, in order
    pub commands: Vec<SessionCommand>,
    /// Local feedback line, not sent anywhere
    pub output: Option<String>,
}

/// Per-terminal send settings: current recipient and encryption toggle.
#[derive(Debug, Clone, Default)]
pub struct Composer {
    recipient: String,
    encrypt: bool,
}

impl Composer {
    /// Start with the given recipient and encryption setting.
    pub fn new(recipient: Option<String>, encrypt: bool) -> Self {
        Self { recipient: recipient.unwrap_or_default(), encrypt }
    }

    /// Current recipient, empty if none.
    #[cfg(test)]
    pub fn recipient(&self) -> &str {
        &self.recipient
    }

    /// Whether messages are encrypted.
    #[cfg(test)]
    pub fn encrypt(&self) -> bool {
        self.encrypt
    }

    /// Apply one input.
    ///
    /// Changing either setting asks the session to prepare key material
    /// when encryption is on and a recipient is set.
    pub fn apply(&mut self, input: Input) -> Outcome {
        match input {
            Input::Message(text) => Outcome {
                commands: vec![SessionCommand::Send {
                    text,
                    recipient: self.recipient.clone(),
                    encrypt: self.encrypt,
                }],
                output: None,
            },
            Input::To(recipient) => {
                self.recipient = recipient.unwrap_or_default();
                let output = if self.recipient.is_empty() {
                    "Получатель не указан".to_string()
                } else {
                    format!("Получатель: {}", self.recipient)
                };
                Outcome { commands: self.prepare(), output: Some(output) }
            },
            Input::Encrypt(encrypt) => {
                self.encrypt = encrypt;
                let output = if encrypt { "Шифрование включено" } else { "Шифрование выключено" };
                Outcome { commands: self.prepare(), output: Some(output.to_string()) }
            },
            Input::Command(command) => Outcome { commands: vec![command], output: None },
            Input::Help => Outcome { commands: Vec::new(), output: Some(HELP.to_string()) },
            Input::Invalid(hint) => Outcome { commands: Vec::new(), output: Some(hint) },
        }
    }

    fn prepare(&self) -> Vec<SessionCommand> {
        if self.encrypt && !self.recipient.is_empty() {
            vec![SessionCommand::PrepareRecipient { recipient: self.recipient.clone() }]
        } else {
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_lines_are_messages() {
        assert_eq!(parse_line("hello: world "), Input::Message("hello: world ".into()));
        assert_eq!(parse_line(""), Input::Message(String::new()));
    }

    #[test]
    fn commands_parse() {
        assert_eq!(parse_line("/to bob"), Input::To(Some("bob".into())));
        assert_eq!(parse_line("/to"), Input::To(None));
        assert_eq!(parse_line("/encrypt on"), Input::Encrypt(true));
        assert_eq!(parse_line("  /quit"), Input::Command(SessionCommand::Exit));
        assert_eq!(parse_line("/keys"), Input::Command(SessionCommand::ListPeers));
        assert_eq!(
            parse_line("/addkey bob TUlJQg=="),
            Input::Command(SessionCommand::RegisterPeer {
                username: "bob".into(),
                public_key: "TUlJQg==".into(),
            })
        );
    }

    #[test]
    fn malformed_commands_are_invalid() {
        assert!(matches!(parse_line("/encrypt maybe"), Input::Invalid(_)));
        assert!(matches!(parse_line("/addkey bob"), Input::Invalid(_)));
        assert!(matches!(parse_line("/dance"), Input::Invalid(_)));
        assert!(matches!(parse_line("/"), Input::Invalid(_)));
    }

    #[test]
    fn messages_use_current_settings() {
        let mut composer = Composer::default();
        composer.apply(Input::To(Some("bob".into())));

        let outcome = composer.apply(Input::Message("hi".into()));
        assert_eq!(
            outcome.commands,
            vec![SessionCommand::Send { text: "hi".into(), recipient: "bob".into(), encrypt: false }]
        );
    }

    #[test]
    fn enabling_encryption_prepares_recipient() {
        let mut composer = Composer::new(Some("carol".into()), false);

        let outcome = composer.apply(Input::Encrypt(true));
        assert_eq!(
            outcome.commands,
            vec![SessionCommand::PrepareRecipient { recipient: "carol".into() }]
        );
        assert!(composer.encrypt());

        let outcome = composer.apply(Input::To(None));
        assert!(outcome.commands.is_empty());
        assert_eq!(composer.recipient(), "");
    }
}
