//! Parsing of stdin lines into client commands.

use recruiter_core::UserProfile;

pub const HELP: &str = "\
Type a message and press enter to chat.
  /edit <id> <content>                 edit an outreach step
  /sequence                            show the outreach sequence
  /history                             show the conversation
  /profile <name> [company] [context]  register yourself
  /status                              show connection state
  /quit                                leave the session and exit
Quote arguments that contain spaces: /edit msg-1 \"Hi {name}, ...\"";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Say(String),
    Edit { id: String, content: String },
    Sequence,
    History,
    Profile(UserProfile),
    Status,
    Help,
    Quit,
    Empty,
}

/// Parse one input line. Anything not starting with `/` is a chat message.
pub fn parse_command(line: &str) -> Result<Command, String> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() {
        return Ok(Command::Empty);
    }

    let Some(rest) = line.trim_start().strip_prefix('/') else {
        return Ok(Command::Say(line.to_string()));
    };

    let (name, args) = match rest.split_once(char::is_whitespace) {
        Some((name, args)) => (name, args.trim()),
        None => (rest, ""),
    };
    let args = shlex::split(args).ok_or_else(|| format!("Unbalanced quotes in /{name}"))?;

    match name {
        "edit" => {
            let mut args = args.into_iter();
            let id = args.next().ok_or("Usage: /edit <id> <content>")?;
            let content = args.collect::<Vec<_>>().join(" ");
            if content.is_empty() {
                return Err("Usage: /edit <id> <content>".to_string());
            }
            Ok(Command::Edit { id, content })
        }
        "profile" => {
            let mut args = args.into_iter();
            let name = args
                .next()
                .ok_or("Usage: /profile <name> [company] [context]")?;
            let company = args.next();
            let context = args.collect::<Vec<_>>().join(" ");
            Ok(Command::Profile(UserProfile {
                name,
                company,
                additional_context: (!context.is_empty()).then_some(context),
            }))
        }
        "sequence" | "seq" => Ok(Command::Sequence),
        "history" => Ok(Command::History),
        "status" => Ok(Command::Status),
        "help" | "?" => Ok(Command::Help),
        "quit" | "exit" | "q" => Ok(Command::Quit),
        other => Err(format!("Unknown command /{other}. Type /help for a list.")),
    }
}
