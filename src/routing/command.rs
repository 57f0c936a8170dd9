use teloxide::utils::command::BotCommands;

/// Commands advertised in the Telegram command menu.
#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase")]
pub enum Command {
    #[command(description = "tampilkan bantuan")]
    Start,
    #[command(description = "tampilkan bantuan")]
    Help,
    #[command(description = "ajukan pertanyaan")]
    Tanya(String),
    #[command(description = "buat atau edit gambar")]
    Gambar(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedCommand {
    Known(Command),
    /// Addressed to a different bot with `/cmd@otherbot`.
    NotForUs,
    Unknown(String),
}

/// Parses a leading `/command[@bot] args` token. Returns `None` when `text`
/// is not a command at all.
///
/// Arguments may be separated from the command by any whitespace, including a
/// newline, and are trimmed.
pub fn parse_command(text: &str, bot_username: &str) -> Option<ParsedCommand> {
    let text = text.trim_start();
    let body = text.strip_prefix('/')?;
    let head_end = body
        .find(char::is_whitespace)
        .unwrap_or(body.len());
    let (head, rest) = body.split_at(head_end);
    if head.is_empty() {
        return None;
    }

    let (name, target) = match head.split_once('@') {
        Some((name, target)) => (name, Some(target)),
        None => (head, None),
    };
    if let Some(target) = target {
        let ours = bot_username.trim().trim_start_matches('@');
        if ours.is_empty() || !target.eq_ignore_ascii_case(ours) {
            return Some(ParsedCommand::NotForUs);
        }
    }

    let args = rest.trim().to_string();
    let command = match name.to_ascii_lowercase().as_str() {
        "start" => Command::Start,
        "help" => Command::Help,
        "tanya" => Command::Tanya(args),
        "gambar" => Command::Gambar(args),
        other => return Some(ParsedCommand::Unknown(other.to_string())),
    };
    Some(ParsedCommand::Known(command))
}

/// Prompt text following the image command, when `text` starts with it.
pub fn image_command_prompt(text: &str, bot_username: &str) -> Option<String> {
    match parse_command(text, bot_username) {
        Some(ParsedCommand::Known(Command::Gambar(prompt))) => Some(prompt),
        _ => None,
    }
}
