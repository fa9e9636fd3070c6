use std::collections::HashMap;

use super::store::{AgentStatus, Avatar};

/// What a console line asks the office scene to do. Agent-editing commands
/// act on the selected agent, like the detail panel does.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum OfficeCommand {
    Help,
    Clear,
    ListAgents,
    New {
        name: String,
        title: String,
        avatar: Avatar,
    },
    Cancel,
    Select {
        target: String,
    },
    Deselect,
    TogglePanel,
    Rename {
        name: String,
    },
    Retitle {
        title: String,
    },
    SetAvatar {
        avatar: Avatar,
    },
    SetStatus {
        status: AgentStatus,
    },
    Learn {
        topic: String,
    },
    Forget {
        topic: String,
    },
    Say {
        text: String,
    },
    Move {
        x: f32,
        y: f32,
    },
    Remove {
        target: Option<String>,
    },
    Save,
    Load,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CommandParseError {
    reason: String,
    usage: String,
}

impl CommandParseError {
    fn new(reason: impl Into<String>, usage: &str) -> Self {
        Self {
            reason: reason.into(),
            usage: usage.to_string(),
        }
    }
}

type ParseFn = fn(&[String]) -> Result<OfficeCommand, CommandParseError>;

struct CommandSpec {
    name: &'static str,
    help: &'static str,
    arg_schema: &'static str,
    parse: ParseFn,
}

pub(crate) struct CommandRegistry {
    specs: Vec<CommandSpec>,
    lookup_by_lower_name: HashMap<String, usize>,
}

impl CommandRegistry {
    fn new() -> Self {
        Self {
            specs: Vec::new(),
            lookup_by_lower_name: HashMap::new(),
        }
    }

    pub(crate) fn with_office_commands() -> Self {
        let mut registry = Self::new();
        let builtins: [(&'static str, &'static str, &'static str, ParseFn); 19] = [
            ("help", "List commands", "", parse_help),
            ("clear", "Clear console output", "", parse_clear),
            ("agents", "List placed agents", "", parse_agents),
            (
                "new",
                "Create an agent and start placing it",
                "<name> [title] [avatar:adam|ash|lucy|nancy]",
                parse_new,
            ),
            ("cancel", "Cancel placement", "", parse_cancel),
            ("select", "Select an agent", "<id|name>", parse_select),
            ("deselect", "Clear the selection", "", parse_deselect),
            ("panel", "Toggle the agent detail panel", "", parse_panel),
            ("rename", "Rename the selected agent", "<name...>", parse_rename),
            ("retitle", "Change the selected agent's title", "<title...>", parse_retitle),
            (
                "avatar",
                "Change the selected agent's avatar",
                "<adam|ash|lucy|nancy>",
                parse_avatar,
            ),
            (
                "status",
                "Set the selected agent's status",
                "<idle|thinking|busy>",
                parse_status,
            ),
            ("learn", "Add a knowledge topic", "<topic...>", parse_learn),
            ("forget", "Remove a knowledge topic", "<topic...>", parse_forget),
            ("say", "Chat with the selected agent", "<text...>", parse_say),
            ("move", "Move the selected agent", "<x> <y>", parse_move),
            ("remove", "Remove an agent", "[id|name]", parse_remove),
            ("save", "Write the session file", "", parse_save),
            ("load", "Reload the session file", "", parse_load),
        ];
        for (name, help, arg_schema, parse) in builtins {
            registry.register(name, help, arg_schema, parse);
        }
        registry
    }

    fn register(
        &mut self,
        name: &'static str,
        help: &'static str,
        arg_schema: &'static str,
        parse: ParseFn,
    ) {
        let lower = name.to_ascii_lowercase();
        debug_assert!(
            !self.lookup_by_lower_name.contains_key(&lower),
            "duplicate command registration: {name}"
        );
        self.specs.push(CommandSpec {
            name,
            help,
            arg_schema,
            parse,
        });
        self.lookup_by_lower_name
            .insert(lower, self.specs.len() - 1);
    }

    fn lookup(&self, input_name: &str) -> Option<&CommandSpec> {
        let index = self
            .lookup_by_lower_name
            .get(&input_name.to_ascii_lowercase())?;
        self.specs.get(*index)
    }

    /// Registration order.
    pub(crate) fn help_lines(&self) -> Vec<String> {
        self.specs
            .iter()
            .map(|spec| {
                if spec.arg_schema.is_empty() {
                    format!("{} - {}", spec.name, spec.help)
                } else {
                    format!("{} {} - {}", spec.name, spec.arg_schema, spec.help)
                }
            })
            .collect()
    }

    /// `Ok(None)` for a blank line. Errors carry no `error:` prefix; the
    /// console adds it.
    pub(crate) fn parse_line(&self, raw_line: &str) -> Result<Option<OfficeCommand>, String> {
        let tokens = tokenize_line(raw_line.trim())
            .map_err(|reason| format!("{reason}. usage: help"))?;
        let Some((command_name, args)) = tokens.split_first() else {
            return Ok(None);
        };
        let Some(spec) = self.lookup(command_name) else {
            return Err(format!("unknown command '{command_name}'. try: help"));
        };
        (spec.parse)(args)
            .map(Some)
            .map_err(|error| format!("{}. usage: {}", error.reason, error.usage))
    }
}

fn tokenize_line(line: &str) -> Result<Vec<String>, String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut has_token = false;

    for ch in line.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                has_token = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if has_token {
                    tokens.push(std::mem::take(&mut current));
                    has_token = false;
                }
            }
            _ => {
                current.push(ch);
                has_token = true;
            }
        }
    }

    if in_quotes {
        return Err("unterminated quoted string".to_string());
    }
    if has_token {
        tokens.push(current);
    }
    Ok(tokens)
}

fn require_no_args(args: &[String], usage: &str) -> Result<(), CommandParseError> {
    if args.is_empty() {
        Ok(())
    } else {
        Err(CommandParseError::new("this command takes no arguments", usage))
    }
}

fn require_text(args: &[String], what: &str, usage: &str) -> Result<String, CommandParseError> {
    let text = args.join(" ").trim().to_string();
    if text.is_empty() {
        return Err(CommandParseError::new(
            format!("missing required argument <{what}>"),
            usage,
        ));
    }
    Ok(text)
}

fn parse_avatar_arg(raw: &str, usage: &str) -> Result<Avatar, CommandParseError> {
    Avatar::parse(raw).ok_or_else(|| {
        CommandParseError::new(
            format!("unknown avatar '{raw}' (expected adam|ash|lucy|nancy)"),
            usage,
        )
    })
}

fn parse_help(args: &[String]) -> Result<OfficeCommand, CommandParseError> {
    require_no_args(args, "help")?;
    Ok(OfficeCommand::Help)
}

fn parse_clear(args: &[String]) -> Result<OfficeCommand, CommandParseError> {
    require_no_args(args, "clear")?;
    Ok(OfficeCommand::Clear)
}

fn parse_agents(args: &[String]) -> Result<OfficeCommand, CommandParseError> {
    require_no_args(args, "agents")?;
    Ok(OfficeCommand::ListAgents)
}

fn parse_new(args: &[String]) -> Result<OfficeCommand, CommandParseError> {
    const USAGE: &str = "new <name> [title] [avatar]";
    let (name, rest) = args.split_first().ok_or_else(|| {
        CommandParseError::new("missing required argument <name>", USAGE)
    })?;
    if rest.len() > 2 {
        return Err(CommandParseError::new(
            "too many arguments; quote names and titles with spaces",
            USAGE,
        ));
    }
    let title = rest.first().cloned().unwrap_or_default();
    let avatar = match rest.get(1) {
        Some(raw) => parse_avatar_arg(raw, USAGE)?,
        None => Avatar::Adam,
    };
    Ok(OfficeCommand::New {
        name: name.clone(),
        title,
        avatar,
    })
}

fn parse_cancel(args: &[String]) -> Result<OfficeCommand, CommandParseError> {
    require_no_args(args, "cancel")?;
    Ok(OfficeCommand::Cancel)
}

fn parse_select(args: &[String]) -> Result<OfficeCommand, CommandParseError> {
    let target = require_text(args, "id|name", "select <id|name>")?;
    Ok(OfficeCommand::Select { target })
}

fn parse_deselect(args: &[String]) -> Result<OfficeCommand, CommandParseError> {
    require_no_args(args, "deselect")?;
    Ok(OfficeCommand::Deselect)
}

fn parse_panel(args: &[String]) -> Result<OfficeCommand, CommandParseError> {
    require_no_args(args, "panel")?;
    Ok(OfficeCommand::TogglePanel)
}

fn parse_rename(args: &[String]) -> Result<OfficeCommand, CommandParseError> {
    let name = require_text(args, "name...", "rename <name...>")?;
    Ok(OfficeCommand::Rename { name })
}

fn parse_retitle(args: &[String]) -> Result<OfficeCommand, CommandParseError> {
    let title = require_text(args, "title...", "retitle <title...>")?;
    Ok(OfficeCommand::Retitle { title })
}

fn parse_avatar(args: &[String]) -> Result<OfficeCommand, CommandParseError> {
    const USAGE: &str = "avatar <adam|ash|lucy|nancy>";
    match args {
        [raw] => Ok(OfficeCommand::SetAvatar {
            avatar: parse_avatar_arg(raw, USAGE)?,
        }),
        _ => Err(CommandParseError::new(
            "expected exactly one argument <avatar>",
            USAGE,
        )),
    }
}

fn parse_status(args: &[String]) -> Result<OfficeCommand, CommandParseError> {
    const USAGE: &str = "status <idle|thinking|busy>";
    match args {
        [raw] => AgentStatus::parse(raw)
            .map(|status| OfficeCommand::SetStatus { status })
            .ok_or_else(|| {
                CommandParseError::new(
                    format!("unknown status '{raw}' (expected idle|thinking|busy)"),
                    USAGE,
                )
            }),
        _ => Err(CommandParseError::new(
            "expected exactly one argument <status>",
            USAGE,
        )),
    }
}

fn parse_learn(args: &[String]) -> Result<OfficeCommand, CommandParseError> {
    let topic = require_text(args, "topic...", "learn <topic...>")?;
    Ok(OfficeCommand::Learn { topic })
}

fn parse_forget(args: &[String]) -> Result<OfficeCommand, CommandParseError> {
    let topic = require_text(args, "topic...", "forget <topic...>")?;
    Ok(OfficeCommand::Forget { topic })
}

fn parse_say(args: &[String]) -> Result<OfficeCommand, CommandParseError> {
    let text = require_text(args, "text...", "say <text...>")?;
    Ok(OfficeCommand::Say { text })
}

fn parse_move(args: &[String]) -> Result<OfficeCommand, CommandParseError> {
    const USAGE: &str = "move <x> <y>";
    let [x, y] = args else {
        return Err(CommandParseError::new(
            "expected exactly two arguments <x> <y>",
            USAGE,
        ));
    };
    let coordinate = |raw: &String| {
        raw.parse::<f32>()
            .ok()
            .filter(|value| value.is_finite())
            .ok_or_else(|| CommandParseError::new(format!("invalid coordinate '{raw}'"), USAGE))
    };
    Ok(OfficeCommand::Move {
        x: coordinate(x)?,
        y: coordinate(y)?,
    })
}

fn parse_remove(args: &[String]) -> Result<OfficeCommand, CommandParseError> {
    let target = (!args.is_empty()).then(|| args.join(" "));
    Ok(OfficeCommand::Remove { target })
}

fn parse_save(args: &[String]) -> Result<OfficeCommand, CommandParseError> {
    require_no_args(args, "save")?;
    Ok(OfficeCommand::Save)
}

fn parse_load(args: &[String]) -> Result<OfficeCommand, CommandParseError> {
    require_no_args(args, "load")?;
    Ok(OfficeCommand::Load)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Result<Option<OfficeCommand>, String> {
        CommandRegistry::with_office_commands().parse_line(line)
    }

    #[test]
    fn tokenizer_keeps_quoted_spans_and_empty_quotes() {
        assert_eq!(
            tokenize_line(r#"new "Ada Lovelace" "" lucy"#).expect("tokens"),
            vec!["new", "Ada Lovelace", "", "lucy"]
        );
        assert!(tokenize_line(r#"say "oops"#).is_err());
    }

    #[test]
    fn new_parses_optional_title_and_avatar() {
        assert_eq!(
            parse(r#"new "Ada Lovelace" "Chief Analyst" lucy"#).expect("parse"),
            Some(OfficeCommand::New {
                name: "Ada Lovelace".to_string(),
                title: "Chief Analyst".to_string(),
                avatar: Avatar::Lucy,
            })
        );
        assert_eq!(
            parse("new Bob").expect("parse"),
            Some(OfficeCommand::New {
                name: "Bob".to_string(),
                title: String::new(),
                avatar: Avatar::Adam,
            })
        );
    }

    #[test]
    fn command_lookup_is_case_insensitive() {
        assert_eq!(parse("HELP").expect("parse"), Some(OfficeCommand::Help));
    }

    #[test]
    fn blank_line_is_nothing() {
        assert_eq!(parse("   ").expect("parse"), None);
    }

    #[test]
    fn unknown_command_suggests_help() {
        assert_eq!(
            parse("teleport").expect_err("unknown"),
            "unknown command 'teleport'. try: help"
        );
    }

    #[test]
    fn bad_arguments_print_usage() {
        assert_eq!(
            parse("status sleepy").expect_err("bad status"),
            "unknown status 'sleepy' (expected idle|thinking|busy). usage: status <idle|thinking|busy>"
        );
        assert_eq!(
            parse("say").expect_err("missing text"),
            "missing required argument <text...>. usage: say <text...>"
        );
        assert_eq!(
            parse("clear now").expect_err("extra args"),
            "this command takes no arguments. usage: clear"
        );
    }

    #[test]
    fn free_text_arguments_are_joined() {
        assert_eq!(
            parse("learn quarterly planning").expect("parse"),
            Some(OfficeCommand::Learn {
                topic: "quarterly planning".to_string()
            })
        );
        assert_eq!(
            parse("remove").expect("parse"),
            Some(OfficeCommand::Remove { target: None })
        );
    }

    #[test]
    fn move_takes_two_finite_coordinates() {
        assert_eq!(
            parse("move 320 480.5").expect("parse"),
            Some(OfficeCommand::Move { x: 320.0, y: 480.5 })
        );
        assert_eq!(
            parse("move 1 nan").expect_err("nan"),
            "invalid coordinate 'nan'. usage: move <x> <y>"
        );
        assert!(parse("move 1").is_err());
    }

    #[test]
    fn help_lists_in_registration_order() {
        let lines = CommandRegistry::with_office_commands().help_lines();
        assert_eq!(lines[0], "help - List commands");
        assert!(lines
            .iter()
            .any(|line| line == "say <text...> - Chat with the selected agent"));
    }
}
