//! Shell command parsing.

use std::str::FromStr;

use oceannav_core::{
    OptionsPatch, OutputFormat, PermalinkFlags, ScriptLanguage, StatePatch, SubsetArea, VariableId,
};
use serde::Deserialize;
use serde_json::Value;

use crate::error::{AppError, Result};

pub const HELP: &str = "\
commands:
  set <key> <value> [<key> <value> ...]   batched update; `undefined` skips a key
  patch <json>                            apply a state patch
  dataset <id>                            switch the primary dataset
  swap                                    exchange the two panels
  action <name> [json]                    dispatch a named action
  options <json> | options revert         update or revert options
  link [all|none|key,key,...]             print a shareable link
  open <url>                              restore state from a link
  close                                   close the modal window
  back | forward                          step through modal history
  subset <json>                           print subset and script URLs
  state                                   print the current state
  help                                    show this text
  quit                                    save preferences and exit";

/// Arguments of the `subset` command.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SubsetArgs {
    pub area: SubsetArea,
    pub variables: Vec<VariableId>,
    #[serde(default)]
    pub output_format: OutputFormat,
    #[serde(default)]
    pub time_range: bool,
    #[serde(default)]
    pub zip: bool,
    #[serde(default = "default_script_language")]
    pub lang: ScriptLanguage,
}

fn default_script_language() -> ScriptLanguage {
    ScriptLanguage::Python
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Set(Vec<(String, Option<Value>)>),
    Patch(StatePatch),
    Dataset(String),
    Swap,
    Action { name: String, arg: Option<Value> },
    Options(OptionsPatch),
    RevertOptions,
    Link(PermalinkFlags),
    Open(String),
    Close,
    Back,
    Forward,
    Subset(SubsetArgs),
    State,
    Help,
    Quit,
}

/// A `set` value: JSON when it parses, otherwise a bare string.
fn parse_value(token: &str) -> Option<Value> {
    if token == "undefined" {
        return None;
    }
    Some(serde_json::from_str(token).unwrap_or_else(|_| Value::String(token.to_string())))
}

fn no_args(rest: &str, cmd: Command, usage: &'static str) -> Result<Command> {
    if rest.is_empty() {
        Ok(cmd)
    } else {
        Err(AppError::Usage(usage))
    }
}

impl FromStr for Command {
    type Err = AppError;

    fn from_str(line: &str) -> Result<Self> {
        let line = line.trim();
        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line, ""),
        };
        match verb {
            "" => Err(AppError::EmptyCommand),
            "set" => {
                let tokens: Vec<&str> = rest.split_whitespace().collect();
                if tokens.is_empty() || tokens.len() % 2 != 0 {
                    return Err(AppError::Usage("set <key> <value> [<key> <value> ...]"));
                }
                Ok(Command::Set(
                    tokens
                        .chunks(2)
                        .map(|pair| (pair[0].to_string(), parse_value(pair[1])))
                        .collect(),
                ))
            }
            "patch" => {
                if rest.is_empty() {
                    return Err(AppError::Usage("patch <json>"));
                }
                Ok(Command::Patch(StatePatch::from_json_str(rest)?))
            }
            "dataset" => {
                if rest.is_empty() || rest.contains(char::is_whitespace) {
                    return Err(AppError::Usage("dataset <id>"));
                }
                Ok(Command::Dataset(rest.to_string()))
            }
            "swap" => no_args(rest, Command::Swap, "swap"),
            "action" => {
                let (name, arg) = match rest.split_once(char::is_whitespace) {
                    Some((name, arg)) => (name, Some(serde_json::from_str(arg.trim())?)),
                    None => (rest, None),
                };
                if name.is_empty() {
                    return Err(AppError::Usage("action <name> [json]"));
                }
                Ok(Command::Action {
                    name: name.to_string(),
                    arg,
                })
            }
            "options" => match rest {
                "" => Err(AppError::Usage("options <json> | options revert")),
                "revert" => Ok(Command::RevertOptions),
                json => Ok(Command::Options(serde_json::from_str(json)?)),
            },
            "link" => Ok(Command::Link(if rest.is_empty() {
                PermalinkFlags::all()
            } else {
                rest.parse()?
            })),
            "open" => {
                if rest.is_empty() {
                    return Err(AppError::Usage("open <url>"));
                }
                Ok(Command::Open(rest.to_string()))
            }
            "close" => no_args(rest, Command::Close, "close"),
            "back" => no_args(rest, Command::Back, "back"),
            "forward" => no_args(rest, Command::Forward, "forward"),
            "subset" => {
                if rest.is_empty() {
                    return Err(AppError::Usage("subset <json>"));
                }
                Ok(Command::Subset(serde_json::from_str(rest)?))
            }
            "state" => no_args(rest, Command::State, "state"),
            "help" | "?" => Ok(Command::Help),
            "quit" | "exit" => Ok(Command::Quit),
            other => Err(AppError::UnknownCommand(other.to_string())),
        }
    }
}
