#![forbid(unsafe_code)]

use rt_core::{DEFAULT_MAX_MESSAGE_LEN, LeafFilter, MessageMatch, SeveritySet, TreeQuery};
use std::path::PathBuf;

pub(crate) const DEFAULT_STORAGE_DIR: &str = ".reportree";
pub(crate) const DEFAULT_LOG_LEVEL: &str = "warn";
pub(crate) const DEFAULT_PAGE_SIZE: u32 = 50;
pub(crate) const DEFAULT_ROOTS_LIMIT: usize = 100;

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Settings {
    pub(crate) storage_dir: PathBuf,
    pub(crate) log_level: String,
    pub(crate) max_message_len: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Command {
    Help,
    Version,
    Put {
        root: String,
        input: Option<PathBuf>,
        overwrite: bool,
    },
    Get {
        root: String,
        query: TreeQuery,
    },
    Subtree {
        id: i64,
        query: TreeQuery,
    },
    Logs {
        root: String,
        filter: LeafFilter,
        page: u64,
        page_size: u32,
    },
    Delete {
        root: String,
    },
    DeleteNode {
        id: i64,
    },
    DeleteSections {
        name: String,
        roots: Vec<String>,
    },
    Roots {
        limit: usize,
        offset: usize,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Invocation {
    pub(crate) settings: Settings,
    pub(crate) command: Command,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum ArgError {
    MissingCommand,
    UnknownCommand(String),
    UnknownFlag(String),
    MissingValue(String),
    MissingArgument(&'static str),
    UnexpectedArgument(String),
    InvalidValue { flag: &'static str, value: String },
}

impl std::fmt::Display for ArgError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingCommand => write!(f, "missing command (see --help)"),
            Self::UnknownCommand(name) => write!(f, "unknown command: {name}"),
            Self::UnknownFlag(flag) => write!(f, "unknown flag: {flag}"),
            Self::MissingValue(flag) => write!(f, "{flag} requires a value"),
            Self::MissingArgument(name) => write!(f, "missing argument: {name}"),
            Self::UnexpectedArgument(value) => write!(f, "unexpected argument: {value}"),
            Self::InvalidValue { flag, value } => write!(f, "invalid value for {flag}: {value}"),
        }
    }
}

impl std::error::Error for ArgError {}

#[derive(Default)]
struct Flags {
    storage_dir: Option<String>,
    log_level: Option<String>,
    max_message_len: Option<String>,
    input: Option<String>,
    overwrite: bool,
    structure_only: bool,
    severity: Option<String>,
    message: Option<String>,
    match_mode: Option<String>,
    page: Option<String>,
    page_size: Option<String>,
    roots: Vec<String>,
    limit: Option<String>,
    offset: Option<String>,
}

/// Parses process arguments (without the program name). `env` supplies fallbacks for the
/// global settings.
pub(crate) fn parse_invocation<I, E>(args: I, env: E) -> Result<Invocation, ArgError>
where
    I: IntoIterator<Item = String>,
    E: Fn(&str) -> Option<String>,
{
    let mut args = args.into_iter();
    let mut flags = Flags::default();
    let mut positional: Vec<String> = Vec::new();

    while let Some(arg) = args.next() {
        let slot = match arg.as_str() {
            "-h" | "--help" => {
                return Ok(Invocation {
                    settings: settings_from(&flags, &env)?,
                    command: Command::Help,
                });
            }
            "-V" | "--version" => {
                return Ok(Invocation {
                    settings: settings_from(&flags, &env)?,
                    command: Command::Version,
                });
            }
            "--overwrite" => {
                flags.overwrite = true;
                continue;
            }
            "--structure-only" => {
                flags.structure_only = true;
                continue;
            }
            "--root" => {
                let value = args
                    .next()
                    .ok_or_else(|| ArgError::MissingValue(arg.clone()))?;
                flags.roots.push(value);
                continue;
            }
            "--storage-dir" => &mut flags.storage_dir,
            "--log-level" => &mut flags.log_level,
            "--max-message-len" => &mut flags.max_message_len,
            "--input" => &mut flags.input,
            "--severity" => &mut flags.severity,
            "--message" => &mut flags.message,
            "--match" => &mut flags.match_mode,
            "--page" => &mut flags.page,
            "--page-size" => &mut flags.page_size,
            "--limit" => &mut flags.limit,
            "--offset" => &mut flags.offset,
            other if other.starts_with("--") => {
                return Err(ArgError::UnknownFlag(other.to_string()));
            }
            _ => {
                positional.push(arg);
                continue;
            }
        };
        let Some(value) = args.next() else {
            return Err(ArgError::MissingValue(arg));
        };
        *slot = Some(value);
    }

    let settings = settings_from(&flags, &env)?;
    let mut positional = positional.into_iter();
    let name = positional.next().ok_or(ArgError::MissingCommand)?;
    let command = match name.as_str() {
        "put" => Command::Put {
            root: required(&mut positional, "root key")?,
            input: flags.input.take().map(PathBuf::from),
            overwrite: flags.overwrite,
        },
        "get" => Command::Get {
            root: required(&mut positional, "root key")?,
            query: tree_query(&flags)?,
        },
        "subtree" => Command::Subtree {
            id: parse_number("node id", &required(&mut positional, "node id")?)?,
            query: tree_query(&flags)?,
        },
        "logs" => Command::Logs {
            root: required(&mut positional, "root key")?,
            filter: leaf_filter(&flags)?,
            page: parse_opt("--page", flags.page.as_deref())?.unwrap_or(0),
            page_size: parse_opt("--page-size", flags.page_size.as_deref())?
                .unwrap_or(DEFAULT_PAGE_SIZE),
        },
        "delete" => Command::Delete {
            root: required(&mut positional, "root key")?,
        },
        "delete-node" => Command::DeleteNode {
            id: parse_number("node id", &required(&mut positional, "node id")?)?,
        },
        "delete-sections" => {
            let name = required(&mut positional, "section name")?;
            if flags.roots.is_empty() {
                return Err(ArgError::MissingValue("--root".to_string()));
            }
            Command::DeleteSections {
                name,
                roots: std::mem::take(&mut flags.roots),
            }
        }
        "roots" => Command::Roots {
            limit: parse_opt("--limit", flags.limit.as_deref())?.unwrap_or(DEFAULT_ROOTS_LIMIT),
            offset: parse_opt("--offset", flags.offset.as_deref())?.unwrap_or(0),
        },
        other => return Err(ArgError::UnknownCommand(other.to_string())),
    };
    if let Some(extra) = positional.next() {
        return Err(ArgError::UnexpectedArgument(extra));
    }

    Ok(Invocation { settings, command })
}

fn settings_from<E>(flags: &Flags, env: &E) -> Result<Settings, ArgError>
where
    E: Fn(&str) -> Option<String>,
{
    let storage_dir = flags
        .storage_dir
        .clone()
        .or_else(|| env("REPORTREE_STORAGE_DIR"))
        .filter(|dir| !dir.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_STORAGE_DIR.to_string());
    let log_level = flags
        .log_level
        .clone()
        .or_else(|| env("REPORTREE_LOG"))
        .filter(|level| !level.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());
    let max_message_len = match flags.max_message_len.as_deref() {
        Some(raw) => parse_number("--max-message-len", raw)?,
        None => match env("REPORTREE_MAX_MESSAGE_LEN") {
            Some(raw) => parse_number("REPORTREE_MAX_MESSAGE_LEN", &raw)?,
            None => DEFAULT_MAX_MESSAGE_LEN,
        },
    };
    if max_message_len == 0 {
        return Err(ArgError::InvalidValue {
            flag: "--max-message-len",
            value: "0".to_string(),
        });
    }
    Ok(Settings {
        storage_dir: PathBuf::from(storage_dir),
        log_level,
        max_message_len,
    })
}

fn tree_query(flags: &Flags) -> Result<TreeQuery, ArgError> {
    Ok(TreeQuery {
        include_leaf_detail: !flags.structure_only,
        filter: leaf_filter(flags)?,
    })
}

fn leaf_filter(flags: &Flags) -> Result<LeafFilter, ArgError> {
    let severities = match flags.severity.as_deref() {
        None => SeveritySet::empty(),
        Some(raw) => SeveritySet::parse_list(raw)
            .map_err(|value| ArgError::InvalidValue {
                flag: "--severity",
                value,
            })?,
    };
    let message_match = match flags.match_mode.as_deref() {
        None => MessageMatch::default(),
        Some(raw) => MessageMatch::parse(raw).ok_or_else(|| ArgError::InvalidValue {
            flag: "--match",
            value: raw.to_string(),
        })?,
    };
    Ok(LeafFilter {
        severities,
        message: flags.message.clone().filter(|m| !m.is_empty()),
        message_match,
    })
}

fn required(
    positional: &mut impl Iterator<Item = String>,
    name: &'static str,
) -> Result<String, ArgError> {
    positional.next().ok_or(ArgError::MissingArgument(name))
}

fn parse_number<T: std::str::FromStr>(flag: &'static str, raw: &str) -> Result<T, ArgError> {
    raw.trim().parse().map_err(|_| ArgError::InvalidValue {
        flag,
        value: raw.to_string(),
    })
}

fn parse_opt<T: std::str::FromStr>(
    flag: &'static str,
    raw: Option<&str>,
) -> Result<Option<T>, ArgError> {
    raw.map(|raw| parse_number(flag, raw)).transpose()
}
