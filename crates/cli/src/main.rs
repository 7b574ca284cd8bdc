#![forbid(unsafe_code)]

mod args;
mod json;

#[cfg(test)]
mod tests;

use args::{Command, Invocation};
use rt_core::ids::NodeId;
use rt_core::{LogQuery, PageRequest};
use rt_storage::{SqliteStore, StoreConfig, StoreError};
use serde_json::Value;
use std::io::Read as _;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
struct NotFound(String);

impl std::fmt::Display for NotFound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "not found: {}", self.0)
    }
}

impl std::error::Error for NotFound {}

fn usage() -> &'static str {
    "reportree: hierarchical report store\n\n\
USAGE:\n\
  reportree [GLOBAL FLAGS] <COMMAND> [ARGS]\n\
\n\
COMMANDS:\n\
  put <ROOT> [--input FILE] [--overwrite]      Append a JSON forest (stdin by default)\n\
  get <ROOT> [VIEW FLAGS]                      Print the tree with aggregated severities\n\
  subtree <NODE_ID> [VIEW FLAGS]               Print the subtree headed by a node\n\
  logs <ROOT> [FILTER FLAGS] [--page N] [--page-size N]\n\
  delete <ROOT>                                Remove a whole tree\n\
  delete-node <NODE_ID>                        Remove a node and its descendants\n\
  delete-sections <NAME> --root ROOT [--root ROOT ...]\n\
  roots [--limit N] [--offset N]\n\
\n\
VIEW FLAGS:\n\
  --structure-only      Containers only\n\
  --severity LIST       Comma separated, e.g. error,fatal\n\
  --message TEXT        Leaf message filter\n\
  --match MODE          substring (default) or exact\n\
\n\
GLOBAL FLAGS:\n\
  --storage-dir DIR         Default .reportree (REPORTREE_STORAGE_DIR)\n\
  --log-level FILTER        Default warn (REPORTREE_LOG)\n\
  --max-message-len N       Default 4096 (REPORTREE_MAX_MESSAGE_LEN)\n\
  -h, --help                Print this help and exit\n\
  -V, --version             Print version and exit\n"
}

fn version_line() -> String {
    format!("reportree {}", env!("CARGO_PKG_VERSION"))
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let Invocation { settings, command } =
        args::parse_invocation(std::env::args().skip(1), |key| std::env::var(key).ok())?;
    match command {
        Command::Help => {
            print!("{}", usage());
            return Ok(());
        }
        Command::Version => {
            println!("{}", version_line());
            return Ok(());
        }
        _ => {}
    }

    init_logging(&settings.log_level);
    let config = StoreConfig {
        max_message_len: settings.max_message_len,
        ..StoreConfig::default()
    };
    let mut store = SqliteStore::open_with(&settings.storage_dir, config)?;
    let out = run(&mut store, command)?;
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

fn run(store: &mut SqliteStore, command: Command) -> Result<Value, Box<dyn std::error::Error>> {
    let out = match command {
        Command::Help | Command::Version => Value::Null,
        Command::Put {
            root,
            input,
            overwrite,
        } => {
            let raw = match input {
                Some(path) => std::fs::read_to_string(path)?,
                None => {
                    let mut raw = String::new();
                    std::io::stdin().read_to_string(&mut raw)?;
                    raw
                }
            };
            let forest = json::parse_forest(&raw)?;
            debug!(root = %root, trees = forest.len(), overwrite, "put");
            let receipt = store.create_or_append_tree(&root, &forest, overwrite)?;
            json::receipt_json(&root, &receipt)
        }
        Command::Get { root, query } => match store.get_tree(&root, &query)? {
            Some(tree) => json::tree_json(&tree),
            None => return Err(NotFound(format!("root {root}")).into()),
        },
        Command::Subtree { id, query } => match store.get_subtree(NodeId::new(id), &query)? {
            Some(tree) => json::tree_json(&tree),
            None => return Err(NotFound(format!("node {id}")).into()),
        },
        Command::Logs {
            root,
            filter,
            page,
            page_size,
        } => {
            let query = LogQuery {
                filter,
                page: PageRequest::new(page, page_size)?,
            };
            match store.list_logs(&root, &query) {
                Ok(page) => json::log_page_json(&root, &page),
                Err(StoreError::UnknownId) => return Err(NotFound(format!("root {root}")).into()),
                Err(err) => return Err(err.into()),
            }
        }
        Command::Delete { root } => match store.delete_tree(&root) {
            Ok(removed) => json::removed_json(removed),
            Err(StoreError::UnknownId) => return Err(NotFound(format!("root {root}")).into()),
            Err(err) => return Err(err.into()),
        },
        Command::DeleteNode { id } => json::removed_json(store.delete_subtree(NodeId::new(id))?),
        Command::DeleteSections { name, roots } => {
            json::removed_json(store.delete_subtrees_by_name(&roots, &name)?)
        }
        Command::Roots { limit, offset } => json::roots_json(&store.list_roots(limit, offset)?),
    };
    Ok(out)
}
