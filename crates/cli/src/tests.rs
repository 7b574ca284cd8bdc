use super::*;
use crate::args::{ArgError, DEFAULT_PAGE_SIZE, Settings, parse_invocation};
use crate::json::{InputError, parse_forest};
use rt_core::{LeafFilter, MalformedTree, MessageMatch, ReportTree, Severity, SeveritySet, TreeQuery};
use std::path::PathBuf;

fn argv(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| item.to_string()).collect()
}

fn no_env(_: &str) -> Option<String> {
    None
}

fn parse(items: &[&str]) -> Result<Invocation, ArgError> {
    parse_invocation(argv(items), no_env)
}

#[test]
fn settings_fall_back_to_env_then_defaults() {
    let defaults = parse(&["roots"]).expect("parse");
    assert_eq!(
        defaults.settings,
        Settings {
            storage_dir: PathBuf::from(".reportree"),
            log_level: "warn".to_string(),
            max_message_len: 4096,
        }
    );

    let env = |key: &str| match key {
        "REPORTREE_STORAGE_DIR" => Some("/var/lib/reports".to_string()),
        "REPORTREE_LOG" => Some("debug".to_string()),
        "REPORTREE_MAX_MESSAGE_LEN" => Some("128".to_string()),
        _ => None,
    };
    let from_env = parse_invocation(argv(&["roots"]), env).expect("parse");
    assert_eq!(from_env.settings.storage_dir, PathBuf::from("/var/lib/reports"));
    assert_eq!(from_env.settings.log_level, "debug");
    assert_eq!(from_env.settings.max_message_len, 128);

    let flags_win = parse_invocation(
        argv(&["--storage-dir", "/tmp/x", "roots", "--max-message-len", "64"]),
        env,
    )
    .expect("parse");
    assert_eq!(flags_win.settings.storage_dir, PathBuf::from("/tmp/x"));
    assert_eq!(flags_win.settings.log_level, "debug");
    assert_eq!(flags_win.settings.max_message_len, 64);
}

#[test]
fn view_flags_build_tree_queries() {
    let invocation = parse(&[
        "get",
        "build/42",
        "--structure-only",
        "--severity",
        "error, FATAL",
        "--message",
        "timeout",
        "--match",
        "exact",
    ])
    .expect("parse");
    assert_eq!(
        invocation.command,
        Command::Get {
            root: "build/42".to_string(),
            query: TreeQuery {
                include_leaf_detail: false,
                filter: LeafFilter {
                    severities: [Severity::Error, Severity::Fatal].into_iter().collect(),
                    message: Some("timeout".to_string()),
                    message_match: MessageMatch::Exact,
                },
            },
        }
    );

    let subtree = parse(&["subtree", "17"]).expect("parse");
    assert_eq!(
        subtree.command,
        Command::Subtree {
            id: 17,
            query: TreeQuery::default(),
        }
    );
}

#[test]
fn logs_and_delete_commands_parse() {
    let logs = parse(&["logs", "job/7", "--severity", "warn", "--page", "3"]).expect("parse");
    assert_eq!(
        logs.command,
        Command::Logs {
            root: "job/7".to_string(),
            filter: LeafFilter {
                severities: SeveritySet::single(Severity::Warn),
                ..LeafFilter::default()
            },
            page: 3,
            page_size: DEFAULT_PAGE_SIZE,
        }
    );

    let sections = parse(&[
        "delete-sections",
        "cleanup",
        "--root",
        "r1",
        "--root",
        "r2",
    ])
    .expect("parse");
    assert_eq!(
        sections.command,
        Command::DeleteSections {
            name: "cleanup".to_string(),
            roots: vec!["r1".to_string(), "r2".to_string()],
        }
    );

    let put = parse(&["put", "r1", "--overwrite", "--input", "forest.json"]).expect("parse");
    assert_eq!(
        put.command,
        Command::Put {
            root: "r1".to_string(),
            input: Some(PathBuf::from("forest.json")),
            overwrite: true,
        }
    );
}

#[test]
fn bad_arguments_are_reported() {
    assert_eq!(parse(&[]).expect_err("no command"), ArgError::MissingCommand);
    assert_eq!(
        parse(&["frobnicate"]).expect_err("unknown"),
        ArgError::UnknownCommand("frobnicate".to_string())
    );
    assert_eq!(
        parse(&["get", "r1", "--colour"]).expect_err("flag"),
        ArgError::UnknownFlag("--colour".to_string())
    );
    assert_eq!(
        parse(&["get", "r1", "--severity"]).expect_err("value"),
        ArgError::MissingValue("--severity".to_string())
    );
    assert_eq!(
        parse(&["get"]).expect_err("root"),
        ArgError::MissingArgument("root key")
    );
    assert_eq!(
        parse(&["get", "r1", "r2"]).expect_err("extra"),
        ArgError::UnexpectedArgument("r2".to_string())
    );
    assert!(matches!(
        parse(&["get", "r1", "--severity", "loud"]),
        Err(ArgError::InvalidValue { flag: "--severity", .. })
    ));
    assert!(matches!(
        parse(&["delete-node", "abc"]),
        Err(ArgError::InvalidValue { flag: "node id", .. })
    ));
    assert!(matches!(
        parse(&["delete-sections", "cleanup"]),
        Err(ArgError::MissingValue(_))
    ));
    assert!(matches!(
        parse(&["--max-message-len", "0", "roots"]),
        Err(ArgError::InvalidValue { .. })
    ));
    assert_eq!(parse(&["get", "--help"]).expect("help").command, Command::Help);
}

#[test]
fn nested_and_flat_payloads_build_the_same_forest() {
    let nested = parse_forest(
        r#"[
            {"message": "compile", "children": [
                {"message": "a.rs ok", "severity": "info"},
                {"message": "b.rs failed", "severity": "ERROR"}
            ]},
            {"message": "done", "severity": "Info"}
        ]"#,
    )
    .expect("nested");
    let flat = parse_forest(
        r#"{"entries": [
            {"key": "c", "message": "compile"},
            {"key": "a", "parent": "c", "message": "a.rs ok", "severity": "info"},
            {"key": "d", "message": "done", "severity": "info"},
            {"key": "b", "parent": "c", "message": "b.rs failed", "severity": "error"}
        ]}"#,
    )
    .expect("flat");

    let expected = vec![
        ReportTree::section(
            "compile",
            vec![
                ReportTree::leaf("a.rs ok", Severity::Info),
                ReportTree::leaf("b.rs failed", Severity::Error),
            ],
        ),
        ReportTree::leaf("done", Severity::Info),
    ];
    assert_eq!(nested, expected);
    assert_eq!(flat, expected);
}

#[test]
fn bad_payloads_are_rejected() {
    assert!(matches!(
        parse_forest(r#"[{"message": "x", "severity": "loud"}]"#),
        Err(InputError::UnknownSeverity(value)) if value == "loud"
    ));
    assert!(matches!(
        parse_forest(r#"{"entries": [{"key": "a", "parent": "zz", "message": "x"}]}"#),
        Err(InputError::Malformed(MalformedTree::UnknownParent { .. }))
    ));
    assert!(matches!(
        parse_forest(r#"{"nodes": []}"#),
        Err(InputError::Json(_))
    ));
}

#[test]
fn commands_run_against_a_store() {
    let dir = tempfile::TempDir::new().expect("temp dir");
    let input = dir.path().join("forest.json");
    std::fs::write(
        &input,
        r#"[{"message": "compile", "children": [
              {"message": "a.rs ok", "severity": "info"},
              {"message": "b.rs failed", "severity": "error"}
           ]}]"#,
    )
    .expect("write input");
    let mut store = SqliteStore::open(dir.path().join("store")).expect("open store");

    let put = run(
        &mut store,
        Command::Put {
            root: "build/1".to_string(),
            input: Some(input),
            overwrite: false,
        },
    )
    .expect("put");
    assert_eq!(put["created"], true);
    assert_eq!(put["nodes_written"], 3);
    assert_eq!(put["span"]["order"], 1);
    assert_eq!(put["span"]["end_order"], 3);

    let tree = run(
        &mut store,
        Command::Get {
            root: "build/1".to_string(),
            query: TreeQuery::default(),
        },
    )
    .expect("get");
    assert_eq!(tree["message"], "build/1");
    assert_eq!(tree["severities"], serde_json::json!(["INFO", "ERROR"]));
    assert_eq!(tree["children"][0]["message"], "compile");
    assert_eq!(tree["children"][0]["children"][1]["severity"], "ERROR");

    let logs = run(
        &mut store,
        Command::Logs {
            root: "build/1".to_string(),
            filter: LeafFilter {
                severities: SeveritySet::single(Severity::Error),
                ..LeafFilter::default()
            },
            page: 0,
            page_size: 10,
        },
    )
    .expect("logs");
    assert_eq!(logs["total_count"], 1);
    assert_eq!(logs["items"][0]["message"], "b.rs failed");

    let missing = run(
        &mut store,
        Command::Get {
            root: "build/2".to_string(),
            query: TreeQuery::default(),
        },
    )
    .expect_err("missing root");
    assert_eq!(missing.to_string(), "not found: root build/2");

    let removed = run(
        &mut store,
        Command::Delete {
            root: "build/1".to_string(),
        },
    )
    .expect("delete");
    assert_eq!(removed["removed"], 4);

    let roots = run(&mut store, Command::Roots { limit: 10, offset: 0 }).expect("roots");
    assert_eq!(roots["roots"], serde_json::json!([]));
}
