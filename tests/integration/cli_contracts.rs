use grove::config::{ConfigLoader, GroveConfig, StorageConfig};
use grove::tooling::cli::{CliContext, Commands, ComponentCommands, OutputFormat};
use std::path::PathBuf;
use tempfile::TempDir;

fn context(temp: &TempDir) -> CliContext {
    let config = GroveConfig {
        storage: StorageConfig {
            db_path: Some(PathBuf::from("state")),
        },
        ..GroveConfig::default()
    };
    CliContext::with_config(temp.path().to_path_buf(), config).unwrap()
}

#[test]
fn tree_json_contract_has_items_and_root_ids() {
    let temp = TempDir::new().unwrap();
    let ctx = context(&temp);

    let output = ctx.execute(&Commands::Tree { format: OutputFormat::Json }).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();

    let roots = parsed["rootIds"].as_array().unwrap();
    assert_eq!(roots.len(), 1);
    let root = &parsed["items"][roots[0].as_str().unwrap()];
    assert_eq!(root["kind"], "folder");
    assert_eq!(root["name"], "Getting Started");
    let child_id = root["children"][0].as_str().unwrap();
    let child = &parsed["items"][child_id];
    assert_eq!(child["kind"], "leaf");
    assert!(child["componentList"].is_array());
    assert!(child["lastModified"].is_i64());
}

#[test]
fn move_and_rename_by_name() {
    let temp = TempDir::new().unwrap();
    let ctx = context(&temp);
    ctx.execute(&Commands::AddFolder {
        name: "Done".to_string(),
        parent: None,
    })
    .unwrap();
    ctx.execute(&Commands::Move {
        node: "Welcome".to_string(),
        parent: Some("Done".to_string()),
        index: Some(0),
    })
    .unwrap();
    ctx.execute(&Commands::Rename {
        node: "Welcome".to_string(),
        name: "Hello".to_string(),
    })
    .unwrap();

    let text = ctx.execute(&Commands::Tree { format: OutputFormat::Text }).unwrap();
    let done_line = text.lines().position(|l| l.contains("Done")).unwrap();
    let hello_line = text.lines().position(|l| l.contains("Hello")).unwrap();
    assert_eq!(hello_line, done_line + 1);
    assert!(text.lines().nth(hello_line).unwrap().starts_with("  "));
}

#[test]
fn moving_folder_into_itself_is_an_error() {
    let temp = TempDir::new().unwrap();
    let ctx = context(&temp);
    let result = ctx.execute(&Commands::Move {
        node: "Getting Started".to_string(),
        parent: Some("Getting Started".to_string()),
        index: None,
    });
    assert!(result.is_err());
}

#[test]
fn component_list_text_is_a_table() {
    let temp = TempDir::new().unwrap();
    let ctx = context(&temp);
    let output = ctx
        .execute(&Commands::Component {
            command: ComponentCommands::List {
                project: "Welcome".to_string(),
                format: OutputFormat::Text,
            },
        })
        .unwrap();
    assert!(output.contains("Type"));
    assert!(output.contains("text"));
}

#[test]
fn status_lists_projects_without_remote() {
    let temp = TempDir::new().unwrap();
    let ctx = context(&temp);
    let output = ctx.execute(&Commands::Status { remote: false }).unwrap();
    assert!(output.contains("Welcome"));
    assert!(output.contains("Saved"));
}

#[test]
fn init_writes_loadable_config() {
    let temp = TempDir::new().unwrap();
    let ctx = context(&temp);
    let path = temp.path().join("custom.toml");
    ctx.execute(&Commands::Init {
        path: Some(path.clone()),
    })
    .unwrap();

    let loaded = ConfigLoader::load_from_file(&path).unwrap();
    assert_eq!(loaded.sync.workers, 2);
    assert!(!loaded.sync.enabled);
}
