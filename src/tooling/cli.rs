//! CLI Tooling
//!
//! Workspace-scoped commands over the project tree. Each invocation loads
//! the tree from the workspace database, applies one command and exits.

use super::format::{format_status_text, format_tree_text, LeafStatusRow};
use crate::config::{ConfigLoader, GroveConfig};
use crate::error::{ApiError, TreeError};
use crate::persistence::SledPersistence;
use crate::store::{StatusBoard, TreeStore};
use crate::sync::{build_remote, SyncEngine, SyncReport};
use crate::tree::Node;
use crate::types::NodeId;
use clap::{Parser, Subcommand, ValueEnum};
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use std::collections::HashMap;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Grove CLI - local-first project tree with remote sync
#[derive(Parser)]
#[command(name = "grove")]
#[command(about = "Organize projects in folders and keep them in sync")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file, file+stderr, both)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output includes "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the tree
    Tree {
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// Add a folder
    AddFolder {
        name: String,
        /// Parent folder id or name (default: root)
        #[arg(long)]
        parent: Option<String>,
    },
    /// Add a project
    AddProject {
        name: String,
        /// Parent folder id or name (default: root)
        #[arg(long)]
        parent: Option<String>,
    },
    /// Move a node under a new parent
    Move {
        node: String,
        /// Target folder id or name (default: root)
        #[arg(long)]
        parent: Option<String>,
        /// Position among the new siblings (default: end)
        #[arg(long)]
        index: Option<usize>,
    },
    /// Rename a node
    Rename { node: String, name: String },
    /// Delete a node and everything under it
    Delete {
        node: String,
        /// Skip the confirmation prompt for non-empty folders
        #[arg(long)]
        yes: bool,
    },
    /// Edit a project's components
    Component {
        #[command(subcommand)]
        command: ComponentCommands,
    },
    /// Synchronize projects with the remote store
    Sync {
        /// Fetch remote state and reconcile instead of pushing
        #[arg(long)]
        pull: bool,
    },
    /// Show storage and per-project sync status
    Status {
        /// Compare against the remote store
        #[arg(long)]
        remote: bool,
    },
    /// Write a default grove.toml into the workspace
    Init {
        /// Write to this path instead of <workspace>/grove.toml
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum ComponentCommands {
    /// Append a component
    Add {
        project: String,
        /// Component type tag
        component_type: String,
        /// JSON payload
        #[arg(long, default_value = "{}")]
        payload: String,
    },
    /// Replace one component's payload
    Set {
        project: String,
        index: usize,
        /// JSON payload
        payload: String,
    },
    /// Remove one component
    Remove { project: String, index: usize },
    /// List a project's components
    List {
        project: String,
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

/// Loaded workspace: configuration plus the persistent tree store
pub struct CliContext {
    workspace_root: PathBuf,
    config: GroveConfig,
    store: Arc<TreeStore>,
}

impl CliContext {
    /// Load configuration and open the workspace database
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, ApiError> {
        let config = match &config_path {
            Some(path) => ConfigLoader::load_from_file(path)?,
            None => ConfigLoader::load(&workspace_root)?,
        };
        Self::with_config(workspace_root, config)
    }

    pub fn with_config(workspace_root: PathBuf, config: GroveConfig) -> Result<Self, ApiError> {
        let db_path = config.storage.resolve_db_path(&workspace_root)?;
        let persistence = Arc::new(SledPersistence::open(&db_path)?);
        let store = Arc::new(TreeStore::load(persistence, Arc::new(StatusBoard::new())));
        info!(db = %db_path.display(), nodes = store.read(|t| t.len()), "Opened workspace");

        Ok(Self {
            workspace_root,
            config,
            store,
        })
    }

    pub fn config(&self) -> &GroveConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<TreeStore> {
        &self.store
    }

    /// Execute a CLI command
    pub fn execute(&self, command: &Commands) -> Result<String, ApiError> {
        match command {
            Commands::Tree { format } => self.handle_tree(*format),
            Commands::AddFolder { name, parent } => {
                let parent = self.resolve_optional(parent.as_deref())?;
                let id = self.store.add_folder(name, parent.as_deref())?;
                Ok(format!("Added folder {} ({})", name, id))
            }
            Commands::AddProject { name, parent } => {
                let parent = self.resolve_optional(parent.as_deref())?;
                let id = self.store.add_project(name, parent.as_deref())?;
                Ok(format!("Added project {} ({})", name, id))
            }
            Commands::Move { node, parent, index } => {
                let id = self.resolve_node(node)?;
                let parent = self.resolve_optional(parent.as_deref())?;
                let index = index.unwrap_or(usize::MAX);
                self.store.move_node(&id, parent.as_deref(), index)?;
                Ok(format!("Moved {}", node))
            }
            Commands::Rename { node, name } => {
                let id = self.resolve_node(node)?;
                self.store.rename_node(&id, name)?;
                Ok(format!("Renamed {} to {}", node, name))
            }
            Commands::Delete { node, yes } => self.handle_delete(node, *yes),
            Commands::Component { command } => self.handle_component(command),
            Commands::Sync { pull } => self.handle_sync(*pull),
            Commands::Status { remote } => self.handle_status(*remote),
            Commands::Init { path } => {
                let path = path
                    .clone()
                    .unwrap_or_else(|| self.workspace_root.join(crate::config::WORKSPACE_CONFIG_FILE));
                ConfigLoader::write_default(&path)?;
                Ok(format!("Wrote {}", path.display()))
            }
        }
    }

    /// Resolve a node by id, id prefix, or unique name
    pub fn resolve_node(&self, needle: &str) -> Result<NodeId, ApiError> {
        self.store.read(|tree| {
            if tree.contains(needle) {
                return Ok(needle.to_string());
            }
            let matches: Vec<&Node> = tree
                .items
                .values()
                .filter(|n| n.name == needle || n.id.starts_with(needle))
                .collect();
            match matches.as_slice() {
                [node] => Ok(node.id.clone()),
                [] => Err(ApiError::Tree(TreeError::NotFound(needle.to_string()))),
                _ => Err(ApiError::ConfigError(format!(
                    "'{}' matches {} nodes; use an id",
                    needle,
                    matches.len()
                ))),
            }
        })
    }

    fn resolve_optional(&self, needle: Option<&str>) -> Result<Option<NodeId>, ApiError> {
        needle.map(|n| self.resolve_node(n)).transpose()
    }

    fn handle_tree(&self, format: OutputFormat) -> Result<String, ApiError> {
        let tree = self.store.tree();
        match format {
            OutputFormat::Json => serde_json::to_string_pretty(&tree)
                .map_err(|e| ApiError::StorageError(e.into())),
            OutputFormat::Text => {
                let color = std::io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none();
                Ok(format_tree_text(&tree, color).trim_end().to_string())
            }
        }
    }

    fn handle_delete(&self, node: &str, yes: bool) -> Result<String, ApiError> {
        let id = self.resolve_node(node)?;
        let doomed = self.store.read(|tree| tree.subtree_ids(&id).len());
        if doomed > 1 && !yes {
            use dialoguer::Confirm;
            let confirmed = Confirm::new()
                .with_prompt(format!("Delete '{}' and {} nested items?", node, doomed - 1))
                .interact()
                .map_err(|e| ApiError::ConfigError(format!("Failed to get user input: {}", e)))?;

            if !confirmed {
                return Ok("Deletion cancelled".to_string());
            }
        }
        let removed = self.store.delete_node(&id)?;
        Ok(format!("Deleted {} node(s)", removed.len()))
    }

    fn handle_component(&self, command: &ComponentCommands) -> Result<String, ApiError> {
        match command {
            ComponentCommands::Add {
                project,
                component_type,
                payload,
            } => {
                let id = self.resolve_node(project)?;
                let index = self
                    .store
                    .push_component(&id, component_type, parse_payload(payload)?)?;
                Ok(format!("Added {} component at index {}", component_type, index))
            }
            ComponentCommands::Set {
                project,
                index,
                payload,
            } => {
                let id = self.resolve_node(project)?;
                self.store.update_component(&id, *index, parse_payload(payload)?)?;
                Ok(format!("Updated component {}", index))
            }
            ComponentCommands::Remove { project, index } => {
                let id = self.resolve_node(project)?;
                let removed = self.store.remove_component(&id, *index)?;
                Ok(format!("Removed {} component", removed.component_type))
            }
            ComponentCommands::List { project, format } => {
                let id = self.resolve_node(project)?;
                let components = self.store.components(&id)?;
                if *format == OutputFormat::Json {
                    return serde_json::to_string_pretty(&components)
                        .map_err(|e| ApiError::StorageError(e.into()));
                }
                if components.is_empty() {
                    return Ok("No components.".to_string());
                }
                let mut table = Table::new();
                table.load_preset(UTF8_BORDERS_ONLY);
                table.set_header(vec!["#", "Type", "Payload"]);
                for (i, c) in components.iter().enumerate() {
                    table.add_row(vec![i.to_string(), c.component_type.clone(), c.payload.to_string()]);
                }
                Ok(table.to_string())
            }
        }
    }

    fn engine(&self) -> Result<Arc<SyncEngine>, ApiError> {
        if !self.config.sync.enabled || self.config.sync.endpoint.is_none() {
            return Err(ApiError::ConfigError(
                "Sync is not configured; set sync.enabled and sync.endpoint".to_string(),
            ));
        }
        let remote = build_remote(&self.config.sync)?;
        Ok(Arc::new(SyncEngine::new(Arc::clone(&self.store), remote)))
    }

    fn runtime() -> Result<tokio::runtime::Runtime, ApiError> {
        tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(|e| ApiError::ConfigError(format!("Failed to create runtime: {}", e)))
    }

    fn handle_sync(&self, pull: bool) -> Result<String, ApiError> {
        let engine = self.engine()?;
        let rt = Self::runtime()?;
        let report = rt.block_on(async {
            engine.refresh_index().await?;
            Ok::<SyncReport, ApiError>(if pull {
                engine.pull_all().await
            } else {
                engine.sync_all().await
            })
        })?;

        let mut out = format!(
            "created {}, pushed {}, pulled {}, unchanged {}, failed {}",
            report.created,
            report.pushed,
            report.pulled,
            report.unchanged,
            report.failed.len()
        );
        for (leaf, error) in &report.failed {
            out.push_str(&format!("\n  {}: {}", leaf, error));
        }
        Ok(out)
    }

    fn handle_status(&self, check_remote: bool) -> Result<String, ApiError> {
        let remote_modified: HashMap<NodeId, i64> = if check_remote {
            let engine = self.engine()?;
            let rt = Self::runtime()?;
            rt.block_on(engine.refresh_index())?
                .into_iter()
                .map(|r| (r.local_id, r.last_modified))
                .collect()
        } else {
            HashMap::new()
        };

        let status = self.store.status().snapshot();
        let rows: Vec<LeafStatusRow> = self.store.read(|tree| {
            tree.leaf_ids()
                .into_iter()
                .filter_map(|id| tree.get(&id))
                .map(|node| LeafStatusRow {
                    id: node.id.clone(),
                    name: node.name.clone(),
                    local_modified: node.last_modified(),
                    remote_modified: remote_modified.get(&node.id).copied(),
                    status: status.leaves.get(&node.id).cloned(),
                })
                .collect()
        });
        Ok(format_status_text(&status.persistence, &rows, check_remote)
            .trim_end()
            .to_string())
    }
}

fn parse_payload(raw: &str) -> Result<serde_json::Value, ApiError> {
    serde_json::from_str(raw).map_err(|e| ApiError::ConfigError(format!("Invalid JSON payload: {}", e)))
}
