//! Integration tests for the grove project tree

mod cli_contracts;
mod drag_and_drop;
mod persistence_reload;
mod support;
mod sync_scenarios;
mod tree_scenarios;
