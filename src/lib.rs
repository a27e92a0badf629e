// Core infrastructure modules
pub mod config;
pub mod connections;
pub mod core;
pub mod storage;

// Console modules
pub mod autocomplete;
pub mod highlight;
pub mod query_editor;
pub mod query_menu;
pub mod repl;
pub mod results_grid;

#[cfg(test)]
pub mod test_utils;
