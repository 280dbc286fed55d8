//! LSP request/notification handlers.

mod code_action;
mod commands;
mod documents;
mod files;
mod formatting;
mod initialize;

pub use code_action::{SOURCE_FIX_ALL_MDGUARD, handle_code_action};
pub use commands::handle_execute_command;
pub use documents::{
    ActiveSelectionParams, handle_active_selection, handle_did_change, handle_did_close,
    handle_did_open, handle_did_save,
};
pub use files::{handle_did_change_configuration, handle_did_change_watched_files};
pub use formatting::handle_range_formatting;
pub use initialize::{handle_initialize, handle_initialized, handle_shutdown};
