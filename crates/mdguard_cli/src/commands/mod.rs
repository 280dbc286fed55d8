//! Subcommand implementations

pub mod fix;
pub mod init;
pub mod lint;
pub mod lsp;
