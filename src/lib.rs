pub mod agent;
pub mod attachments;
pub mod classify;
pub mod commands;
pub mod config;
pub mod dedupe;
pub mod dispatch;
pub mod error;
pub mod format;
pub mod handlers;
pub mod server;
pub mod signature;
pub mod slack;
#[cfg(test)]
mod test_server;
pub mod types;
