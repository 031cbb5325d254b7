pub mod board;
pub mod bootstrap;
pub mod calendar_fetch;
pub mod calendar_sync;
pub mod commands;
pub mod oauth;
