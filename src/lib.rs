//! Task board backend that mirrors Google Calendar events as board tasks.
//!
//! Layers follow the usual split: `domain` holds the board model and the
//! reconciliation rules, `infrastructure` talks to Google, the OS keychain and
//! SQLite, `application` wires them into commands and `routes` exposes the
//! commands over HTTP.

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod routes;

#[cfg(test)]
mod test_support;
