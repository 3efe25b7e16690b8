//! Executive Insider gateway: HTTP API, turn orchestration and the
//! `insider` command line.

pub mod api;
pub mod auth;
pub mod bootstrap;
pub mod cli;
pub mod runtime;
pub mod state;
