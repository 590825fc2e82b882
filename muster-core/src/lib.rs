//! Core library for muster — an autonomous task orchestrator that turns
//! tracker tickets into running agent workloads.

pub mod config;
pub mod error;
pub mod graph;
pub mod markers;
pub mod model;
pub mod naming;
pub mod orchestrator;
pub mod poller;
pub mod session;
pub mod shellquote;
pub mod spawner;
pub mod tracker;

pub use error::{Error, Result};
pub use model::{IssueLink, StatusCategory, Ticket, WorkItem};
