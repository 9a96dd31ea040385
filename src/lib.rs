//! cloudbox
//!
//! A single-endpoint cloud automation shim. Requests arrive over HTTP as JSON
//! or multipart bodies, are routed by a dotted command (`ec2.run`,
//! `ecs.runtask.spot`, `exec.files`, ...) to a resource family, and answer
//! with the plain-text log of everything that was done.
//!
//! # Module Structure
//!
//! - [`config`] - Process configuration (environment or YAML file)
//! - [`request`] - Request tree and dotted-command parsing
//! - [`dispatch`] - Routes requests to family handlers, recursing over batches
//! - [`poller`] - Spot-request fulfillment polling
//! - [`session`] - Per-invocation log buffer
//! - [`families`] - Per-family verbs, typed parameters and handlers
//! - [`gateway`] - Collaborator traits and resource records
//! - [`format`] - Resource records to log lines
//! - [`cloud`] - REST control-plane implementation of the gateways
//! - [`shell`] - Local process and filesystem implementation
//! - [`server`] - HTTP entry point

pub mod cloud;
pub mod config;
pub mod dispatch;
pub mod families;
pub mod format;
pub mod gateway;
pub mod poller;
pub mod request;
pub mod server;
pub mod session;
pub mod shell;

#[cfg(test)]
pub(crate) mod testing;
