//! Control-plane REST implementation of the remote gateways
//!
//! - [`client`] - action and object calls, pagination
//! - [`http`] - reqwest wrapper with bearer auth and sanitized errors
//! - [`compute`], [`tasks`], [`functions`] - gateway trait impls
//! - [`storage`] - the configured bucket as an [`ObjectStore`]

pub mod client;
pub mod compute;
pub mod functions;
pub mod http;
pub mod storage;
pub mod tasks;

pub use client::ControlPlaneClient;
pub use storage::Bucket;

use crate::config::Config;
use crate::gateway::{Gateways, ObjectStore};
use crate::shell::HostShell;
use anyhow::Result;
use std::sync::Arc;

/// Wire every gateway for a running service
pub fn gateways(config: &Config) -> Result<Gateways> {
    let client = Arc::new(ControlPlaneClient::from_config(config)?);
    let storage = config.bucket_name.as_deref().filter(|b| !b.is_empty()).map(|name| {
        Arc::new(Bucket::new((*client).clone(), name)) as Arc<dyn ObjectStore>
    });
    if storage.is_none() {
        tracing::warn!("no bucket configured, storage operations are disabled");
    }

    Ok(Gateways {
        compute: client.clone(),
        tasks: client.clone(),
        functions: client.clone(),
        credentials: client,
        local: Arc::new(HostShell::new()),
        storage,
    })
}
