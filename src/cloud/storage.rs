//! Object store over the control plane

use super::client::ControlPlaneClient;
use crate::gateway::ObjectStore;
use anyhow::Result;
use async_trait::async_trait;

/// One named bucket
#[derive(Clone)]
pub struct Bucket {
    client: ControlPlaneClient,
    name: String,
}

impl Bucket {
    pub fn new(client: ControlPlaneClient, name: impl Into<String>) -> Self {
        Self {
            client,
            name: name.into(),
        }
    }
}

#[async_trait]
impl ObjectStore for Bucket {
    fn bucket(&self) -> &str {
        &self.name
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        self.client.get_object(&self.name, key).await
    }

    async fn put(&self, key: &str, body: Vec<u8>) -> Result<()> {
        self.client.put_object(&self.name, key, body).await
    }
}
