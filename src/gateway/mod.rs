//! Collaborator interfaces
//!
//! Each family handler talks to the outside world only through these traits.
//! Every method maps to exactly one remote (or local) call; any composition
//! happens in the handlers.
//!
//! - [`cloud::ControlPlaneClient`](crate::cloud::ControlPlaneClient) implements
//!   the remote traits over the control-plane REST API
//! - [`shell::HostShell`](crate::shell::HostShell) implements [`LocalExec`]

pub mod types;

use anyhow::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub use types::*;

#[async_trait]
pub trait ComputeGateway: Send + Sync {
    async fn describe_vpcs(&self) -> Result<Vec<Vpc>>;
    async fn describe_subnets(&self, vpc_id: Option<&str>) -> Result<Vec<Subnet>>;
    async fn describe_security_groups(&self, vpc_id: Option<&str>) -> Result<Vec<SecurityGroup>>;
    async fn describe_network_interfaces(
        &self,
        vpc_id: Option<&str>,
        ids: &[String],
    ) -> Result<Vec<NetworkInterface>>;
    async fn describe_volumes(&self) -> Result<Vec<Volume>>;
    /// Newest image matching the query
    async fn find_image(&self, query: &ImageQuery) -> Result<Image>;
    async fn describe_instances(&self, filter: &InstanceFilter) -> Result<Vec<Instance>>;
    async fn run_instances(&self, count: u32, spec: &InstanceSpec) -> Result<Vec<Instance>>;
    async fn request_spot_instances(&self, count: u32, spec: &InstanceSpec)
        -> Result<Vec<SpotRequest>>;
    async fn describe_spot_requests(&self, ids: &[String]) -> Result<Vec<SpotRequest>>;
    async fn start_instances(&self, ids: &[String]) -> Result<Vec<InstanceStateChange>>;
    async fn stop_instances(&self, ids: &[String], force: bool)
        -> Result<Vec<InstanceStateChange>>;
    async fn terminate_instances(&self, ids: &[String]) -> Result<Vec<InstanceStateChange>>;
    /// Apply the same tag set to every resource in one call
    async fn create_tags(&self, resource_ids: &[String], tags: &Tags) -> Result<()>;
    /// Returns the new volume id
    async fn create_volume(&self, availability_zone: &str, size: i32) -> Result<String>;
    async fn delete_volume(&self, volume_id: &str) -> Result<()>;
    async fn attach_volume(&self, volume_id: &str, instance_id: &str, device: &str) -> Result<()>;
    async fn detach_volume(&self, volume_id: &str) -> Result<()>;
    async fn modify_instance_type(&self, instance_id: &str, instance_type: &str) -> Result<()>;
}

#[async_trait]
pub trait TaskGateway: Send + Sync {
    async fn list_clusters(&self) -> Result<Vec<String>>;
    async fn describe_clusters(&self, arns: &[String]) -> Result<Vec<Cluster>>;
    async fn list_task_definitions(&self) -> Result<Vec<String>>;
    async fn describe_task_definition(&self, family_or_arn: &str) -> Result<TaskDefinition>;
    async fn register_task_definition(&self, spec: &TaskDefinitionSpec) -> Result<TaskDefinition>;
    async fn deregister_task_definition(&self, family_or_arn: &str) -> Result<TaskDefinition>;
    async fn list_tasks(&self, cluster: &str) -> Result<Vec<String>>;
    async fn describe_tasks(&self, cluster: &str, arns: &[String]) -> Result<Vec<Task>>;
    async fn run_task(&self, spec: &RunTaskSpec) -> Result<Vec<Task>>;
    async fn stop_task(&self, cluster: &str, arn: &str) -> Result<Task>;
    async fn execute_command(&self, cluster: &str, arn: &str, command: &str) -> Result<()>;
    async fn tag_resource(&self, arn: &str, tags: &Tags) -> Result<()>;
}

/// Object storage bound to one bucket
#[async_trait]
pub trait ObjectStore: Send + Sync {
    fn bucket(&self) -> &str;
    async fn get(&self, key: &str) -> Result<Vec<u8>>;
    async fn put(&self, key: &str, body: Vec<u8>) -> Result<()>;
}

#[async_trait]
pub trait FunctionGateway: Send + Sync {
    /// Returns the name of the updated function
    async fn update_function_code(&self, function: &str, bucket: &str, key: &str)
        -> Result<String>;
}

#[async_trait]
pub trait CredentialGateway: Send + Sync {
    async fn assume_role(
        &self,
        role_arn: &str,
        session_name: &str,
        duration_secs: u32,
    ) -> Result<Credentials>;
}

/// Local filesystem and process operations
#[async_trait]
pub trait LocalExec: Send + Sync {
    /// Long listing of a directory, one entry per line
    async fn list_files(&self, dir: &Path) -> Result<Vec<String>>;
    /// Run a program and return its output lines
    async fn run(&self, argv: &[String]) -> Result<Vec<String>>;
    /// Extract a zip archive, returning the extracted entry names
    async fn unzip(&self, archive: Vec<u8>, dir: &Path) -> Result<Vec<String>>;
    async fn concat(&self, dst: &Path, srcs: &[PathBuf]) -> Result<()>;
    async fn read_file(&self, path: &Path) -> Result<Vec<u8>>;
    async fn write_file(&self, path: &Path, body: &[u8]) -> Result<()>;
}

/// Every collaborator an invocation may need
#[derive(Clone)]
pub struct Gateways {
    pub compute: Arc<dyn ComputeGateway>,
    pub tasks: Arc<dyn TaskGateway>,
    pub functions: Arc<dyn FunctionGateway>,
    pub credentials: Arc<dyn CredentialGateway>,
    pub local: Arc<dyn LocalExec>,
    /// Absent when no bucket is configured
    pub storage: Option<Arc<dyn ObjectStore>>,
}
