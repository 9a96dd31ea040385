//! Resource records exchanged with the gateways
//!
//! Field names follow the control plane's camelCase JSON so the REST
//! implementation can deserialize responses directly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type Tags = BTreeMap<String, String>;

// =============================================================================
// Compute
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Instance {
    pub instance_id: String,
    pub instance_type: String,
    pub state: String,
    pub public_ip_address: Option<String>,
    pub private_ip_address: Option<String>,
    pub vpc_id: Option<String>,
    pub launch_time: Option<DateTime<Utc>>,
    pub tags: Tags,
}

impl Instance {
    /// Value of the `Name` tag, empty when unset
    pub fn name(&self) -> &str {
        self.tags.get("Name").map(String::as_str).unwrap_or("")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InstanceStateChange {
    pub instance_id: String,
    pub previous_state: String,
    pub current_state: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Vpc {
    pub vpc_id: String,
    pub cidr_block: String,
    pub is_default: bool,
    pub tags: Tags,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Subnet {
    pub subnet_id: String,
    pub vpc_id: String,
    pub availability_zone: String,
    pub cidr_block: String,
    pub available_ip_address_count: u32,
    pub tags: Tags,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SecurityGroup {
    pub group_id: String,
    pub group_name: String,
    pub vpc_id: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NetworkInterface {
    pub network_interface_id: String,
    pub vpc_id: String,
    pub subnet_id: String,
    pub status: String,
    pub private_ip_address: Option<String>,
    pub public_ip_address: Option<String>,
    pub instance_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Volume {
    pub volume_id: String,
    pub size: i32,
    pub volume_type: String,
    pub state: String,
    pub availability_zone: String,
    pub instance_id: Option<String>,
    pub tags: Tags,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Image {
    pub image_id: String,
    pub name: String,
    pub architecture: String,
    pub owner_id: String,
    pub creation_date: Option<DateTime<Utc>>,
}

/// A spot capacity request; fulfilled once the control plane assigns an instance
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SpotRequest {
    pub spot_instance_request_id: String,
    pub instance_id: Option<String>,
    pub state: String,
}

impl SpotRequest {
    pub fn is_fulfilled(&self) -> bool {
        self.instance_id.as_deref().is_some_and(|id| !id.is_empty())
    }
}

/// Everything needed to launch instances, on demand or spot
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceSpec {
    pub image_id: String,
    pub security_group_ids: Vec<String>,
    pub instance_type: Option<String>,
    pub key_name: Option<String>,
    /// Base64 encoded
    pub user_data: Option<String>,
    pub subnet_id: Option<String>,
    pub associate_public_ip: Option<bool>,
    pub volume_size: i32,
    pub profile_arn: Option<String>,
    pub tags: Tags,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstanceFilter {
    pub vpc_id: Option<String>,
    pub instance_ids: Vec<String>,
}

impl InstanceFilter {
    pub fn vpc(vpc_id: Option<String>) -> Self {
        Self {
            vpc_id,
            instance_ids: Vec::new(),
        }
    }

    pub fn ids(instance_ids: Vec<String>) -> Self {
        Self {
            vpc_id: None,
            instance_ids,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageQuery {
    /// Name pattern, `*` wildcards allowed
    pub name: String,
    pub owner: String,
    pub arch: String,
}

// =============================================================================
// Tasks
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Cluster {
    pub cluster_arn: String,
    pub cluster_name: String,
    pub status: String,
    pub running_tasks_count: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContainerDefinition {
    pub name: String,
    pub image: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskDefinition {
    pub task_definition_arn: String,
    pub family: String,
    pub revision: i32,
    pub status: String,
    pub cpu: Option<String>,
    pub memory: Option<String>,
    pub execution_role_arn: Option<String>,
    pub container_definitions: Vec<ContainerDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDefinitionSpec {
    pub family: String,
    pub cpu: String,
    pub memory: String,
    pub execution_role_arn: String,
    pub container_name: String,
    pub container_image: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AttachmentDetail {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Attachment {
    pub r#type: String,
    pub details: Vec<AttachmentDetail>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Task {
    pub task_arn: String,
    pub task_definition_arn: String,
    pub last_status: String,
    pub group: String,
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunTaskSpec {
    pub task_definition_arn: String,
    /// Container the overrides apply to
    pub container_name: String,
    pub cluster: String,
    pub count: u32,
    pub spot: bool,
    pub group: Option<String>,
    pub task_role_arn: Option<String>,
    pub cpu: Option<String>,
    pub memory: Option<String>,
    pub subnet_id: String,
    pub assign_public_ip: bool,
    pub security_group_ids: Vec<String>,
    pub command: Vec<String>,
}

// =============================================================================
// Credentials
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    pub expiration: Option<DateTime<Utc>>,
}
