//! Task gateway over the control plane (`ecs` service)

use super::client::ControlPlaneClient;
use crate::gateway::*;
use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;

const SERVICE: &str = "ecs";

#[async_trait]
impl TaskGateway for ControlPlaneClient {
    async fn list_clusters(&self) -> Result<Vec<String>> {
        self.call_paginated(SERVICE, "ListClusters", json!({}), "clusterArns")
            .await
    }

    async fn describe_clusters(&self, arns: &[String]) -> Result<Vec<Cluster>> {
        let body = json!({ "clusters": arns });
        self.call_field(SERVICE, "DescribeClusters", body, "clusters")
            .await
    }

    async fn list_task_definitions(&self) -> Result<Vec<String>> {
        self.call_paginated(
            SERVICE,
            "ListTaskDefinitions",
            json!({}),
            "taskDefinitionArns",
        )
        .await
    }

    async fn describe_task_definition(&self, family_or_arn: &str) -> Result<TaskDefinition> {
        let body = json!({ "taskDefinition": family_or_arn });
        self.call_field(SERVICE, "DescribeTaskDefinition", body, "taskDefinition")
            .await
    }

    async fn register_task_definition(&self, spec: &TaskDefinitionSpec) -> Result<TaskDefinition> {
        let body = json!({
            "family": spec.family,
            "cpu": spec.cpu,
            "memory": spec.memory,
            "executionRoleArn": spec.execution_role_arn,
            "requiresCompatibilities": ["FARGATE"],
            "networkMode": "awsvpc",
            "containerDefinitions": [{
                "name": spec.container_name,
                "image": spec.container_image,
                "essential": true,
            }],
        });
        self.call_field(SERVICE, "RegisterTaskDefinition", body, "taskDefinition")
            .await
    }

    async fn deregister_task_definition(&self, family_or_arn: &str) -> Result<TaskDefinition> {
        let body = json!({ "taskDefinition": family_or_arn });
        self.call_field(SERVICE, "DeregisterTaskDefinition", body, "taskDefinition")
            .await
    }

    async fn list_tasks(&self, cluster: &str) -> Result<Vec<String>> {
        let body = json!({ "cluster": cluster });
        self.call_paginated(SERVICE, "ListTasks", body, "taskArns")
            .await
    }

    async fn describe_tasks(&self, cluster: &str, arns: &[String]) -> Result<Vec<Task>> {
        let body = json!({ "cluster": cluster, "tasks": arns });
        self.call_field(SERVICE, "DescribeTasks", body, "tasks")
            .await
    }

    async fn run_task(&self, spec: &RunTaskSpec) -> Result<Vec<Task>> {
        let capacity = if spec.spot { "FARGATE_SPOT" } else { "FARGATE" };
        let mut overrides = json!({
            "containerOverrides": [{
                "name": spec.container_name,
                "command": spec.command,
            }],
        });
        if let Some(role) = &spec.task_role_arn {
            overrides["taskRoleArn"] = json!(role);
        }
        if let Some(cpu) = &spec.cpu {
            overrides["cpu"] = json!(cpu);
        }
        if let Some(memory) = &spec.memory {
            overrides["memory"] = json!(memory);
        }

        let mut body = json!({
            "taskDefinition": spec.task_definition_arn,
            "cluster": spec.cluster,
            "count": spec.count,
            "capacityProviderStrategy": [{ "capacityProvider": capacity, "weight": 1 }],
            "enableExecuteCommand": true,
            "networkConfiguration": {
                "awsvpcConfiguration": {
                    "subnets": [spec.subnet_id],
                    "securityGroups": spec.security_group_ids,
                    "assignPublicIp": if spec.assign_public_ip { "ENABLED" } else { "DISABLED" },
                },
            },
            "overrides": overrides,
        });
        if let Some(group) = &spec.group {
            body["group"] = json!(group);
        }

        self.call_field(SERVICE, "RunTask", body, "tasks").await
    }

    async fn stop_task(&self, cluster: &str, arn: &str) -> Result<Task> {
        let body = json!({ "cluster": cluster, "task": arn });
        self.call_field(SERVICE, "StopTask", body, "task").await
    }

    async fn execute_command(&self, cluster: &str, arn: &str, command: &str) -> Result<()> {
        let body = json!({
            "cluster": cluster,
            "task": arn,
            "command": command,
            "interactive": true,
        });
        self.call(SERVICE, "ExecuteCommand", body).await.map(|_| ())
    }

    async fn tag_resource(&self, arn: &str, tags: &Tags) -> Result<()> {
        let tags: Vec<_> = tags
            .iter()
            .map(|(key, value)| json!({ "key": key, "value": value }))
            .collect();
        let body = json!({ "resourceArn": arn, "tags": tags });
        self.call(SERVICE, "TagResource", body).await.map(|_| ())
    }
}
