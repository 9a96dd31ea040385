//! Compute gateway over the control plane (`ec2` service)

use super::client::ControlPlaneClient;
use crate::gateway::*;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::{json, Value};

const SERVICE: &str = "ec2";

fn vpc_body(vpc_id: Option<&str>) -> Value {
    match vpc_id {
        Some(vpc) => json!({ "vpcId": vpc }),
        None => json!({}),
    }
}

#[async_trait]
impl ComputeGateway for ControlPlaneClient {
    async fn describe_vpcs(&self) -> Result<Vec<Vpc>> {
        self.call_paginated(SERVICE, "DescribeVpcs", json!({}), "vpcs")
            .await
    }

    async fn describe_subnets(&self, vpc_id: Option<&str>) -> Result<Vec<Subnet>> {
        self.call_paginated(SERVICE, "DescribeSubnets", vpc_body(vpc_id), "subnets")
            .await
    }

    async fn describe_security_groups(&self, vpc_id: Option<&str>) -> Result<Vec<SecurityGroup>> {
        self.call_paginated(
            SERVICE,
            "DescribeSecurityGroups",
            vpc_body(vpc_id),
            "securityGroups",
        )
        .await
    }

    async fn describe_network_interfaces(
        &self,
        vpc_id: Option<&str>,
        ids: &[String],
    ) -> Result<Vec<NetworkInterface>> {
        let mut body = vpc_body(vpc_id);
        if !ids.is_empty() {
            body["networkInterfaceIds"] = json!(ids);
        }
        self.call_paginated(
            SERVICE,
            "DescribeNetworkInterfaces",
            body,
            "networkInterfaces",
        )
        .await
    }

    async fn describe_volumes(&self) -> Result<Vec<Volume>> {
        self.call_paginated(SERVICE, "DescribeVolumes", json!({}), "volumes")
            .await
    }

    async fn find_image(&self, query: &ImageQuery) -> Result<Image> {
        let body = json!({
            "owners": [query.owner],
            "name": query.name,
            "architecture": query.arch,
        });
        let images: Vec<Image> = self
            .call_paginated(SERVICE, "DescribeImages", body, "images")
            .await?;

        images
            .into_iter()
            .max_by_key(|image| image.creation_date)
            .ok_or_else(|| anyhow!("no image matches {} ({})", query.name, query.arch))
    }

    async fn describe_instances(&self, filter: &InstanceFilter) -> Result<Vec<Instance>> {
        let mut body = vpc_body(filter.vpc_id.as_deref());
        if !filter.instance_ids.is_empty() {
            body["instanceIds"] = json!(filter.instance_ids);
        }
        self.call_paginated(SERVICE, "DescribeInstances", body, "instances")
            .await
    }

    async fn run_instances(&self, count: u32, spec: &InstanceSpec) -> Result<Vec<Instance>> {
        let body = json!({ "count": count, "spec": spec });
        self.call_field(SERVICE, "RunInstances", body, "instances")
            .await
    }

    async fn request_spot_instances(
        &self,
        count: u32,
        spec: &InstanceSpec,
    ) -> Result<Vec<SpotRequest>> {
        let body = json!({ "count": count, "spec": spec });
        self.call_field(SERVICE, "RequestSpotInstances", body, "spotInstanceRequests")
            .await
    }

    async fn describe_spot_requests(&self, ids: &[String]) -> Result<Vec<SpotRequest>> {
        let body = json!({ "spotInstanceRequestIds": ids });
        self.call_paginated(
            SERVICE,
            "DescribeSpotInstanceRequests",
            body,
            "spotInstanceRequests",
        )
        .await
    }

    async fn start_instances(&self, ids: &[String]) -> Result<Vec<InstanceStateChange>> {
        let body = json!({ "instanceIds": ids });
        self.call_field(SERVICE, "StartInstances", body, "stateChanges")
            .await
    }

    async fn stop_instances(&self, ids: &[String], force: bool) -> Result<Vec<InstanceStateChange>> {
        let body = json!({ "instanceIds": ids, "force": force });
        self.call_field(SERVICE, "StopInstances", body, "stateChanges")
            .await
    }

    async fn terminate_instances(&self, ids: &[String]) -> Result<Vec<InstanceStateChange>> {
        let body = json!({ "instanceIds": ids });
        self.call_field(SERVICE, "TerminateInstances", body, "stateChanges")
            .await
    }

    async fn create_tags(&self, resource_ids: &[String], tags: &Tags) -> Result<()> {
        let body = json!({ "resourceIds": resource_ids, "tags": tags });
        self.call(SERVICE, "CreateTags", body).await.map(|_| ())
    }

    async fn create_volume(&self, availability_zone: &str, size: i32) -> Result<String> {
        let body = json!({ "availabilityZone": availability_zone, "size": size });
        self.call_field(SERVICE, "CreateVolume", body, "volumeId")
            .await
    }

    async fn delete_volume(&self, volume_id: &str) -> Result<()> {
        let body = json!({ "volumeId": volume_id });
        self.call(SERVICE, "DeleteVolume", body).await.map(|_| ())
    }

    async fn attach_volume(&self, volume_id: &str, instance_id: &str, device: &str) -> Result<()> {
        let body = json!({
            "volumeId": volume_id,
            "instanceId": instance_id,
            "device": device,
        });
        self.call(SERVICE, "AttachVolume", body).await.map(|_| ())
    }

    async fn detach_volume(&self, volume_id: &str) -> Result<()> {
        let body = json!({ "volumeId": volume_id });
        self.call(SERVICE, "DetachVolume", body).await.map(|_| ())
    }

    async fn modify_instance_type(&self, instance_id: &str, instance_type: &str) -> Result<()> {
        let body = json!({ "instanceId": instance_id, "instanceType": instance_type });
        self.call(SERVICE, "ModifyInstanceAttribute", body)
            .await
            .map(|_| ())
    }
}
