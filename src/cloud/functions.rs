//! Function and credential gateways over the control plane (`lambda`, `sts`)

use super::client::ControlPlaneClient;
use crate::gateway::{CredentialGateway, Credentials, FunctionGateway};
use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;

#[async_trait]
impl FunctionGateway for ControlPlaneClient {
    async fn update_function_code(&self, function: &str, bucket: &str, key: &str) -> Result<String> {
        let body = json!({
            "functionName": function,
            "s3Bucket": bucket,
            "s3Key": key,
        });
        self.call_field("lambda", "UpdateFunctionCode", body, "functionName")
            .await
    }
}

#[async_trait]
impl CredentialGateway for ControlPlaneClient {
    async fn assume_role(
        &self,
        role_arn: &str,
        session_name: &str,
        duration_secs: u32,
    ) -> Result<Credentials> {
        let body = json!({
            "roleArn": role_arn,
            "roleSessionName": session_name,
            "durationSeconds": duration_secs,
        });
        self.call_field("sts", "AssumeRole", body, "credentials")
            .await
    }
}
