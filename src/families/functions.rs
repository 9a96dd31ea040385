//! Functions family (`lambda.*`)

use super::Op;
use crate::gateway::FunctionGateway;
use crate::session::Session;
use serde::Deserialize;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Update,
}

impl FromStr for Verb {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "update" => Ok(Self::Update),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Params {
    pub function: String,
    #[serde(rename = "zipfile")]
    pub zip_file: String,
}

pub async fn handle(session: &mut Session, functions: &dyn FunctionGateway, op: Op<Verb, Params>) {
    let p = &op.params;
    match op.verb {
        Verb::Update => {
            if p.function.is_empty() || p.zip_file.is_empty() {
                return session.log("need function and zipfile");
            }
            let bucket = match session.bucket() {
                Ok(bucket) => bucket.bucket().to_string(),
                Err(e) => return session.log(e.to_string()),
            };
            match functions
                .update_function_code(&p.function, &bucket, &p.zip_file)
                .await
            {
                Ok(name) => {
                    tracing::info!(function = %name, bucket = %bucket, "function code updated");
                    session.log("update ok");
                }
                Err(e) => session.log(format!("UpdateFunctionCode: {:#}", e)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::families::Operation;
    use crate::request::Request;
    use crate::testing::{test_config, FakeCloud};
    use std::sync::Arc;

    fn op(request: Request) -> Op<Verb, Params> {
        let Operation::Functions(op) = Operation::from_request(&request).unwrap() else {
            panic!("not a functions request");
        };
        op
    }

    #[tokio::test]
    async fn test_update_ok() {
        let cloud = FakeCloud::default();
        let mut session = cloud.session(test_config());
        let req = Request::command("lambda.update")
            .with("function", "shim")
            .with("zipfile", "shim.zip");
        handle(&mut session, &*cloud.functions, op(req)).await;
        assert_eq!(session.lines(), ["update ok"]);
        assert_eq!(cloud.functions.calls.all(), ["update_function_code"]);
    }

    #[tokio::test]
    async fn test_update_needs_both_fields() {
        let cloud = FakeCloud::default();
        let mut session = cloud.session(test_config());
        handle(
            &mut session,
            &*cloud.functions,
            op(Request::command("lambda.update").with("function", "shim")),
        )
        .await;
        assert_eq!(session.lines(), ["need function and zipfile"]);
    }

    #[tokio::test]
    async fn test_update_without_bucket() {
        let cloud = FakeCloud::default();
        let gateways = cloud.gateways_without_bucket();
        let mut session = Session::new(Arc::new(test_config()), gateways.storage, gateways.local);
        let req = Request::command("lambda.update")
            .with("function", "shim")
            .with("zipfile", "shim.zip");
        handle(&mut session, &*cloud.functions, op(req)).await;
        assert_eq!(session.lines(), ["no bucket"]);
        assert!(cloud.functions.calls.all().is_empty());
    }
}
