//! Credentials family (`sts.*`)

use super::{non_empty, Op};
use crate::gateway::CredentialGateway;
use crate::session::Session;
use serde::Deserialize;
use std::str::FromStr;

pub const SESSION_NAME: &str = "session";
pub const SESSION_DURATION_SECS: u32 = 3600;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Switch,
}

impl FromStr for Verb {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "switch" => Ok(Self::Switch),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Params {
    pub arn: Option<String>,
}

pub async fn handle(
    session: &mut Session,
    credentials: &dyn CredentialGateway,
    op: Op<Verb, Params>,
) {
    match op.verb {
        Verb::Switch => {
            let Some(arn) = non_empty(&op.params.arn) else {
                return session.log("need arn");
            };
            match credentials
                .assume_role(arn, SESSION_NAME, SESSION_DURATION_SECS)
                .await
            {
                Ok(c) => session.log(format!(
                    "{} {} {}",
                    c.access_key_id, c.secret_access_key, c.session_token
                )),
                Err(e) => session.log(format!("AssumeRole: {:#}", e)),
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

    async fn exec(cloud: &FakeCloud, request: Request) -> Vec<String> {
        let mut session = cloud.session(test_config());
        let Operation::Credentials(op) = Operation::from_request(&request).unwrap() else {
            panic!("not a credentials request");
        };
        handle(&mut session, &*cloud.credentials, op).await;
        session.lines().to_vec()
    }

    #[tokio::test]
    async fn test_switch_logs_credentials() {
        let cloud = FakeCloud::default();
        let lines = exec(&cloud, Request::command("sts.switch").with("arn", "arn:role/admin")).await;
        assert_eq!(lines, ["AKIA SECRET TOKEN"]);
    }

    #[tokio::test]
    async fn test_switch_needs_arn() {
        let cloud = FakeCloud::default();
        let lines = exec(&cloud, Request::command("sts.switch")).await;
        assert_eq!(lines, ["need arn"]);
        assert!(cloud.credentials.calls.all().is_empty());
    }

    #[tokio::test]
    async fn test_switch_error_is_logged() {
        let cloud = FakeCloud::default();
        cloud.credentials.calls.fail("assume_role");
        let lines = exec(&cloud, Request::command("sts.switch").with("arn", "arn:role/admin")).await;
        assert_eq!(lines, ["AssumeRole: assume_role failed"]);
    }
}
