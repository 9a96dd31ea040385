//! Resource families
//!
//! Each family owns a verb enum, a parameter struct holding only the fields
//! its verbs read, and a `handle` function. [`Operation`] is the tagged union
//! a request node is converted into before it is executed.

pub mod compute;
pub mod credentials;
pub mod functions;
pub mod local;
pub mod storage;
pub mod tasks;

use crate::request::{CommandError, CommandPath, Family, Request};
use anyhow::{bail, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::Path;
use std::str::FromStr;

/// One family operation: verb, modifier args and typed parameters
#[derive(Debug, Clone, PartialEq)]
pub struct Op<V, P> {
    pub verb: V,
    pub args: Vec<String>,
    pub params: P,
}

impl<V, P> Op<V, P>
where
    V: FromStr,
    P: DeserializeOwned,
{
    fn build(family: Family, path: CommandPath, request: &Request) -> Result<Self, CommandError> {
        let verb = path.verb.parse().map_err(|_| CommandError::UnknownVerb {
            family,
            verb: path.verb.clone(),
        })?;
        let params = serde_json::from_value(Value::Object(request.fields.clone())).map_err(
            |source| CommandError::InvalidFields {
                command: request.command.clone(),
                source,
            },
        )?;

        Ok(Self {
            verb,
            args: path.args,
            params,
        })
    }

    /// First modifier, e.g. `spot` in `ecs.runtask.spot`
    pub fn modifier(&self) -> Option<&str> {
        self.args.first().map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Compute(Op<compute::Verb, compute::Params>),
    Tasks(Op<tasks::Verb, tasks::Params>),
    Storage(Op<storage::Verb, storage::Params>),
    Functions(Op<functions::Verb, functions::Params>),
    Credentials(Op<credentials::Verb, credentials::Params>),
    Local(Op<local::Verb, local::Params>),
}

impl Operation {
    /// Parse the node's command and convert its fields for the selected family
    pub fn from_request(request: &Request) -> Result<Self, CommandError> {
        let path = CommandPath::parse(&request.command)?;
        let family: Family = path.family.parse()?;

        Ok(match family {
            Family::Compute => Self::Compute(Op::build(family, path, request)?),
            Family::Tasks => Self::Tasks(Op::build(family, path, request)?),
            Family::Storage => Self::Storage(Op::build(family, path, request)?),
            Family::Functions => Self::Functions(Op::build(family, path, request)?),
            Family::Credentials => Self::Credentials(Op::build(family, path, request)?),
            Family::Local => Self::Local(Op::build(family, path, request)?),
        })
    }

    pub fn family(&self) -> Family {
        match self {
            Self::Compute(_) => Family::Compute,
            Self::Tasks(_) => Family::Tasks,
            Self::Storage(_) => Family::Storage,
            Self::Functions(_) => Family::Functions,
            Self::Credentials(_) => Family::Credentials,
            Self::Local(_) => Family::Local,
        }
    }
}

/// Treat empty strings like absent fields
pub(crate) fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

/// A relative name that cannot leave the directory it is joined to
pub(crate) fn scratch_name(name: &str) -> Result<&str> {
    let path = Path::new(name);
    if name.contains("..") || path.is_absolute() || path.has_root() {
        bail!("bad file name {}", name);
    }
    Ok(name)
}

/// `arns` if non-empty, else the single `arn`
pub(crate) fn arn_list(arns: &[String], arn: &Option<String>) -> Vec<String> {
    if !arns.is_empty() {
        return arns.to_vec();
    }
    non_empty(arn).map(|a| vec![a.to_string()]).unwrap_or_default()
}
