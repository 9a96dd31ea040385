//! Request tree and dotted-command parsing
//!
//! A decoded body is a tree of [`Request`] nodes. A node either carries a
//! command (`family.verb[.modifier...]`) together with the fields that
//! command needs, or has an empty command and acts as a batch container for
//! its `requests`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// One node of a decoded request body
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Dotted command, empty for a batch container
    #[serde(default)]
    pub command: String,
    /// Sub-requests, only consulted when `command` is empty
    #[serde(default)]
    pub requests: Vec<Request>,
    /// Every other field, converted to a family parameter set at dispatch time
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Request {
    pub fn command(command: &str) -> Self {
        Self {
            command: command.to_string(),
            ..Default::default()
        }
    }

    pub fn batch(requests: Vec<Request>) -> Self {
        Self {
            requests,
            ..Default::default()
        }
    }

    /// Add a field (builder style, mostly for tests and tooling)
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    pub fn is_batch(&self) -> bool {
        self.command.is_empty()
    }

    /// Decode a JSON body
    pub fn from_json(body: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(body)
    }
}

/// Top-level resource family, selected by the first command segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    /// `ec2` - compute instances, volumes and networking
    Compute,
    /// `ecs` - container tasks and task definitions
    Tasks,
    /// `s3` - object storage
    Storage,
    /// `lambda` - function deployment
    Functions,
    /// `sts` - temporary credentials
    Credentials,
    /// `exec` - local files and processes
    Local,
}

impl Family {
    pub const ALL: [Family; 6] = [
        Family::Compute,
        Family::Tasks,
        Family::Storage,
        Family::Functions,
        Family::Credentials,
        Family::Local,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Compute => "ec2",
            Self::Tasks => "ecs",
            Self::Storage => "s3",
            Self::Functions => "lambda",
            Self::Credentials => "sts",
            Self::Local => "exec",
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Family {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Family::ALL
            .into_iter()
            .find(|family| family.as_str() == s)
            .ok_or_else(|| CommandError::UnknownFamily(s.to_string()))
    }
}

/// Why a request node could not be turned into an operation
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("command parse error: {0}")]
    Parse(String),
    #[error("unsupported operation: unknown family {0}")]
    UnknownFamily(String),
    #[error("unsupported operation: unknown verb {verb} for {family}")]
    UnknownVerb { family: Family, verb: String },
    #[error("invalid request fields for {command}: {source}")]
    InvalidFields {
        command: String,
        #[source]
        source: serde_json::Error,
    },
}

/// A command split into its segments: `family.verb[.args...]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandPath {
    pub family: String,
    pub verb: String,
    pub args: Vec<String>,
}

impl CommandPath {
    /// Split on `.`; fewer than two segments is a parse error
    pub fn parse(command: &str) -> Result<Self, CommandError> {
        let mut segments = command.split('.');
        let family = segments.next().unwrap_or_default();
        let Some(verb) = segments.next() else {
            return Err(CommandError::Parse(command.to_string()));
        };

        Ok(Self {
            family: family.to_string(),
            verb: verb.to_string(),
            args: segments.map(str::to_string).collect(),
        })
    }

    /// First modifier, e.g. `type` in `ec2.change.type`
    pub fn modifier(&self) -> Option<&str> {
        self.args.first().map(String::as_str)
    }
}
