//! Local family (`exec.*`)
//!
//! Files and processes on the host running the service. The working
//! directory is `destination`, or the configured scratch directory.

use super::Op;
use crate::session::Session;
use serde::Deserialize;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Unzip,
    Files,
    Concat,
    Run,
}

impl FromStr for Verb {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "unzip" => Self::Unzip,
            "files" => Self::Files,
            "concat" => Self::Concat,
            "run" => Self::Run,
            _ => return Err(()),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Params {
    pub destination: String,
    pub sources: Vec<String>,
    #[serde(rename = "zipfile")]
    pub zip_file: String,
    #[serde(rename = "execcommand")]
    pub exec_command: Option<Vec<String>>,
}

pub async fn handle(session: &mut Session, op: Op<Verb, Params>) {
    let p = &op.params;
    let local = session.local().clone();
    let dir = if p.destination.is_empty() {
        session.config().scratch_dir.clone()
    } else {
        PathBuf::from(&p.destination)
    };

    match op.verb {
        Verb::Unzip => {
            if p.zip_file.is_empty() {
                return session.log("no zipfile");
            }
            let bucket = match session.bucket() {
                Ok(bucket) => bucket.clone(),
                Err(e) => return session.log(e.to_string()),
            };
            let archive = match bucket.get(&p.zip_file).await {
                Ok(archive) => archive,
                Err(e) => return session.log(format!("S3Get: {:#}", e)),
            };
            match local.unzip(archive, &dir).await {
                Ok(entries) => {
                    tracing::debug!(count = entries.len(), dir = %dir.display(), "archive extracted");
                    session.log("Unzip: ok");
                }
                Err(e) => session.log(format!("Unzip: {:#}", e)),
            }
        }
        Verb::Files => match local.list_files(&dir).await {
            Ok(lines) => session.log_lines(lines),
            Err(e) => session.log(format!("ListFiles: {:#}", e)),
        },
        Verb::Concat => {
            if p.destination.is_empty() || p.sources.is_empty() {
                return session.log("need destination and sources");
            }
            let sources: Vec<PathBuf> = p.sources.iter().map(PathBuf::from).collect();
            match local.concat(&dir, &sources).await {
                Ok(()) => session.log("concat ok"),
                Err(e) => session.log(format!("ExecConcat: {:#}", e)),
            }
        }
        Verb::Run => {
            let Some(argv) = p.exec_command.as_ref().filter(|argv| !argv.is_empty()) else {
                return session.log("no execcommand");
            };
            match local.run(argv).await {
                Ok(lines) => session.log_lines(lines),
                Err(e) => session.log(format!("Run: {:#}", e)),
            }
        }
    }
}
