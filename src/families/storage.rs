//! Storage family (`s3.*`)
//!
//! Object-level helpers on the configured bucket.

use super::{scratch_name, Op};
use crate::gateway::ObjectStore;
use crate::session::Session;
use anyhow::{Context, Result};
use base64::Engine;
use serde::Deserialize;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Concat,
    Store,
    Decode,
}

impl FromStr for Verb {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "concat" => Ok(Self::Concat),
            "store" => Ok(Self::Store),
            "decode" => Ok(Self::Decode),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Params {
    pub destination: String,
    pub sources: Vec<String>,
}

pub async fn handle(session: &mut Session, op: Op<Verb, Params>) {
    let p = &op.params;
    let bucket = match session.bucket() {
        Ok(bucket) => bucket.clone(),
        Err(e) => return session.log(e.to_string()),
    };
    if p.destination.is_empty() || p.sources.is_empty() {
        return session.log("need destination and sources");
    }

    match op.verb {
        Verb::Concat => match concat_objects(&*bucket, &p.destination, &p.sources).await {
            Ok(()) => session.log("concat ok"),
            Err(e) => session.log(format!("ConcatObjects: {:#}", e)),
        },
        Verb::Store => match store_objects(session, &*bucket, &p.destination, &p.sources).await {
            Ok(()) => session.log("stored"),
            Err(e) => session.log(format!("StoreObject: {:#}", e)),
        },
        Verb::Decode => match decode_object(&*bucket, &p.destination, &p.sources[0]).await {
            Ok(()) => session.log("decode ok"),
            Err(e) => session.log(format!("Base64DecodeObject: {:#}", e)),
        },
    }
}

/// Join `sources` into one object at `destination`
async fn concat_objects(bucket: &dyn ObjectStore, destination: &str, sources: &[String]) -> Result<()> {
    let mut body = Vec::new();
    for source in sources {
        let object = bucket.get(source).await?;
        body.extend_from_slice(&object);
    }
    bucket.put(destination, body).await
}

/// Upload each scratch-directory file to `destination/<name>`
async fn store_objects(
    session: &Session,
    bucket: &dyn ObjectStore,
    destination: &str,
    sources: &[String],
) -> Result<()> {
    let prefix = destination.trim_end_matches('/');
    for source in sources {
        let path = session.config().scratch_dir.join(scratch_name(source)?);
        let body = session
            .local()
            .read_file(&path)
            .await
            .with_context(|| format!("read {}", path.display()))?;
        bucket.put(&format!("{}/{}", prefix, source), body).await?;
    }
    Ok(())
}

async fn decode_object(bucket: &dyn ObjectStore, destination: &str, source: &str) -> Result<()> {
    let encoded = bucket.get(source).await?;
    let trimmed: Vec<u8> = encoded
        .into_iter()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    let plain = base64::engine::general_purpose::STANDARD
        .decode(trimmed)
        .context("base64 decode")?;
    bucket.put(destination, plain).await
}
