//! Per-invocation session
//!
//! Collects the ordered log that is returned to the caller, and gives
//! handlers access to the configuration and the file sources (scratch
//! directory, then bucket).

use crate::config::Config;
use crate::families::scratch_name;
use crate::gateway::{LocalExec, ObjectStore};
use anyhow::{anyhow, Result};
use std::sync::Arc;

pub struct Session {
    config: Arc<Config>,
    lines: Vec<String>,
    storage: Option<Arc<dyn ObjectStore>>,
    local: Arc<dyn LocalExec>,
}

impl Session {
    pub fn new(
        config: Arc<Config>,
        storage: Option<Arc<dyn ObjectStore>>,
        local: Arc<dyn LocalExec>,
    ) -> Self {
        Self {
            config,
            lines: Vec::new(),
            storage,
            local,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Append one line to the log
    pub fn log(&mut self, line: impl Into<String>) {
        let line = line.into();
        if self.config.verbose {
            tracing::info!(target: "cloudbox::session", "{}", line);
        }
        self.lines.push(line);
    }

    pub fn log_lines<I, S>(&mut self, lines: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for line in lines {
            self.log(line);
        }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Newline-joined log with a trailing newline, as returned to the caller
    pub fn into_output(self) -> String {
        let mut out = self.lines.join("\n");
        out.push('\n');
        out
    }

    /// The configured bucket, or an error naming its absence
    pub fn bucket(&self) -> Result<&Arc<dyn ObjectStore>> {
        self.storage.as_ref().ok_or_else(|| anyhow!("no bucket"))
    }

    pub fn local(&self) -> &Arc<dyn LocalExec> {
        &self.local
    }

    /// Read a file from the scratch directory, falling back to the bucket
    pub async fn get_file(&self, filename: &str) -> Result<Vec<u8>> {
        let filename = scratch_name(filename)?;
        let path = self.config.scratch_dir.join(filename);
        let local_err = match self.local.read_file(&path).await {
            Ok(body) => return Ok(body),
            Err(e) => e,
        };

        let bucket_err = match self.bucket() {
            Ok(bucket) => match bucket.get(filename).await {
                Ok(body) => return Ok(body),
                Err(e) => e,
            },
            Err(e) => e,
        };

        Err(anyhow!(
            "{} is not found: ({}) ({})",
            filename,
            local_err,
            bucket_err
        ))
    }
}
