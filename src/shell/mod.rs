//! Host shell integration
//!
//! [`HostShell`] implements [`LocalExec`] on the machine running the service:
//! directory listings through `ls -l`, arbitrary commands, zip extraction and
//! plain file I/O.

use crate::gateway::LocalExec;
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tokio::process::Command;

#[derive(Debug, Clone, Default)]
pub struct HostShell;

impl HostShell {
    pub fn new() -> Self {
        Self
    }
}

/// Run a program to completion and return its stdout lines
async fn execute_command(program: &str, args: &[String]) -> Result<Vec<String>> {
    tracing::info!("Executing: {} {}", program, args.join(" "));

    let output = Command::new(program)
        .args(args)
        .output()
        .await
        .with_context(|| format!("Failed to execute {}", program))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!(
            "{} exited with {}: {}",
            program,
            output.status.code().unwrap_or(-1),
            stderr.trim()
        );
    }

    Ok(String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::to_string)
        .collect())
}

/// Reject entry names that could escape the target directory
fn checked_entry_name(name: &str) -> Result<&str> {
    if name.contains("..") || Path::new(name).is_absolute() {
        bail!("bad name {}", name);
    }
    Ok(name)
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
        .with_context(|| format!("Failed to set mode on {}", path.display()))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}

fn extract_archive(archive: Vec<u8>, dir: &Path) -> Result<Vec<String>> {
    let mut zip = zip::ZipArchive::new(Cursor::new(archive)).context("Failed to open archive")?;
    let mut extracted = Vec::with_capacity(zip.len());

    for index in 0..zip.len() {
        let mut entry = zip.by_index(index)?;
        let name = checked_entry_name(entry.name())?.to_string();
        let target = dir.join(&name);

        if entry.is_dir() {
            std::fs::create_dir_all(&target)
                .with_context(|| format!("Failed to create {}", target.display()))?;
            continue;
        }
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut out = std::fs::File::create(&target)
            .with_context(|| format!("Failed to create {}", target.display()))?;
        std::io::copy(&mut entry, &mut out)
            .with_context(|| format!("Failed to write {}", target.display()))?;
        if let Some(mode) = entry.unix_mode() {
            set_mode(&target, mode)?;
        }
        extracted.push(name);
    }

    Ok(extracted)
}

#[async_trait]
impl LocalExec for HostShell {
    async fn list_files(&self, dir: &Path) -> Result<Vec<String>> {
        execute_command("ls", &["-l".to_string(), dir.display().to_string()]).await
    }

    async fn run(&self, argv: &[String]) -> Result<Vec<String>> {
        let (program, args) = argv.split_first().ok_or_else(|| anyhow!("empty command"))?;
        execute_command(program, args).await
    }

    async fn unzip(&self, archive: Vec<u8>, dir: &Path) -> Result<Vec<String>> {
        let dir = dir.to_path_buf();
        tokio::task::spawn_blocking(move || extract_archive(archive, &dir))
            .await
            .context("unzip task panicked")?
    }

    async fn concat(&self, dst: &Path, srcs: &[PathBuf]) -> Result<()> {
        let mut body = Vec::new();
        for src in srcs {
            let part = tokio::fs::read(src)
                .await
                .with_context(|| format!("Failed to read {}", src.display()))?;
            body.extend_from_slice(&part);
        }
        tokio::fs::write(dst, body)
            .await
            .with_context(|| format!("Failed to write {}", dst.display()))
    }

    async fn read_file(&self, path: &Path) -> Result<Vec<u8>> {
        tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))
    }

    async fn write_file(&self, path: &Path, body: &[u8]) -> Result<()> {
        tokio::fs::write(path, body)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))
    }
}
