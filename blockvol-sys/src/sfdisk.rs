// SPDX-License-Identifier: GPL-3.0-only

//! `sfdisk`/`partx` wrapper implementing [`PartitionTool`]

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use blockvol_contracts::{PartitionTool, VolumeError};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};
use which::which;

use crate::{Result, SysError};

/// `sfdisk -N` script that moves nothing and grows the partition to the end
const GROW_SCRIPT: &[u8] = b",+";

pub struct Sfdisk {
    sfdisk: PathBuf,
    partx: PathBuf,
}

impl Sfdisk {
    /// Locate `sfdisk` and `partx`; fails when either is not installed
    pub fn new() -> Result<Self> {
        let sfdisk = which("sfdisk").map_err(|_| SysError::ToolNotFound("sfdisk"))?;
        let partx = which("partx").map_err(|_| SysError::ToolNotFound("partx"))?;
        info!("Found sfdisk at {:?}, partx at {:?}", sfdisk, partx);
        Ok(Self { sfdisk, partx })
    }

    async fn run(&self, program: &Path, args: &[String], stdin: Option<&[u8]>) -> Result<String> {
        let rendered = render(program, args);
        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command.spawn()?;
        if let Some(input) = stdin
            && let Some(mut pipe) = child.stdin.take()
        {
            pipe.write_all(input).await?;
            // closing stdin ends the script
            drop(pipe);
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(SysError::CommandFailed {
                command: rendered,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        debug!(command = %rendered, output = %stdout, "command succeeded");
        Ok(stdout)
    }
}

fn render(program: &Path, args: &[String]) -> String {
    let program = program.display().to_string();
    if args.is_empty() {
        program
    } else {
        format!("{} {}", program, args.join(" "))
    }
}

#[async_trait]
impl PartitionTool for Sfdisk {
    async fn dump(&self, disk: &str) -> std::result::Result<String, VolumeError> {
        let args = vec!["--dump".to_string(), disk.to_string()];
        Ok(self.run(&self.sfdisk, &args, None).await?)
    }

    async fn grow_partition(
        &self,
        disk: &str,
        partition: u32,
    ) -> std::result::Result<String, VolumeError> {
        // the kernel is updated per partition by refresh_partition, which keeps
        // this safe while the partition is mounted
        let args = vec![
            "--no-reread".to_string(),
            "--no-tell-kernel".to_string(),
            disk.to_string(),
            "-N".to_string(),
            partition.to_string(),
        ];
        Ok(self.run(&self.sfdisk, &args, Some(GROW_SCRIPT)).await?)
    }

    async fn refresh_partition(
        &self,
        disk: &str,
        partition: u32,
    ) -> std::result::Result<String, VolumeError> {
        let args = vec![
            "--update".to_string(),
            disk.to_string(),
            "--nr".to_string(),
            partition.to_string(),
        ];
        Ok(self.run(&self.partx, &args, None).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_command_line() {
        let args = vec!["--update".to_string(), "/dev/vdb".to_string()];
        assert_eq!(
            render(Path::new("/usr/sbin/partx"), &args),
            "/usr/sbin/partx --update /dev/vdb"
        );
        assert_eq!(render(Path::new("sfdisk"), &[]), "sfdisk");
    }

    #[tokio::test]
    async fn captures_stderr_of_failed_commands() {
        let tool = Sfdisk {
            sfdisk: PathBuf::from("sh"),
            partx: PathBuf::from("sh"),
        };
        let args = vec!["-c".to_string(), "echo device busy >&2; exit 1".to_string()];
        let err = tool
            .run(Path::new("sh"), &args, None)
            .await
            .unwrap_err();
        match err {
            SysError::CommandFailed { stderr, .. } => assert_eq!(stderr, "device busy"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn feeds_script_on_stdin() {
        let tool = Sfdisk {
            sfdisk: PathBuf::from("cat"),
            partx: PathBuf::from("cat"),
        };
        let output = tool
            .run(Path::new("cat"), &[], Some(GROW_SCRIPT))
            .await
            .unwrap();
        assert_eq!(output, ",+");
    }
}
