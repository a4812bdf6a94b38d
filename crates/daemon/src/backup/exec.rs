// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Container execution contract for pre/post backup hooks.

use async_trait::async_trait;
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;

/// Relative hook scripts resolve against the application root inside
/// the container.
pub const APP_ROOT: &str = "/lain/app";

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("fail to inspect container {container}: {detail}")]
    Inspect { container: String, detail: String },

    #[error("script {script} in {container} exited {status}: {output}")]
    Run {
        script: String,
        container: String,
        status: String,
        output: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Runs a script inside a container's namespaces with the container's
/// environment. Exit non-zero is a failure.
#[async_trait]
pub trait ContainerExec: Send + Sync + 'static {
    async fn exec(&self, container_id: &str, script: &str) -> Result<(), ExecError>;
}

/// Resolves the container's init PID and environment via `docker
/// inspect`, then enters its namespaces with `nsenter`.
#[derive(Clone, Copy, Default)]
pub struct NsenterExec;

#[async_trait]
impl ContainerExec for NsenterExec {
    async fn exec(&self, container_id: &str, script: &str) -> Result<(), ExecError> {
        let mut fields: Vec<String> = script.split_whitespace().map(str::to_string).collect();
        let Some(program) = fields.first_mut() else {
            return Ok(());
        };
        if !program.starts_with('/') {
            *program = format!("{}/{}", APP_ROOT, program);
        }

        let inspect = Command::new("docker")
            .args(["inspect", "--format", "{{.State.Pid}} {{.Config.Env}}", container_id])
            .stdin(Stdio::null())
            .output()
            .await?;
        if !inspect.status.success() {
            return Err(ExecError::Inspect {
                container: container_id.to_string(),
                detail: String::from_utf8_lossy(&inspect.stderr).trim().to_string(),
            });
        }
        let (pid, env) = parse_inspect(&String::from_utf8_lossy(&inspect.stdout)).ok_or_else(|| {
            ExecError::Inspect {
                container: container_id.to_string(),
                detail: "unexpected inspect output".to_string(),
            }
        })?;

        let mut cmd = Command::new("nsenter");
        cmd.arg("-t")
            .arg(&pid)
            .args(["--mount", "--uts", "--ipc", "--net", "--pid"])
            .args(&fields)
            .env_clear()
            .stdin(Stdio::null());
        for pair in &env {
            if let Some((k, v)) = pair.split_once('=') {
                cmd.env(k, v);
            }
        }
        tracing::debug!(container = container_id, script, "running hook via nsenter");

        let output = cmd.output().await?;
        if !output.status.success() {
            let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
            combined.push_str(&String::from_utf8_lossy(&output.stderr));
            return Err(ExecError::Run {
                script: script.to_string(),
                container: container_id.to_string(),
                status: output.status.to_string(),
                output: combined.trim().to_string(),
            });
        }
        Ok(())
    }
}

/// Inspect output is `<pid> [ENV=1 ENV2=2]`; environment values with
/// embedded spaces are not representable in this format.
fn parse_inspect(raw: &str) -> Option<(String, Vec<String>)> {
    let trimmed = raw.trim();
    let (pid, rest) = trimmed.split_once(' ')?;
    let env_list = rest.trim().strip_prefix('[')?.strip_suffix(']')?;
    let env = env_list
        .split_whitespace()
        .filter(|s| s.contains('='))
        .map(str::to_string)
        .collect();
    Some((pid.to_string(), env))
}

#[cfg(test)]
pub(crate) mod fake {
    use super::{ContainerExec, ExecError};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Exec stub recording every call, optionally failing them all.
    pub(crate) struct FakeExec {
        pub calls: Mutex<Vec<(String, String)>>,
        pub fail: bool,
    }

    impl FakeExec {
        pub fn new() -> Arc<Self> {
            Arc::new(Self { calls: Mutex::new(Vec::new()), fail: false })
        }

        pub fn failing() -> Arc<Self> {
            Arc::new(Self { calls: Mutex::new(Vec::new()), fail: true })
        }
    }

    #[async_trait]
    impl ContainerExec for FakeExec {
        async fn exec(&self, container_id: &str, script: &str) -> Result<(), ExecError> {
            self.calls.lock().push((container_id.to_string(), script.to_string()));
            if self.fail {
                return Err(ExecError::Run {
                    script: script.to_string(),
                    container: container_id.to_string(),
                    status: "exit status: 1".into(),
                    output: "hook refused".into(),
                });
            }
            Ok(())
        }
    }
}

#[cfg(test)]
#[path = "exec_tests.rs"]
mod tests;
