//! 命令执行器
//!
//! 工作流通过 `CommandExecutor` 调用 gcloud，支持：
//! - 继承终端输出（构建日志直接打印）
//! - 合并捕获 stdout/stderr（用于解析部署输出）
//! - 超时控制

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, error};

use crate::config::env::constants::COMMAND_TIMEOUT_SECS;

/// 命令执行错误
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// 命令启动失败
    #[error("failed to spawn command: {0}")]
    SpawnFailed(#[source] std::io::Error),
    /// 命令超时
    #[error("command timed out after {0:?}")]
    Timeout(Duration),
    /// 等待命令完成失败
    #[error("failed to wait for command: {0}")]
    WaitFailed(#[source] std::io::Error),
}

/// 输出处理方式
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputMode {
    /// 直接输出到当前终端
    Inherit,
    /// 捕获 stdout + stderr（按到达顺序合并）
    Capture,
}

/// 命令执行结果
#[derive(Clone, Debug, Default)]
pub struct CommandOutput {
    /// 退出码（被信号终止时为 None）
    pub code: Option<i32>,
    /// 合并输出，`Inherit` 模式下为空
    pub output: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// 外部命令执行接口
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        mode: OutputMode,
    ) -> Result<CommandOutput, CommandError>;
}

/// 基于 tokio::process 的执行器
#[derive(Clone, Debug)]
pub struct CommandRunner {
    timeout: Duration,
}

impl Default for CommandRunner {
    fn default() -> Self {
        Self::new(Duration::from_secs(COMMAND_TIMEOUT_SECS))
    }
}

impl CommandRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    async fn run_inherit(&self, program: &str, args: &[String]) -> Result<CommandOutput, CommandError> {
        let mut child = Command::new(program)
            .args(args)
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(CommandError::SpawnFailed)?;

        tokio::select! {
            status = child.wait() => {
                let status = status.map_err(CommandError::WaitFailed)?;
                Ok(CommandOutput { code: status.code(), output: String::new() })
            }
            _ = tokio::time::sleep(self.timeout) => {
                error!(program, "Command timed out after {:?}", self.timeout);
                let _ = child.kill().await;
                Err(CommandError::Timeout(self.timeout))
            }
        }
    }

    async fn run_capture(&self, program: &str, args: &[String]) -> Result<CommandOutput, CommandError> {
        let mut child = Command::new(program)
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(CommandError::SpawnFailed)?;

        let (line_tx, mut line_rx) = mpsc::unbounded_channel::<String>();

        // stdout / stderr 各一个读取任务，写入同一通道
        let stdout_task = child.stdout.take().map(|s| spawn_line_reader(s, line_tx.clone()));
        let stderr_task = child.stderr.take().map(|s| spawn_line_reader(s, line_tx.clone()));
        drop(line_tx);

        let collector = tokio::spawn(async move {
            let mut combined = String::new();
            while let Some(line) = line_rx.recv().await {
                debug!(line = %line, "command output");
                combined.push_str(&line);
                combined.push('\n');
            }
            combined
        });

        let result = tokio::select! {
            status = child.wait() => status.map_err(CommandError::WaitFailed),
            _ = tokio::time::sleep(self.timeout) => {
                error!(program, "Command timed out after {:?}", self.timeout);
                let _ = child.kill().await;
                Err(CommandError::Timeout(self.timeout))
            }
        };

        // 超时后子进程的子进程可能仍持有管道，直接终止读取任务
        let readers = [stdout_task, stderr_task].into_iter().flatten();
        if result.is_err() {
            for task in readers {
                task.abort();
            }
        } else {
            for task in readers {
                let _ = task.await;
            }
        }
        let output = collector.await.unwrap_or_default();

        let status = result?;
        Ok(CommandOutput {
            code: status.code(),
            output,
        })
    }
}

fn spawn_line_reader<R>(reader: R, tx: mpsc::UnboundedSender<String>) -> tokio::task::JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let _ = tx.send(line);
        }
    })
}

#[async_trait]
impl CommandExecutor for CommandRunner {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        mode: OutputMode,
    ) -> Result<CommandOutput, CommandError> {
        debug!(program, ?args, ?mode, "Running command");
        match mode {
            OutputMode::Inherit => self.run_inherit(program, args).await,
            OutputMode::Capture => self.run_capture(program, args).await,
        }
    }
}
