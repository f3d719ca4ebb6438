//! 诊断输出服务 - 业务能力层
//!
//! 只负责"出错时留下现场"：截图 + failures.txt 一行记录

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use tracing::{debug, warn};

use crate::error::{AppError, AppResult};
use crate::infrastructure::Session;
use crate::models::Record;
use crate::utils::sanitize_file_name;

/// 诊断输出
///
/// 职责：
/// - 按"步骤 + 记录"命名保存截图
/// - 追加失败记录到 failures.txt
/// - 自身失败只记日志，不影响流程
pub struct DiagnosticSink {
    dir: PathBuf,
    failures_file: PathBuf,
}

impl DiagnosticSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let failures_file = dir.join("failures.txt");
        Self { dir, failures_file }
    }

    /// 截图并写入失败记录，返回截图路径（截图失败时为 `None`）
    pub async fn capture(
        &self,
        session: &dyn Session,
        step: &str,
        record: &Record,
        cause: &str,
    ) -> Option<PathBuf> {
        let path = self.dir.join(snapshot_name(step, record));

        let shot = match fs::create_dir_all(&self.dir) {
            Ok(()) => match session.screenshot(&path).await {
                Ok(()) => {
                    debug!("已保存诊断截图: {}", path.display());
                    Some(path)
                }
                Err(e) => {
                    warn!("⚠️ 诊断截图失败: {}", e);
                    None
                }
            },
            Err(e) => {
                warn!("⚠️ 创建诊断目录失败 {}: {}", self.dir.display(), e);
                None
            }
        };

        self.note(step, record, cause);
        shot
    }

    /// 只写入失败记录（没有页面现场可截，例如校验失败）
    pub fn note(&self, step: &str, record: &Record, cause: &str) {
        if let Err(e) = self.append_line(step, record, cause) {
            warn!("⚠️ 写入 {} 失败: {}", self.failures_file.display(), e);
        }
    }

    fn append_line(&self, step: &str, record: &Record, cause: &str) -> AppResult<()> {
        fs::create_dir_all(&self.dir).map_err(|e| AppError::file(&self.dir, e))?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.failures_file)
            .map_err(|e| AppError::file(&self.failures_file, e))?;

        let line = format!(
            "{} | {} | {} | {} | {}\n",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            step,
            record.key(),
            record.client,
            cause.replace('\n', " ")
        );
        file.write_all(line.as_bytes())
            .map_err(|e| AppError::file(&self.failures_file, e))?;
        Ok(())
    }
}

/// `error_<步骤>_<记录标识>_<客户>_<时间戳>.png`
fn snapshot_name(step: &str, record: &Record) -> String {
    sanitize_file_name(&format!(
        "error_{}_{}_{}_{}.png",
        step,
        record.key(),
        record.client.trim(),
        chrono::Local::now().format("%Y%m%d_%H%M%S")
    ))
}
