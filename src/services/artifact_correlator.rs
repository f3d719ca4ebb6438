//! 生成文件归档 - 能力层
//!
//! 确认提交后，远程页面会把凭证下载到收件目录。
//! 本模块负责找出"这一次"新生成的文件，并按记录字段重命名移动到归档目录。

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::{debug, info, warn};

use crate::config::ArtifactSettings;
use crate::error::{AppError, AppResult};
use crate::models::Record;
use crate::utils::{fill_template, poll_until, sanitize_file_name, wait_until};

/// 收件目录在某一时刻已有的文件名
#[derive(Debug, Clone, Default)]
pub struct InboxSnapshot {
    names: HashSet<String>,
}

impl InboxSnapshot {
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// 生成文件关联器
pub struct ArtifactCorrelator {
    settings: ArtifactSettings,
}

impl ArtifactCorrelator {
    pub fn new(settings: ArtifactSettings) -> Self {
        Self { settings }
    }

    /// 记录收件目录当前的文件，目录不存在时先创建
    pub fn snapshot(&self) -> AppResult<InboxSnapshot> {
        let inbox = &self.settings.inbox_dir;
        fs::create_dir_all(inbox).map_err(|e| AppError::file(inbox, e))?;

        let names = fs::read_dir(inbox)
            .map_err(|e| AppError::file(inbox, e))?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect::<HashSet<_>>();

        debug!("收件目录快照: {} 个文件", names.len());
        Ok(InboxSnapshot { names })
    }

    /// 等待快照之后出现的新文件，并等它下载完成
    ///
    /// 多个候选时选择创建时间最新的一个。
    pub async fn await_new_artifact(&self, snapshot: &InboxSnapshot) -> AppResult<PathBuf> {
        let interval = self.settings.poll_interval;
        let window = interval * self.settings.poll_attempts as u32;

        let seen = poll_until(window, interval, || async {
            let entries = self.new_entries(snapshot);
            (!entries.is_empty()).then_some(entries)
        })
        .await;

        let Some(first_seen) = seen else {
            return Err(self.not_found(window.as_millis()));
        };
        debug!("检测到 {} 个新文件，等待下载完成", first_seen.len());

        // 等临时文件消失，且至少有一个最终文件
        let completed = wait_until(self.settings.completion_grace, interval, || async {
            let entries = self.new_entries(snapshot);
            !entries.iter().any(|p| self.is_partial(p)) && entries.iter().any(|p| self.is_final(p))
        })
        .await;
        if !completed {
            warn!("⚠️ 下载可能尚未完成，仍尝试使用已完成的文件");
        }

        self.new_entries(snapshot)
            .into_iter()
            .filter(|p| self.is_final(p))
            .max_by_key(|p| created_time(p))
            .ok_or_else(|| {
                self.not_found((window + self.settings.completion_grace).as_millis())
            })
    }

    /// 归档文件的目标路径（已存在同名文件时追加序号，不覆盖）
    pub fn destination_for(&self, record: &Record) -> PathBuf {
        let name = artifact_file_name(record, &self.settings.file_name_template);
        versioned_path(&self.settings.archive_dir, &name)
    }

    /// 把文件移动到归档目录（同文件系统 rename，否则复制后删除）
    pub fn relocate(&self, source: &Path, record: &Record) -> AppResult<PathBuf> {
        let archive = &self.settings.archive_dir;
        fs::create_dir_all(archive).map_err(|e| AppError::file(archive, e))?;

        let destination = self.destination_for(record);
        if fs::rename(source, &destination).is_err() {
            fs::copy(source, &destination).map_err(|e| AppError::file(&destination, e))?;
            fs::remove_file(source).map_err(|e| AppError::file(source, e))?;
        }
        Ok(destination)
    }

    /// 完整流程：等待新文件 → 计算名称 → 移动
    pub async fn capture(&self, snapshot: &InboxSnapshot, record: &Record) -> AppResult<PathBuf> {
        let artifact = self.await_new_artifact(snapshot).await?;
        info!("📄 检测到新文件: {}", artifact.display());

        let destination = self.relocate(&artifact, record)?;
        info!("✓ 已归档: {}", destination.display());
        Ok(destination)
    }

    fn new_entries(&self, snapshot: &InboxSnapshot) -> Vec<PathBuf> {
        let Ok(entries) = fs::read_dir(&self.settings.inbox_dir) else {
            return Vec::new();
        };
        entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| !snapshot.contains(&entry.file_name().to_string_lossy()))
            .map(|entry| entry.path())
            .filter(|path| self.is_final(path) || self.is_partial(path))
            .collect()
    }

    fn is_final(&self, path: &Path) -> bool {
        has_extension(path, &self.settings.extension)
    }

    fn is_partial(&self, path: &Path) -> bool {
        has_extension(path, &self.settings.partial_extension)
    }

    fn not_found(&self, waited_ms: u128) -> AppError {
        AppError::ArtifactNotFound {
            dir: self.settings.inbox_dir.display().to_string(),
            waited_ms,
        }
    }
}

/// 由记录字段生成归档文件名，支持 `{client}` `{period}` `{batch}` 占位符
///
/// 相同的字段值总是得到相同的文件名。
pub fn artifact_file_name(record: &Record, template: &str) -> String {
    let name = fill_template(
        template,
        &[
            ("client", record.client.trim()),
            ("period", record.period.trim()),
            ("batch", record.batch_ref.trim()),
        ],
    );
    sanitize_file_name(&name)
}

/// 目标已存在时依次尝试 `name (2).ext`、`name (3).ext` ...
fn versioned_path(dir: &Path, name: &str) -> PathBuf {
    let candidate = dir.join(name);
    if !candidate.exists() {
        return candidate;
    }

    let path = Path::new(name);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string());
    let extension = path.extension().map(|e| e.to_string_lossy().into_owned());

    (2usize..)
        .map(|n| match &extension {
            Some(ext) => dir.join(format!("{} ({}).{}", stem, n, ext)),
            None => dir.join(format!("{} ({})", stem, n)),
        })
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}

fn has_extension(path: &Path, expected: &str) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case(expected))
        .unwrap_or(false)
}

/// 创建时间，文件系统不支持时退回修改时间
fn created_time(path: &Path) -> SystemTime {
    fs::metadata(path)
        .and_then(|meta| meta.created().or_else(|_| meta.modified()))
        .unwrap_or(SystemTime::UNIX_EPOCH)
}
