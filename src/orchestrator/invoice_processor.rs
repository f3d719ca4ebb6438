//! 单条记录处理器 - 编排层
//!
//! 校验 → 提交流程 → 回写完成标记。
//! 除会话丢失外，所有失败都转换成 `RecordOutcome`。

use std::path::PathBuf;

use tracing::{error, info, warn};

use crate::error::{AppError, AppResult, ValidationError};
use crate::infrastructure::Session;
use crate::models::{Record, RecordSource};
use crate::services::DiagnosticSink;
use crate::workflow::{InvoiceCtx, InvoiceFlow, PipelineStep};

/// 单条记录的处理结果
#[derive(Debug)]
pub enum RecordOutcome {
    /// 已提交、已归档、已回写
    Completed(PathBuf),
    /// 数据不合法，未进入流程
    Invalid(ValidationError),
    /// 流程在某一步失败
    Failed { step: Option<PipelineStep>, cause: String },
    /// 已提交并归档，但完成标记回写失败
    PersistenceFailed(String),
}

/// 处理一条记录
///
/// 只有会话丢失会返回 `Err`。
pub async fn process_record(
    session: &dyn Session,
    source: &dyn RecordSource,
    flow: &InvoiceFlow,
    diagnostics: &DiagnosticSink,
    record: &Record,
    ctx: &InvoiceCtx,
) -> AppResult<RecordOutcome> {
    if let Err(e) = record.validate() {
        warn!("{} ⚠️ 跳过无效记录: {}", ctx, e);
        diagnostics.note("validation", record, &e.to_string());
        return Ok(RecordOutcome::Invalid(e));
    }

    let report = flow.run(session, record, ctx, diagnostics).await;
    if !report.success {
        if !session.is_alive().await {
            error!("{} 💥 浏览器会话已不可用", ctx);
            return Err(AppError::SessionLost(
                report.diagnostic.unwrap_or_else(|| "会话健康检查失败".to_string()),
            ));
        }
        return Ok(RecordOutcome::Failed {
            step: report.failed_step,
            cause: report.diagnostic.unwrap_or_default(),
        });
    }

    let artifact = report.artifact.unwrap_or_default();
    Ok(match persist(source, diagnostics, record, ctx).await {
        Ok(()) => RecordOutcome::Completed(artifact),
        Err(e) => RecordOutcome::PersistenceFailed(e.to_string()),
    })
}

/// 回写完成标记，失败时记录诊断
pub async fn persist(
    source: &dyn RecordSource,
    diagnostics: &DiagnosticSink,
    record: &Record,
    ctx: &InvoiceCtx,
) -> AppResult<()> {
    match source.mark_complete(record).await {
        Ok(()) => {
            info!("{} ✅ 已标记完成", ctx);
            Ok(())
        }
        Err(e) => {
            error!("{} ❌ 回写完成标记失败: {}", ctx, e);
            diagnostics.note("persistence", record, &e.to_string());
            Err(e)
        }
    }
}
