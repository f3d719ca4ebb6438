//! 批量记录处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责多轮处理和资源管理。
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：连接浏览器、设置下载目录、创建会话
//! 2. **多轮处理**：每轮重新读取待处理记录，直到没有可处理的记录
//! 3. **隔离**：无效记录、多次失败的记录在本次运行内不再处理
//! 4. **资源管理**：独占持有会话，处理单条记录时以引用借出
//! 5. **全局统计**：汇总每轮与整个运行的结果
//!
//! ## 设计特点
//!
//! - **严格顺序**：同一时刻只有一条记录在处理
//! - **协作式取消**：只在两条记录之间检查取消信号
//! - **向下委托**：委托 invoice_processor 处理单条记录

use std::collections::{HashMap, HashSet};

use anyhow::{Context, Result};
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::browser;
use crate::config::Config;
use crate::error::AppResult;
use crate::infrastructure::{CdpSession, Session};
use crate::models::{Record, RecordSource, TomlRecordStore};
use crate::orchestrator::cancel::CancelSignal;
use crate::orchestrator::invoice_processor::{self, RecordOutcome};
use crate::services::DiagnosticSink;
use crate::workflow::{InvoiceCtx, InvoiceFlow};

/// 应用主结构
pub struct App {
    config: Config,
    session: Box<dyn Session>,
    source: Box<dyn RecordSource>,
    flow: InvoiceFlow,
    diagnostics: DiagnosticSink,
    cancel: CancelSignal,
}

impl App {
    /// 初始化应用：连接（或启动）浏览器并组装各层
    pub async fn initialize(config: Config, cancel: CancelSignal) -> Result<Self> {
        log_startup(&config);

        let (browser, page) = if config.launch_browser {
            browser::launch_browser(&config.target_url, config.chrome_executable.as_deref())
                .await?
        } else {
            browser::connect_to_browser_and_page(
                config.browser_debug_port,
                Some(config.target_url.as_str()),
                config.target_title.as_deref(),
            )
            .await?
        };

        if let Err(e) = browser::configure_downloads(&browser, &config.inbox_dir).await {
            warn!("⚠️ 无法设置下载目录，将使用浏览器当前设置: {:#}", e);
        }

        let session = CdpSession::attach(browser, page)
            .await
            .context("初始化浏览器会话失败")?;
        let layout = config.load_form_layout()?;
        let flow = InvoiceFlow::from_config(&config, layout);
        let diagnostics = DiagnosticSink::new(&config.diagnostics_dir);
        let source = TomlRecordStore::new(&config.records_file);
        info!("📁 记录文件: {}", config.records_file.display());

        Ok(Self::from_parts(
            config,
            Box::new(session),
            Box::new(source),
            flow,
            diagnostics,
            cancel,
        ))
    }

    /// 由已构造好的各部分组装
    pub fn from_parts(
        config: Config,
        session: Box<dyn Session>,
        source: Box<dyn RecordSource>,
        flow: InvoiceFlow,
        diagnostics: DiagnosticSink,
        cancel: CancelSignal,
    ) -> Self {
        Self {
            config,
            session,
            source,
            flow,
            diagnostics,
            cancel,
        }
    }

    /// 运行应用主逻辑
    ///
    /// 只有会话丢失（或记录源无法读取）会返回 `Err`。
    pub async fn run(&self) -> AppResult<RunSummary> {
        let mut state = RunState::default();
        let mut summary = RunSummary::default();

        let result = self.run_passes(&mut state, &mut summary).await;
        summary.quarantined = state.quarantine.len();

        match &result {
            Ok(()) => print_final_stats(&summary, &self.config),
            Err(e) => {
                error!("💥 运行中止: {}", e);
                print_final_stats(&summary, &self.config);
            }
        }
        result.map(|()| summary)
    }

    async fn run_passes(&self, state: &mut RunState, summary: &mut RunSummary) -> AppResult<()> {
        for pass in 1..=self.config.max_passes {
            if self.cancel.is_cancelled() {
                summary.cancelled = true;
                return Ok(());
            }

            let pending = self.source.fetch_pending().await?;
            let eligible: Vec<Record> = pending
                .into_iter()
                .filter(|r| !state.quarantine.contains(&r.key()))
                .collect();

            if eligible.is_empty() {
                summary.drained = true;
                if state.quarantine.is_empty() {
                    info!("✓ 没有待处理的记录");
                } else {
                    warn!(
                        "⚠️ 剩余 {} 条记录已被隔离，本次运行不再处理",
                        state.quarantine.len()
                    );
                }
                return Ok(());
            }

            log_pass_start(pass, eligible.len(), state.quarantine.len());
            let stats = self.run_pass(pass, &eligible, state).await?;
            log_pass_complete(pass, &stats);

            summary.passes = pass;
            summary.absorb(&stats);
            if stats.cancelled {
                summary.cancelled = true;
                return Ok(());
            }
        }

        warn!("⚠️ 已达到最大轮数 {}，停止处理", self.config.max_passes);
        Ok(())
    }

    /// 处理一轮
    async fn run_pass(
        &self,
        pass: usize,
        records: &[Record],
        state: &mut RunState,
    ) -> AppResult<PassStats> {
        let mut stats = PassStats::default();
        let total = records.len();

        for (idx, record) in records.iter().enumerate() {
            if self.cancel.is_cancelled() {
                info!("🛑 已取消，跳过本轮剩余 {} 条记录", total - idx);
                stats.cancelled = true;
                break;
            }

            let ctx = InvoiceCtx::new(pass, idx + 1, total, record);
            let key = record.key();

            // 已提交但回写失败的记录只重试回写，不再重复提交
            let outcome = if state.awaiting_persistence.contains(&key) {
                info!("{} 🔁 仅重试回写完成标记", ctx);
                match invoice_processor::persist(
                    self.source.as_ref(),
                    &self.diagnostics,
                    record,
                    &ctx,
                )
                .await
                {
                    Ok(()) => RecordOutcome::Completed(Default::default()),
                    Err(e) => RecordOutcome::PersistenceFailed(e.to_string()),
                }
            } else {
                invoice_processor::process_record(
                    self.session.as_ref(),
                    self.source.as_ref(),
                    &self.flow,
                    &self.diagnostics,
                    record,
                    &ctx,
                )
                .await?
            };

            match outcome {
                RecordOutcome::Completed(_) => {
                    stats.succeeded += 1;
                    state.awaiting_persistence.remove(&key);
                }
                RecordOutcome::Invalid(_) => {
                    stats.invalid += 1;
                    state.quarantine.insert(key);
                }
                RecordOutcome::Failed { .. } => {
                    stats.failed += 1;
                    state.note_failure(&ctx, key, self.config.max_attempts_per_record);
                }
                RecordOutcome::PersistenceFailed(_) => {
                    stats.persistence_failures += 1;
                    state.awaiting_persistence.insert(key.clone());
                    state.note_failure(&ctx, key, self.config.max_attempts_per_record);
                }
            }

            if idx + 1 < total {
                sleep(self.config.timings.between_records).await;
            }
        }

        Ok(stats)
    }
}

/// 跨轮次的运行状态
#[derive(Debug, Default)]
struct RunState {
    /// 本次运行不再处理的记录
    quarantine: HashSet<String>,
    /// 每条记录的失败次数
    attempts: HashMap<String, usize>,
    /// 已提交归档、等待回写的记录
    awaiting_persistence: HashSet<String>,
}

impl RunState {
    fn note_failure(&mut self, ctx: &InvoiceCtx, key: String, max_attempts: usize) {
        let count = self.attempts.entry(key.clone()).or_insert(0);
        *count += 1;
        if *count >= max_attempts {
            warn!("{} ⛔ 已失败 {} 次，本次运行不再处理", ctx, count);
            self.quarantine.insert(key);
        }
    }
}

/// 单轮统计
#[derive(Debug, Default, Clone)]
pub struct PassStats {
    pub succeeded: usize,
    pub failed: usize,
    pub invalid: usize,
    pub persistence_failures: usize,
    pub cancelled: bool,
}

impl PassStats {
    pub fn processed(&self) -> usize {
        self.succeeded + self.failed + self.invalid + self.persistence_failures
    }
}

/// 整个运行的统计
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub passes: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub invalid: usize,
    pub persistence_failures: usize,
    /// 结束时被隔离的记录数
    pub quarantined: usize,
    /// 因取消而提前结束
    pub cancelled: bool,
    /// 结束时已没有可处理的记录
    pub drained: bool,
}

impl RunSummary {
    fn absorb(&mut self, stats: &PassStats) {
        self.succeeded += stats.succeeded;
        self.failed += stats.failed;
        self.invalid += stats.invalid;
        self.persistence_failures += stats.persistence_failures;
    }
}

// ========== 日志辅助函数 ==========

fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 发票逐条提交模式");
    info!("📊 最多 {} 轮，单条记录最多尝试 {} 次", config.max_passes, config.max_attempts_per_record);
    info!("📂 收件目录: {}", config.inbox_dir.display());
    info!("📂 归档目录: {}", config.archive_dir.display());
    info!("{}", "=".repeat(60));
}

fn log_pass_start(pass: usize, pending: usize, quarantined: usize) {
    info!("\n{}", "=".repeat(60));
    info!("📦 开始第 {} 轮", pass);
    info!("📄 待处理记录: {} 条（已隔离 {} 条）", pending, quarantined);
    info!("{}", "=".repeat(60));
}

fn log_pass_complete(pass: usize, stats: &PassStats) {
    info!("\n{}", "─".repeat(60));
    info!(
        "✓ 第 {} 轮完成: 成功 {}/{}，失败 {}，无效 {}，回写失败 {}",
        pass,
        stats.succeeded,
        stats.processed(),
        stats.failed,
        stats.invalid,
        stats.persistence_failures
    );
    info!("{}", "─".repeat(60));
}

fn print_final_stats(summary: &RunSummary, config: &Config) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("🔁 轮数: {}", summary.passes);
    info!("✅ 成功: {}", summary.succeeded);
    info!("❌ 失败: {}", summary.failed);
    info!("⚠️ 无效: {}", summary.invalid);
    info!("💾 回写失败: {}", summary.persistence_failures);
    info!("⛔ 已隔离: {}", summary.quarantined);
    if summary.cancelled {
        info!("🛑 运行被取消");
    }
    info!("{}", "=".repeat(60));
    info!("\n日志已保存至: {}", config.output_log_file);
}
