//! 发票提交流程 - 流程层
//!
//! 核心职责：定义"一条记录"的完整提交流程
//!
//! 流程顺序（严格按序，任一步失败即中止，不从中间恢复）：
//! 1. 初始化：进入开票入口 → 销售点 → 凭证类型（A/B）→ 继续
//! 2. 基本信息：概念 → 关联活动
//! 3. 日期：同一日期写入四个日期字段
//! 4. 客户信息：继续 → 税务条件 → 税号 → 现金付款 → 继续
//! 5. 明细：描述 → 计量单位 → 金额 →（B 类）税率 → 继续
//! 6. 确认并归档：确认 → 处理确认框 → 打印 → 归档文件 → 返回主菜单

use std::fmt;
use std::path::PathBuf;

use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::config::{ArtifactSettings, Config, FormLayout, InteractionPolicy, Timings};
use crate::confirmation::ConfirmationResolver;
use crate::error::{AppError, AppResult};
use crate::infrastructure::{Control, Session};
use crate::interaction::ElementHandler;
use crate::models::{DocumentSubtype, Record};
use crate::services::{ArtifactCorrelator, DiagnosticSink};
use crate::utils::logging::clip_text;
use crate::utils::wait_until;
use crate::workflow::invoice_ctx::InvoiceCtx;

/// 流程步骤
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStep {
    Init,
    BasicInfo,
    Dates,
    ClientInfo,
    LineItems,
    ConfirmAndCapture,
}

impl PipelineStep {
    /// 固定执行顺序
    pub const ALL: [PipelineStep; 6] = [
        PipelineStep::Init,
        PipelineStep::BasicInfo,
        PipelineStep::Dates,
        PipelineStep::ClientInfo,
        PipelineStep::LineItems,
        PipelineStep::ConfirmAndCapture,
    ];

    /// 用于诊断文件名
    pub fn name(self) -> &'static str {
        match self {
            PipelineStep::Init => "init",
            PipelineStep::BasicInfo => "basic_info",
            PipelineStep::Dates => "dates",
            PipelineStep::ClientInfo => "client_info",
            PipelineStep::LineItems => "line_items",
            PipelineStep::ConfirmAndCapture => "confirm_capture",
        }
    }

    /// 用于日志
    pub fn label(self) -> &'static str {
        match self {
            PipelineStep::Init => "初始化",
            PipelineStep::BasicInfo => "基本信息",
            PipelineStep::Dates => "日期",
            PipelineStep::ClientInfo => "客户信息",
            PipelineStep::LineItems => "明细",
            PipelineStep::ConfirmAndCapture => "确认并归档",
        }
    }
}

impl fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 单条记录的流程结果
///
/// 单条记录内的失败都转换成这里的字段，不会以错误形式向上传播。
#[derive(Debug, Clone, Default)]
pub struct FlowReport {
    pub success: bool,
    pub failed_step: Option<PipelineStep>,
    pub diagnostic: Option<String>,
    /// 归档后的文件路径
    pub artifact: Option<PathBuf>,
}

impl FlowReport {
    fn completed(artifact: PathBuf) -> Self {
        Self {
            success: true,
            artifact: Some(artifact),
            ..Self::default()
        }
    }

    fn failed(step: PipelineStep, diagnostic: String) -> Self {
        Self {
            success: false,
            failed_step: Some(step),
            diagnostic: Some(diagnostic),
            artifact: None,
        }
    }
}

/// 发票提交流程
///
/// - 编排六个固定步骤
/// - 不持有会话，只借用
/// - 依赖交互层、确认处理与文件归档能力
pub struct InvoiceFlow {
    layout: FormLayout,
    timings: Timings,
    policy: InteractionPolicy,
    resolver: ConfirmationResolver,
    correlator: ArtifactCorrelator,
}

impl InvoiceFlow {
    pub fn new(
        layout: FormLayout,
        timings: Timings,
        policy: InteractionPolicy,
        artifacts: ArtifactSettings,
    ) -> Self {
        let resolver = ConfirmationResolver::from_layout(&layout, &timings, &policy);
        Self {
            layout,
            timings,
            policy,
            resolver,
            correlator: ArtifactCorrelator::new(artifacts),
        }
    }

    pub fn from_config(config: &Config, layout: FormLayout) -> Self {
        Self::new(
            layout,
            config.timings.clone(),
            config.interaction.clone(),
            config.artifact_settings(),
        )
    }

    /// 执行完整流程
    pub async fn run(
        &self,
        session: &dyn Session,
        record: &Record,
        ctx: &InvoiceCtx,
        diagnostics: &DiagnosticSink,
    ) -> FlowReport {
        info!("{} 🧾 开始提交 {}", ctx, record);

        let mut artifact = None;
        for step in PipelineStep::ALL {
            debug!("{} ▶ {}", ctx, step.label());

            let result = match step {
                PipelineStep::Init => self.init(session, record, ctx).await,
                PipelineStep::BasicInfo => self.basic_info(session).await,
                PipelineStep::Dates => self.dates(session, record).await,
                PipelineStep::ClientInfo => self.client_info(session, record).await,
                PipelineStep::LineItems => self.line_items(session, record, ctx).await,
                PipelineStep::ConfirmAndCapture => self
                    .confirm_and_capture(session, record, ctx)
                    .await
                    .map(|path| artifact = Some(path)),
            };

            if let Err(e) = result {
                let cause = e.to_string();
                error!("{} ❌ 步骤 [{}] 失败: {}", ctx, step.label(), cause);
                diagnostics.capture(session, step.name(), record, &cause).await;
                return FlowReport::failed(step, cause);
            }
            info!("{} ✓ {}", ctx, step.label());
        }

        match artifact {
            Some(path) => FlowReport::completed(path),
            None => FlowReport::failed(
                PipelineStep::ConfirmAndCapture,
                "流程结束但没有归档文件".to_string(),
            ),
        }
    }

    fn handler<'a>(&'a self, session: &'a dyn Session) -> ElementHandler<'a> {
        ElementHandler::new(session, &self.policy)
    }

    // ========== 步骤 ==========

    async fn init(&self, session: &dyn Session, record: &Record, ctx: &InvoiceCtx) -> AppResult<()> {
        // 上一条记录遗留的对话框会挡住所有页面操作
        if let Ok(Some(message)) = session.dialog_message().await {
            warn!("{} ⚠️ 关闭遗留的对话框: {}", ctx, clip_text(&message, 120));
            session.accept_dialog().await?;
        }

        let h = self.handler(session);
        let layout = &self.layout;

        h.click(&layout.entry, "开票入口").await.into_result()?;
        h.select(&layout.point_of_sale, &layout.point_of_sale_value, "销售点")
            .await
            .into_result()?;

        let subtype = record.tax_category.document_subtype();
        let subtype_value = match subtype {
            DocumentSubtype::A => &layout.subtype_a_value,
            DocumentSubtype::B => &layout.subtype_b_value,
        };
        info!(
            "{} 凭证类型 {:?}（{} → {}）",
            ctx, subtype, record.tax_category, subtype_value
        );
        h.select(&layout.document_type, subtype_value, "凭证类型")
            .await
            .into_result()?;

        self.advance(session, &layout.continue_validated, "继续（凭证类型）")
            .await
    }

    async fn basic_info(&self, session: &dyn Session) -> AppResult<()> {
        let h = self.handler(session);
        let layout = &self.layout;

        h.select(&layout.concept, &layout.concept_value, "概念")
            .await
            .into_result()?;
        h.select(&layout.activity, &layout.activity_value, "关联活动")
            .await
            .into_result()
    }

    async fn dates(&self, session: &dyn Session, record: &Record) -> AppResult<()> {
        let h = self.handler(session);
        let value = record
            .issue_date
            .format(&self.layout.date_format)
            .to_string();

        for (locator, label) in self.layout.date_fields() {
            h.input(locator, &value, label).await.into_result()?;
        }
        Ok(())
    }

    async fn client_info(&self, session: &dyn Session, record: &Record) -> AppResult<()> {
        let h = self.handler(session);
        let layout = &self.layout;

        self.advance(session, &layout.continue_validated, "继续（客户信息前）")
            .await?;

        h.select(
            &layout.tax_condition,
            record.tax_category.condition_code(),
            "税务条件",
        )
        .await
        .into_result()?;
        h.input(&layout.tax_id_input, &record.tax_id, "税号")
            .await
            .into_result()?;
        h.click(&layout.cash_payment, "现金付款").await.into_result()?;

        self.advance(session, &layout.continue_validated, "继续（客户信息后）")
            .await
    }

    async fn line_items(
        &self,
        session: &dyn Session,
        record: &Record,
        ctx: &InvoiceCtx,
    ) -> AppResult<()> {
        let h = self.handler(session);
        let layout = &self.layout;

        let description = record.line_description(&layout.description_template);
        h.input(&layout.description_input, &description, "明细描述")
            .await
            .into_result()?;
        h.select(&layout.unit_of_measure, &layout.unit_value, "计量单位")
            .await
            .into_result()?;
        h.input(&layout.price_input, &record.amount_text(), "金额")
            .await
            .into_result()?;

        if record.tax_category.requires_tax_rate() {
            debug!("{} {} 需要选择税率", ctx, record.tax_category);
            h.select(&layout.tax_rate, &layout.tax_rate_value, "税率")
                .await
                .into_result()?;
        }

        self.advance(session, &layout.continue_plain, "继续（明细后）")
            .await
    }

    async fn confirm_and_capture(
        &self,
        session: &dyn Session,
        record: &Record,
        ctx: &InvoiceCtx,
    ) -> AppResult<PathBuf> {
        let h = self.handler(session);

        h.click(&self.layout.confirm, "确认数据").await.into_result()?;
        self.resolver.resolve(session).await.into_result()?;

        info!("{} 等待页面更新...", ctx);
        self.wait_page_ready(session).await;

        let artifact = self.print_and_capture(session, &h, record, ctx).await?;

        // 文件已归档，返回主菜单失败只影响下一条记录的入口
        let menu = h.click(&self.layout.main_menu, "返回主菜单").await;
        if !menu.is_ok() {
            warn!("{} ⚠️ 返回主菜单失败: {}", ctx, menu);
        }

        Ok(artifact)
    }

    // ========== 辅助 ==========

    /// 点击"继续"类按钮，停顿后检查页面是否弹出了错误提示
    async fn advance(&self, session: &dyn Session, control: &Control, description: &str) -> AppResult<()> {
        self.handler(session)
            .click(control, description)
            .await
            .into_result()?;
        sleep(self.timings.advance_pause).await;

        if let Ok(Some(_)) = session.dialog_message().await {
            let (outcome, message) = self.resolver.resolve_error_dialog(session).await;
            debug!("错误提示处理结果: {}", outcome);
            return Err(AppError::exhausted(
                description,
                format!("页面提示: {}", message.unwrap_or_default()),
            ));
        }
        Ok(())
    }

    /// 尽力等待文档加载完成，然后固定等待页面稳定
    async fn wait_page_ready(&self, session: &dyn Session) {
        let ready = wait_until(self.timings.ready_state_timeout, self.policy.poll_interval, || async {
            session
                .ready_state()
                .await
                .map(|state| state == "complete")
                .unwrap_or(false)
        })
        .await;
        if !ready {
            warn!("⚠️ 无法确认页面加载状态");
        }
        sleep(self.timings.page_settle).await;
    }

    /// 按候选顺序查找打印按钮，点击后等待并归档新文件
    async fn print_and_capture(
        &self,
        session: &dyn Session,
        h: &ElementHandler<'_>,
        record: &Record,
        ctx: &InvoiceCtx,
    ) -> AppResult<PathBuf> {
        let rounds = self.timings.print_search_rounds;
        let mut last_error = None;

        for round in 1..=rounds {
            debug!("{} 查找打印按钮（第 {}/{} 轮）", ctx, round, rounds);
            let mut found_any = false;

            for locator in &self.layout.print_candidates {
                if !h
                    .wait_actionable(locator, self.timings.print_probe_timeout)
                    .await
                {
                    debug!("{} 打印按钮 {} 不可用", ctx, locator);
                    continue;
                }
                found_any = true;
                info!("{} 🖨️ 找到打印按钮: {}", ctx, locator);

                let snapshot = self.correlator.snapshot()?;
                let activated = h.activate(locator, "打印").await;
                if !activated.is_ok() {
                    warn!("{} ⚠️ {}", ctx, activated);
                    last_error = activated.into_result().err();
                    continue;
                }

                match self.correlator.capture(&snapshot, record).await {
                    Ok(path) => return Ok(path),
                    Err(e @ AppError::ArtifactNotFound { .. }) => {
                        warn!("{} ⚠️ 未检测到下载: {}", ctx, e);
                        last_error = Some(e);
                    }
                    Err(e) => return Err(e),
                }
            }

            if !found_any {
                self.log_control_inventory(session, ctx).await;
            }
            if round < rounds {
                sleep(self.timings.print_round_pause).await;
            }
        }

        Err(last_error.unwrap_or_else(|| {
            AppError::exhausted("打印", format!("{} 轮查找后所有候选定位均不可用", rounds))
        }))
    }

    async fn log_control_inventory(&self, session: &dyn Session, ctx: &InvoiceCtx) {
        match session.control_inventory().await {
            Ok(controls) => {
                info!("{} 页面上的 input 控件 ({} 个):", ctx, controls.len());
                for control in controls.iter().filter(|c| c.visible) {
                    info!(
                        "  - type={:?} value={:?} id={:?} onclick={:?}",
                        control.kind,
                        control.value.as_deref().map(|v| clip_text(v, 40)),
                        control.id,
                        control.onclick.as_deref().map(|v| clip_text(v, 80)),
                    );
                }
            }
            Err(e) => warn!("{} ⚠️ 读取控件列表失败: {}", ctx, e),
        }
    }
}
