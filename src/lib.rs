//! # Invoice Submit
//!
//! 逐条把表格记录提交到远程开票表单，并归档生成的凭证文件
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源（页面），只暴露能力
//! - `Session` - 远程会话能力抽象，`CdpSession` 为 DevTools 实现
//! - `browser/` - 连接或启动浏览器
//!
//! ### ② 业务能力层（Capabilities）
//! - `interaction/` - 带重试与回退的点击、选择、输入
//! - `confirmation/` - 按顺序尝试的确认处理策略
//! - `services/` - 生成文件归档、诊断输出
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一条记录"的完整提交流程
//! - `InvoiceCtx` - 上下文封装（轮次 + 序号 + 客户）
//! - `InvoiceFlow` - 六个固定步骤
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/batch_processor` - 多轮处理，管理会话与统计
//! - `orchestrator/invoice_processor` - 单条记录：校验 → 流程 → 回写
//!
//! ## 模块结构

pub mod browser;
pub mod config;
pub mod confirmation;
pub mod error;
pub mod infrastructure;
pub mod interaction;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::{Config, FormLayout};
pub use error::{AppError, AppResult};
pub use infrastructure::{Locator, Session};
pub use models::{Record, RecordSource, TaxCategory, TomlRecordStore};
pub use orchestrator::{App, CancelSignal, RunSummary};
pub use workflow::{FlowReport, InvoiceCtx, InvoiceFlow, PipelineStep};
