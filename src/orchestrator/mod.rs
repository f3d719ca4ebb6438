//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责多轮处理和流程调度，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `batch_processor` - 批量记录处理器
//! - 管理应用生命周期（初始化、运行）
//! - 独占持有浏览器会话
//! - 多轮读取待处理记录，隔离无效与多次失败的记录
//! - 输出每轮与全局统计
//!
//! ### `invoice_processor` - 单条记录处理器
//! - 校验记录
//! - 运行 InvoiceFlow
//! - 回写完成标记
//!
//! ### `cancel` - 协作式取消信号
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor (多轮处理 Vec<Record>)
//!     ↓
//! invoice_processor (处理单条 Record)
//!     ↓
//! workflow::InvoiceFlow (六个固定步骤)
//!     ↓
//! interaction / confirmation / services (能力层)
//!     ↓
//! infrastructure (基础设施：Session)
//! ```

pub mod batch_processor;
pub mod cancel;
pub mod invoice_processor;

// 重新导出主要类型
pub use batch_processor::{App, PassStats, RunSummary};
pub use cancel::{cancel_pair, CancelHandle, CancelSignal};
pub use invoice_processor::{process_record, RecordOutcome};
