//! 基础设施层（Infrastructure Layer）
//!
//! 持有唯一的稀缺资源（DevTools 页面），只向上暴露能力：
//!
//! - `Session` - 远程会话能力抽象（流程层与能力层只认识它）
//! - `CdpSession` - 基于 chromiumoxide 的实现
//! - `JsExecutor` - 页面脚本执行
//! - `DialogWatch` - 原生对话框状态，避免点击被对话框卡住
//! - `Locator` / `Control` - 控件定位描述

pub mod cdp_session;
pub mod dialog;
pub mod js_executor;
pub mod locator;
pub mod scripts;
pub mod session;

pub use cdp_session::CdpSession;
pub use dialog::DialogWatch;
pub use js_executor::JsExecutor;
pub use locator::{Control, Locator};
pub use session::{ControlInfo, ElementState, Session};
