//! 远程会话抽象
//!
//! 整个运行只有一个会话，由编排层独占持有，
//! 处理单条记录时以引用形式借给流程层和能力层。

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::AppResult;
use crate::infrastructure::locator::Locator;

/// 控件当前状态
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementState {
    pub present: bool,
    pub visible: bool,
    pub enabled: bool,
    pub value: Option<String>,
    pub text: Option<String>,
}

impl ElementState {
    /// 存在、可见且可用
    pub fn actionable(&self) -> bool {
        self.present && self.visible && self.enabled
    }
}

/// 页面控件概况（诊断用）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlInfo {
    pub kind: Option<String>,
    pub value: Option<String>,
    pub onclick: Option<String>,
    pub id: Option<String>,
    pub class: Option<String>,
    pub visible: bool,
    pub enabled: bool,
}

/// 远程 UI 会话能力
///
/// 每个方法只做一次尝试，重试与回退由交互层负责。
#[async_trait]
pub trait Session: Send + Sync {
    /// 导航到指定 URL
    async fn navigate(&self, url: &str) -> AppResult<()>;

    /// 探测控件状态，找不到时返回 `present = false` 而不是错误
    async fn probe(&self, locator: &Locator) -> AppResult<ElementState>;

    /// 原生点击（滚动到可见位置后点击）
    async fn click(&self, locator: &Locator) -> AppResult<()>;

    /// 指针手势点击：移动鼠标、停顿、按下抬起
    async fn pointer_click(&self, locator: &Locator) -> AppResult<()>;

    /// 脚本点击控件（优先执行其 onclick）
    async fn scripted_click(&self, locator: &Locator) -> AppResult<()>;

    /// 执行任意脚本
    async fn run_script(&self, script: &str) -> AppResult<JsonValue>;

    /// 类型检查的下拉选择
    async fn select_option(&self, locator: &Locator, value: &str) -> AppResult<()>;

    /// 底层赋值并触发 change 事件
    async fn assign_value(&self, locator: &Locator, value: &str) -> AppResult<()>;

    /// 清空后逐字输入
    async fn clear_and_type(&self, locator: &Locator, value: &str) -> AppResult<()>;

    /// document.readyState
    async fn ready_state(&self) -> AppResult<String>;

    /// 当前打开的原生对话框文本，没有则为 `None`
    async fn dialog_message(&self) -> AppResult<Option<String>>;

    /// 接受当前原生对话框
    async fn accept_dialog(&self) -> AppResult<()>;

    /// 所有窗口句柄
    async fn window_handles(&self) -> AppResult<Vec<String>>;

    /// 当前上下文所在窗口
    async fn current_window(&self) -> AppResult<String>;

    /// 切换上下文到指定窗口
    async fn switch_to_window(&self, handle: &str) -> AppResult<()>;

    /// 保存整页截图
    async fn screenshot(&self, path: &Path) -> AppResult<()>;

    /// 页面上 input 控件的概况
    async fn control_inventory(&self) -> AppResult<Vec<ControlInfo>>;

    /// 会话是否仍然可用
    async fn is_alive(&self) -> bool;
}
