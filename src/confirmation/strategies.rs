use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::AppResult;
use crate::infrastructure::{Locator, Session};
use crate::utils::{poll_until, wait_until};

/// 一种确认处理方式
///
/// `Ok(true)` 表示已处理；`Ok(false)` 或 `Err` 都交给下一个策略。
#[async_trait]
pub trait ConfirmStrategy: Send + Sync {
    fn name(&self) -> &str;

    async fn attempt(&self, session: &dyn Session) -> AppResult<bool>;
}

/// 原生对话框已经打开：直接接受
pub struct NativeDialogPresent;

#[async_trait]
impl ConfirmStrategy for NativeDialogPresent {
    fn name(&self) -> &str {
        "已打开的原生对话框"
    }

    async fn attempt(&self, session: &dyn Session) -> AppResult<bool> {
        match session.dialog_message().await? {
            Some(message) => {
                debug!("接受对话框: {}", message);
                session.accept_dialog().await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// 在限定时间内等待原生对话框出现，然后接受
pub struct AwaitNativeDialog {
    pub timeout: Duration,
    pub interval: Duration,
}

#[async_trait]
impl ConfirmStrategy for AwaitNativeDialog {
    fn name(&self) -> &str {
        "等待原生对话框"
    }

    async fn attempt(&self, session: &dyn Session) -> AppResult<bool> {
        let message = poll_until(self.timeout, self.interval, || async {
            session.dialog_message().await.ok().flatten()
        })
        .await;

        match message {
            Some(message) => {
                debug!("接受对话框: {}", message);
                session.accept_dialog().await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// 弹出了新窗口：切换过去点击确认按钮，再切回主窗口
pub struct SecondaryWindow {
    pub accept: Locator,
    pub timeout: Duration,
    pub interval: Duration,
}

impl SecondaryWindow {
    async fn accept_in(&self, session: &dyn Session, handle: &str) -> AppResult<bool> {
        session.switch_to_window(handle).await?;

        let present = wait_until(self.timeout, self.interval, || async {
            session
                .probe(&self.accept)
                .await
                .map(|state| state.actionable())
                .unwrap_or(false)
        })
        .await;
        if !present {
            debug!("弹出窗口中没有 {}", self.accept);
            return Ok(false);
        }

        session.click(&self.accept).await?;
        Ok(true)
    }
}

#[async_trait]
impl ConfirmStrategy for SecondaryWindow {
    fn name(&self) -> &str {
        "弹出窗口"
    }

    async fn attempt(&self, session: &dyn Session) -> AppResult<bool> {
        let primary = session.current_window().await?;
        let handles = session.window_handles().await?;
        let Some(popup) = handles.iter().rev().find(|h| **h != primary) else {
            return Ok(false);
        };

        let result = self.accept_in(session, popup).await;

        // 无论结果如何都要回到主窗口
        if let Err(e) = session.switch_to_window(&primary).await {
            warn!("⚠️ 切回主窗口失败: {}", e);
            return Err(e);
        }
        result
    }
}

/// 最后手段：脚本点击已知的确认按钮
pub struct ScriptedAccept {
    pub accept: Locator,
}

#[async_trait]
impl ConfirmStrategy for ScriptedAccept {
    fn name(&self) -> &str {
        "脚本点击确认按钮"
    }

    async fn attempt(&self, session: &dyn Session) -> AppResult<bool> {
        session.scripted_click(&self.accept).await?;
        Ok(true)
    }
}
