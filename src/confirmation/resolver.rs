use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info};

use crate::config::{FormLayout, InteractionPolicy, Timings};
use crate::confirmation::strategies::{
    AwaitNativeDialog, ConfirmStrategy, NativeDialogPresent, ScriptedAccept, SecondaryWindow,
};
use crate::error::AppError;
use crate::infrastructure::Session;
use crate::interaction::ActionOutcome;
use crate::utils::logging::clip_text;

const DIALOG_LOG_CHARS: usize = 120;

/// 确认处理器
///
/// 先等待一小段时间让页面稳定，再按顺序尝试各策略，
/// 第一个成功的策略之后不再尝试其他策略。
pub struct ConfirmationResolver {
    strategies: Vec<Box<dyn ConfirmStrategy>>,
    settle: Duration,
}

impl ConfirmationResolver {
    pub fn new(strategies: Vec<Box<dyn ConfirmStrategy>>, settle: Duration) -> Self {
        Self { strategies, settle }
    }

    /// 标准顺序：已打开对话框 → 等待对话框 → 弹出窗口 → 脚本点击
    pub fn from_layout(layout: &FormLayout, timings: &Timings, policy: &InteractionPolicy) -> Self {
        Self::new(
            vec![
                Box::new(NativeDialogPresent),
                Box::new(AwaitNativeDialog {
                    timeout: timings.dialog_timeout,
                    interval: policy.poll_interval,
                }),
                Box::new(SecondaryWindow {
                    accept: layout.popup_accept.clone(),
                    timeout: timings.dialog_timeout,
                    interval: policy.poll_interval,
                }),
                Box::new(ScriptedAccept {
                    accept: layout.scripted_accept.clone(),
                }),
            ],
            timings.confirm_settle,
        )
    }

    /// 处理确认
    pub async fn resolve(&self, session: &dyn Session) -> ActionOutcome {
        sleep(self.settle).await;

        let mut causes = Vec::new();
        for strategy in &self.strategies {
            match strategy.attempt(session).await {
                Ok(true) => {
                    info!("✓ 确认已处理（{}）", strategy.name());
                    return ActionOutcome::ok();
                }
                Ok(false) => {
                    debug!("确认策略 {} 不适用", strategy.name());
                    causes.push(format!("{}: 不适用", strategy.name()));
                }
                Err(e) => {
                    debug!("确认策略 {} 失败: {}", strategy.name(), e);
                    causes.push(format!("{}: {}", strategy.name(), e));
                }
            }
        }

        ActionOutcome::failed(AppError::ConfirmationUnresolved(causes.join("; ")).to_string())
    }

    /// 处理错误提示类对话框，同时返回其显示的文本
    pub async fn resolve_error_dialog(
        &self,
        session: &dyn Session,
    ) -> (ActionOutcome, Option<String>) {
        let message = session.dialog_message().await.ok().flatten();
        if let Some(text) = &message {
            info!("页面提示: {}", clip_text(text, DIALOG_LOG_CHARS));
        }
        let outcome = self.resolve(session).await;
        (outcome, message)
    }
}
