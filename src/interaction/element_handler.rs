//! 元素操作能力
//!
//! 只关心"一个控件"，不认识记录与流程。

use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::InteractionPolicy;
use crate::error::AppError;
use crate::infrastructure::{Control, Locator, Session};
use crate::interaction::outcome::ActionOutcome;
use crate::utils::wait_until;

/// 控件操作器
///
/// 借用会话，按 `InteractionPolicy` 重试。
pub struct ElementHandler<'a> {
    session: &'a dyn Session,
    policy: &'a InteractionPolicy,
}

impl<'a> ElementHandler<'a> {
    pub fn new(session: &'a dyn Session, policy: &'a InteractionPolicy) -> Self {
        Self { session, policy }
    }

    /// 点击控件
    ///
    /// 每次尝试：等待可操作 → 原生点击；失败时立即执行替代脚本（若有）；
    /// 都失败则固定退避后重试，直到用完尝试次数。
    pub async fn click(&self, control: &Control, description: &str) -> ActionOutcome {
        let locator = &control.locator;
        let mut last_cause = String::new();

        for attempt in 1..=self.policy.attempts {
            debug!("点击 {} ({}) 第 {} 次尝试", description, locator, attempt);

            if self.wait_actionable(locator, self.policy.wait_timeout).await {
                match self.session.click(locator).await {
                    Ok(()) => return ActionOutcome::ok(),
                    Err(e) => last_cause = e.to_string(),
                }
            } else {
                last_cause = AppError::TransientInteraction {
                    description: description.to_string(),
                    cause: format!("{} 在 {:?} 内不可操作", locator, self.policy.wait_timeout),
                }
                .to_string();
            }

            if let Some(script) = &control.script {
                match self.session.run_script(script).await {
                    Ok(_) => {
                        debug!("{} 已通过脚本替代完成", description);
                        return ActionOutcome::ok();
                    }
                    Err(e) => last_cause = format!("{}; 替代脚本失败: {}", last_cause, e),
                }
            }

            warn!(
                "⚠️ 点击 {} 失败 ({}/{}): {}",
                description, attempt, self.policy.attempts, last_cause
            );
            if attempt < self.policy.attempts {
                sleep(self.policy.backoff).await;
            }
        }

        ActionOutcome::failed(AppError::exhausted(description, last_cause).to_string())
    }

    /// 单次激活：原生点击 → 脚本点击（执行 onclick）→ 指针手势
    pub async fn activate(&self, locator: &Locator, description: &str) -> ActionOutcome {
        let mut causes = Vec::new();

        match self.session.click(locator).await {
            Ok(()) => return ActionOutcome::ok(),
            Err(e) => causes.push(format!("原生点击: {}", e)),
        }
        debug!("{} 原生点击失败，改用脚本点击", description);

        match self.session.scripted_click(locator).await {
            Ok(()) => return ActionOutcome::ok(),
            Err(e) => causes.push(format!("脚本点击: {}", e)),
        }
        debug!("{} 脚本点击失败，改用指针手势", description);

        match self.session.pointer_click(locator).await {
            Ok(()) => return ActionOutcome::ok(),
            Err(e) => causes.push(format!("指针手势: {}", e)),
        }

        ActionOutcome::failed(AppError::exhausted(description, causes.join("; ")).to_string())
    }

    /// 选择下拉选项
    ///
    /// 先做类型检查的选择，失败则底层赋值并触发 change 事件。
    pub async fn select(&self, locator: &Locator, value: &str, description: &str) -> ActionOutcome {
        if !self.wait_for_presence(locator, self.policy.wait_timeout).await {
            return ActionOutcome::failed(format!("{}: 找不到下拉框 {}", description, locator));
        }

        let typed_cause = match self.session.select_option(locator, value).await {
            Ok(()) => return ActionOutcome::ok(),
            Err(e) => e.to_string(),
        };
        debug!(
            "{} 直接选择 '{}' 失败 ({})，改用赋值",
            description, value, typed_cause
        );

        match self.session.assign_value(locator, value).await {
            Ok(()) => ActionOutcome::ok(),
            Err(e) => ActionOutcome::failed(
                AppError::exhausted(
                    description,
                    format!("选择: {}; 赋值: {}", typed_cause, e),
                )
                .to_string(),
            ),
        }
    }

    /// 清空并输入文本（值会先去除首尾空白）
    pub async fn input(&self, locator: &Locator, value: &str, description: &str) -> ActionOutcome {
        if !self.wait_for_presence(locator, self.policy.wait_timeout).await {
            return ActionOutcome::failed(format!("{}: 找不到输入框 {}", description, locator));
        }

        match self.session.clear_and_type(locator, value.trim()).await {
            Ok(()) => ActionOutcome::ok(),
            Err(e) => ActionOutcome::failed(format!("{}: 输入失败: {}", description, e)),
        }
    }

    /// 输入后回读，值不一致视为失败
    pub async fn input_verified(
        &self,
        locator: &Locator,
        value: &str,
        description: &str,
    ) -> ActionOutcome {
        let outcome = self.input(locator, value, description).await;
        if !outcome.is_ok() {
            return outcome;
        }

        let expected = value.trim();
        match self.session.probe(locator).await {
            Ok(state) if state.value.as_deref().map(str::trim) == Some(expected) => {
                ActionOutcome::ok()
            }
            Ok(state) => ActionOutcome::failed(format!(
                "{}: 回读值 {:?} 与期望 '{}' 不一致",
                description, state.value, expected
            )),
            Err(e) => ActionOutcome::failed(format!("{}: 回读失败: {}", description, e)),
        }
    }

    /// 控件当前是否存在（缺失或探测失败都返回 false）
    pub async fn exists(&self, locator: &Locator) -> bool {
        self.session
            .probe(locator)
            .await
            .map(|state| state.present)
            .unwrap_or(false)
    }

    /// 等待控件出现
    pub async fn wait_for_presence(&self, locator: &Locator, timeout: Duration) -> bool {
        wait_until(timeout, self.policy.poll_interval, || self.exists(locator)).await
    }

    /// 等待控件可见且可用
    pub async fn wait_actionable(&self, locator: &Locator, timeout: Duration) -> bool {
        wait_until(timeout, self.policy.poll_interval, || async {
            self.session
                .probe(locator)
                .await
                .map(|state| state.actionable())
                .unwrap_or(false)
        })
        .await
    }

    /// 等待控件文本包含 `text`
    pub async fn wait_for_text(&self, locator: &Locator, text: &str, timeout: Duration) -> bool {
        wait_until(timeout, self.policy.poll_interval, || async {
            match self.session.probe(locator).await {
                Ok(state) => state.text.as_deref().is_some_and(|t| t.contains(text)),
                Err(_) => false,
            }
        })
        .await
    }
}
