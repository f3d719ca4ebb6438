//! JS 执行器 - 基础设施层
//!
//! 包装一个页面，只暴露"执行 JS"的能力

use std::time::Duration;

use chromiumoxide::Page;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use crate::error::{AppError, AppResult};

/// 原生对话框打开时 Runtime.evaluate 会一直挂起，必须有上限
const EVAL_TIMEOUT: Duration = Duration::from_secs(30);

/// JS 执行器
///
/// 职责：
/// - 持有一个 Page
/// - 暴露 eval() 能力
/// - 不认识 Record / 表单
#[derive(Clone)]
pub struct JsExecutor {
    page: Page,
}

impl JsExecutor {
    /// 创建新的 JS 执行器
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    /// 获取 page 的引用（用于其他操作）
    pub fn page(&self) -> &Page {
        &self.page
    }

    /// 执行 JS 代码并返回 JSON 结果
    pub async fn eval(&self, js_code: impl Into<String>) -> AppResult<JsonValue> {
        let evaluation = tokio::time::timeout(EVAL_TIMEOUT, self.page.evaluate(js_code.into()))
            .await
            .map_err(|_| AppError::Browser("脚本执行超时（可能有未处理的对话框）".to_string()))??;
        // 无返回值的脚本得到 undefined，统一视为 null
        Ok(evaluation.into_value().unwrap_or(JsonValue::Null))
    }

    /// 执行 JS 代码并反序列化为指定类型
    pub async fn eval_as<T: DeserializeOwned>(&self, js_code: impl Into<String>) -> AppResult<T> {
        let json_value = self.eval(js_code).await?;
        let typed_value = serde_json::from_value(json_value)?;
        Ok(typed_value)
    }
}
