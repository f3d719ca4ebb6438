use std::fmt;

use crate::error::{AppError, AppResult};

/// 一次交互的结果：成功与否，外加可读的失败原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionOutcome {
    pub success: bool,
    pub diagnostic: Option<String>,
}

impl ActionOutcome {
    pub fn ok() -> Self {
        Self {
            success: true,
            diagnostic: None,
        }
    }

    pub fn failed(diagnostic: impl Into<String>) -> Self {
        Self {
            success: false,
            diagnostic: Some(diagnostic.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.success
    }

    /// 转为 `AppResult`，供流程层用 `?` 中止当前步骤
    pub fn into_result(self) -> AppResult<()> {
        if self.success {
            Ok(())
        } else {
            Err(AppError::Interaction(
                self.diagnostic.unwrap_or_else(|| "交互失败（无诊断信息）".to_string()),
            ))
        }
    }
}

impl fmt::Display for ActionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.success, &self.diagnostic) {
            (true, _) => write!(f, "成功"),
            (false, Some(cause)) => write!(f, "失败: {}", cause),
            (false, None) => write!(f, "失败"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_outcome_keeps_diagnostic() {
        let err = ActionOutcome::failed("点击继续: not found")
            .into_result()
            .unwrap_err();
        assert!(matches!(err, AppError::Interaction(_)));
        assert_eq!(err.to_string(), "点击继续: not found");
        assert!(ActionOutcome::ok().into_result().is_ok());
    }
}
