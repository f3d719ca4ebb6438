use thiserror::Error;

/// 应用程序错误类型
///
/// 变体与失败分类一一对应：
/// 单条记录内的失败（交互、确认、文件、持久化）只影响当前记录，
/// 只有 `SessionLost` 会终止整个运行。
#[derive(Debug, Error)]
pub enum AppError {
    /// 控件暂时不可操作（仍在重试预算内）
    #[error("控件暂不可操作 ({description}): {cause}")]
    TransientInteraction { description: String, cause: String },

    /// 某次交互的所有回退策略均已失败
    #[error("所有策略均失败 ({description}): {cause}")]
    StrategyExhausted { description: String, cause: String },

    /// 交互失败，诊断文本已包含操作描述
    #[error("{0}")]
    Interaction(String),

    /// 没有任何确认策略能关闭对话框
    #[error("确认对话框未能处理: {0}")]
    ConfirmationUnresolved(String),

    /// 超时内未发现新生成的文件
    #[error("未在 {dir} 中检测到新文件 (等待 {waited_ms} ms)")]
    ArtifactNotFound { dir: String, waited_ms: u128 },

    /// 完成标记回写失败
    #[error("回写完成标记失败 ({record}): {cause}")]
    Persistence { record: String, cause: String },

    /// 远程会话本身不可用
    #[error("浏览器会话已丢失: {0}")]
    SessionLost(String),

    /// 浏览器相关错误
    #[error("浏览器错误: {0}")]
    Browser(String),

    /// 文件操作错误
    #[error("文件错误 ({path}): {source}")]
    File {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// 配置错误
    #[error("配置错误: {0}")]
    Config(String),

    /// 其他错误
    #[error("错误: {0}")]
    Other(String),
}

/// 记录校验错误，指明违反约束的字段
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("客户名称为空")]
    EmptyClient,
    #[error("税号 '{raw}' 规范化后为 {digits} 位，应为 11 位")]
    TaxIdLength { raw: String, digits: usize },
    #[error("金额必须大于 0 (当前: {0})")]
    NonPositiveAmount(String),
    #[error("无效的税务类别: '{0}'")]
    UnknownTaxCategory(String),
    #[error("结算编号为空")]
    EmptyBatchRef,
    #[error("期间为空")]
    EmptyPeriod,
}

// ========== 从常见错误类型转换 ==========

impl From<chromiumoxide::error::CdpError> for AppError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        AppError::Browser(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Other(format!("JSON解析失败: {}", err))
    }
}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        AppError::Config(format!("TOML解析失败: {}", err))
    }
}

impl From<toml::ser::Error> for AppError {
    fn from(err: toml::ser::Error) -> Self {
        AppError::Other(format!("TOML序列化失败: {}", err))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::File {
            path: String::new(),
            source: err,
        }
    }
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建带路径的文件错误
    pub fn file(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        AppError::File {
            path: path.as_ref().display().to_string(),
            source,
        }
    }

    /// 创建策略耗尽错误
    pub fn exhausted(description: impl Into<String>, cause: impl Into<String>) -> Self {
        AppError::StrategyExhausted {
            description: description.into(),
            cause: cause.into(),
        }
    }

    /// 是否为致命错误（需要终止整个运行）
    pub fn is_fatal(&self) -> bool {
        matches!(self, AppError::SessionLost(_))
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
