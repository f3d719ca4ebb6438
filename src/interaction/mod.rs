//! 交互层 - 能力层
//!
//! 对单个远程控件执行点击、选择、输入，带有限次重试和有序回退。
//! 所有操作返回 `ActionOutcome`，从不因控件缺失而报错。

pub mod element_handler;
pub mod outcome;

pub use element_handler::ElementHandler;
pub use outcome::ActionOutcome;
