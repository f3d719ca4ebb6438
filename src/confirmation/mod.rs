//! 确认处理 - 能力层
//!
//! 提交后的确认可能以原生对话框、弹出窗口或页面内按钮出现，
//! 按固定顺序尝试各策略，直到其中一个成功。

pub mod resolver;
pub mod strategies;

pub use resolver::ConfirmationResolver;
pub use strategies::{
    AwaitNativeDialog, ConfirmStrategy, NativeDialogPresent, ScriptedAccept, SecondaryWindow,
};
