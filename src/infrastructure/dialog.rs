//! 原生对话框状态
//!
//! 浏览器弹出 `alert`/`confirm` 后，触发它的那次点击或脚本调用
//! 要等对话框关闭才会返回。这里把"对话框已打开"当作该操作已完成，
//! 让调用方可以继续去处理对话框。

use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

use crate::error::{AppError, AppResult};

/// 当前打开的原生对话框（克隆共享同一份状态）
#[derive(Debug, Clone)]
pub struct DialogWatch {
    tx: Arc<watch::Sender<Option<String>>>,
}

impl Default for DialogWatch {
    fn default() -> Self {
        Self::new()
    }
}

impl DialogWatch {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    pub fn opened(&self, message: impl Into<String>) {
        self.tx.send_replace(Some(message.into()));
    }

    pub fn closed(&self) {
        self.tx.send_replace(None);
    }

    /// 打开中的对话框文本
    pub fn message(&self) -> Option<String> {
        self.tx.borrow().clone()
    }

    /// 对话框打开期间页面脚本会挂起，此时直接报错而不是等到超时
    pub fn ensure_clear(&self) -> AppResult<()> {
        match self.message() {
            Some(message) => Err(AppError::Browser(format!(
                "页面有未处理的原生对话框: {}",
                message
            ))),
            None => Ok(()),
        }
    }

    /// 执行可能弹出对话框的操作
    ///
    /// 操作先完成时返回 `Some(结果)`；操作期间对话框打开时返回 `None`，
    /// 此时被阻塞的操作会被丢弃。
    pub async fn race<T, F>(&self, action: F) -> AppResult<Option<T>>
    where
        F: Future<Output = AppResult<T>>,
    {
        self.ensure_clear()?;

        let mut rx = self.tx.subscribe();
        let opened = async move {
            let sender_gone = rx.wait_for(Option::is_some).await.is_err();
            if sender_gone {
                std::future::pending::<()>().await;
            }
        };

        tokio::select! {
            result = action => result.map(Some),
            () = opened => {
                debug!("操作触发了原生对话框，视为已完成");
                Ok(None)
            }
        }
    }

    /// 等待对话框关闭
    pub async fn wait_closed(&self) {
        let mut rx = self.tx.subscribe();
        let _ = rx.wait_for(Option::is_none).await;
    }
}
