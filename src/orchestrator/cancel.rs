//! 协作式取消
//!
//! 只在两条记录之间检查，不会打断正在执行的步骤。

use tokio::sync::watch;
use tracing::{info, warn};

/// 取消信号（只读端）
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

/// 取消信号（触发端）
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

/// 创建一对取消信号
pub fn cancel_pair() -> (CancelHandle, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelSignal { rx })
}

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

impl CancelSignal {
    /// 永远不会被触发的信号
    pub fn never() -> Self {
        cancel_pair().1
    }

    /// 收到 Ctrl+C 时触发
    pub fn from_ctrl_c() -> Self {
        let (handle, signal) = cancel_pair();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("🛑 收到中断信号，当前记录处理完后停止");
                    handle.cancel();
                }
                Err(e) => warn!("⚠️ 无法监听中断信号: {}", e),
            }
        });
        signal
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }
}
