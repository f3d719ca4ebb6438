//! 发票处理上下文
//!
//! 封装"我正在处理第几轮的第几条记录"这一信息

use std::fmt::Display;

use crate::models::Record;

/// 单条记录的处理上下文（只用于日志与诊断）
#[derive(Debug, Clone)]
pub struct InvoiceCtx {
    /// 第几轮（从 1 开始）
    pub pass: usize,
    /// 本轮中的序号（从 1 开始）
    pub index: usize,
    /// 本轮待处理总数
    pub total: usize,
    /// 记录标识
    pub record_key: String,
    pub client: String,
}

impl InvoiceCtx {
    pub fn new(pass: usize, index: usize, total: usize, record: &Record) -> Self {
        Self {
            pass,
            index,
            total,
            record_key: record.key(),
            client: record.client.trim().to_string(),
        }
    }
}

impl Display for InvoiceCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[发票 #{}/{} {}]", self.index, self.total, self.client)
    }
}
