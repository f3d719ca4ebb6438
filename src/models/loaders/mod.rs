pub mod toml_store;

use async_trait::async_trait;

use crate::error::AppResult;
use crate::models::record::Record;

pub use toml_store::TomlRecordStore;

/// 记录源适配器
///
/// - `fetch_pending`：按数据源顺序返回尚未完成的记录
/// - `mark_complete`：回写完成标记，同一记录重复调用必须幂等
#[async_trait]
pub trait RecordSource: Send + Sync {
    async fn fetch_pending(&self) -> AppResult<Vec<Record>>;

    async fn mark_complete(&self, record: &Record) -> AppResult<()>;
}
