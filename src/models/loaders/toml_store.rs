//! TOML 记录源
//!
//! 文件格式：
//!
//! ```toml
//! [[rows]]
//! client = "Acme"
//! tax_id = 20123456789
//! tax_category = "RI"
//! amount = "1000,50"
//! tax_amount = 0
//! batch_ref = 45
//! date = 2024-05-01
//! period = "Mayo"
//! completed = false
//! ```

use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use tempfile::NamedTempFile;
use toml_edit::{value, DocumentMut, Item};
use tokio::fs;
use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult, ValidationError};
use crate::models::loaders::RecordSource;
use crate::models::record::{normalize_tax_id, Record};
use crate::models::tax_category::TaxCategory;

/// 视为"已完成"的标记文本
const COMPLETION_MARKERS: &[&str] = &["✓", "true", "x", "si", "sí", "yes"];

/// 基于 TOML 文件的记录源
pub struct TomlRecordStore {
    path: PathBuf,
}

impl TomlRecordStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn read_rows(&self) -> AppResult<Vec<RecordRow>> {
        let content = fs::read_to_string(&self.path)
            .await
            .map_err(|e| AppError::file(&self.path, e))?;
        let file: RecordFile = toml::from_str(&content)?;
        Ok(file.rows)
    }
}

#[async_trait]
impl RecordSource for TomlRecordStore {
    async fn fetch_pending(&self) -> AppResult<Vec<Record>> {
        let rows = self.read_rows().await?;
        let total = rows.len();

        let mut pending = Vec::new();
        for (position, row) in rows.into_iter().enumerate() {
            if row.completed {
                continue;
            }
            if row.client.trim().is_empty() {
                debug!("第 {} 行客户为空，跳过", position);
                continue;
            }

            match row.into_record(position) {
                Ok(record) => pending.push(record),
                Err(reason) => warn!("⚠️ 第 {} 行无法转换为记录: {}", position, reason),
            }
        }

        info!("📋 记录源共 {} 行，待处理 {} 条", total, pending.len());
        Ok(pending)
    }

    async fn mark_complete(&self, record: &Record) -> AppResult<()> {
        let persistence_err = |cause: String| AppError::Persistence {
            record: record.key(),
            cause,
        };

        let content = fs::read_to_string(&self.path)
            .await
            .map_err(|e| persistence_err(e.to_string()))?;
        // 保留原文件的注释与排版，只改这一行的 completed
        let mut doc = content
            .parse::<DocumentMut>()
            .map_err(|e| persistence_err(e.to_string()))?;

        let row = doc
            .get_mut("rows")
            .and_then(Item::as_array_of_tables_mut)
            .and_then(|rows| rows.get_mut(record.position))
            .ok_or_else(|| persistence_err(format!("第 {} 行不存在", record.position)))?;

        if row.get("completed").and_then(Item::as_bool) == Some(true) {
            debug!("{} 已标记为完成，无需重复写入", record.key());
            return Ok(());
        }
        row.insert("completed", value(true));

        atomic_write(&self.path, doc.to_string().as_bytes())
            .map_err(|e| persistence_err(e.to_string()))?;

        info!("✓ {} 已标记为完成", record);
        Ok(())
    }
}

/// 先写临时文件再替换，避免中途失败留下半个文件
fn atomic_write(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[derive(Debug, Deserialize)]
struct RecordFile {
    #[serde(default)]
    rows: Vec<RecordRow>,
}

/// 数据源中的一行（宽松类型）
#[derive(Debug, Clone, Deserialize)]
struct RecordRow {
    #[serde(default)]
    client: String,
    #[serde(default, deserialize_with = "deserialize_text")]
    tax_id: String,
    #[serde(default)]
    tax_category: String,
    #[serde(default, deserialize_with = "deserialize_amount")]
    amount: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_amount")]
    tax_amount: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_text")]
    batch_ref: String,
    #[serde(default)]
    date: Option<toml::Value>,
    #[serde(default)]
    period: String,
    #[serde(default, deserialize_with = "deserialize_marker")]
    completed: bool,
}

impl RecordRow {
    fn into_record(self, position: usize) -> Result<Record, String> {
        let tax_category = TaxCategory::from_str(&self.tax_category).ok_or_else(|| {
            ValidationError::UnknownTaxCategory(self.tax_category.trim().to_string()).to_string()
        })?;
        let amount = self.amount.ok_or("金额缺失或无法解析")?;
        let issue_date = self
            .date
            .as_ref()
            .and_then(parse_date)
            .ok_or_else(|| format!("日期无效: {:?}", self.date))?;

        Ok(Record {
            client: self.client.trim().to_string(),
            tax_id: normalize_tax_id(&self.tax_id),
            tax_category,
            amount,
            tax_amount: self.tax_amount.unwrap_or(0.0),
            batch_ref: self.batch_ref.trim().to_string(),
            issue_date,
            period: self.period.trim().to_string(),
            completed: false,
            position,
        })
    }
}

fn parse_date(value: &toml::Value) -> Option<NaiveDate> {
    match value {
        toml::Value::Datetime(dt) => {
            let date = dt.date?;
            NaiveDate::from_ymd_opt(date.year as i32, date.month as u32, date.day as u32)
        }
        toml::Value::String(s) => {
            let s = s.trim();
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .or_else(|_| NaiveDate::parse_from_str(s, "%d/%m/%Y"))
                .ok()
        }
        _ => None,
    }
}

// Helper functions to deserialize loosely typed spreadsheet cells
fn deserialize_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Visitor;
    use std::fmt;

    struct TextVisitor;

    impl<'de> Visitor<'de> for TextVisitor {
        type Value = String;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a string or number")
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(value.trim().to_string())
        }

        fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(value.to_string())
        }

        fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(value.to_string())
        }

        fn visit_f64<E>(self, value: f64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            if value.fract() == 0.0 {
                Ok(format!("{:.0}", value))
            } else {
                Ok(value.to_string())
            }
        }
    }

    deserializer.deserialize_any(TextVisitor)
}

fn deserialize_amount<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Visitor;
    use std::fmt;

    struct AmountVisitor;

    impl<'de> Visitor<'de> for AmountVisitor {
        type Value = Option<f64>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a number or a decimal string")
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(value.trim().replace(',', ".").parse().ok())
        }

        fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(Some(value as f64))
        }

        fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(Some(value as f64))
        }

        fn visit_f64<E>(self, value: f64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(Some(value))
        }
    }

    deserializer.deserialize_any(AmountVisitor)
}

fn deserialize_marker<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Visitor;
    use std::fmt;

    struct MarkerVisitor;

    impl<'de> Visitor<'de> for MarkerVisitor {
        type Value = bool;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a bool or a completion marker string")
        }

        fn visit_bool<E>(self, value: bool) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(value)
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            let lowered = value.trim().to_lowercase();
            Ok(COMPLETION_MARKERS.contains(&lowered.as_str()))
        }
    }

    deserializer.deserialize_any(MarkerVisitor)
}
