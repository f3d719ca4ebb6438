use chrono::NaiveDate;

use crate::error::ValidationError;
use crate::models::tax_category::TaxCategory;
use crate::utils::fill_template;

/// 税号应有的位数
pub const TAX_ID_DIGITS: usize = 11;

/// 一条待开票记录
///
/// 由记录源适配器构造，处理成功后只会被改动 `completed` 字段，
/// 随后经适配器回写，不会跨运行保存在内存中。
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub client: String,
    /// 规范化后的税号（仅数字）
    pub tax_id: String,
    pub tax_category: TaxCategory,
    pub amount: f64,
    pub tax_amount: f64,
    /// 结算/批次编号
    pub batch_ref: String,
    pub issue_date: NaiveDate,
    /// 期间标签，例如 "Mayo"
    pub period: String,
    pub completed: bool,
    /// 在数据源中的位置（用于回写）
    pub position: usize,
}

impl Record {
    /// 稳定的记录标识，用于诊断与隔离
    pub fn key(&self) -> String {
        format!("row:{}", self.position)
    }

    /// 校验数据约束
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.client.trim().is_empty() {
            return Err(ValidationError::EmptyClient);
        }

        let digits = normalize_tax_id(&self.tax_id);
        if digits.len() != TAX_ID_DIGITS {
            return Err(ValidationError::TaxIdLength {
                raw: self.tax_id.clone(),
                digits: digits.len(),
            });
        }

        // NaN 也会在这里被拒绝
        if !(self.amount.is_finite() && self.amount > 0.0) {
            return Err(ValidationError::NonPositiveAmount(self.amount.to_string()));
        }

        if self.batch_ref.trim().is_empty() {
            return Err(ValidationError::EmptyBatchRef);
        }

        if self.period.trim().is_empty() {
            return Err(ValidationError::EmptyPeriod);
        }

        Ok(())
    }

    /// 按模板生成明细描述，支持 `{period}` 与 `{batch}` 占位符
    pub fn line_description(&self, template: &str) -> String {
        fill_template(
            template,
            &[("period", self.period.trim()), ("batch", self.batch_ref.trim())],
        )
    }

    /// 表单中填写的金额文本
    pub fn amount_text(&self) -> String {
        format!("{:.2}", self.amount)
    }
}

impl std::fmt::Display for Record {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (CUIT {})", self.client, self.tax_id)
    }
}

/// 税号规范化：去掉表格导出的 ".0" 尾巴，再去掉所有非数字字符
///
/// 不做截断，位数不符交给 [`Record::validate`] 判断。
pub fn normalize_tax_id(raw: &str) -> String {
    let trimmed = raw.trim();
    let without_float = trimmed.strip_suffix(".0").unwrap_or(trimmed);
    without_float.chars().filter(|c| c.is_ascii_digit()).collect()
}
