use phf::phf_map;

/// 税务类别（对方的增值税身份）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum TaxCategory {
    /// Responsable Inscripto
    #[serde(rename = "RI")]
    RegisteredTaxpayer,
    /// Monotributista
    #[serde(rename = "M")]
    Monotax,
    /// Consumidor Final
    #[serde(rename = "CF")]
    FinalConsumer,
    /// Exento
    #[serde(rename = "E")]
    Exempt,
}

/// 票据子类型（A / B）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentSubtype {
    A,
    B,
}

static CATEGORY_ALIASES: phf::Map<&'static str, TaxCategory> = phf_map! {
    "RI" => TaxCategory::RegisteredTaxpayer,
    "RESPONSABLE INSCRIPTO" => TaxCategory::RegisteredTaxpayer,
    "M" => TaxCategory::Monotax,
    "MONOTRIBUTO" => TaxCategory::Monotax,
    "MONOTRIBUTISTA" => TaxCategory::Monotax,
    "CF" => TaxCategory::FinalConsumer,
    "CONSUMIDOR FINAL" => TaxCategory::FinalConsumer,
    "E" => TaxCategory::Exempt,
    "EXENTO" => TaxCategory::Exempt,
};

impl TaxCategory {
    /// 短代码
    pub fn code(self) -> &'static str {
        match self {
            TaxCategory::RegisteredTaxpayer => "RI",
            TaxCategory::Monotax => "M",
            TaxCategory::FinalConsumer => "CF",
            TaxCategory::Exempt => "E",
        }
    }

    /// 远程表单中"增值税条件"下拉框的取值
    pub fn condition_code(self) -> &'static str {
        match self {
            TaxCategory::RegisteredTaxpayer => "1",
            TaxCategory::Monotax => "6",
            TaxCategory::FinalConsumer => "5",
            TaxCategory::Exempt => "4",
        }
    }

    /// RI / M 开 A 类票据，其余开 B 类
    pub fn document_subtype(self) -> DocumentSubtype {
        match self {
            TaxCategory::RegisteredTaxpayer | TaxCategory::Monotax => DocumentSubtype::A,
            TaxCategory::FinalConsumer | TaxCategory::Exempt => DocumentSubtype::B,
        }
    }

    /// B 类票据需要额外选择固定税率
    pub fn requires_tax_rate(self) -> bool {
        self.document_subtype() == DocumentSubtype::B
    }

    /// 尝试从字符串解析（忽略大小写与首尾空白）
    pub fn from_str(s: &str) -> Option<Self> {
        let normalized = s.trim().to_uppercase();
        CATEGORY_ALIASES.get(normalized.as_str()).copied()
    }
}

impl std::fmt::Display for TaxCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}
