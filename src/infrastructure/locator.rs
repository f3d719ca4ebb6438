//! 控件定位描述
//!
//! 只描述"在远程页面的哪里"，不持有任何页面资源。

use serde::{Deserialize, Serialize};
use std::fmt;

/// 远程页面控件的定位方式
///
/// 在 TOML 中写作 `{ id = "fc" }`、`{ xpath = "//input" }` 等。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Locator {
    /// 稳定的元素 ID
    Id(String),
    /// 链接文本（完全匹配，忽略首尾空白）
    LinkText(String),
    /// 结构路径
    #[serde(rename = "xpath")]
    XPath(String),
    /// CSS 选择器
    Css(String),
}

impl Locator {
    pub fn id(value: impl Into<String>) -> Self {
        Locator::Id(value.into())
    }

    pub fn link_text(value: impl Into<String>) -> Self {
        Locator::LinkText(value.into())
    }

    pub fn xpath(value: impl Into<String>) -> Self {
        Locator::XPath(value.into())
    }

    pub fn css(value: impl Into<String>) -> Self {
        Locator::Css(value.into())
    }

    /// CSS 形式（ID 与 CSS 可用），用于原生查找
    pub fn as_css(&self) -> Option<String> {
        match self {
            Locator::Id(id) => Some(format!("[id=\"{}\"]", id.replace('"', "\\\""))),
            Locator::Css(css) => Some(css.clone()),
            _ => None,
        }
    }

    /// XPath 形式（链接文本与 XPath 可用），用于原生查找
    pub fn as_xpath(&self) -> Option<String> {
        match self {
            Locator::XPath(xpath) => Some(xpath.clone()),
            Locator::LinkText(text) => Some(format!(
                "//a[normalize-space(.)={}]",
                xpath_literal(text.trim())
            )),
            _ => None,
        }
    }

    /// 生成在页面中查找该元素的 JS 表达式，找不到时结果为 `null`
    pub fn js_lookup(&self) -> String {
        match self {
            Locator::Id(id) => format!("document.getElementById({})", js_string(id)),
            Locator::Css(css) => format!("document.querySelector({})", js_string(css)),
            Locator::XPath(_) | Locator::LinkText(_) => {
                let xpath = self.as_xpath().unwrap_or_default();
                format!(
                    "document.evaluate({}, document, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue",
                    js_string(&xpath)
                )
            }
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Id(v) => write!(f, "id={}", v),
            Locator::LinkText(v) => write!(f, "link={}", v),
            Locator::XPath(v) => write!(f, "xpath={}", v),
            Locator::Css(v) => write!(f, "css={}", v),
        }
    }
}

/// 定位 + 可选的脚本替代动作
///
/// 主动作（真实点击）失败时，执行 `script` 达到相同效果。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Control {
    pub locator: Locator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
}

impl Control {
    pub fn new(locator: Locator) -> Self {
        Self {
            locator,
            script: None,
        }
    }

    pub fn with_script(mut self, script: impl Into<String>) -> Self {
        self.script = Some(script.into());
        self
    }
}

/// 作为 JS 字符串字面量输出
pub fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

/// XPath 字符串字面量
///
/// XPath 1.0 没有转义：含双引号时改用单引号，两种引号都有时拆成 `concat()`。
fn xpath_literal(value: &str) -> String {
    match (value.contains('"'), value.contains('\'')) {
        (false, _) => format!("\"{}\"", value),
        (true, false) => format!("'{}'", value),
        (true, true) => {
            let parts: Vec<String> = value.split('"').map(|p| format!("\"{}\"", p)).collect();
            format!("concat({})", parts.join(", '\"', "))
        }
    }
}
