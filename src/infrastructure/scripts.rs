//! 页面内执行的 JS 片段
//!
//! 所有片段都是自调用表达式，返回可 JSON 序列化的结果。

use crate::infrastructure::locator::{js_string, Locator};

/// 控件状态探测：存在 / 可见 / 可用 / 当前值 / 文本
pub fn probe(locator: &Locator) -> String {
    format!(
        r#"(() => {{
    const el = {lookup};
    if (!el) {{ return {{ present: false, visible: false, enabled: false, value: null, text: null }}; }}
    const style = window.getComputedStyle(el);
    const rect = el.getBoundingClientRect();
    const visible = style.display !== 'none' && style.visibility !== 'hidden' && (rect.width > 0 || rect.height > 0);
    return {{
        present: true,
        visible: visible,
        enabled: !el.disabled,
        value: (el.value === undefined || el.value === null) ? null : String(el.value),
        text: el.innerText === undefined ? el.textContent : el.innerText
    }};
}})()"#,
        lookup = locator.js_lookup()
    )
}

/// 类型检查的下拉选择：必须是 SELECT 且存在该选项
pub fn typed_select(locator: &Locator, value: &str) -> String {
    format!(
        r#"(() => {{
    const el = {lookup};
    if (!el) {{ return {{ ok: false, reason: 'not found' }}; }}
    if (el.tagName !== 'SELECT') {{ return {{ ok: false, reason: 'not a select: ' + el.tagName }}; }}
    el.scrollIntoView(true);
    const option = Array.from(el.options).find(o => o.value === {value});
    if (!option) {{ return {{ ok: false, reason: 'no option ' + {value} }}; }}
    option.selected = true;
    el.dispatchEvent(new Event('change', {{ bubbles: true }}));
    return {{ ok: el.value === {value}, reason: 'value is ' + el.value }};
}})()"#,
        lookup = locator.js_lookup(),
        value = js_string(value)
    )
}

/// 底层赋值 + 合成 change 事件，让页面的联动逻辑照常触发
pub fn assign_value(locator: &Locator, value: &str) -> String {
    format!(
        r#"(() => {{
    const el = {lookup};
    if (!el) {{ return {{ ok: false, reason: 'not found' }}; }}
    el.value = {value};
    el.dispatchEvent(new Event('change'));
    return {{ ok: true, reason: '' }};
}})()"#,
        lookup = locator.js_lookup(),
        value = js_string(value)
    )
}

/// 清空输入框并聚焦
pub fn clear_and_focus(locator: &Locator) -> String {
    format!(
        r#"(() => {{
    const el = {lookup};
    if (!el) {{ return {{ ok: false, reason: 'not found' }}; }}
    el.scrollIntoView(true);
    el.value = '';
    el.focus();
    return {{ ok: true, reason: '' }};
}})()"#,
        lookup = locator.js_lookup()
    )
}

/// 脚本点击：优先执行控件自身的 onclick，否则调用 click()
pub fn scripted_click(locator: &Locator) -> String {
    format!(
        r#"(() => {{
    const el = {lookup};
    if (!el) {{ return {{ ok: false, reason: 'not found' }}; }}
    const handler = el.getAttribute('onclick');
    if (handler) {{ new Function(handler).call(el); }} else {{ el.click(); }}
    return {{ ok: true, reason: handler ? 'onclick' : 'click()' }};
}})()"#,
        lookup = locator.js_lookup()
    )
}

/// 页面上所有 input 控件的概况，用于诊断
pub fn control_inventory() -> &'static str {
    r#"(() => Array.from(document.getElementsByTagName('input')).map(el => ({
    kind: el.getAttribute('type'),
    value: el.value === undefined ? null : String(el.value),
    onclick: el.getAttribute('onclick'),
    id: el.id || null,
    class: el.className || null,
    visible: el.offsetParent !== null,
    enabled: !el.disabled
})))()"#
}

/// 文档加载状态
pub const READY_STATE: &str = "document.readyState";
