//! 基于 DevTools 协议的会话实现
//!
//! 唯一持有 Browser 和页面的地方。

use std::path::Path;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::page::{
    CaptureScreenshotFormat, EventJavascriptDialogClosed, EventJavascriptDialogOpening,
    HandleJavaScriptDialogParams,
};
use chromiumoxide::element::Element;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::{Browser, Page};
use futures::StreamExt;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::{AppError, AppResult};
use crate::infrastructure::dialog::DialogWatch;
use crate::infrastructure::js_executor::JsExecutor;
use crate::infrastructure::locator::Locator;
use crate::infrastructure::scripts;
use crate::infrastructure::session::{ControlInfo, ElementState, Session};

/// 指针手势中移动与按下之间的停顿
const POINTER_PAUSE: Duration = Duration::from_millis(300);

const HEALTH_TIMEOUT: Duration = Duration::from_secs(10);

/// 页面脚本的统一返回结构
#[derive(Debug, Deserialize)]
struct ScriptReply {
    ok: bool,
    #[serde(default)]
    reason: String,
}

/// DevTools 会话
pub struct CdpSession {
    browser: Browser,
    primary: Page,
    /// 当前上下文所在页面
    active: RwLock<JsExecutor>,
    /// 主页面上打开且尚未关闭的原生对话框
    dialogs: DialogWatch,
}

impl CdpSession {
    /// 接管浏览器与主页面，并开始监听原生对话框事件
    pub async fn attach(browser: Browser, page: Page) -> AppResult<Self> {
        let dialogs = DialogWatch::new();
        watch_dialogs(&page, dialogs.clone()).await?;

        Ok(Self {
            browser,
            active: RwLock::new(JsExecutor::new(page.clone())),
            primary: page,
            dialogs,
        })
    }

    fn executor(&self) -> JsExecutor {
        match self.active.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    async fn find(&self, locator: &Locator) -> AppResult<Element> {
        self.dialogs.ensure_clear()?;
        let executor = self.executor();
        let page = executor.page();
        if let Some(css) = locator.as_css() {
            Ok(page.find_element(css).await?)
        } else if let Some(xpath) = locator.as_xpath() {
            Ok(page.find_xpath(xpath).await?)
        } else {
            Err(AppError::Browser(format!("无法解析定位: {}", locator)))
        }
    }

    async fn run_reply_script(&self, script: String, action: &str) -> AppResult<()> {
        self.dialogs.ensure_clear()?;
        let reply: ScriptReply = self.executor().eval_as(script).await?;
        if reply.ok {
            Ok(())
        } else {
            Err(AppError::Browser(format!("{} 失败: {}", action, reply.reason)))
        }
    }
}

/// 在后台记录对话框的打开与关闭
async fn watch_dialogs(page: &Page, dialogs: DialogWatch) -> AppResult<()> {
    let mut opened = page.event_listener::<EventJavascriptDialogOpening>().await?;
    let mut closed = page.event_listener::<EventJavascriptDialogClosed>().await?;

    let on_open = dialogs.clone();
    tokio::spawn(async move {
        while let Some(event) = opened.next().await {
            debug!("检测到原生对话框: {}", event.message);
            on_open.opened(event.message.clone());
        }
    });

    tokio::spawn(async move {
        while closed.next().await.is_some() {
            dialogs.closed();
        }
    });

    Ok(())
}

#[async_trait]
impl Session for CdpSession {
    async fn navigate(&self, url: &str) -> AppResult<()> {
        self.executor().page().goto(url).await?;
        Ok(())
    }

    async fn probe(&self, locator: &Locator) -> AppResult<ElementState> {
        self.dialogs.ensure_clear()?;
        self.executor().eval_as(scripts::probe(locator)).await
    }

    async fn click(&self, locator: &Locator) -> AppResult<()> {
        let element = self.find(locator).await?;
        self.dialogs
            .race(async {
                element.click().await?;
                Ok::<(), AppError>(())
            })
            .await?;
        Ok(())
    }

    async fn pointer_click(&self, locator: &Locator) -> AppResult<()> {
        let element = self.find(locator).await?;
        let point = element.scroll_into_view().await?.clickable_point().await?;

        let executor = self.executor();
        executor.page().move_mouse(point).await?;
        sleep(POINTER_PAUSE).await;
        self.dialogs
            .race(async {
                executor.page().click(point).await?;
                Ok::<(), AppError>(())
            })
            .await?;
        Ok(())
    }

    async fn scripted_click(&self, locator: &Locator) -> AppResult<()> {
        self.dialogs
            .race(self.run_reply_script(scripts::scripted_click(locator), "脚本点击"))
            .await?;
        Ok(())
    }

    async fn run_script(&self, script: &str) -> AppResult<JsonValue> {
        let executor = self.executor();
        let value = self.dialogs.race(executor.eval(script)).await?;
        Ok(value.unwrap_or(JsonValue::Null))
    }

    async fn select_option(&self, locator: &Locator, value: &str) -> AppResult<()> {
        // change 事件里的校验也可能弹出对话框
        self.dialogs
            .race(self.run_reply_script(scripts::typed_select(locator, value), "下拉选择"))
            .await?;
        Ok(())
    }

    async fn assign_value(&self, locator: &Locator, value: &str) -> AppResult<()> {
        self.dialogs
            .race(self.run_reply_script(scripts::assign_value(locator, value), "脚本赋值"))
            .await?;
        Ok(())
    }

    async fn clear_and_type(&self, locator: &Locator, value: &str) -> AppResult<()> {
        self.run_reply_script(scripts::clear_and_focus(locator), "清空输入框")
            .await?;
        let element = self.find(locator).await?;
        element.type_str(value).await?;
        Ok(())
    }

    async fn ready_state(&self) -> AppResult<String> {
        self.dialogs.ensure_clear()?;
        self.executor().eval_as(scripts::READY_STATE).await
    }

    async fn dialog_message(&self) -> AppResult<Option<String>> {
        Ok(self.dialogs.message())
    }

    async fn accept_dialog(&self) -> AppResult<()> {
        // 只监听了主页面的对话框
        self.primary
            .execute(HandleJavaScriptDialogParams::new(true))
            .await?;
        self.dialogs.closed();
        Ok(())
    }

    async fn window_handles(&self) -> AppResult<Vec<String>> {
        let pages = self.browser.pages().await?;
        Ok(pages
            .iter()
            .map(|page| page.target_id().inner().clone())
            .collect())
    }

    async fn current_window(&self) -> AppResult<String> {
        Ok(self.executor().page().target_id().inner().clone())
    }

    async fn switch_to_window(&self, handle: &str) -> AppResult<()> {
        let pages = self.browser.pages().await?;
        let page = pages
            .into_iter()
            .find(|page| page.target_id().inner() == handle)
            .ok_or_else(|| AppError::Browser(format!("窗口不存在: {}", handle)))?;

        page.bring_to_front().await?;
        match self.active.write() {
            Ok(mut guard) => *guard = JsExecutor::new(page),
            Err(poisoned) => *poisoned.into_inner() = JsExecutor::new(page),
        }
        debug!("已切换到窗口 {}", handle);
        Ok(())
    }

    async fn screenshot(&self, path: &Path) -> AppResult<()> {
        self.dialogs.ensure_clear()?;
        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .full_page(true)
            .build();
        self.executor().page().save_screenshot(params, path).await?;
        Ok(())
    }

    async fn control_inventory(&self) -> AppResult<Vec<ControlInfo>> {
        self.dialogs.ensure_clear()?;
        self.executor().eval_as(scripts::control_inventory()).await
    }

    async fn is_alive(&self) -> bool {
        // 对话框打开时脚本会挂起，但会话本身仍然可用
        if self.dialogs.message().is_some() {
            return true;
        }
        match tokio::time::timeout(HEALTH_TIMEOUT, self.primary.evaluate("1 + 1")).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                warn!("会话健康检查失败: {}", e);
                false
            }
            Err(_) => {
                warn!("会话健康检查超时");
                false
            }
        }
    }
}
