//! 测试用的内存会话与记录源
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value as JsonValue;

use invoice_submit::config::{ArtifactSettings, FormLayout, InteractionPolicy, Timings};
use invoice_submit::error::{AppError, AppResult};
use invoice_submit::infrastructure::{ControlInfo, DialogWatch, ElementState, Locator, Session};
use invoice_submit::models::{Record, RecordSource, TaxCategory};

pub const MAIN_WINDOW: &str = "main";

/// 会话上发生过的动作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Navigate(String),
    Click(Locator),
    PointerClick(Locator),
    ScriptedClick(Locator),
    Script(String),
    Select(Locator, String),
    Assign(Locator, String),
    Type(Locator, String),
    AcceptDialog,
    SwitchWindow(String),
    Screenshot(PathBuf),
}

impl Action {
    /// 动作作用的控件
    pub fn target(&self) -> Option<&Locator> {
        match self {
            Action::Click(l)
            | Action::PointerClick(l)
            | Action::ScriptedClick(l)
            | Action::Select(l, _)
            | Action::Assign(l, _)
            | Action::Type(l, _) => Some(l),
            _ => None,
        }
    }
}

/// 点击某个控件后触发的页面效果
#[derive(Debug, Clone)]
pub enum Effect {
    /// 在目录中生成文件（模拟下载）
    CreateFile(PathBuf),
    /// 打开原生对话框
    OpenDialog(String),
    /// 打开弹出窗口，窗口中有一个确认按钮
    OpenWindow { handle: String, accept: Locator },
}

/// 点击的三条路径
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClickPath {
    Direct,
    Scripted,
    Pointer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Select,
    Input,
    Button,
}

#[derive(Debug, Clone)]
struct MockControl {
    kind: Kind,
    visible: bool,
    enabled: bool,
    value: Option<String>,
}

impl MockControl {
    fn new(kind: Kind) -> Self {
        Self {
            kind,
            visible: true,
            enabled: true,
            value: None,
        }
    }
}

#[derive(Debug)]
struct MockState {
    controls: HashMap<(String, Locator), MockControl>,
    effects: HashMap<Locator, Vec<Effect>>,
    broken_selects: HashSet<Locator>,
    broken_clicks: HashSet<(Locator, ClickPath)>,
    actions: Vec<Action>,
    windows: Vec<String>,
    current: String,
    alive: bool,
}

/// 脚本化的内存会话
///
/// 克隆共享同一份状态，方便把一份交给编排层、一份留给断言。
/// 和真实浏览器一样，弹出原生对话框的操作要等对话框关闭才会返回，
/// 对话框打开期间页面查询会失败。
#[derive(Debug, Clone)]
pub struct MockSession {
    state: Arc<Mutex<MockState>>,
    dialogs: DialogWatch,
}

impl Default for MockSession {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSession {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                controls: HashMap::new(),
                effects: HashMap::new(),
                broken_selects: HashSet::new(),
                broken_clicks: HashSet::new(),
                actions: Vec::new(),
                windows: vec![MAIN_WINDOW.to_string()],
                current: MAIN_WINDOW.to_string(),
                alive: true,
            })),
            dialogs: DialogWatch::new(),
        }
    }

    /// 注册整张表单的所有控件（都在主窗口中，且可操作）
    pub fn with_form(layout: &FormLayout) -> Self {
        let session = Self::new();
        let selects = [
            &layout.point_of_sale,
            &layout.document_type,
            &layout.concept,
            &layout.activity,
            &layout.tax_condition,
            &layout.unit_of_measure,
            &layout.tax_rate,
        ];
        let inputs = [
            &layout.issue_date,
            &layout.service_from,
            &layout.service_to,
            &layout.payment_due,
            &layout.tax_id_input,
            &layout.description_input,
            &layout.price_input,
        ];
        let buttons = [
            &layout.entry.locator,
            &layout.continue_validated.locator,
            &layout.continue_plain.locator,
            &layout.cash_payment.locator,
            &layout.confirm.locator,
            &layout.main_menu.locator,
        ];

        for locator in selects {
            session.add(locator.clone(), Kind::Select);
        }
        for locator in inputs {
            session.add(locator.clone(), Kind::Input);
        }
        for locator in buttons {
            session.add(locator.clone(), Kind::Button);
        }
        session
    }

    fn add(&self, locator: Locator, kind: Kind) {
        self.state
            .lock()
            .unwrap()
            .controls
            .insert((MAIN_WINDOW.to_string(), locator), MockControl::new(kind));
    }

    /// 在主窗口中加一个按钮
    pub fn add_button(&self, locator: &Locator) {
        self.add(locator.clone(), Kind::Button);
    }

    /// 从页面上移除控件
    pub fn remove(&self, locator: &Locator) {
        self.state
            .lock()
            .unwrap()
            .controls
            .retain(|(_, l), _| l != locator);
    }

    /// 让类型检查的选择失败（模拟非标准下拉框）
    pub fn break_select(&self, locator: &Locator) {
        self.state
            .lock()
            .unwrap()
            .broken_selects
            .insert(locator.clone());
    }

    /// 让某条点击路径在该控件上失败
    pub fn break_click(&self, locator: &Locator, path: ClickPath) {
        self.state
            .lock()
            .unwrap()
            .broken_clicks
            .insert((locator.clone(), path));
    }

    pub fn on_click(&self, locator: &Locator, effect: Effect) {
        self.state
            .lock()
            .unwrap()
            .effects
            .entry(locator.clone())
            .or_default()
            .push(effect);
    }

    pub fn open_dialog(&self, message: &str) {
        self.dialogs.opened(message);
    }

    pub fn dialog_open(&self) -> bool {
        self.dialogs.message().is_some()
    }

    pub fn set_alive(&self, alive: bool) {
        self.state.lock().unwrap().alive = alive;
    }

    pub fn actions(&self) -> Vec<Action> {
        self.state.lock().unwrap().actions.clone()
    }

    pub fn current(&self) -> String {
        self.state.lock().unwrap().current.clone()
    }

    /// 某控件上发生过的动作
    pub fn actions_on(&self, locator: &Locator) -> Vec<Action> {
        self.actions()
            .into_iter()
            .filter(|a| a.target() == Some(locator))
            .collect()
    }

    /// 控件当前的值
    pub fn value_of(&self, locator: &Locator) -> Option<String> {
        let state = self.state.lock().unwrap();
        state
            .controls
            .get(&(state.current.clone(), locator.clone()))
            .and_then(|c| c.value.clone())
    }

    fn record(&self, action: Action) {
        self.state.lock().unwrap().actions.push(action);
    }

    fn control(&self, locator: &Locator) -> Option<MockControl> {
        let state = self.state.lock().unwrap();
        state
            .controls
            .get(&(state.current.clone(), locator.clone()))
            .cloned()
    }

    fn set_value(&self, locator: &Locator, value: &str) {
        let mut state = self.state.lock().unwrap();
        let key = (state.current.clone(), locator.clone());
        if let Some(control) = state.controls.get_mut(&key) {
            control.value = Some(value.to_string());
        }
    }

    fn require(&self, locator: &Locator) -> AppResult<MockControl> {
        match self.control(locator) {
            Some(control) if control.visible && control.enabled => Ok(control),
            Some(_) => Err(AppError::Browser(format!("{} 不可操作", locator))),
            None => Err(AppError::Browser(format!("找不到 {}", locator))),
        }
    }

    fn check_path(&self, locator: &Locator, path: ClickPath) -> AppResult<()> {
        let broken = self
            .state
            .lock()
            .unwrap()
            .broken_clicks
            .contains(&(locator.clone(), path));
        if broken {
            return Err(AppError::Browser(format!("{:?} 点击 {} 无效", path, locator)));
        }
        Ok(())
    }

    /// 记录点击并触发效果；打开了对话框时一直等到它被关闭
    async fn press(&self, action: Action, locator: &Locator) -> AppResult<()> {
        self.dialogs
            .race(async {
                self.record(action);
                if self.fire(locator) {
                    self.dialogs.wait_closed().await;
                }
                Ok::<(), AppError>(())
            })
            .await?;
        Ok(())
    }

    /// 返回是否打开了对话框
    fn fire(&self, locator: &Locator) -> bool {
        let effects = self
            .state
            .lock()
            .unwrap()
            .effects
            .get(locator)
            .cloned()
            .unwrap_or_default();

        let mut dialog = false;
        for effect in effects {
            match effect {
                Effect::CreateFile(path) => {
                    std::fs::write(&path, b"%PDF-1.4").unwrap();
                }
                Effect::OpenDialog(message) => {
                    self.open_dialog(&message);
                    dialog = true;
                }
                Effect::OpenWindow { handle, accept } => {
                    let mut state = self.state.lock().unwrap();
                    state.windows.push(handle.clone());
                    state
                        .controls
                        .insert((handle, accept), MockControl::new(Kind::Button));
                }
            }
        }
        dialog
    }
}

#[async_trait]
impl Session for MockSession {
    async fn navigate(&self, url: &str) -> AppResult<()> {
        self.record(Action::Navigate(url.to_string()));
        Ok(())
    }

    async fn probe(&self, locator: &Locator) -> AppResult<ElementState> {
        self.dialogs.ensure_clear()?;
        Ok(match self.control(locator) {
            Some(control) => ElementState {
                present: true,
                visible: control.visible,
                enabled: control.enabled,
                value: control.value,
                text: None,
            },
            None => ElementState::default(),
        })
    }

    async fn click(&self, locator: &Locator) -> AppResult<()> {
        self.dialogs.ensure_clear()?;
        self.require(locator)?;
        self.check_path(locator, ClickPath::Direct)?;
        self.press(Action::Click(locator.clone()), locator).await
    }

    async fn pointer_click(&self, locator: &Locator) -> AppResult<()> {
        self.dialogs.ensure_clear()?;
        self.require(locator)?;
        self.check_path(locator, ClickPath::Pointer)?;
        self.press(Action::PointerClick(locator.clone()), locator).await
    }

    async fn scripted_click(&self, locator: &Locator) -> AppResult<()> {
        self.dialogs.ensure_clear()?;
        if self.control(locator).is_none() {
            return Err(AppError::Browser(format!("脚本点击失败: 找不到 {}", locator)));
        }
        self.check_path(locator, ClickPath::Scripted)?;
        self.press(Action::ScriptedClick(locator.clone()), locator).await
    }

    async fn run_script(&self, script: &str) -> AppResult<JsonValue> {
        self.dialogs.ensure_clear()?;
        self.record(Action::Script(script.to_string()));
        Ok(JsonValue::Null)
    }

    async fn select_option(&self, locator: &Locator, value: &str) -> AppResult<()> {
        self.dialogs.ensure_clear()?;
        let control = self.require(locator)?;
        if control.kind != Kind::Select {
            return Err(AppError::Browser(format!("{} 不是下拉框", locator)));
        }
        if self.state.lock().unwrap().broken_selects.contains(locator) {
            return Err(AppError::Browser(format!("{} 选择失败", locator)));
        }
        self.record(Action::Select(locator.clone(), value.to_string()));
        self.set_value(locator, value);
        Ok(())
    }

    async fn assign_value(&self, locator: &Locator, value: &str) -> AppResult<()> {
        self.dialogs.ensure_clear()?;
        if self.control(locator).is_none() {
            return Err(AppError::Browser(format!("找不到 {}", locator)));
        }
        self.record(Action::Assign(locator.clone(), value.to_string()));
        self.set_value(locator, value);
        Ok(())
    }

    async fn clear_and_type(&self, locator: &Locator, value: &str) -> AppResult<()> {
        self.dialogs.ensure_clear()?;
        self.require(locator)?;
        self.record(Action::Type(locator.clone(), value.to_string()));
        self.set_value(locator, value);
        Ok(())
    }

    async fn ready_state(&self) -> AppResult<String> {
        self.dialogs.ensure_clear()?;
        Ok("complete".to_string())
    }

    async fn dialog_message(&self) -> AppResult<Option<String>> {
        Ok(self.dialogs.message())
    }

    async fn accept_dialog(&self) -> AppResult<()> {
        if self.dialogs.message().is_none() {
            return Err(AppError::Browser("没有打开的对话框".to_string()));
        }
        self.record(Action::AcceptDialog);
        self.dialogs.closed();
        Ok(())
    }

    async fn window_handles(&self) -> AppResult<Vec<String>> {
        Ok(self.state.lock().unwrap().windows.clone())
    }

    async fn current_window(&self) -> AppResult<String> {
        Ok(self.current())
    }

    async fn switch_to_window(&self, handle: &str) -> AppResult<()> {
        let mut state = self.state.lock().unwrap();
        if !state.windows.iter().any(|w| w == handle) {
            return Err(AppError::Browser(format!("窗口不存在: {}", handle)));
        }
        state.current = handle.to_string();
        state.actions.push(Action::SwitchWindow(handle.to_string()));
        Ok(())
    }

    async fn screenshot(&self, path: &Path) -> AppResult<()> {
        self.dialogs.ensure_clear()?;
        self.record(Action::Screenshot(path.to_path_buf()));
        std::fs::write(path, b"png").map_err(|e| AppError::file(path, e))?;
        Ok(())
    }

    async fn control_inventory(&self) -> AppResult<Vec<ControlInfo>> {
        self.dialogs.ensure_clear()?;
        Ok(Vec::new())
    }

    async fn is_alive(&self) -> bool {
        self.state.lock().unwrap().alive
    }
}

/// 内存记录源
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    records: Arc<Mutex<Vec<Record>>>,
    marked: Arc<Mutex<Vec<String>>>,
    fail_marks: Arc<Mutex<usize>>,
}

impl MemorySource {
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            records: Arc::new(Mutex::new(records)),
            ..Self::default()
        }
    }

    /// 接下来的 `n` 次回写都失败
    pub fn fail_next_marks(&self, n: usize) {
        *self.fail_marks.lock().unwrap() = n;
    }

    /// 每次 mark_complete 调用的记录标识
    pub fn marked(&self) -> Vec<String> {
        self.marked.lock().unwrap().clone()
    }
}

#[async_trait]
impl RecordSource for MemorySource {
    async fn fetch_pending(&self) -> AppResult<Vec<Record>> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| !r.completed)
            .cloned()
            .collect())
    }

    async fn mark_complete(&self, record: &Record) -> AppResult<()> {
        self.marked.lock().unwrap().push(record.key());

        let mut fail = self.fail_marks.lock().unwrap();
        if *fail > 0 {
            *fail -= 1;
            return Err(AppError::Persistence {
                record: record.key(),
                cause: "磁盘已满".to_string(),
            });
        }

        let mut records = self.records.lock().unwrap();
        if let Some(row) = records.iter_mut().find(|r| r.position == record.position) {
            row.completed = true;
        }
        Ok(())
    }
}

/// 用例里的标准记录
pub fn sample_record(category: TaxCategory) -> Record {
    Record {
        client: "Acme".to_string(),
        tax_id: "20123456789".to_string(),
        tax_category: category,
        amount: 1000.0,
        tax_amount: 0.0,
        batch_ref: "45".to_string(),
        issue_date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
        period: "Mayo".to_string(),
        completed: false,
        position: 0,
    }
}

pub fn fast_policy() -> InteractionPolicy {
    InteractionPolicy {
        attempts: 3,
        backoff: Duration::from_millis(5),
        wait_timeout: Duration::from_millis(30),
        poll_interval: Duration::from_millis(5),
    }
}

pub fn fast_timings() -> Timings {
    Timings {
        advance_pause: Duration::from_millis(1),
        confirm_settle: Duration::from_millis(1),
        dialog_timeout: Duration::from_millis(30),
        ready_state_timeout: Duration::from_millis(30),
        page_settle: Duration::from_millis(1),
        print_search_rounds: 2,
        print_round_pause: Duration::from_millis(5),
        print_probe_timeout: Duration::from_millis(20),
        between_records: Duration::from_millis(1),
    }
}

pub fn fast_artifacts(inbox: &Path, archive: &Path) -> ArtifactSettings {
    ArtifactSettings {
        inbox_dir: inbox.to_path_buf(),
        archive_dir: archive.to_path_buf(),
        poll_interval: Duration::from_millis(20),
        poll_attempts: 10,
        completion_grace: Duration::from_millis(200),
        ..ArtifactSettings::default()
    }
}

/// 注册一个完整可用的表单：确认后弹出原生对话框，点击打印后生成文件
pub fn working_form(layout: &FormLayout, inbox: &Path) -> MockSession {
    let session = MockSession::with_form(layout);
    session.on_click(
        &layout.confirm.locator,
        Effect::OpenDialog("¿Confirma la generación del comprobante?".to_string()),
    );
    let print = &layout.print_candidates[0];
    session.add_button(print);
    session.on_click(print, Effect::CreateFile(inbox.join("comprobante_0001.pdf")));
    session
}
