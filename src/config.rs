use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::infrastructure::locator::{Control, Locator};

/// 程序配置文件
#[derive(Clone, Debug)]
pub struct Config {
    /// 浏览器调试端口
    pub browser_debug_port: u16,
    /// 是否自行启动浏览器（否则连接已登录的浏览器）
    pub launch_browser: bool,
    /// 自行启动时使用的浏览器可执行文件
    pub chrome_executable: Option<PathBuf>,
    /// 连接时优先选择标题包含该文本的页面
    pub target_title: Option<String>,
    /// 找不到目标页面时打开的 URL
    pub target_url: String,
    /// 记录源文件
    pub records_file: PathBuf,
    /// 浏览器下载目录（被监视的收件目录）
    pub inbox_dir: PathBuf,
    /// 归档目录
    pub archive_dir: PathBuf,
    /// 诊断截图与失败记录目录
    pub diagnostics_dir: PathBuf,
    /// 输出日志文件
    pub output_log_file: String,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 最多执行几轮
    pub max_passes: usize,
    /// 单条记录最多尝试次数，超过后本次运行不再处理
    pub max_attempts_per_record: usize,
    /// 表单布局覆盖文件（可选）
    pub form_layout_file: Option<PathBuf>,
    pub timings: Timings,
    pub interaction: InteractionPolicy,
}

impl Default for Config {
    fn default() -> Self {
        let home = home::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self {
            browser_debug_port: 9222,
            launch_browser: false,
            chrome_executable: None,
            target_title: Some("Comprobantes en línea".to_string()),
            target_url: "https://fe.afip.gob.ar/rcel/jsp/menu_ppal.jsp".to_string(),
            records_file: PathBuf::from("facturas.toml"),
            inbox_dir: home.join("Downloads"),
            archive_dir: home.join("Desktop"),
            diagnostics_dir: PathBuf::from("diagnostics"),
            output_log_file: "invoice_submit.log".to_string(),
            verbose_logging: false,
            max_passes: 10,
            max_attempts_per_record: 3,
            form_layout_file: None,
            timings: Timings::default(),
            interaction: InteractionPolicy::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            browser_debug_port: std::env::var("BROWSER_DEBUG_PORT").ok().and_then(|v| v.parse().ok()).unwrap_or(default.browser_debug_port),
            launch_browser: std::env::var("LAUNCH_BROWSER").ok().and_then(|v| v.parse().ok()).unwrap_or(default.launch_browser),
            chrome_executable: std::env::var("CHROME_EXECUTABLE").ok().map(PathBuf::from).or(default.chrome_executable),
            target_title: std::env::var("TARGET_TITLE").ok().or(default.target_title),
            target_url: std::env::var("TARGET_URL").unwrap_or(default.target_url),
            records_file: std::env::var("RECORDS_FILE").map(PathBuf::from).unwrap_or(default.records_file),
            inbox_dir: std::env::var("INBOX_DIR").map(PathBuf::from).unwrap_or(default.inbox_dir),
            archive_dir: std::env::var("ARCHIVE_DIR").map(PathBuf::from).unwrap_or(default.archive_dir),
            diagnostics_dir: std::env::var("DIAGNOSTICS_DIR").map(PathBuf::from).unwrap_or(default.diagnostics_dir),
            output_log_file: std::env::var("OUTPUT_LOG_FILE").unwrap_or(default.output_log_file),
            verbose_logging: std::env::var("VERBOSE_LOGGING").ok().and_then(|v| v.parse().ok()).unwrap_or(default.verbose_logging),
            max_passes: std::env::var("MAX_PASSES").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_passes),
            max_attempts_per_record: std::env::var("MAX_ATTEMPTS_PER_RECORD").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_attempts_per_record),
            form_layout_file: std::env::var("FORM_LAYOUT_FILE").ok().map(PathBuf::from).or(default.form_layout_file),
            timings: default.timings,
            interaction: default.interaction,
        }
    }

    /// 加载表单布局：配置了覆盖文件则读取，否则使用默认布局
    pub fn load_form_layout(&self) -> AppResult<FormLayout> {
        match &self.form_layout_file {
            Some(path) => FormLayout::from_file(path),
            None => Ok(FormLayout::default()),
        }
    }

    /// 文件归档相关设置
    pub fn artifact_settings(&self) -> ArtifactSettings {
        ArtifactSettings {
            inbox_dir: self.inbox_dir.clone(),
            archive_dir: self.archive_dir.clone(),
            ..ArtifactSettings::default()
        }
    }
}

/// 流程中的各类等待时间
#[derive(Clone, Debug)]
pub struct Timings {
    /// 点击"继续"后的页面切换等待
    pub advance_pause: Duration,
    /// 确认处理前的稳定等待
    pub confirm_settle: Duration,
    /// 等待原生对话框出现的超时
    pub dialog_timeout: Duration,
    /// 等待 document.readyState 的超时
    pub ready_state_timeout: Duration,
    /// 确认后页面稳定等待
    pub page_settle: Duration,
    /// 查找打印按钮的轮数
    pub print_search_rounds: usize,
    /// 每轮查找之间的间隔
    pub print_round_pause: Duration,
    /// 单个候选定位等待可见的超时
    pub print_probe_timeout: Duration,
    /// 两条记录之间的间隔
    pub between_records: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            advance_pause: Duration::from_secs(2),
            confirm_settle: Duration::from_secs(2),
            dialog_timeout: Duration::from_secs(10),
            ready_state_timeout: Duration::from_secs(10),
            page_settle: Duration::from_secs(5),
            print_search_rounds: 5,
            print_round_pause: Duration::from_secs(2),
            print_probe_timeout: Duration::from_secs(3),
            between_records: Duration::from_secs(2),
        }
    }
}

/// 交互层的重试策略
#[derive(Clone, Debug)]
pub struct InteractionPolicy {
    /// 点击最多尝试次数
    pub attempts: usize,
    /// 两次尝试之间的固定退避
    pub backoff: Duration,
    /// 等待控件可操作的超时
    pub wait_timeout: Duration,
    /// 轮询间隔
    pub poll_interval: Duration,
}

impl Default for InteractionPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_secs(1),
            wait_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_millis(250),
        }
    }
}

/// 生成文件的检测与归档设置
#[derive(Clone, Debug)]
pub struct ArtifactSettings {
    pub inbox_dir: PathBuf,
    pub archive_dir: PathBuf,
    /// 最终文件扩展名
    pub extension: String,
    /// 下载中的临时扩展名
    pub partial_extension: String,
    /// 归档文件名模板，支持 `{client}` `{period}` `{batch}`
    pub file_name_template: String,
    pub poll_interval: Duration,
    pub poll_attempts: usize,
    /// 发现新文件后等待下载完成的最长时间
    pub completion_grace: Duration,
}

impl Default for ArtifactSettings {
    fn default() -> Self {
        let home = home::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self {
            inbox_dir: home.join("Downloads"),
            archive_dir: home.join("Desktop"),
            extension: "pdf".to_string(),
            partial_extension: "crdownload".to_string(),
            file_name_template: "{client} x Honorarios {period} - Rendición N° {batch}.pdf".to_string(),
            poll_interval: Duration::from_secs(1),
            poll_attempts: 10,
            completion_grace: Duration::from_secs(5),
        }
    }
}

/// 远程表单布局
///
/// 所有控件标识、选项值与文本模板都在这里，流程代码只引用字段。
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct FormLayout {
    pub entry: Control,
    pub point_of_sale: Locator,
    pub point_of_sale_value: String,
    pub document_type: Locator,
    pub subtype_a_value: String,
    pub subtype_b_value: String,
    /// 带前端校验的"继续"按钮
    pub continue_validated: Control,
    /// 明细页的"继续"按钮
    pub continue_plain: Control,
    pub concept: Locator,
    pub concept_value: String,
    pub activity: Locator,
    pub activity_value: String,
    pub date_format: String,
    pub issue_date: Locator,
    pub service_from: Locator,
    pub service_to: Locator,
    pub payment_due: Locator,
    pub tax_condition: Locator,
    pub tax_id_input: Locator,
    pub cash_payment: Control,
    pub description_input: Locator,
    pub description_template: String,
    pub unit_of_measure: Locator,
    pub unit_value: String,
    pub price_input: Locator,
    pub tax_rate: Locator,
    pub tax_rate_value: String,
    pub confirm: Control,
    /// 打印按钮候选定位，越具体越靠前
    pub print_candidates: Vec<Locator>,
    pub main_menu: Control,
    /// 弹出窗口中的确认按钮
    pub popup_accept: Locator,
    /// 最后手段：脚本点击的确认按钮
    pub scripted_accept: Locator,
}

impl Default for FormLayout {
    fn default() -> Self {
        let continue_xpath =
            "//input[@type='button' and @value='Continuar >' and @onclick='validarCampos();']";
        Self {
            entry: Control::new(Locator::link_text("Generar Comprobantes")),
            point_of_sale: Locator::id("puntodeventa"),
            point_of_sale_value: "4".to_string(),
            document_type: Locator::id("universocomprobante"),
            subtype_a_value: "10".to_string(),
            subtype_b_value: "19".to_string(),
            continue_validated: Control::new(Locator::xpath(continue_xpath))
                .with_script("validarCampos();"),
            continue_plain: Control::new(Locator::xpath(
                "//input[@type='button' and @value='Continuar >']",
            )),
            concept: Locator::id("idconcepto"),
            concept_value: "2".to_string(),
            activity: Locator::id("actiAsociadaId"),
            activity_value: "682091".to_string(),
            date_format: "%d/%m/%Y".to_string(),
            issue_date: Locator::id("fc"),
            service_from: Locator::id("fsd"),
            service_to: Locator::id("fsh"),
            payment_due: Locator::id("vencimientopago"),
            tax_condition: Locator::id("idivareceptor"),
            tax_id_input: Locator::id("nrodocreceptor"),
            cash_payment: Control::new(Locator::id("formadepago1")),
            description_input: Locator::id("detalle_descripcion1"),
            description_template:
                "Comisiones por cobranzas Mes de {period} - Rendición N° {batch}".to_string(),
            unit_of_measure: Locator::id("detalle_medida1"),
            unit_value: "98".to_string(),
            price_input: Locator::id("detalle_precio1"),
            tax_rate: Locator::id("detalle_tipo_iva1"),
            tax_rate_value: "5".to_string(),
            confirm: Control::new(Locator::xpath(
                "//input[@type='button' and @value='Confirmar Datos...' and @onclick='confirmar();']",
            ))
            .with_script("confirmar();"),
            print_candidates: vec![
                Locator::xpath("//input[@type='button' and @value='Imprimir...']"),
                Locator::xpath("//*[@id='botones_comprobante']/input[@type='button']"),
                Locator::xpath("//input[contains(@onclick, 'imprimirComprobante.do')]"),
            ],
            main_menu: Control::new(Locator::xpath("//input[@value='Menú Principal']"))
                .with_script("parent.location.href='menu_ppal.jsp'"),
            popup_accept: Locator::xpath("//button[contains(text(), 'Aceptar')]"),
            scripted_accept: Locator::css("button.aceptar"),
        }
    }
}

impl FormLayout {
    /// 从 TOML 文件读取，缺省字段使用默认布局
    pub fn from_file(path: &Path) -> AppResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| AppError::file(path, e))?;
        toml::from_str(&content)
            .map_err(|e| AppError::Config(format!("表单布局 {} 解析失败: {}", path.display(), e)))
    }

    /// 四个日期字段：开票日期、服务起、服务止、付款到期
    pub fn date_fields(&self) -> [(&Locator, &'static str); 4] {
        [
            (&self.issue_date, "开票日期"),
            (&self.service_from, "服务起始日期"),
            (&self.service_to, "服务截止日期"),
            (&self.payment_due, "付款到期日"),
        ]
    }
}
