use invoice_submit::browser::connect_to_browser_and_page;
use invoice_submit::config::Config;
use invoice_submit::infrastructure::{CdpSession, Session};
use invoice_submit::interaction::ElementHandler;
use invoice_submit::models::{RecordSource, TomlRecordStore};
use invoice_submit::services::DiagnosticSink;
use invoice_submit::utils::logging;
use invoice_submit::workflow::{InvoiceCtx, InvoiceFlow};

#[tokio::test]
#[ignore] // 默认忽略，需要已登录的浏览器：cargo test -- --ignored
async fn test_browser_connection() {
    let config = Config::from_env();
    let _ = logging::init(true, &config.output_log_file);

    let result = connect_to_browser_and_page(
        config.browser_debug_port,
        Some(config.target_url.as_str()),
        config.target_title.as_deref(),
    )
    .await;

    assert!(result.is_ok(), "应该能够成功连接浏览器");
}

#[tokio::test]
#[ignore]
async fn test_entry_link_is_reachable() {
    let config = Config::from_env();
    let _ = logging::init(true, &config.output_log_file);

    let (browser, page) = connect_to_browser_and_page(
        config.browser_debug_port,
        Some(config.target_url.as_str()),
        config.target_title.as_deref(),
    )
    .await
    .expect("连接浏览器失败");
    let session = CdpSession::attach(browser, page)
        .await
        .expect("初始化会话失败");
    assert!(session.is_alive().await);

    let layout = config.load_form_layout().expect("读取表单布局失败");
    let handler = ElementHandler::new(&session, &config.interaction);
    assert!(
        handler.exists(&layout.entry.locator).await,
        "主菜单上应该有开票入口"
    );
}

#[tokio::test]
#[ignore] // 会真实开出一张发票，只在测试环境手动运行
async fn test_submit_first_pending_record() {
    let config = Config::from_env();
    let _ = logging::init(true, &config.output_log_file);

    let (browser, page) = connect_to_browser_and_page(
        config.browser_debug_port,
        Some(config.target_url.as_str()),
        config.target_title.as_deref(),
    )
    .await
    .expect("连接浏览器失败");
    let session = CdpSession::attach(browser, page)
        .await
        .expect("初始化会话失败");

    let store = TomlRecordStore::new(&config.records_file);
    let record = store
        .fetch_pending()
        .await
        .expect("读取记录失败")
        .into_iter()
        .next()
        .expect("没有待处理的记录");

    let flow = InvoiceFlow::from_config(&config, config.load_form_layout().unwrap());
    let diagnostics = DiagnosticSink::new(&config.diagnostics_dir);
    let ctx = InvoiceCtx::new(1, 1, 1, &record);

    let report = flow.run(&session, &record, &ctx, &diagnostics).await;

    assert!(report.success, "提交应该成功: {:?}", report.diagnostic);
}
