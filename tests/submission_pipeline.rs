mod common;

use std::path::Path;

use common::{
    fast_artifacts, fast_policy, fast_timings, sample_record, working_form, Action, MockSession,
};
use invoice_submit::models::TaxCategory;
use invoice_submit::services::DiagnosticSink;
use invoice_submit::workflow::{InvoiceCtx, InvoiceFlow, PipelineStep};
use invoice_submit::{FlowReport, FormLayout, Record};

struct Dirs {
    _root: tempfile::TempDir,
    inbox: std::path::PathBuf,
    archive: std::path::PathBuf,
    diagnostics: std::path::PathBuf,
}

fn dirs() -> Dirs {
    let root = tempfile::tempdir().unwrap();
    let inbox = root.path().join("Downloads");
    let archive = root.path().join("Desktop");
    let diagnostics = root.path().join("diagnostics");
    std::fs::create_dir_all(&inbox).unwrap();
    Dirs {
        _root: root,
        inbox,
        archive,
        diagnostics,
    }
}

fn flow(layout: &FormLayout, dirs: &Dirs) -> InvoiceFlow {
    InvoiceFlow::new(
        layout.clone(),
        fast_timings(),
        fast_policy(),
        fast_artifacts(&dirs.inbox, &dirs.archive),
    )
}

async fn run(session: &MockSession, record: &Record, layout: &FormLayout, dirs: &Dirs) -> FlowReport {
    let ctx = InvoiceCtx::new(1, 1, 1, record);
    let diagnostics = DiagnosticSink::new(&dirs.diagnostics);
    flow(layout, dirs).run(session, record, &ctx, &diagnostics).await
}

fn selected(session: &MockSession, locator: &invoice_submit::Locator) -> Vec<String> {
    session
        .actions_on(locator)
        .into_iter()
        .filter_map(|a| match a {
            Action::Select(_, v) | Action::Assign(_, v) => Some(v),
            _ => None,
        })
        .collect()
}

fn typed(session: &MockSession, locator: &invoice_submit::Locator) -> Vec<String> {
    session
        .actions_on(locator)
        .into_iter()
        .filter_map(|a| match a {
            Action::Type(_, v) => Some(v),
            _ => None,
        })
        .collect()
}

fn list_dir(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}

#[tokio::test]
async fn test_registered_taxpayer_uses_subtype_a_without_tax_rate() {
    let dirs = dirs();
    let layout = FormLayout::default();
    let session = working_form(&layout, &dirs.inbox);
    let record = sample_record(TaxCategory::RegisteredTaxpayer);

    let report = run(&session, &record, &layout, &dirs).await;

    assert!(report.success, "{:?}", report.diagnostic);
    assert_eq!(report.failed_step, None);
    assert_eq!(selected(&session, &layout.document_type), vec!["10"]);
    assert_eq!(selected(&session, &layout.tax_condition), vec!["1"]);
    assert!(session.actions_on(&layout.tax_rate).is_empty());

    for (locator, _) in layout.date_fields() {
        assert_eq!(typed(&session, locator), vec!["01/05/2024"]);
    }
    assert_eq!(typed(&session, &layout.tax_id_input), vec!["20123456789"]);
    assert_eq!(typed(&session, &layout.price_input), vec!["1000.00"]);
    assert_eq!(
        typed(&session, &layout.description_input),
        vec!["Comisiones por cobranzas Mes de Mayo - Rendición N° 45"]
    );

    let expected = dirs
        .archive
        .join("Acme x Honorarios Mayo - Rendición N° 45.pdf");
    assert_eq!(report.artifact.as_deref(), Some(expected.as_path()));
    assert!(expected.exists());
    assert!(list_dir(&dirs.inbox).is_empty());

    let actions = session.actions();
    assert!(actions.contains(&Action::AcceptDialog));
    assert_eq!(
        actions.last(),
        Some(&Action::Click(layout.main_menu.locator.clone()))
    );
}

#[tokio::test]
async fn test_final_consumer_uses_subtype_b_with_tax_rate() {
    let dirs = dirs();
    let layout = FormLayout::default();
    let session = working_form(&layout, &dirs.inbox);
    let record = sample_record(TaxCategory::FinalConsumer);

    let report = run(&session, &record, &layout, &dirs).await;

    assert!(report.success, "{:?}", report.diagnostic);
    assert_eq!(selected(&session, &layout.document_type), vec!["19"]);
    assert_eq!(selected(&session, &layout.tax_condition), vec!["5"]);
    assert_eq!(selected(&session, &layout.tax_rate), vec!["5"]);
}

#[tokio::test]
async fn test_monotax_and_exempt_condition_codes() {
    for (category, subtype, condition, tax_rate) in [
        (TaxCategory::Monotax, "10", "6", false),
        (TaxCategory::Exempt, "19", "4", true),
    ] {
        let dirs = dirs();
        let layout = FormLayout::default();
        let session = working_form(&layout, &dirs.inbox);

        let report = run(&session, &sample_record(category), &layout, &dirs).await;

        assert!(report.success, "{:?}", report.diagnostic);
        assert_eq!(selected(&session, &layout.document_type), vec![subtype]);
        assert_eq!(selected(&session, &layout.tax_condition), vec![condition]);
        assert_eq!(!session.actions_on(&layout.tax_rate).is_empty(), tax_rate);
    }
}

#[tokio::test]
async fn test_dates_failure_aborts_before_client_info() {
    let dirs = dirs();
    let layout = FormLayout::default();
    let session = working_form(&layout, &dirs.inbox);
    session.remove(&layout.issue_date);
    let record = sample_record(TaxCategory::RegisteredTaxpayer);

    let report = run(&session, &record, &layout, &dirs).await;

    assert!(!report.success);
    assert_eq!(report.failed_step, Some(PipelineStep::Dates));
    assert!(report.artifact.is_none());
    assert!(session.actions_on(&layout.tax_condition).is_empty());
    assert!(session.actions_on(&layout.tax_id_input).is_empty());
    assert!(session.actions_on(&layout.confirm.locator).is_empty());

    // 诊断：按步骤与记录命名的截图 + failures.txt
    let files = list_dir(&dirs.diagnostics);
    assert!(
        files
            .iter()
            .any(|f| f.starts_with("error_dates_row-0_Acme_") && f.ends_with(".png")),
        "{:?}",
        files
    );
    let failures = std::fs::read_to_string(dirs.diagnostics.join("failures.txt")).unwrap();
    assert!(failures.contains("| dates | row:0 | Acme |"));
}

#[tokio::test]
async fn test_missing_download_fails_capture_step() {
    let dirs = dirs();
    let layout = FormLayout::default();
    let session = MockSession::with_form(&layout);
    session.on_click(
        &layout.confirm.locator,
        common::Effect::OpenDialog("¿Confirma?".to_string()),
    );
    // 打印按钮可以点击，但不会产生下载
    session.add_button(&layout.print_candidates[0]);
    let record = sample_record(TaxCategory::RegisteredTaxpayer);

    let report = run(&session, &record, &layout, &dirs).await;

    assert!(!report.success);
    assert_eq!(report.failed_step, Some(PipelineStep::ConfirmAndCapture));
    assert!(report.diagnostic.unwrap().contains("未在"));
    assert!(session
        .actions_on(&layout.main_menu.locator)
        .is_empty());
    assert!(list_dir(&dirs.archive).is_empty());
}

#[tokio::test]
async fn test_print_control_found_by_later_candidate() {
    let dirs = dirs();
    let layout = FormLayout::default();
    let session = MockSession::with_form(&layout);
    session.on_click(
        &layout.confirm.locator,
        common::Effect::OpenDialog("¿Confirma?".to_string()),
    );
    let fallback = &layout.print_candidates[2];
    session.add_button(fallback);
    session.on_click(
        fallback,
        common::Effect::CreateFile(dirs.inbox.join("factura.pdf")),
    );
    let record = sample_record(TaxCategory::RegisteredTaxpayer);

    let report = run(&session, &record, &layout, &dirs).await;

    assert!(report.success, "{:?}", report.diagnostic);
    assert!(session.actions_on(&layout.print_candidates[0]).is_empty());
    assert_eq!(
        session.actions_on(fallback),
        vec![Action::Click(fallback.clone())]
    );
}

#[tokio::test]
async fn test_unresolved_confirmation_fails_record() {
    let dirs = dirs();
    let layout = FormLayout::default();
    // 确认后什么也不弹出，也没有可脚本点击的确认按钮
    let session = MockSession::with_form(&layout);
    let record = sample_record(TaxCategory::RegisteredTaxpayer);

    let report = run(&session, &record, &layout, &dirs).await;

    assert!(!report.success);
    assert_eq!(report.failed_step, Some(PipelineStep::ConfirmAndCapture));
    assert!(report.diagnostic.unwrap().contains("确认对话框未能处理"));
    assert!(session.actions_on(&layout.print_candidates[0]).is_empty());
}

#[tokio::test]
async fn test_error_dialog_after_continue_fails_step() {
    let dirs = dirs();
    let layout = FormLayout::default();
    let session = working_form(&layout, &dirs.inbox);
    session.on_click(
        &layout.continue_validated.locator,
        common::Effect::OpenDialog("CUIT inválido".to_string()),
    );
    let record = sample_record(TaxCategory::RegisteredTaxpayer);

    let report = run(&session, &record, &layout, &dirs).await;

    assert!(!report.success);
    assert_eq!(report.failed_step, Some(PipelineStep::Init));
    let diagnostic = report.diagnostic.unwrap();
    assert!(diagnostic.contains("CUIT inválido"), "{}", diagnostic);
    assert!(!session.dialog_open());
    assert!(session.actions().contains(&Action::AcceptDialog));
    assert!(session.actions_on(&layout.concept).is_empty());
}

#[tokio::test]
async fn test_leftover_dialog_is_accepted_before_entry() {
    let dirs = dirs();
    let layout = FormLayout::default();
    let session = working_form(&layout, &dirs.inbox);
    session.open_dialog("La sesión anterior no finalizó");
    let record = sample_record(TaxCategory::RegisteredTaxpayer);

    let report = run(&session, &record, &layout, &dirs).await;

    assert!(report.success, "{:?}", report.diagnostic);
    assert_eq!(session.actions().first(), Some(&Action::AcceptDialog));
}
