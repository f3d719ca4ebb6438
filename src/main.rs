use anyhow::Result;
use invoice_submit::config::Config;
use invoice_submit::orchestrator::{App, CancelSignal};
use invoice_submit::utils::logging;

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置
    let config = Config::from_env();

    // 初始化日志
    logging::init(config.verbose_logging, &config.output_log_file)?;

    let cancel = CancelSignal::from_ctrl_c();

    // 初始化并运行应用
    let app = App::initialize(config, cancel).await?;
    if let Err(e) = app.run().await {
        if e.is_fatal() {
            std::process::exit(1);
        }
        return Err(e.into());
    }

    Ok(())
}
