use auto_natpmp::core::shutdown::listen_for_shutdown;
use auto_natpmp::utils::{logger, validation::Validate};
use auto_natpmp::{CliArgs, NatPmpError, NatpmpcClient, PortFile, PortStore, RenewalLoop};
use clap::Parser;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();

    let settings = match args.into_settings() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("❌ {}", e);
            eprintln!("💡 {}", e.recovery_suggestion());
            return ExitCode::FAILURE;
        }
    };

    // 驗證配置
    if let Err(e) = settings.validate() {
        eprintln!("❌ Configuration validation failed: {}", e);
        eprintln!("💡 {}", e.recovery_suggestion());
        return ExitCode::FAILURE;
    }

    // 初始化日誌 (guard 必須存活到程式結束)
    let _log_guard = match logger::init_daemon_logger(&settings.logging) {
        Ok(guard) => guard,
        Err(e) => {
            let e = NatPmpError::LoggingError {
                message: format!("{:#}", e),
            };
            eprintln!("❌ {}", e);
            eprintln!("💡 {}", e.recovery_suggestion());
            return ExitCode::FAILURE;
        }
    };

    tracing::info!("🚀 Starting auto-natpmp service");
    tracing::info!("Configuration: {}", settings.summary());
    tracing::debug!("Effective settings: {:?}", settings);

    let shutdown = CancellationToken::new();
    if let Err(e) = listen_for_shutdown(shutdown.clone()) {
        tracing::error!("❌ {}", e);
        return ExitCode::FAILURE;
    }

    let port_file = PortFile::new(settings.port_file.clone());
    if let Err(e) = port_file.ensure_directory().await {
        tracing::error!("❌ {}", e);
        tracing::error!("💡 {}", e.recovery_suggestion());
        return ExitCode::FAILURE;
    }

    let renewal_settings = match settings.renewal_settings() {
        Ok(renewal_settings) => renewal_settings,
        Err(e) => {
            tracing::error!("❌ {}", e);
            return ExitCode::FAILURE;
        }
    };

    let gateway = NatpmpcClient::new(settings.natpmpc_path.clone());
    let renewal = RenewalLoop::new(gateway, port_file, renewal_settings);

    match renewal.run(shutdown).await {
        Ok(()) => {
            tracing::info!("✅ auto-natpmp stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("❌ auto-natpmp terminated: {}", e);
            tracing::error!("💡 {}", e.recovery_suggestion());
            ExitCode::FAILURE
        }
    }
}
