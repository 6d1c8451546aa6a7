use clap::Parser;
use sales_tax_etl::utils::{logger, validation::Validate};
use sales_tax_etl::{build_pipeline, CliConfig, EtlEngine, EtlError, LocalStorage};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CliConfig::parse();

    // 初始化日誌
    if config.json_logs {
        logger::init_json_logger(config.verbose);
    } else {
        logger::init_cli_logger(config.verbose);
    }

    tracing::info!("Starting sales-tax-etl CLI");
    tracing::debug!(
        "Input: {}, mode: {:?}, shape: {:?}, concurrent requests: {}",
        config.input_path,
        config.mode,
        config.shape,
        config.concurrent_requests
    );

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    if config.monitor {
        tracing::info!("🔍 System monitoring enabled");
    }

    let pipeline = match build_pipeline(LocalStorage::current_dir(), &config) {
        Ok(pipeline) => pipeline,
        Err(e) => fail(e),
    };
    let engine = EtlEngine::new_with_monitoring(pipeline, config.monitor);

    match engine.run().await {
        Ok(output_path) => {
            tracing::info!("✅ Sales tax report completed");
            println!("✅ Sales tax report completed");
            println!("📁 Output saved to: {}", output_path);
        }
        Err(e) => fail(e),
    }

    Ok(())
}

fn fail(e: EtlError) -> ! {
    tracing::error!(
        "❌ Run failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 {}", e.recovery_suggestion());

    std::process::exit(e.severity().exit_code().max(1));
}
