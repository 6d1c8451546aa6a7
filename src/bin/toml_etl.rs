use anyhow::Context;
use clap::Parser;
use sales_tax_etl::core::ConfigProvider;
use sales_tax_etl::utils::{logger, validation::Validate};
use sales_tax_etl::{build_pipeline, EtlEngine, LocalStorage, ProcessingMode, TomlConfig};

#[derive(Parser)]
#[command(name = "toml-etl")]
#[command(about = "Sales tax ETL configured from a TOML file")]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "sales-tax.toml")]
    config: String,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Override monitoring setting from config
    #[arg(long)]
    monitor: Option<bool>,

    /// Override processing mode from config
    #[arg(long)]
    mode: Option<ProcessingMode>,

    /// Validate and print the configuration without calling the rate service
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = TomlConfig::from_file(&args.config)
        .with_context(|| format!("Failed to load config file '{}'", args.config))?;

    if config.json_logs() {
        logger::init_json_logger(args.verbose);
    } else {
        logger::init_cli_logger(args.verbose);
    }

    tracing::info!("📁 Loaded configuration from: {}", args.config);

    // 命令列覆蓋設定
    if let Some(mode) = args.mode {
        config.processing.mode = Some(mode);
        tracing::info!("🔧 Processing mode overridden to: {:?}", mode);
    }

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    display_config_summary(&config);

    if args.dry_run {
        println!("🔍 Dry run: configuration is valid, nothing was processed.");
        return Ok(());
    }

    let monitor_enabled = args.monitor.unwrap_or_else(|| config.monitoring_enabled());
    let pipeline = build_pipeline(LocalStorage::current_dir(), &config)?;
    let engine = EtlEngine::new_with_monitoring(pipeline, monitor_enabled);

    match engine.run().await {
        Ok(output_path) => {
            tracing::info!("✅ Sales tax report completed");
            println!("📁 Output saved to: {}", output_path);
        }
        Err(e) => {
            tracing::error!(
                "❌ Run failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 {}", e.recovery_suggestion());
            std::process::exit(e.severity().exit_code().max(1));
        }
    }

    Ok(())
}

fn display_config_summary(config: &TomlConfig) {
    println!("📋 Configuration Summary:");
    println!("  Pipeline: {}", config.pipeline.name);
    if let Some(version) = &config.pipeline.version {
        println!("  Version: {}", version);
    }
    println!("  Input: {}", config.input_path());
    println!("  Rate service: {}", config.rate_endpoint());
    println!(
        "  Credentials: {}",
        if config.app_id().is_some() { "configured" } else { "none" }
    );
    println!("  Mode: {:?}", config.processing_mode());
    if config.processing_mode() == ProcessingMode::Parallel {
        println!("  Concurrent Requests: {}", config.concurrent_requests());
    }
    println!("  Report shape: {:?}", config.report_shape());
    println!("  Output: {}", config.output_path());
    println!();
}
