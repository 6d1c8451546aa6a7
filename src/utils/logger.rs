use tracing::Dispatch;
use tracing_subscriber::{layer::SubscriberExt, EnvFilter};

fn env_filter(verbose: bool) -> EnvFilter {
    let fallback = if verbose {
        "sales_tax_etl=debug,info"
    } else {
        "sales_tax_etl=info"
    };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
}

/// Compact human-readable logger for terminal runs.
pub fn cli_dispatch(verbose: bool) -> Dispatch {
    let subscriber = tracing_subscriber::registry().with(env_filter(verbose)).with(
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .compact(),
    );
    Dispatch::new(subscriber)
}

/// JSON lines, for log collectors.
pub fn json_dispatch(verbose: bool) -> Dispatch {
    let subscriber = tracing_subscriber::registry().with(env_filter(verbose)).with(
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .json(),
    );
    Dispatch::new(subscriber)
}

pub fn init_cli_logger(verbose: bool) -> Dispatch {
    install(cli_dispatch(verbose))
}

pub fn init_json_logger(verbose: bool) -> Dispatch {
    install(json_dispatch(verbose))
}

fn install(dispatch: Dispatch) -> Dispatch {
    if tracing::dispatcher::set_global_default(dispatch.clone()).is_err() {
        tracing::debug!("Global logger already installed, keeping the existing one");
    }
    dispatch
}
