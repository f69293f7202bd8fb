pub mod config;
pub mod dataset;
pub mod error;
pub mod eval;
pub mod prediction;
pub mod report;
pub mod rpc;

pub use error::{EvalError, Result};
pub use rpc::{rpc_evaluation, rpc_evaluation_with_density_map, Outcome, RpcOptions};

/// Sets up the tracing subscriber. `RUST_LOG` overrides the default `info` filter.
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
