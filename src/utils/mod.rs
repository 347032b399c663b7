use std::sync::Once;

use tracing_subscriber::{filter::Directive, fmt, EnvFilter};

static TRACING_INIT: Once = Once::new();

const DEFAULT_DIRECTIVE: &str = "freelance_core=info";

/// Installs the global fmt subscriber; `RUST_LOG` refines the crate default.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        let mut filter = EnvFilter::from_default_env();
        if let Ok(directive) = DEFAULT_DIRECTIVE.parse::<Directive>() {
            filter = filter.add_directive(directive);
        }
        if fmt().with_env_filter(filter).try_init().is_err() {
            tracing::debug!("tracing subscriber already installed");
        }
    });
}
