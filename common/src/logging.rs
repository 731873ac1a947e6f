use anyhow::Result;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the fmt subscriber used by both daemons.
///
/// `RUST_LOG` still wins for anything it names; the directives only quiet the
/// HTTP and SQL stacks, which are chatty at info.
pub fn init_tracing(component: &str) -> Result<()> {
    let env_filter = EnvFilter::from_default_env()
        .add_directive(format!("{}=info", component).parse()?)
        .add_directive("ha_common=info".parse()?)
        .add_directive("tower_http=warn".parse()?)
        .add_directive("hyper=warn".parse()?)
        .add_directive("reqwest=warn".parse()?)
        .add_directive("sqlx=warn".parse()?);

    fmt().with_env_filter(env_filter).init();
    Ok(())
}
