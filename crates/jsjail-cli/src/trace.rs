use jsjail::TRACE_TARGET_SCRIPT;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{
    EnvFilter, Layer, filter::FilterFn, layer::SubscriberExt, util::SubscriberInitExt,
};

/// Script output and diagnostics both go to stderr; stdout is reserved for
/// the result line.
///
/// `console.log` lines are printed bare. Diagnostics follow `RUST_LOG` and
/// default to warnings.
pub fn init_tracing() -> anyhow::Result<()> {
    let envfilter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env()?
        .add_directive(format!("{TRACE_TARGET_SCRIPT}=off").parse()?);

    let script = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .without_time()
        .with_level(false)
        .with_target(false)
        .with_filter(FilterFn::new(|metadata| {
            metadata.target() == TRACE_TARGET_SCRIPT
        }));

    let diagnostics = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_filter(envfilter);

    tracing_subscriber::registry()
        .with(script)
        .with(diagnostics)
        .try_init()?;
    Ok(())
}
