use std::{
    env::args_os,
    io::{stderr, stdout},
    process::ExitCode,
};

use jsjail::{Sandbox, SandboxConfig, codec, source::strip_code_fence};
use trace::init_tracing;

mod trace;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() -> anyhow::Result<ExitCode> {
    init_tracing()?;

    let source = args_os()
        .nth(1)
        .map(|arg| strip_code_fence(&arg.to_string_lossy()).to_string())
        .unwrap_or_default();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(Sandbox::new(SandboxConfig::default()).evaluate(source));
    // A timed-out script can still hold a blocking worker; do not wait for it.
    runtime.shutdown_background();

    let output = codec::encode(&result);
    output.write_to(&mut stdout().lock(), &mut stderr().lock())?;

    Ok(ExitCode::from(output.exit_code))
}
