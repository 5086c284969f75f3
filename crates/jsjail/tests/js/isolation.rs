use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::json;

use super::common::{json, sandbox, sandbox_with_sink, sandbox_with_timeout};

#[tokio::test]
async fn integration_js_globals_do_not_leak_between_invocations() -> Result<()> {
    let sandbox = sandbox();
    let first = json(sandbox.evaluate("globalThis.leak = 42; var alsoLeak = 1; leak").await)?;
    assert_eq!(first, json!(42));

    let second = json(sandbox.evaluate("[typeof leak, typeof alsoLeak]").await)?;
    assert_eq!(second, json!(["undefined", "undefined"]));
    Ok(())
}

#[tokio::test]
async fn integration_js_prototype_changes_do_not_leak() -> Result<()> {
    let sandbox = sandbox();
    json(sandbox.evaluate("Array.prototype.poisoned = true; 0").await)?;
    let value = json(sandbox.evaluate("typeof [].poisoned").await)?;
    assert_eq!(value, json!("undefined"));
    Ok(())
}

#[tokio::test]
async fn integration_js_reinstantiate_smoke() -> Result<()> {
    let sandbox = sandbox();
    for expected in [7_i64, 11_i64] {
        let value = json(sandbox.evaluate(format!("{expected}")).await)?;
        assert_eq!(value, json!(expected));
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn integration_js_concurrent_invocations_are_independent() -> Result<()> {
    let (sandbox, sink) = sandbox_with_sink();
    let mut tasks = Vec::new();
    for i in 0..8 {
        let sandbox = sandbox.clone();
        tasks.push(tokio::spawn(async move {
            sandbox
                .evaluate(format!(
                    "var id = {i}; console.log('task', id); for (let n = 0; n < 10000; n++) {{}} id * 10"
                ))
                .await
        }));
    }

    for (i, task) in tasks.into_iter().enumerate() {
        let result = task.await.context("evaluation task panicked")?;
        assert_eq!(json(result)?, json!(i * 10));
    }

    let mut ids: Vec<String> = sink.calls().into_iter().map(|call| call[1].clone()).collect();
    ids.sort();
    let expected: Vec<String> = (0..8).map(|i| i.to_string()).collect();
    assert_eq!(ids, expected);
    Ok(())
}

#[tokio::test]
async fn integration_js_timeout_does_not_affect_next_invocation() -> Result<()> {
    let sandbox = sandbox_with_timeout(Duration::from_millis(100));
    let result = sandbox.evaluate("while (true) {}").await;
    assert!(!result.is_success());

    let value = json(sandbox.evaluate("'fresh'").await)?;
    assert_eq!(value, json!("fresh"));
    Ok(())
}
