use anyhow::Result;
use jsjail::{Error, InvocationResult, ScriptValue, codec};
use serde_json::json;

use super::common::{json, sandbox};

#[tokio::test]
async fn integration_js_last_expression_is_the_result() -> Result<()> {
    let sandbox = sandbox();
    assert_eq!(json(sandbox.evaluate("1+1").await)?, json!(2));
    assert_eq!(json(sandbox.evaluate("'a' + 'b'").await)?, json!("ab"));
    assert_eq!(json(sandbox.evaluate("1.5 * 2").await)?, json!(3));
    assert_eq!(json(sandbox.evaluate("0.25 + 0.5").await)?, json!(0.75));
    assert_eq!(json(sandbox.evaluate("let x = 4; x * x").await)?, json!(16));
    Ok(())
}

#[tokio::test]
async fn integration_js_structured_result() -> Result<()> {
    let value = json(
        sandbox()
            .evaluate("({ name: 'jail', list: [1, true, null, 'x'], nested: { ok: false } })")
            .await,
    )?;
    assert_eq!(
        value,
        json!({
            "name": "jail",
            "list": [1, true, null, "x"],
            "nested": { "ok": false },
        })
    );
    Ok(())
}

#[tokio::test]
async fn integration_js_no_trailing_expression_is_undefined() -> Result<()> {
    let result = sandbox().evaluate("var unused = 1;").await;
    assert_eq!(result, InvocationResult::Success(ScriptValue::Undefined));
    assert_eq!(codec::encode(&result).line, "undefined");
    Ok(())
}

#[tokio::test]
async fn integration_js_non_strict_top_level() -> Result<()> {
    // Assigning an undeclared name only works outside strict mode.
    let value = json(sandbox().evaluate("implicitGlobal = 7; implicitGlobal").await)?;
    assert_eq!(value, json!(7));
    Ok(())
}

#[tokio::test]
async fn integration_js_thrown_error_message() -> Result<()> {
    let result = sandbox().evaluate("throw new Error('x')").await;
    let Some(Error::Script { message, .. }) = result.error() else {
        panic!("expected script fault, got {result:?}");
    };
    assert_eq!(message, "x");

    let output = codec::encode(&result);
    assert_eq!(output.line, r#"{"error":"x"}"#);
    assert_ne!(output.exit_code, codec::EXIT_SUCCESS);
    Ok(())
}

#[tokio::test]
async fn integration_js_thrown_non_error_values() -> Result<()> {
    let sandbox = sandbox();

    let result = sandbox.evaluate("throw 'plain string'").await;
    assert_eq!(codec::encode(&result).line, r#"{"error":"plain string"}"#);

    let result = sandbox.evaluate("throw 42").await;
    assert_eq!(codec::encode(&result).line, r#"{"error":"42"}"#);

    let result = sandbox.evaluate("throw new Error('')").await;
    let message = result.error().map(ToString::to_string).unwrap_or_default();
    assert!(!message.is_empty());
    Ok(())
}

#[tokio::test]
async fn integration_js_syntax_error_is_a_fault() -> Result<()> {
    let result = sandbox().evaluate("1 +").await;
    let Some(Error::Script { message, .. }) = result.error() else {
        panic!("expected script fault, got {result:?}");
    };
    assert!(!message.is_empty());
    Ok(())
}

#[tokio::test]
async fn integration_js_promise_result_is_awaited() -> Result<()> {
    let sandbox = sandbox();
    let value = json(sandbox.evaluate("(async () => 40 + 2)()").await)?;
    assert_eq!(value, json!(42));

    let result = sandbox
        .evaluate("Promise.reject(new Error('nope'))")
        .await;
    assert_eq!(codec::encode(&result).line, r#"{"error":"nope"}"#);

    let result = sandbox.evaluate("new Promise(() => {})").await;
    assert_eq!(
        codec::encode(&result).line,
        r#"{"error":"promise never settled"}"#
    );
    Ok(())
}

#[tokio::test]
async fn integration_js_unserializable_results() -> Result<()> {
    let sandbox = sandbox();
    for source in [
        "(function f() {})",
        "Symbol('s')",
        "var a = {}; a.self = a; a",
        "10n",
        "[10n]",
    ] {
        let result = sandbox.evaluate(source).await;
        assert!(
            matches!(result, InvocationResult::Failure(Error::Serialization(_))),
            "{source}: {result:?}"
        );
        assert!(codec::encode(&result).line.starts_with(r#"{"error":"result is not serializable"#));
    }
    Ok(())
}

#[tokio::test]
async fn integration_js_result_follows_json_stringify() -> Result<()> {
    let sandbox = sandbox();
    for (source, expected) in [
        ("({ b: 1, a: 2 })", r#"{"b":1,"a":2}"#),
        ("({ a: undefined, b: 1, f() {}, s: Symbol('s') })", r#"{"b":1}"#),
        ("[undefined, () => 1, Symbol('s'), 0]", "[null,null,null,0]"),
        ("new Date(0)", r#""1970-01-01T00:00:00.000Z""#),
        ("({ when: new Date(0), n: NaN })", r#"{"when":"1970-01-01T00:00:00.000Z","n":null}"#),
        ("({ toJSON(key) { return { key, v: 1 }; } })", r#"{"key":"","v":1}"#),
        ("[{ toJSON(key) { return key; } }]", r#"["0"]"#),
    ] {
        let result = sandbox.evaluate(source).await;
        assert!(result.is_success(), "{source}: {result:?}");
        assert_eq!(codec::encode(&result).line, expected, "{source}");
    }

    let result = sandbox
        .evaluate("({ toJSON() { throw new Error('no json'); } })")
        .await;
    let Some(Error::Serialization(message)) = result.error() else {
        panic!("expected serialization failure, got {result:?}");
    };
    assert!(message.contains("no json"), "{message}");
    Ok(())
}

#[tokio::test]
async fn integration_js_user_thrown_out_of_memory_is_a_script_fault() -> Result<()> {
    let result = sandbox().evaluate("throw new Error('out of memory')").await;
    assert!(
        matches!(result.error(), Some(Error::Script { message, .. }) if message == "out of memory"),
        "{result:?}"
    );
    assert_eq!(codec::encode(&result).line, r#"{"error":"out of memory"}"#);
    Ok(())
}

#[tokio::test]
async fn integration_js_output_line_round_trips() -> Result<()> {
    let sandbox = sandbox();
    for source in [
        "null",
        "true",
        "-12",
        "3.25",
        "'multi\\nline \"quoted\"'",
        "[1, [2, [3, { k: 'v' }]], []]",
        "({ a: { b: { c: [null, false, 0.5] } } })",
    ] {
        let result = sandbox.evaluate(source).await;
        let InvocationResult::Success(value) = &result else {
            panic!("{source}: {result:?}");
        };
        let line = codec::encode(&result).line;
        assert!(!line.contains('\n'), "{source}: {line}");
        assert_eq!(&codec::decode_success(&line)?, value, "{source}");
    }
    Ok(())
}

#[tokio::test]
async fn integration_js_empty_source() -> Result<()> {
    let sandbox = sandbox();
    for source in ["", "   \n\t"] {
        let result = sandbox.evaluate(source).await;
        assert_eq!(result, InvocationResult::Failure(Error::NoScript));
        assert_eq!(
            codec::encode(&result).line,
            r#"{"error":"no script provided"}"#
        );
    }
    Ok(())
}
