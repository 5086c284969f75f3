use std::sync::Arc;

use rquickjs::{Ctx, Function, IntoJs, Object, Value, convert::Coerced, function::Rest};

use super::serde::js_to_json;
use crate::{
    error::{Error, Result},
    host::LogSink,
};

/// Attach `value` to the jail under `name`.
pub fn bind<'js, V>(ctx: &Ctx<'js>, name: &str, value: V) -> Result<()>
where
    V: IntoJs<'js>,
{
    ctx.globals()
        .set(name, value)
        .map_err(|e| Error::Binding(format!("{name}: {e}")))
}

/// Install the jail and the logging capability. Nothing else from the host
/// becomes reachable from script code.
pub fn install(ctx: &Ctx<'_>, sink: Arc<dyn LogSink>) -> Result<()> {
    let jail = ctx.globals();
    bind(ctx, "global", jail)?;

    let console = console(ctx, sink).map_err(|e| Error::Binding(format!("console: {e}")))?;
    bind(ctx, "console", console)
}

fn console<'js>(ctx: &Ctx<'js>, sink: Arc<dyn LogSink>) -> rquickjs::Result<Object<'js>> {
    let console = Object::new(ctx.clone())?;
    let log = Function::new(ctx.clone(), move |args: Rest<Value<'js>>| {
        let rendered: Vec<String> = args.0.into_iter().map(render).collect();
        sink.log(&rendered);
    })?;
    console.set("log", log)?;
    Ok(console)
}

/// Text form of one `console.log` argument: strings verbatim, plain data as
/// JSON, anything else through the script's own `String()` conversion.
fn render(value: Value<'_>) -> String {
    if let Some(s) = value.as_string() {
        return s.to_string().unwrap_or_default();
    }
    if value.is_undefined() {
        return "undefined".to_string();
    }
    if (value.is_array() || value.is_object())
        && !value.is_function()
        && let Ok(json) = js_to_json(value.clone())
    {
        return json.to_string();
    }
    value
        .get::<Coerced<String>>()
        .map_or_else(|_| value.type_of().as_str().to_string(), |s| s.0)
}
