//! Evaluation in the hosting page's JavaScript engine.

use js_sys::{Array, Function, Reflect};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};

use super::{ScriptError, CONSOLE_SHIM};
use crate::sandbox::console::CaptureSink;
use crate::sandbox::limits::ExecutionLimits;

pub(super) fn run(
    source: &str,
    sink: CaptureSink,
    _limits: &ExecutionLimits,
) -> Result<(), ScriptError> {
    let print = Closure::<dyn Fn(String)>::new(move |line: String| sink.print(line));
    let constructor = global_function("Function")?;

    let shim_body = format!("return {CONSOLE_SHIM}");
    let shim = construct(&constructor, &[shim_body.as_str()])?;
    let console = shim
        .call0(&JsValue::UNDEFINED)
        .and_then(|factory| {
            factory
                .dyn_into::<Function>()?
                .call1(&JsValue::UNDEFINED, print.as_ref())
        })
        .map_err(describe)?;

    let script = construct(&constructor, &["console", source])?;
    script
        .call1(&JsValue::UNDEFINED, &console)
        .map(drop)
        .map_err(describe)
}

fn global_function(name: &str) -> Result<Function, ScriptError> {
    Reflect::get(&js_sys::global(), &JsValue::from_str(name))
        .and_then(|value| value.dyn_into::<Function>().map_err(JsValue::from))
        .map_err(|_| ScriptError::internal(format!("{name} is not available")))
}

/// `new Function(...args)`, reporting syntax errors instead of throwing.
fn construct(constructor: &Function, args: &[&str]) -> Result<Function, ScriptError> {
    let args: Array = args.iter().map(|arg| JsValue::from_str(arg)).collect();
    Reflect::construct(constructor, &args)
        .and_then(|value| value.dyn_into::<Function>().map_err(JsValue::from))
        .map_err(describe)
}

fn describe(thrown: JsValue) -> ScriptError {
    let text = text_of(&thrown);
    if !thrown.is_object() {
        return ScriptError::uncaught(None, None, text);
    }
    let name = Reflect::get(&thrown, &JsValue::from_str("name"))
        .ok()
        .and_then(|name| name.as_string());
    let message = Reflect::get(&thrown, &JsValue::from_str("message"))
        .ok()
        .filter(|message| !message.is_undefined() && !message.is_null())
        .map(|message| text_of(&message));
    ScriptError::uncaught(name.as_deref(), message, text)
}

fn text_of(value: &JsValue) -> String {
    if let Some(text) = value.as_string() {
        return text;
    }
    global_function("String")
        .ok()
        .and_then(|string| string.call1(&JsValue::UNDEFINED, value).ok())
        .and_then(|text| text.as_string())
        .unwrap_or_else(|| "uncaught exception".to_string())
}
