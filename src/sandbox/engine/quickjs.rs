//! One QuickJS runtime per run.

use std::cell::Cell;
use std::rc::Rc;

use rquickjs::context::EvalOptions;
use rquickjs::runtime::InterruptHandler;
use rquickjs::{Coerced, Context, Ctx, Function, Object, Runtime, Value};

use super::{ScriptError, CONSOLE_SHIM, MEMORY_LIMIT_MESSAGE, STEP_LIMIT_MESSAGE};
use crate::sandbox::console::CaptureSink;
use crate::sandbox::limits::ExecutionLimits;

/// Steps QuickJS counts down between two interrupt checks.
const STEPS_PER_CHECK: u64 = 10_000;

pub(super) fn run(
    source: &str,
    sink: CaptureSink,
    limits: &ExecutionLimits,
) -> Result<(), ScriptError> {
    let runtime = Runtime::new().map_err(engine_failure)?;
    let context = Context::full(&runtime).map_err(engine_failure)?;
    runtime.set_memory_limit(limits.max_memory_bytes);
    runtime.set_max_stack_size(limits.max_stack_bytes);
    let exhausted = Rc::new(Cell::new(false));
    runtime.set_interrupt_handler(Some(step_budget(limits.max_steps, Rc::clone(&exhausted))));

    context.with(|ctx| evaluate(&ctx, source, sink).map_err(|err| failure(&ctx, err, &exhausted)))?;

    // Promise reactions queued by the script still print into this capture.
    loop {
        match runtime.execute_pending_job() {
            Ok(true) => {}
            Ok(false) => return Ok(()),
            Err(job) => {
                let context = job.0;
                return Err(context
                    .with(|ctx| failure(&ctx, rquickjs::Error::Exception, &exhausted)));
            }
        }
    }
}

fn evaluate<'js>(ctx: &Ctx<'js>, source: &str, sink: CaptureSink) -> rquickjs::Result<()> {
    let print = Function::new(ctx.clone(), move |line: String| sink.print(line))?;
    let shim: Function = ctx.eval(CONSOLE_SHIM)?;
    let console: Object = shim.call((print,))?;
    ctx.globals().set("console", console)?;

    let mut options = EvalOptions::default();
    options.strict = false;
    ctx.eval_with_options::<(), _>(source, options)
}

/// Interrupts evaluation once `max_steps` have been spent.
fn step_budget(max_steps: u64, exhausted: Rc<Cell<bool>>) -> InterruptHandler {
    let mut steps: u64 = 0;
    Box::new(move || {
        steps = steps.saturating_add(STEPS_PER_CHECK);
        if steps > max_steps {
            exhausted.set(true);
        }
        exhausted.get()
    })
}

fn failure(ctx: &Ctx<'_>, err: rquickjs::Error, exhausted: &Cell<bool>) -> ScriptError {
    if exhausted.get() {
        return ScriptError::limit(STEP_LIMIT_MESSAGE);
    }
    match err {
        rquickjs::Error::Exception => describe(ctx.catch()),
        other => engine_failure(other),
    }
}

fn describe(thrown: Value<'_>) -> ScriptError {
    let text = thrown
        .get::<Coerced<String>>()
        .map(|text| text.0)
        .unwrap_or_else(|_| "uncaught exception".to_string());
    match thrown.as_object() {
        Some(object) => {
            let name = property(object, "name");
            ScriptError::uncaught(name.as_deref(), property(object, "message"), text)
        }
        None => ScriptError::uncaught(None, None, text),
    }
}

fn property(object: &Object<'_>, key: &str) -> Option<String> {
    object
        .get::<_, Option<Coerced<String>>>(key)
        .ok()
        .flatten()
        .map(|value| value.0)
}

fn engine_failure(err: rquickjs::Error) -> ScriptError {
    match err {
        rquickjs::Error::Allocation => ScriptError::limit(MEMORY_LIMIT_MESSAGE),
        other => ScriptError::internal(other.to_string()),
    }
}
