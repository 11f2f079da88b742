//! The debugger seam (`spec.md` §4.5): a trait the host implements, plus
//! the `EnterDebugger` built-in's hook into it. Kept deliberately thin —
//! the actual interactive debugger (a REPL, a UI) lives outside this
//! crate; this only defines where it plugs in and what it's allowed to see.

use crate::errors::EvaluationError;
use crate::eval::CallingContext;
use crate::value::Value;

/// Where execution is when a hook fires, for a host to render a call stack
/// or highlight a source location.
#[derive(Debug, Clone, Copy)]
pub struct ExecutionPoint {
    pub line: u32,
    pub column: u32,
}

/// Implemented by whatever embeds the interpreter to observe or pause
/// execution (`spec.md` §4.5). Every method receives a **duplicated**
/// `CallingContext` (`CallingContext<'_>::duplicate_for_debugger`) so a hook
/// that runs Backwards code of its own — to print a watch expression, say —
/// cannot perturb the program it just interrupted.
pub trait DebuggerHook {
    /// Fired on every function call.
    fn on_enter(&self, function_name: &str, ctx: &mut CallingContext<'_>);
    /// Fired before each statement, for single-stepping.
    fn on_step(&self, point: ExecutionPoint, ctx: &mut CallingContext<'_>);
    /// Fired by the `EnterDebugger` built-in. Returning `Err` aborts the
    /// whole evaluation with `EvaluationError::DebuggerAbort`.
    fn on_breakpoint(&self, ctx: &mut CallingContext<'_>) -> Result<(), EvaluationError>;
    /// Fired when an `EvaluationError` is about to unwind past this frame.
    fn on_error(&self, error: &EvaluationError, ctx: &mut CallingContext<'_>);
}

/// Suspends evaluation and hands control to the registered debugger hook,
/// or succeeds immediately if none is attached (`spec.md` §4.6
/// `EnterDebugger`).
pub fn enter_debugger(ctx: &mut CallingContext<'_>) -> Result<Value, EvaluationError> {
    let Some(hook) = ctx.debugger.clone() else {
        return Ok(Value::Nil);
    };
    let mut duplicated = ctx.duplicate_for_debugger(ctx.logger);
    hook.borrow().on_breakpoint(&mut duplicated)?;
    Ok(Value::Nil)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoOpHook;
    impl DebuggerHook for NoOpHook {
        fn on_enter(&self, _function_name: &str, _ctx: &mut CallingContext<'_>) {}
        fn on_step(&self, _point: ExecutionPoint, _ctx: &mut CallingContext<'_>) {}
        fn on_breakpoint(&self, _ctx: &mut CallingContext<'_>) -> Result<(), EvaluationError> {
            Ok(())
        }
        fn on_error(&self, _error: &EvaluationError, _ctx: &mut CallingContext<'_>) {}
    }

    #[test]
    fn missing_hook_is_a_no_op() {
        // Exercised indirectly through eval::CallingContext<'_> in engine tests;
        // this just confirms the trait object is object-safe and usable.
        let _hook: Box<dyn DebuggerHook> = Box::new(NoOpHook);
    }
}
