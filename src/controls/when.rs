//! `when` control (order 20): evaluates an expression against
//! `ctx.variables` before `execute`; false short-circuits the task to
//! `{changed:false, skipped:true}`.

use crate::error::Result;
use crate::executor::TaskContext;

pub fn evaluate(expr: &str, ctx: &TaskContext) -> Result<bool> {
    ctx.templates.eval_bool(expr, &ctx.scope())
}
