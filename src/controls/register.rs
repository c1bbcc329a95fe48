//! `register` control (order 30): after `execute`, writes the final
//! [`ModuleResult`] into `ctx.variables[<name>]`.

use crate::executor::TaskContext;
use crate::modules::ModuleResult;

pub fn apply(name: &str, ctx: &TaskContext, result: &ModuleResult) {
    let value = serde_json::to_value(result).unwrap_or(serde_json::Value::Null);
    ctx.set_variable(name, value);
}
