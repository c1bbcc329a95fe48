//! `loop` control: wraps the whole control stack from the outside,
//! iterating the task over a list (or an expression evaluating to one),
//! setting `loop_var` (default `item`) and optional `index_var`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::executor::TaskContext;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopSpec {
    /// Either an inline list or a template/expression string evaluating to
    /// one.
    pub items: Value,
    #[serde(default = "default_loop_var")]
    pub loop_var: String,
    #[serde(default)]
    pub index_var: Option<String>,
    #[serde(default, rename = "pause")]
    pub pause_ms: Option<u64>,
    #[serde(default)]
    pub break_when: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub extended: bool,
}

fn default_loop_var() -> String {
    "item".to_string()
}

/// Resolve `items` to a concrete list: an inline array is used as-is; a
/// string is evaluated as an expression against `ctx.variables`.
pub fn resolve_items(spec: &LoopSpec, ctx: &TaskContext) -> Result<Vec<Value>> {
    match &spec.items {
        Value::Array(items) => Ok(items.clone()),
        Value::String(expr) => {
            let evaluated = ctx.templates.eval_expression(expr, &ctx.scope())?;
            match evaluated {
                Value::Array(items) => Ok(items),
                other => Err(Error::Template {
                    context: "loop".to_string(),
                    message: format!("expression did not evaluate to a list: {other}"),
                }),
            }
        }
        other => Err(Error::Template {
            context: "loop".to_string(),
            message: format!("unsupported loop items shape: {other}"),
        }),
    }
}

/// Bind `item`/`index_var` (and, in `extended` mode, `loop.index/.first/
/// .last/.length`) into `ctx.variables` for one iteration.
pub fn bind_item(spec: &LoopSpec, ctx: &TaskContext, item: &Value, index: usize, total: usize) {
    ctx.set_variable(&spec.loop_var, item.clone());
    if let Some(index_var) = &spec.index_var {
        ctx.set_variable(index_var, Value::from(index));
    }
    if spec.extended {
        let mut loop_obj = serde_json::Map::new();
        loop_obj.insert("index".to_string(), Value::from(index + 1));
        loop_obj.insert("index0".to_string(), Value::from(index));
        loop_obj.insert("first".to_string(), Value::from(index == 0));
        loop_obj.insert("last".to_string(), Value::from(index + 1 == total));
        loop_obj.insert("length".to_string(), Value::from(total));
        ctx.set_variable("loop", Value::Object(loop_obj));
    }
}
