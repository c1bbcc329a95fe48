//! Jinja2-compatible template rendering and expression evaluation.
//!
//! Everything downstream (task controls, module parameters, the `when`/
//! `until` conditions) goes through the functions here rather than touching
//! `minijinja` directly, so the fail-open behavior described in the design
//! (a bad leaf never aborts a whole render) lives in one place.

mod filters;

use minijinja::value::Value as JinjaValue;
use minijinja::Environment;
use serde_json::Value as JsonValue;

use crate::error::{Error, Result};

/// Wraps a `minijinja::Environment` with the engine's filter set and the
/// render/eval contract the rest of the crate relies on.
pub struct TemplateEngine {
    env: Environment<'static>,
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateEngine {
    /// Build a fresh engine with all built-in filters registered.
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(minijinja::UndefinedBehavior::Lenient);
        crate::plugins::filter::FilterRegistry::register_all(&mut env);
        filters::register_extra(&mut env);
        Self { env }
    }

    /// `true` if `text` contains an embedded `{{ … }}` substitution. Plain
    /// strings are returned unchanged by [`Self::render_template`], but
    /// callers that want to avoid rendering cost entirely (e.g.
    /// `eval_iterative`) can check this first.
    pub fn looks_like_template(text: &str) -> bool {
        text.contains("{{") && text.contains("}}")
    }

    /// Render a string template against `scope`. Strings without `{{ }}`
    /// pass through unchanged without touching the Jinja engine.
    pub fn render_template(&self, text: &str, scope: &JsonValue) -> Result<String> {
        if !Self::looks_like_template(text) {
            return Ok(text.to_string());
        }
        let ctx = JinjaValue::from_serialize(scope);
        self.env
            .render_str(text, ctx)
            .map_err(|e| Error::Template {
                context: text.to_string(),
                message: e.to_string(),
            })
    }

    /// Evaluate a single expression against `scope`, returning the native
    /// result (not coerced to a string). Accepts either a bare expression or
    /// one wrapped in `{{ }}`.
    pub fn eval_expression(&self, expr: &str, scope: &JsonValue) -> Result<JsonValue> {
        let inner = strip_braces(expr);
        let compiled = self
            .env
            .compile_expression(inner)
            .map_err(|e| Error::Template {
                context: expr.to_string(),
                message: e.to_string(),
            })?;
        let ctx = JinjaValue::from_serialize(scope);
        let value = compiled.eval(ctx).map_err(|e| Error::Template {
            context: expr.to_string(),
            message: e.to_string(),
        })?;
        jinja_to_json(value)
    }

    /// Evaluate `expr` and coerce the result to a boolean following the
    /// engine's truthiness rules (empty string/list/map, zero, null, and
    /// `false` are falsy; everything else is truthy).
    pub fn eval_bool(&self, expr: &str, scope: &JsonValue) -> Result<bool> {
        Ok(is_truthy(&self.eval_expression(expr, scope)?))
    }

    /// JSON round-trip every string leaf of `obj` through
    /// [`Self::render_template`]. Non-string leaves, and strings with no
    /// `{{ }}`, are passed through unchanged.
    pub fn eval_object_values(&self, obj: &JsonValue, scope: &JsonValue) -> Result<JsonValue> {
        match obj {
            JsonValue::String(s) => Ok(JsonValue::String(self.render_template(s, scope)?)),
            JsonValue::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.eval_object_values(item, scope)?);
                }
                Ok(JsonValue::Array(out))
            }
            JsonValue::Object(map) => {
                let mut out = serde_json::Map::with_capacity(map.len());
                for (k, v) in map {
                    out.insert(k.clone(), self.eval_object_values(v, scope)?);
                }
                Ok(JsonValue::Object(out))
            }
            other => Ok(other.clone()),
        }
    }

    /// Recursively render strings that *look like* templates, never
    /// propagating a render error for an individual leaf — on failure the
    /// original literal is kept. In `deep` mode, object keys are visited in
    /// declaration order and each key's rendered result is merged into
    /// `scope` before the next key is evaluated, so later keys can refer to
    /// earlier ones (`b: "{{ a }}/…"`).
    pub fn eval_iterative(&self, value: &JsonValue, scope: &JsonValue, deep: bool) -> JsonValue {
        match value {
            JsonValue::String(s) => {
                if !Self::looks_like_template(s) {
                    return value.clone();
                }
                match self.render_template(s, scope) {
                    Ok(rendered) => JsonValue::String(rendered),
                    Err(_) => value.clone(),
                }
            }
            JsonValue::Array(items) => JsonValue::Array(
                items
                    .iter()
                    .map(|item| self.eval_iterative(item, scope, deep))
                    .collect(),
            ),
            JsonValue::Object(map) => {
                let mut out = serde_json::Map::with_capacity(map.len());
                let mut working_scope = scope.clone();
                for (k, v) in map {
                    let rendered = self.eval_iterative(v, &working_scope, deep);
                    if deep {
                        if let Some(obj) = working_scope.as_object_mut() {
                            obj.insert(k.clone(), rendered.clone());
                        }
                    }
                    out.insert(k.clone(), rendered);
                }
                JsonValue::Object(out)
            }
            other => other.clone(),
        }
    }
}

fn strip_braces(expr: &str) -> &str {
    let trimmed = expr.trim();
    if let Some(inner) = trimmed
        .strip_prefix("{{")
        .and_then(|s| s.strip_suffix("}}"))
    {
        inner.trim()
    } else {
        trimmed
    }
}

fn jinja_to_json(value: JinjaValue) -> Result<JsonValue> {
    serde_json::to_value(&value).map_err(Error::Json)
}

/// Truthiness used by `when`/`until`/`break_when`: matches the design's
/// "empty string/list/map, zero, null, false are falsy" rule.
pub fn is_truthy(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => false,
        JsonValue::Bool(b) => *b,
        JsonValue::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        JsonValue::String(s) => !s.is_empty(),
        JsonValue::Array(a) => !a.is_empty(),
        JsonValue::Object(o) => !o.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn passthrough_for_plain_strings() {
        let engine = TemplateEngine::new();
        let scope = json!({});
        assert_eq!(engine.render_template("no templates here", &scope).unwrap(), "no templates here");
    }

    #[test]
    fn renders_simple_substitution() {
        let engine = TemplateEngine::new();
        let scope = json!({"name": "web01"});
        assert_eq!(engine.render_template("host-{{ name }}", &scope).unwrap(), "host-web01");
    }

    #[test]
    fn eval_expression_returns_native_type() {
        let engine = TemplateEngine::new();
        let scope = json!({"count": 3});
        let result = engine.eval_expression("count > 1", &scope).unwrap();
        assert_eq!(result, json!(true));
    }

    #[test]
    fn eval_expression_strips_outer_braces() {
        let engine = TemplateEngine::new();
        let scope = json!({"x": 5});
        let result = engine.eval_expression("{{ x * 2 }}", &scope).unwrap();
        assert_eq!(result, json!(10));
    }

    #[test]
    fn eval_iterative_fails_open_on_bad_leaf() {
        let engine = TemplateEngine::new();
        let scope = json!({});
        let value = json!({"a": "{{ undefined_fn_call_xyz() }}"});
        // Undefined function calls error in strict mode; with lenient
        // undefined behavior this renders to an empty string rather than
        // erroring, but eval_iterative must never propagate a panic either
        // way.
        let result = engine.eval_iterative(&value, &scope, false);
        assert!(result.is_object());
    }

    #[test]
    fn eval_iterative_deep_mode_threads_scope() {
        let engine = TemplateEngine::new();
        let scope = json!({});
        let value = json!({"a": "root", "b": "{{ a }}/child"});
        let result = engine.eval_iterative(&value, &scope, true);
        assert_eq!(result["b"], json!("root/child"));
    }

    #[test]
    fn truthiness_matches_design_rules() {
        assert!(!is_truthy(&json!(null)));
        assert!(!is_truthy(&json!(false)));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!("")));
        assert!(!is_truthy(&json!([])));
        assert!(is_truthy(&json!("x")));
        assert!(is_truthy(&json!(1)));
    }
}
