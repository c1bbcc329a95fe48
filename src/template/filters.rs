//! Filters that are specific to the task/control pipeline rather than
//! general-purpose templating, so they live next to the engine instead of
//! under `plugins::filter`.

use minijinja::value::ValueKind;
use minijinja::{Environment, Error as MinijinjaError, ErrorKind, Value};

/// Register the engine's own filters on top of [`crate::plugins::filter::FilterRegistry`].
pub fn register_extra(env: &mut Environment<'static>) {
    env.add_filter("ternary", ternary);
    env.add_filter("mandatory", mandatory);
    env.add_filter("bool", to_bool);
}

/// `{{ condition | ternary(true_val, false_val) }}`
fn ternary(condition: Value, true_val: Value, false_val: Value) -> Value {
    if condition.is_true() {
        true_val
    } else {
        false_val
    }
}

/// `{{ value | mandatory }}` — passes `value` through unless it is undefined
/// or null, in which case rendering fails with a clear message instead of
/// silently producing an empty string.
fn mandatory(value: Value) -> Result<Value, MinijinjaError> {
    if value.is_undefined() || value.kind() == ValueKind::None {
        return Err(MinijinjaError::new(
            ErrorKind::UndefinedError,
            "mandatory variable is undefined",
        ));
    }
    Ok(value)
}

/// `{{ value | bool }}` — coerces common string/number representations
/// ("yes"/"no", "1"/"0", "true"/"false") to a boolean.
fn to_bool(value: Value) -> bool {
    match value.kind() {
        ValueKind::Bool => value.is_true(),
        ValueKind::Number => value.to_string().parse::<f64>().map(|n| n != 0.0).unwrap_or(true),
        ValueKind::String => {
            let s = value.as_str().unwrap_or_default().to_ascii_lowercase();
            matches!(s.as_str(), "yes" | "true" | "1" | "on")
        }
        ValueKind::Undefined | ValueKind::None => false,
        _ => value.is_true(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use minijinja::Environment;

    fn env() -> Environment<'static> {
        let mut env = Environment::new();
        register_extra(&mut env);
        env
    }

    #[test]
    fn ternary_picks_branch() {
        let env = env();
        let result = env
            .render_str("{{ ok | ternary('yes', 'no') }}", minijinja::context! { ok => true })
            .unwrap();
        assert_eq!(result, "yes");
    }

    #[test]
    fn mandatory_fails_on_undefined() {
        let env = env();
        let err = env
            .render_str("{{ missing | mandatory }}", minijinja::context! {})
            .unwrap_err();
        assert!(err.to_string().contains("mandatory"));
    }

    #[test]
    fn bool_filter_parses_yes_no() {
        let env = env();
        let result = env
            .render_str("{{ 'yes' | bool }}", minijinja::context! {})
            .unwrap();
        assert_eq!(result, "true");
    }
}
