use serde_json::Value;

use toolbridge_core::{Arguments, ParamType, ToolDescriptor};

/// Check arguments against a tool's schema and coerce them to the declared
/// types. Arguments the schema does not mention pass through untouched;
/// `null` counts as absent.
pub(crate) fn validate(descriptor: &ToolDescriptor, arguments: &Arguments) -> Result<Arguments, String> {
    let mut checked = Arguments::new();

    for (name, value) in arguments {
        let Some(param) = descriptor.param(name) else {
            checked.insert(name.clone(), value.clone());
            continue;
        };
        if value.is_null() {
            continue;
        }
        let coerced = coerce(param.ty, value).ok_or_else(|| {
            format!(
                "argument '{name}' must be {}, got {}",
                expected(param.ty),
                kind_of(value)
            )
        })?;
        checked.insert(name.clone(), coerced);
    }

    if let Some(missing) = descriptor
        .params
        .iter()
        .find(|p| p.required && !checked.contains_key(&p.name))
    {
        return Err(format!("missing required argument '{}'", missing.name));
    }

    Ok(checked)
}

/// Convert a value to `ty` if it is coercible.
pub(crate) fn coerce(ty: ParamType, value: &Value) -> Option<Value> {
    match (ty, value) {
        (ParamType::Raw, _)
        | (ParamType::String, Value::String(_))
        | (ParamType::Number, Value::Number(_))
        | (ParamType::Boolean, Value::Bool(_))
        | (ParamType::Array, Value::Array(_))
        | (ParamType::Object, Value::Object(_)) => Some(value.clone()),
        (ParamType::Integer, Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().and_then(integral))
            .map(Value::from),
        (ParamType::Integer, Value::String(s)) => s.trim().parse::<i64>().ok().map(Value::from),
        (ParamType::Number, Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number),
        (ParamType::Boolean, Value::String(s)) => match s.as_str() {
            "true" => Some(Value::Bool(true)),
            "false" => Some(Value::Bool(false)),
            _ => None,
        },
        _ => None,
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn integral(f: f64) -> Option<i64> {
    (f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64)
        .then_some(f as i64)
}

fn expected(ty: ParamType) -> &'static str {
    match ty {
        ParamType::String => "a string",
        ParamType::Integer => "an integer",
        ParamType::Number => "a number",
        ParamType::Boolean => "a boolean",
        ParamType::Array => "an array",
        ParamType::Object => "an object",
        ParamType::Raw => "any value",
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
