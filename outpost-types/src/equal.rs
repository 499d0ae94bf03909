use crate::Value;

/// Performs a structural equality check between two values.
///
/// Arrays compare element by element, objects key by key (ordering of keys
/// is irrelevant). Two `NaN` numbers are considered equal so that writing the
/// same unparseable number twice does not register as a change.
///
/// # Examples
///
/// ```
/// use outpost_types::{deep_equal, Value};
///
/// let a = Value::from(vec![Value::from(1), Value::from("x")]);
/// let b = Value::from(vec![Value::from(1), Value::from("x")]);
/// assert!(deep_equal(&a, &b));
/// assert!(deep_equal(&Value::Number(f64::NAN), &Value::Number(f64::NAN)));
/// ```
pub fn deep_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Number(a), Value::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Date(a), Value::Date(b)) => a == b,
        (Value::Id(a), Value::Id(b)) => a == b,

        (Value::Array(arr_a), Value::Array(arr_b)) => {
            arr_a.len() == arr_b.len() && arr_a.iter().zip(arr_b).all(|(x, y)| deep_equal(x, y))
        }

        (Value::Object(obj_a), Value::Object(obj_b)) => {
            if obj_a.len() != obj_b.len() {
                return false;
            }
            obj_a
                .iter()
                .all(|(key, val_a)| obj_b.get(key).is_some_and(|val_b| deep_equal(val_a, val_b)))
        }

        _ => false,
    }
}
