use ordered_float::OrderedFloat;
use serde_json::Number;

/// Numeric evidence: observed interval plus which literal forms were seen.
#[derive(Clone, Debug, PartialEq)]
pub struct NumC {
    pub min: OrderedFloat<f64>,
    pub max: OrderedFloat<f64>,
    /// Integral value that fits `i64`, including `1.0`.
    pub saw_int: bool,
    /// Integral literal above `i64::MAX`.
    pub saw_uint: bool,
    /// Value with a fractional part, or too large for `i64`.
    pub saw_float: bool,
}

impl NumC {
    pub fn observe(n: &Number) -> Self {
        let (value, saw_int, saw_uint) = if let Some(i) = n.as_i64() {
            (i as f64, true, false)
        } else if let Some(u) = n.as_u64() {
            (u as f64, false, true)
        } else {
            let f = n.as_f64().unwrap_or(0.0);
            // `1.0` and `1e2` are integers written as floats.
            (f, is_integral_f64(f), false)
        };
        Self {
            min: OrderedFloat(value),
            max: OrderedFloat(value),
            saw_int,
            saw_uint,
            saw_float: !saw_int && !saw_uint,
        }
    }

    pub(super) fn join(a: &Self, b: &Self) -> Self {
        Self {
            min: a.min.min(b.min),
            max: a.max.max(b.max),
            saw_int: a.saw_int || b.saw_int,
            saw_uint: a.saw_uint || b.saw_uint,
            saw_float: a.saw_float || b.saw_float,
        }
    }

    /// Every literal was an integer representable as `i64`.
    pub fn is_i64(&self) -> bool {
        self.saw_int && !self.saw_uint && !self.saw_float
    }

    pub fn is_i32(&self) -> bool {
        self.is_i64()
            && self.min.0 >= f64::from(i32::MIN)
            && self.max.0 <= f64::from(i32::MAX)
    }
}

fn is_integral_f64(f: f64) -> bool {
    f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(v: serde_json::Value) -> NumC {
        match v {
            serde_json::Value::Number(n) => NumC::observe(&n),
            other => panic!("not a number: {other}"),
        }
    }

    #[test]
    fn integer_ranges() {
        assert!(num(serde_json::json!(42)).is_i32());
        assert!(num(serde_json::json!(-2147483648i64)).is_i32());
        let wide = num(serde_json::json!(3_000_000_000i64));
        assert!(wide.is_i64() && !wide.is_i32());
        assert!(!num(serde_json::json!(u64::MAX)).is_i64());
    }

    #[test]
    fn integral_floats_count_as_integers() {
        assert!(num(serde_json::json!(1.0)).is_i32());
        assert!(num(serde_json::json!(1e2)).is_i32());
        assert!(num(serde_json::json!(-4.0e9)).is_i64());
        assert!(!num(serde_json::json!(1.0e19)).is_i64());
        assert!(!num(serde_json::json!(0.5)).is_i64());
    }

    #[test]
    fn fraction_poisons_integer_join() {
        let joined = NumC::join(&num(serde_json::json!(1)), &num(serde_json::json!(2.5)));
        assert!(!joined.is_i64());
        assert_eq!(joined.min, OrderedFloat(1.0));
        assert_eq!(joined.max, OrderedFloat(2.5));
    }
}
