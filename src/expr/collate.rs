//! Value collation and truthiness

use std::cmp::Ordering;

use serde_json::Value;

/// A folded expression value. MISSING sorts below every JSON value.
#[derive(Debug, Clone, PartialEq)]
pub enum Datum {
    Missing,
    Value(Value),
}

fn type_rank(v: &Value) -> u8 {
    match v {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Total order over JSON values:
/// NULL < FALSE < TRUE < numbers < strings < arrays < objects.
///
/// Arrays compare element-wise, then by length. Objects compare by size,
/// then by sorted key, then by value.
pub fn collate(a: &Value, b: &Value) -> Ordering {
    let rank = type_rank(a).cmp(&type_rank(b));
    if rank != Ordering::Equal {
        return rank;
    }
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.as_bytes().cmp(y.as_bytes()),
        (Value::Array(x), Value::Array(y)) => {
            for (l, r) in x.iter().zip(y.iter()) {
                let o = collate(l, r);
                if o != Ordering::Equal {
                    return o;
                }
            }
            x.len().cmp(&y.len())
        }
        (Value::Object(x), Value::Object(y)) => {
            let size = x.len().cmp(&y.len());
            if size != Ordering::Equal {
                return size;
            }
            let mut xk: Vec<&String> = x.keys().collect();
            let mut yk: Vec<&String> = y.keys().collect();
            xk.sort();
            yk.sort();
            for (l, r) in xk.iter().zip(yk.iter()) {
                let o = l.cmp(r);
                if o != Ordering::Equal {
                    return o;
                }
            }
            for k in xk {
                let o = collate(&x[k.as_str()], &y[k.as_str()]);
                if o != Ordering::Equal {
                    return o;
                }
            }
            Ordering::Equal
        }
        _ => Ordering::Equal,
    }
}

pub fn collate_datum(a: &Datum, b: &Datum) -> Ordering {
    match (a, b) {
        (Datum::Missing, Datum::Missing) => Ordering::Equal,
        (Datum::Missing, _) => Ordering::Less,
        (_, Datum::Missing) => Ordering::Greater,
        (Datum::Value(x), Datum::Value(y)) => collate(x, y),
    }
}

/// Whether a value passes a filter.
pub fn truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Smallest string greater than every string starting with `prefix`.
///
/// Increments the last character; a character that cannot be incremented
/// is dropped and the one before it is tried instead. `None` when no such
/// string exists.
pub fn like_successor(prefix: &str) -> Option<String> {
    let mut chars: Vec<char> = prefix.chars().collect();
    while let Some(last) = chars.pop() {
        let mut code = last as u32 + 1;
        if (0xD800..=0xDFFF).contains(&code) {
            code = 0xE000;
        }
        if let Some(next) = char::from_u32(code) {
            chars.push(next);
            return Some(chars.into_iter().collect());
        }
    }
    None
}
