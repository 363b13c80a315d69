//! The built-in native registry: `math.*` and `system.*` spirits invoked
//! via `Invoke the spirit of NAME upon args…`.
//!
//! Organized the way the teacher's standard library groups procedures by
//! category, but as plain closures rather than bytecode bodies, since
//! natives here are a host-side registry rather than compiled procedures.

use crate::interpreter::{Curse, NativeFn, Value};
use std::collections::HashMap;
use std::rc::Rc;

pub fn install_defaults(table: &mut HashMap<String, NativeFn>) {
    for (name, f) in math_natives() {
        table.insert(name.to_string(), f);
    }
    for (name, f) in system_natives() {
        table.insert(name.to_string(), f);
    }
}

fn require_whole(v: &Value, native: &str) -> Result<i64, Curse> {
    match v {
        Value::Whole(n) => Ok(*n),
        other => Err(Curse::new(format!(
            "The spirit '{}' was offered {} where a whole number was required.",
            native,
            other.display_canonical()
        ))),
    }
}

fn math_natives() -> Vec<(&'static str, NativeFn)> {
    let add: NativeFn = Rc::new(|args: &[Value]| {
        let a = require_whole(args.get(0).unwrap_or(&Value::Void), "math.add")?;
        let b = require_whole(args.get(1).unwrap_or(&Value::Void), "math.add")?;
        Ok(Value::Whole(a + b))
    });
    let divide: NativeFn = Rc::new(|args: &[Value]| {
        let a = require_whole(args.get(0).unwrap_or(&Value::Void), "math.divide")?;
        let b = require_whole(args.get(1).unwrap_or(&Value::Void), "math.divide")?;
        if b == 0 {
            return Err(Curse::new("Division by zero in spirit 'math.divide'.".to_string()));
        }
        Ok(Value::Whole(a / b))
    });
    vec![("math.add", add), ("math.divide", divide)]
}

fn system_natives() -> Vec<(&'static str, NativeFn)> {
    let len: NativeFn = Rc::new(|args: &[Value]| match args.get(0) {
        Some(Value::Phrase(p)) => Ok(Value::Whole(p.len() as i64)),
        Some(Value::Order(items)) => Ok(Value::Whole(items.len() as i64)),
        Some(Value::Tome(entries)) => Ok(Value::Whole(entries.len() as i64)),
        other => Err(Curse::new(format!(
            "The spirit 'system.len' cannot measure {}.",
            other.map(|v| v.display_canonical()).unwrap_or_default()
        ))),
    });
    vec![("system.len", len)]
}

/// Short one-line docs for each native, in the teacher's `(name, doc)`
/// documentation-table shape.
pub fn documentation() -> Vec<(&'static str, &'static str)> {
    vec![
        ("math.add", "(a, b) -> whole — sums two whole numbers"),
        ("math.divide", "(a, b) -> whole — divides a by b; raises a curse on b = 0"),
        ("system.len", "(collection) -> whole — length of a phrase, order, or tome"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn math_add_sums_arguments() {
        let mut table = HashMap::new();
        install_defaults(&mut table);
        let f = table.get("math.add").unwrap();
        let result = f(&[Value::Whole(2), Value::Whole(3)]).unwrap();
        assert_eq!(result, Value::Whole(5));
    }

    #[test]
    fn math_divide_by_zero_curses_with_exact_message() {
        let mut table = HashMap::new();
        install_defaults(&mut table);
        let f = table.get("math.divide").unwrap();
        let err = f(&[Value::Whole(10), Value::Whole(0)]).unwrap_err();
        assert_eq!(err.message, "Division by zero in spirit 'math.divide'.");
    }

    #[test]
    fn system_len_measures_a_phrase() {
        let mut table = HashMap::new();
        install_defaults(&mut table);
        let f = table.get("system.len").unwrap();
        let result = f(&[Value::phrase("Boromir")]).unwrap();
        assert_eq!(result, Value::Whole(7));
    }

    #[test]
    fn documentation_covers_every_native() {
        let docs = documentation();
        assert!(docs.iter().any(|(name, _)| *name == "math.add"));
        assert!(docs.iter().any(|(name, _)| *name == "math.divide"));
        assert!(docs.iter().any(|(name, _)| *name == "system.len"));
    }
}
