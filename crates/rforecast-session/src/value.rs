//! Typed values returned by remote evaluation.

use rforecast_core::{Error, Result};

/// Value of an evaluated R expression, reduced to the shapes the client
/// consumes. Attributes (class, names, tsp) are not carried.
#[derive(Debug, Clone, PartialEq)]
pub enum RValue {
    Null,
    /// Logical vector; `None` is NA.
    Logical(Vec<Option<bool>>),
    /// Integer vector; `None` is NA.
    Integer(Vec<Option<i32>>),
    /// Double vector; NA arrives as NaN.
    Double(Vec<f64>),
    /// Character vector; `None` is NA.
    Str(Vec<Option<String>>),
    /// Generic vector or pairlist.
    List(Vec<RValue>),
    /// A type the client does not decode (closures, environments, ...).
    Unsupported(u8),
}

impl RValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            RValue::Null => "NULL",
            RValue::Logical(_) => "logical",
            RValue::Integer(_) => "integer",
            RValue::Double(_) => "double",
            RValue::Str(_) => "character",
            RValue::List(_) => "list",
            RValue::Unsupported(_) => "unsupported",
        }
    }

    pub fn len(&self) -> usize {
        match self {
            RValue::Null | RValue::Unsupported(_) => 0,
            RValue::Logical(v) => v.len(),
            RValue::Integer(v) => v.len(),
            RValue::Double(v) => v.len(),
            RValue::Str(v) => v.len(),
            RValue::List(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn mismatch(&self, expected: &'static str) -> Error {
        Error::TypeMismatch {
            expected,
            found: format!("{} of length {}", self.type_name(), self.len()),
        }
    }

    /// First element as an integer. Logicals map to 1/0, doubles are
    /// truncated; NA and empty vectors are mismatches.
    pub fn as_integer(&self) -> Result<i32> {
        let value = match self {
            RValue::Logical(v) => v.first().copied().flatten().map(i32::from),
            RValue::Integer(v) => v.first().copied().flatten(),
            RValue::Double(v) => v
                .first()
                .filter(|d| d.is_finite())
                .map(|d| *d as i32),
            _ => None,
        };
        value.ok_or_else(|| self.mismatch("integer"))
    }

    /// Whole vector as doubles. Integer NA becomes NaN.
    pub fn as_doubles(&self) -> Result<Vec<f64>> {
        match self {
            RValue::Double(v) => Ok(v.clone()),
            RValue::Integer(v) => Ok(v
                .iter()
                .map(|i| i.map(f64::from).unwrap_or(f64::NAN))
                .collect()),
            _ => Err(self.mismatch("numeric vector")),
        }
    }

    /// First element as a string.
    pub fn as_string(&self) -> Result<String> {
        match self {
            RValue::Str(v) => v
                .first()
                .cloned()
                .flatten()
                .ok_or_else(|| self.mismatch("string")),
            _ => Err(self.mismatch("string")),
        }
    }

    /// R truthiness of a scalar: non-zero is true.
    pub fn is_truthy(&self) -> Result<bool> {
        Ok(self.as_integer()? != 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logical_as_integer() {
        assert_eq!(RValue::Logical(vec![Some(true)]).as_integer().unwrap(), 1);
        assert_eq!(RValue::Logical(vec![Some(false)]).as_integer().unwrap(), 0);
        assert!(RValue::Logical(vec![None]).as_integer().is_err());
        assert!(RValue::Logical(vec![]).as_integer().is_err());
    }

    #[test]
    fn test_truthiness() {
        assert!(RValue::Logical(vec![Some(true)]).is_truthy().unwrap());
        assert!(!RValue::Integer(vec![Some(0)]).is_truthy().unwrap());
        assert!(RValue::Double(vec![2.0]).is_truthy().unwrap());
        assert!(RValue::Null.is_truthy().is_err());
    }

    #[test]
    fn test_as_doubles() {
        let v = RValue::Double(vec![1.5, 2.5]);
        assert_eq!(v.as_doubles().unwrap(), vec![1.5, 2.5]);

        let ints = RValue::Integer(vec![Some(3), None]).as_doubles().unwrap();
        assert_eq!(ints[0], 3.0);
        assert!(ints[1].is_nan());
    }

    #[test]
    fn test_mismatch_reports_shape() {
        let err = RValue::Str(vec![Some("x".into())]).as_doubles().unwrap_err();
        match err {
            Error::TypeMismatch { expected, found } => {
                assert_eq!(expected, "numeric vector");
                assert_eq!(found, "character of length 1");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_as_string() {
        let v = RValue::Str(vec![Some("R version 4.3.2".into())]);
        assert_eq!(v.as_string().unwrap(), "R version 4.3.2");
        assert!(RValue::Str(vec![None]).as_string().is_err());
        assert!(RValue::Double(vec![1.0]).as_string().is_err());
    }
}
