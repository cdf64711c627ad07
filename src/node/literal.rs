use crate::clone::CloneContext;
use crate::error::{Error, Result};

/// The typed value a [`Literal`] node stores.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Int(i64),
    Float(f64),
}

impl Value {
    fn format(&self) -> String {
        match self {
            Value::Str(s) => s.clone(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
        }
    }
}

/// Unifies the spec's `Plain`, `SettablePlain` and `Var` variants: a typed
/// literal that is either read-only (`Plain`) or writable (`SettablePlain`,
/// `Var`, distinguished only by `settable`).
#[derive(Debug, Clone, PartialEq)]
pub struct Literal {
    pub value: Value,
    pub settable: bool,
}

impl Literal {
    pub fn string(s: impl Into<String>) -> Self {
        Literal {
            value: Value::Str(s.into()),
            settable: false,
        }
    }

    pub fn settable_string(s: impl Into<String>) -> Self {
        Literal {
            value: Value::Str(s.into()),
            settable: true,
        }
    }

    pub fn settable_int(v: i64) -> Self {
        Literal {
            value: Value::Int(v),
            settable: true,
        }
    }

    pub fn settable_float(v: f64) -> Self {
        Literal {
            value: Value::Float(v),
            settable: true,
        }
    }

    pub fn get(&self) -> Result<String> {
        Ok(self.value.format())
    }

    pub fn get_int(&self) -> Result<i64> {
        match &self.value {
            Value::Int(i) => Ok(*i),
            Value::Float(f) => Ok(*f as i64),
            Value::Str(s) => s
                .trim()
                .parse()
                .map_err(|_| Error::TypeMismatch(format!("'{s}' is not an integer"))),
        }
    }

    pub fn get_float(&self) -> Result<f64> {
        match &self.value {
            Value::Float(f) => Ok(*f),
            Value::Int(i) => Ok(*i as f64),
            Value::Str(s) => s
                .trim()
                .parse()
                .map_err(|_| Error::TypeMismatch(format!("'{s}' is not a float"))),
        }
    }

    pub fn set(&mut self, new_value: &str) -> bool {
        if !self.settable {
            return false;
        }
        match &self.value {
            Value::Str(_) => self.value = Value::Str(new_value.to_string()),
            Value::Int(_) => match new_value.trim().parse::<i64>() {
                Ok(v) => self.value = Value::Int(v),
                Err(_) => return false,
            },
            Value::Float(_) => match new_value.trim().parse::<f64>() {
                Ok(v) => self.value = Value::Float(v),
                Err(_) => return false,
            },
        }
        true
    }

    pub fn clone_node(&self, _ctx: &mut CloneContext) -> Literal {
        self.clone()
    }
}
