//! # Typed Filter Predicates
//!
//! A predicate is a conjunction of `{field, operator, value}` conditions. The
//! same structure filters tabular input records in memory and is translated
//! into bound SQL by the store, so no filter is ever built by gluing strings
//! into an expression.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
    /// Case-insensitive substring match.
    #[serde(rename = "like")]
    Like,
    /// Field missing or empty. The value is ignored.
    #[serde(rename = "is_null")]
    IsNull,
    #[serde(rename = "not_null")]
    NotNull,
}

impl Operator {
    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::Eq => "==",
            Operator::Ne => "!=",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::Like => "like",
            Operator::IsNull => "is_null",
            Operator::NotNull => "not_null",
        }
    }
}

impl FromStr for Operator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let op = match s.trim().to_ascii_lowercase().as_str() {
            "==" | "=" => Operator::Eq,
            "!=" | "<>" => Operator::Ne,
            "<" => Operator::Lt,
            "<=" => Operator::Le,
            ">" => Operator::Gt,
            ">=" => Operator::Ge,
            "like" => Operator::Like,
            "is_null" => Operator::IsNull,
            "not_null" => Operator::NotNull,
            other => return Err(Error::UnknownOperator(other.to_string())),
        };
        Ok(op)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    pub operator: Operator,
    #[serde(default)]
    pub value: String,
}

impl Condition {
    pub fn new(field: impl Into<String>, operator: Operator, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }

    /// Evaluates the condition against an already looked-up field value.
    pub fn test(&self, actual: Option<&str>) -> bool {
        let present = actual.filter(|v| !v.is_empty());

        match self.operator {
            Operator::IsNull => present.is_none(),
            Operator::NotNull => present.is_some(),
            Operator::Like => actual.is_some_and(|v| {
                v.to_ascii_lowercase()
                    .contains(&self.value.to_ascii_lowercase())
            }),
            op => {
                let Some(actual) = actual else {
                    return false;
                };
                let ord = compare(actual, &self.value);
                match op {
                    Operator::Eq => ord == Ordering::Equal,
                    Operator::Ne => ord != Ordering::Equal,
                    Operator::Lt => ord == Ordering::Less,
                    Operator::Le => ord != Ordering::Greater,
                    Operator::Gt => ord == Ordering::Greater,
                    Operator::Ge => ord != Ordering::Less,
                    _ => false,
                }
            }
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {:?}", self.field, self.operator.symbol(), self.value)
    }
}

/// Numeric comparison when both sides are numbers, text comparison otherwise.
fn compare(actual: &str, expected: &str) -> Ordering {
    match (actual.trim().parse::<f64>(), expected.trim().parse::<f64>()) {
        (Ok(a), Ok(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
        _ => actual.cmp(expected),
    }
}

/// All conditions must hold. An empty predicate accepts everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Predicate {
    pub conditions: Vec<Condition>,
}

impl Predicate {
    pub fn new(conditions: Vec<Condition>) -> Self {
        Self { conditions }
    }

    pub fn and(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn matches<'a, F>(&self, lookup: F) -> bool
    where
        F: Fn(&str) -> Option<&'a str>,
    {
        self.conditions.iter().all(|c| c.test(lookup(&c.field)))
    }
}
