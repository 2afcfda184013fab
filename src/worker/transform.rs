//! Per-record transforms
//!
//! A [`Transform`] wraps any thread-safe closure taking one record (unary) or
//! an aligned pair of records (pairwise). Built-in transforms are looked up by
//! name from configuration or the command line.

use crate::error::{PipelineError, Result};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

pub type UnaryFn = dyn Fn(i64) -> i64 + Send + Sync;
pub type PairwiseFn = dyn Fn(i64, i64) -> i64 + Send + Sync;

/// Number of inputs a transform consumes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Arity {
    Unary,
    Pairwise,
}

impl Arity {
    pub fn inputs(&self) -> usize {
        match self {
            Self::Unary => 1,
            Self::Pairwise => 2,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unary => f.pad("unary"),
            Self::Pairwise => f.pad("pairwise"),
        }
    }
}

#[derive(Clone)]
enum Function {
    Unary(Arc<UnaryFn>),
    Pairwise(Arc<PairwiseFn>),
}

#[derive(Clone)]
pub struct Transform {
    name: String,
    function: Function,
    positive_only: bool,
}

impl Transform {
    pub fn unary<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(i64) -> i64 + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            function: Function::Unary(Arc::new(f)),
            positive_only: false,
        }
    }

    pub fn pairwise<G>(name: impl Into<String>, g: G) -> Self
    where
        G: Fn(i64, i64) -> i64 + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            function: Function::Pairwise(Arc::new(g)),
            positive_only: false,
        }
    }

    /// Discard records that are zero or negative before applying the function
    pub fn positive_only(mut self) -> Self {
        self.positive_only = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arity(&self) -> Arity {
        match self.function {
            Function::Unary(_) => Arity::Unary,
            Function::Pairwise(_) => Arity::Pairwise,
        }
    }

    pub fn is_positive_only(&self) -> bool {
        self.positive_only
    }

    fn admits(&self, value: i64) -> bool {
        !self.positive_only || value > 0
    }

    /// Apply to one record; `None` when the record is filtered out or the
    /// transform is pairwise
    pub fn apply_unary(&self, value: i64) -> Option<i64> {
        match &self.function {
            Function::Unary(f) if self.admits(value) => Some(f(value)),
            _ => None,
        }
    }

    /// Apply to an aligned pair; `None` when either side is filtered out or the
    /// transform is unary
    pub fn apply_pairwise(&self, a: i64, b: i64) -> Option<i64> {
        match &self.function {
            Function::Pairwise(g) if self.admits(a) && self.admits(b) => Some(g(a, b)),
            _ => None,
        }
    }

    /// Look up a built-in transform by name
    pub fn builtin(name: &str) -> Result<Self> {
        let transform = match name {
            "identity" => Self::unary(name, |x| x),
            "double" => Self::unary(name, |x| x.saturating_mul(2)),
            "square" => Self::unary(name, |x| x.saturating_mul(x)),
            "heavy" => Self::unary(name, heavy).positive_only(),
            "sum" => Self::pairwise(name, i64::saturating_add),
            "difference" => Self::pairwise(name, i64::saturating_sub),
            "product" => Self::pairwise(name, i64::saturating_mul),
            other => {
                return Err(PipelineError::Transform(format!(
                    "unknown transform '{other}' (available: {})",
                    BUILTINS.iter().map(|b| b.name).collect::<Vec<_>>().join(", ")
                )));
            }
        };
        Ok(transform)
    }

    /// Check that the transform consumes exactly `inputs` inputs
    pub fn expect_inputs(&self, inputs: usize) -> Result<()> {
        if self.arity().inputs() == inputs {
            Ok(())
        } else {
            Err(PipelineError::Transform(format!(
                "transform '{}' is {} but {} input(s) were given",
                self.name,
                self.arity(),
                inputs
            )))
        }
    }
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transform")
            .field("name", &self.name)
            .field("arity", &self.arity())
            .field("positive_only", &self.positive_only)
            .finish()
    }
}

/// CPU-bound transform: `2x` plus ten rounds of `ceil(sqrt(x) * ln(x))`
fn heavy(x: i64) -> i64 {
    let n = x as f64;
    let mut load = 0i64;
    for _ in 0..10 {
        load = load.saturating_add((n.sqrt() * n.ln()).ceil() as i64);
    }
    x.saturating_mul(2).saturating_add(load)
}

/// Description of a built-in transform, for listings
#[derive(Debug, Clone, Copy, Serialize)]
pub struct BuiltinTransform {
    pub name: &'static str,
    pub arity: Arity,
    pub positive_only: bool,
    pub description: &'static str,
}

pub const BUILTINS: &[BuiltinTransform] = &[
    BuiltinTransform {
        name: "identity",
        arity: Arity::Unary,
        positive_only: false,
        description: "x",
    },
    BuiltinTransform {
        name: "double",
        arity: Arity::Unary,
        positive_only: false,
        description: "x * 2",
    },
    BuiltinTransform {
        name: "square",
        arity: Arity::Unary,
        positive_only: false,
        description: "x * x",
    },
    BuiltinTransform {
        name: "heavy",
        arity: Arity::Unary,
        positive_only: true,
        description: "2x + 10 * ceil(sqrt(x) * ln(x)), computed round by round",
    },
    BuiltinTransform {
        name: "sum",
        arity: Arity::Pairwise,
        positive_only: false,
        description: "a + b",
    },
    BuiltinTransform {
        name: "difference",
        arity: Arity::Pairwise,
        positive_only: false,
        description: "a - b",
    },
    BuiltinTransform {
        name: "product",
        arity: Arity::Pairwise,
        positive_only: false,
        description: "a * b",
    },
];
