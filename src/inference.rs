//! Shape inference over arbitrary JSON.
//!
//! JSON values are observed into a small evidence lattice `U` with at most one arm
//! per JSON kind. Observations of the same slot (array elements, the same key in
//! sibling objects, several documents) are merged with `join`, which is
//! associative, commutative and idempotent, so the result never depends on the
//! order samples arrive in. Lowering the evidence to message descriptors happens
//! in [`crate::lower`].
pub mod arr;
pub mod num;
pub mod obj;

use serde_json::{Map, Value};

use crate::config::ArrayStrategy;

pub use arr::ArrC;
pub use num::NumC;
pub use obj::ObjC;

// ------------------------------ State ------------------------------------- //

#[derive(Clone, Debug, Default, PartialEq)]
pub struct U {
    pub nullable: bool,
    pub has_bool: bool,
    pub has_str: bool,
    pub num: Option<NumC>,
    pub arr: Option<ArrC>,
    pub obj: Option<ObjC>,
}

impl U {
    pub fn empty() -> Self { Self::default() }

    /// Nothing but `null` (or nothing at all) was seen.
    pub fn is_untyped(&self) -> bool {
        !self.has_bool && !self.has_str
            && self.num.is_none() && self.arr.is_none() && self.obj.is_none()
    }

    /// Number of non-null kinds observed.
    pub fn arm_count(&self) -> usize {
        [self.has_bool, self.has_str, self.num.is_some(), self.arr.is_some(), self.obj.is_some()]
            .into_iter()
            .filter(|arm| *arm)
            .count()
    }

    /// The same evidence with the array arm removed.
    pub fn without_arr(&self) -> Self {
        Self { arr: None, ..self.clone() }
    }
}

// ------------------------------ Observe ----------------------------------- //

pub fn observe_value(v: &Value, strategy: ArrayStrategy) -> U {
    match v {
        Value::Null => U { nullable: true, ..U::default() },
        Value::Bool(_) => U { has_bool: true, ..U::default() },
        Value::Number(n) => U { num: Some(NumC::observe(n)), ..U::default() },
        Value::String(_) => U { has_str: true, ..U::default() },
        Value::Array(xs) => observe_array(xs, strategy),
        Value::Object(m) => observe_object(m, strategy),
    }
}

fn observe_array(xs: &[Value], strategy: ArrayStrategy) -> U {
    let item = match strategy {
        ArrayStrategy::Unify => xs
            .iter()
            .fold(U::empty(), |acc, el| join(&acc, &observe_value(el, strategy))),
        ArrayStrategy::FirstElement => xs
            .first()
            .map(|el| observe_value(el, strategy))
            .unwrap_or_default(),
    };
    U { arr: Some(ArrC::observed(item)), ..U::default() }
}

fn observe_object(map: &Map<String, Value>, strategy: ArrayStrategy) -> U {
    let mut obj = ObjC::default();
    for (k, v) in map {
        obj.fields.insert(k.clone(), observe_value(v, strategy));
    }
    U { obj: Some(obj), ..U::default() }
}

// -------------------------------- Join (⊔) -------------------------------- //

pub fn join(a: &U, b: &U) -> U {
    U {
        nullable: a.nullable || b.nullable,
        has_bool: a.has_bool || b.has_bool,
        has_str: a.has_str || b.has_str,
        num: join_opt(&a.num, &b.num, NumC::join),
        arr: join_opt(&a.arr, &b.arr, ArrC::join),
        obj: join_opt(&a.obj, &b.obj, ObjC::join),
    }
}

fn join_opt<T: Clone>(a: &Option<T>, b: &Option<T>, f: impl Fn(&T, &T) -> T) -> Option<T> {
    match (a, b) {
        (None, None) => None,
        (Some(x), None) | (None, Some(x)) => Some(x.clone()),
        (Some(x), Some(y)) => Some(f(x, y)),
    }
}

// ------------------------------- Front API -------------------------------- //

/// Accumulates observations from one or more samples.
pub struct Inference {
    state: U,
    strategy: ArrayStrategy,
}

impl Inference {
    pub fn new(strategy: ArrayStrategy) -> Self {
        Self { state: U::empty(), strategy }
    }

    pub fn observe_value(&mut self, v: &Value) {
        let obs = observe_value(v, self.strategy);
        self.state = join(&self.state, &obs);
    }

    pub fn solve(&self) -> U {
        self.state.clone()
    }
}

pub fn infer_from_values<'a, I>(values: I, strategy: ArrayStrategy) -> U
where
    I: IntoIterator<Item = &'a Value>,
{
    let mut inference = Inference::new(strategy);
    for v in values {
        inference.observe_value(v);
    }
    inference.solve()
}

// ------------------------------- Tests ------------------------------------ //
