use super::U;

/// Array evidence: one pooled hypothesis for the element type.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ArrC {
    pub item: Box<U>,
}

impl ArrC {
    pub(super) fn observed(item: U) -> Self {
        Self { item: Box::new(item) }
    }

    pub(super) fn join(a: &Self, b: &Self) -> Self {
        Self { item: Box::new(super::join(&a.item, &b.item)) }
    }
}
