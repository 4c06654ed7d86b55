use indexmap::IndexMap;

use super::U;

/// Object evidence. Keys stay in first-seen order; that order becomes field order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ObjC {
    pub fields: IndexMap<String, U>,
}

impl ObjC {
    pub(super) fn join(a: &Self, b: &Self) -> Self {
        let mut out = a.clone();
        for (k, fb) in &b.fields {
            match out.fields.get_mut(k) {
                Some(fa) => *fa = super::join(fa, fb),
                None => {
                    out.fields.insert(k.clone(), fb.clone());
                }
            }
        }
        out
    }
}
