use std::fmt;

/// All `k`-element subsets of `items`, in choose/skip order.
///
/// Elements keep their relative order inside each subset. Duplicate values are
/// treated as distinct positions. `k == 0` yields one empty subset and
/// `k > items.len()` yields none.
pub fn combinations<T: Clone>(items: &[T], k: usize) -> Vec<Vec<T>> {
    if k > items.len() {
        return Vec::new();
    }

    let mut out = Vec::with_capacity(binomial(items.len(), k));
    let mut current = Vec::with_capacity(k);
    expand(items, k, 0, &mut current, &mut out);
    out
}

fn expand<T: Clone>(items: &[T], k: usize, start: usize, current: &mut Vec<T>, out: &mut Vec<Vec<T>>) {
    if current.len() == k {
        out.push(current.clone());
        return;
    }

    let still_needed = k - current.len();
    for index in start..items.len() {
        if items.len() - index < still_needed {
            break;
        }
        current.push(items[index].clone());
        expand(items, k, index + 1, current, out);
        current.pop();
    }
}

/// `C(n, k)`, saturating at `usize::MAX`.
pub fn binomial(n: usize, k: usize) -> usize {
    if k > n {
        return 0;
    }
    let k = k.min(n - k);
    let mut result: usize = 1;
    for i in 0..k {
        // result * (n - i) is always divisible by (i + 1)
        result = match result.checked_mul(n - i) {
            Some(product) => product / (i + 1),
            None => return usize::MAX,
        };
    }
    result
}

/// Order-independent identity of a group of members.
///
/// Two groups with the same members in a different order compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComboKey(Vec<String>);

impl ComboKey {
    pub fn new<I, S>(members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut members: Vec<String> = members.into_iter().map(Into::into).collect();
        members.sort();
        Self(members)
    }

    /// Members in sorted order.
    pub fn members(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ComboKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(", "))
    }
}
