use crate::core::CqlValue;

/// One pending mutation against a single attribute.
///
/// `InjectAtIndex`/`InjectAtKey` with a `CqlValue::Null` operand mean "null
/// this slot" and are distinct from `Remove`/`RemoveKey`, which eliminate
/// the slot entirely.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    Set(CqlValue),
    Append(CqlValue),
    Prepend(CqlValue),
    Add(CqlValue),
    Remove(CqlValue),
    /// Net signed counter delta; consecutive increments and decrements
    /// combine into one entry.
    Increment(i64),
    InjectAtIndex(i64, CqlValue),
    InjectAtKey(CqlValue, CqlValue),
    RemoveKey(CqlValue),
}

/// Ordered log of pending mutations, keyed by attribute name.
///
/// Attribute order is first-touch order; mutation order within an attribute
/// is recording order. A tracker never requires a loaded row: blind updates
/// record mutations exactly like updates against a fetched instance.
#[derive(Debug, Clone, Default)]
pub struct ChangeTracker {
    changes: Vec<(String, Vec<Mutation>)>,
}

impl ChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whole-value replace. Discards every previously recorded mutation for
    /// the attribute.
    pub fn record_set(&mut self, attr: &str, value: CqlValue) {
        let entry = self.entry(attr);
        entry.clear();
        entry.push(Mutation::Set(value));
    }

    pub fn record_append(&mut self, attr: &str, value: CqlValue) {
        self.entry(attr).push(Mutation::Append(value));
    }

    pub fn record_prepend(&mut self, attr: &str, value: CqlValue) {
        self.entry(attr).push(Mutation::Prepend(value));
    }

    /// Set-semantics add: a value already tracked as added is not recorded
    /// twice.
    pub fn record_add(&mut self, attr: &str, value: CqlValue) {
        let entry = self.entry(attr);
        let duplicate = entry
            .iter()
            .any(|m| matches!(m, Mutation::Add(v) if *v == value));
        if !duplicate {
            entry.push(Mutation::Add(value));
        }
    }

    pub fn record_remove(&mut self, attr: &str, value: CqlValue) {
        self.entry(attr).push(Mutation::Remove(value));
    }

    /// Counter delta. Combines algebraically with an already-pending delta
    /// for the same attribute, since the target is a single counter column.
    pub fn record_increment(&mut self, attr: &str, delta: i64) {
        let entry = self.entry(attr);
        for mutation in entry.iter_mut() {
            if let Mutation::Increment(pending) = mutation {
                *pending += delta;
                return;
            }
        }
        entry.push(Mutation::Increment(delta));
    }

    pub fn record_decrement(&mut self, attr: &str, delta: i64) {
        self.record_increment(attr, -delta);
    }

    pub fn record_inject_at_index(&mut self, attr: &str, index: i64, value: CqlValue) {
        self.entry(attr).push(Mutation::InjectAtIndex(index, value));
    }

    pub fn record_inject_at_key(&mut self, attr: &str, key: CqlValue, value: CqlValue) {
        self.entry(attr).push(Mutation::InjectAtKey(key, value));
    }

    pub fn record_remove_key(&mut self, attr: &str, key: CqlValue) {
        self.entry(attr).push(Mutation::RemoveKey(key));
    }

    pub fn pending_for(&self, attr: &str) -> &[Mutation] {
        self.changes
            .iter()
            .find(|(name, _)| name == attr)
            .map(|(_, muts)| muts.as_slice())
            .unwrap_or(&[])
    }

    /// Attributes in first-touch order with their pending mutations.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Mutation])> {
        self.changes
            .iter()
            .map(|(name, muts)| (name.as_str(), muts.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.changes.iter().all(|(_, muts)| muts.is_empty())
    }

    pub fn clear(&mut self) {
        self.changes.clear();
    }

    /// Keeps only attributes the predicate accepts. Used to exclude key
    /// columns from UPDATE set clauses.
    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.changes.retain(|(name, _)| keep(name));
    }

    fn entry(&mut self, attr: &str) -> &mut Vec<Mutation> {
        if let Some(pos) = self.changes.iter().position(|(name, _)| name == attr) {
            &mut self.changes[pos].1
        } else {
            self.changes.push((attr.to_string(), Vec::new()));
            let last = self.changes.len() - 1;
            &mut self.changes[last].1
        }
    }
}
