use std::collections::BTreeMap;

/// Per-field mismatch record for one table or user-defined type, computed
/// fresh on every reconciliation pass. Field names in `missing` keep the
/// desired declaration order; `extra` and `mismatched` follow the live
/// metadata's sort order.
#[derive(Debug, Clone, Default)]
pub struct FieldDiff {
    /// Desired but absent from the live schema.
    pub missing: Vec<String>,
    /// Live but absent from the desired schema.
    pub extra: Vec<String>,
    /// Present in both with different canonical types.
    pub mismatched: Vec<String>,
}

impl FieldDiff {
    /// Compares desired `(name, canonical type)` pairs against a live
    /// `name -> canonical type` map.
    pub fn compare(desired: &[(String, String)], live: &BTreeMap<String, String>) -> Self {
        let mut diff = FieldDiff::default();
        for (name, desired_type) in desired {
            match live.get(name) {
                None => diff.missing.push(name.clone()),
                Some(live_type) if live_type != desired_type => {
                    diff.mismatched.push(name.clone());
                }
                Some(_) => {}
            }
        }
        for name in live.keys() {
            if !desired.iter().any(|(d, _)| d == name) {
                diff.extra.push(name.clone());
            }
        }
        diff
    }

    pub fn is_clean(&self) -> bool {
        self.missing.is_empty() && self.extra.is_empty() && self.mismatched.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partitions_fields_into_three_sets() {
        let desired = vec![
            ("id".to_string(), "uuid".to_string()),
            ("name".to_string(), "text".to_string()),
            ("age".to_string(), "int".to_string()),
        ];
        let mut live = BTreeMap::new();
        live.insert("id".to_string(), "uuid".to_string());
        live.insert("name".to_string(), "blob".to_string());
        live.insert("legacy".to_string(), "text".to_string());

        let diff = FieldDiff::compare(&desired, &live);
        assert_eq!(diff.missing, vec!["age"]);
        assert_eq!(diff.extra, vec!["legacy"]);
        assert_eq!(diff.mismatched, vec!["name"]);
        assert!(!diff.is_clean());
    }
}
