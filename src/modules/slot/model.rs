use std::collections::{BTreeSet, HashMap};

use bson::{Bson, Document};

/// The distinct string keys a slot's reference field lists. A missing or
/// non-array field references nobody; non-string entries are ignored.
pub fn booked_by<'a>(doc: &'a Document, field: &str) -> BTreeSet<&'a str> {
    match doc.get(field) {
        Some(Bson::Array(items)) => items.iter().filter_map(Bson::as_str).collect(),
        _ => BTreeSet::new(),
    }
}

/// Reference count per subject key over a full scan of slots.
pub fn tally<'a, I>(docs: I, field: &str) -> HashMap<String, u64>
where
    I: IntoIterator<Item = &'a Document>,
{
    let mut counts: HashMap<String, u64> = HashMap::new();
    for doc in docs {
        for key in booked_by(doc, field) {
            *counts.entry(key.to_string()).or_default() += 1;
        }
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn duplicate_references_count_once() {
        let slot = doc! { "bookedBy": ["u1", "u1", "u3"] };
        let keys: Vec<&str> = booked_by(&slot, "bookedBy").into_iter().collect();
        assert_eq!(keys, vec!["u1", "u3"]);
    }

    #[test]
    fn tolerates_missing_and_odd_fields() {
        let docs = vec![
            doc! { "_id": "s1" },
            doc! { "_id": "s2", "bookedBy": "u1" },
            doc! { "_id": "s3", "bookedBy": ["u1", 7, null] },
            doc! { "_id": "s4", "bookedBy": ["u1", "u2"] },
        ];
        let counts = tally(&docs, "bookedBy");
        assert_eq!(counts.get("u1"), Some(&2));
        assert_eq!(counts.get("u2"), Some(&1));
        assert_eq!(counts.len(), 2);
    }
}
