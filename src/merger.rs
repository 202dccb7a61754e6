use std::collections::BTreeMap;

use crate::data_models::{Kind, SearchResult};

impl SearchResult {
    /// Merges one more page into this result.
    ///
    /// `matches` is append-only, while `available`, `total` and `facets` are
    /// overwritten by every page that reports a non-zero total. Pages of a
    /// different kind are ignored. Callers merge pages in ascending index
    /// order so that match order follows page order.
    pub fn extend(&mut self, incoming: &SearchResult) {
        if let Some(kind) = incoming.kind {
            match self.kind {
                None => self.kind = Some(kind),
                Some(own) if own != kind => return,
                Some(_) => {}
            }
        }

        splice_raw(&mut self.raw, &incoming.raw);

        if incoming.total > 0 {
            self.available = incoming.available;
            self.total = incoming.total;
            self.matches.extend(incoming.matches.iter().cloned());
            self.facets = incoming.facets.clone();
        }
    }
}

/// Keeps the concatenated raw payload shaped like a JSON array of bodies.
fn splice_raw(target: &mut Vec<u8>, incoming: &[u8]) {
    if incoming.is_empty() {
        return;
    }
    if target.is_empty() {
        target.extend_from_slice(incoming);
        return;
    }
    if target.first() == Some(&b'[') && target.last() == Some(&b']') {
        target.pop();
    } else {
        target.insert(0, b'[');
    }
    target.extend_from_slice(b", ");
    target.extend_from_slice(incoming);
    target.push(b']');
}

/// Folds pages `1..=max_page` into one result, skipping missing indices.
pub fn merge_pages(kind: Kind, pages: &BTreeMap<usize, SearchResult>) -> SearchResult {
    let mut result = SearchResult::new(kind);
    for page in pages.values() {
        result.extend(page);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_models::Facet;
    use crate::record::Record;
    use serde_json::json;

    fn page(kind: Kind, total: u64, ips: &[&str]) -> SearchResult {
        let mut result = SearchResult::new(kind);
        result.total = total;
        result.available = total;
        result.matches = ips
            .iter()
            .map(|ip| Record::try_from(json!({ "ip": ip })).unwrap())
            .collect();
        result
            .facets
            .insert("country".into(), vec![Facet { name: json!(ips.len()), count: total }]);
        result.raw = format!("{{\"total\":{total}}}").into_bytes();
        result
    }

    fn ips(result: &SearchResult) -> Vec<String> {
        result.matches.iter().map(|m| m.find_string("ip")).collect()
    }

    #[test]
    fn test_extend_appends_in_page_order() {
        let mut result = SearchResult::default();
        result.extend(&page(Kind::Host, 100, &["a", "b"]));
        result.extend(&page(Kind::Host, 100, &["c"]));
        result.extend(&page(Kind::Host, 100, &["d", "e"]));
        assert_eq!(ips(&result), vec!["a", "b", "c", "d", "e"]);
        assert_eq!(result.kind, Some(Kind::Host));
    }

    #[test]
    fn test_extend_overwrites_scalars_and_facets() {
        let mut result = SearchResult::default();
        result.extend(&page(Kind::Web, 100, &["a", "b"]));
        result.extend(&page(Kind::Web, 90, &["c"]));
        assert_eq!(result.total, 90);
        assert_eq!(result.available, 90);
        assert_eq!(result.facets["country"][0].name, json!(1));
    }

    #[test]
    fn test_extend_zero_total_keeps_metadata() {
        let mut result = SearchResult::default();
        result.extend(&page(Kind::Host, 40, &["a"]));
        result.extend(&page(Kind::Host, 0, &["b"]));
        assert_eq!(result.total, 40);
        assert_eq!(result.available, 40);
        assert_eq!(result.facets["country"][0].count, 40);
        assert_eq!(ips(&result), vec!["a"]);
    }

    #[test]
    fn test_extend_kind_mismatch_is_noop() {
        let mut result = SearchResult::new(Kind::Host);
        result.extend(&page(Kind::Web, 10, &["a"]));
        assert!(result.matches.is_empty());
        assert_eq!(result.total, 0);
        assert!(result.raw.is_empty());
    }

    #[test]
    fn test_raw_payload_becomes_array() {
        let mut result = SearchResult::default();
        result.extend(&page(Kind::Host, 1, &[]));
        assert_eq!(result.raw, b"{\"total\":1}");
        result.extend(&page(Kind::Host, 2, &[]));
        assert_eq!(result.raw, b"[{\"total\":1}, {\"total\":2}]");
        result.extend(&page(Kind::Host, 3, &[]));
        let raw: serde_json::Value = serde_json::from_slice(&result.raw).unwrap();
        assert_eq!(raw.as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_merge_pages_skips_gaps() {
        let mut pages = BTreeMap::new();
        pages.insert(4, page(Kind::Host, 100, &["d"]));
        pages.insert(1, page(Kind::Host, 100, &["a"]));
        pages.insert(5, page(Kind::Host, 100, &["e"]));
        let merged = merge_pages(Kind::Host, &pages);
        assert_eq!(ips(&merged), vec!["a", "d", "e"]);
    }
}
