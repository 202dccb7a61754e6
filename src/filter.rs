use std::collections::{BTreeMap, HashMap};

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::data_models::{FilterRecord, Kind, SearchResult};

pub const INDEX_KEY: &str = "_index";
pub const UNKNOWN: &str = "[unknown]";

type FieldTable = BTreeMap<&'static str, &'static str>;

static HOST_FILTER_FIELDS: Lazy<FieldTable> = Lazy::new(|| {
    BTreeMap::from([
        (INDEX_KEY, "ip"),
        ("app", "portinfo.app"),
        ("version", "portinfo.version"),
        ("device", "portinfo.device"),
        ("ip", "ip"),
        ("port", "portinfo.port"),
        ("hostname", "portinfo.hostname"),
        ("city", "geoinfo.city.names.en"),
        ("city_cn", "geoinfo.city.names.zh-CN"),
        ("country", "geoinfo.country.names.en"),
        ("country_cn", "geoinfo.country.names.zh-CN"),
        ("asn", "geoinfo.asn"),
        ("banner", "portinfo.banner"),
    ])
});

static WEB_FILTER_FIELDS: Lazy<FieldTable> = Lazy::new(|| {
    BTreeMap::from([
        (INDEX_KEY, "site"),
        ("app", "webapp"),
        ("headers", "headers"),
        ("keywords", "keywords"),
        ("title", "title"),
        ("ip", "ip"),
        ("site", "site"),
        ("city", "geoinfo.city.names.en"),
        ("city_cn", "geoinfo.city.names.zh-CN"),
        ("country", "geoinfo.country.names.en"),
        ("country_cn", "geoinfo.country.names.zh-CN"),
    ])
});

static HOST_STAT_FIELDS: Lazy<FieldTable> = Lazy::new(|| {
    BTreeMap::from([
        ("app", "portinfo.app"),
        ("device", "portinfo.device"),
        ("service", "portinfo.service"),
        ("os", "portinfo.os"),
        ("port", "portinfo.port"),
        ("country", "geoinfo.country.names.en"),
        ("city", "geoinfo.city.names.en"),
    ])
});

static WEB_STAT_FIELDS: Lazy<FieldTable> = Lazy::new(|| {
    BTreeMap::from([
        ("webapp", "webapp"),
        ("component", "component"),
        ("framework", "framework"),
        ("frontend", "frontend"),
        ("server", "server"),
        ("waf", "waf"),
        ("os", "system"),
        ("country", "geoinfo.country.names.en"),
        ("city", "geoinfo.city.names.en"),
    ])
});

/// Short field name to dotted record path, for the filter engine.
pub fn filter_fields(kind: Kind) -> &'static FieldTable {
    match kind {
        Kind::Host => &HOST_FILTER_FIELDS,
        Kind::Web => &WEB_FILTER_FIELDS,
    }
}

/// Short field name to dotted record path, for statistics.
pub fn statistics_fields(kind: Kind) -> &'static FieldTable {
    match kind {
        Kind::Host => &HOST_STAT_FIELDS,
        Kind::Web => &WEB_STAT_FIELDS,
    }
}

/// Per-key frequency table. Unsorted; ordering is left to the caller.
pub type Statistics = HashMap<String, HashMap<String, usize>>;

/// A parsed `field` or `field=pattern` filter key.
struct FilterKey {
    name: String,
    path: &'static str,
    /// `Some(None)` when a pattern was given but failed to compile.
    constraint: Option<Option<Regex>>,
}

fn parse_keys<S: AsRef<str>>(kind: Kind, keys: &[S]) -> Vec<FilterKey> {
    let fields = filter_fields(kind);
    let mut raw: Vec<String> = keys.iter().map(|k| k.as_ref().to_string()).collect();
    if raw.len() == 1 && raw[0].trim() == "*" {
        raw = fields.keys().map(|k| k.to_string()).collect();
    }
    raw.push(INDEX_KEY.to_string());

    let mut parsed: Vec<FilterKey> = Vec::with_capacity(raw.len());
    for key in raw {
        let (name, pattern) = match key.split_once('=') {
            Some((name, pattern)) => (name, Some(pattern.trim())),
            None => (key.as_str(), None),
        };
        let name = name.trim().to_lowercase();
        let Some(&path) = fields.get(name.as_str()) else {
            log::debug!("ignoring unknown {kind} filter field: {name}");
            continue;
        };
        if parsed.iter().any(|k| k.name == name) {
            continue;
        }
        let constraint = pattern.map(|pattern| {
            let pattern = if pattern.starts_with("(?i)") {
                pattern.to_string()
            } else {
                format!("(?i){pattern}")
            };
            Regex::new(&pattern)
                .inspect_err(|e| log::warn!("invalid filter pattern for {name}: {e}"))
                .ok()
        });
        parsed.push(FilterKey {
            name,
            path,
            constraint,
        });
    }
    parsed
}

impl SearchResult {
    /// Projects every match onto the requested fields.
    ///
    /// A record is kept when at least one requested field (other than
    /// `_index`) is present and every present field with a `field=pattern`
    /// constraint matches it, case-insensitively. The output is also kept in
    /// `filter_cache` for a later save.
    pub fn filter<S: AsRef<str>>(&mut self, keys: &[S]) -> Vec<FilterRecord> {
        let mut filtered = Vec::with_capacity(self.matches.len());
        if keys.is_empty() {
            self.filter_cache = filtered.clone();
            return filtered;
        }
        let keys = parse_keys(self.kind(), keys);

        for record in &self.matches {
            let mut item = FilterRecord::default();
            let mut count = 0usize;
            let mut rejected = false;
            for key in &keys {
                let found = record.find(key.path);
                if key.name == INDEX_KEY {
                    item.index_value = record.find_string(key.path);
                    continue;
                }
                if found.is_some() {
                    match &key.constraint {
                        None => count += 1,
                        Some(Some(re)) if re.is_match(&record.find_string(key.path)) => count += 1,
                        Some(_) => {
                            rejected = true;
                            break;
                        }
                    }
                }
                item.fields
                    .insert(key.name.clone(), found.cloned().unwrap_or(Value::Null));
            }
            if !rejected && count > 0 {
                filtered.push(item);
            }
        }

        self.filter_cache = filtered.clone();
        filtered
    }

    /// Tallies distinct values of each requested statistics field.
    /// Missing or empty values count as `[unknown]`.
    pub fn statistics<S: AsRef<str>>(&self, keys: &[S]) -> Statistics {
        let fields = statistics_fields(self.kind());
        let mut counts = Statistics::new();
        for key in keys {
            let key = key.as_ref().trim().to_lowercase();
            let Some(path) = fields.get(key.as_str()) else {
                continue;
            };
            if counts.contains_key(&key) {
                continue;
            }
            let tally = counts.entry(key).or_default();
            for record in &self.matches {
                let mut name = record.find_string(path);
                if name.is_empty() {
                    name = UNKNOWN.to_string();
                }
                *tally.entry(name).or_default() += 1;
            }
        }
        counts
    }
}
