use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::record::{Record, value_to_string};

/// Schema variant of a search result.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    #[default]
    Host,
    Web,
}

impl Kind {
    /// Anything other than `web` (case-insensitive) is a host search.
    pub fn parse(s: &str) -> Kind {
        if s.trim().eq_ignore_ascii_case("web") {
            Kind::Web
        } else {
            Kind::Host
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::Host => "host",
            Kind::Web => "web",
        }
    }

    pub fn default_facets(&self) -> &'static str {
        match self {
            Kind::Host => "app,device,service,os,port,country,city",
            Kind::Web => "webapp,component,framework,frontend,server,waf,os,country,city",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Kind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Kind::parse(s))
    }
}

/// One row of a server-computed facet.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Facet {
    #[serde(default)]
    pub name: Value,
    #[serde(default)]
    pub count: u64,
}

impl Facet {
    pub fn label(&self) -> String {
        let name = value_to_string(&self.name);
        if name.is_empty() {
            "[unknown]".to_string()
        } else {
            name
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct SearchResult {
    #[serde(skip)]
    pub kind: Option<Kind>,
    #[serde(default)]
    pub available: u64,
    #[serde(default)]
    pub total: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub matches: Vec<Record>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub facets: BTreeMap<String, Vec<Facet>>,
    /// Body of the response(s) this result was decoded from.
    #[serde(skip)]
    pub raw: Vec<u8>,
    /// Output of the last [`SearchResult::filter`] call.
    #[serde(skip)]
    pub filter_cache: Vec<FilterRecord>,
}

impl SearchResult {
    pub fn new(kind: Kind) -> Self {
        Self {
            kind: Some(kind),
            ..Default::default()
        }
    }

    pub fn kind(&self) -> Kind {
        self.kind.unwrap_or_default()
    }

    /// `(ip, port)` of every host match that has an ip.
    pub fn hosts(&self) -> Vec<(String, String)> {
        self.matches
            .iter()
            .filter_map(|m| {
                let ip = m.find_string("ip");
                (!ip.is_empty()).then(|| (ip, m.find_string("portinfo.port")))
            })
            .collect()
    }

    /// `(ip, site)` of every web match that has an ip.
    pub fn sites(&self) -> Vec<(String, String)> {
        self.matches
            .iter()
            .filter_map(|m| {
                let ip = m.find_string("ip");
                (!ip.is_empty()).then(|| (ip, m.find_string("site")))
            })
            .collect()
    }

    /// Facet rows by name. Host results publish `app` as `product`.
    pub fn facet(&self, name: &str) -> Option<&[Facet]> {
        let mut name = name.trim().to_lowercase();
        if self.kind() == Kind::Host && name == "app" {
            name = "product".to_string();
        }
        self.facets.get(&name).map(Vec::as_slice)
    }
}

/// Flattened projection of a [`Record`] produced by the filter engine.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct FilterRecord {
    #[serde(rename = "_index")]
    pub index_value: String,
    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct LoginResult {
    #[serde(default)]
    pub access_token: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Resources {
    #[serde(default)]
    pub interval: String,
    #[serde(default)]
    pub search: i64,
    #[serde(default)]
    pub stats: i64,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct ResourcesInfo {
    #[serde(default)]
    pub plan: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub resources: Resources,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct HistoryResult {
    #[serde(default)]
    pub count: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub data: Vec<Record>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageStatus {
    Pending,
    Fetched,
    Cached,
    Failed,
}

/// A single result page. Its index is part of the per-page cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub index: usize,
    pub status: PageStatus,
}

impl Page {
    pub fn pending(index: usize) -> Page {
        Page {
            index,
            status: PageStatus::Pending,
        }
    }
}

/// A page handed back by a page source together with where it came from.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub status: PageStatus,
    pub result: SearchResult,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
