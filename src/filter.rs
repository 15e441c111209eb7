use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::cmp::Ordering;

pub const DOC_TYPE_FIELD: &str = "docType";
pub const DEFAULT_LIMIT: usize = 10_000;

// ----------------------
// Selector tree
// ----------------------
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Filter {
    /// Dotted `path` resolves to a value equal to `value`.
    Eq { path: String, value: Value },
    And { args: Vec<Filter> },
    Or { args: Vec<Filter> },
    /// Dotted `path` resolves to an array with at least one element matching `matches`.
    ArrayContains { path: String, matches: Box<Filter> },
}

impl Filter {
    pub fn eq(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Eq { path: path.into(), value: value.into() }
    }

    pub fn and(args: Vec<Filter>) -> Self { Filter::And { args } }

    pub fn or(args: Vec<Filter>) -> Self { Filter::Or { args } }

    pub fn array_contains(path: impl Into<String>, matches: Filter) -> Self {
        Filter::ArrayContains { path: path.into(), matches: Box::new(matches) }
    }

    /// Matches every document.
    pub fn any() -> Self { Filter::And { args: vec![] } }

    pub fn matches(&self, doc: &Value) -> bool {
        match self {
            Filter::Eq { path, value } => resolve(doc, path).map(|v| loose_eq(v, value)).unwrap_or(false),
            Filter::And { args } => args.iter().all(|f| f.matches(doc)),
            Filter::Or { args } => args.iter().any(|f| f.matches(doc)),
            Filter::ArrayContains { path, matches } => resolve(doc, path)
                .and_then(|v| v.as_array())
                .map(|arr| arr.iter().any(|el| matches.matches(el)))
                .unwrap_or(false),
        }
    }
}

pub fn resolve<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    let mut cur = doc;
    for key in path.split('.').filter(|s| !s.is_empty()) {
        cur = cur.get(key)?;
    }
    Some(cur)
}

// 1 and 1.0 are the same amount.
fn loose_eq(l: &Value, r: &Value) -> bool {
    match (l.as_f64(), r.as_f64()) {
        (Some(a), Some(b)) if l.is_number() && r.is_number() => a == b,
        _ => l == r,
    }
}

// ----------------------
// Sorting / paging
// ----------------------
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Direction { Asc, Desc }

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SortKey {
    pub path: String,
    pub direction: Direction,
}

impl SortKey {
    pub fn asc(path: impl Into<String>) -> Self { Self { path: path.into(), direction: Direction::Asc } }
    pub fn desc(path: impl Into<String>) -> Self { Self { path: path.into(), direction: Direction::Desc } }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub skip: usize,
    #[serde(default)]
    pub sort: Vec<SortKey>,
}

impl FindOptions {
    pub fn sorted(sort: Vec<SortKey>) -> Self { Self { sort, ..Default::default() } }

    pub fn page(mut self, limit: usize, skip: usize) -> Self {
        self.limit = Some(limit);
        self.skip = skip;
        self
    }
}

// Null < Bool < Number < String < Array/Object (compared as text).
fn rank(v: &Value) -> u8 {
    match v {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) | Value::Object(_) => 4,
    }
}

fn compare_values(l: &Value, r: &Value) -> Ordering {
    match (l, r) {
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Number(_), Value::Number(_)) => {
            let a = l.as_f64().unwrap_or(0.0);
            let b = r.as_f64().unwrap_or(0.0);
            a.partial_cmp(&b).unwrap_or(Ordering::Equal)
        }
        (Value::String(a), Value::String(b)) => a.cmp(b),
        _ if rank(l) == rank(r) && rank(l) == 4 => l.to_string().cmp(&r.to_string()),
        _ => rank(l).cmp(&rank(r)),
    }
}

// ----------------------
// Query envelope (pushed down to the host)
// ----------------------
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Query {
    #[serde(rename = "docType")]
    pub doc_type: String,
    pub selector: Filter,
    #[serde(default)]
    pub sort: Vec<SortKey>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub skip: usize,
    #[serde(default)]
    pub fields: Vec<String>,
}

impl Query {
    pub fn scoped(doc_type: &str, selector: Filter, options: &FindOptions) -> Self {
        Self {
            doc_type: doc_type.to_string(),
            selector,
            sort: options.sort.clone(),
            limit: options.limit,
            skip: options.skip,
            fields: vec![],
        }
    }

    pub fn matches(&self, doc: &Value) -> bool {
        doc.get(DOC_TYPE_FIELD).and_then(|t| t.as_str()) == Some(self.doc_type.as_str())
            && self.selector.matches(doc)
    }

    /// Evaluates the query over documents given in ledger key order.
    /// The sort is stable, so key order breaks ties.
    pub fn run<'a, I>(&self, docs: I) -> Vec<Value>
    where
        I: IntoIterator<Item = &'a Value>,
    {
        let mut hits: Vec<&Value> = docs.into_iter().filter(|d| self.matches(d)).collect();
        if !self.sort.is_empty() {
            hits.sort_by(|a, b| {
                for key in &self.sort {
                    let l = resolve(a, &key.path).unwrap_or(&Value::Null);
                    let r = resolve(b, &key.path).unwrap_or(&Value::Null);
                    let ord = match key.direction {
                        Direction::Asc => compare_values(l, r),
                        Direction::Desc => compare_values(r, l),
                    };
                    if ord != Ordering::Equal { return ord; }
                }
                Ordering::Equal
            });
        }
        hits.into_iter()
            .skip(self.skip)
            .take(self.limit.unwrap_or(usize::MAX))
            .map(|d| self.project(d))
            .collect()
    }

    fn project(&self, doc: &Value) -> Value {
        if self.fields.is_empty() { return doc.clone(); }
        let mut out = serde_json::Map::new();
        for f in &self.fields {
            if let Some(v) = doc.get(f) { out.insert(f.clone(), v.clone()); }
        }
        json!(out)
    }
}
