//! JSONPath の小さなサブセット
//!
//! Supported: `$`, `.key`, `['key']`, `[n]` (negative counts from the end),
//! `[*]` / `.*` and recursive descent `..key` / `..*`. A leading `$` is
//! optional, so `meta.base` and `$.meta.base` are the same path.

use serde_json::{Map, Value};

use crate::domain::{CirrusError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Key(String),
    Index(i64),
    Wildcard,
    Descendant(String),
    DescendantWildcard,
}

/// Concrete position of a match inside a document.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    Key(String),
    Index(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonPath {
    segments: Vec<Segment>,
}

impl JsonPath {
    pub fn parse(expr: &str) -> Result<Self> {
        let expr = expr.trim();
        let err = |msg: &str| CirrusError::Path(format!("{expr}: {msg}"));

        let mut segments = Vec::new();
        let chars: Vec<char> = expr.chars().collect();
        let mut pos = 0;

        if chars.first() == Some(&'$') {
            pos = 1;
        } else if !chars.is_empty() && chars[0] != '.' && chars[0] != '[' {
            let key = read_name(&chars, &mut pos);
            segments.push(Segment::Key(key));
        }

        while pos < chars.len() {
            match chars[pos] {
                '.' if chars.get(pos + 1) == Some(&'.') => {
                    pos += 2;
                    if chars.get(pos) == Some(&'*') {
                        pos += 1;
                        segments.push(Segment::DescendantWildcard);
                    } else {
                        let key = read_name(&chars, &mut pos);
                        if key.is_empty() {
                            return Err(err("missing name after '..'"));
                        }
                        segments.push(Segment::Descendant(key));
                    }
                }
                '.' => {
                    pos += 1;
                    if chars.get(pos) == Some(&'*') {
                        pos += 1;
                        segments.push(Segment::Wildcard);
                    } else {
                        let key = read_name(&chars, &mut pos);
                        if key.is_empty() {
                            return Err(err("missing name after '.'"));
                        }
                        segments.push(Segment::Key(key));
                    }
                }
                '[' => {
                    let close = chars[pos..]
                        .iter()
                        .position(|c| *c == ']')
                        .map(|offset| pos + offset)
                        .ok_or_else(|| err("unterminated '['"))?;
                    let inner: String = chars[pos + 1..close].iter().collect();
                    segments.push(parse_bracket(inner.trim()).ok_or_else(|| err("bad subscript"))?);
                    pos = close + 1;
                }
                other => return Err(err(&format!("unexpected '{other}'"))),
            }
        }

        Ok(Self { segments })
    }

    /// All values matched by the path, in document order.
    pub fn find<'a>(&self, doc: &'a Value) -> Vec<&'a Value> {
        self.locate(doc).into_iter().map(|(_, v)| v).collect()
    }

    /// Write `value` at every match.
    ///
    /// When nothing matches, a simple dotted path (keys only) is created,
    /// adding empty objects along the way.
    pub fn assign(&self, doc: &mut Value, value: Value) -> Result<()> {
        let targets: Vec<Vec<Step>> = self.locate(doc).into_iter().map(|(p, _)| p).collect();

        if targets.is_empty() {
            return self.create(doc, value);
        }

        for steps in targets {
            if let Some(slot) = walk_mut(doc, &steps) {
                *slot = value.clone();
            }
        }
        Ok(())
    }

    fn create(&self, doc: &mut Value, value: Value) -> Result<()> {
        let mut keys = Vec::with_capacity(self.segments.len());
        for segment in &self.segments {
            match segment {
                Segment::Key(k) => keys.push(k.as_str()),
                _ => {
                    return Err(CirrusError::Path(format!(
                        "cannot create {segment:?}: only dotted key paths can be created"
                    )));
                }
            }
        }

        let Some((last, parents)) = keys.split_last() else {
            *doc = value;
            return Ok(());
        };

        let mut current = doc;
        for key in parents {
            let obj = current
                .as_object_mut()
                .ok_or_else(|| CirrusError::Path(format!("'{key}' lives under a non-object")))?;
            current = obj
                .entry(key.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !current.is_object() {
                *current = Value::Object(Map::new());
            }
        }
        current
            .as_object_mut()
            .ok_or_else(|| CirrusError::Path(format!("'{last}' lives under a non-object")))?
            .insert(last.to_string(), value);
        Ok(())
    }

    fn locate<'a>(&self, doc: &'a Value) -> Vec<(Vec<Step>, &'a Value)> {
        let mut current = vec![(Vec::new(), doc)];

        for segment in &self.segments {
            let mut next = Vec::new();
            for (path, node) in current {
                match segment {
                    Segment::Key(key) => {
                        if let Some(child) = node.get(key.as_str()) {
                            next.push((extend(&path, Step::Key(key.clone())), child));
                        }
                    }
                    Segment::Index(i) => {
                        if let Some(items) = node.as_array() {
                            let len = items.len() as i64;
                            let idx = if *i < 0 { len + i } else { *i };
                            if (0..len).contains(&idx) {
                                let idx = idx as usize;
                                next.push((extend(&path, Step::Index(idx)), &items[idx]));
                            }
                        }
                    }
                    Segment::Wildcard => children(&path, node, &mut next),
                    Segment::Descendant(key) => descend(&path, node, &mut |p, n| {
                        if let Some(child) = n.get(key.as_str()) {
                            next.push((extend(p, Step::Key(key.clone())), child));
                        }
                    }),
                    Segment::DescendantWildcard => {
                        descend(&path, node, &mut |p, n| children(p, n, &mut next))
                    }
                }
            }
            current = next;
        }

        current
    }
}

fn read_name(chars: &[char], pos: &mut usize) -> String {
    let start = *pos;
    while *pos < chars.len() && chars[*pos] != '.' && chars[*pos] != '[' {
        *pos += 1;
    }
    chars[start..*pos].iter().collect::<String>().trim().to_string()
}

fn parse_bracket(inner: &str) -> Option<Segment> {
    if inner == "*" {
        return Some(Segment::Wildcard);
    }
    for quote in ['\'', '"'] {
        if inner.len() >= 2 && inner.starts_with(quote) && inner.ends_with(quote) {
            return Some(Segment::Key(inner[1..inner.len() - 1].to_string()));
        }
    }
    inner.parse().ok().map(Segment::Index)
}

fn extend(path: &[Step], step: Step) -> Vec<Step> {
    let mut p = path.to_vec();
    p.push(step);
    p
}

fn children<'a>(path: &[Step], node: &'a Value, out: &mut Vec<(Vec<Step>, &'a Value)>) {
    match node {
        Value::Object(map) => {
            for (k, v) in map {
                out.push((extend(path, Step::Key(k.clone())), v));
            }
        }
        Value::Array(items) => {
            for (i, v) in items.iter().enumerate() {
                out.push((extend(path, Step::Index(i)), v));
            }
        }
        _ => {}
    }
}

/// Pre-order visit of `node` and everything below it.
fn descend<'a>(path: &[Step], node: &'a Value, visit: &mut impl FnMut(&[Step], &'a Value)) {
    visit(path, node);
    match node {
        Value::Object(map) => {
            for (k, v) in map {
                descend(&extend(path, Step::Key(k.clone())), v, visit);
            }
        }
        Value::Array(items) => {
            for (i, v) in items.iter().enumerate() {
                descend(&extend(path, Step::Index(i)), v, visit);
            }
        }
        _ => {}
    }
}

fn walk_mut<'a>(doc: &'a mut Value, steps: &[Step]) -> Option<&'a mut Value> {
    steps.iter().try_fold(doc, |node, step| match step {
        Step::Key(k) => node.get_mut(k.as_str()),
        Step::Index(i) => node.get_mut(*i),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn doc() -> Value {
        json!({
            "meta": { "base": "http://h", "provider": { "id": "p1" } },
            "payload": { "granules": [ { "id": "g1" }, { "id": "g2" } ] },
            "weird key": 1
        })
    }

    #[rstest]
    #[case("$.meta.base", json!(["http://h"]))]
    #[case("meta.base", json!(["http://h"]))]
    #[case("$['meta']['provider'].id", json!(["p1"]))]
    #[case("$.payload.granules[0].id", json!(["g1"]))]
    #[case("$.payload.granules[-1].id", json!(["g2"]))]
    #[case("$.payload.granules[*].id", json!(["g1", "g2"]))]
    #[case("$..id", json!(["p1", "g1", "g2"]))]
    #[case("$['weird key']", json!([1]))]
    #[case("$.nothing.here", json!([]))]
    #[case("$.payload.granules[5]", json!([]))]
    fn finds(#[case] path: &str, #[case] expected: Value) {
        let doc = doc();
        let found: Vec<Value> = JsonPath::parse(path)
            .unwrap()
            .find(&doc)
            .into_iter()
            .cloned()
            .collect();
        assert_eq!(Value::Array(found), expected);
    }

    #[test]
    fn root_matches_whole_document() {
        let doc = doc();
        assert_eq!(JsonPath::parse("$").unwrap().find(&doc), vec![&doc]);
    }

    #[rstest]
    #[case("$.a[")]
    #[case("$.a[x]")]
    #[case("$.")]
    fn rejects_malformed(#[case] path: &str) {
        assert!(JsonPath::parse(path).is_err());
    }

    #[test]
    fn assign_overwrites_every_match() {
        let mut doc = doc();
        JsonPath::parse("$.payload.granules[*].id")
            .unwrap()
            .assign(&mut doc, json!("x"))
            .unwrap();
        assert_eq!(doc["payload"]["granules"], json!([{ "id": "x" }, { "id": "x" }]));
    }

    #[test]
    fn assign_creates_missing_dotted_path() {
        let mut doc = json!({ "meta": { "keep": true } });
        JsonPath::parse("$.meta.new.deep")
            .unwrap()
            .assign(&mut doc, json!(3))
            .unwrap();
        assert_eq!(doc, json!({ "meta": { "keep": true, "new": { "deep": 3 } } }));
    }

    #[test]
    fn assign_cannot_create_through_wildcards() {
        let mut doc = json!({});
        let err = JsonPath::parse("$.a[*].b")
            .unwrap()
            .assign(&mut doc, json!(1))
            .unwrap_err();
        assert!(matches!(err, CirrusError::Path(_)));
    }
}
