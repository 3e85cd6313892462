//! Small CSS matcher for the fake page.
//!
//! Supports selector lists (`a, b`), descendant combinators (space or `>`,
//! both treated as "some ancestor"), and compounds of `tag`, `*`, `.class`,
//! `#id`, `[attr]` and `[attr=value]`.

use crate::result::{ProofError, ProofResult};

/// What the matcher needs to know about a node
pub(crate) trait CssNode {
    fn tag(&self) -> &str;
    fn id(&self) -> Option<&str>;
    fn has_class(&self, class: &str) -> bool;
    fn attr(&self, name: &str) -> Option<&str>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum AttrTest {
    Present(String),
    Equals(String, String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<AttrTest>,
}

impl Compound {
    fn matches(&self, node: &impl CssNode) -> bool {
        self.tag
            .as_deref()
            .map_or(true, |t| node.tag().eq_ignore_ascii_case(t))
            && self.id.as_deref().map_or(true, |id| node.id() == Some(id))
            && self.classes.iter().all(|c| node.has_class(c))
            && self.attrs.iter().all(|test| match test {
                AttrTest::Present(name) => node.attr(name).is_some(),
                AttrTest::Equals(name, value) => node.attr(name) == Some(value.as_str()),
            })
    }
}

/// Compiled selector list
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CssSelector {
    /// Each alternative is a chain of compounds, outermost first
    alternatives: Vec<Vec<Compound>>,
}

impl CssSelector {
    pub(crate) fn parse(source: &str) -> ProofResult<Self> {
        let mut alternatives = Vec::new();
        for part in split_top_level(source, ',') {
            let chain = part
                .replace('>', " ")
                .split_whitespace()
                .map(|c| parse_compound(source, c))
                .collect::<ProofResult<Vec<_>>>()?;
            if chain.is_empty() {
                return Err(unsupported(source, "empty selector"));
            }
            alternatives.push(chain);
        }
        Ok(Self { alternatives })
    }

    /// `ancestors` yields the node's ancestors, nearest first
    pub(crate) fn matches<'a, N, I>(&self, node: &N, ancestors: I) -> bool
    where
        N: CssNode + 'a,
        I: Iterator<Item = &'a N> + Clone,
    {
        self.alternatives.iter().any(|chain| {
            let Some((last, outer)) = chain.split_last() else {
                return false;
            };
            if !last.matches(node) {
                return false;
            }
            let mut remaining = outer.iter().rev().peekable();
            for ancestor in ancestors.clone() {
                match remaining.peek() {
                    Some(compound) if compound.matches(ancestor) => {
                        remaining.next();
                    }
                    Some(_) => {}
                    None => break,
                }
            }
            remaining.peek().is_none()
        })
    }
}

fn unsupported(source: &str, what: &str) -> ProofError {
    ProofError::configuration(format!("fake page cannot match '{source}': {what}"))
}

/// Split on `sep` outside brackets and quotes
fn split_top_level(source: &str, sep: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0_i32;
    let mut quote: Option<char> = None;
    for c in source.chars() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (None, '\'' | '"') => quote = Some(c),
            (None, '[') => depth += 1,
            (None, ']') => depth -= 1,
            (None, c) if c == sep && depth == 0 => {
                parts.push(std::mem::take(&mut current));
                continue;
            }
            _ => {}
        }
        current.push(c);
    }
    parts.push(current);
    parts
}

fn parse_compound(source: &str, text: &str) -> ProofResult<Compound> {
    let mut compound = Compound::default();
    let chars: Vec<char> = text.chars().collect();
    let mut i = 0;

    let ident_end = |from: usize| {
        let mut end = from;
        while end < chars.len() && (chars[end].is_alphanumeric() || matches!(chars[end], '-' | '_')) {
            end += 1;
        }
        end
    };

    if i < chars.len() && chars[i] == '*' {
        i += 1;
    } else {
        let end = ident_end(i);
        if end > i {
            compound.tag = Some(chars[i..end].iter().collect());
            i = end;
        }
    }

    while i < chars.len() {
        match chars[i] {
            '.' | '#' => {
                let end = ident_end(i + 1);
                if end == i + 1 {
                    return Err(unsupported(source, "missing name after '.' or '#'"));
                }
                let name: String = chars[i + 1..end].iter().collect();
                if chars[i] == '.' {
                    compound.classes.push(name);
                } else {
                    compound.id = Some(name);
                }
                i = end;
            }
            '[' => {
                let close = chars[i..]
                    .iter()
                    .position(|c| *c == ']')
                    .map(|p| p + i)
                    .ok_or_else(|| unsupported(source, "unterminated attribute"))?;
                let inner: String = chars[i + 1..close].iter().collect();
                compound.attrs.push(parse_attr(source, &inner)?);
                i = close + 1;
            }
            other => {
                return Err(unsupported(source, &format!("unexpected '{other}'")));
            }
        }
    }
    Ok(compound)
}

fn parse_attr(source: &str, inner: &str) -> ProofResult<AttrTest> {
    match inner.split_once('=') {
        None => Ok(AttrTest::Present(inner.trim().to_string())),
        Some((name, value)) => {
            let name = name.trim();
            if name.ends_with(['~', '|', '^', '$', '*']) {
                return Err(unsupported(source, "only [attr] and [attr=value] are supported"));
            }
            let value = value.trim();
            let value = value
                .strip_prefix(['\'', '"'])
                .and_then(|v| v.strip_suffix(['\'', '"']))
                .unwrap_or(value);
            Ok(AttrTest::Equals(name.to_string(), value.to_string()))
        }
    }
}
