//! Minimal CSS selector matching for the mock document.
//!
//! Supports selector lists (`a, b`), the descendant combinator, type
//! selectors, `*`, `#id`, `.class`, `[attr]`, `[attr="value"]` and the
//! `:checked` pseudo-class. Anything else is a parse error.

use super::dom::{MockDom, NodeId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CssParseError(pub String);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<(String, Option<String>)>,
    checked: bool,
}

impl Compound {
    fn matches(&self, dom: &MockDom, node: NodeId) -> bool {
        if let Some(tag) = &self.tag {
            if !dom.tag(node).eq_ignore_ascii_case(tag) {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if dom.attr(node, "id") != Some(id.as_str()) {
                return false;
            }
        }
        if !self.classes.is_empty() {
            let class_attr = dom.attr(node, "class").unwrap_or_default();
            let classes: Vec<&str> = class_attr.split_whitespace().collect();
            if !self.classes.iter().all(|c| classes.contains(&c.as_str())) {
                return false;
            }
        }
        for (name, expected) in &self.attrs {
            match (dom.attr(node, name), expected) {
                (None, _) => return false,
                (Some(actual), Some(expected)) if actual != expected => return false,
                _ => {}
            }
        }
        !self.checked || dom.is_checked_or_selected(node)
    }
}

/// A parsed selector list
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SelectorList(Vec<Vec<Compound>>);

impl SelectorList {
    pub(crate) fn matches(&self, dom: &MockDom, node: NodeId) -> bool {
        self.0.iter().any(|chain| matches_chain(dom, node, chain))
    }
}

fn matches_chain(dom: &MockDom, node: NodeId, chain: &[Compound]) -> bool {
    let Some((last, ancestors)) = chain.split_last() else {
        return false;
    };
    if !last.matches(dom, node) {
        return false;
    }
    // Descendant-only chains: greedy nearest-ancestor matching is exact.
    let mut current = dom.parent(node);
    for part in ancestors.iter().rev() {
        loop {
            let Some(candidate) = current else {
                return false;
            };
            current = dom.parent(candidate);
            if part.matches(dom, candidate) {
                break;
            }
        }
    }
    true
}

/// Split on `sep` outside of brackets and quotes
fn split_top_level(input: &str, sep: impl Fn(char) -> bool) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    for c in input.chars() {
        match (quote, c) {
            (Some(q), c) if c == q => {
                quote = None;
                current.push(c);
            }
            (Some(_), c) => current.push(c),
            (None, '"' | '\'') => {
                quote = Some(c);
                current.push(c);
            }
            (None, '[') => {
                depth += 1;
                current.push(c);
            }
            (None, ']') => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            (None, c) if depth == 0 && sep(c) => {
                if !current.trim().is_empty() {
                    parts.push(current.trim().to_string());
                }
                current.clear();
            }
            (None, c) => current.push(c),
        }
    }
    if !current.trim().is_empty() {
        parts.push(current.trim().to_string());
    }
    parts
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}

fn take_ident(chars: &[char], pos: &mut usize) -> String {
    let start = *pos;
    while *pos < chars.len() && is_ident_char(chars[*pos]) {
        *pos += 1;
    }
    chars[start..*pos].iter().collect()
}

fn parse_compound(input: &str) -> Result<Compound, CssParseError> {
    let chars: Vec<char> = input.chars().collect();
    let mut pos = 0;
    let mut compound = Compound::default();

    if pos < chars.len() && chars[pos] == '*' {
        pos += 1;
    } else if pos < chars.len() && is_ident_char(chars[pos]) {
        compound.tag = Some(take_ident(&chars, &mut pos).to_ascii_lowercase());
    }

    while pos < chars.len() {
        match chars[pos] {
            '#' => {
                pos += 1;
                compound.id = Some(take_ident(&chars, &mut pos));
            }
            '.' => {
                pos += 1;
                compound.classes.push(take_ident(&chars, &mut pos));
            }
            '[' => {
                let end = chars[pos..]
                    .iter()
                    .position(|&c| c == ']')
                    .map(|offset| pos + offset)
                    .ok_or_else(|| CssParseError(format!("unterminated attribute in {input:?}")))?;
                let inner: String = chars[pos + 1..end].iter().collect();
                compound.attrs.push(parse_attr(&inner)?);
                pos = end + 1;
            }
            ':' => {
                pos += 1;
                let pseudo = take_ident(&chars, &mut pos);
                if pseudo != "checked" {
                    return Err(CssParseError(format!("unsupported pseudo-class :{pseudo}")));
                }
                compound.checked = true;
            }
            other => {
                return Err(CssParseError(format!(
                    "unexpected {other:?} in selector {input:?}"
                )))
            }
        }
    }
    Ok(compound)
}

fn parse_attr(inner: &str) -> Result<(String, Option<String>), CssParseError> {
    match inner.split_once('=') {
        None => Ok((inner.trim().to_string(), None)),
        Some((name, value)) => {
            let value = value.trim();
            let unquoted = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
                .unwrap_or(value);
            if name.trim().is_empty() {
                return Err(CssParseError(format!("empty attribute name in [{inner}]")));
            }
            Ok((name.trim().to_string(), Some(unquoted.to_string())))
        }
    }
}

/// Parse a selector list
pub(crate) fn parse(selector: &str) -> Result<SelectorList, CssParseError> {
    let mut chains = Vec::new();
    for complex in split_top_level(selector, |c| c == ',') {
        let chain = split_top_level(&complex, char::is_whitespace)
            .iter()
            .map(|compound| parse_compound(compound))
            .collect::<Result<Vec<_>, _>>()?;
        chains.push(chain);
    }
    if chains.is_empty() {
        return Err(CssParseError("empty selector".to_string()));
    }
    Ok(SelectorList(chains))
}
