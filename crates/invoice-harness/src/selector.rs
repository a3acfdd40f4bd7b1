//! Element selection strategies.
//!
//! A [`Selector`] is plain data. The CDP driver compiles it into a DOM query
//! (see [`Selector::to_query`]); the in-memory mock driver interprets it
//! directly. Both follow the same matching rules, which are spelled out on
//! each variant.

use serde::Serialize;
use std::fmt;

/// Collapse runs of whitespace and trim, the way rendered text compares
#[must_use]
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// How a piece of text is compared against an element's text
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum TextMatch {
    /// Whole text equal after whitespace normalisation (case-sensitive)
    Exact(String),
    /// Case-insensitive substring
    Contains(String),
    /// Case-insensitive substring of any alternative
    AnyOf(Vec<String>),
}

impl TextMatch {
    #[must_use]
    pub fn exact(text: impl Into<String>) -> Self {
        Self::Exact(text.into())
    }

    #[must_use]
    pub fn contains(text: impl Into<String>) -> Self {
        Self::Contains(text.into())
    }

    #[must_use]
    pub fn any_of<I, S>(alternatives: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::AnyOf(alternatives.into_iter().map(Into::into).collect())
    }

    /// Check `text` against this matcher
    #[must_use]
    pub fn matches(&self, text: &str) -> bool {
        let text = normalize_whitespace(text);
        match self {
            Self::Exact(expected) => text == normalize_whitespace(expected),
            Self::Contains(needle) => contains_ci(&text, needle),
            Self::AnyOf(needles) => needles.iter().any(|n| contains_ci(&text, n)),
        }
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack
        .to_lowercase()
        .contains(&normalize_whitespace(needle).to_lowercase())
}

impl fmt::Display for TextMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(s) => write!(f, "{s:?}"),
            Self::Contains(s) => write!(f, "/{s}/i"),
            Self::AnyOf(v) => write!(f, "/{}/i", v.join("|")),
        }
    }
}

impl From<&str> for TextMatch {
    fn from(s: &str) -> Self {
        Self::Contains(s.to_string())
    }
}

/// Selector type for locating elements
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// CSS selector list (e.g. `"#access-code"`, `"table tbody tr"`)
    Css(String),
    /// `data-testid` attribute
    TestId(String),
    /// Accessible role with optional accessible name.
    ///
    /// The role is the explicit `role` attribute or the implicit role of the
    /// tag (`button`, `heading`, `combobox`, `checkbox`, `textbox`, `row`,
    /// `cell`, `columnheader`, `table`, `link`, `navigation`, `main`). The
    /// name is `aria-label`, else associated `<label>` text, else (for
    /// non-form elements) the text content.
    Role {
        /// ARIA role
        role: String,
        /// Accessible name filter
        name: Option<TextMatch>,
    },
    /// Form control whose `aria-label` or associated `<label>` matches
    Label(TextMatch),
    /// Element whose `placeholder` attribute matches
    Placeholder(TextMatch),
    /// Innermost elements whose text content matches
    Text(TextMatch),
    /// The `index`-th match of `inner` (zero-based)
    Nth {
        /// Base selector
        inner: Box<Selector>,
        /// Position among the matches
        index: usize,
    },
    /// The last match of `inner`
    Last(Box<Selector>),
    /// Matches of `inner` searched inside every match of `scope`
    Within {
        /// Scope selector
        scope: Box<Selector>,
        /// Selector evaluated relative to each scope element
        inner: Box<Selector>,
    },
    /// Matches of `inner` that contain at least one match of `has`
    Has {
        /// Base selector
        inner: Box<Selector>,
        /// Required descendant
        has: Box<Selector>,
    },
}

impl Selector {
    /// Create a CSS selector
    #[must_use]
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    /// Create a test ID selector
    #[must_use]
    pub fn test_id(id: impl Into<String>) -> Self {
        Self::TestId(id.into())
    }

    /// Role without a name filter
    #[must_use]
    pub fn role(role: impl Into<String>) -> Self {
        Self::Role {
            role: role.into(),
            name: None,
        }
    }

    /// Role filtered by accessible name
    #[must_use]
    pub fn role_named(role: impl Into<String>, name: impl Into<TextMatch>) -> Self {
        Self::Role {
            role: role.into(),
            name: Some(name.into()),
        }
    }

    #[must_use]
    pub fn label(text: impl Into<TextMatch>) -> Self {
        Self::Label(text.into())
    }

    #[must_use]
    pub fn placeholder(text: impl Into<TextMatch>) -> Self {
        Self::Placeholder(text.into())
    }

    #[must_use]
    pub fn text(text: impl Into<TextMatch>) -> Self {
        Self::Text(text.into())
    }

    #[must_use]
    pub fn nth(self, index: usize) -> Self {
        Self::Nth {
            inner: Box::new(self),
            index,
        }
    }

    #[must_use]
    pub fn last(self) -> Self {
        Self::Last(Box::new(self))
    }

    /// Search `inner` inside the matches of `self`
    #[must_use]
    pub fn within(self, inner: Self) -> Self {
        Self::Within {
            scope: Box::new(self),
            inner: Box::new(inner),
        }
    }

    /// Keep the matches of `self` that contain a match of `has`
    #[must_use]
    pub fn has(self, has: Self) -> Self {
        Self::Has {
            inner: Box::new(self),
            has: Box::new(has),
        }
    }

    /// Whether the selector picks at most one element by construction
    #[must_use]
    pub const fn is_positional(&self) -> bool {
        matches!(self, Self::Nth { .. } | Self::Last(_))
    }

    /// Convert to a JavaScript expression evaluating to an array of
    /// elements under `root`. Requires the query prelude (`H`) in scope.
    #[must_use]
    pub fn to_query(&self, root: &str) -> String {
        self.query_at(root, 0)
    }

    fn query_at(&self, root: &str, depth: usize) -> String {
        match self {
            Self::Css(s) => format!("H.css({root}, {})", js_string(s)),
            Self::TestId(id) => format!(
                "H.css({root}, {})",
                js_string(&format!("[data-testid=\"{}\"]", id.replace('"', "\\\"")))
            ),
            Self::Role { role, name } => {
                format!("H.byRole({root}, {}, {})", js_string(role), js_match(name.as_ref()))
            }
            Self::Label(m) => format!("H.byLabel({root}, {})", js_match(Some(m))),
            Self::Placeholder(m) => format!("H.byPlaceholder({root}, {})", js_match(Some(m))),
            Self::Text(m) => format!("H.byText({root}, {})", js_match(Some(m))),
            Self::Nth { inner, index } => {
                format!("H.nth({}, {index})", inner.query_at(root, depth))
            }
            Self::Last(inner) => format!("H.last({})", inner.query_at(root, depth)),
            Self::Within { scope, inner } => {
                let var = format!("s{depth}");
                format!(
                    "H.within({}, ({var}) => {})",
                    scope.query_at(root, depth + 1),
                    inner.query_at(&var, depth + 1)
                )
            }
            Self::Has { inner, has } => {
                let var = format!("h{depth}");
                format!(
                    "H.has({}, ({var}) => {})",
                    inner.query_at(root, depth + 1),
                    has.query_at(&var, depth + 1)
                )
            }
        }
    }
}

fn js_string(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

fn js_match(m: Option<&TextMatch>) -> String {
    m.and_then(|m| serde_json::to_string(m).ok())
        .unwrap_or_else(|| "null".to_string())
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Css(s) => write!(f, "css={s}"),
            Self::TestId(id) => write!(f, "testid={id}"),
            Self::Role { role, name: None } => write!(f, "role={role}"),
            Self::Role {
                role,
                name: Some(name),
            } => write!(f, "role={role}[name={name}]"),
            Self::Label(m) => write!(f, "label={m}"),
            Self::Placeholder(m) => write!(f, "placeholder={m}"),
            Self::Text(m) => write!(f, "text={m}"),
            Self::Nth { inner, index } => write!(f, "{inner} >> nth={index}"),
            Self::Last(inner) => write!(f, "{inner} >> last"),
            Self::Within { scope, inner } => write!(f, "{scope} >> {inner}"),
            Self::Has { inner, has } => write!(f, "{inner} >> has({has})"),
        }
    }
}
