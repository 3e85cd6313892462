//! Element geometry and the selector language.
//!
//! Three selector forms are understood:
//!
//! - plain CSS: `.glass-card`, `[role=dialog]`, `button.primary`
//! - CSS with a text filter: `button:has-text('Sol')`
//! - text only: `text=Sol` (substring, case-insensitive) or `text="Sol"` (exact)
//!
//! Text-only selectors resolve to the innermost elements whose text matches,
//! so `text=Sol` finds the button, not the `<body>` that also contains it.

use crate::result::{ProofError, ProofResult};
use serde::{Deserialize, Serialize};

// =============================================================================
// GEOMETRY
// =============================================================================

/// A point in CSS pixels, relative to the viewport
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// X coordinate
    pub x: f32,
    /// Y coordinate
    pub y: f32,
}

impl Point {
    /// Create a new point
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Bounding box for an element
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// X position
    pub x: f32,
    /// Y position
    pub y: f32,
    /// Width
    pub width: f32,
    /// Height
    pub height: f32,
}

impl BoundingBox {
    /// Create a new bounding box
    #[must_use]
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Get the center point
    #[must_use]
    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Check if a point is inside this box
    #[must_use]
    pub fn contains(&self, point: &Point) -> bool {
        point.x >= self.x
            && point.x <= self.x + self.width
            && point.y >= self.y
            && point.y <= self.y + self.height
    }

    /// Area in square pixels
    #[must_use]
    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    /// Nothing to click on
    #[must_use]
    pub fn is_zero_area(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

// =============================================================================
// SELECTOR
// =============================================================================

/// Text constraint attached to a selector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextFilter {
    /// Case-insensitive substring
    Contains(String),
    /// Exact match after whitespace normalisation
    Exact(String),
}

/// A parsed selector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    source: String,
    css: String,
    text: Option<TextFilter>,
}

impl Selector {
    /// Parse a selector string
    ///
    /// # Errors
    ///
    /// Returns a configuration error for empty selectors, empty text filters,
    /// a `:has-text()` that is not the last part of the selector and
    /// unterminated quotes, brackets or parentheses.
    pub fn parse(source: &str) -> ProofResult<Self> {
        let trimmed = source.trim();
        if trimmed.is_empty() {
            return Err(ProofError::configuration("selector must not be empty"));
        }

        if let Some(raw) = trimmed.strip_prefix("text=") {
            let filter = match unquote(raw.trim()) {
                Some(inner) => TextFilter::Exact(inner.to_string()),
                None if raw.starts_with(['\'', '"']) => {
                    return Err(unterminated(source, "quote"));
                }
                None => TextFilter::Contains(raw.trim().to_string()),
            };
            if matches!(&filter, TextFilter::Contains(t) | TextFilter::Exact(t) if t.trim().is_empty())
            {
                return Err(ProofError::configuration(format!(
                    "selector '{source}' has an empty text filter"
                )));
            }
            return Ok(Self {
                source: trimmed.to_string(),
                css: "*".to_string(),
                text: Some(filter),
            });
        }

        if let Some(idx) = trimmed.find(":has-text(") {
            let css = trimmed[..idx].trim();
            let rest = &trimmed[idx + ":has-text(".len()..];
            let (text, trailing) = has_text_argument(source, rest)?;
            if !trailing.trim().is_empty() {
                return Err(ProofError::configuration(format!(
                    "selector '{source}' continues after :has-text(); the text filter must come last"
                )));
            }
            if text.trim().is_empty() {
                return Err(ProofError::configuration(format!(
                    "selector '{source}' has an empty text filter"
                )));
            }
            check_balanced(source, css)?;
            return Ok(Self {
                source: trimmed.to_string(),
                css: if css.is_empty() { "*".to_string() } else { css.to_string() },
                text: Some(TextFilter::Contains(text.to_string())),
            });
        }

        check_balanced(source, trimmed)?;
        Ok(Self {
            source: trimmed.to_string(),
            css: trimmed.to_string(),
            text: None,
        })
    }

    /// Selector as written
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// CSS part
    #[must_use]
    pub fn css(&self) -> &str {
        &self.css
    }

    /// Text filter, if any
    #[must_use]
    pub const fn text_filter(&self) -> Option<&TextFilter> {
        self.text.as_ref()
    }

    /// Only the innermost text matches count
    #[must_use]
    pub fn prefers_innermost(&self) -> bool {
        self.text.is_some() && self.css == "*"
    }

    /// Whether an element's text satisfies the filter (always true without one)
    #[must_use]
    pub fn text_matches(&self, text: &str) -> bool {
        let text = normalize_whitespace(text);
        match &self.text {
            None => true,
            Some(TextFilter::Contains(needle)) => text
                .to_lowercase()
                .contains(&normalize_whitespace(needle).to_lowercase()),
            Some(TextFilter::Exact(expected)) => text == normalize_whitespace(expected),
        }
    }

    /// JavaScript expression evaluating to the array of matching elements
    #[must_use]
    pub fn to_candidates_js(&self) -> String {
        let css = js_string(&self.css);
        let filter = match &self.text {
            None => "() => true".to_string(),
            Some(TextFilter::Contains(t)) => format!(
                "(el) => norm(el.textContent).toLowerCase().includes(norm({}).toLowerCase())",
                js_string(t)
            ),
            Some(TextFilter::Exact(t)) => {
                format!("(el) => norm(el.textContent) === norm({})", js_string(t))
            }
        };
        let innermost = if self.prefers_innermost() {
            ".filter((el, _, all) => !all.some((o) => o !== el && el.contains(o)))"
        } else {
            ""
        };
        format!(
            "(() => {{ const norm = (s) => (s || '').replace(/\\s+/g, ' ').trim(); \
             return Array.from(document.querySelectorAll({css})).filter({filter}){innermost}; }})()"
        )
    }
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.source)
    }
}

/// Collapse whitespace runs to single spaces and trim
#[must_use]
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// JSON string literals are valid JavaScript string literals
fn js_string(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

fn unquote(s: &str) -> Option<&str> {
    let quote = s.chars().next().filter(|c| *c == '\'' || *c == '"')?;
    let inner = s.strip_prefix(quote)?.strip_suffix(quote)?;
    (!inner.contains(quote)).then_some(inner)
}

/// Split `'text') rest` into the quoted text and whatever follows the `)`
fn has_text_argument<'a>(source: &str, arg: &'a str) -> ProofResult<(&'a str, &'a str)> {
    let arg = arg.trim_start();
    let Some(quote) = arg.chars().next().filter(|c| *c == '\'' || *c == '"') else {
        return Err(ProofError::configuration(format!(
            "selector '{source}': :has-text() takes a quoted string"
        )));
    };
    let body = &arg[1..];
    let end = body.find(quote).ok_or_else(|| unterminated(source, "quote"))?;
    let trailing = body[end + 1..]
        .trim_start()
        .strip_prefix(')')
        .ok_or_else(|| unterminated(source, "parenthesis"))?;
    Ok((&body[..end], trailing))
}

fn unterminated(source: &str, what: &str) -> ProofError {
    ProofError::configuration(format!("selector '{source}' has an unterminated {what}"))
}

fn check_balanced(source: &str, css: &str) -> ProofResult<()> {
    let mut quote: Option<char> = None;
    let mut brackets = 0_i32;
    let mut parens = 0_i32;
    for c in css.chars() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, '[') => brackets += 1,
            (None, ']') => brackets -= 1,
            (None, '(') => parens += 1,
            (None, ')') => parens -= 1,
            _ => {}
        }
        if brackets < 0 || parens < 0 {
            return Err(unterminated(source, "bracket"));
        }
    }
    if quote.is_some() {
        return Err(unterminated(source, "quote"));
    }
    if brackets != 0 {
        return Err(unterminated(source, "bracket"));
    }
    if parens != 0 {
        return Err(unterminated(source, "parenthesis"));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    mod geometry_tests {
        use super::*;

        #[test]
        fn test_center_and_contains() {
            let bbox = BoundingBox::new(10.0, 20.0, 100.0, 40.0);
            assert_eq!(bbox.center(), Point::new(60.0, 40.0));
            assert!(bbox.contains(&bbox.center()));
            assert!(!bbox.contains(&Point::new(5.0, 5.0)));
        }

        #[test]
        fn test_zero_area() {
            assert!(BoundingBox::new(0.0, 0.0, 0.0, 10.0).is_zero_area());
            assert!(BoundingBox::new(0.0, 0.0, 10.0, 0.0).is_zero_area());
            assert!(!BoundingBox::new(0.0, 0.0, 1.0, 1.0).is_zero_area());
            assert!((BoundingBox::new(0.0, 0.0, 4.0, 2.5).area() - 10.0).abs() < f32::EPSILON);
        }
    }

    mod selector_tests {
        use super::*;

        #[test]
        fn test_plain_css() {
            let sel = Selector::parse(" .glass-card ").unwrap();
            assert_eq!(sel.css(), ".glass-card");
            assert!(sel.text_filter().is_none());
            assert!(sel.text_matches("anything"));
        }

        #[test]
        fn test_has_text() {
            let sel = Selector::parse("button:has-text('Sol')").unwrap();
            assert_eq!(sel.css(), "button");
            assert_eq!(sel.text_filter(), Some(&TextFilter::Contains("Sol".to_string())));
            assert!(sel.text_matches("  Sol \n Floor "));
            assert!(sel.text_matches("SOL"));
            assert!(!sel.text_matches("Vault"));
            assert!(!sel.prefers_innermost());
        }

        #[test]
        fn test_has_text_double_quotes_and_bare() {
            let sel = Selector::parse(r#":has-text("Live now")"#).unwrap();
            assert_eq!(sel.css(), "*");
            assert!(sel.text_matches("Live now!"));
        }

        #[test]
        fn test_text_selectors() {
            let contains = Selector::parse("text=Results").unwrap();
            assert!(contains.prefers_innermost());
            assert!(contains.text_matches("All results"));

            let exact = Selector::parse("text='Results'").unwrap();
            assert!(exact.text_matches(" Results "));
            assert!(!exact.text_matches("All Results"));
        }

        #[test]
        fn test_malformed_selectors() {
            for bad in [
                "",
                "   ",
                "text=",
                "text='open",
                "button:has-text('Sol')x",
                "button:has-text('Sol",
                "button:has-text('')",
                "[role=dialog",
                "a[title='x]",
                "div)",
            ] {
                let err = Selector::parse(bad).unwrap_err();
                assert!(matches!(err, ProofError::Configuration { .. }), "{bad}");
            }
        }

        #[test]
        fn test_has_text_errors_name_the_problem() {
            let message = |s: &str| Selector::parse(s).unwrap_err().to_string();
            assert!(message("div:has-text('Sol') span").contains("text filter must come last"));
            assert!(message("div:has-text(Sol)").contains("takes a quoted string"));
            assert!(message("div:has-text('Sol'").contains("unterminated parenthesis"));
            assert!(message("div:has-text('Sol").contains("unterminated quote"));
        }

        #[test]
        fn test_has_text_tolerates_inner_spaces() {
            let sel = Selector::parse("button:has-text( 'Sol' )").unwrap();
            assert_eq!(sel.text_filter(), Some(&TextFilter::Contains("Sol".to_string())));
        }

        #[test]
        fn test_attribute_with_quoted_bracket() {
            let sel = Selector::parse("[aria-label='a]b']").unwrap();
            assert_eq!(sel.css(), "[aria-label='a]b']");
        }

        #[test]
        fn test_candidates_js_escapes() {
            let sel = Selector::parse(r#"button:has-text('say "hi"')"#).unwrap();
            let js = sel.to_candidates_js();
            assert!(js.contains(r#"querySelectorAll("button")"#));
            assert!(js.contains(r#"norm("say \"hi\"")"#));
        }

        #[test]
        fn test_candidates_js_innermost_only_for_text() {
            assert!(Selector::parse("text=Sol").unwrap().to_candidates_js().contains("el.contains(o)"));
            assert!(!Selector::parse("button").unwrap().to_candidates_js().contains("el.contains(o)"));
        }

        #[test]
        fn test_normalize_whitespace() {
            assert_eq!(normalize_whitespace("  a \n\t b  "), "a b");
        }
    }
}
