//! Serializable element locators
//!
//! A [`Locator`] is a tree the Playwright driver turns into a chained
//! `page.getByRole(...)`, `locator.first()`, `a.or(b)` expression. The
//! same tree is matched directly by the scripted test page.

use regex::RegexBuilder;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Accessible name or text matcher
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextMatch {
    /// Case-sensitive, whitespace-normalized equality
    Exact(String),
    /// Case-insensitive regular expression
    Pattern(String),
}

impl TextMatch {
    pub fn exact(text: impl Into<String>) -> Self {
        TextMatch::Exact(text.into())
    }

    pub fn pattern(pattern: impl Into<String>) -> Self {
        TextMatch::Pattern(pattern.into())
    }

    /// Whether `candidate` satisfies this matcher
    pub fn matches(&self, candidate: &str) -> bool {
        match self {
            TextMatch::Exact(expected) => normalize(candidate) == normalize(expected),
            TextMatch::Pattern(pattern) => RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .map(|re| re.is_match(candidate))
                .unwrap_or(false),
        }
    }
}

fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

impl fmt::Display for TextMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextMatch::Exact(text) => write!(f, "\"{text}\""),
            TextMatch::Pattern(pattern) => write!(f, "/{pattern}/i"),
        }
    }
}

/// Element locator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Locator {
    /// ARIA role with optional accessible name
    Role {
        role: String,
        #[serde(default)]
        name: Option<TextMatch>,
    },
    /// Visible text
    Text { text: TextMatch },
    /// Test-id attribute (`data-qa` on AutomationExercise)
    TestId { id: String },
    /// Input placeholder
    Placeholder { text: TextMatch },
    /// Raw CSS selector, for elements without semantic attributes
    Css { selector: String },
    /// `inner` resolved inside `scope`
    Within {
        scope: Box<Locator>,
        inner: Box<Locator>,
    },
    /// First match of `inner`
    First { inner: Box<Locator> },
    /// Elements matching any of `options`
    Or { options: Vec<Locator> },
}

impl Locator {
    pub fn role(role: impl Into<String>) -> Self {
        Locator::Role {
            role: role.into(),
            name: None,
        }
    }

    /// Role whose accessible name matches `pattern` (case-insensitive)
    pub fn role_matching(role: impl Into<String>, pattern: impl Into<String>) -> Self {
        Locator::Role {
            role: role.into(),
            name: Some(TextMatch::pattern(pattern)),
        }
    }

    /// Role whose accessible name equals `name`
    pub fn role_exact(role: impl Into<String>, name: impl Into<String>) -> Self {
        Locator::Role {
            role: role.into(),
            name: Some(TextMatch::exact(name)),
        }
    }

    pub fn text(pattern: impl Into<String>) -> Self {
        Locator::Text {
            text: TextMatch::pattern(pattern),
        }
    }

    pub fn text_exact(text: impl Into<String>) -> Self {
        Locator::Text {
            text: TextMatch::exact(text),
        }
    }

    pub fn test_id(id: impl Into<String>) -> Self {
        Locator::TestId { id: id.into() }
    }

    pub fn placeholder(pattern: impl Into<String>) -> Self {
        Locator::Placeholder {
            text: TextMatch::pattern(pattern),
        }
    }

    pub fn css(selector: impl Into<String>) -> Self {
        Locator::Css {
            selector: selector.into(),
        }
    }

    /// Resolve `inner` inside this locator
    pub fn locate(&self, inner: Locator) -> Self {
        Locator::Within {
            scope: Box::new(self.clone()),
            inner: Box::new(inner),
        }
    }

    pub fn first(self) -> Self {
        Locator::First {
            inner: Box::new(self),
        }
    }

    /// Union with `other`; nested unions are flattened
    pub fn or(self, other: Locator) -> Self {
        let mut options = match self {
            Locator::Or { options } => options,
            single => vec![single],
        };
        match other {
            Locator::Or { options: more } => options.extend(more),
            single => options.push(single),
        }
        Locator::Or { options }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Role { role, name: None } => write!(f, "role={role}"),
            Locator::Role {
                role,
                name: Some(name),
            } => write!(f, "role={role}[name={name}]"),
            Locator::Text { text } => write!(f, "text={text}"),
            Locator::TestId { id } => write!(f, "test-id={id}"),
            Locator::Placeholder { text } => write!(f, "placeholder={text}"),
            Locator::Css { selector } => write!(f, "css={selector}"),
            Locator::Within { scope, inner } => write!(f, "{scope} >> {inner}"),
            Locator::First { inner } => write!(f, "{inner} >> nth=0"),
            Locator::Or { options } => {
                let parts: Vec<String> = options.iter().map(ToString::to_string).collect();
                write!(f, "({})", parts.join(" | "))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_is_case_insensitive() {
        let m = TextMatch::pattern(r"^\s*(i\s+)?consent\s*$");
        assert!(m.matches("Consent"));
        assert!(m.matches("I Consent"));
        assert!(m.matches("CONSENT"));
        assert!(!m.matches("Do not consent"));
        assert!(!m.matches("Manage options"));
    }

    #[test]
    fn test_exact_normalizes_whitespace() {
        let m = TextMatch::exact("Blue Top");
        assert!(m.matches("  Blue   Top "));
        assert!(!m.matches("blue top"));
        assert!(!m.matches("Blue Top Deluxe"));
    }

    #[test]
    fn test_invalid_pattern_never_matches() {
        assert!(!TextMatch::pattern("(unclosed").matches("(unclosed"));
    }

    #[test]
    fn test_display() {
        let root = Locator::css(".fc-consent-root");
        let button = root.locate(Locator::role_matching("button", "consent").first());
        assert_eq!(
            button.to_string(),
            "css=.fc-consent-root >> role=button[name=/consent/i] >> nth=0"
        );
        assert_eq!(Locator::test_id("signup-name").to_string(), "test-id=signup-name");
    }

    #[test]
    fn test_or_flattens() {
        let loc = Locator::role("button")
            .or(Locator::role("link"))
            .or(Locator::text("x"));
        match loc {
            Locator::Or { options } => assert_eq!(options.len(), 3),
            other => panic!("expected union, got {other:?}"),
        }
    }

    #[test]
    fn test_wire_format() {
        let loc = Locator::role_exact("radio", "Mr.");
        let json = serde_json::to_value(&loc).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"kind": "role", "role": "radio", "name": {"exact": "Mr."}})
        );

        let loc = Locator::css("#a").locate(Locator::test_id("b")).first();
        let json = serde_json::to_value(&loc).unwrap();
        assert_eq!(json["kind"], "first");
        assert_eq!(json["inner"]["kind"], "within");
        assert_eq!(json["inner"]["scope"]["selector"], "#a");
    }
}
