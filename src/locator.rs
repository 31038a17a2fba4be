//! Layered-fallback element location.
//!
//! A [`LocatorChain`] is an ordered list of [`Strategy`] values. The first
//! strategy that yields at least one element commits; later strategies are
//! never consulted once an earlier one matched, even if they would match more
//! precisely. Nothing matching is a plain `None`, never an error.

use crate::browser::ElementTarget;
use crate::parse::normalize_whitespace;
use html_scraper::{ElementRef, Html, Node, Selector};
use regex::Regex;
use std::sync::LazyLock;
use tracing::{trace, warn};

/// Interactive roles understood by [`Strategy::Role`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Button,
    Link,
}

impl Role {
    fn selector(self) -> &'static str {
        match self {
            Role::Button => {
                "button, [role='button'], input[type='submit'], input[type='button']"
            }
            Role::Link => "a, [role='link']",
        }
    }
}

/// One way of finding an element set.
#[derive(Debug, Clone)]
pub enum Strategy {
    /// Plain CSS selector.
    Css(String),
    /// CSS selector whose normalized text must match `pattern`.
    Text { css: String, pattern: Regex },
    /// `input`/`textarea` whose placeholder matches.
    Placeholder(Regex),
    /// Element of the given role whose accessible name matches.
    Role { role: Role, name: Regex },
    /// CSS selector restricted to elements carrying attribute `name`.
    Attribute { css: String, name: String },
}

impl Strategy {
    pub fn css(selector: impl Into<String>) -> Self {
        Strategy::Css(selector.into())
    }

    /// Build a text-filtered strategy. An invalid pattern yields a strategy
    /// that never matches.
    pub fn text(css: impl Into<String>, pattern: &str) -> Self {
        Strategy::Text {
            css: css.into(),
            pattern: compile(pattern),
        }
    }

    pub fn placeholder(pattern: &str) -> Self {
        Strategy::Placeholder(compile(pattern))
    }

    pub fn role(role: Role, name: &str) -> Self {
        Strategy::Role {
            role,
            name: compile(name),
        }
    }

    pub fn attribute(css: impl Into<String>, name: impl Into<String>) -> Self {
        Strategy::Attribute {
            css: css.into(),
            name: name.into(),
        }
    }

    /// Evaluate against the descendants of `scope`. Empty matches are `None`.
    pub fn try_match<'a>(&self, scope: ElementRef<'a>) -> Option<Vec<ElementRef<'a>>> {
        let matched: Vec<ElementRef<'a>> = match self {
            Strategy::Css(css) => select(scope, css).collect(),
            Strategy::Text { css, pattern } => select(scope, css)
                .filter(|el| pattern.is_match(&element_text(*el)))
                .collect(),
            Strategy::Placeholder(pattern) => select(scope, "input, textarea")
                .filter(|el| el.attr("placeholder").is_some_and(|p| pattern.is_match(p)))
                .collect(),
            Strategy::Role { role, name } => select(scope, role.selector())
                .filter(|el| name.is_match(&accessible_name(*el)))
                .collect(),
            Strategy::Attribute { css, name } => select(scope, css)
                .filter(|el| el.attr(name).is_some())
                .collect(),
        };

        (!matched.is_empty()).then_some(matched)
    }
}

fn compile(pattern: &str) -> Regex {
    // `[^\s\S]` matches nothing
    static NEVER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\s\S]").unwrap());

    Regex::new(pattern).unwrap_or_else(|e| {
        warn!(pattern, error = %e, "invalid locator pattern, strategy will never match");
        NEVER.clone()
    })
}

/// Selector evaluation that degrades to "no elements" on an invalid selector.
fn select<'a>(scope: ElementRef<'a>, css: &str) -> impl Iterator<Item = ElementRef<'a>> {
    let selector = match Selector::parse(css) {
        Ok(selector) => Some(selector),
        Err(e) => {
            warn!(selector = css, error = %e, "invalid CSS selector, treating as no match");
            None
        }
    };
    selector
        .map(|s| scope.select(&s).collect::<Vec<_>>())
        .unwrap_or_default()
        .into_iter()
}

/// Normalized visible text of an element.
pub fn element_text(el: ElementRef<'_>) -> String {
    normalize_whitespace(&el.text().collect::<String>())
}

const BLOCKS: &[&str] = &[
    "address", "article", "br", "dd", "div", "dl", "dt", "footer", "h1", "h2", "h3", "h4", "h5",
    "h6", "header", "li", "ol", "p", "section", "table", "td", "th", "tr", "ul",
];

/// Text with a line break at every block-level boundary, roughly what a
/// browser's `innerText` produces. Each line is whitespace-normalized.
pub fn block_text(el: ElementRef<'_>) -> String {
    let mut raw = String::new();
    collect_block_text(el, &mut raw);

    raw.lines()
        .map(normalize_whitespace)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn collect_block_text(el: ElementRef<'_>, out: &mut String) {
    for child in el.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(element) => {
                let block = BLOCKS.contains(&element.name());
                if block {
                    out.push('\n');
                }
                if let Some(child_el) = ElementRef::wrap(child) {
                    collect_block_text(child_el, out);
                }
                if block {
                    out.push('\n');
                }
            }
            _ => {}
        }
    }
}

/// Name an assistive technology would announce: `aria-label`, then text,
/// then `value`/`title`.
fn accessible_name(el: ElementRef<'_>) -> String {
    if let Some(label) = el.attr("aria-label") {
        return normalize_whitespace(label);
    }
    let text = element_text(el);
    if !text.is_empty() {
        return text;
    }
    el.attr("value")
        .or_else(|| el.attr("title"))
        .map(normalize_whitespace)
        .unwrap_or_default()
}

/// Structural CSS path (`html > body > div:nth-of-type(2) > ...`) that the
/// browser resolves back to the same element.
pub fn element_path(el: ElementRef<'_>) -> String {
    let mut segments = Vec::new();
    let mut current = Some(el);

    while let Some(node) = current {
        let name = node.value().name();
        let position = node
            .prev_siblings()
            .filter(|sibling| {
                sibling
                    .value()
                    .as_element()
                    .is_some_and(|e| e.name() == name)
            })
            .count()
            + 1;
        segments.push(format!("{name}:nth-of-type({position})"));
        current = node.parent().and_then(ElementRef::wrap);
    }

    segments.reverse();
    segments.join(" > ")
}

/// `true` when `ancestor` strictly contains `el`.
pub fn contains(ancestor: ElementRef<'_>, el: ElementRef<'_>) -> bool {
    el.ancestors().any(|node| node.id() == ancestor.id())
}

/// A committed match across one or more documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Located {
    /// Index of the committing strategy within its chain.
    pub strategy: usize,
    /// Targets of every matched element, in document order.
    pub targets: Vec<ElementTarget>,
}

impl Located {
    pub fn first(&self) -> &ElementTarget {
        &self.targets[0]
    }
}

/// A named, priority-ordered list of strategies.
#[derive(Debug, Clone)]
pub struct LocatorChain {
    name: &'static str,
    strategies: Vec<Strategy>,
}

impl LocatorChain {
    pub fn new(name: &'static str, strategies: Vec<Strategy>) -> Self {
        Self { name, strategies }
    }

    /// First committing strategy within `scope`.
    pub fn first_match<'a>(&self, scope: ElementRef<'a>) -> Option<(usize, Vec<ElementRef<'a>>)> {
        let found = self
            .strategies
            .iter()
            .enumerate()
            .find_map(|(index, strategy)| strategy.try_match(scope).map(|els| (index, els)));

        match &found {
            Some((index, els)) => {
                trace!(chain = self.name, strategy = index, count = els.len(), "locator committed")
            }
            None => trace!(chain = self.name, "locator found no match"),
        }
        found
    }

    /// Locate across several documents (main first, then frames).
    ///
    /// Strategy-major: an earlier strategy matching in any frame beats a later
    /// strategy matching in the main document.
    pub fn locate(&self, documents: &[Html]) -> Option<Located> {
        for (index, strategy) in self.strategies.iter().enumerate() {
            for (doc_index, doc) in documents.iter().enumerate() {
                if let Some(els) = strategy.try_match(doc.root_element()) {
                    trace!(
                        chain = self.name,
                        strategy = index,
                        document = doc_index,
                        count = els.len(),
                        "locator committed"
                    );
                    return Some(Located {
                        strategy: index,
                        targets: els
                            .into_iter()
                            .map(|el| ElementTarget {
                                document: doc_index,
                                css_path: element_path(el),
                            })
                            .collect(),
                    });
                }
            }
        }
        trace!(chain = self.name, "locator found no match");
        None
    }
}

/// Parse serialized documents as returned by
/// [`Driver::documents`](crate::browser::Driver::documents).
pub fn parse_documents(raw: &[String]) -> Vec<Html> {
    raw.iter().map(|html| Html::parse_document(html)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(body: &str) -> Html {
        Html::parse_document(&format!("<html><body>{body}</body></html>"))
    }

    #[test]
    fn first_strategy_wins_when_both_match() {
        let html = doc(r#"<button id="a">Entrar</button><input type="submit" id="b">"#);
        let chain = LocatorChain::new(
            "submit",
            vec![
                Strategy::role(Role::Button, "(?i)entrar"),
                Strategy::css("input[type='submit']"),
            ],
        );

        let (index, els) = chain.first_match(html.root_element()).unwrap();
        assert_eq!(index, 0);
        assert_eq!(els[0].attr("id"), Some("a"));
    }

    #[test]
    fn falls_back_in_order() {
        let html = doc(r#"<input placeholder="Tu correo electrónico">"#);
        let chain = LocatorChain::new(
            "email",
            vec![
                Strategy::css("input[type='email']"),
                Strategy::placeholder("(?i)correo|email"),
            ],
        );

        let (index, _) = chain.first_match(html.root_element()).unwrap();
        assert_eq!(index, 1);
    }

    #[test]
    fn no_match_is_none() {
        let html = doc("<p>nothing</p>");
        let chain = LocatorChain::new("missing", vec![Strategy::css(".player-card")]);
        assert!(chain.first_match(html.root_element()).is_none());
        assert!(chain.locate(&[html]).is_none());
    }

    #[test]
    fn invalid_selector_degrades_to_next_strategy() {
        let html = doc(r#"<a href="/market">Mercado</a>"#);
        let chain = LocatorChain::new(
            "market-link",
            vec![Strategy::css("a[href*="), Strategy::text("a", "(?i)mercado")],
        );
        let (index, _) = chain.first_match(html.root_element()).unwrap();
        assert_eq!(index, 1);
    }

    #[test]
    fn invalid_pattern_never_matches() {
        let html = doc("<button>(</button>");
        let strategy = Strategy::role(Role::Button, "(");
        assert!(strategy.try_match(html.root_element()).is_none());
    }

    #[test]
    fn role_uses_value_and_aria_label() {
        let html = doc(
            r#"<input type="submit" value="Iniciar sesión"><button aria-label="Cerrar">x</button>"#,
        );
        assert!(
            Strategy::role(Role::Button, "(?i)iniciar sesión")
                .try_match(html.root_element())
                .is_some()
        );
        assert!(
            Strategy::role(Role::Button, "^Cerrar$")
                .try_match(html.root_element())
                .is_some()
        );
    }

    #[test]
    fn attribute_strategy_requires_attribute() {
        let html = doc(r#"<div class="price">1 €</div><div class="price" data-value="2">2 €</div>"#);
        let (_, els) = LocatorChain::new("price", vec![Strategy::attribute(".price", "data-value")])
            .first_match(html.root_element())
            .unwrap();
        assert_eq!(els.len(), 1);
        assert_eq!(els[0].attr("data-value"), Some("2"));
    }

    #[test]
    fn locate_is_strategy_major_across_frames() {
        let main = doc(r#"<input type="text" name="user">"#);
        let frame = doc(r#"<input type="email">"#);
        let chain = LocatorChain::new(
            "identifier",
            vec![
                Strategy::css("input[type='email']"),
                Strategy::css("input[type='text']"),
            ],
        );

        let located = chain.locate(&[main, frame]).unwrap();
        assert_eq!(located.strategy, 0);
        assert_eq!(located.first().document, 1);
    }

    #[test]
    fn element_path_is_structural() {
        let html = doc(r#"<div><p>a</p></div><div><p>b</p><p id="x">c</p></div>"#);
        let sel = Selector::parse("#x").unwrap();
        let el = html.select(&sel).next().unwrap();
        assert_eq!(
            element_path(el),
            "html:nth-of-type(1) > body:nth-of-type(1) > div:nth-of-type(2) > p:nth-of-type(2)"
        );
    }

    #[test]
    fn block_text_breaks_lines_at_blocks() {
        let html = doc(
            "<div class=\"card\"><div>Karim&nbsp;Benzema</div><span>DEL</span><span> (RMA)</span><p>4.650.000 €</p></div>",
        );
        let sel = Selector::parse(".card").unwrap();
        let card = html.select(&sel).next().unwrap();
        assert_eq!(block_text(card), "Karim Benzema\nDEL (RMA)\n4.650.000 €");
    }

    #[test]
    fn contains_is_strict() {
        let html = doc(r#"<ul id="list"><li id="item">x</li></ul>"#);
        let list = html.select(&Selector::parse("#list").unwrap()).next().unwrap();
        let item = html.select(&Selector::parse("#item").unwrap()).next().unwrap();
        assert!(contains(list, item));
        assert!(!contains(item, list));
        assert!(!contains(list, list));
    }
}
