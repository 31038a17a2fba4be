//! Player detail page parsing.

use crate::extract::absolute_url;
use crate::locator::{LocatorChain, Strategy, block_text, element_text};
use crate::models::Record;
use crate::parse::{clause_unlock, normalize_whitespace, parse_money};
use html_scraper::Html;
use regex::Regex;
use std::sync::LazyLock;
use url::Url;

static CLAUSE: LazyLock<LocatorChain> = LazyLock::new(|| {
    LocatorChain::new(
        "clause",
        vec![
            Strategy::attribute("*", "data-clause"),
            Strategy::css("[class*='clause-value'], [class*='clauseValue'], [class*='clause-amount']"),
        ],
    )
});

static DEPOSIT: LazyLock<LocatorChain> = LazyLock::new(|| {
    LocatorChain::new(
        "clause-deposit",
        vec![
            Strategy::attribute("*", "data-clause-deposit"),
            Strategy::css("[class*='deposit']"),
        ],
    )
});

static OWNER: LazyLock<LocatorChain> = LazyLock::new(|| {
    LocatorChain::new(
        "owner",
        vec![
            Strategy::css("[class*='owner'] a[href*='/user/']"),
            Strategy::css("a[href*='/user/']"),
            Strategy::css("[class*='owner'] a"),
        ],
    )
});

static UNLOCK: LazyLock<LocatorChain> = LazyLock::new(|| {
    LocatorChain::new(
        "clause-unlock",
        vec![Strategy::css(
            "[class*='unlock'], [class*='clause-lock'], [class*='clause-status'], [class*='clause'] [class*='lock']",
        )],
    )
});

static CLAUSE_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bcl[áa]usula(?:\s+de\s+rescisi[óo]n)?\s*:?\s*(\d[\d.,]*)").unwrap()
});
static DEPOSIT_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:depositad[oa]|dep[óo]sito|invertid[oa]|deposited)\s*:?\s*(\d[\d.,]*)")
        .unwrap()
});
static OWNER_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:propietario|dueño|owner)\s*:\s*(\p{L}[^\n]{1,40})").unwrap()
});
static CLAUSE_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)cl[áa]usula|clause|bloquead|desbloque|lock").unwrap());

/// Ownership and clause data read from a detail page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetailFields {
    pub clause: Option<i64>,
    pub clause_deposited: Option<i64>,
    pub owner: Option<String>,
    pub owner_url: Option<String>,
    pub clause_unlock_in: Option<String>,
}

impl DetailFields {
    pub fn is_empty(&self) -> bool {
        *self == DetailFields::default()
    }

    /// Overwrite only the fields this page resolved.
    pub fn merge_into(self, record: &mut Record) {
        if self.clause.is_some() {
            record.clause = self.clause;
        }
        if self.clause_deposited.is_some() {
            record.clause_deposited = self.clause_deposited;
        }
        if self.owner.is_some() {
            record.owner = self.owner;
        }
        if self.owner_url.is_some() {
            record.owner_url = self.owner_url;
        }
        if self.clause_unlock_in.is_some() {
            record.clause_unlock_in = self.clause_unlock_in;
        }
    }
}

fn amount(html: &Html, chain: &LocatorChain, attr: &str, label: &Regex, text: &str) -> Option<i64> {
    chain
        .first_match(html.root_element())
        .and_then(|(_, els)| {
            els.into_iter().find_map(|el| {
                el.attr(attr)
                    .and_then(parse_money)
                    .or_else(|| parse_money(&element_text(el)))
            })
        })
        .or_else(|| {
            label
                .captures(text)
                .and_then(|caps| parse_money(&caps[1]))
        })
}

/// Parse a rendered detail page. `base` resolves relative owner links.
pub fn parse_detail(html: &Html, base: &Url) -> DetailFields {
    let text = block_text(html.root_element());

    let clause = amount(html, &CLAUSE, "data-clause", &CLAUSE_LABEL, &text);
    let clause_deposited = amount(html, &DEPOSIT, "data-clause-deposit", &DEPOSIT_LABEL, &text);

    let (owner, owner_url) = match OWNER.first_match(html.root_element()) {
        Some((_, els)) => {
            let link = els[0];
            let name = element_text(link);
            (
                (!name.is_empty()).then_some(name),
                link.attr("href").and_then(|href| absolute_url(base, href)),
            )
        }
        None => (
            OWNER_LABEL
                .captures(&text)
                .map(|caps| normalize_whitespace(&caps[1])),
            None,
        ),
    };

    let clause_unlock_in = UNLOCK
        .first_match(html.root_element())
        .and_then(|(_, els)| els.into_iter().find_map(|el| clause_unlock(&element_text(el))))
        .or_else(|| {
            text.lines()
                .filter(|line| CLAUSE_LINE.is_match(line))
                .find_map(clause_unlock)
        });

    DetailFields {
        clause,
        clause_deposited,
        owner,
        owner_url,
        clause_unlock_in,
    }
}

/// [`parse_detail`] over serialized documents; the main document wins, frames
/// fill whatever it left empty.
pub fn parse_detail_documents(raw: &[String], base: &Url) -> DetailFields {
    raw.iter()
        .map(|doc| parse_detail(&Html::parse_document(doc), base))
        .reduce(|mut acc, next| {
            acc.clause = acc.clause.or(next.clause);
            acc.clause_deposited = acc.clause_deposited.or(next.clause_deposited);
            if acc.owner.is_none() {
                acc.owner = next.owner;
                acc.owner_url = next.owner_url;
            }
            acc.clause_unlock_in = acc.clause_unlock_in.or(next.clause_unlock_in);
            acc
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Position, Source};

    fn base() -> Url {
        Url::parse("https://biwenger.as.com/app/#/player/55").unwrap()
    }

    fn page(body: &str) -> Html {
        Html::parse_document(&format!("<html><body>{body}</body></html>"))
    }

    #[test]
    fn parses_structured_detail() {
        let html = page(
            r##"<div class="owner-box">Propiedad de <a href="#/user/991">Manolo FC</a></div>
                <div class="clause"><span class="clause-value">12.500.000 €</span>
                <span class="clause-deposit">2.000.000 €</span>
                <span class="clause-lock">Se desbloquea en 3 días 4 h</span></div>"##,
        );
        let fields = parse_detail(&html, &base());
        assert_eq!(fields.clause, Some(12_500_000));
        assert_eq!(fields.clause_deposited, Some(2_000_000));
        assert_eq!(fields.owner.as_deref(), Some("Manolo FC"));
        assert_eq!(
            fields.owner_url.as_deref(),
            Some("https://biwenger.as.com/app/#/user/991")
        );
        assert_eq!(fields.clause_unlock_in.as_deref(), Some("3 días 4 h"));
    }

    #[test]
    fn parses_labeled_text() {
        let html = page(
            "<p>Propietario: Ana</p><p>Cláusula: 8.000.000 €</p><p>Depositado: 500.000 €</p><p>Cláusula disponible</p>",
        );
        let fields = parse_detail(&html, &base());
        assert_eq!(fields.clause, Some(8_000_000));
        assert_eq!(fields.clause_deposited, Some(500_000));
        assert_eq!(fields.owner.as_deref(), Some("Ana"));
        assert_eq!(fields.owner_url, None);
        assert_eq!(fields.clause_unlock_in.as_deref(), Some("available"));
    }

    #[test]
    fn unrelated_page_is_empty() {
        let html = page("<h1>Estadísticas</h1><p>Jugador disponible para la jornada</p>");
        assert!(parse_detail(&html, &base()).is_empty());
    }

    #[test]
    fn merge_is_additive() {
        let mut record = Record::new("Pedri", Position::Midfielder, Source::Roster);
        record.owner = Some("Old".into());
        record.clause = Some(1);

        DetailFields {
            clause: Some(2),
            ..DetailFields::default()
        }
        .merge_into(&mut record);

        assert_eq!(record.clause, Some(2));
        assert_eq!(record.owner.as_deref(), Some("Old"));
    }

    #[test]
    fn frames_fill_gaps() {
        let main = "<html><body><p>Cláusula: 1.000 €</p></body></html>".to_owned();
        let frame =
            "<html><body><a href=\"/user/4\">Luis</a></body></html>".to_owned();
        let fields = parse_detail_documents(&[main, frame], &base());
        assert_eq!(fields.clause, Some(1_000));
        assert_eq!(fields.owner.as_deref(), Some("Luis"));
        assert_eq!(fields.owner_url.as_deref(), Some("https://biwenger.as.com/user/4"));
    }
}
