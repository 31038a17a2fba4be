//! Extraction engine: turns a rendered view into records.
//!
//! Pages are read as serialized HTML and parsed here, so parsing never holds
//! a browser handle and every function apart from [`extract_view`] is pure.

mod fields;
mod market;
mod roster;

pub use fields::absolute_url;

use crate::browser::Driver;
use crate::locator::{LocatorChain, contains, parse_documents};
use crate::models::{Record, ViewTarget};
use crate::outcome::Outcome;
use html_scraper::{ElementRef, Html};
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Records and balance read from one view.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewData {
    pub records: Vec<Record>,
    pub balance: Option<i64>,
}

fn candidates(view: ViewTarget) -> &'static LocatorChain {
    match view {
        ViewTarget::Roster => &roster::CANDIDATES,
        ViewTarget::Market => &market::CANDIDATES,
    }
}

fn reduce(card: ElementRef<'_>, view: ViewTarget, base: &Url) -> Option<Record> {
    match view {
        ViewTarget::Roster => roster::record(card, base),
        ViewTarget::Market => market::record(card, base),
    }
}

/// Records of one document, in document order.
///
/// Candidates that lack a name or a position are dropped. When candidates
/// nest, only the innermost one that resolves a record is kept.
pub fn extract_records(html: &Html, view: ViewTarget, base: &Url) -> Vec<Record> {
    let Some((strategy, elements)) = candidates(view).first_match(html.root_element()) else {
        debug!(view = view.as_str(), "no candidate elements");
        return Vec::new();
    };

    let resolved: Vec<(ElementRef<'_>, Record)> = elements
        .into_iter()
        .filter_map(|el| reduce(el, view, base).map(|record| (el, record)))
        .collect();

    let records: Vec<Record> = resolved
        .iter()
        .filter(|(el, _)| !resolved.iter().any(|(other, _)| contains(*el, *other)))
        .map(|(_, record)| record.clone())
        .collect();

    debug!(
        view = view.as_str(),
        strategy,
        resolved = resolved.len(),
        kept = records.len(),
        "extracted records"
    );
    records
}

/// Balance shown in a document, if any.
pub fn extract_balance(html: &Html) -> Option<i64> {
    fields::balance(html.root_element())
}

/// Pure part of [`extract_view`]: main document first, frames only when the
/// main document yields nothing.
pub fn parse_view(raw: &[String], view: ViewTarget, base: &Url) -> ViewData {
    let documents = parse_documents(raw);

    let records = documents
        .iter()
        .map(|doc| extract_records(doc, view, base))
        .find(|records| !records.is_empty())
        .unwrap_or_default();
    let balance = documents.iter().find_map(extract_balance);

    ViewData { records, balance }
}

/// Read the current page and extract `view` from it.
///
/// Nothing locatable is a successful, empty result; only driver failures and
/// the deadline produce other outcomes.
pub async fn extract_view(
    driver: &dyn Driver,
    view: ViewTarget,
    fallback_base: &Url,
    limit: Duration,
) -> Outcome<ViewData> {
    Outcome::bounded(limit, async {
        let documents = driver.documents().await?;
        let base = driver
            .current_url()
            .await
            .ok()
            .and_then(|url| Url::parse(&url).ok())
            .filter(|url| matches!(url.scheme(), "http" | "https"))
            .unwrap_or_else(|| fallback_base.clone());
        Ok(Some(parse_view(&documents, view, &base)))
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Position, Source};

    fn base() -> Url {
        Url::parse("https://biwenger.as.com/app/#/league/7/team").unwrap()
    }

    fn page(body: &str) -> Html {
        Html::parse_document(&format!("<html><body>{body}</body></html>"))
    }

    #[test]
    fn drops_candidates_without_position() {
        let html = page(
            r#"<player-card><span class="player-name">Pedri</span> <span>MED</span> <span class="price">23.000.000 €</span></player-card>
               <player-card><span class="player-name">Mystery</span> <span class="price">1.000 €</span></player-card>"#,
        );
        let records = extract_records(&html, ViewTarget::Roster, &base());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "Pedri");
        assert_eq!(records[0].position, Position::Midfielder);
        assert_eq!(records[0].price, Some(23_000_000));
        assert_eq!(records[0].source, Source::Roster);
    }

    #[test]
    fn nested_loose_matches_keep_innermost() {
        let html = page(
            r#"<div class="lineup">
                 <div class="card"><b>Gavi</b> MED (FCB)</div>
                 <div class="card"><b>Koundé</b> DEF (FCB)</div>
               </div>"#,
        );
        let records = extract_records(&html, ViewTarget::Roster, &base());
        let names: Vec<_> = records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["Gavi", "Koundé"]);
        assert!(records.iter().all(|r| r.team.as_deref() == Some("FCB")));
    }

    #[test]
    fn market_prefers_sale_price() {
        let html = page(
            r#"<div class="market-list">
                 <div class="market-item">
                   <span class="player-name">Isco</span> <span>MED</span>
                   <span class="market-value">4.000.000 €</span>
                   <span class="sale-price">4.400.000 €</span>
                   <span class="countdown">2 h 10 min</span>
                 </div>
               </div>"#,
        );
        let records = extract_records(&html, ViewTarget::Market, &base());
        assert_eq!(records.len(), 1);
        let isco = &records[0];
        assert_eq!(isco.price, Some(4_400_000));
        assert_eq!(isco.listed_price, Some(4_000_000));
        assert_eq!(isco.expires_in.as_deref(), Some("2 h 10 min"));
        assert_eq!(isco.source, Source::Market);
    }

    #[test]
    fn broad_table_rows() {
        let html = page(
            "<table><tr><td>Joselu</td><td>DEL</td><td>(ESP)</td><td>2.000.000 €</td></tr><tr><th>Jugador</th></tr></table>",
        );
        let records = extract_records(&html, ViewTarget::Market, &base());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "Joselu");
        assert_eq!(records[0].team.as_deref(), Some("ESP"));
        assert_eq!(records[0].price, Some(2_000_000));
        assert_eq!(records[0].listed_price, Some(2_000_000));
    }

    #[test]
    fn nothing_locatable_is_empty() {
        let html = page("<p>Cargando…</p>");
        assert!(extract_records(&html, ViewTarget::Roster, &base()).is_empty());
        assert!(extract_records(&html, ViewTarget::Market, &base()).is_empty());
    }

    #[test]
    fn parse_view_uses_frames_when_main_is_empty() {
        let main = "<html><body><p>Saldo: 1.000.000 €</p></body></html>".to_owned();
        let frame =
            "<html><body><player-card>Lamine Yamal DEL</player-card></body></html>".to_owned();
        let data = parse_view(&[main, frame], ViewTarget::Roster, &base());
        assert_eq!(data.records.len(), 1);
        assert_eq!(data.balance, Some(1_000_000));
    }
}
