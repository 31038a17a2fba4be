use super::fields;
use crate::locator::{LocatorChain, Strategy};
use crate::models::{Record, Source};
use html_scraper::ElementRef;
use std::sync::LazyLock;
use url::Url;

/// Player cards on the squad view, most specific first.
pub(super) static CANDIDATES: LazyLock<LocatorChain> = LazyLock::new(|| {
    LocatorChain::new(
        "roster-candidates",
        vec![
            Strategy::css("player-card"),
            Strategy::css("[data-player-id], [data-player]"),
            Strategy::css("[class*='player-card'], [class*='playerCard']"),
            Strategy::css("[class*='lineup'] [class*='player'], [class*='squad'] [class*='player']"),
            Strategy::css(
                "[class*='player'], [class*='card'], [class*='lineup'], [class*='squad']",
            ),
        ],
    )
});

pub(super) fn record(card: ElementRef<'_>, base: &Url) -> Option<Record> {
    let mut record = Record::new(fields::name(card)?, fields::position(card)?, Source::Roster);
    record.team = fields::team(card);
    record.price = fields::price(card);
    record.status = fields::status(card);
    record.trend = fields::trend(card);
    record.detail_url = fields::detail_url(card, base);
    Some(record)
}
