use super::fields;
use crate::locator::{LocatorChain, Strategy};
use crate::models::{Record, Source};
use html_scraper::ElementRef;
use std::sync::LazyLock;
use url::Url;

/// Market listings, most specific first. The last entry is the broad net
/// that also catches table-based layouts.
pub(super) static CANDIDATES: LazyLock<LocatorChain> = LazyLock::new(|| {
    LocatorChain::new(
        "market-candidates",
        vec![
            Strategy::css("market-player, [class*='market'] player-card"),
            Strategy::css("[class*='market'] [data-player-id], [class*='market'] [data-player]"),
            Strategy::css("[class*='market-item'], [class*='marketItem'], [class*='market-row']"),
            Strategy::css(
                "table tr, [class*='market'] [class*='row'], [class*='market'] [class*='item']",
            ),
        ],
    )
});

pub(super) fn record(card: ElementRef<'_>, base: &Url) -> Option<Record> {
    let mut record = Record::new(fields::name(card)?, fields::position(card)?, Source::Market);
    let prices = fields::market_prices(card);
    record.price = prices.sale.or(prices.listed);
    record.listed_price = prices.listed;
    record.team = fields::team(card);
    record.status = fields::status(card);
    record.trend = fields::trend(card);
    record.detail_url = fields::detail_url(card, base);
    record.expires_in = fields::expires_in(card);
    record.expires_at = fields::expires_at(card);
    Some(record)
}
