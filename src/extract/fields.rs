//! Per-field sub-locators for a single candidate element.
//!
//! Each field is resolved in the same order: an attribute on the candidate,
//! then a class-fragment descendant, then a text pattern over the candidate's
//! block text.

use crate::locator::{LocatorChain, Strategy, block_text, element_text};
use crate::models::Position;
use crate::parse::{
    balance_in_text, duration_phrase, leading_name, money_token, money_tokens,
    normalize_whitespace, parse_deadline, parse_money, position_token, status_keyword,
    team_code, trend_token,
};
use chrono::NaiveDateTime;
use html_scraper::ElementRef;
use regex::Regex;
use std::sync::LazyLock;
use url::Url;

static NAME: LazyLock<LocatorChain> = LazyLock::new(|| {
    LocatorChain::new(
        "name",
        vec![
            Strategy::css("[itemprop='name']"),
            Strategy::css("[class*='player-name'], [class*='playerName']"),
            Strategy::css(
                "a[class*='name']:not([class*='team']), [class*='name']:not([class*='team']) a",
            ),
            Strategy::css("[class*='name']:not([class*='team'])"),
            Strategy::css("h2, h3, h4"),
        ],
    )
});

static POSITION: LazyLock<LocatorChain> = LazyLock::new(|| {
    LocatorChain::new(
        "position",
        vec![
            Strategy::attribute("player-position, [class*='position']", "position"),
            Strategy::css("player-position, [class*='position'], [class*='pos']"),
        ],
    )
});

static TEAM: LazyLock<LocatorChain> = LazyLock::new(|| {
    LocatorChain::new(
        "team",
        vec![
            Strategy::css("[class*='team-name'], [class*='teamName']"),
            Strategy::css("[class*='team'] img[alt], img[class*='team'][alt]"),
        ],
    )
});

static PRICE: LazyLock<LocatorChain> = LazyLock::new(|| {
    LocatorChain::new(
        "price",
        vec![
            Strategy::attribute("[class*='price'], [class*='value']", "data-value"),
            Strategy::css("[class*='price'], [class*='market-value'], [class*='marketValue']"),
        ],
    )
});

static SALE_PRICE: LazyLock<LocatorChain> = LazyLock::new(|| {
    LocatorChain::new(
        "sale-price",
        vec![
            Strategy::css("[class*='sale-price'], [class*='salePrice'], [class*='asking']"),
            Strategy::css("[class*='offer'] [class*='price'], [class*='sale'] [class*='price']"),
        ],
    )
});

static LISTED_PRICE: LazyLock<LocatorChain> = LazyLock::new(|| {
    LocatorChain::new(
        "listed-price",
        vec![Strategy::css(
            "[class*='market-value'], [class*='marketValue'], [class*='player-value']",
        )],
    )
});

static STATUS: LazyLock<LocatorChain> = LazyLock::new(|| {
    LocatorChain::new(
        "status",
        vec![
            Strategy::css("player-status, [class*='status']"),
            Strategy::css("[class*='injur'], [class*='doubt'], [class*='sanction']"),
        ],
    )
});

static TREND: LazyLock<LocatorChain> = LazyLock::new(|| {
    LocatorChain::new(
        "trend",
        vec![Strategy::css(
            "[class*='trend'], [class*='increment'], [class*='variation'], [class*='diff']",
        )],
    )
});

static DETAIL_LINK: LazyLock<LocatorChain> = LazyLock::new(|| {
    LocatorChain::new(
        "detail-link",
        vec![
            Strategy::css("a[href*='/player/'], a[href*='/players/']"),
            Strategy::attribute("[class*='name']", "data-href"),
        ],
    )
});

static EXPIRY_ELEMENT: LazyLock<LocatorChain> = LazyLock::new(|| {
    LocatorChain::new(
        "expiry",
        vec![Strategy::css(
            "[class*='expir'], [class*='countdown'], [class*='deadline'], [class*='time-left'], [class*='remaining']",
        )],
    )
});

static BALANCE: LazyLock<LocatorChain> = LazyLock::new(|| {
    LocatorChain::new(
        "balance",
        vec![
            Strategy::attribute("*", "data-balance"),
            Strategy::css("[class*='balance'], [class*='saldo'], [class*='budget']"),
        ],
    )
});

/// Attributes that may carry an absolute deadline.
const DEADLINE_ATTRS: &[&str] = &["title", "data-tooltip", "data-original-title", "aria-label", "datetime"];

/// Visible text, or a label attribute for text-less elements (icons, images).
fn display_text(el: ElementRef<'_>) -> String {
    let text = element_text(el);
    if !text.is_empty() {
        return text;
    }
    ["title", "alt", "aria-label"]
        .iter()
        .find_map(|attr| el.attr(attr))
        .map(normalize_whitespace)
        .unwrap_or_default()
}

fn own_attr(card: ElementRef<'_>, attrs: &[&str]) -> Option<String> {
    attrs
        .iter()
        .find_map(|attr| card.attr(attr))
        .map(normalize_whitespace)
        .filter(|value| !value.is_empty())
}

/// Display text of every element the chain commits to.
fn texts(card: ElementRef<'_>, chain: &LocatorChain) -> Vec<String> {
    chain
        .first_match(card)
        .map(|(_, els)| {
            els.into_iter()
                .map(display_text)
                .filter(|t| !t.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

pub fn name(card: ElementRef<'_>) -> Option<String> {
    own_attr(card, &["data-name", "data-player-name"])
        .or_else(|| {
            texts(card, &NAME)
                .into_iter()
                .find(|text| plausible_name(text))
        })
        .or_else(|| leading_name(&block_text(card)))
}

fn plausible_name(text: &str) -> bool {
    let chars = text.chars().count();
    (2..=60).contains(&chars)
        && text.chars().any(char::is_alphabetic)
        && position_token(text).as_deref() != Some(text)
        && money_token(text).is_none()
}

/// Biwenger-style numeric position codes (`1`..`4`).
fn numeric_position(code: &str) -> Option<Position> {
    match code.trim() {
        "1" => Some(Position::Goalkeeper),
        "2" => Some(Position::Defender),
        "3" => Some(Position::Midfielder),
        "4" => Some(Position::Forward),
        _ => None,
    }
}

fn position_code(code: &str) -> Option<Position> {
    numeric_position(code).or_else(|| Position::from_code(code))
}

pub fn position(card: ElementRef<'_>) -> Option<Position> {
    if let Some(position) = own_attr(card, &["data-position", "position"])
        .as_deref()
        .and_then(position_code)
    {
        return Some(position);
    }

    let from_element = POSITION.first_match(card).and_then(|(strategy, els)| {
        els.into_iter().find_map(|el| {
            if strategy == 0 {
                el.attr("position").and_then(position_code)
            } else {
                position_code(&display_text(el))
            }
        })
    });

    from_element.or_else(|| {
        position_token(&block_text(card)).and_then(|code| Position::from_code(&code))
    })
}

pub fn team(card: ElementRef<'_>) -> Option<String> {
    own_attr(card, &["data-team"])
        .or_else(|| texts(card, &TEAM).into_iter().next())
        .or_else(|| team_code(&block_text(card)))
}

fn amount(card: ElementRef<'_>, attrs: &[&str], chain: &LocatorChain) -> Option<i64> {
    if let Some(value) = own_attr(card, attrs).as_deref().and_then(parse_money) {
        return Some(value);
    }
    chain.first_match(card).and_then(|(_, els)| {
        els.into_iter().find_map(|el| {
            el.attr("data-value")
                .and_then(parse_money)
                .or_else(|| parse_money(&display_text(el)))
        })
    })
}

/// Single price for a roster card.
pub fn price(card: ElementRef<'_>) -> Option<i64> {
    amount(card, &["data-price", "data-value"], &PRICE).or_else(|| money_token(&block_text(card)))
}

/// Asking price and market value of a market row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MarketPrices {
    pub sale: Option<i64>,
    pub listed: Option<i64>,
}

static SALE_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:precio|venta|en venta|sale|asking)\b\D{0,16}?(\d[\d.,]*)\s?(?:M€|€|M\b)")
        .unwrap()
});
static LISTED_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:valor|valor de mercado|value|market value)\b\D{0,16}?(\d[\d.,]*)\s?(?:M€|€|M\b)")
        .unwrap()
});

pub fn market_prices(card: ElementRef<'_>) -> MarketPrices {
    let mut prices = MarketPrices {
        sale: amount(card, &["data-sale-price", "data-price"], &SALE_PRICE),
        listed: amount(card, &["data-market-value", "data-value"], &LISTED_PRICE),
    };
    if prices.sale.is_some() && prices.listed.is_some() {
        return prices;
    }

    let text = block_text(card);
    let labeled = |re: &Regex| re.captures(&text).and_then(|caps| parse_money(&caps[1]));
    prices.sale = prices.sale.or_else(|| labeled(&SALE_LABEL));
    prices.listed = prices.listed.or_else(|| labeled(&LISTED_LABEL));

    if prices.sale.is_none() && prices.listed.is_none() {
        // Unlabeled amounts: the card shows the market value first and the
        // asking price after it
        let amounts = money_tokens(&text);
        prices.listed = amounts.first().copied();
        prices.sale = amounts.get(1).copied();
    } else if prices.listed.is_none() {
        prices.listed = amount(card, &[], &PRICE).filter(|value| Some(*value) != prices.sale);
    }
    prices
}

pub fn status(card: ElementRef<'_>) -> Option<String> {
    if let Some(status) = own_attr(card, &["data-status"]) {
        return Some(status.to_lowercase());
    }

    let from_element = STATUS.first_match(card).and_then(|(_, els)| {
        els.into_iter().find_map(|el| {
            let hints = [
                display_text(el),
                el.attr("class").unwrap_or_default().replace(['-', '_'], " "),
            ];
            hints.iter().find_map(|hint| status_keyword(hint))
        })
    });

    from_element.or_else(|| status_keyword(&block_text(card)))
}

pub fn trend(card: ElementRef<'_>) -> Option<String> {
    texts(card, &TREND)
        .iter()
        .find_map(|text| trend_token(text))
        .or_else(|| trend_token(&block_text(card)))
}

/// Absolute http(s) URL of the player's detail page.
pub fn detail_url(card: ElementRef<'_>, base: &Url) -> Option<String> {
    let href = own_attr(card, &["data-href"])
        .or_else(|| {
            (card.value().name() == "a")
                .then(|| card.attr("href"))
                .flatten()
                .filter(|href| href.contains("/player"))
                .map(str::to_owned)
        })
        .or_else(|| {
            DETAIL_LINK.first_match(card).and_then(|(_, els)| {
                els.into_iter()
                    .find_map(|el| el.attr("href").or_else(|| el.attr("data-href")))
                    .map(str::to_owned)
            })
        })?;
    absolute_url(base, &href)
}

/// Join `href` onto `base`, keeping only http(s) results.
pub fn absolute_url(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href == "#" || href.starts_with("javascript:") {
        return None;
    }
    let url = base.join(href).ok()?;
    matches!(url.scheme(), "http" | "https").then(|| url.to_string())
}

/// Deadline from a tooltip-like attribute anywhere in the card.
pub fn expires_at(card: ElementRef<'_>) -> Option<NaiveDateTime> {
    std::iter::once(card)
        .chain(card.descendants().filter_map(ElementRef::wrap))
        .find_map(|el| {
            DEADLINE_ATTRS
                .iter()
                .filter_map(|attr| el.attr(attr))
                .find_map(parse_deadline)
        })
}

static EXPIRY_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)expira|finaliza|termina|quedan?|restan?|cierra|ends|left|expires").unwrap()
});

/// Relative time left on a market listing.
pub fn expires_in(card: ElementRef<'_>) -> Option<String> {
    texts(card, &EXPIRY_ELEMENT)
        .iter()
        .find_map(|text| duration_phrase(text))
        .or_else(|| {
            // Only lines that talk about time; bare amounts like `23 M` look like durations
            block_text(card)
                .lines()
                .filter(|line| EXPIRY_LINE.is_match(line))
                .find_map(duration_phrase)
        })
}

/// Account balance shown anywhere in the document.
pub fn balance(root: ElementRef<'_>) -> Option<i64> {
    if let Some((strategy, els)) = BALANCE.first_match(root) {
        let found = els.into_iter().find_map(|el| {
            if strategy == 0 {
                el.attr("data-balance").and_then(signed_amount)
            } else {
                let text = display_text(el);
                balance_in_text(&text).or_else(|| signed_amount(&text))
            }
        });
        if found.is_some() {
            return found;
        }
    }
    balance_in_text(&block_text(root))
}

fn signed_amount(text: &str) -> Option<i64> {
    let amount = parse_money(text)?;
    let negative = text
        .trim_start()
        .starts_with(['-', '−']);
    Some(if negative { -amount } else { amount })
}
