//! Pure text-to-value transforms for scraped markup.
//!
//! Nothing in here touches the browser: every function maps a string to a
//! value deterministically, so the whole module is tested with literals.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;
use std::sync::LazyLock;

/// Collapse every whitespace class (NBSP, narrow NBSP, zero-width space,
/// newlines) into single ASCII spaces and trim the ends.
pub fn normalize_whitespace(text: &str) -> String {
    text.split(|c: char| c.is_whitespace() || c == '\u{200B}' || c == '\u{FEFF}')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Extract the first run of digits and thousands separators as an integer.
///
/// Currency symbols, approximation markers (`~`, `≈`) and surrounding words
/// are ignored: `"≈ 4.650.000 €"` -> `Some(4650000)`. Returns `None` when no
/// digit is present or the value does not fit an `i64`.
pub fn parse_money(text: &str) -> Option<i64> {
    static MONEY_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d[\d.,]*").unwrap());

    let run = MONEY_RUN.find(text)?;
    let digits: String = run
        .as_str()
        .chars()
        .filter(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// Canonicalize a position code to `POR`, `DEF`, `MED` or `DEL`.
///
/// Unknown codes are upper-cased and returned as-is, so the function is total
/// and idempotent.
pub fn normalize_position(code: &str) -> String {
    let upper = code.trim().to_uppercase();
    match upper.as_str() {
        "DL" | "DEL" => "DEL".to_owned(),
        "DF" | "DEF" => "DEF".to_owned(),
        "MC" | "MED" | "MI" | "MD" => "MED".to_owned(),
        "POR" | "GK" | "GKP" => "POR".to_owned(),
        _ => upper,
    }
}

/// First line that looks like a player name (capitalized, three or more
/// characters) and is not a position code or a status word.
pub fn leading_name(text: &str) -> Option<String> {
    static NAME: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^\p{Lu}[\p{L}\p{M} .'\-]{2,}").unwrap());
    static CODE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\b(?:POR|DEF|MED|DEL)\b").unwrap());

    text.lines()
        .map(normalize_whitespace)
        .filter(|line| !line.is_empty())
        .filter(|line| position_token(line).as_deref() != Some(line.as_str()))
        .filter(|line| status_keyword(line).is_none_or(|s| s.len() < line.len()))
        .find_map(|line| {
            // A name never runs into the position code that follows it
            let head = CODE.find(&line).map_or(line.as_str(), |m| &line[..m.start()]);
            NAME.find(head)
                .map(|m| m.as_str().trim().to_owned())
                .filter(|name| name.chars().count() >= 3)
        })
}

/// A standalone position code inside free text.
pub fn position_token(text: &str) -> Option<String> {
    static POSITION: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\b(POR|DEF|MED|DEL)\b").unwrap());

    POSITION
        .captures(text)
        .map(|caps| normalize_position(&caps[1]))
}

/// Three-letter club code written as `(RMA)`.
pub fn team_code(text: &str) -> Option<String> {
    static TEAM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\(([A-Z]{2,3})\)").unwrap());

    TEAM.captures(text).map(|caps| caps[1].to_owned())
}

/// An amount followed by a currency marker (`€`, `M`, `M€`).
pub fn money_token(text: &str) -> Option<i64> {
    static PRICE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(\d[\d.,]*)\s?(?:M€|€|M\b)").unwrap());

    PRICE.captures(text).and_then(|caps| parse_money(&caps[1]))
}

/// Every amount followed by a currency marker, in document order.
pub fn money_tokens(text: &str) -> Vec<i64> {
    static PRICE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(\d[\d.,]*)\s?(?:M€|€|M\b)").unwrap());

    PRICE
        .captures_iter(text)
        .filter_map(|caps| parse_money(&caps[1]))
        .collect()
}

/// Availability keyword (injury, doubt, suspension...) lower-cased.
pub fn status_keyword(text: &str) -> Option<String> {
    static STATUS: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(
            r"(?i)\b(lesión|lesionado|duda|sanción|sancionado|baja|ok|titular|doubt|injured|suspended)\b",
        )
        .unwrap()
    });

    STATUS.captures(text).map(|caps| caps[1].to_lowercase())
}

/// Signed percentage such as `+5%` or `-12%`.
pub fn trend_token(text: &str) -> Option<String> {
    static TREND: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"([+\-−])\s?(\d+(?:[.,]\d+)?)\s?%").unwrap());

    TREND.captures(text).map(|caps| {
        let sign = if &caps[1] == "+" { '+' } else { '-' };
        format!("{sign}{}%", &caps[2])
    })
}

/// Account balance written next to a `Saldo`/`Presupuesto`/`Balance` label.
///
/// A leading minus sign is honored since the game allows negative balances.
pub fn balance_in_text(text: &str) -> Option<i64> {
    static BALANCE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?i)(?:saldo|presupuesto|balance)\s*:?\s*([-−]?)\s*(\d[\d.,]*)").unwrap()
    });

    let caps = BALANCE.captures(text)?;
    let amount = parse_money(&caps[2])?;
    Some(if caps[1].is_empty() { amount } else { -amount })
}

/// Human-relative duration such as `2 días 3 h` or `45 min`.
pub fn duration_phrase(text: &str) -> Option<String> {
    static DURATION: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(
            r"(?i)\d+\s*(?:días?|dias?|days?|d|horas?|hours?|h|minutos?|minutes?|min|m|segundos?|seconds?|s)\b(?:\s*\d+\s*(?:horas?|hours?|h|minutos?|minutes?|min|m|segundos?|seconds?|s)\b)*",
        )
        .unwrap()
    });

    DURATION
        .find(text)
        .map(|m| normalize_whitespace(m.as_str()))
}

/// Absolute deadline from a tooltip/title text.
///
/// Accepts ISO-like `2026-10-17T14:30[:00]` and the localized
/// `17/10/2026 14:30` (or `17/10/26 a las 14:30`). A date without a time
/// resolves to midnight.
pub fn parse_deadline(text: &str) -> Option<NaiveDateTime> {
    static ISO: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(\d{4})-(\d{2})-(\d{2})[T ](\d{2}):(\d{2})(?::(\d{2}))?").unwrap()
    });
    static LOCAL: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(\d{1,2})/(\d{1,2})/(\d{2,4})(?:\D{1,12}?(\d{1,2}):(\d{2}))?").unwrap()
    });

    if let Some(caps) = ISO.captures(text) {
        let date = NaiveDate::from_ymd_opt(
            caps[1].parse().ok()?,
            caps[2].parse().ok()?,
            caps[3].parse().ok()?,
        )?;
        let time = NaiveTime::from_hms_opt(
            num(caps.get(4))?,
            num(caps.get(5))?,
            num(caps.get(6)).unwrap_or(0),
        )?;
        return Some(date.and_time(time));
    }

    let caps = LOCAL.captures(text)?;
    let mut year: i32 = caps[3].parse().ok()?;
    if year < 100 {
        year += 2000;
    }
    let date = NaiveDate::from_ymd_opt(year, caps[2].parse().ok()?, caps[1].parse().ok()?)?;
    let time = match (num(caps.get(4)), num(caps.get(5))) {
        (Some(h), Some(m)) => NaiveTime::from_hms_opt(h, m, 0)?,
        _ => NaiveTime::MIN,
    };
    Some(date.and_time(time))
}

fn num(m: Option<regex::Match<'_>>) -> Option<u32> {
    m.and_then(|m| m.as_str().parse().ok())
}

/// Clause-unlock status: a duration phrase while the clause is locked, or the
/// literal `"available"` once it can be paid.
pub fn clause_unlock(text: &str) -> Option<String> {
    static LOCKED: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(
            r"(?i)\b(?:se desbloquea(?:rá)? en|desbloquea(?:rá)? en|disponible en|bloqueada durante|bloqueada|unlocks? in|available in|locked for)\s*:?\s*(.+)",
        )
        .unwrap()
    });
    static AVAILABLE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?i)\b(?:disponible|desbloqueada|available|unlocked)\b").unwrap()
    });

    if let Some(caps) = LOCKED.captures(text) {
        let rest = &caps[1];
        return duration_phrase(rest).or_else(|| {
            let phrase = normalize_whitespace(rest);
            (!phrase.is_empty()).then_some(phrase)
        });
    }

    AVAILABLE.is_match(text).then(|| "available".to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitespace_collapses_nbsp_and_newlines() {
        assert_eq!(
            normalize_whitespace("  Vinícius\u{00A0}\u{00A0}Jr.\n\t(RMA) \u{202F}"),
            "Vinícius Jr. (RMA)"
        );
        assert_eq!(normalize_whitespace("\u{200B}"), "");
    }

    #[test]
    fn money_examples() {
        assert_eq!(parse_money("4.650.000 €"), Some(4_650_000));
        assert_eq!(parse_money("30.000"), Some(30_000));
        assert_eq!(parse_money("n/a"), None);
    }

    #[test]
    fn money_ignores_symbols_and_approximation() {
        assert_eq!(parse_money("≈ €1,250,000"), Some(1_250_000));
        assert_eq!(parse_money("~ 980.000€ aprox."), Some(980_000));
        assert_eq!(parse_money(""), None);
    }

    #[test]
    fn money_takes_first_run_only() {
        assert_eq!(parse_money("12.000 € (antes 10.000 €)"), Some(12_000));
    }

    #[test]
    fn money_overflow_is_none() {
        assert_eq!(parse_money("99999999999999999999999"), None);
    }

    #[test]
    fn position_synonyms() {
        for (input, expected) in [
            ("DL", "DEL"),
            ("DEL", "DEL"),
            ("DF", "DEF"),
            ("DEF", "DEF"),
            ("MC", "MED"),
            ("MED", "MED"),
            ("MI", "MED"),
            ("MD", "MED"),
            ("POR", "POR"),
            ("GK", "POR"),
            ("GKP", "POR"),
            (" gk ", "POR"),
            ("md", "MED"),
        ] {
            assert_eq!(normalize_position(input), expected, "input {input:?}");
        }
    }

    #[test]
    fn position_passes_unknown_through_upper_cased() {
        assert_eq!(normalize_position("lateral"), "LATERAL");
        assert_eq!(normalize_position(""), "");
    }

    #[test]
    fn position_is_idempotent() {
        for input in ["dl", "Gk", "mi", "xyz", "  por", "straße", "Ǆ", "ǆ", "3", "Del "] {
            let once = normalize_position(input);
            assert_eq!(normalize_position(&once), once, "input {input:?}");
        }
    }

    #[test]
    fn name_skips_position_and_status_lines() {
        let text = "DEL\nOK\nKarim Benzema\n(RMA)\n4.650.000 €";
        assert_eq!(leading_name(text).as_deref(), Some("Karim Benzema"));
    }

    #[test]
    fn name_requires_capital_and_length() {
        assert_eq!(leading_name("de\n12\nab"), None);
        assert_eq!(leading_name("Ñico Williams").as_deref(), Some("Ñico Williams"));
    }

    #[test]
    fn name_stops_at_position_code() {
        assert_eq!(leading_name("Gavi MED (FCB)").as_deref(), Some("Gavi"));
        assert_eq!(leading_name("Lamine Yamal DEL 1 €").as_deref(), Some("Lamine Yamal"));
    }

    #[test]
    fn tokens_from_card_text() {
        let text = "Pedri (BAR) MED 23.400.000 € +4% duda";
        assert_eq!(position_token(text).as_deref(), Some("MED"));
        assert_eq!(team_code(text).as_deref(), Some("BAR"));
        assert_eq!(money_token(text), Some(23_400_000));
        assert_eq!(trend_token(text).as_deref(), Some("+4%"));
        assert_eq!(status_keyword(text).as_deref(), Some("duda"));
    }

    #[test]
    fn position_token_ignores_embedded_letters() {
        assert_eq!(position_token("DELANTERO"), None);
        assert_eq!(position_token("Modelo"), None);
    }

    #[test]
    fn money_tokens_in_order() {
        assert_eq!(
            money_tokens("Valor 5.000.000 € Venta 6.100.000 €"),
            vec![5_000_000, 6_100_000]
        );
    }

    #[test]
    fn trend_with_unicode_minus() {
        assert_eq!(trend_token("−12 %").as_deref(), Some("-12%"));
    }

    #[test]
    fn balance_from_label() {
        assert_eq!(balance_in_text("Saldo: 12.345.678 €"), Some(12_345_678));
        assert_eq!(balance_in_text("PRESUPUESTO 1.000"), Some(1_000));
        assert_eq!(balance_in_text("Saldo -250.000 €"), Some(-250_000));
        assert_eq!(balance_in_text("nothing here 1.000 €"), None);
    }

    #[test]
    fn duration_phrases() {
        assert_eq!(duration_phrase("Termina en 2 días 3 h").as_deref(), Some("2 días 3 h"));
        assert_eq!(duration_phrase("45min").as_deref(), Some("45min"));
        assert_eq!(duration_phrase("pronto"), None);
    }

    #[test]
    fn deadline_formats() {
        let expected = NaiveDate::from_ymd_opt(2026, 10, 17)
            .unwrap()
            .and_hms_opt(14, 30, 0)
            .unwrap();
        assert_eq!(parse_deadline("2026-10-17T14:30:00+02:00"), Some(expected));
        assert_eq!(parse_deadline("Finaliza el 17/10/2026 a las 14:30"), Some(expected));
        assert_eq!(parse_deadline("17/10/26 14:30"), Some(expected));
        assert_eq!(
            parse_deadline("17/10/2026"),
            NaiveDate::from_ymd_opt(2026, 10, 17).map(|d| d.and_time(NaiveTime::MIN))
        );
        assert_eq!(parse_deadline("32/13/2026"), None);
        assert_eq!(parse_deadline("mañana"), None);
    }

    #[test]
    fn clause_unlock_phrases() {
        assert_eq!(
            clause_unlock("Cláusula bloqueada. Se desbloquea en 3 días 4 h").as_deref(),
            Some("3 días 4 h")
        );
        assert_eq!(
            clause_unlock("Unlocks in 12 hours").as_deref(),
            Some("12 hours")
        );
        assert_eq!(clause_unlock("Cláusula disponible").as_deref(), Some("available"));
        assert_eq!(clause_unlock("Sin información"), None);
    }
}
