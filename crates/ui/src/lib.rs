use std::fmt::Write;

use ledger::{format_usd, Valuation};

pub fn render_wallet_page(user_id: &str, valuation: &Valuation) -> String {
    format!(
        "<!doctype html>\n<html>\n<head><meta charset=\"utf-8\"><title>Wallet</title></head>\n<body>\n<h1>Wallet for {}</h1>\n{}</body>\n</html>\n",
        escape_html(user_id),
        render_wallet_table(valuation)
    )
}

/// Cash line, one row per position, and the account total. Amounts are
/// rounded to cents here and nowhere else.
pub fn render_wallet_table(valuation: &Valuation) -> String {
    let mut html = String::new();
    let _ = writeln!(
        html,
        "<p id=\"cash\">Cash: {}</p>",
        format_usd(valuation.cash_usd)
    );
    html.push_str("<table>\n<thead><tr><th>Event</th><th>Qty</th><th>Avg Cost</th><th>Price</th><th>Market Value</th></tr></thead>\n<tbody>\n");

    if valuation.per_position.is_empty() {
        html.push_str("<tr><td colspan=\"5\">No positions yet.</td></tr>\n");
    }
    for position in &valuation.per_position {
        let _ = writeln!(
            html,
            "<tr data-instrument=\"{}\"><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            escape_html(&position.instrument_id),
            escape_html(&position.label),
            position.qty,
            format_usd(position.avg_cost),
            format_usd(position.max_price_usd),
            format_usd(position.market_value),
        );
    }

    html.push_str("</tbody>\n</table>\n");
    let _ = writeln!(
        html,
        "<p id=\"total\">Total Account Value: {}</p>",
        format_usd(valuation.total_value)
    );
    html
}

fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
