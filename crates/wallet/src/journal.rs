use std::io::{self, Write};

use ledger::{Side, TradeError, TradeOutcome, TradeRequest};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use tracing::warn;

pub const JOURNAL_CSV_HEADER: &str =
    "recorded_at,user_id,side,instrument_id,qty,requested_price_usd,exec_price_usd,outcome\n";

#[derive(Debug, Clone, PartialEq)]
pub struct JournalEntry {
    pub recorded_at: OffsetDateTime,
    pub user_id: String,
    pub side: Side,
    pub instrument_id: String,
    pub qty: f64,
    pub requested_price_usd: f64,
    pub exec_price_usd: Option<f64>,
    pub rejection: Option<TradeError>,
}

impl JournalEntry {
    pub fn from_outcome(
        user_id: &str,
        request: &TradeRequest,
        outcome: &TradeOutcome,
        recorded_at: OffsetDateTime,
    ) -> Self {
        let (exec_price_usd, rejection) = match &outcome.result {
            Ok(fill) => (Some(fill.exec_price_usd), None),
            Err(err) => (None, Some(*err)),
        };

        Self {
            recorded_at,
            user_id: user_id.to_owned(),
            side: request.side.clone(),
            instrument_id: request.instrument_id.clone(),
            qty: request.qty,
            requested_price_usd: request.price_usd,
            exec_price_usd,
            rejection,
        }
    }

    pub fn outcome_label(&self) -> &'static str {
        match self.rejection {
            None => "applied",
            Some(err) => err.code(),
        }
    }
}

pub trait TradeJournal {
    fn record(&mut self, entry: JournalEntry);
}

#[derive(Debug, Default)]
pub struct InMemoryTradeJournal {
    entries: Vec<JournalEntry>,
}

impl InMemoryTradeJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[JournalEntry] {
        &self.entries
    }
}

impl TradeJournal for InMemoryTradeJournal {
    fn record(&mut self, entry: JournalEntry) {
        self.entries.push(entry);
    }
}

pub struct CsvTradeJournal<W: Write> {
    writer: W,
}

impl<W: Write> CsvTradeJournal<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn write_header(&mut self) -> io::Result<()> {
        self.writer.write_all(JOURNAL_CSV_HEADER.as_bytes())?;
        self.writer.flush()
    }

    pub fn append(&mut self, entry: &JournalEntry) -> io::Result<()> {
        let recorded_at = entry
            .recorded_at
            .format(&Rfc3339)
            .unwrap_or_else(|_| entry.recorded_at.unix_timestamp().to_string());
        let exec_price = entry
            .exec_price_usd
            .map(|price| price.to_string())
            .unwrap_or_default();

        writeln!(
            self.writer,
            "{recorded_at},{},{},{},{},{},{exec_price},{}",
            escape_csv_field(&entry.user_id),
            escape_csv_field(entry.side.as_str()),
            escape_csv_field(&entry.instrument_id),
            entry.qty,
            entry.requested_price_usd,
            entry.outcome_label(),
        )?;
        self.writer.flush()
    }
}

impl<W: Write> TradeJournal for CsvTradeJournal<W> {
    fn record(&mut self, entry: JournalEntry) {
        if let Err(err) = self.append(&entry) {
            warn!(error = %err, user_id = %entry.user_id, "trade journal write failed");
        }
    }
}

fn escape_csv_field(value: &str) -> String {
    let needs_quotes = value
        .chars()
        .any(|ch| matches!(ch, ',' | '"' | '\n' | '\r'));
    if !needs_quotes {
        return value.to_string();
    }

    let escaped = value.replace('"', "\"\"");
    format!("\"{escaped}\"")
}

#[cfg(test)]
mod tests {
    use ledger::{apply_trade, TradeError, TradeRequest, WalletState};
    use time::OffsetDateTime;

    use super::{CsvTradeJournal, InMemoryTradeJournal, JournalEntry, TradeJournal, JOURNAL_CSV_HEADER};

    fn recorded_at() -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(1_735_689_600).unwrap()
    }

    fn entry_for(request: TradeRequest) -> JournalEntry {
        let outcome = apply_trade(&WalletState::default(), &request);
        JournalEntry::from_outcome("1", &request, &outcome, recorded_at())
    }

    #[test]
    fn entry_captures_rejection_reason() {
        let entry = entry_for(TradeRequest::sell("evt1", 1.0, 5.0));

        assert_eq!(entry.rejection, Some(TradeError::InsufficientHoldings));
        assert_eq!(entry.exec_price_usd, None);
        assert_eq!(entry.outcome_label(), "insufficient_holdings");
    }

    #[test]
    fn in_memory_journal_keeps_entries_in_order() {
        let mut journal = InMemoryTradeJournal::new();

        journal.record(entry_for(TradeRequest::buy("a", 1.0, 1.0)));
        journal.record(entry_for(TradeRequest::buy("b", 1.0, 1.0)));

        let ids: Vec<&str> = journal
            .entries()
            .iter()
            .map(|entry| entry.instrument_id.as_str())
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn csv_journal_writes_header_and_rows() {
        let mut output = Vec::new();
        {
            let mut journal = CsvTradeJournal::new(&mut output);
            journal.write_header().unwrap();
            journal.record(entry_for(TradeRequest::buy("evt1", 5.0, 10.0)));
        }

        assert_eq!(
            String::from_utf8(output).unwrap(),
            format!("{JOURNAL_CSV_HEADER}2025-01-01T00:00:00Z,1,BUY,evt1,5,10,10,applied\n")
        );
    }

    #[test]
    fn csv_journal_escapes_instrument_ids() {
        let mut output = Vec::new();
        {
            let mut journal = CsvTradeJournal::new(&mut output);
            journal.record(entry_for(TradeRequest::buy("evt,\"1\"", 1.0, 1.0)));
        }

        let row = String::from_utf8(output).unwrap();
        assert!(row.contains(",\"evt,\"\"1\"\"\","));
    }
}
