use std::io::Write;

use crate::application::reconciliation::MatchReport;
use crate::error::Result;

/// Writes a reconciliation match report as CSV.
///
/// Matched transactions come first, ranked by score; unmatched ones follow
/// with an empty payment column so operators see the full batch.
pub struct MatchReportWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> MatchReportWriter<W> {
    pub fn new(destination: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(destination),
        }
    }

    pub fn write_report(&mut self, report: &MatchReport) -> Result<()> {
        self.writer.write_record([
            "date",
            "beneficiary",
            "cash_in",
            "payment",
            "score",
            "auto_selected",
            "reasons",
        ])?;

        for m in &report.matches {
            self.writer.write_record([
                m.transaction.transaction_date.to_string(),
                m.transaction.beneficiary.clone(),
                m.transaction.amount.to_string(),
                m.payment_id.to_string(),
                m.score.to_string(),
                m.auto_selected.to_string(),
                m.reasons.join("; "),
            ])?;
        }
        for tx in &report.unmatched {
            self.writer.write_record([
                tx.transaction_date.to_string(),
                tx.beneficiary.clone(),
                tx.amount.to_string(),
                String::new(),
                "0".to_string(),
                "false".to_string(),
                "no candidate above floor".to_string(),
            ])?;
        }

        self.writer.flush()?;
        Ok(())
    }
}
