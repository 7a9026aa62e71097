use clap::Parser;
use loanledger::application::reconciliation::{MatcherConfig, ReconciliationMatcher};
use loanledger::interfaces::csv::payments_reader::PaymentsReader;
use loanledger::interfaces::csv::report_writer::MatchReportWriter;
use loanledger::interfaces::csv::statement_reader::StatementReader;
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Scores a bank statement against a pending-payments snapshot and prints
/// the ranked match report as CSV.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Bank statement CSV file (date, beneficiary, account, ref_code, cash_in)
    statement: PathBuf,

    /// Pending payments snapshot CSV file (payer, reference, amount, created[, method])
    #[arg(long)]
    payments: PathBuf,

    /// Minimum score for a pair to be reported as a candidate
    #[arg(long, default_value_t = 20)]
    candidate_floor: u32,

    /// Score at or above which a match is pre-selected for approval
    #[arg(long, default_value_t = 50)]
    auto_select: u32,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let payments_file = File::open(&cli.payments).into_diagnostic()?;
    let mut payments = Vec::new();
    for row in PaymentsReader::new(payments_file).payments() {
        match row {
            Ok(payment) => payments.push(payment),
            Err(e) => eprintln!("Error reading payment row: {}", e),
        }
    }

    let statement_file = File::open(&cli.statement).into_diagnostic()?;
    let mut transactions = Vec::new();
    for row in StatementReader::new(statement_file).transactions() {
        match row {
            Ok(tx) => transactions.push(tx),
            Err(e) => eprintln!("Error reading statement row: {}", e),
        }
    }

    let matcher = ReconciliationMatcher::new(MatcherConfig {
        candidate_floor: cli.candidate_floor,
        auto_select_threshold: cli.auto_select,
    });
    let report = matcher.match_batch(&transactions, &payments);

    let stdout = io::stdout();
    let mut writer = MatchReportWriter::new(stdout.lock());
    writer.write_report(&report).into_diagnostic()?;

    Ok(())
}
