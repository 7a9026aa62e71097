pub mod payments_reader;
pub mod report_writer;
pub mod statement_reader;
