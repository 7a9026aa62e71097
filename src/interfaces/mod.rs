//! Inbound/outbound adapters: CSV import of bank statements and payment
//! snapshots, CSV export of match reports.

pub mod csv;
