mod common;

use chrono::Utc;
use common::{activate_loan, date, installment, interest_config, ledger, pending_payment};
use loanledger::domain::bank::BankTransaction;
use loanledger::domain::money::Balance;
use loanledger::domain::payment::PaymentStatus;
use loanledger::error::LedgerError;
use rust_decimal_macros::dec;

fn statement_row(amount: rust_decimal::Decimal, beneficiary: &str, ref_code: &str) -> BankTransaction {
    BankTransaction {
        transaction_date: Utc::now().date_naive(),
        beneficiary: beneficiary.to_string(),
        account: "0123456789".to_string(),
        ref_code: ref_code.to_string(),
        amount,
    }
}

#[tokio::test]
async fn test_exact_match_flows_through_to_the_ledger() {
    let ledger = ledger();
    let app = activate_loan(&ledger, interest_config()).await;
    let r = installment(app.id, 1, date(2026, 8, 1), dec!(1000), dec!(0));
    let repayment_id = r.id;
    ledger.repayments.upsert(r).await.unwrap();

    let payment = pending_payment(app.id, dec!(700), "LN-42", "Jane Doe");
    ledger.payments.insert(payment.clone()).await.unwrap();

    let batch = vec![statement_row(dec!(700), "Jane Doe", "TRF/001")];
    let pending = ledger
        .payments
        .list_by_status(PaymentStatus::Pending)
        .await
        .unwrap();
    let report = ledger.reconciliation.match_batch(&batch, &pending);

    assert_eq!(report.matches.len(), 1);
    assert!(report.unmatched.is_empty());
    let m = &report.matches[0];
    assert_eq!(m.score, 100);
    assert!(m.auto_selected);
    assert_eq!(m.payment_id, payment.id);

    let auto_selected: Vec<_> = report
        .matches
        .iter()
        .filter(|m| m.auto_selected)
        .cloned()
        .collect();
    let summary = ledger.reconciliation.batch_approve(&auto_selected).await;
    assert_eq!(summary.approved(), 1);
    assert_eq!(summary.failed(), 0);

    let payment = ledger.payments.get(payment.id).await.unwrap().unwrap();
    assert_eq!(payment.status, PaymentStatus::Approved);
    assert!(payment.notes.unwrap().contains("TRF/001"));

    let r = ledger.repayments.get(repayment_id).await.unwrap().unwrap();
    assert_eq!(r.principal_paid, Balance::new(dec!(700)));
}

#[tokio::test]
async fn test_unknown_transactions_are_reported_unmatched() {
    let ledger = ledger();
    let app = activate_loan(&ledger, interest_config()).await;

    let payment = pending_payment(app.id, dec!(700), "LN-42", "Jane Doe");
    ledger.payments.insert(payment).await.unwrap();
    let pending = ledger
        .payments
        .list_by_status(PaymentStatus::Pending)
        .await
        .unwrap();

    let batch = vec![statement_row(dec!(123.45), "Nobody Known", "TRF/999")];
    let report = ledger.reconciliation.match_batch(&batch, &pending);

    assert!(report.matches.is_empty());
    assert_eq!(report.unmatched.len(), 1);
    assert_eq!(report.unmatched[0].beneficiary, "Nobody Known");
}

#[tokio::test]
async fn test_partial_failure_does_not_roll_back_the_batch() {
    let ledger = ledger();
    let app = activate_loan(&ledger, interest_config()).await;
    let r = installment(app.id, 1, date(2026, 8, 1), dec!(2000), dec!(0));
    ledger.repayments.upsert(r).await.unwrap();

    let p1 = pending_payment(app.id, dec!(700), "LN-42", "Jane Doe");
    let p2 = pending_payment(app.id, dec!(250), "LN-43", "Wei Chen");
    ledger.payments.insert(p1.clone()).await.unwrap();
    ledger.payments.insert(p2.clone()).await.unwrap();

    // p2 was resolved by another actor between scoring and approval.
    ledger
        .approvals
        .reject(p2.id, "manual review", None)
        .await
        .unwrap();

    let batch = vec![
        statement_row(dec!(700), "Jane Doe", "TRF/001"),
        statement_row(dec!(250), "Wei Chen", "TRF/002"),
    ];
    let pending = vec![p1.clone(), p2.clone()];
    let report = ledger.reconciliation.match_batch(&batch, &pending);
    assert_eq!(report.matches.len(), 2);

    let summary = ledger.reconciliation.batch_approve(&report.matches).await;
    assert_eq!(summary.approved(), 1);
    assert_eq!(summary.failed(), 1);

    let failed = summary
        .items
        .iter()
        .find(|i| i.payment_id == p2.id)
        .unwrap();
    assert!(matches!(
        failed.outcome.as_ref().unwrap_err(),
        LedgerError::AlreadyProcessed { .. }
    ));

    // The winner still landed.
    let p1 = ledger.payments.get(p1.id).await.unwrap().unwrap();
    assert_eq!(p1.status, PaymentStatus::Approved);
}

#[tokio::test]
async fn test_near_match_is_listed_but_not_auto_selected() {
    let ledger = ledger();
    let app = activate_loan(&ledger, interest_config()).await;

    let payment = pending_payment(app.id, dec!(500), "LN-42", "Jane Doe");
    ledger.payments.insert(payment.clone()).await.unwrap();
    let pending = ledger
        .payments
        .list_by_status(PaymentStatus::Pending)
        .await
        .unwrap();

    // Wrong amount, shared surname token only.
    let batch = vec![statement_row(dec!(480), "Jane Smith", "TRF/001")];
    let report = ledger.reconciliation.match_batch(&batch, &pending);

    assert_eq!(report.matches.len(), 1);
    let m = &report.matches[0];
    assert!(!m.auto_selected);
    assert!(m.score < 50);
    assert!(m.score >= 20);
}
