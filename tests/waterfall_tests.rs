mod common;

use chrono::Utc;
use common::{activate_loan, combined_config, date, installment, ledger};
use loanledger::domain::late_fee::FeeStatus;
use loanledger::domain::money::Balance;
use loanledger::domain::repayment::RepaymentStatus;
use rust_decimal_macros::dec;

#[tokio::test]
async fn test_accrued_fees_are_paid_before_principal() {
    let ledger = ledger();
    let app = activate_loan(&ledger, combined_config()).await;
    let r = installment(app.id, 1, date(2026, 8, 1), dec!(1000), dec!(0));
    let id = r.id;
    ledger.repayments.upsert(r).await.unwrap();

    // Accrue 60 (10 interest + 50 fixed), then pay 700.
    ledger.accrual.run(date(2026, 8, 11)).await.unwrap();
    let b = ledger
        .waterfall
        .apply(id, dec!(700), Utc::now(), None)
        .await
        .unwrap();

    assert_eq!(b.fee_portion, Balance::new(dec!(60.00)));
    assert_eq!(b.principal_portion, Balance::new(dec!(640.00)));
    assert_eq!(b.excess, Balance::ZERO);
    assert_eq!(b.total_due, Balance::new(dec!(360.00)));

    // Clearing the fee balance settles the fee records.
    let records = ledger.late_fees.list_by_repayment(id).await.unwrap();
    assert!(records.iter().all(|r| r.status == FeeStatus::Paid));
}

#[tokio::test]
async fn test_small_payment_only_reduces_fees() {
    let ledger = ledger();
    let app = activate_loan(&ledger, combined_config()).await;
    let r = installment(app.id, 1, date(2026, 8, 1), dec!(1000), dec!(0));
    let id = r.id;
    ledger.repayments.upsert(r).await.unwrap();

    ledger.accrual.run(date(2026, 8, 11)).await.unwrap();
    let b = ledger
        .waterfall
        .apply(id, dec!(30), Utc::now(), None)
        .await
        .unwrap();

    assert_eq!(b.fee_portion, Balance::new(dec!(30)));
    assert_eq!(b.principal_portion, Balance::ZERO);
    assert_eq!(b.excess, Balance::ZERO);

    let r = ledger.repayments.get(id).await.unwrap().unwrap();
    assert_ne!(r.status, RepaymentStatus::Completed);
    assert_eq!(r.outstanding_fees(), Balance::new(dec!(30.00)));
    // Fee records stay active while a balance remains.
    let records = ledger.late_fees.list_by_repayment(id).await.unwrap();
    assert!(records.iter().all(|r| r.status == FeeStatus::Active));
}

#[tokio::test]
async fn test_settling_everything_completes_the_repayment() {
    let ledger = ledger();
    let app = activate_loan(&ledger, combined_config()).await;
    let r = installment(app.id, 1, date(2026, 8, 1), dec!(1000), dec!(0));
    let id = r.id;
    ledger.repayments.upsert(r).await.unwrap();

    ledger.accrual.run(date(2026, 8, 11)).await.unwrap();
    let b = ledger
        .waterfall
        .apply(id, dec!(1060), Utc::now(), None)
        .await
        .unwrap();
    assert_eq!(b.total_due, Balance::ZERO);

    let r = ledger.repayments.get(id).await.unwrap().unwrap();
    assert_eq!(r.status, RepaymentStatus::Completed);
    assert!(r.paid_at.is_some());

    // A completed repayment is no longer picked up by accrual.
    let summary = ledger.accrual.run(date(2026, 8, 12)).await.unwrap();
    assert_eq!(summary.assessed, 0);
}

#[tokio::test]
async fn test_overpayment_reports_excess_for_wallet_credit() {
    let ledger = ledger();
    let app = activate_loan(&ledger, combined_config()).await;
    let r = installment(app.id, 1, date(2026, 8, 1), dec!(500), dec!(100));
    let id = r.id;
    ledger.repayments.upsert(r).await.unwrap();

    let b = ledger
        .waterfall
        .apply(id, dec!(1000), Utc::now(), None)
        .await
        .unwrap();
    assert_eq!(b.principal_portion, Balance::new(dec!(600)));
    assert_eq!(b.excess, Balance::new(dec!(400)));
    assert_eq!(
        b.fee_portion + b.principal_portion + b.excess,
        Balance::new(dec!(1000))
    );
}
