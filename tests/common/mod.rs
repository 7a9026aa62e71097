#![allow(dead_code)]

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

use loanledger::application::accrual::FeeAccrualEngine;
use loanledger::application::approval::PaymentApprovalWorkflow;
use loanledger::application::disbursement::DisbursementProcessor;
use loanledger::application::reconciliation::{
    MatcherConfig, ReconciliationEngine, ReconciliationMatcher,
};
use loanledger::application::state_machine::StateMachine;
use loanledger::application::waterfall::PaymentWaterfall;
use loanledger::domain::application::{Actor, FeeSchedule, LoanApplication};
use loanledger::domain::ids::ApplicationId;
use loanledger::domain::late_fee::{FeeType, LateFeeConfig};
use loanledger::domain::money::Balance;
use loanledger::domain::payment::{PaymentMethod, PendingPayment};
use loanledger::domain::ports::{
    ApplicationStoreRef, LateFeeStoreRef, PaymentStoreRef, RepaymentStoreRef,
};
use loanledger::domain::repayment::LoanRepayment;
use loanledger::infrastructure::in_memory::{
    InMemoryApplicationStore, InMemoryLateFeeStore, InMemoryPaymentStore, InMemoryRepaymentStore,
};

/// All engines wired over shared in-memory stores.
pub struct Ledger {
    pub applications: ApplicationStoreRef,
    pub repayments: RepaymentStoreRef,
    pub late_fees: LateFeeStoreRef,
    pub payments: PaymentStoreRef,
    pub state_machine: StateMachine,
    pub accrual: FeeAccrualEngine,
    pub waterfall: PaymentWaterfall,
    pub approvals: PaymentApprovalWorkflow,
    pub reconciliation: ReconciliationEngine,
    pub disbursement: DisbursementProcessor,
}

pub fn ledger() -> Ledger {
    let applications: ApplicationStoreRef = Arc::new(InMemoryApplicationStore::new());
    let repayments: RepaymentStoreRef = Arc::new(InMemoryRepaymentStore::new());
    let late_fees: LateFeeStoreRef = Arc::new(InMemoryLateFeeStore::new());
    let payments: PaymentStoreRef = Arc::new(InMemoryPaymentStore::new());

    let state_machine = StateMachine::new(applications.clone());
    let accrual = FeeAccrualEngine::new(
        applications.clone(),
        repayments.clone(),
        late_fees.clone(),
    );
    let waterfall = PaymentWaterfall::new(repayments.clone(), late_fees.clone());
    let approvals =
        PaymentApprovalWorkflow::new(payments.clone(), repayments.clone(), waterfall.clone());
    let reconciliation = ReconciliationEngine::new(
        ReconciliationMatcher::new(MatcherConfig::default()),
        approvals.clone(),
    );
    let disbursement = DisbursementProcessor::new(applications.clone(), state_machine.clone());

    Ledger {
        applications,
        repayments,
        late_fees,
        payments,
        state_machine,
        accrual,
        waterfall,
        approvals,
        reconciliation,
        disbursement,
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn combined_config() -> LateFeeConfig {
    LateFeeConfig {
        fee_type: FeeType::Combined,
        daily_rate: dec!(0.001),
        fixed_fee: Balance::new(dec!(50)),
        frequency_days: 7,
    }
}

pub fn interest_config() -> LateFeeConfig {
    LateFeeConfig {
        fee_type: FeeType::Interest,
        daily_rate: dec!(0.001),
        fixed_fee: Balance::ZERO,
        frequency_days: 7,
    }
}

pub fn draft_application(config: LateFeeConfig) -> LoanApplication {
    let mut app = LoanApplication::new(
        "Jane Doe",
        Balance::new(dec!(10000)),
        12,
        dec!(0.24),
        FeeSchedule {
            origination: Balance::new(dec!(100)),
            legal: Balance::new(dec!(50)),
            stamping: Balance::new(dec!(25)),
            application: Balance::new(dec!(25)),
        },
        config,
        Utc::now(),
    );
    app.bank_name = Some("First Bank".into());
    app.bank_account_number = Some("0123456789".into());
    app
}

/// Registers an application and walks it to ACTIVE through the state
/// machine.
pub async fn activate_loan(ledger: &Ledger, config: LateFeeConfig) -> LoanApplication {
    let mut app = ledger
        .state_machine
        .register(draft_application(config), Actor::System)
        .await
        .unwrap();
    while app.status.next().is_some() {
        app = ledger
            .state_machine
            .advance(app.id, Actor::System)
            .await
            .unwrap();
    }
    app
}

pub fn installment(
    loan_id: ApplicationId,
    number: u32,
    due: NaiveDate,
    principal: Decimal,
    interest: Decimal,
) -> LoanRepayment {
    LoanRepayment::new(
        loan_id,
        number,
        due,
        Balance::new(principal),
        Balance::new(interest),
    )
}

pub fn pending_payment(
    loan_id: ApplicationId,
    amount: Decimal,
    reference: &str,
    payer: &str,
) -> PendingPayment {
    PendingPayment::new(
        loan_id,
        amount,
        reference,
        PaymentMethod::BankTransfer,
        payer,
        Utc::now(),
    )
}
