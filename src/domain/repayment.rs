use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{ApplicationId, RepaymentId};
use super::money::{Amount, Balance};
use super::payment::PaymentMethod;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepaymentStatus {
    Pending,
    Completed,
    Overdue,
}

/// How a payment was split across a repayment's obligations.
///
/// `total_due` is the balance remaining after allocation, used for display.
/// Conservation holds: `fee_portion + principal_portion + excess` equals the
/// paid amount.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PaymentBreakdown {
    pub fee_portion: Balance,
    pub principal_portion: Balance,
    pub excess: Balance,
    pub total_due: Balance,
}

/// One scheduled installment of a loan.
///
/// `principal_paid` tracks satisfied scheduled principal+interest and
/// `late_fees_paid` satisfied fees; both are bounded above by their
/// counterparts (`scheduled_amount`, `late_fee_amount`) at all times.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanRepayment {
    pub id: RepaymentId,
    pub loan_id: ApplicationId,
    pub installment_number: u32,
    pub due_date: NaiveDate,
    pub principal_amount: Balance,
    pub interest_amount: Balance,
    pub status: RepaymentStatus,
    /// Total paid in so far, excess excluded.
    pub actual_amount: Option<Balance>,
    pub principal_paid: Balance,
    pub late_fee_amount: Balance,
    pub late_fees_paid: Balance,
    pub paid_at: Option<DateTime<Utc>>,
    pub payment_type: Option<PaymentMethod>,
}

impl LoanRepayment {
    pub fn new(
        loan_id: ApplicationId,
        installment_number: u32,
        due_date: NaiveDate,
        principal_amount: Balance,
        interest_amount: Balance,
    ) -> Self {
        Self {
            id: RepaymentId::new(),
            loan_id,
            installment_number,
            due_date,
            principal_amount,
            interest_amount,
            status: RepaymentStatus::Pending,
            actual_amount: None,
            principal_paid: Balance::ZERO,
            late_fee_amount: Balance::ZERO,
            late_fees_paid: Balance::ZERO,
            paid_at: None,
            payment_type: None,
        }
    }

    /// Scheduled principal + interest for this installment.
    pub fn scheduled_amount(&self) -> Balance {
        self.principal_amount + self.interest_amount
    }

    pub fn outstanding_scheduled(&self) -> Balance {
        self.scheduled_amount().saturating_sub(self.principal_paid)
    }

    pub fn outstanding_fees(&self) -> Balance {
        self.late_fee_amount.saturating_sub(self.late_fees_paid)
    }

    pub fn total_due(&self) -> Balance {
        self.outstanding_scheduled() + self.outstanding_fees()
    }

    /// Both buckets cleared.
    pub fn is_settled(&self) -> bool {
        self.outstanding_scheduled().is_zero() && self.outstanding_fees().is_zero()
    }

    /// Allocates a payment using the waterfall: outstanding fees first, then
    /// scheduled principal+interest. Whatever neither bucket absorbs comes
    /// back as `excess`; funds are never discarded.
    pub fn apply_payment(
        &mut self,
        amount: Amount,
        paid_at: DateTime<Utc>,
        method: Option<PaymentMethod>,
    ) -> PaymentBreakdown {
        let paid = Balance::from(amount);

        let fee_portion = paid.min(self.outstanding_fees());
        self.late_fees_paid += fee_portion;
        let remaining = paid - fee_portion;

        let principal_portion = remaining.min(self.outstanding_scheduled());
        self.principal_paid += principal_portion;
        let excess = remaining - principal_portion;

        let absorbed = fee_portion + principal_portion;
        if absorbed.is_positive() {
            self.actual_amount = Some(self.actual_amount.unwrap_or(Balance::ZERO) + absorbed);
            if method.is_some() {
                self.payment_type = method;
            }
        }

        if self.is_settled() {
            self.status = RepaymentStatus::Completed;
            self.paid_at = Some(paid_at);
        }

        PaymentBreakdown {
            fee_portion,
            principal_portion,
            excess,
            total_due: self.total_due(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn repayment(principal: rust_decimal::Decimal, interest: rust_decimal::Decimal) -> LoanRepayment {
        LoanRepayment::new(
            ApplicationId::new(),
            1,
            NaiveDate::from_ymd_opt(2026, 8, 1).unwrap(),
            Balance::new(principal),
            Balance::new(interest),
        )
    }

    fn pay(r: &mut LoanRepayment, amount: rust_decimal::Decimal) -> PaymentBreakdown {
        r.apply_payment(Amount::new(amount).unwrap(), Utc::now(), None)
    }

    #[test]
    fn test_waterfall_fees_before_principal() {
        // lateFeeAmount=60, paid 700: fees cleared first, 640 to principal.
        let mut r = repayment(dec!(1000), dec!(0));
        r.late_fee_amount = Balance::new(dec!(60));

        let b = pay(&mut r, dec!(700));
        assert_eq!(b.fee_portion, Balance::new(dec!(60)));
        assert_eq!(b.principal_portion, Balance::new(dec!(640)));
        assert_eq!(b.excess, Balance::ZERO);
        assert_eq!(b.total_due, Balance::new(dec!(360)));
        assert_eq!(r.status, RepaymentStatus::Pending);
    }

    #[test]
    fn test_partial_payment_smaller_than_fees() {
        let mut r = repayment(dec!(1000), dec!(0));
        r.late_fee_amount = Balance::new(dec!(60));

        let b = pay(&mut r, dec!(30));
        assert_eq!(b.fee_portion, Balance::new(dec!(30)));
        assert_eq!(b.principal_portion, Balance::ZERO);
        assert_eq!(b.excess, Balance::ZERO);
        assert_ne!(r.status, RepaymentStatus::Completed);
        assert_eq!(r.outstanding_fees(), Balance::new(dec!(30)));
    }

    #[test]
    fn test_overpayment_returns_excess() {
        let mut r = repayment(dec!(100), dec!(20));
        r.late_fee_amount = Balance::new(dec!(10));

        let b = pay(&mut r, dec!(200));
        assert_eq!(b.fee_portion, Balance::new(dec!(10)));
        assert_eq!(b.principal_portion, Balance::new(dec!(120)));
        assert_eq!(b.excess, Balance::new(dec!(70)));
        assert_eq!(b.total_due, Balance::ZERO);
        assert_eq!(r.status, RepaymentStatus::Completed);
        assert!(r.paid_at.is_some());
    }

    #[test]
    fn test_conservation_across_allocations() {
        for paid in [dec!(1), dec!(30), dec!(60), dec!(700), dec!(2000)] {
            let mut r = repayment(dec!(1000), dec!(0));
            r.late_fee_amount = Balance::new(dec!(60));
            let b = pay(&mut r, paid);
            assert_eq!(
                b.fee_portion + b.principal_portion + b.excess,
                Balance::new(paid),
                "conservation violated for {paid}"
            );
        }
    }

    #[test]
    fn test_paid_never_exceeds_owed() {
        let mut r = repayment(dec!(500), dec!(50));
        r.late_fee_amount = Balance::new(dec!(25));
        pay(&mut r, dec!(10000));
        assert_eq!(r.principal_paid, r.scheduled_amount());
        assert_eq!(r.late_fees_paid, r.late_fee_amount);
    }

    #[test]
    fn test_sequential_partial_payments_complete() {
        let mut r = repayment(dec!(100), dec!(0));
        pay(&mut r, dec!(40));
        assert_eq!(r.status, RepaymentStatus::Pending);
        pay(&mut r, dec!(60));
        assert_eq!(r.status, RepaymentStatus::Completed);
        assert_eq!(r.actual_amount, Some(Balance::new(dec!(100))));
    }

    #[test]
    fn test_actual_amount_excludes_excess() {
        let mut r = repayment(dec!(100), dec!(0));
        pay(&mut r, dec!(150));
        assert_eq!(r.actual_amount, Some(Balance::new(dec!(100))));
    }
}
