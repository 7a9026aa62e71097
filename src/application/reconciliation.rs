use std::collections::HashSet;
use tracing::info;

use super::approval::{ApprovalOutcome, PaymentApprovalWorkflow};
use crate::domain::bank::BankTransaction;
use crate::domain::ids::PaymentId;
use crate::domain::payment::PendingPayment;
use crate::error::Result;

/// Scoring weights. Amount and beneficiary are the primary signals: when
/// both match exactly the pair scores 100 on their own. Reference and date
/// are corroborating bonuses; the total is capped at 100.
const AMOUNT_WEIGHT: u32 = 60;
const NAME_WEIGHT: u32 = 40;
const REFERENCE_BONUS: u32 = 15;
const DATE_SAME_DAY_BONUS: u32 = 10;
const DATE_NEAR_BONUS: u32 = 5;
const DATE_WINDOW_DAYS: i64 = 3;
const MAX_SCORE: u32 = 100;

/// Floors for reporting and auto-selection, tunable per deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatcherConfig {
    /// Pairs below this score are not worth showing at all.
    pub candidate_floor: u32,
    /// Pairs at or above this score are pre-selected for batch approval.
    pub auto_select_threshold: u32,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            candidate_floor: 20,
            auto_select_threshold: 50,
        }
    }
}

/// The best pending-payment candidate for one statement transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchCandidate {
    pub transaction: BankTransaction,
    pub payment_id: PaymentId,
    pub score: u32,
    pub auto_selected: bool,
    /// Which signals contributed, for the operator.
    pub reasons: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MatchReport {
    pub matches: Vec<MatchCandidate>,
    pub unmatched: Vec<BankTransaction>,
}

/// Scores bank-statement transactions against pending payments.
///
/// Pure and side-effect-free: safe to run concurrently and repeatedly over
/// the same inputs. Approval is a separate step.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReconciliationMatcher {
    config: MatcherConfig,
}

impl ReconciliationMatcher {
    pub fn new(config: MatcherConfig) -> Self {
        Self { config }
    }

    /// Weighted score in [0, 100] plus the contributing signals.
    pub fn score(&self, tx: &BankTransaction, payment: &PendingPayment) -> (u32, Vec<String>) {
        let mut score = 0;
        let mut reasons = Vec::new();

        if tx.amount == payment.amount {
            score += AMOUNT_WEIGHT;
            reasons.push("amount matches exactly".to_string());
        } else if payment.original_amount == Some(tx.amount) {
            score += AMOUNT_WEIGHT;
            reasons.push("amount matches pre-fee amount".to_string());
        }

        let similarity = name_similarity(&tx.beneficiary, &payment.payer_name);
        if similarity > 0.0 {
            score += (similarity * NAME_WEIGHT as f64).round() as u32;
            if similarity >= 1.0 {
                reasons.push("beneficiary matches".to_string());
            } else {
                reasons.push(format!(
                    "beneficiary similarity {}%",
                    (similarity * 100.0).round() as u32
                ));
            }
        }

        if reference_contained(&tx.ref_code, &payment.reference) {
            score += REFERENCE_BONUS;
            reasons.push("reference code matches".to_string());
        }

        let gap = (tx.transaction_date - payment.created_at.date_naive())
            .num_days()
            .abs();
        if gap == 0 {
            score += DATE_SAME_DAY_BONUS;
            reasons.push("same-day transaction".to_string());
        } else if gap <= DATE_WINDOW_DAYS {
            score += DATE_NEAR_BONUS;
            reasons.push(format!("dated {gap} days apart"));
        }

        (score.min(MAX_SCORE), reasons)
    }

    /// Best candidate per transaction, ranked; transactions with nothing
    /// above the candidate floor come back unmatched.
    pub fn match_batch(
        &self,
        transactions: &[BankTransaction],
        pending: &[PendingPayment],
    ) -> MatchReport {
        let mut report = MatchReport::default();

        for tx in transactions {
            let best = pending
                .iter()
                .map(|p| {
                    let (score, reasons) = self.score(tx, p);
                    (score, reasons, p)
                })
                .max_by_key(|(score, _, _)| *score);

            match best {
                Some((score, reasons, payment)) if score >= self.config.candidate_floor => {
                    report.matches.push(MatchCandidate {
                        transaction: tx.clone(),
                        payment_id: payment.id,
                        score,
                        auto_selected: score >= self.config.auto_select_threshold,
                        reasons,
                    });
                }
                _ => report.unmatched.push(tx.clone()),
            }
        }

        report.matches.sort_by(|a, b| b.score.cmp(&a.score));
        info!(
            matched = report.matches.len(),
            unmatched = report.unmatched.len(),
            "reconciliation batch scored"
        );
        report
    }
}

/// Per-item result of a batch approval; one failure never rolls back the
/// rest.
#[derive(Debug)]
pub struct BatchItemOutcome {
    pub payment_id: PaymentId,
    pub outcome: Result<ApprovalOutcome>,
}

#[derive(Debug, Default)]
pub struct BatchApprovalSummary {
    pub items: Vec<BatchItemOutcome>,
}

impl BatchApprovalSummary {
    pub fn approved(&self) -> usize {
        self.items.iter().filter(|i| i.outcome.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.items.len() - self.approved()
    }
}

/// Matching plus approval over a live ledger. Scoring stays in
/// [`ReconciliationMatcher`] so it can be tuned and tested on its own.
#[derive(Clone)]
pub struct ReconciliationEngine {
    matcher: ReconciliationMatcher,
    approvals: PaymentApprovalWorkflow,
}

impl ReconciliationEngine {
    pub fn new(matcher: ReconciliationMatcher, approvals: PaymentApprovalWorkflow) -> Self {
        Self { matcher, approvals }
    }

    pub fn match_batch(
        &self,
        transactions: &[BankTransaction],
        pending: &[PendingPayment],
    ) -> MatchReport {
        self.matcher.match_batch(transactions, pending)
    }

    /// Approves each selected match independently and reports per-item
    /// outcomes.
    pub async fn batch_approve(&self, selected: &[MatchCandidate]) -> BatchApprovalSummary {
        let mut summary = BatchApprovalSummary::default();
        for candidate in selected {
            let notes = format!(
                "Reconciled against bank statement {}",
                candidate.transaction.ref_code
            );
            let outcome = self
                .approvals
                .approve(candidate.payment_id, Some(notes))
                .await;
            summary.items.push(BatchItemOutcome {
                payment_id: candidate.payment_id,
                outcome,
            });
        }
        info!(
            approved = summary.approved(),
            failed = summary.failed(),
            "reconciliation batch approval finished"
        );
        summary
    }
}

fn normalize_tokens(name: &str) -> HashSet<String> {
    name.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

/// Dice coefficient over normalized name tokens: 1.0 for the same name in
/// any casing/ordering, 0.0 for fully disjoint names.
fn name_similarity(a: &str, b: &str) -> f64 {
    let ta = normalize_tokens(a);
    let tb = normalize_tokens(b);
    if ta.is_empty() || tb.is_empty() {
        return 0.0;
    }
    let common = ta.intersection(&tb).count();
    (2.0 * common as f64) / (ta.len() + tb.len()) as f64
}

fn reference_contained(ref_code: &str, reference: &str) -> bool {
    let rc = ref_code.trim().to_lowercase();
    let r = reference.trim().to_lowercase();
    if rc.is_empty() || r.is_empty() {
        return false;
    }
    rc.contains(&r) || r.contains(&rc)
}
