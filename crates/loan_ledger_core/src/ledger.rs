//! crates/loan_ledger_core/src/ledger.rs
//!
//! The loan settlement state machine.
//!
//! A loan starts `Open` and becomes `Settled` once the running total of its
//! payments reaches the amount owed. The transition is one-way; overpayment is
//! accepted and still settles the loan.

use chrono::{DateTime, NaiveDate};

use crate::domain::Loan;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoanState {
    Open,
    Settled,
}

impl LoanState {
    pub fn from_paid_flag(is_paid: bool) -> Self {
        if is_paid {
            LoanState::Settled
        } else {
            LoanState::Open
        }
    }

    pub fn is_settled(self) -> bool {
        self == LoanState::Settled
    }

    /// The state after a payment has been recorded and the total recomputed.
    pub fn after_payment(self, amount_owed: i64, total_paid: i64) -> Self {
        match self {
            LoanState::Settled => LoanState::Settled,
            LoanState::Open if total_paid >= amount_owed => LoanState::Settled,
            LoanState::Open => LoanState::Open,
        }
    }
}

impl Loan {
    pub fn state(&self) -> LoanState {
        LoanState::from_paid_flag(self.is_paid)
    }

    /// Applies the settlement rule for a new running total, returning whether
    /// the loan transitioned to `Settled`.
    pub fn apply_total_paid(&mut self, total_paid: i64) -> bool {
        let before = self.state();
        let after = before.after_payment(self.amount, total_paid);
        self.is_paid = after.is_settled();
        before != after
    }
}

/// Sums payment amounts, saturating at `i64::MAX`.
pub fn total_paid<I>(amounts: I) -> i64
where
    I: IntoIterator<Item = i64>,
{
    amounts.into_iter().fold(0i64, i64::saturating_add)
}

/// Converts a client-supplied Unix timestamp (seconds) into its UTC calendar date.
pub fn date_from_timestamp(timestamp: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp(timestamp, 0).map(|dt| dt.date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn loan(amount: i64) -> Loan {
        Loan {
            id: 1,
            user_id: 1,
            amount,
            is_paid: false,
            created_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            months: 3,
        }
    }

    #[rstest]
    #[case(100, 0, LoanState::Open)]
    #[case(100, 99, LoanState::Open)]
    #[case(100, 100, LoanState::Settled)]
    #[case(100, 250, LoanState::Settled)]
    fn open_loan_settles_once_total_reaches_amount(
        #[case] owed: i64,
        #[case] paid: i64,
        #[case] expected: LoanState,
    ) {
        assert_eq!(LoanState::Open.after_payment(owed, paid), expected);
    }

    #[test]
    fn settled_is_terminal() {
        assert_eq!(LoanState::Settled.after_payment(100, 0), LoanState::Settled);
    }

    #[test]
    fn two_halves_settle_a_loan() {
        let mut loan = loan(100);

        assert!(!loan.apply_total_paid(50));
        assert!(!loan.is_paid);

        assert!(loan.apply_total_paid(100));
        assert!(loan.is_paid);
        assert_eq!(loan.state(), LoanState::Settled);

        // already settled, nothing changes
        assert!(!loan.apply_total_paid(150));
        assert!(loan.is_paid);
    }

    #[test]
    fn total_saturates_instead_of_overflowing() {
        assert_eq!(total_paid([40, 60]), 100);
        assert_eq!(total_paid([i64::MAX - 1, 2]), i64::MAX);

        let mut loan = loan(i64::MAX);
        assert!(loan.apply_total_paid(total_paid([i64::MAX - 1, 2])));
    }

    #[rstest]
    #[case(0, "1970-01-01")]
    #[case(1_709_596_800, "2024-03-05")]
    #[case(1_709_683_199, "2024-03-05")]
    fn timestamps_become_padded_iso_dates(#[case] ts: i64, #[case] expected: &str) {
        let date = date_from_timestamp(ts).unwrap();
        assert_eq!(date.to_string(), expected);
    }

    #[test]
    fn out_of_range_timestamp_is_rejected() {
        assert!(date_from_timestamp(i64::MAX).is_none());
    }
}
