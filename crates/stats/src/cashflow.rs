//! Personal cash-flow ledger summaries.

use finboard_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Income,
    Expense,
    Saving,
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EntryKind::Income => "income",
            EntryKind::Expense => "expense",
            EntryKind::Saving => "saving",
        };
        f.write_str(s)
    }
}

impl FromStr for EntryKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "income" => Ok(EntryKind::Income),
            "expense" | "expenses" => Ok(EntryKind::Expense),
            "saving" | "savings" => Ok(EntryKind::Saving),
            other => Err(Error::config(format!("unknown ledger entry kind: {other}"))),
        }
    }
}

/// One ledger row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashFlowEntry {
    pub category: String,
    /// Signed amount; expenses are usually negative.
    pub amount: f64,
    pub kind: EntryKind,
}

impl CashFlowEntry {
    pub fn new(category: impl Into<String>, amount: f64, kind: EntryKind) -> Self {
        Self {
            category: category.into(),
            amount,
            kind,
        }
    }
}

#[derive(Deserialize)]
struct LedgerRow {
    category: String,
    amount: f64,
    kind: String,
}

/// Read a `category,amount,kind` CSV ledger.
pub fn read_ledger_csv(bytes: &[u8]) -> Result<Vec<CashFlowEntry>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(bytes);
    let mut entries = Vec::new();
    for row in reader.deserialize::<LedgerRow>() {
        let row = row?;
        entries.push(CashFlowEntry::new(row.category, row.amount, row.kind.parse()?));
    }
    if entries.is_empty() {
        return Err(Error::normalization("ledger has no entries"));
    }
    Ok(entries)
}

/// Totals and savings-goal progress of a ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashFlowSummary {
    pub total_income: f64,
    /// Sum of expense magnitudes, always >= 0.
    pub total_expenses: f64,
    /// Income minus expenses.
    pub net_balance: f64,
    pub savings: f64,
    pub savings_goal: f64,
    /// Savings as a percentage of the goal, rounded to one decimal; 0 when
    /// the goal is 0.
    pub goal_progress_pct: f64,
    /// `goal_progress_pct / 100` capped to `0..=1`.
    pub goal_progress: f64,
}

impl CashFlowSummary {
    pub fn compute(entries: &[CashFlowEntry], savings_goal: f64) -> Self {
        let total = |kind: EntryKind| -> f64 {
            entries
                .iter()
                .filter(|e| e.kind == kind)
                .map(|e| e.amount)
                .sum()
        };
        let total_income = total(EntryKind::Income);
        let total_expenses: f64 = entries
            .iter()
            .filter(|e| e.kind == EntryKind::Expense)
            .map(|e| e.amount.abs())
            .sum();
        let savings = total(EntryKind::Saving);

        let goal_progress_pct = if savings_goal > 0.0 {
            (savings / savings_goal * 1000.0).round() / 10.0
        } else {
            0.0
        };

        Self {
            total_income,
            total_expenses,
            net_balance: total_income - total_expenses,
            savings,
            savings_goal,
            goal_progress_pct,
            goal_progress: (goal_progress_pct / 100.0).clamp(0.0, 1.0),
        }
    }
}

/// Totals per category, in order of first appearance.
pub fn totals_by_category(entries: &[CashFlowEntry]) -> Vec<(String, f64)> {
    let mut totals: Vec<(String, f64)> = Vec::new();
    for entry in entries {
        match totals.iter_mut().find(|(c, _)| *c == entry.category) {
            Some((_, sum)) => *sum += entry.amount,
            None => totals.push((entry.category.clone(), entry.amount)),
        }
    }
    totals
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn ledger() -> Vec<CashFlowEntry> {
        vec![
            CashFlowEntry::new("Salary", 2500.0, EntryKind::Income),
            CashFlowEntry::new("Freelance", 800.0, EntryKind::Income),
            CashFlowEntry::new("Rent", 300.0, EntryKind::Income),
            CashFlowEntry::new("Food", -600.0, EntryKind::Expense),
            CashFlowEntry::new("Transport", -150.0, EntryKind::Expense),
            CashFlowEntry::new("Entertainment", -200.0, EntryKind::Expense),
            CashFlowEntry::new("Savings", 400.0, EntryKind::Saving),
        ]
    }

    #[test]
    fn test_summary() {
        let summary = CashFlowSummary::compute(&ledger(), 1000.0);
        assert_relative_eq!(summary.total_income, 3600.0);
        assert_relative_eq!(summary.total_expenses, 950.0);
        assert_relative_eq!(summary.net_balance, 2650.0);
        assert_relative_eq!(summary.savings, 400.0);
        assert_relative_eq!(summary.goal_progress_pct, 40.0);
        assert_relative_eq!(summary.goal_progress, 0.4);
    }

    #[test]
    fn test_goal_rounding_and_cap() {
        let entries = vec![CashFlowEntry::new("Savings", 400.0, EntryKind::Saving)];
        let summary = CashFlowSummary::compute(&entries, 300.0);
        assert_relative_eq!(summary.goal_progress_pct, 133.3);
        assert_relative_eq!(summary.goal_progress, 1.0);

        let zero_goal = CashFlowSummary::compute(&entries, 0.0);
        assert_eq!(zero_goal.goal_progress_pct, 0.0);
        assert_eq!(zero_goal.goal_progress, 0.0);
    }

    #[test]
    fn test_read_ledger_csv() {
        let csv = b"category,amount,kind\nSalary,2500,Income\nFood,-600,expense\nSavings,400,saving\n";
        let entries = read_ledger_csv(csv).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[1].kind, EntryKind::Expense);

        assert!(matches!(read_ledger_csv(b"category,amount,kind\nx,1,gift\n"), Err(Error::Config(_))));
        assert!(read_ledger_csv(b"category,amount,kind\n").is_err());
    }

    #[test]
    fn test_totals_by_category() {
        let mut entries = ledger();
        entries.push(CashFlowEntry::new("Food", -50.0, EntryKind::Expense));
        let totals = totals_by_category(&entries);
        assert_eq!(totals.len(), 7);
        assert_eq!(totals[3], ("Food".to_string(), -650.0));
    }
}
