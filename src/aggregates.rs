use crate::types::{Amount, Balance, Budget, Connection, Id, Source, Transaction, TransactionKind};
use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AmountSum {
    pub total: Decimal,
    /// Entries whose amount could not be parsed or would overflow the total;
    /// they are excluded from `total`.
    pub invalid: usize,
}

pub fn sum_amounts<'a>(amounts: impl IntoIterator<Item = &'a Amount>) -> AmountSum {
    amounts
        .into_iter()
        .fold(AmountSum::default(), |mut acc, amount| {
            match amount.value().and_then(|value| acc.total.checked_add(value)) {
                Some(total) => acc.total = total,
                None => acc.invalid += 1,
            }
            acc
        })
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub income: Decimal,
    pub expense: Decimal,
    pub net: Decimal,
    pub invalid: usize,
}

pub fn totals<'a>(transactions: impl IntoIterator<Item = &'a Transaction>) -> Totals {
    let mut out = Totals::default();
    for tx in transactions {
        let Some(value) = tx.amount.value() else {
            out.invalid += 1;
            continue;
        };
        let bucket = match tx.kind {
            TransactionKind::Income => &mut out.income,
            TransactionKind::Expense => &mut out.expense,
            TransactionKind::Unknown => continue,
        };
        match bucket.checked_add(value) {
            Some(sum) => *bucket = sum,
            None => out.invalid += 1,
        }
    }
    out.net = out.income.saturating_sub(out.expense);
    out
}

pub fn transactions_for_source(transactions: &[Transaction], source_id: Id) -> Vec<&Transaction> {
    transactions
        .iter()
        .filter(|tx| tx.source_id == Some(source_id))
        .collect()
}

pub fn source_balance(transactions: &[Transaction], source_id: Id) -> AmountSum {
    sum_amounts(
        transactions
            .iter()
            .filter(|tx| tx.source_id == Some(source_id))
            .map(|tx| &tx.amount),
    )
}

pub fn category_total(transactions: &[Transaction], category_id: Id) -> AmountSum {
    sum_amounts(
        transactions
            .iter()
            .filter(|tx| tx.category.as_ref().is_some_and(|c| c.id == category_id))
            .map(|tx| &tx.amount),
    )
}

pub fn sources_total(sources: &[Source]) -> AmountSum {
    sum_amounts(sources.iter().map(|s| &s.amount))
}

/// The backend's total when it reported a valid one, otherwise the sum over sources.
pub fn total_funds(balance: Option<&Balance>, sources: &[Source]) -> Decimal {
    balance
        .and_then(|b| b.total.as_ref())
        .and_then(Amount::value)
        .unwrap_or_else(|| sources_total(sources).total)
}

/// First budget with the largest valid amount.
pub fn highest_budget(budgets: &[Budget]) -> Option<&Budget> {
    budgets.iter().fold(None, |best: Option<&Budget>, budget| {
        let Some(amount) = budget.budget_amount.value() else {
            return best;
        };
        match best.and_then(|b| b.budget_amount.value()) {
            Some(current) if current >= amount => best,
            _ => Some(budget),
        }
    })
}

/// Most recent first; undated transactions sort last.
pub fn recent_transactions(transactions: &[Transaction], limit: usize) -> Vec<&Transaction> {
    let mut sorted: Vec<&Transaction> = transactions.iter().collect();
    sorted.sort_by(|a, b| b.parsed_date().cmp(&a.parsed_date()));
    sorted.truncate(limit);
    sorted
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Authorized,
    Pending,
}

pub fn connection_status(connection: &Connection) -> ConnectionStatus {
    match connection.consent_token.as_deref().map(str::trim) {
        Some(token) if !token.is_empty() => ConnectionStatus::Authorized,
        _ => ConnectionStatus::Pending,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::str::FromStr;

    fn tx(value: serde_json::Value) -> Transaction {
        serde_json::from_value(value).unwrap()
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn sum_excludes_and_counts_invalid_amounts() {
        let txs = vec![
            tx(json!({"id": 1, "amount": "10.50", "type": "income"})),
            tx(json!({"id": 2, "amount": "bad", "type": "expense"})),
            tx(json!({"id": 3, "amount": "5.25", "type": "expense"})),
        ];
        let sum = sum_amounts(txs.iter().map(|t| &t.amount));
        assert_eq!(sum.total, dec("15.75"));
        assert_eq!(sum.invalid, 1);
    }

    #[test]
    fn overflowing_amount_is_flagged_instead_of_added() {
        let txs = vec![
            tx(json!({"id": 1, "amount": "79228162514264337593543950335", "type": "income"})),
            tx(json!({"id": 2, "amount": "1", "type": "income"})),
        ];
        let sum = sum_amounts(txs.iter().map(|t| &t.amount));
        assert_eq!(sum.total, Decimal::MAX);
        assert_eq!(sum.invalid, 1);

        let t = totals(&txs);
        assert_eq!(t.income, Decimal::MAX);
        assert_eq!(t.invalid, 1);

        let opposite = vec![
            tx(json!({"id": 1, "amount": "-79228162514264337593543950335", "type": "income"})),
            tx(json!({"id": 2, "amount": "79228162514264337593543950335", "type": "expense"})),
        ];
        assert_eq!(totals(&opposite).net, Decimal::MIN);
    }

    #[test]
    fn missing_amount_counts_as_invalid() {
        let txs = vec![
            tx(json!({"id": 1, "type": "income"})),
            tx(json!({"id": 2, "amount": "5", "type": "income"})),
        ];
        let sum = sum_amounts(txs.iter().map(|t| &t.amount));
        assert_eq!(sum.total, dec("5"));
        assert_eq!(sum.invalid, 1);
        assert_eq!(txs[0].amount.display(), "Invalid");
    }

    #[test]
    fn many_small_amounts_do_not_drift() {
        let txs: Vec<Transaction> = (0..1000)
            .map(|i| tx(json!({"id": i, "amount": "0.10", "type": "expense"})))
            .collect();
        assert_eq!(sum_amounts(txs.iter().map(|t| &t.amount)).total, dec("100.00"));
    }

    #[test]
    fn totals_split_income_and_expense() {
        let txs = vec![
            tx(json!({"id": 1, "amount": 100, "type": "income"})),
            tx(json!({"id": 2, "amount": "30.5", "type": "expense"})),
            tx(json!({"id": 3, "amount": "x", "type": "expense"})),
        ];
        let t = totals(&txs);
        assert_eq!(t.income, dec("100"));
        assert_eq!(t.expense, dec("30.5"));
        assert_eq!(t.net, dec("69.5"));
        assert_eq!(t.invalid, 1);
    }

    #[test]
    fn per_source_and_per_category_filters() {
        let txs = vec![
            tx(json!({"id": 1, "amount": "1", "type": "expense", "source_id": 1, "category": {"id": 9}})),
            tx(json!({"id": 2, "amount": "2", "type": "expense", "source_id": 2, "category": {"id": 9}})),
            tx(json!({"id": 3, "amount": "4", "type": "expense", "source_id": 1, "category": null})),
        ];
        assert_eq!(source_balance(&txs, 1).total, dec("5"));
        assert_eq!(transactions_for_source(&txs, 2).len(), 1);
        assert_eq!(category_total(&txs, 9).total, dec("3"));
    }

    #[test]
    fn total_funds_falls_back_to_sources() {
        let sources: Vec<Source> = serde_json::from_value(json!([
            {"id": 1, "name": "Checking", "amount": 100},
            {"id": 2, "name": "Savings", "amount": 250}
        ]))
        .unwrap();
        assert_eq!(total_funds(None, &sources), dec("350"));

        let empty = Balance::default();
        assert_eq!(total_funds(Some(&empty), &sources), dec("350"));

        let reported: Balance = serde_json::from_value(json!({"total": "999.99"})).unwrap();
        assert_eq!(total_funds(Some(&reported), &sources), dec("999.99"));
    }

    #[test]
    fn highest_budget_ignores_invalid_amounts() {
        let budgets: Vec<Budget> = serde_json::from_value(json!([
            {"id": 1, "budget_amount": 200},
            {"id": 2, "budget_amount": "n/a"},
            {"id": 3, "budget_amount": "450.00"},
            {"id": 4, "budget_amount": 450}
        ]))
        .unwrap();
        assert_eq!(highest_budget(&budgets).map(|b| b.id), Some(3));
        assert!(highest_budget(&[]).is_none());
    }

    #[test]
    fn recent_transactions_orders_by_date() {
        let txs = vec![
            tx(json!({"id": 1, "amount": 1, "type": "income", "date": "2024-01-01"})),
            tx(json!({"id": 2, "amount": 1, "type": "income"})),
            tx(json!({"id": 3, "amount": 1, "type": "income", "date": "2024-03-01T10:00:00Z"})),
        ];
        let ids: Vec<Id> = recent_transactions(&txs, 3).iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![3, 1, 2]);
    }

    #[test]
    fn consent_token_marks_connection_authorized() {
        let authorized: Connection =
            serde_json::from_value(json!({"id": 1, "institution_id": "BANK_X", "consent_token": "c"})).unwrap();
        let pending: Connection =
            serde_json::from_value(json!({"id": 2, "institution_id": 7, "consent_token": null})).unwrap();
        assert_eq!(connection_status(&authorized), ConnectionStatus::Authorized);
        assert_eq!(connection_status(&pending), ConnectionStatus::Pending);
    }
}
