use crate::types::{
    Balance, Budget, Category, Connection, FixedExpense, Id, Source, Transaction, UserProfile,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Independently owned regions of the state that a read action replaces wholesale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Transactions,
    Budgets,
    Sources,
    Categories,
    Balance,
    FixedExpenses,
    Connections,
}

impl Resource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transactions => "transactions",
            Self::Budgets => "budgets",
            Self::Sources => "sources",
            Self::Categories => "categories",
            Self::Balance => "balance",
            Self::FixedExpenses => "fixed_expenses",
            Self::Connections => "connections",
        }
    }
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub token: Option<String>,
    pub user: Option<UserProfile>,
    pub is_logged: bool,
}

impl Session {
    pub fn authenticated(token: String, user: Option<UserProfile>) -> Self {
        let is_logged = !token.trim().is_empty();
        Self {
            token: is_logged.then_some(token),
            user,
            is_logged,
        }
    }
}

/// Records picked by edit flows. Cleared after the matching write completes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    pub current_transaction: Option<Transaction>,
    pub current_category: Option<Category>,
    pub current_budget: Option<Budget>,
    pub current_source: Option<Id>,
}

impl Selection {
    pub fn clear_for(&mut self, resource: Resource) {
        match resource {
            Resource::Transactions => self.current_transaction = None,
            Resource::Categories => self.current_category = None,
            Resource::Budgets => self.current_budget = None,
            Resource::Sources
            | Resource::Balance
            | Resource::FixedExpenses
            | Resource::Connections => {}
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppState {
    pub session: Session,
    pub message: Option<String>,
    pub transactions: Vec<Transaction>,
    pub budgets: Vec<Budget>,
    pub sources: Vec<Source>,
    pub categories: Vec<Category>,
    pub connections: Vec<Connection>,
    pub fixed_expenses: Vec<FixedExpense>,
    pub balance: Option<Balance>,
    pub selection: Selection,
    /// In-flight read count per resource; several fetches of one slice may overlap.
    pub loading: BTreeMap<Resource, u32>,
    pub last_fetched: BTreeMap<Resource, String>,
}

impl AppState {
    pub fn is_loading(&self, resource: Resource) -> bool {
        self.loading.get(&resource).copied().unwrap_or(0) > 0
    }

    pub(crate) fn begin_loading(&mut self, resource: Resource) {
        *self.loading.entry(resource).or_insert(0) += 1;
    }

    pub(crate) fn end_loading(&mut self, resource: Resource) {
        if let Some(count) = self.loading.get_mut(&resource) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.loading.remove(&resource);
            }
        }
    }

    pub fn visible_transactions(&self) -> Vec<&Transaction> {
        match self.selection.current_source {
            Some(source_id) => crate::aggregates::transactions_for_source(&self.transactions, source_id),
            None => self.transactions.iter().collect(),
        }
    }
}
