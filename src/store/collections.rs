use super::{now_iso, Effect, Fetch, Store};
use crate::api::{
    item_path, results, PATH_BALANCES, PATH_BUDGETS, PATH_CATEGORIES, PATH_FIXED_EXPENSES,
    PATH_SOURCES, PATH_TRANSACTIONS,
};
use crate::error::{ActionError, ActionResult};
use crate::state::{AppState, Resource};
use crate::transport::{Method, Transport};
use crate::types::{
    Balance, Budget, BudgetInput, Category, CategoryInput, Connection, FixedExpense, Id, Source,
    Transaction, TransactionInput,
};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Per-resource outcome of [`Store::load_dashboard`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardLoad {
    pub transactions: Fetch,
    pub budgets: Fetch,
    pub balance: Fetch,
    pub sources: Fetch,
}

impl DashboardLoad {
    pub fn entries(&self) -> [(Resource, &Fetch); 4] {
        [
            (Resource::Transactions, &self.transactions),
            (Resource::Budgets, &self.budgets),
            (Resource::Balance, &self.balance),
            (Resource::Sources, &self.sources),
        ]
    }
}

fn validated_transaction(input: &TransactionInput) -> ActionResult<Value> {
    if input.date.trim().is_empty() {
        return Err(ActionError::Validation("Transaction date is required.".to_string()));
    }
    Ok(serde_json::to_value(input)?)
}

fn validated_budget(input: &BudgetInput) -> ActionResult<Value> {
    if input.target_period.trim().is_empty() {
        return Err(ActionError::Validation("Budget period is required.".to_string()));
    }
    Ok(serde_json::to_value(input)?)
}

fn validated_category(input: &CategoryInput) -> ActionResult<Value> {
    if input.name.trim().is_empty() {
        return Err(ActionError::Validation("Category name is required.".to_string()));
    }
    Ok(serde_json::to_value(input)?)
}

impl<T: Transport> Store<T> {
    /// GETs `path` and replaces one slice with the `results` payload. On any
    /// failure the slice is left exactly as it was.
    async fn read<V: DeserializeOwned>(
        &self,
        resource: Resource,
        path: &str,
        commit: impl FnOnce(&mut AppState, V),
    ) -> Fetch {
        self.begin_loading(resource).await;
        let auth = self.bearer().await;
        let fetched = match self.api.get(path, auth).await {
            Ok(body) => results::<V>(body),
            Err(e) => Err(e),
        };

        match fetched {
            Ok(value) => {
                let fetched_at = now_iso();
                self.update(|state| {
                    commit(state, value);
                    state.last_fetched.insert(resource, fetched_at);
                    state.end_loading(resource);
                })
                .await;
                Fetch::Updated
            }
            Err(e) => {
                tracing::warn!(%resource, code = e.code(), error = %e, "fetch failed; keeping cached data");
                self.update(|state| state.end_loading(resource)).await;
                Fetch::Kept(e)
            }
        }
    }

    pub async fn get_transactions(&self) -> Fetch {
        self.read(Resource::Transactions, PATH_TRANSACTIONS, |state, items: Vec<Transaction>| {
            state.transactions = items
        })
        .await
    }

    pub async fn get_budgets(&self) -> Fetch {
        self.read(Resource::Budgets, PATH_BUDGETS, |state, items: Vec<Budget>| {
            state.budgets = items
        })
        .await
    }

    pub async fn get_sources(&self) -> Fetch {
        self.read(Resource::Sources, PATH_SOURCES, |state, items: Vec<Source>| {
            state.sources = items
        })
        .await
    }

    pub async fn get_categories(&self) -> Fetch {
        self.read(Resource::Categories, PATH_CATEGORIES, |state, items: Vec<Category>| {
            state.categories = items
        })
        .await
    }

    pub async fn get_balance(&self) -> Fetch {
        self.read(Resource::Balance, PATH_BALANCES, |state, balance: Balance| {
            state.balance = Some(balance)
        })
        .await
    }

    pub async fn get_fixed_expenses(&self) -> Fetch {
        self.read(
            Resource::FixedExpenses,
            PATH_FIXED_EXPENSES,
            |state, items: Vec<FixedExpense>| state.fixed_expenses = items,
        )
        .await
    }

    /// No backend contract exists for listing connections; the cached list is
    /// only ever set through [`Store::set_connections`].
    pub async fn get_connections(&self) -> Fetch {
        tracing::info!("get_connections has no backend endpoint; keeping cached connections");
        Fetch::Kept(ActionError::Unsupported("getConnections"))
    }

    /// Issues the reads the dashboard needs, concurrently.
    pub async fn load_dashboard(&self) -> DashboardLoad {
        let (transactions, budgets, balance, sources) = tokio::join!(
            self.get_transactions(),
            self.get_budgets(),
            self.get_balance(),
            self.get_sources(),
        );
        DashboardLoad {
            transactions,
            budgets,
            balance,
            sources,
        }
    }

    pub async fn create_transaction(&self, input: &TransactionInput) -> ActionResult<Effect> {
        let body = validated_transaction(input)?;
        self.write(
            "create_transaction",
            Method::Post,
            PATH_TRANSACTIONS,
            Some(body),
            Effect::Refresh(Resource::Transactions),
        )
        .await
    }

    pub async fn edit_transaction(&self, id: Id, input: &TransactionInput) -> ActionResult<Effect> {
        let body = validated_transaction(input)?;
        self.write(
            "edit_transaction",
            Method::Put,
            &item_path(PATH_TRANSACTIONS, id),
            Some(body),
            Effect::Refresh(Resource::Transactions),
        )
        .await
    }

    pub async fn delete_transaction(&self, id: Id) -> ActionResult<Effect> {
        self.write(
            "delete_transaction",
            Method::Delete,
            &item_path(PATH_TRANSACTIONS, id),
            None,
            Effect::Refresh(Resource::Transactions),
        )
        .await
    }

    pub async fn create_budget(&self, input: &BudgetInput) -> ActionResult<Effect> {
        let body = validated_budget(input)?;
        self.write(
            "create_budget",
            Method::Post,
            PATH_BUDGETS,
            Some(body),
            Effect::Refresh(Resource::Budgets),
        )
        .await
    }

    pub async fn edit_budget(&self, id: Id, input: &BudgetInput) -> ActionResult<Effect> {
        let body = validated_budget(input)?;
        self.write(
            "edit_budget",
            Method::Put,
            &item_path(PATH_BUDGETS, id),
            Some(body),
            Effect::Refresh(Resource::Budgets),
        )
        .await
    }

    pub async fn delete_budget(&self, id: Id) -> ActionResult<Effect> {
        self.write(
            "delete_budget",
            Method::Delete,
            &item_path(PATH_BUDGETS, id),
            None,
            Effect::Refresh(Resource::Budgets),
        )
        .await
    }

    pub async fn create_category(&self, input: &CategoryInput) -> ActionResult<Effect> {
        let body = validated_category(input)?;
        self.write(
            "create_category",
            Method::Post,
            PATH_CATEGORIES,
            Some(body),
            Effect::Refresh(Resource::Categories),
        )
        .await
    }

    pub async fn edit_category(&self, id: Id, input: &CategoryInput) -> ActionResult<Effect> {
        let body = validated_category(input)?;
        self.write(
            "edit_category",
            Method::Put,
            &item_path(PATH_CATEGORIES, id),
            Some(body),
            Effect::Refresh(Resource::Categories),
        )
        .await
    }

    pub async fn delete_category(&self, id: Id) -> ActionResult<Effect> {
        self.write(
            "delete_category",
            Method::Delete,
            &item_path(PATH_CATEGORIES, id),
            None,
            Effect::Refresh(Resource::Categories),
        )
        .await
    }

    pub async fn delete_fixed_expense(&self, id: Id) -> ActionResult<Effect> {
        tracing::info!(fixed_expense_id = id, "delete_fixed_expense has no backend endpoint");
        Err(ActionError::Unsupported("deleteFixedExpense"))
    }

    pub async fn delete_connection(&self, id: Id) -> ActionResult<Effect> {
        tracing::info!(connection_id = id, "delete_connection has no backend endpoint");
        Err(ActionError::Unsupported("deleteConnection"))
    }

    pub async fn set_current_transaction(&self, transaction: Option<Transaction>) {
        self.update(|state| state.selection.current_transaction = transaction).await;
    }

    pub async fn set_current_category(&self, category: Option<Category>) {
        self.update(|state| state.selection.current_category = category).await;
    }

    pub async fn set_current_budget(&self, budget: Option<Budget>) {
        self.update(|state| state.selection.current_budget = budget).await;
    }

    /// Narrows [`AppState::visible_transactions`] to one source; `None` shows all.
    pub async fn set_current_source(&self, source_id: Option<Id>) {
        self.update(|state| state.selection.current_source = source_id).await;
    }

    pub async fn set_connections(&self, connections: Vec<Connection>) {
        self.update(|state| state.connections = connections).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregates::total_funds;
    use crate::store::testing::{logged_in_store, ScriptedTransport};
    use crate::types::TransactionKind;
    use rust_decimal::Decimal;

    const TWO_TRANSACTIONS: &str = r#"{"results": [
        {"id": 42, "amount": "12.00", "type": "expense", "source_id": 1},
        {"id": 43, "amount": 8, "type": "income", "source_id": 2}
    ]}"#;

    fn input() -> TransactionInput {
        TransactionInput {
            amount: Decimal::new(1250, 2),
            date: "2024-05-01".to_string(),
            kind: TransactionKind::Expense,
            category_id: Some(3),
            source_id: Some(1),
            description: None,
        }
    }

    #[tokio::test]
    async fn get_sources_replaces_slice_and_feeds_fallback_total() {
        let transport = ScriptedTransport::new();
        transport.respond(
            Method::Get,
            PATH_SOURCES,
            200,
            r#"{"results": [{"id": 1, "name": "Checking", "amount": 100}, {"id": 2, "name": "Savings", "amount": 250}]}"#,
        );
        let store = logged_in_store(transport.clone());

        assert_eq!(store.get_sources().await, Fetch::Updated);
        let state = store.snapshot().await;
        assert_eq!(state.sources.len(), 2);
        assert_eq!(state.sources[1].name, "Savings");
        assert_eq!(total_funds(state.balance.as_ref(), &state.sources), Decimal::new(350, 0));
        assert!(state.last_fetched.contains_key(&Resource::Sources));
        assert!(!state.is_loading(Resource::Sources));
        assert_eq!(transport.requests()[0].header("authorization"), Some("Bearer tok"));
    }

    #[tokio::test]
    async fn failed_read_leaves_slice_identical() {
        let transport = ScriptedTransport::new();
        transport.respond(Method::Get, PATH_TRANSACTIONS, 200, TWO_TRANSACTIONS);
        transport.respond(Method::Get, PATH_TRANSACTIONS, 500, r#"{"message": "boom"}"#);
        let store = logged_in_store(transport);

        store.get_transactions().await;
        let before = store.snapshot().await;

        let fetch = store.get_transactions().await;
        assert_eq!(fetch.error().and_then(|e| e.status()), Some(500));
        let after = store.snapshot().await;
        assert_eq!(after.transactions, before.transactions);
        assert_eq!(after.last_fetched, before.last_fetched);
        assert!(!after.is_loading(Resource::Transactions));
    }

    #[tokio::test]
    async fn malformed_payload_is_not_committed() {
        let transport = ScriptedTransport::new();
        transport.respond(Method::Get, PATH_BUDGETS, 200, r#"{"results": [{"id": 1}, {"nope": true}]}"#);
        let store = logged_in_store(transport);

        let fetch = store.get_budgets().await;
        assert_eq!(fetch.error().map(ActionError::code), Some("PARSE"));
        assert!(store.snapshot().await.budgets.is_empty());
    }

    #[tokio::test]
    async fn network_failure_on_read_is_swallowed() {
        let transport = ScriptedTransport::new();
        transport.fail(Method::Get, PATH_CATEGORIES, "dns failure");
        let store = logged_in_store(transport);

        assert!(matches!(store.get_categories().await, Fetch::Kept(ActionError::Network(_))));
    }

    #[tokio::test]
    async fn delete_transaction_then_refetch_drops_it() {
        let transport = ScriptedTransport::new();
        transport.respond(Method::Get, PATH_TRANSACTIONS, 200, TWO_TRANSACTIONS);
        transport.respond(
            Method::Get,
            PATH_TRANSACTIONS,
            200,
            r#"{"results": [{"id": 43, "amount": 8, "type": "income"}]}"#,
        );
        transport.respond(Method::Delete, "/api/transactions/42", 204, "");
        let store = logged_in_store(transport.clone());
        store.get_transactions().await;

        let effect = store.delete_transaction(42).await.unwrap();
        assert_eq!(effect, Effect::Refresh(Resource::Transactions));
        store.apply(effect).await;

        let ids: Vec<Id> = store.snapshot().await.transactions.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![43]);
        assert_eq!(transport.count(Method::Get, PATH_TRANSACTIONS), 2);
    }

    #[tokio::test]
    async fn edit_transaction_clears_selected_transaction() {
        let transport = ScriptedTransport::new();
        transport.respond(Method::Put, "/api/transactions/42", 200, r#"{"results": {"id": 42}}"#);
        transport.respond(Method::Get, PATH_TRANSACTIONS, 200, TWO_TRANSACTIONS);
        let store = logged_in_store(transport.clone());
        let selected: Transaction =
            serde_json::from_str(r#"{"id": 42, "amount": "12.00", "type": "expense"}"#).unwrap();
        store.set_current_transaction(Some(selected)).await;

        let effect = store.edit_transaction(42, &input()).await.unwrap();
        assert!(store.snapshot().await.selection.current_transaction.is_some());
        assert!(store.apply(effect).await.is_updated());

        let state = store.snapshot().await;
        assert!(state.selection.current_transaction.is_none());
        assert_eq!(state.transactions.len(), 2);
        assert_eq!(transport.count(Method::Get, PATH_TRANSACTIONS), 1);
    }

    #[tokio::test]
    async fn failed_write_does_not_touch_state() {
        let transport = ScriptedTransport::new();
        transport.respond(Method::Post, PATH_TRANSACTIONS, 422, r#"{"message": "amount required"}"#);
        let store = logged_in_store(transport.clone());
        let before = store.snapshot().await;

        let err = store.create_transaction(&input()).await.unwrap_err();
        assert_eq!(err.user_message(), "amount required");
        assert_eq!(store.snapshot().await, before);
        assert_eq!(transport.count(Method::Get, PATH_TRANSACTIONS), 0);
    }

    #[tokio::test]
    async fn create_transaction_sends_numeric_amount() {
        let transport = ScriptedTransport::new();
        transport.respond(Method::Post, PATH_TRANSACTIONS, 201, r#"{"results": {"id": 9}}"#);
        let store = logged_in_store(transport.clone());

        store.create_transaction(&input()).await.unwrap();
        let body: Value = serde_json::from_str(transport.requests()[0].body.as_deref().unwrap()).unwrap();
        assert_eq!(body["amount"], serde_json::json!(12.5));
        assert_eq!(body["type"], "expense");
    }

    #[tokio::test]
    async fn writes_validate_before_sending() {
        let transport = ScriptedTransport::new();
        let store = logged_in_store(transport.clone());

        let err = store
            .create_category(&CategoryInput {
                name: "  ".to_string(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION");

        let mut blank_date = input();
        blank_date.date = String::new();
        assert_eq!(store.edit_transaction(1, &blank_date).await.unwrap_err().code(), "VALIDATION");
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn edit_budget_refreshes_budgets_and_clears_selection() {
        let transport = ScriptedTransport::new();
        transport.respond(Method::Put, "/api/budgets/5", 200, r#"{"results": {}}"#);
        transport.respond(
            Method::Get,
            PATH_BUDGETS,
            200,
            r#"{"results": [{"id": 5, "budget_amount": "300.00"}]}"#,
        );
        let store = logged_in_store(transport.clone());
        let selected: Budget = serde_json::from_str(r#"{"id": 5, "budget_amount": 200}"#).unwrap();
        store.set_current_budget(Some(selected)).await;

        let effect = store
            .edit_budget(
                5,
                &BudgetInput {
                    category_id: 2,
                    budget_amount: Decimal::new(300, 0),
                    target_period: "2024-06".to_string(),
                },
            )
            .await
            .unwrap();
        store.apply(effect).await;

        let state = store.snapshot().await;
        assert!(state.selection.current_budget.is_none());
        assert_eq!(state.budgets[0].budget_amount.value(), Some(Decimal::new(300, 0)));
        assert_eq!(transport.count(Method::Get, PATH_BUDGETS), 1);
    }

    #[tokio::test]
    async fn placeholder_endpoints_are_unsupported_and_send_nothing() {
        let transport = ScriptedTransport::new();
        let store = logged_in_store(transport.clone());

        assert_eq!(
            store.delete_fixed_expense(1).await,
            Err(ActionError::Unsupported("deleteFixedExpense"))
        );
        assert_eq!(
            store.delete_connection(1).await,
            Err(ActionError::Unsupported("deleteConnection"))
        );
        assert!(!store.get_connections().await.is_updated());
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn balance_is_stored_as_object() {
        let transport = ScriptedTransport::new();
        transport.respond(Method::Get, PATH_BALANCES, 200, r#"{"results": {"total": "1200.50"}}"#);
        let store = logged_in_store(transport);

        store.get_balance().await;
        let state = store.snapshot().await;
        assert_eq!(total_funds(state.balance.as_ref(), &[]), Decimal::new(120050, 2));
    }

    #[tokio::test]
    async fn dashboard_load_reports_each_resource_independently() {
        let transport = ScriptedTransport::new();
        transport.respond(Method::Get, PATH_TRANSACTIONS, 200, TWO_TRANSACTIONS);
        transport.respond(Method::Get, PATH_BUDGETS, 503, "");
        transport.respond(Method::Get, PATH_BALANCES, 200, r#"{"results": {}}"#);
        transport.respond(Method::Get, PATH_SOURCES, 200, r#"{"results": []}"#);
        let store = logged_in_store(transport.clone());

        let load = store.load_dashboard().await;
        assert!(load.transactions.is_updated());
        assert!(!load.budgets.is_updated());
        assert!(load.balance.is_updated());
        assert!(load.sources.is_updated());
        assert_eq!(transport.requests().len(), 4);

        let state = store.snapshot().await;
        assert_eq!(state.transactions.len(), 2);
        assert!(state.loading.is_empty());
    }

    #[tokio::test]
    async fn source_selection_filters_visible_transactions() {
        let transport = ScriptedTransport::new();
        transport.respond(Method::Get, PATH_TRANSACTIONS, 200, TWO_TRANSACTIONS);
        let store = logged_in_store(transport);
        store.get_transactions().await;

        store.set_current_source(Some(2)).await;
        let state = store.snapshot().await;
        let visible: Vec<Id> = state.visible_transactions().iter().map(|t| t.id).collect();
        assert_eq!(visible, vec![43]);

        store.set_current_source(None).await;
        assert_eq!(store.snapshot().await.visible_transactions().len(), 2);
    }
}
