use super::{Effect, Fetch, Store};
use crate::error::{ActionError, ActionResult};
use crate::state::Resource;
use crate::transport::Transport;
use crate::types::{
    Budget, BudgetInput, Category, CategoryInput, Connection, Credentials, Id, Reply, SignupRequest,
    Transaction, TransactionInput, UserProfile,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Every action, addressable by name.
///
/// Wire form: `{"action": "deleteTransaction", "payload": {"id": 42}}`. Actions
/// without arguments omit `payload`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", content = "payload", rename_all = "camelCase")]
pub enum Action {
    Login(Credentials),
    Signup(SignupRequest),
    Logout,
    PasswordRecovery { email: String },
    ResetPassword { token: String, new_password: String },
    RestoreSession,
    GetMessage,
    ClearMessage,

    GetUser { id: Id },
    UpdateUser { id: Id, user: Value },
    DeleteUser { id: Id },
    #[serde(alias = "edituser")]
    EditUser { id: Id, user: Value },
    SetCurrentUser(Option<UserProfile>),

    GetTransactions,
    CreateTransaction(TransactionInput),
    EditTransaction { id: Id, transaction: TransactionInput },
    DeleteTransaction { id: Id },

    GetBudgets,
    CreateBudget(BudgetInput),
    EditBudget { id: Id, budget: BudgetInput },
    #[serde(alias = "deleteBudgets")]
    DeleteBudget { id: Id },

    GetCategories,
    CreateCategory(CategoryInput),
    EditCategory { id: Id, category: CategoryInput },
    DeleteCategory { id: Id },

    GetSources,
    GetBalance,
    GetFixedExpenses,
    DeleteFixedExpense { id: Id },
    GetConnections,
    #[serde(alias = "deleteConection")]
    DeleteConnection { id: Id },

    SetCurrentTransaction(Option<Transaction>),
    SetCurrentCategory(Option<Category>),
    SetCurrentBudget(Option<Budget>),
    SetCurrentSource(Option<Id>),
    SetConnections(Vec<Connection>),

    #[serde(alias = "askAIQuestion")]
    AskAssistant { question: String },
    LoadDashboard,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchReport {
    pub resource: String,
    pub updated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FetchReport {
    fn new(resource: impl Into<String>, fetch: &Fetch) -> Self {
        Self {
            resource: resource.into(),
            updated: fetch.is_updated(),
            error: fetch.error().map(ActionError::user_message),
        }
    }
}

/// What a dispatched action produced, for consumers that only see serialized values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Outcome {
    Done,
    Message { message: String },
    Answer { answer: String },
    Fetched { reports: Vec<FetchReport> },
}

fn fetched(resource: impl Into<String>, fetch: &Fetch) -> Outcome {
    Outcome::Fetched {
        reports: vec![FetchReport::new(resource, fetch)],
    }
}

impl<T: Transport> Store<T> {
    /// Runs a write's follow-up and reports it.
    async fn settle(&self, written: ActionResult<Effect>) -> ActionResult<Outcome> {
        let effect = written?;
        let fetch = self.apply(effect).await;
        Ok(match effect {
            Effect::Refresh(resource) => fetched(resource.as_str(), &fetch),
            Effect::RefreshUser(_) => fetched("user", &fetch),
            Effect::EndSession => Outcome::Done,
        })
    }

    /// Runs one action and, for writes, its follow-up read.
    pub async fn dispatch(&self, action: Action) -> ActionResult<Outcome> {
        match action {
            Action::Login(credentials) => self.login(&credentials).await.map(|()| Outcome::Done),
            Action::Signup(request) => self.signup(&request).await.map(|()| Outcome::Done),
            Action::Logout => {
                self.logout().await;
                Ok(Outcome::Done)
            }
            Action::PasswordRecovery { email } => self
                .password_recovery(&email)
                .await
                .map(|message| Outcome::Message { message }),
            Action::ResetPassword {
                token,
                new_password,
            } => self
                .reset_password(&token, &new_password)
                .await
                .map(|message| Outcome::Message { message }),
            Action::RestoreSession => {
                self.restore_session().await;
                Ok(Outcome::Done)
            }
            Action::GetMessage => Ok(fetched("message", &self.get_message().await)),
            Action::ClearMessage => {
                self.clear_message().await;
                Ok(Outcome::Done)
            }

            Action::GetUser { id } => Ok(fetched("user", &self.get_user(id).await)),
            Action::UpdateUser { id, user } => self.settle(self.update_user(id, user).await).await,
            Action::DeleteUser { id } => self.settle(self.delete_user(id).await).await,
            Action::EditUser { id, user } => self.settle(self.edit_user(id, user).await).await,
            Action::SetCurrentUser(user) => {
                self.set_current_user(user).await;
                Ok(Outcome::Done)
            }

            Action::GetTransactions => {
                Ok(fetched(Resource::Transactions.as_str(), &self.get_transactions().await))
            }
            Action::CreateTransaction(input) => {
                self.settle(self.create_transaction(&input).await).await
            }
            Action::EditTransaction { id, transaction } => {
                self.settle(self.edit_transaction(id, &transaction).await)
                    .await
            }
            Action::DeleteTransaction { id } => {
                self.settle(self.delete_transaction(id).await).await
            }

            Action::GetBudgets => {
                Ok(fetched(Resource::Budgets.as_str(), &self.get_budgets().await))
            }
            Action::CreateBudget(input) => self.settle(self.create_budget(&input).await).await,
            Action::EditBudget { id, budget } => {
                self.settle(self.edit_budget(id, &budget).await).await
            }
            Action::DeleteBudget { id } => self.settle(self.delete_budget(id).await).await,

            Action::GetCategories => {
                Ok(fetched(Resource::Categories.as_str(), &self.get_categories().await))
            }
            Action::CreateCategory(input) => self.settle(self.create_category(&input).await).await,
            Action::EditCategory { id, category } => {
                self.settle(self.edit_category(id, &category).await).await
            }
            Action::DeleteCategory { id } => self.settle(self.delete_category(id).await).await,

            Action::GetSources => {
                Ok(fetched(Resource::Sources.as_str(), &self.get_sources().await))
            }
            Action::GetBalance => {
                Ok(fetched(Resource::Balance.as_str(), &self.get_balance().await))
            }
            Action::GetFixedExpenses => {
                Ok(fetched(Resource::FixedExpenses.as_str(), &self.get_fixed_expenses().await))
            }
            Action::DeleteFixedExpense { id } => {
                self.settle(self.delete_fixed_expense(id).await).await
            }
            Action::GetConnections => {
                Ok(fetched(Resource::Connections.as_str(), &self.get_connections().await))
            }
            Action::DeleteConnection { id } => self.settle(self.delete_connection(id).await).await,

            Action::SetCurrentTransaction(transaction) => {
                self.set_current_transaction(transaction).await;
                Ok(Outcome::Done)
            }
            Action::SetCurrentCategory(category) => {
                self.set_current_category(category).await;
                Ok(Outcome::Done)
            }
            Action::SetCurrentBudget(budget) => {
                self.set_current_budget(budget).await;
                Ok(Outcome::Done)
            }
            Action::SetCurrentSource(source_id) => {
                self.set_current_source(source_id).await;
                Ok(Outcome::Done)
            }
            Action::SetConnections(connections) => {
                self.set_connections(connections).await;
                Ok(Outcome::Done)
            }

            Action::AskAssistant { question } => self
                .ask_assistant(&question)
                .await
                .map(|answer| Outcome::Answer { answer }),
            Action::LoadDashboard => {
                let load = self.load_dashboard().await;
                Ok(Outcome::Fetched {
                    reports: load
                        .entries()
                        .iter()
                        .map(|(resource, fetch)| FetchReport::new(resource.as_str(), fetch))
                        .collect(),
                })
            }
        }
    }

    /// [`Store::dispatch`] with the result folded into a serializable envelope.
    pub async fn invoke(&self, action: Action) -> Reply<Outcome> {
        self.dispatch(action).await.into()
    }
}
