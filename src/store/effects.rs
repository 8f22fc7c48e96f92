use super::Store;
use crate::error::ActionError;
use crate::state::Resource;
use crate::transport::Transport;
use crate::types::Id;

/// Follow-up work requested by a successful write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Clear the selection for this resource and re-read it.
    Refresh(Resource),
    /// Re-read the profile of this user.
    RefreshUser(Id),
    /// The account is gone; drop the session.
    EndSession,
}

/// Result of a read. A failed read is not an error for the caller: the cached
/// slice stays as it was and the failure is carried along for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fetch {
    Updated,
    Kept(ActionError),
}

impl Fetch {
    pub fn is_updated(&self) -> bool {
        matches!(self, Self::Updated)
    }

    pub fn error(&self) -> Option<&ActionError> {
        match self {
            Self::Updated => None,
            Self::Kept(e) => Some(e),
        }
    }
}

impl<T: Transport> Store<T> {
    /// Runs the follow-up of a write exactly once.
    pub async fn apply(&self, effect: Effect) -> Fetch {
        match effect {
            Effect::Refresh(resource) => {
                self.update(|state| state.selection.clear_for(resource)).await;
                self.refresh(resource).await
            }
            Effect::RefreshUser(id) => self.get_user(id).await,
            Effect::EndSession => {
                self.logout().await;
                Fetch::Updated
            }
        }
    }

    /// The read action that owns `resource`.
    pub async fn refresh(&self, resource: Resource) -> Fetch {
        match resource {
            Resource::Transactions => self.get_transactions().await,
            Resource::Budgets => self.get_budgets().await,
            Resource::Sources => self.get_sources().await,
            Resource::Categories => self.get_categories().await,
            Resource::Balance => self.get_balance().await,
            Resource::FixedExpenses => self.get_fixed_expenses().await,
            Resource::Connections => self.get_connections().await,
        }
    }
}
