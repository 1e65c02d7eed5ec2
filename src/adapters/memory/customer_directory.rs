//! In-memory customer directory.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::errors::BillingError;
use crate::domain::foundation::{CustomerId, UserId, ValidationError};
use crate::ports::{CustomerDirectory, Member};

#[derive(Debug, Clone, Default)]
pub struct InMemoryCustomerDirectory {
    members: Arc<RwLock<HashMap<UserId, Member>>>,
}

impl InMemoryCustomerDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, member: Member) {
        self.members
            .write()
            .await
            .insert(member.user_id.clone(), member);
    }
}

#[async_trait]
impl CustomerDirectory for InMemoryCustomerDirectory {
    async fn find(&self, user_id: &UserId) -> Result<Option<Member>, BillingError> {
        Ok(self.members.read().await.get(user_id).cloned())
    }

    async fn link_customer(
        &self,
        user_id: &UserId,
        customer: &CustomerId,
    ) -> Result<(), BillingError> {
        let mut members = self.members.write().await;
        let member = members.get_mut(user_id).ok_or_else(|| {
            BillingError::Validation(ValidationError::invalid_format(
                "user_id",
                format!("unknown user {}", user_id),
            ))
        })?;
        member.customer_id = Some(customer.clone());
        Ok(())
    }

    async fn members_pending_customer_link(&self) -> Result<Vec<Member>, BillingError> {
        let mut pending: Vec<Member> = self
            .members
            .read()
            .await
            .values()
            .filter(|m| m.customer_id.is_none() && m.legacy_customer_id.is_some())
            .cloned()
            .collect();
        pending.sort_by(|a, b| a.user_id.as_str().cmp(b.user_id.as_str()));
        Ok(pending)
    }
}
