use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::info;

use orderline_core::model::require_id;
use orderline_core::{CoreResult, IdGenerator, NewUser, ServiceError, User, UserDirectory, UuidGenerator};

/// In-memory user directory. Users are written once and only read afterwards.
pub struct InMemoryUserDirectory {
    users: RwLock<HashMap<String, User>>,
    ids: Arc<dyn IdGenerator>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::with_id_generator(Arc::new(UuidGenerator))
    }

    pub fn with_id_generator(ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            ids,
        }
    }

    pub fn len(&self) -> usize {
        self.users.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.read().is_empty()
    }
}

impl Default for InMemoryUserDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn create_user(&self, new_user: NewUser) -> CoreResult<User> {
        new_user.validate()?;

        let user = new_user.into_user(self.ids.next_id());
        let mut users = self.users.write();
        if users.contains_key(&user.id) {
            return Err(ServiceError::internal(format!("user id {} already in use", user.id)));
        }
        users.insert(user.id.clone(), user.clone());
        drop(users);

        info!("User created: {} ({})", user.id, user.name);
        Ok(user)
    }

    async fn get_user(&self, id: &str) -> CoreResult<User> {
        require_id(id)?;
        self.users
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| ServiceError::not_found(format!("user {} not found", id)))
    }
}
