//! In-process account directory.
//!
//! Reports a configured set of usernames as taken and remembers accounts
//! registered while the process runs. Usernames compare case-insensitively.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::info;
use uuid::Uuid;

use super::{AccountAttributes, Error, IdentityProvider, Result};

#[derive(Debug, Clone)]
struct FixtureAccount {
    username: String,
    // read back only by tests
    #[cfg_attr(not(test), allow(dead_code))]
    password: String,
    attributes: AccountAttributes,
}

#[derive(Debug, Default)]
struct Directory {
    reserved: HashSet<String>,
    accounts: HashMap<String, FixtureAccount>,
}

impl Directory {
    fn contains(&self, key: &str) -> bool {
        self.reserved.contains(key) || self.accounts.contains_key(key)
    }
}

/// Fixture implementation of [`IdentityProvider`]
#[derive(Debug, Default)]
pub struct FixtureIdentityProvider {
    directory: Mutex<Directory>,
}

impl FixtureIdentityProvider {
    pub fn new<I, S>(taken_usernames: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let reserved = taken_usernames
            .into_iter()
            .map(|name| name.as_ref().to_lowercase())
            .collect();
        Self {
            directory: Mutex::new(Directory {
                reserved,
                accounts: HashMap::new(),
            }),
        }
    }

    /// Password currently stored for a registered account
    #[cfg(test)]
    pub(crate) fn password_of(&self, username: &str) -> Option<String> {
        self.lock()
            .accounts
            .get(&username.to_lowercase())
            .map(|account| account.password.clone())
    }

    fn lock(&self) -> MutexGuard<'_, Directory> {
        self.directory.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl IdentityProvider for FixtureIdentityProvider {
    async fn account_exists(&self, username: &str) -> Result<bool> {
        Ok(self.lock().contains(&username.to_lowercase()))
    }

    async fn register_account(
        &self,
        username: &str,
        password: &str,
        attributes: &AccountAttributes,
    ) -> Result<String> {
        if password.is_empty() {
            return Err(Error::InvalidParameter("Password must not be empty".into()));
        }

        let key = username.to_lowercase();
        let mut directory = self.lock();
        if directory.contains(&key) {
            return Err(Error::UsernameExists(username.to_string()));
        }

        let account_id = Uuid::new_v4().to_string();
        directory.accounts.insert(
            key,
            FixtureAccount {
                username: username.to_string(),
                password: password.to_string(),
                attributes: attributes.clone(),
            },
        );
        info!(username = %username, account_id = %account_id, "Registered fixture account");
        Ok(account_id)
    }

    async fn find_username_by_phone(&self, phone_number: &str) -> Result<Option<String>> {
        Ok(self
            .lock()
            .accounts
            .values()
            .find(|account| account.attributes.phone_number == phone_number)
            .map(|account| account.username.clone()))
    }

    async fn start_password_reset(&self, username: &str) -> Result<()> {
        if self.lock().contains(&username.to_lowercase()) {
            Ok(())
        } else {
            Err(Error::UserNotFound(username.to_string()))
        }
    }

    /// Any confirmation code is accepted.
    async fn confirm_password_reset(
        &self,
        username: &str,
        _code: &str,
        new_password: &str,
    ) -> Result<()> {
        if new_password.is_empty() {
            return Err(Error::InvalidParameter("Password must not be empty".into()));
        }

        let key = username.to_lowercase();
        let mut directory = self.lock();
        if let Some(account) = directory.accounts.get_mut(&key) {
            account.password = new_password.to_string();
            Ok(())
        } else if directory.reserved.contains(&key) {
            Ok(())
        } else {
            Err(Error::UserNotFound(username.to_string()))
        }
    }
}
