//! Account table
//!
//! Maps login secrets to identities. Loaded once from a text file with one
//! `<secret> <display name>` pair per line; the first account listed is the
//! administrator.

use std::collections::HashMap;
use std::path::Path;

use thiserror::Error;

use crate::model::Identity;

#[derive(Debug, Error)]
pub enum AccountsError {
    #[error("Failed to read user file: {0}")]
    Io(#[from] std::io::Error),

    #[error("User file contains no accounts")]
    Empty,
}

/// Secret → identity lookup
#[derive(Debug, Clone, Default)]
pub struct Accounts {
    by_secret: HashMap<String, Identity>,
    admin: Option<String>,
}

impl Accounts {
    /// Read and parse a user file
    pub fn load(path: &Path) -> Result<Self, AccountsError> {
        let contents = std::fs::read_to_string(path)?;
        let accounts = Self::parse(&contents);
        if accounts.is_empty() {
            return Err(AccountsError::Empty);
        }
        Ok(accounts)
    }

    /// Parse user file contents; lines without a secret and a name are skipped
    pub fn parse(contents: &str) -> Self {
        let mut accounts = Self::default();

        for line in contents.lines() {
            let Some((secret, name)) = line.trim().split_once(' ') else {
                continue;
            };
            let name = name.trim();
            if secret.is_empty() || name.is_empty() {
                continue;
            }

            let admin = accounts.admin.get_or_insert_with(|| name.to_string());
            let identity = Identity {
                id: name.to_string(),
                name: name.to_string(),
                admin: *admin == name,
            };
            accounts.by_secret.insert(secret.to_string(), identity);
        }

        accounts
    }

    /// Identity for a secret, if any
    pub fn lookup(&self, secret: &str) -> Option<&Identity> {
        self.by_secret.get(secret)
    }

    /// Display name of the administrator
    pub fn admin(&self) -> Option<&str> {
        self.admin.as_deref()
    }

    pub fn len(&self) -> usize {
        self.by_secret.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_secret.is_empty()
    }
}
