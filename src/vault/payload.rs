//! The decrypted payload and the account operations both layouts share.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::StorageMode;
use crate::errors::{Result, VaultError};
use crate::model::{Account, Node, Tree};

use chrono::{DateTime, Utc};

/// Name of the group new accounts land in when none is given.
pub const DEFAULT_GROUP: &str = "Authenticator";

/// Name of the root group of a fresh tree.
pub const ROOT_GROUP: &str = "Root";

/// Account-level operations over either payload layout.
pub trait AccountStore {
    /// Every account, in storage order.
    fn accounts(&self) -> Result<Vec<Account>>;

    /// The account with `id`, or `NotFound`.
    fn find_account(&self, id: Uuid) -> Result<Account>;

    /// Add a new account.
    fn insert_account(&mut self, account: &Account) -> Result<()>;

    /// Overwrite an existing account with `account` (matched by id).
    fn replace_account(&mut self, account: &Account, now: DateTime<Utc>) -> Result<()>;

    /// Remove a record by id; returns how many records went with it.
    fn remove_record(&mut self, id: Uuid) -> Result<usize>;

    fn contains(&self, id: Uuid) -> bool;
}

impl AccountStore for Tree {
    fn accounts(&self) -> Result<Vec<Account>> {
        let mut out = Vec::new();
        for entry in self.entries() {
            if let Some(account) = Account::from_entry(entry, self.parent_of(entry.uuid))? {
                out.push(account);
            }
        }
        Ok(out)
    }

    fn find_account(&self, id: Uuid) -> Result<Account> {
        let entry = self
            .entry(id)
            .map_err(|_| VaultError::NotFound(format!("account {id}")))?;
        Account::from_entry(entry, self.parent_of(id))?
            .ok_or_else(|| VaultError::NotFound(format!("account {id}")))
    }

    fn insert_account(&mut self, account: &Account) -> Result<()> {
        let parent = match account.group_id {
            Some(group_id) => {
                self.group(group_id)?;
                group_id
            }
            None => self
                .child_group_named(self.root(), DEFAULT_GROUP)
                .unwrap_or_else(|| self.root()),
        };
        self.insert(parent, Node::Entry(account.to_entry()), None)?;
        Ok(())
    }

    fn replace_account(&mut self, account: &Account, now: DateTime<Utc>) -> Result<()> {
        if !Account::is_otp_entry(self.entry(account.id)?) {
            return Err(VaultError::NotFound(format!("account {}", account.id)));
        }
        self.entry_mut(account.id)?.update(now, |entry| {
            account.write_to(entry);
            Ok(())
        })
    }

    fn remove_record(&mut self, id: Uuid) -> Result<usize> {
        self.remove(id)
    }

    fn contains(&self, id: Uuid) -> bool {
        Tree::contains(self, id)
    }
}

/// The flat layout: accounts are the records themselves.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountList(pub Vec<Account>);

impl AccountStore for AccountList {
    fn accounts(&self) -> Result<Vec<Account>> {
        Ok(self.0.clone())
    }

    fn find_account(&self, id: Uuid) -> Result<Account> {
        self.0
            .iter()
            .find(|a| a.id == id)
            .cloned()
            .ok_or_else(|| VaultError::NotFound(format!("account {id}")))
    }

    fn insert_account(&mut self, account: &Account) -> Result<()> {
        if account.group_id.is_some() {
            return Err(VaultError::InvalidOperation(
                "groups are not available in flat storage mode".into(),
            ));
        }
        if self.contains(account.id) {
            return Err(VaultError::InvalidOperation(format!(
                "an account with id {} already exists",
                account.id
            )));
        }
        self.0.push(account.clone());
        Ok(())
    }

    fn replace_account(&mut self, account: &Account, _now: DateTime<Utc>) -> Result<()> {
        let slot = self
            .0
            .iter_mut()
            .find(|a| a.id == account.id)
            .ok_or_else(|| VaultError::NotFound(format!("account {}", account.id)))?;
        *slot = account.clone();
        Ok(())
    }

    fn remove_record(&mut self, id: Uuid) -> Result<usize> {
        let before = self.0.len();
        self.0.retain(|a| a.id != id);
        match before - self.0.len() {
            0 => Err(VaultError::NotFound(format!("account {id}"))),
            n => Ok(n),
        }
    }

    fn contains(&self, id: Uuid) -> bool {
        self.0.iter().any(|a| a.id == id)
    }
}

/// What the container's encrypted section holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "layout", content = "records", rename_all = "lowercase")]
pub enum Payload {
    Hierarchical(Tree),
    Flat(AccountList),
}

impl Payload {
    /// An empty payload: root + default group, or an empty list.
    pub fn empty(mode: StorageMode, now: DateTime<Utc>) -> Result<Self> {
        Ok(match mode {
            StorageMode::Hierarchical => {
                let mut tree = Tree::new(ROOT_GROUP, now);
                let root = tree.root();
                tree.insert(
                    root,
                    Node::Group(crate::model::Group::new(DEFAULT_GROUP, now)),
                    None,
                )?;
                Self::Hierarchical(tree)
            }
            StorageMode::Flat => Self::Flat(AccountList::default()),
        })
    }

    pub fn mode(&self) -> StorageMode {
        match self {
            Self::Hierarchical(_) => StorageMode::Hierarchical,
            Self::Flat(_) => StorageMode::Flat,
        }
    }

    pub fn store(&self) -> &dyn AccountStore {
        match self {
            Self::Hierarchical(tree) => tree,
            Self::Flat(list) => list,
        }
    }

    pub fn store_mut(&mut self) -> &mut dyn AccountStore {
        match self {
            Self::Hierarchical(tree) => tree,
            Self::Flat(list) => list,
        }
    }

    /// The tree, or `InvalidOperation` in flat mode.
    pub fn tree(&self) -> Result<&Tree> {
        match self {
            Self::Hierarchical(tree) => Ok(tree),
            Self::Flat(_) => Err(flat_mode_error()),
        }
    }

    pub fn tree_mut(&mut self) -> Result<&mut Tree> {
        match self {
            Self::Hierarchical(tree) => Ok(tree),
            Self::Flat(_) => Err(flat_mode_error()),
        }
    }
}

fn flat_mode_error() -> VaultError {
    VaultError::InvalidOperation("groups and entries are not available in flat storage mode".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CreateAccountRequest;

    const KEY: [u8; 32] = [0x44; 32];

    fn account(issuer: &str) -> Account {
        CreateAccountRequest::totp(issuer, "me", "JBSWY3DPEHPK3PXP")
            .build(&KEY, Utc::now())
            .unwrap()
    }

    #[test]
    fn tree_accounts_land_in_default_group() {
        let mut payload = Payload::empty(StorageMode::Hierarchical, Utc::now()).unwrap();
        let a = account("GitHub");
        payload.store_mut().insert_account(&a).unwrap();

        let tree = payload.tree().unwrap();
        let group = tree.child_group_named(tree.root(), DEFAULT_GROUP).unwrap();
        assert_eq!(tree.parent_of(a.id), Some(group));
        assert_eq!(payload.store().find_account(a.id).unwrap().group_id, Some(group));
    }

    #[test]
    fn replace_in_tree_records_history() {
        let mut payload = Payload::empty(StorageMode::Hierarchical, Utc::now()).unwrap();
        let mut a = account("GitHub");
        payload.store_mut().insert_account(&a).unwrap();
        a.label = "work".into();
        payload.store_mut().replace_account(&a, Utc::now()).unwrap();

        let entry = payload.tree().unwrap().entry(a.id).unwrap();
        assert_eq!(entry.history().len(), 1);
        assert_eq!(payload.store().find_account(a.id).unwrap().label, "work");
    }

    #[test]
    fn flat_mode_rejects_tree_operations() {
        let payload = Payload::empty(StorageMode::Flat, Utc::now()).unwrap();
        assert!(matches!(payload.tree(), Err(VaultError::InvalidOperation(_))));
    }

    #[test]
    fn flat_remove_unknown_is_not_found() {
        let mut list = AccountList::default();
        list.insert_account(&account("A")).unwrap();
        assert!(matches!(
            list.remove_record(Uuid::new_v4()),
            Err(VaultError::NotFound(_))
        ));
    }

    #[test]
    fn payload_json_roundtrip() {
        let mut payload = Payload::empty(StorageMode::Hierarchical, Utc::now()).unwrap();
        payload.store_mut().insert_account(&account("GitHub")).unwrap();
        let json = serde_json::to_vec(&payload).unwrap();
        let back: Payload = serde_json::from_slice(&json).unwrap();
        assert_eq!(back, payload);
    }
}
