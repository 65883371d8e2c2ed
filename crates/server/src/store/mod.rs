//! Embedded catalog store.
//!
//! Owns the authoritative in-memory copy of users and products, mirrors it to
//! the snapshot file after every mutation, and bootstraps the product catalog
//! once from a remote seed source.
//!
//! # Lifecycle
//!
//! ```text
//! open()  ── load snapshot (fatal if missing/corrupt)
//!   │
//!   ├─ bootstrap_if_needed()  hasStarted=false → fetch seed → merge → persist
//!   │
//!   ├─ create/update/delete/save_user/empty_catalog  mutate → persist → return
//!   │
//! close() ── final snapshot (or empty_catalog when configured)
//! ```
//!
//! # Concurrency
//!
//! Mutations take a writer mutex, apply the change to a staged copy of the
//! state and swap it into the `RwLock` only briefly, so reads never wait on
//! disk I/O. With [`WritePolicy::Serialized`] the writer mutex is held until
//! the snapshot is on disk and the copy is published after the write; snapshot
//! writes never overtake each other. With [`WritePolicy::Interleaved`] the copy
//! is published and the mutex released before the write, which reproduces the
//! last-write-wins behaviour of unsynchronized writers.

pub mod snapshot;

use std::ops::RangeInclusive;

use rand::Rng;
use stockroom_core::{
    FilterDefaults, Product, ProductDraft, ProductFilter, ProductId, Snapshot, User, UserId,
    Username,
};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, instrument, warn};

use crate::services::auth::password;
use crate::services::seed::{HttpSeedSource, SeedSource};

pub use snapshot::{SnapshotError, SnapshotFile};

/// Stock assigned to seeded products, which carry none of their own.
pub const SEED_QUANTITY_RANGE: RangeInclusive<u32> = 0..=1000;

/// Errors returned by catalog store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The snapshot could not be loaded; the store cannot start.
    #[error("store unavailable: {0}")]
    Unavailable(#[source] SnapshotError),

    /// The in-memory change was applied but the snapshot write failed.
    #[error("failed to persist snapshot: {0}")]
    Persist(#[source] SnapshotError),

    /// A product with this ID already exists.
    #[error("product {0} already exists")]
    Conflict(ProductId),

    /// A user with this username already exists.
    #[error("user {0} already exists")]
    DuplicateUser(Username),

    /// The targeted product does not exist.
    #[error("product {0} not found")]
    NotFound(ProductId),

    /// Malformed ID, payload or filter.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Password hashing failed.
    #[error("password hashing error")]
    PasswordHash,

    /// The ID sequence for this kind of record is used up.
    #[error("no {0} ids left")]
    IdsExhausted(&'static str),
}

/// How mutations are ordered against snapshot writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WritePolicy {
    /// One writer at a time across mutate + persist.
    #[default]
    Serialized,
    /// Mutations are exclusive but snapshot writes race (last write wins).
    Interleaved,
}

/// Store behaviour switches.
///
/// The `legacy_*` flags reproduce observed behaviour of the previous
/// implementation; the defaults are the corrected semantics.
#[derive(Debug, Clone, Default)]
pub struct StoreOptions {
    pub write_policy: WritePolicy,
    /// Delete reports success without removing anything.
    pub legacy_delete: bool,
    /// Updating an existing user also appends the incoming record.
    pub legacy_user_append: bool,
    /// How unspecified listing bounds are filled in.
    pub filter_defaults: FilterDefaults,
    /// `close()` empties the catalog so the next start re-seeds it.
    pub empty_on_shutdown: bool,
}

/// Result of a bootstrap attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapOutcome {
    /// The store was already bootstrapped; nothing was fetched.
    AlreadyStarted,
    /// The seed catalog was merged in and persisted.
    Seeded(usize),
    /// The fetch failed; `hasStarted` stays false and the next read retries.
    Deferred,
}

#[derive(Clone)]
struct StoreState {
    snapshot: Snapshot,
    next_product: u64,
    next_user: i32,
}

impl StoreState {
    fn new(snapshot: Snapshot) -> Result<Self, SnapshotError> {
        let max_product = snapshot
            .products
            .iter()
            .filter_map(|p| p.id.as_sequence())
            .max()
            .unwrap_or(0);
        let next_product = max_product
            .checked_add(1)
            .ok_or_else(|| SnapshotError::IdOverflow(format!("product {max_product}")))?;

        let max_user = snapshot
            .users
            .iter()
            .map(|u| u.id.as_i32())
            .max()
            .unwrap_or(0)
            .max(0);
        let next_user = max_user
            .checked_add(1)
            .ok_or_else(|| SnapshotError::IdOverflow(format!("user {max_user}")))?;

        Ok(Self {
            snapshot,
            next_product,
            next_user,
        })
    }

    fn next_product_id(&mut self) -> Result<ProductId, StoreError> {
        let seq = self.next_product;
        self.next_product = seq
            .checked_add(1)
            .ok_or(StoreError::IdsExhausted("product"))?;
        Ok(ProductId::from_sequence(seq))
    }

    fn next_user_id(&mut self) -> Result<UserId, StoreError> {
        let id = self.next_user;
        self.next_user = id.checked_add(1).ok_or(StoreError::IdsExhausted("user"))?;
        Ok(UserId::new(id))
    }

    fn product_position(&self, id: &ProductId) -> Option<usize> {
        self.snapshot
            .products
            .iter()
            .position(|p| same_product(&p.id, id))
    }

    fn username_taken(&self, username: &Username, except: UserId) -> bool {
        self.snapshot
            .users
            .iter()
            .any(|u| &u.username == username && u.id != except)
    }

    fn upsert_product(&mut self, draft: ProductDraft) -> Result<Product, StoreError> {
        if let Some(id) = &draft.id
            && let Some(pos) = self.product_position(id)
            && let Some(existing) = self.snapshot.products.get_mut(pos)
        {
            let id = existing.id.clone();
            existing.overwrite_from(&draft.into_product(id));
            return Ok(existing.clone());
        }

        let id = self.next_product_id()?;
        let product = draft.into_product(id);
        self.snapshot.products.push(product.clone());
        Ok(product)
    }
}

/// Two product IDs name the same record if they are equal or denote the
/// same sequence number (`"7"` and `" 7"`).
fn same_product(a: &ProductId, b: &ProductId) -> bool {
    a == b || a.as_sequence().is_some_and(|seq| b.as_sequence() == Some(seq))
}

/// In-process owner of user and product records.
pub struct CatalogStore<S = HttpSeedSource> {
    file: SnapshotFile,
    source: S,
    options: StoreOptions,
    state: RwLock<StoreState>,
    writer: Mutex<()>,
    bootstrap: Mutex<()>,
}

impl CatalogStore {
    /// Provision a fresh, not-yet-bootstrapped snapshot file.
    ///
    /// The server never does this on its own: a missing snapshot is fatal.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Persist` if the file exists and `overwrite` is
    /// false, or if the write fails.
    pub fn create_empty(file: &SnapshotFile, overwrite: bool) -> Result<(), StoreError> {
        file.create_empty(overwrite).map_err(StoreError::Persist)?;
        info!(path = %file.path().display(), "Empty snapshot created");
        Ok(())
    }
}

impl<S: SeedSource> CatalogStore<S> {
    /// Load the snapshot and build the store.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Unavailable` if the snapshot is missing, does
    /// not parse, or holds an ID at the top of its range. The store never
    /// starts from unknown state.
    #[instrument(skip(file, source, options), fields(path = %file.path().display()))]
    pub fn open(file: SnapshotFile, source: S, options: StoreOptions) -> Result<Self, StoreError> {
        let snapshot = file.load().map_err(StoreError::Unavailable)?;

        info!(
            has_started = snapshot.has_started,
            users = snapshot.users.len(),
            products = snapshot.products.len(),
            "Snapshot loaded"
        );

        let state = StoreState::new(snapshot).map_err(StoreError::Unavailable)?;

        Ok(Self {
            file,
            source,
            options,
            state: RwLock::new(state),
            writer: Mutex::new(()),
            bootstrap: Mutex::new(()),
        })
    }

    /// The options this store was opened with.
    #[must_use]
    pub const fn options(&self) -> &StoreOptions {
        &self.options
    }

    /// The snapshot file backing this store.
    #[must_use]
    pub const fn file(&self) -> &SnapshotFile {
        &self.file
    }

    /// Whether the catalog has been bootstrapped.
    pub async fn has_started(&self) -> bool {
        self.state.read().await.snapshot.has_started
    }

    /// Copy of the current committed state.
    pub async fn snapshot(&self) -> Snapshot {
        self.state.read().await.snapshot.clone()
    }

    /// Write the current state and release the store.
    ///
    /// With `empty_on_shutdown` the catalog is emptied instead, so the next
    /// start fetches a fresh seed catalog.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Persist` if the final write fails.
    pub async fn close(&self) -> Result<(), StoreError> {
        if self.options.empty_on_shutdown {
            info!("Emptying catalog on shutdown");
            return self.empty_catalog().await;
        }

        self.apply(true, |_| Ok(())).await?;
        info!("Store closed");
        Ok(())
    }

    // =========================================================================
    // Bootstrap
    // =========================================================================

    /// Seed the catalog from the remote source unless already bootstrapped.
    ///
    /// Concurrent callers share a single fetch; once `hasStarted` is true this
    /// is a no-op. A failed fetch is logged and leaves the flag false.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Persist` if the seeded catalog cannot be written.
    #[instrument(skip(self))]
    pub async fn bootstrap_if_needed(&self) -> Result<BootstrapOutcome, StoreError> {
        if self.has_started().await {
            debug!("Catalog already bootstrapped, skipping");
            return Ok(BootstrapOutcome::AlreadyStarted);
        }

        let _flight = self.bootstrap.lock().await;
        if self.has_started().await {
            return Ok(BootstrapOutcome::AlreadyStarted);
        }

        let items = match self.source.fetch_seed_catalog().await {
            Ok(items) => items,
            Err(e) => {
                error!(error = %e, "Could not fetch seed catalog");
                return Ok(BootstrapOutcome::Deferred);
            }
        };

        let count = items.len();
        self.apply(true, |state| {
            for item in items {
                let quantity = rand::rng().random_range(SEED_QUANTITY_RANGE);
                state.upsert_product(item.into_draft(quantity))?;
            }
            state.snapshot.has_started = true;
            Ok(())
        })
        .await?;

        info!(count, "Seed catalog fetched");
        Ok(BootstrapOutcome::Seeded(count))
    }

    // =========================================================================
    // Products
    // =========================================================================

    /// Add a new product under the next sequential ID.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Conflict` if the draft names an existing ID (the
    /// collection is left untouched), `StoreError::InvalidArgument` for an
    /// invalid draft, or `StoreError::Persist`.
    #[instrument(skip(self, draft), fields(id = ?draft.id))]
    pub async fn create_product(&self, draft: ProductDraft) -> Result<Product, StoreError> {
        draft
            .validate()
            .map_err(|e| StoreError::InvalidArgument(e.to_string()))?;

        let product = self
            .apply(true, |state| {
                if let Some(id) = draft.id.as_ref().filter(|id| !id.is_blank())
                    && state.product_position(id).is_some()
                {
                    return Err(StoreError::Conflict(id.clone()));
                }

                let product = draft.into_product(state.next_product_id()?);
                state.snapshot.products.push(product.clone());
                Ok(product)
            })
            .await?;

        info!(id = %product.id, "Product created");
        Ok(product)
    }

    /// Overwrite a product in place if its ID exists, otherwise append it
    /// under a new ID. Bulk loaders pass `persist = false` and commit once.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidArgument` for an invalid draft, or
    /// `StoreError::Persist` when persisting.
    #[instrument(skip(self, draft), fields(id = ?draft.id))]
    pub async fn upsert_product(
        &self,
        draft: ProductDraft,
        persist: bool,
    ) -> Result<Product, StoreError> {
        draft
            .validate()
            .map_err(|e| StoreError::InvalidArgument(e.to_string()))?;

        self.apply(persist, |state| state.upsert_product(draft)).await
    }

    /// Replace an existing product.
    ///
    /// The old record is removed and the new one appended, so an updated
    /// product moves to the end of the listing.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidArgument` if the ID is not a positive
    /// integer, `StoreError::NotFound` if no such product exists, or
    /// `StoreError::Persist`.
    #[instrument(skip(self, draft), fields(id = ?draft.id))]
    pub async fn update_product(&self, draft: ProductDraft) -> Result<Product, StoreError> {
        let id = draft.id.clone().unwrap_or_default();
        if id.as_sequence().is_none() {
            return Err(StoreError::InvalidArgument(format!(
                "product id {:?} must be a positive integer",
                id.as_str()
            )));
        }
        draft
            .validate()
            .map_err(|e| StoreError::InvalidArgument(e.to_string()))?;

        let product = self
            .apply(true, |state| {
                let pos = state
                    .product_position(&id)
                    .ok_or_else(|| StoreError::NotFound(id.clone()))?;
                let old = state.snapshot.products.remove(pos);

                let product = draft.into_product(old.id);
                state.snapshot.products.push(product.clone());
                Ok(product)
            })
            .await?;

        info!(id = %product.id, "Product updated");
        Ok(product)
    }

    /// Remove every product with the given ID.
    ///
    /// Returns whether anything was removed. With `legacy_delete` nothing is
    /// removed and the result is always `true`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Persist`.
    #[instrument(skip(self))]
    pub async fn delete_product(&self, id: &ProductId) -> Result<bool, StoreError> {
        let legacy = self.options.legacy_delete;
        let (before, after) = self
            .apply(true, |state| {
                let before = state.snapshot.products.len();
                if !legacy {
                    state.snapshot.products.retain(|p| !same_product(&p.id, id));
                }
                Ok((before, state.snapshot.products.len()))
            })
            .await?;

        if legacy {
            return Ok(after <= before);
        }

        let removed = after < before;
        if removed {
            info!(%id, "Product deleted");
        }
        Ok(removed)
    }

    /// Products inside the filter bounds.
    ///
    /// If the catalog has not been bootstrapped yet, a bootstrap attempt is
    /// made first; its failure never fails the read.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidArgument` for malformed bounds.
    pub async fn list_products(&self, filter: &ProductFilter) -> Result<Vec<Product>, StoreError> {
        filter
            .validate()
            .map_err(|e| StoreError::InvalidArgument(e.to_string()))?;

        if !self.has_started().await
            && let Err(e) = self.bootstrap_if_needed().await
        {
            warn!(error = %e, "Bootstrap on read failed");
        }

        let bounds = filter.resolve(self.options.filter_defaults);
        let state = self.state.read().await;
        Ok(state
            .snapshot
            .products
            .iter()
            .filter(|p| bounds.matches(p))
            .cloned()
            .collect())
    }

    /// Look up a single product.
    pub async fn get_product(&self, id: &ProductId) -> Option<Product> {
        let state = self.state.read().await;
        state
            .product_position(id)
            .and_then(|pos| state.snapshot.products.get(pos).cloned())
    }

    /// Clear all products and the bootstrap flag. Users are kept.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Persist`.
    #[instrument(skip(self))]
    pub async fn empty_catalog(&self) -> Result<(), StoreError> {
        let removed = self
            .apply(true, |state| Ok(state.snapshot.empty_catalog()))
            .await?;

        info!(removed, "Catalog emptied");
        Ok(())
    }

    // =========================================================================
    // Users
    // =========================================================================

    /// Create or update a user account, hashing the supplied password.
    ///
    /// - An assigned ID that matches an account updates it in place.
    /// - An unassigned ID (`-1`) creates a new account with the next ID.
    /// - An assigned ID with no match is stored under that ID.
    ///
    /// With `legacy_user_append`, the update branch also appends the incoming
    /// record, duplicating the account.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::DuplicateUser` if the username belongs to another
    /// account, `StoreError::InvalidArgument` for an assigned ID at the top of
    /// the range, `StoreError::PasswordHash`, or `StoreError::Persist`.
    #[instrument(skip(self, user), fields(username = %user.username))]
    pub async fn save_user(&self, user: User, persist: bool) -> Result<User, StoreError> {
        let hashed = password::hash_password(user.password.trim())
            .map_err(|_| StoreError::PasswordHash)?;
        let incoming = User {
            password: hashed,
            ..user
        };

        let legacy_append = self.options.legacy_user_append;
        let stored = self
            .apply(persist, |state| {
                if state.username_taken(&incoming.username, incoming.id) {
                    return Err(StoreError::DuplicateUser(incoming.username));
                }

                let existing = if incoming.id.is_assigned() {
                    state.snapshot.users.iter_mut().find(|u| u.id == incoming.id)
                } else {
                    None
                };

                if let Some(existing) = existing {
                    existing.name.clone_from(&incoming.name);
                    existing.password.clone_from(&incoming.password);
                    existing.username = incoming.username.clone();
                    let stored = existing.clone();
                    if legacy_append {
                        state.snapshot.users.push(incoming);
                    }
                    Ok(stored)
                } else if incoming.id.is_assigned() {
                    let next = incoming.id.as_i32().checked_add(1).ok_or_else(|| {
                        StoreError::InvalidArgument(format!("user id {} is out of range", incoming.id))
                    })?;
                    state.next_user = state.next_user.max(next);
                    state.snapshot.users.push(incoming.clone());
                    Ok(incoming)
                } else {
                    let stored = User {
                        id: state.next_user_id()?,
                        ..incoming
                    };
                    state.snapshot.users.push(stored.clone());
                    Ok(stored)
                }
            })
            .await?;

        info!(id = %stored.id, "User saved");
        Ok(stored)
    }

    /// All user accounts, in insertion order.
    pub async fn list_users(&self) -> Vec<User> {
        self.state.read().await.snapshot.users.clone()
    }

    /// Find an account by username.
    pub async fn find_user_by_username(&self, username: &Username) -> Option<User> {
        self.state
            .read()
            .await
            .snapshot
            .users
            .iter()
            .find(|u| &u.username == username)
            .cloned()
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Run `change` against a staged copy of the state and publish it.
    ///
    /// An error from `change` discards the copy. A failed snapshot write still
    /// publishes it, so memory runs ahead of disk until the next write.
    async fn apply<T>(
        &self,
        persist: bool,
        change: impl FnOnce(&mut StoreState) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let writer = self.writer.lock().await;
        let mut staged = self.state.read().await.clone();
        let value = change(&mut staged)?;

        if !persist {
            *self.state.write().await = staged;
            return Ok(value);
        }

        let snapshot = staged.snapshot.clone();
        let result = match self.options.write_policy {
            WritePolicy::Serialized => {
                let result = self.file.persist(snapshot).await;
                *self.state.write().await = staged;
                drop(writer);
                result
            }
            WritePolicy::Interleaved => {
                *self.state.write().await = staged;
                drop(writer);
                self.file.persist(snapshot).await
            }
        };

        result.map_err(|e| {
            error!(error = %e, "Snapshot write failed; memory and disk diverge until the next write");
            StoreError::Persist(e)
        })?;
        Ok(value)
    }
}
