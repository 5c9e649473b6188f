//! In-memory cart storage with idle-cart eviction.
//!
//! Every cart is owned by exactly one store entry and mutated only through
//! [`CartStore::with_cart`], which locks the map, runs the closure, and
//! refreshes the idle timer. Handlers therefore never observe a cart
//! mid-mutation, and two requests for the same cart serialize on the lock.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use qvtbox_core::Cart;
use uuid::Uuid;

#[derive(Debug)]
struct CartEntry {
    cart: Cart,
    touched_at: Instant,
}

/// Shared handle to the cart map. Cloning is cheap, all clones see the
/// same carts.
#[derive(Debug, Clone, Default)]
pub struct CartStore {
    entries: Arc<Mutex<HashMap<Uuid, CartEntry>>>,
}

impl CartStore {
    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, CartEntry>> {
        // A poisoned lock only means a closure panicked; the carts
        // themselves are still sound.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Creates an empty cart and returns its id.
    pub fn create(&self) -> Uuid {
        let cart_id = Uuid::new_v4();
        self.lock().insert(
            cart_id,
            CartEntry {
                cart: Cart::new(),
                touched_at: Instant::now(),
            },
        );
        cart_id
    }

    /// Runs `f` against the cart, refreshing its idle timer. Returns `None`
    /// when no cart has that id.
    pub fn with_cart<T>(&self, cart_id: Uuid, f: impl FnOnce(&mut Cart) -> T) -> Option<T> {
        let mut entries = self.lock();
        let entry = entries.get_mut(&cart_id)?;
        entry.touched_at = Instant::now();
        Some(f(&mut entry.cart))
    }

    /// A clone of the cart as it stands. Reading counts as activity.
    pub fn snapshot(&self, cart_id: Uuid) -> Option<Cart> {
        self.with_cart(cart_id, |cart| cart.clone())
    }

    /// Empties the cart's lines, keeping the entry so later reads see an
    /// empty cart rather than a missing one. Returns whether a cart with
    /// that id existed; clearing an absent or already-empty cart is fine
    /// either way.
    pub fn clear_cart(&self, cart_id: Uuid) -> bool {
        self.with_cart(cart_id, Cart::clear).is_some()
    }

    /// Drops the cart entirely. Returns whether there was one to drop.
    pub fn remove(&self, cart_id: Uuid) -> bool {
        self.lock().remove(&cart_id).is_some()
    }

    /// Evicts carts idle for `ttl` or longer and returns how many went.
    pub fn sweep_idle(&self, ttl: Duration) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.touched_at.elapsed() < ttl);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
