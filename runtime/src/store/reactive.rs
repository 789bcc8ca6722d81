use std::{
    collections::{HashMap, HashSet},
    panic::{AssertUnwindSafe, catch_unwind},
    sync::{
        Arc, Mutex, PoisonError, RwLock, Weak,
        atomic::{AtomicU64, Ordering},
    },
};

use anyhow::Result;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use tracing::error;

use super::path::{WILDCARD, ancestors, get_at, set_at};
use super::state::default_state;

/// Receives the value at the subscribed path and the path that was written.
pub type Listener = Arc<dyn Fn(&Value, &str) -> Result<()> + Send + Sync>;

struct Registration {
    id: u64,
    listener: Listener,
}

struct StoreInner {
    state: RwLock<Value>,
    listeners: Mutex<HashMap<String, Vec<Registration>>>,
    next_id: AtomicU64,
}

struct Notification {
    key: String,
    value: Value,
    changed: String,
}

/// Path-addressed state tree with subscriptions. Cloning yields another
/// handle on the same tree.
///
/// The tree lock is held only while reading or writing; listeners run after
/// it is released so they may read or write the store themselves.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    pub fn new() -> Self {
        Self::with_state(default_state())
    }

    pub fn with_state(state: Value) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                state: RwLock::new(state),
                listeners: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn get(&self, path: &str) -> Option<Value> {
        let guard = self.inner.state.read().unwrap_or_else(PoisonError::into_inner);
        get_at(&guard, path).cloned()
    }

    pub fn get_as<T: DeserializeOwned>(&self, path: &str) -> Option<T> {
        self.get(path)
            .and_then(|value| serde_json::from_value(value).ok())
    }

    pub fn snapshot(&self) -> Value {
        self.inner
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set(&self, path: &str, value: Value) {
        self.set_many([(path, value)]);
    }

    pub fn set_serialized<T: Serialize>(&self, path: &str, value: &T) -> Result<()> {
        let value = serde_json::to_value(value)?;
        self.set(path, value);
        Ok(())
    }

    /// Applies every write before any listener runs. Exact-path listeners
    /// fire per write, shared ancestors fire once, wildcard listeners last.
    pub fn set_many<I, K>(&self, writes: I)
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let writes: Vec<(String, Value)> = writes
            .into_iter()
            .map(|(path, value)| (path.into(), value))
            .collect();
        if writes.is_empty() {
            return;
        }

        let subscribed = self.subscribed_paths();
        let notifications = {
            let mut guard = self.inner.state.write().unwrap_or_else(PoisonError::into_inner);
            for (path, value) in &writes {
                set_at(&mut guard, path, value.clone());
            }

            let mut out = Vec::new();
            for (path, value) in &writes {
                if subscribed.contains(path.as_str()) {
                    out.push(Notification {
                        key: path.clone(),
                        value: value.clone(),
                        changed: path.clone(),
                    });
                }
            }

            let mut seen = HashSet::new();
            for (path, _) in &writes {
                for ancestor in ancestors(path) {
                    if subscribed.contains(ancestor) && seen.insert(ancestor.to_string()) {
                        out.push(Notification {
                            key: ancestor.to_string(),
                            value: get_at(&guard, ancestor).cloned().unwrap_or(Value::Null),
                            changed: path.clone(),
                        });
                    }
                }
            }

            if subscribed.contains(WILDCARD) {
                for (path, value) in &writes {
                    out.push(Notification {
                        key: WILDCARD.to_string(),
                        value: value.clone(),
                        changed: path.clone(),
                    });
                }
            }
            out
        };

        for notification in notifications {
            self.notify(&notification);
        }
    }

    /// Swaps the whole tree for the default state, then tells every
    /// subscriber its fresh value. The changed path reported is `""`.
    pub fn reset(&self) {
        let subscribed = self.subscribed_paths();
        let notifications = {
            let mut guard = self.inner.state.write().unwrap_or_else(PoisonError::into_inner);
            *guard = default_state();

            let mut out: Vec<Notification> = subscribed
                .iter()
                .filter(|path| path.as_str() != WILDCARD)
                .map(|path| Notification {
                    key: path.clone(),
                    value: get_at(&guard, path).cloned().unwrap_or(Value::Null),
                    changed: String::new(),
                })
                .collect();
            out.sort_by(|a, b| a.key.cmp(&b.key));
            if subscribed.contains(WILDCARD) {
                out.push(Notification {
                    key: WILDCARD.to_string(),
                    value: guard.clone(),
                    changed: String::new(),
                });
            }
            out
        };

        for notification in notifications {
            self.notify(&notification);
        }
    }

    #[must_use = "dropping the subscription handle makes the listener impossible to remove"]
    pub fn subscribe<F>(&self, path: &str, listener: F) -> Subscription
    where
        F: Fn(&Value, &str) -> Result<()> + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let mut guard = self
            .inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        guard.entry(path.to_string()).or_default().push(Registration {
            id,
            listener: Arc::new(listener),
        });

        Subscription {
            id,
            path: path.to_string(),
            store: Arc::downgrade(&self.inner),
        }
    }

    fn subscribed_paths(&self) -> HashSet<String> {
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(_, registrations)| !registrations.is_empty())
            .map(|(path, _)| path.clone())
            .collect()
    }

    fn notify(&self, notification: &Notification) {
        let listeners: Vec<Listener> = {
            let guard = self
                .inner
                .listeners
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            guard
                .get(&notification.key)
                .map(|registrations| {
                    registrations
                        .iter()
                        .map(|registration| Arc::clone(&registration.listener))
                        .collect()
                })
                .unwrap_or_default()
        };

        for listener in listeners {
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                listener(&notification.value, &notification.changed)
            }));
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(err)) => error!(
                    path = %notification.key,
                    changed = %notification.changed,
                    error = %err,
                    "store listener failed"
                ),
                Err(_) => error!(
                    path = %notification.key,
                    changed = %notification.changed,
                    "store listener panicked"
                ),
            }
        }
    }
}

/// Handle returned by [`Store::subscribe`].
pub struct Subscription {
    id: u64,
    path: String,
    store: Weak<StoreInner>,
}

impl Subscription {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn unsubscribe(self) {
        let Some(inner) = self.store.upgrade() else {
            return;
        };
        let mut guard = inner.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(registrations) = guard.get_mut(&self.path) {
            registrations.retain(|registration| registration.id != self.id);
            if registrations.is_empty() {
                guard.remove(&self.path);
            }
        }
    }
}
