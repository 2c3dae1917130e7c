use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::Error;

use super::{Middleware, MiddlewareChain};

/// Named middleware instances that routes refer to by name.
///
/// Names are resolved when the dispatcher is built, so a typo in a route
/// table fails at startup with [`Error::UnregisteredMiddleware`] instead of
/// on the first request that hits the route.
#[derive(Clone, Default)]
pub struct MiddlewareRegistry {
    entries: HashMap<String, Arc<dyn Middleware>>,
}

impl MiddlewareRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `name` to `middleware`, returning whatever it replaced.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        middleware: impl Middleware,
    ) -> Option<Arc<dyn Middleware>> {
        self.entries.insert(name.into(), Arc::new(middleware))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn Middleware>, Error> {
        self.entries
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnregisteredMiddleware(name.to_owned()))
    }

    /// Resolves `names` in order. Fails on the first unknown name.
    pub fn chain<I, S>(&self, names: I) -> Result<MiddlewareChain, Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names.into_iter().map(|name| self.get(name.as_ref())).collect()
    }

    pub fn len(&self) -> usize { self.entries.len() }
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
}

impl fmt::Debug for MiddlewareRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.entries.keys().collect();
        names.sort();
        f.debug_set().entries(names).finish()
    }
}
