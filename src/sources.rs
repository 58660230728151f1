//! User-supplied time-domain sources.
//!
//! A netlist source declared with the `external` keyword (`va0 a0 0 dc 0
//! external`) is evaluated by calling back into the host once per timestep.
//! The registry maps the source name to a function of simulated time.
//!
//! Names are stored as the engine's encoded bytes so the callback can look
//! them up straight from the C string without decoding or allocating.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::encoding;
use crate::error::Result;

/// A source waveform: simulated time in seconds -> value (V or A).
pub type SourceFn = Arc<dyn Fn(f64) -> f64 + Send + Sync>;

struct Entry {
    func: SourceFn,
    fallback: bool,
}

/// Outcome of one evaluation request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Lookup {
    /// A registered source produced this value.
    Found(f64),
    /// Unknown name. A zero fallback has now been installed for it.
    Missing,
}

#[derive(Default)]
pub struct SourceRegistry {
    entries: RwLock<HashMap<Box<[u8]>, Entry>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the source called `name`.
    pub fn insert(&self, name: &str, func: SourceFn) -> Result<()> {
        let key = encoding::encode_bytes(name)?.into_boxed_slice();
        self.entries.write().insert(
            key,
            Entry {
                func,
                fallback: false,
            },
        );
        Ok(())
    }

    /// Remove a source. Returns whether it was present.
    pub fn remove(&self, name: &str) -> Result<bool> {
        let key = encoding::encode_bytes(name)?;
        Ok(self.entries.write().remove(key.as_slice()).is_some())
    }

    pub fn contains(&self, name: &str) -> bool {
        match encoding::encode_bytes(name) {
            Ok(key) => self.entries.read().contains_key(key.as_slice()),
            Err(_) => false,
        }
    }

    /// Names with a user function behind them (fallbacks excluded).
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .entries
            .read()
            .iter()
            .filter(|(_, e)| !e.fallback)
            .map(|(k, _)| encoding::decode(k))
            .collect();
        names.sort();
        names
    }

    /// Names that missed and now evaluate to zero.
    pub fn fallbacks(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .entries
            .read()
            .iter()
            .filter(|(_, e)| e.fallback)
            .map(|(k, _)| encoding::decode(k))
            .collect();
        names.sort();
        names
    }

    /// Evaluate the source whose encoded name is `name` at `time`.
    ///
    /// The user function runs outside the lock, so it may itself register
    /// sources. Only the first miss for a name reports [`Lookup::Missing`];
    /// later requests hit the installed fallback and return `Found(0.0)`.
    pub fn evaluate(&self, name: &[u8], time: f64) -> Lookup {
        let func = self.entries.read().get(name).map(|e| Arc::clone(&e.func));
        if let Some(func) = func {
            return Lookup::Found(func(time));
        }

        let mut entries = self.entries.write();
        if let Some(e) = entries.get(name) {
            // Registered between the two locks.
            let func = Arc::clone(&e.func);
            drop(entries);
            return Lookup::Found(func(time));
        }
        entries.insert(
            name.into(),
            Entry {
                func: Arc::new(|_| 0.0),
                fallback: true,
            },
        );
        Lookup::Missing
    }
}
