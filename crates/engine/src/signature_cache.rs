//! Signature cache
//!
//! Maps numeric call and enum ids to their signatures for one loaded trace.
//!
//! # Design
//!
//! - DashMap: sharded, so materializations on different threads rarely contend
//! - Written at most once per id (`entry().or_insert_with`)
//! - Owned by the loader; a reload starts from an empty cache
//!
//! Call signatures are wrapped in `CallSignature`, which also records the
//! argument that names a debug group, so grouping never has to search
//! argument names per call.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracedex_core::{ArgList, EnumSignature, Signature, Value};

/// Argument names that carry a debug-group label
const LABEL_ARG_NAMES: [&str; 4] = ["message", "marker", "label", "name"];

/// A call signature bound for one trace
#[derive(Debug)]
pub struct CallSignature {
    sig: Arc<Signature>,
    label_arg: Option<usize>,
}

impl CallSignature {
    /// Bind a decoded signature
    pub fn new(sig: Arc<Signature>) -> Self {
        let label_arg = sig
            .arg_names
            .iter()
            .position(|n| LABEL_ARG_NAMES.contains(&n.to_ascii_lowercase().as_str()));
        CallSignature { sig, label_arg }
    }

    /// Id of the signature
    pub fn id(&self) -> u32 {
        self.sig.id
    }

    /// Function name
    pub fn name(&self) -> &str {
        &self.sig.name
    }

    /// The decoded signature
    pub fn signature(&self) -> &Arc<Signature> {
        &self.sig
    }

    /// Index of the argument named like a debug-group label, if any
    pub fn label_arg(&self) -> Option<usize> {
        self.label_arg
    }
}

/// Cache statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Bound call signatures
    pub call_signatures: usize,
    /// Bound enum signatures
    pub enum_signatures: usize,
    /// Lookups answered from the cache
    pub hits: u64,
    /// Lookups that bound a new id
    pub misses: u64,
}

/// Id-indexed signature cache
#[derive(Debug, Default)]
pub struct SignatureCache {
    calls: DashMap<u32, Arc<CallSignature>>,
    enums: DashMap<u32, Arc<EnumSignature>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl SignatureCache {
    /// Empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached signature for `sig.id`, binding it on first sight
    ///
    /// Once an id is bound its entry never changes.
    pub fn bind(&self, sig: &Arc<Signature>) -> Arc<CallSignature> {
        if let Some(entry) = self.calls.get(&sig.id) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Arc::clone(entry.value());
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        let entry = self
            .calls
            .entry(sig.id)
            .or_insert_with(|| Arc::new(CallSignature::new(Arc::clone(sig))));
        Arc::clone(entry.value())
    }

    /// Cached enum signature for `sig.id`, binding it on first sight
    pub fn bind_enum(&self, sig: &Arc<EnumSignature>) -> Arc<EnumSignature> {
        let entry = self.enums.entry(sig.id).or_insert_with(|| Arc::clone(sig));
        Arc::clone(entry.value())
    }

    /// Replace every enum signature in `args` with the cached one
    pub fn intern_args(&self, args: &mut ArgList) {
        for arg in args.iter_mut() {
            self.intern_value(arg);
        }
    }

    fn intern_value(&self, value: &mut Value) {
        match value {
            Value::Enum { sig, .. } => *sig = self.bind_enum(sig),
            Value::Array(items) => {
                for item in items {
                    self.intern_value(item);
                }
            }
            _ => {}
        }
    }

    /// Look up a bound call signature
    pub fn get(&self, id: u32) -> Option<Arc<CallSignature>> {
        self.calls.get(&id).map(|e| Arc::clone(e.value()))
    }

    /// Number of bound call signatures
    pub fn len(&self) -> usize {
        self.calls.len()
    }

    /// Check if nothing is bound
    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Snapshot of cache statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            call_signatures: self.calls.len(),
            enum_signatures: self.enums.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    /// Forget every binding
    pub fn clear(&self) {
        self.calls.clear();
        self.enums.clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }
}
