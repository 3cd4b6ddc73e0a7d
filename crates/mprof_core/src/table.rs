//! Per-type method tables
//!
//! `#[profiled]` gives every annotated type one static [`MethodTable`]. The
//! table lists the methods of the profiled `impl` block and holds the slot an
//! [`Interceptor`] is installed into. Generated wrappers call
//! [`MethodTable::enter`] before running the original body; the returned
//! [`CallGuard`] times the call only if an active interceptor is installed.

use parking_lot::RwLock;
use std::ptr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{ProfilerError, Result};
use crate::identity::MethodIdentity;
use crate::interceptor::{CallGuard, Interceptor};

/// Implemented by `#[profiled]` for every type whose methods are wrapped.
pub trait Instrumented {
    fn method_table() -> &'static MethodTable;
}

/// How a wrapped method receives its instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MethodKind {
    /// `&self`
    Ref,
    /// `&mut self`
    RefMut,
    /// `self`, `Box<Self>` and other by-value receivers
    Owned,
    /// No receiver
    Associated,
}

impl MethodKind {
    pub const fn is_static(self) -> bool {
        matches!(self, Self::Associated)
    }
}

/// Compile-time description of one wrapped method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodDecl {
    pub selector: &'static str,
    pub kind: MethodKind,
    /// False for methods declared without any `pub` visibility
    pub public: bool,
}

impl MethodDecl {
    pub const fn new(selector: &'static str, kind: MethodKind, public: bool) -> Self {
        Self {
            selector,
            kind,
            public,
        }
    }
}

pub struct MethodTable {
    owner: &'static str,
    methods: &'static [MethodDecl],
    // Set while `hook` holds an interceptor so unobserved calls skip the lock.
    armed: AtomicBool,
    sealed: AtomicBool,
    hook: RwLock<Option<Arc<Interceptor>>>,
}

impl MethodTable {
    pub const fn new(owner: &'static str, methods: &'static [MethodDecl]) -> Self {
        Self {
            owner,
            methods,
            armed: AtomicBool::new(false),
            sealed: AtomicBool::new(false),
            hook: parking_lot::const_rwlock(None),
        }
    }

    pub fn owner(&self) -> &'static str {
        self.owner
    }

    pub fn methods(&self) -> &'static [MethodDecl] {
        self.methods
    }

    pub fn identity(&self, index: usize) -> Option<MethodIdentity> {
        self.methods.get(index).map(|decl| self.identity_of(decl))
    }

    pub fn identity_of(&self, decl: &MethodDecl) -> MethodIdentity {
        MethodIdentity {
            owner: self.owner,
            selector: decl.selector,
            is_static: decl.kind.is_static(),
        }
    }

    pub fn identities(&self) -> impl Iterator<Item = MethodIdentity> + '_ {
        (0..self.methods.len()).filter_map(|index| self.identity(index))
    }

    /// Refuse every future interceptor installation.
    ///
    /// An interceptor that is already installed stays in place.
    pub fn seal(&self) {
        self.sealed.store(true, Ordering::Release);
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::Acquire)
    }

    /// Whether an interceptor currently owns this table
    pub fn is_wrapped(&self) -> bool {
        self.hook.read().is_some()
    }

    /// Install `interceptor` as this table's hook.
    ///
    /// Returns `Ok(false)` if it is already installed.
    pub(crate) fn install(&self, interceptor: &Arc<Interceptor>) -> Result<bool> {
        let mut hook = self.hook.write();
        match hook.as_ref() {
            Some(current) if Arc::ptr_eq(current, interceptor) => return Ok(false),
            Some(_) => return Err(ProfilerError::AlreadyOwned { owner: self.owner }),
            None => {}
        }

        if self.is_sealed() {
            return Err(ProfilerError::Sealed { owner: self.owner });
        }

        *hook = Some(Arc::clone(interceptor));
        self.armed.store(true, Ordering::Release);
        Ok(true)
    }

    /// Remove `interceptor` if it is the installed hook.
    pub(crate) fn uninstall(&self, interceptor: &Interceptor) -> bool {
        let mut hook = self.hook.write();
        let owned = hook
            .as_deref()
            .is_some_and(|current| ptr::eq(current, interceptor));
        if owned {
            *hook = None;
            self.armed.store(false, Ordering::Release);
        }
        owned
    }

    pub(crate) fn is_hooked_by(&self, interceptor: &Interceptor) -> bool {
        self.hook
            .read()
            .as_deref()
            .is_some_and(|current| ptr::eq(current, interceptor))
    }

    fn active_hook(&self) -> Option<Arc<Interceptor>> {
        if !self.armed.load(Ordering::Acquire) {
            return None;
        }
        // The guard is released before the wrapped body runs, so profiled
        // methods may call each other recursively.
        self.hook
            .read()
            .as_ref()
            .filter(|interceptor| interceptor.is_observing())
            .cloned()
    }

    /// Entry point of every generated wrapper.
    ///
    /// `decl` describes the method about to run. The wrapper keeps the guard
    /// alive across the original body, so the body runs directly in the
    /// wrapper's frame and `#[track_caller]` locations pass through.
    #[doc(hidden)]
    #[inline]
    pub fn enter(&'static self, decl: MethodDecl) -> CallGuard {
        match self.active_hook() {
            Some(interceptor) => CallGuard::start(interceptor, self.identity_of(&decl)),
            None => CallGuard::idle(),
        }
    }
}

impl std::fmt::Debug for MethodTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodTable")
            .field("owner", &self.owner)
            .field("methods", &self.methods)
            .field("sealed", &self.is_sealed())
            .field("wrapped", &self.is_wrapped())
            .finish()
    }
}
