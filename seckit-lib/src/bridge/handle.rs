//! Ownership-typed native handles.
//!
//! [`Owned`] holds one reference obtained under the create/copy rule and
//! releases it exactly once when dropped. [`Borrowed`] is a peek into a value
//! kept alive by something else; it has no release path at all, and its
//! lifetime is bounded by the container it was read from. The runtime
//! lifetime is tracked separately, so retaining a borrowed value yields an
//! [`Owned`] that outlives the container.

use std::fmt;
use std::marker::PhantomData;

use super::runtime::NativeRuntime;

/// An untyped reference into a native object graph.
///
/// A `RawRef` carries no ownership. It can only be minted inside this crate,
/// and every runtime operation that consumes one is `unsafe`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawRef(usize);

impl RawRef {
    pub(crate) const fn from_addr(addr: usize) -> Self {
        RawRef(addr)
    }

    /// Wrap a native pointer, rejecting null.
    #[cfg_attr(not(target_os = "macos"), allow(dead_code))]
    pub(crate) fn from_ptr<T>(ptr: *const T) -> Option<Self> {
        if ptr.is_null() {
            None
        } else {
            Some(RawRef(ptr as usize))
        }
    }

    pub(crate) const fn addr(self) -> usize {
        self.0
    }

    #[cfg_attr(not(target_os = "macos"), allow(dead_code))]
    pub(crate) fn as_ptr<T>(self) -> *const T {
        self.0 as *const T
    }
}

impl fmt::Debug for RawRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RawRef({:#x})", self.0)
    }
}

/// A native reference owned by the holder.
pub struct Owned<'rt> {
    raw: RawRef,
    rt: &'rt dyn NativeRuntime,
}

impl<'rt> Owned<'rt> {
    /// Take ownership of a reference returned by a create or copy call.
    ///
    /// # Safety
    ///
    /// `raw` must be a live reference produced by `rt` whose +1 retain count
    /// is transferred to the new handle. Nothing else may release it.
    pub(crate) unsafe fn adopt(rt: &'rt dyn NativeRuntime, raw: RawRef) -> Self {
        Owned { raw, rt }
    }

    pub fn raw(&self) -> RawRef {
        self.raw
    }

    pub fn runtime(&self) -> &'rt dyn NativeRuntime {
        self.rt
    }

    /// Peek at the value without transferring ownership.
    pub fn borrow(&self) -> Borrowed<'_, 'rt> {
        Borrowed {
            raw: self.raw,
            rt: self.rt,
            _container: PhantomData,
        }
    }

    /// Give up the reference without releasing it.
    ///
    /// The caller becomes responsible for the +1 count.
    #[cfg_attr(not(target_os = "macos"), allow(dead_code))]
    pub(crate) fn into_raw(self) -> RawRef {
        let raw = self.raw;
        std::mem::forget(self);
        raw
    }
}

impl Clone for Owned<'_> {
    fn clone(&self) -> Self {
        // SAFETY: `self` keeps `raw` alive for the duration of the retain.
        unsafe { self.rt.retain(self.raw) };
        Owned {
            raw: self.raw,
            rt: self.rt,
        }
    }
}

impl Drop for Owned<'_> {
    fn drop(&mut self) {
        // SAFETY: `Owned` is only built from a +1 reference and is the sole
        // releaser of it.
        unsafe { self.rt.release(self.raw) };
    }
}

impl fmt::Debug for Owned<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Owned").field(&self.raw).finish()
    }
}

/// A non-owning view of a native reference.
///
/// `'a` is the life of the container keeping the value alive, `'rt` the
/// life of the runtime that produced it.
#[derive(Clone, Copy)]
pub struct Borrowed<'a, 'rt> {
    raw: RawRef,
    rt: &'rt dyn NativeRuntime,
    _container: PhantomData<&'a ()>,
}

impl<'a, 'rt> Borrowed<'a, 'rt> {
    /// View a reference kept alive by a longer-lived container.
    ///
    /// # Safety
    ///
    /// `raw` must stay live for all of `'a`: either it is an immortal
    /// constant of `rt`, or it is held by a handle or collection that
    /// outlives `'a`.
    pub(crate) unsafe fn peek(rt: &'rt dyn NativeRuntime, raw: RawRef) -> Self {
        Borrowed {
            raw,
            rt,
            _container: PhantomData,
        }
    }

    pub fn raw(&self) -> RawRef {
        self.raw
    }

    pub fn runtime(&self) -> &'rt dyn NativeRuntime {
        self.rt
    }

    /// Retain the value, producing a handle that may outlive its container.
    pub fn to_owned(&self) -> Owned<'rt> {
        // SAFETY: the container keeps `raw` alive while we retain it, and the
        // retain produces exactly the +1 count `adopt` requires.
        unsafe {
            self.rt.retain(self.raw);
            Owned::adopt(self.rt, self.raw)
        }
    }
}

impl fmt::Debug for Borrowed<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Borrowed").field(&self.raw).finish()
    }
}
