//! Simulated native object heap.
//!
//! Objects live in a slot table keyed by a monotonically increasing id, so a
//! released id is never handed out again and a stale reference is always
//! detectable. Containers retain their children and release them when they
//! die. Misuse (retaining or releasing a dead reference) is counted rather
//! than panicking so tests can assert on it.

use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::constants::Constant;
use super::handle::RawRef;
use super::runtime::{NativeRuntime, NativeType};

/// Payload of an opaque object (key, access control, auth context).
pub type Payload = Arc<dyn Any + Send + Sync>;

#[derive(Clone)]
enum SimObject {
    Data(Vec<u8>),
    String(String),
    Boolean(bool),
    Dictionary(Vec<(RawRef, RawRef)>),
    Array(Vec<RawRef>),
    Opaque { kind: NativeType, payload: Payload },
}

impl SimObject {
    fn kind(&self) -> NativeType {
        match self {
            SimObject::Data(_) => NativeType::Data,
            SimObject::String(_) => NativeType::String,
            SimObject::Boolean(_) => NativeType::Boolean,
            SimObject::Dictionary(_) => NativeType::Dictionary,
            SimObject::Array(_) => NativeType::Array,
            SimObject::Opaque { kind, .. } => *kind,
        }
    }
}

struct Slot {
    refs: usize,
    immortal: bool,
    object: SimObject,
}

#[derive(Default)]
struct Heap {
    next: usize,
    slots: HashMap<usize, Slot>,
}

impl Heap {
    fn insert(&mut self, object: SimObject, immortal: bool) -> RawRef {
        self.next += 1;
        self.slots.insert(
            self.next,
            Slot {
                refs: 1,
                immortal,
                object,
            },
        );
        RawRef::from_addr(self.next)
    }

    fn get(&self, raw: RawRef) -> Option<&SimObject> {
        self.slots.get(&raw.addr()).map(|slot| &slot.object)
    }

    fn retain(&mut self, raw: RawRef) -> bool {
        match self.slots.get_mut(&raw.addr()) {
            Some(slot) => {
                if !slot.immortal {
                    slot.refs += 1;
                }
                true
            }
            None => false,
        }
    }

    fn release(&mut self, raw: RawRef) -> bool {
        if !self.slots.contains_key(&raw.addr()) {
            return false;
        }
        let mut pending = vec![raw];
        while let Some(next) = pending.pop() {
            let Some(slot) = self.slots.get_mut(&next.addr()) else {
                continue;
            };
            if slot.immortal {
                continue;
            }
            slot.refs -= 1;
            if slot.refs > 0 {
                continue;
            }
            if let Some(dead) = self.slots.remove(&next.addr()) {
                match dead.object {
                    SimObject::Dictionary(entries) => {
                        for (key, value) in entries {
                            pending.push(key);
                            pending.push(value);
                        }
                    }
                    SimObject::Array(items) => pending.extend(items),
                    _ => {}
                }
            }
        }
        true
    }

    fn equal(&self, a: RawRef, b: RawRef) -> bool {
        if a == b {
            return true;
        }
        let (Some(x), Some(y)) = (self.get(a), self.get(b)) else {
            return false;
        };
        match (x, y) {
            (SimObject::Data(p), SimObject::Data(q)) => p == q,
            (SimObject::String(p), SimObject::String(q)) => p == q,
            (SimObject::Boolean(p), SimObject::Boolean(q)) => p == q,
            (SimObject::Array(p), SimObject::Array(q)) => {
                p.len() == q.len() && p.iter().zip(q).all(|(l, r)| self.equal(*l, *r))
            }
            (SimObject::Dictionary(p), SimObject::Dictionary(q)) => {
                p.len() == q.len()
                    && p.iter().all(|(k, v)| {
                        q.iter()
                            .any(|(k2, v2)| self.equal(*k, *k2) && self.equal(*v, *v2))
                    })
            }
            // Opaque objects compare by identity only.
            _ => false,
        }
    }

    fn lookup(&self, dict: RawRef, key: RawRef) -> Option<RawRef> {
        match self.get(dict)? {
            SimObject::Dictionary(entries) => entries
                .iter()
                .find(|(k, _)| self.equal(*k, key))
                .map(|(_, v)| *v),
            _ => None,
        }
    }
}

/// In-process implementation of [`NativeRuntime`].
pub struct SimRuntime {
    heap: Mutex<Heap>,
    constants: HashMap<Constant, RawRef>,
    violations: AtomicUsize,
    refuse_allocations: AtomicBool,
}

impl SimRuntime {
    pub fn new() -> Self {
        let mut heap = Heap::default();
        let constants = Constant::all()
            .map(|constant| {
                let object = match constant {
                    Constant::Key(key) => SimObject::String(key.native_name().to_owned()),
                    Constant::Symbol(symbol) => {
                        SimObject::String(symbol.native_name().to_owned())
                    }
                    Constant::True => SimObject::Boolean(true),
                    Constant::False => SimObject::Boolean(false),
                };
                (constant, heap.insert(object, true))
            })
            .collect();

        Self {
            heap: Mutex::new(heap),
            constants,
            violations: AtomicUsize::new(0),
            refuse_allocations: AtomicBool::new(false),
        }
    }

    fn heap(&self) -> MutexGuard<'_, Heap> {
        self.heap.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn violation(&self, what: &str, raw: RawRef) {
        self.violations.fetch_add(1, Ordering::SeqCst);
        #[cfg(feature = "tracing")]
        tracing::error!(?raw, "ownership violation: {} of a dead reference", what);
        #[cfg(not(feature = "tracing"))]
        let _ = (what, raw);
    }

    /// Number of live objects, not counting the constant table.
    pub fn live_objects(&self) -> usize {
        self.heap().slots.values().filter(|slot| !slot.immortal).count()
    }

    /// Number of retains or releases of dead references observed so far.
    pub fn violations(&self) -> usize {
        self.violations.load(Ordering::SeqCst)
    }

    /// Make the public constructors fail, as under memory pressure.
    pub fn refuse_allocations(&self, refuse: bool) {
        self.refuse_allocations.store(refuse, Ordering::SeqCst);
    }

    fn refusing(&self) -> bool {
        self.refuse_allocations.load(Ordering::SeqCst)
    }

    // Allocation helpers used by the simulated trust store. They always
    // succeed and return +1 references.

    pub(crate) fn alloc_data(&self, bytes: &[u8]) -> RawRef {
        self.heap().insert(SimObject::Data(bytes.to_vec()), false)
    }

    pub(crate) fn alloc_string(&self, text: &str) -> RawRef {
        self.heap().insert(SimObject::String(text.to_owned()), false)
    }

    pub(crate) fn alloc_dictionary(&self, entries: Vec<(RawRef, RawRef)>) -> RawRef {
        let mut heap = self.heap();
        let (kept, dead): (Vec<_>, Vec<_>) = entries
            .into_iter()
            .partition(|(key, value)| heap.get(*key).is_some() && heap.get(*value).is_some());
        for (key, value) in &kept {
            heap.retain(*key);
            heap.retain(*value);
        }
        let raw = heap.insert(SimObject::Dictionary(kept), false);
        drop(heap);
        for (key, _) in dead {
            self.violation("dictionary insert", key);
        }
        raw
    }

    pub(crate) fn alloc_array(&self, items: Vec<RawRef>) -> RawRef {
        let mut heap = self.heap();
        let (kept, dead): (Vec<_>, Vec<_>) =
            items.into_iter().partition(|item| heap.get(*item).is_some());
        for item in &kept {
            heap.retain(*item);
        }
        let raw = heap.insert(SimObject::Array(kept), false);
        drop(heap);
        for item in dead {
            self.violation("array insert", item);
        }
        raw
    }

    pub(crate) fn alloc_opaque(&self, kind: NativeType, payload: Payload) -> RawRef {
        self.heap().insert(SimObject::Opaque { kind, payload }, false)
    }

    // Safe readers. A dead or mistyped reference reads as `None`.

    pub(crate) fn kind(&self, raw: RawRef) -> Option<NativeType> {
        self.heap().get(raw).map(SimObject::kind)
    }

    pub(crate) fn data(&self, raw: RawRef) -> Option<Vec<u8>> {
        match self.heap().get(raw)? {
            SimObject::Data(bytes) => Some(bytes.clone()),
            _ => None,
        }
    }

    pub(crate) fn text(&self, raw: RawRef) -> Option<String> {
        match self.heap().get(raw)? {
            SimObject::String(text) => Some(text.clone()),
            _ => None,
        }
    }

    pub(crate) fn boolean(&self, raw: RawRef) -> Option<bool> {
        match self.heap().get(raw)? {
            SimObject::Boolean(value) => Some(*value),
            _ => None,
        }
    }

    pub(crate) fn entries(&self, raw: RawRef) -> Option<Vec<(RawRef, RawRef)>> {
        match self.heap().get(raw)? {
            SimObject::Dictionary(entries) => Some(entries.clone()),
            _ => None,
        }
    }

    /// Which table constant, if any, `raw` is equal to.
    pub(crate) fn identify(&self, raw: RawRef) -> Option<Constant> {
        let heap = self.heap();
        self.constants
            .iter()
            .find(|(_, constant)| heap.equal(raw, **constant))
            .map(|(constant, _)| *constant)
    }

    pub(crate) fn opaque<T: Any + Send + Sync>(&self, raw: RawRef) -> Option<Arc<T>> {
        match self.heap().get(raw)? {
            SimObject::Opaque { payload, .. } => Arc::clone(payload).downcast::<T>().ok(),
            _ => None,
        }
    }

    pub(crate) fn table(&self, constant: Constant) -> RawRef {
        // The table is filled for every constant in `new`.
        self.constants
            .get(&constant)
            .copied()
            .unwrap_or(RawRef::from_addr(0))
    }
}

impl Default for SimRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeRuntime for SimRuntime {
    fn name(&self) -> &'static str {
        "simulator"
    }

    unsafe fn retain(&self, raw: RawRef) {
        if !self.heap().retain(raw) {
            self.violation("retain", raw);
        }
    }

    unsafe fn release(&self, raw: RawRef) {
        if !self.heap().release(raw) {
            self.violation("release", raw);
        }
    }

    unsafe fn type_of(&self, raw: RawRef) -> NativeType {
        self.kind(raw).unwrap_or(NativeType::Other)
    }

    unsafe fn type_description(&self, raw: RawRef) -> String {
        let name = match self.kind(raw) {
            Some(NativeType::Data) => "CFData",
            Some(NativeType::String) => "CFString",
            Some(NativeType::Boolean) => "CFBoolean",
            Some(NativeType::Dictionary) => "CFDictionary",
            Some(NativeType::Array) => "CFArray",
            Some(NativeType::Key) => "SecKey",
            Some(NativeType::AccessControl) => "SecAccessControl",
            Some(NativeType::AuthContext) => "LAContext",
            Some(NativeType::Other) => "CFType",
            None => "<released>",
        };
        name.to_owned()
    }

    unsafe fn equal(&self, a: RawRef, b: RawRef) -> bool {
        self.heap().equal(a, b)
    }

    fn constant(&self, constant: Constant) -> RawRef {
        self.table(constant)
    }

    fn create_data(&self, bytes: &[u8]) -> Option<RawRef> {
        if self.refusing() {
            return None;
        }
        Some(self.alloc_data(bytes))
    }

    fn create_string(&self, text: &str) -> Option<RawRef> {
        if self.refusing() || text.contains('\0') {
            return None;
        }
        Some(self.alloc_string(text))
    }

    unsafe fn create_dictionary(&self, keys: &[RawRef], values: &[RawRef]) -> Option<RawRef> {
        if self.refusing() || keys.len() != values.len() {
            return None;
        }
        let entries = keys.iter().copied().zip(values.iter().copied()).collect();
        Some(self.alloc_dictionary(entries))
    }

    unsafe fn create_array(&self, items: &[RawRef]) -> Option<RawRef> {
        if self.refusing() {
            return None;
        }
        Some(self.alloc_array(items.to_vec()))
    }

    unsafe fn data_bytes(&self, raw: RawRef) -> Option<Vec<u8>> {
        self.data(raw)
    }

    unsafe fn string_text(&self, raw: RawRef) -> Option<String> {
        self.text(raw)
    }

    unsafe fn boolean_value(&self, raw: RawRef) -> Option<bool> {
        self.boolean(raw)
    }

    unsafe fn array_items(&self, raw: RawRef) -> Option<Vec<RawRef>> {
        match self.heap().get(raw)? {
            SimObject::Array(items) => Some(items.clone()),
            _ => None,
        }
    }

    unsafe fn dictionary_get(&self, dict: RawRef, key: RawRef) -> Option<RawRef> {
        self.heap().lookup(dict, key)
    }

    unsafe fn dictionary_entries(&self, raw: RawRef) -> Option<Vec<(RawRef, RawRef)>> {
        self.entries(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::{AttrKey, Symbol};

    #[test]
    fn test_constants_do_not_count_as_live() {
        let rt = SimRuntime::new();
        assert_eq!(rt.live_objects(), 0);
        unsafe { rt.release(rt.constant(Constant::True)) };
        assert_eq!(rt.violations(), 0);
    }

    #[test]
    fn test_dictionary_release_cascades() {
        let rt = SimRuntime::new();
        let key = rt.alloc_string("k");
        let value = rt.alloc_data(b"v");
        let dict = rt.alloc_dictionary(vec![(key, value)]);
        unsafe {
            rt.release(key);
            rt.release(value);
        }
        assert_eq!(rt.live_objects(), 3);
        unsafe { rt.release(dict) };
        assert_eq!(rt.live_objects(), 0);
        assert_eq!(rt.violations(), 0);
    }

    #[test]
    fn test_double_release_is_recorded() {
        let rt = SimRuntime::new();
        let raw = rt.alloc_data(b"x");
        unsafe {
            rt.release(raw);
            rt.release(raw);
        }
        assert_eq!(rt.violations(), 1);
    }

    #[test]
    fn test_ids_are_not_reused() {
        let rt = SimRuntime::new();
        let first = rt.alloc_data(b"x");
        unsafe { rt.release(first) };
        let second = rt.alloc_data(b"x");
        assert_ne!(first, second);
        assert_eq!(rt.data(first), None);
        unsafe { rt.release(second) };
    }

    #[test]
    fn test_deep_equality() {
        let rt = SimRuntime::new();
        let a = rt.alloc_string("svce");
        let b = rt.alloc_string("svce");
        assert!(unsafe { rt.equal(a, b) });
        assert_eq!(rt.identify(a), Some(Constant::Key(AttrKey::Service)));
        assert_eq!(
            rt.identify(rt.constant(Symbol::ClassKey.into())),
            Some(Constant::Symbol(Symbol::ClassKey))
        );
        unsafe {
            rt.release(a);
            rt.release(b);
        }
    }

    #[test]
    fn test_string_rejects_nul() {
        let rt = SimRuntime::new();
        assert!(rt.create_string("a\0b").is_none());
        assert_eq!(rt.live_objects(), 0);
    }

    #[test]
    fn test_refused_allocation() {
        let rt = SimRuntime::new();
        rt.refuse_allocations(true);
        assert!(rt.create_data(b"x").is_none());
        rt.refuse_allocations(false);
        let raw = rt.create_data(b"x");
        assert!(raw.is_some());
        if let Some(raw) = raw {
            unsafe { rt.release(raw) };
        }
    }

    #[test]
    fn test_opaque_downcast() {
        let rt = SimRuntime::new();
        let raw = rt.alloc_opaque(NativeType::Key, Arc::new(42u32));
        assert_eq!(rt.opaque::<u32>(raw).as_deref(), Some(&42));
        assert!(rt.opaque::<String>(raw).is_none());
        assert_eq!(rt.kind(raw), Some(NativeType::Key));
        unsafe { rt.release(raw) };
        assert_eq!(rt.live_objects(), 0);
    }
}
