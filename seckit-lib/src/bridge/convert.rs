use super::constants::{AttrKey, Constant};
use super::handle::{Borrowed, Owned, RawRef};
use super::runtime::{NativeRuntime, NativeType};
use crate::errors::SecError;
use crate::Result;

/// Conversions between Rust values and native values of one runtime.
///
/// Every value returned as [`Owned`] came from a create or copy call; every
/// [`Borrowed`] is a peek whose lifetime is tied to the handle it came from.
#[derive(Clone, Copy)]
pub struct Bridge<'rt> {
    rt: &'rt dyn NativeRuntime,
}

impl<'rt> Bridge<'rt> {
    pub fn new(rt: &'rt dyn NativeRuntime) -> Self {
        Self { rt }
    }

    pub fn runtime(&self) -> &'rt dyn NativeRuntime {
        self.rt
    }

    /// Peek at an entry of the constant table.
    pub fn constant(&self, constant: impl Into<Constant>) -> Borrowed<'rt, 'rt> {
        let raw = self.rt.constant(constant.into());
        // SAFETY: table constants are immortal for the runtime's lifetime.
        unsafe { Borrowed::peek(self.rt, raw) }
    }

    pub fn wrap_bytes(&self, bytes: &[u8]) -> Result<Owned<'rt>> {
        let raw = self
            .rt
            .create_data(bytes)
            .ok_or(SecError::AllocationFailed)?;
        // SAFETY: `create_data` follows the create rule.
        Ok(unsafe { Owned::adopt(self.rt, raw) })
    }

    pub fn wrap_text(&self, text: &str) -> Result<Owned<'rt>> {
        let raw = self
            .rt
            .create_string(text)
            .ok_or(SecError::EncodingFailed)?;
        // SAFETY: `create_string` follows the create rule.
        Ok(unsafe { Owned::adopt(self.rt, raw) })
    }

    /// Build an immutable attribute map.
    ///
    /// The map retains its own references; the inputs stay owned by whoever
    /// owned them before the call.
    pub fn build_predicate(&self, pairs: &[(Borrowed<'_, '_>, Borrowed<'_, '_>)]) -> Result<Owned<'rt>> {
        if pairs.is_empty() {
            return Err(SecError::EmptyPredicate);
        }
        let keys: Vec<RawRef> = pairs.iter().map(|(key, _)| key.raw()).collect();
        let values: Vec<RawRef> = pairs.iter().map(|(_, value)| value.raw()).collect();
        // SAFETY: every pair is borrowed from a live handle for the whole call.
        let raw = unsafe { self.rt.create_dictionary(&keys, &values) }
            .ok_or(SecError::AllocationFailed)?;
        // SAFETY: `create_dictionary` follows the create rule.
        Ok(unsafe { Owned::adopt(self.rt, raw) })
    }

    pub fn build_collection(&self, items: &[Borrowed<'_, '_>]) -> Result<Owned<'rt>> {
        let raw_items: Vec<RawRef> = items.iter().map(Borrowed::raw).collect();
        // SAFETY: every item is borrowed from a live handle for the whole call.
        let raw = unsafe { self.rt.create_array(&raw_items) }.ok_or(SecError::AllocationFailed)?;
        // SAFETY: `create_array` follows the create rule.
        Ok(unsafe { Owned::adopt(self.rt, raw) })
    }

    pub fn type_of(&self, handle: Borrowed<'_, '_>) -> NativeType {
        // SAFETY: a borrowed handle is live for its lifetime.
        unsafe { self.rt.type_of(handle.raw()) }
    }

    /// Platform type name of a value, for diagnostics.
    pub fn describe(&self, handle: Borrowed<'_, '_>) -> String {
        // SAFETY: a borrowed handle is live for its lifetime.
        unsafe { self.rt.type_description(handle.raw()) }
    }

    fn expect_type(&self, handle: Borrowed<'_, '_>, expected: NativeType) -> Result<()> {
        if self.type_of(handle) == expected {
            Ok(())
        } else {
            Err(SecError::malformed(self.describe(handle)))
        }
    }

    pub fn read_bytes(&self, handle: Borrowed<'_, '_>) -> Result<Vec<u8>> {
        self.expect_type(handle, NativeType::Data)?;
        // SAFETY: a borrowed handle is live for its lifetime.
        unsafe { self.rt.data_bytes(handle.raw()) }
            .ok_or_else(|| SecError::malformed(self.describe(handle)))
    }

    pub fn read_text(&self, handle: Borrowed<'_, '_>) -> Result<String> {
        self.expect_type(handle, NativeType::String)?;
        // SAFETY: a borrowed handle is live for its lifetime.
        unsafe { self.rt.string_text(handle.raw()) }
            .ok_or_else(|| SecError::malformed(self.describe(handle)))
    }

    pub fn read_bool(&self, handle: Borrowed<'_, '_>) -> Result<bool> {
        self.expect_type(handle, NativeType::Boolean)?;
        // SAFETY: a borrowed handle is live for its lifetime.
        unsafe { self.rt.boolean_value(handle.raw()) }
            .ok_or_else(|| SecError::malformed(self.describe(handle)))
    }

    /// Flatten a collection. An empty collection yields an empty vec.
    pub fn unwrap_collection<'a, 'r>(
        &self,
        handle: Borrowed<'a, 'r>,
    ) -> Result<Vec<Borrowed<'a, 'r>>> {
        self.expect_type(handle, NativeType::Array)?;
        // SAFETY: a borrowed handle is live for its lifetime.
        let items = unsafe { self.rt.array_items(handle.raw()) }
            .ok_or_else(|| SecError::malformed(self.describe(handle)))?;
        Ok(items
            .into_iter()
            // SAFETY: the array retains its elements for as long as it lives.
            .map(|raw| unsafe { Borrowed::peek(handle.runtime(), raw) })
            .collect())
    }

    /// Value of `key` in an attribute map, `None` when absent.
    pub fn predicate_value<'a, 'r>(
        &self,
        map: Borrowed<'a, 'r>,
        key: AttrKey,
    ) -> Result<Option<Borrowed<'a, 'r>>> {
        self.expect_type(map, NativeType::Dictionary)?;
        let key = self.rt.constant(Constant::Key(key));
        // SAFETY: `map` is live and `key` is an immortal constant.
        let value = unsafe { self.rt.dictionary_get(map.raw(), key) };
        // SAFETY: the map retains its values for as long as it lives.
        Ok(value.map(|raw| unsafe { Borrowed::peek(map.runtime(), raw) }))
    }

    pub fn predicate_entries<'a, 'r>(
        &self,
        map: Borrowed<'a, 'r>,
    ) -> Result<Vec<(Borrowed<'a, 'r>, Borrowed<'a, 'r>)>> {
        self.expect_type(map, NativeType::Dictionary)?;
        // SAFETY: a borrowed handle is live for its lifetime.
        let entries = unsafe { self.rt.dictionary_entries(map.raw()) }
            .ok_or_else(|| SecError::malformed(self.describe(map)))?;
        let rt = map.runtime();
        Ok(entries
            .into_iter()
            // SAFETY: the map retains its entries for as long as it lives.
            .map(|(k, v)| unsafe { (Borrowed::peek(rt, k), Borrowed::peek(rt, v)) })
            .collect())
    }

    /// Which table constant a value is equal to, if any.
    pub fn identify(&self, handle: Borrowed<'_, '_>) -> Option<Constant> {
        Constant::all().find(|constant| {
            let raw = self.rt.constant(*constant);
            // SAFETY: `handle` is live and `raw` is an immortal constant.
            unsafe { self.rt.equal(handle.raw(), raw) }
        })
    }

    /// Read an optional text attribute, treating absence as empty.
    pub(crate) fn text_attr(&self, map: Borrowed<'_, '_>, key: AttrKey) -> Result<String> {
        match self.predicate_value(map, key)? {
            Some(value) => self.read_text(value),
            None => Ok(String::new()),
        }
    }

    /// Read an optional data attribute, treating absence as empty.
    pub(crate) fn bytes_attr(&self, map: Borrowed<'_, '_>, key: AttrKey) -> Result<Vec<u8>> {
        match self.predicate_value(map, key)? {
            Some(value) => self.read_bytes(value),
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::{SimRuntime, Symbol};

    #[test]
    fn test_wrap_and_read_round_trip() {
        let rt = SimRuntime::new();
        let bridge = Bridge::new(&rt);
        {
            let data = bridge.wrap_bytes(b"hello").unwrap();
            let text = bridge.wrap_text("world").unwrap();
            assert_eq!(bridge.read_bytes(data.borrow()).unwrap(), b"hello");
            assert_eq!(bridge.read_text(text.borrow()).unwrap(), "world");
        }
        assert_eq!(rt.live_objects(), 0);
    }

    #[test]
    fn test_wrap_failures() {
        let rt = SimRuntime::new();
        let bridge = Bridge::new(&rt);
        assert_eq!(bridge.wrap_text("a\0b").unwrap_err(), SecError::EncodingFailed);
        rt.refuse_allocations(true);
        assert_eq!(bridge.wrap_bytes(b"x").unwrap_err(), SecError::AllocationFailed);
    }

    #[test]
    fn test_empty_predicate_rejected() {
        let rt = SimRuntime::new();
        let bridge = Bridge::new(&rt);
        assert_eq!(bridge.build_predicate(&[]).unwrap_err(), SecError::EmptyPredicate);
        assert_eq!(rt.live_objects(), 0);
    }

    #[test]
    fn test_predicate_retains_inputs() {
        let rt = SimRuntime::new();
        let bridge = Bridge::new(&rt);
        let service = bridge.wrap_text("svc").unwrap();
        let map = bridge
            .build_predicate(&[(bridge.constant(AttrKey::Service), service.borrow())])
            .unwrap();
        drop(service);

        let value = bridge.predicate_value(map.borrow(), AttrKey::Service).unwrap();
        assert_eq!(bridge.read_text(value.unwrap()).unwrap(), "svc");
        assert!(bridge
            .predicate_value(map.borrow(), AttrKey::Account)
            .unwrap()
            .is_none());

        drop(map);
        assert_eq!(rt.live_objects(), 0);
        assert_eq!(rt.violations(), 0);
    }

    #[test]
    fn test_wrong_type_is_malformed() {
        let rt = SimRuntime::new();
        let bridge = Bridge::new(&rt);
        let data = bridge.wrap_bytes(b"x").unwrap();
        assert_eq!(
            bridge.read_text(data.borrow()).unwrap_err(),
            SecError::malformed("CFData")
        );
        assert!(bridge.unwrap_collection(data.borrow()).is_err());
        assert!(bridge.predicate_value(data.borrow(), AttrKey::Label).is_err());
    }

    #[test]
    fn test_empty_collection() {
        let rt = SimRuntime::new();
        let bridge = Bridge::new(&rt);
        let array = bridge.build_collection(&[]).unwrap();
        assert!(bridge.unwrap_collection(array.borrow()).unwrap().is_empty());
    }

    #[test]
    fn test_identify_constants() {
        let rt = SimRuntime::new();
        let bridge = Bridge::new(&rt);
        let limit = bridge.constant(Symbol::MatchLimitAll);
        assert_eq!(
            bridge.identify(limit),
            Some(Constant::Symbol(Symbol::MatchLimitAll))
        );
        let yes = bridge.constant(true);
        assert!(bridge.read_bool(yes).unwrap());
        let other = bridge.wrap_text("not a constant").unwrap();
        assert_eq!(bridge.identify(other.borrow()), None);
    }
}
