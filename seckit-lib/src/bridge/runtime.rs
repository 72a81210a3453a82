use super::constants::Constant;
use super::handle::RawRef;

/// Broad type classes of native values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeType {
    Data,
    String,
    Boolean,
    Dictionary,
    Array,
    Key,
    AccessControl,
    AuthContext,
    Other,
}

/// A manually reference-counted native object model.
///
/// Constructors follow the create rule: the returned reference carries a +1
/// count that the caller must hand to [`Owned`](super::Owned). Accessors that
/// return references follow the get rule: the result stays owned by its
/// container and must not be released.
///
/// # Safety
///
/// Every `unsafe` method requires each `RawRef` argument to be live and to
/// have been produced by this runtime.
pub trait NativeRuntime: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    unsafe fn retain(&self, raw: RawRef);

    unsafe fn release(&self, raw: RawRef);

    unsafe fn type_of(&self, raw: RawRef) -> NativeType;

    /// Human-readable type name, as the platform reports it.
    unsafe fn type_description(&self, raw: RawRef) -> String;

    unsafe fn equal(&self, a: RawRef, b: RawRef) -> bool;

    /// Resolve an entry of the constant table. The result is immortal.
    fn constant(&self, constant: Constant) -> RawRef;

    fn create_data(&self, bytes: &[u8]) -> Option<RawRef>;

    /// `None` when the runtime cannot represent the text.
    fn create_string(&self, text: &str) -> Option<RawRef>;

    /// Keys and values are retained by the dictionary, not consumed.
    unsafe fn create_dictionary(&self, keys: &[RawRef], values: &[RawRef]) -> Option<RawRef>;

    /// Items are retained by the array, not consumed.
    unsafe fn create_array(&self, items: &[RawRef]) -> Option<RawRef>;

    unsafe fn data_bytes(&self, raw: RawRef) -> Option<Vec<u8>>;

    unsafe fn string_text(&self, raw: RawRef) -> Option<String>;

    unsafe fn boolean_value(&self, raw: RawRef) -> Option<bool>;

    /// Elements of an array, under the get rule.
    unsafe fn array_items(&self, raw: RawRef) -> Option<Vec<RawRef>>;

    /// Value for `key` in a dictionary, under the get rule.
    unsafe fn dictionary_get(&self, dict: RawRef, key: RawRef) -> Option<RawRef>;

    /// All entries of a dictionary, under the get rule.
    unsafe fn dictionary_entries(&self, raw: RawRef) -> Option<Vec<(RawRef, RawRef)>>;
}
