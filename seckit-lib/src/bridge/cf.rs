//! CoreFoundation implementation of [`NativeRuntime`].

use std::ffi::{c_char, c_void, CString};

use core_foundation_sys::array::{
    kCFTypeArrayCallBacks, CFArrayCreate, CFArrayGetCount, CFArrayGetTypeID,
    CFArrayGetValueAtIndex,
};
use core_foundation_sys::base::{
    kCFAllocatorDefault, CFCopyTypeIDDescription, CFEqual, CFGetTypeID, CFIndex, CFRelease,
    CFRetain, CFTypeRef,
};
use core_foundation_sys::data::{CFDataCreate, CFDataGetBytePtr, CFDataGetLength, CFDataGetTypeID};
use core_foundation_sys::dictionary::{
    kCFTypeDictionaryKeyCallBacks, kCFTypeDictionaryValueCallBacks, CFDictionaryCreate,
    CFDictionaryGetCount, CFDictionaryGetKeysAndValues, CFDictionaryGetTypeID,
    CFDictionaryGetValueIfPresent,
};
use core_foundation_sys::number::{
    kCFBooleanFalse, kCFBooleanTrue, kCFNumberSInt64Type, CFBooleanGetTypeID, CFBooleanGetValue,
    CFNumberCreate,
};
use core_foundation_sys::string::{
    kCFStringEncodingUTF8, CFStringCreateWithCString, CFStringGetCString, CFStringGetLength,
    CFStringGetMaximumSizeForEncoding, CFStringGetTypeID, CFStringRef,
};

use security_framework_sys::access_control::{
    kSecAttrAccessibleWhenUnlockedThisDeviceOnly, SecAccessControlGetTypeID,
};
use security_framework_sys::item::*;
use security_framework_sys::key::{kSecKeyAlgorithmECDSASignatureDigestX962SHA256, SecKeyGetTypeID};

use super::constants::{AttrKey, Constant, Symbol};
use super::handle::RawRef;
use super::runtime::{NativeRuntime, NativeType};

/// The process-wide CoreFoundation object model.
pub struct CfRuntime {
    /// `kSecMatchLimit` takes a count; one is the same as a single match.
    limit_one: RawRef,
}

impl CfRuntime {
    pub fn new() -> Self {
        let one: i64 = 1;
        // SAFETY: `one` outlives the call, which copies it. Small numbers are
        // tagged pointers and do not allocate.
        let number = unsafe {
            CFNumberCreate(
                kCFAllocatorDefault,
                kCFNumberSInt64Type,
                &one as *const i64 as *const c_void,
            )
        };
        Self {
            limit_one: RawRef::from_addr(number as usize),
        }
    }

    fn resolve(&self, constant: Constant) -> RawRef {
        // SAFETY: the statics are initialised by the dynamic loader before
        // any Rust code runs and are never written to.
        let object: CFTypeRef = unsafe {
            match constant {
                Constant::True => kCFBooleanTrue as CFTypeRef,
                Constant::False => kCFBooleanFalse as CFTypeRef,
                Constant::Key(key) => attr_key(key) as CFTypeRef,
                Constant::Symbol(symbol) => self.symbol(symbol),
            }
        };
        RawRef::from_addr(object as usize)
    }

    unsafe fn symbol(&self, symbol: Symbol) -> CFTypeRef {
        let string: CFStringRef = match symbol {
            Symbol::MatchLimitOne => return self.limit_one.as_ptr(),
            Symbol::ClassGenericPassword => kSecClassGenericPassword,
            Symbol::ClassKey => kSecClassKey,
            Symbol::KeyTypeEc => kSecAttrKeyTypeEC,
            Symbol::KeyClassPrivate => kSecAttrKeyClassPrivate,
            Symbol::KeyClassPublic => kSecAttrKeyClassPublic,
            Symbol::MatchLimitAll => kSecMatchLimitAll,
            Symbol::TokenIdSecureEnclave => kSecAttrTokenIDSecureEnclave,
            Symbol::AccessibleWhenUnlockedThisDeviceOnly => {
                kSecAttrAccessibleWhenUnlockedThisDeviceOnly
            }
            Symbol::EcdsaSignatureDigestX962Sha256 => {
                kSecKeyAlgorithmECDSASignatureDigestX962SHA256
            }
        };
        string as CFTypeRef
    }
}

impl Default for CfRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CfRuntime {
    fn drop(&mut self) {
        if self.limit_one.addr() != 0 {
            // SAFETY: created in `new` under the create rule.
            unsafe { CFRelease(self.limit_one.as_ptr()) };
        }
    }
}

unsafe fn attr_key(key: AttrKey) -> CFStringRef {
    match key {
        AttrKey::Class => kSecClass,
        AttrKey::Account => kSecAttrAccount,
        AttrKey::Service => kSecAttrService,
        AttrKey::Label => kSecAttrLabel,
        AttrKey::ApplicationTag => kSecAttrApplicationTag,
        AttrKey::ApplicationLabel => kSecAttrApplicationLabel,
        AttrKey::KeyType => kSecAttrKeyType,
        AttrKey::KeyClass => kSecAttrKeyClass,
        AttrKey::AccessControl => kSecAttrAccessControl,
        AttrKey::AccessGroup => kSecAttrAccessGroup,
        AttrKey::TokenId => kSecAttrTokenID,
        AttrKey::IsPermanent => kSecAttrIsPermanent,
        AttrKey::PrivateKeyAttrs => kSecPrivateKeyAttrs,
        AttrKey::MatchLimit => kSecMatchLimit,
        AttrKey::ReturnAttributes => kSecReturnAttributes,
        AttrKey::ReturnData => kSecReturnData,
        AttrKey::ReturnRef => kSecReturnRef,
        AttrKey::ValueData => kSecValueData,
        AttrKey::ValueRef => kSecValueRef,
        AttrKey::AuthenticationContext => kSecUseAuthenticationContext,
        AttrKey::UseDataProtectionKeychain => kSecUseDataProtectionKeychain,
    }
}

pub(crate) unsafe fn cf_string_to_string(string: CFStringRef) -> Option<String> {
    let length = CFStringGetLength(string);
    let capacity = CFStringGetMaximumSizeForEncoding(length, kCFStringEncodingUTF8) + 1;
    let mut buffer = vec![0u8; usize::try_from(capacity).ok()?];
    let ok = CFStringGetCString(
        string,
        buffer.as_mut_ptr() as *mut c_char,
        capacity,
        kCFStringEncodingUTF8,
    );
    if ok == 0 {
        return None;
    }
    let end = buffer.iter().position(|b| *b == 0).unwrap_or(buffer.len());
    buffer.truncate(end);
    String::from_utf8(buffer).ok()
}

fn ptrs(refs: &[RawRef]) -> Vec<*const c_void> {
    refs.iter().map(|raw| raw.as_ptr::<c_void>()).collect()
}

impl NativeRuntime for CfRuntime {
    fn name(&self) -> &'static str {
        "corefoundation"
    }

    unsafe fn retain(&self, raw: RawRef) {
        CFRetain(raw.as_ptr());
    }

    unsafe fn release(&self, raw: RawRef) {
        CFRelease(raw.as_ptr());
    }

    unsafe fn type_of(&self, raw: RawRef) -> NativeType {
        let id = CFGetTypeID(raw.as_ptr());
        if id == CFDataGetTypeID() {
            NativeType::Data
        } else if id == CFStringGetTypeID() {
            NativeType::String
        } else if id == CFBooleanGetTypeID() {
            NativeType::Boolean
        } else if id == CFDictionaryGetTypeID() {
            NativeType::Dictionary
        } else if id == CFArrayGetTypeID() {
            NativeType::Array
        } else if id == SecKeyGetTypeID() {
            NativeType::Key
        } else if id == SecAccessControlGetTypeID() {
            NativeType::AccessControl
        } else {
            NativeType::Other
        }
    }

    unsafe fn type_description(&self, raw: RawRef) -> String {
        let description = CFCopyTypeIDDescription(CFGetTypeID(raw.as_ptr()));
        if description.is_null() {
            return String::from("<unknown>");
        }
        let text = cf_string_to_string(description);
        CFRelease(description as CFTypeRef);
        text.unwrap_or_else(|| String::from("<unknown>"))
    }

    unsafe fn equal(&self, a: RawRef, b: RawRef) -> bool {
        CFEqual(a.as_ptr(), b.as_ptr()) != 0
    }

    fn constant(&self, constant: Constant) -> RawRef {
        self.resolve(constant)
    }

    fn create_data(&self, bytes: &[u8]) -> Option<RawRef> {
        let length = CFIndex::try_from(bytes.len()).ok()?;
        // SAFETY: `bytes` is valid for `length` bytes and copied by the call.
        let data = unsafe { CFDataCreate(kCFAllocatorDefault, bytes.as_ptr(), length) };
        RawRef::from_ptr(data)
    }

    fn create_string(&self, text: &str) -> Option<RawRef> {
        let text = CString::new(text).ok()?;
        // SAFETY: `text` is NUL terminated and copied by the call.
        let string = unsafe {
            CFStringCreateWithCString(kCFAllocatorDefault, text.as_ptr(), kCFStringEncodingUTF8)
        };
        RawRef::from_ptr(string)
    }

    unsafe fn create_dictionary(&self, keys: &[RawRef], values: &[RawRef]) -> Option<RawRef> {
        if keys.len() != values.len() {
            return None;
        }
        let keys = ptrs(keys);
        let values = ptrs(values);
        let dict = CFDictionaryCreate(
            kCFAllocatorDefault,
            keys.as_ptr(),
            values.as_ptr(),
            CFIndex::try_from(keys.len()).ok()?,
            &kCFTypeDictionaryKeyCallBacks,
            &kCFTypeDictionaryValueCallBacks,
        );
        RawRef::from_ptr(dict)
    }

    unsafe fn create_array(&self, items: &[RawRef]) -> Option<RawRef> {
        let items = ptrs(items);
        let array = CFArrayCreate(
            kCFAllocatorDefault,
            items.as_ptr(),
            CFIndex::try_from(items.len()).ok()?,
            &kCFTypeArrayCallBacks,
        );
        RawRef::from_ptr(array)
    }

    unsafe fn data_bytes(&self, raw: RawRef) -> Option<Vec<u8>> {
        if self.type_of(raw) != NativeType::Data {
            return None;
        }
        let data = raw.as_ptr();
        let length = usize::try_from(CFDataGetLength(data)).ok()?;
        if length == 0 {
            return Some(Vec::new());
        }
        let bytes = CFDataGetBytePtr(data);
        Some(std::slice::from_raw_parts(bytes, length).to_vec())
    }

    unsafe fn string_text(&self, raw: RawRef) -> Option<String> {
        if self.type_of(raw) != NativeType::String {
            return None;
        }
        cf_string_to_string(raw.as_ptr())
    }

    unsafe fn boolean_value(&self, raw: RawRef) -> Option<bool> {
        if self.type_of(raw) != NativeType::Boolean {
            return None;
        }
        Some(CFBooleanGetValue(raw.as_ptr()))
    }

    unsafe fn array_items(&self, raw: RawRef) -> Option<Vec<RawRef>> {
        if self.type_of(raw) != NativeType::Array {
            return None;
        }
        let array = raw.as_ptr();
        let count = CFArrayGetCount(array);
        Some(
            (0..count)
                .filter_map(|index| RawRef::from_ptr(CFArrayGetValueAtIndex(array, index)))
                .collect(),
        )
    }

    unsafe fn dictionary_get(&self, dict: RawRef, key: RawRef) -> Option<RawRef> {
        if self.type_of(dict) != NativeType::Dictionary {
            return None;
        }
        let mut value: *const c_void = std::ptr::null();
        if CFDictionaryGetValueIfPresent(dict.as_ptr(), key.as_ptr(), &mut value) == 0 {
            return None;
        }
        RawRef::from_ptr(value)
    }

    unsafe fn dictionary_entries(&self, raw: RawRef) -> Option<Vec<(RawRef, RawRef)>> {
        if self.type_of(raw) != NativeType::Dictionary {
            return None;
        }
        let dict = raw.as_ptr();
        let count = usize::try_from(CFDictionaryGetCount(dict)).ok()?;
        let mut keys: Vec<*const c_void> = vec![std::ptr::null(); count];
        let mut values: Vec<*const c_void> = vec![std::ptr::null(); count];
        CFDictionaryGetKeysAndValues(dict, keys.as_mut_ptr(), values.as_mut_ptr());
        Some(
            keys.into_iter()
                .zip(values)
                .filter_map(|(k, v)| Some((RawRef::from_ptr(k)?, RawRef::from_ptr(v)?)))
                .collect(),
        )
    }
}
