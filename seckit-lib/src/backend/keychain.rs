//! The macOS keychain and Secure Enclave.
//!
//! Every call goes straight to Security.framework. Results follow the
//! create rule and are adopted into [`Owned`] handles on the spot; error
//! objects are converted to [`NativeError`] and released before returning.

use std::ptr;

use core_foundation_sys::base::{kCFAllocatorDefault, CFOptionFlags, CFRelease, CFTypeRef};
use core_foundation_sys::error::{CFErrorCopyDescription, CFErrorGetCode, CFErrorRef};
use objc2::rc::Retained;
use objc2_foundation::NSString;
use objc2_local_authentication::LAContext;
use security_framework_sys::access_control::SecAccessControlCreateWithFlags;
use security_framework_sys::base::SecKeyRef;
use security_framework_sys::key::{
    SecKeyCopyAttributes, SecKeyCopyPublicKey, SecKeyCreateRandomKey, SecKeyCreateSignature,
};
use security_framework_sys::keychain_item::{
    SecItemAdd, SecItemCopyMatching, SecItemDelete, SecItemUpdate,
};

use super::{AccessControlFlags, NativeError, TrustStore};
use crate::bridge::{cf_string_to_string, Borrowed, CfRuntime, Constant, NativeRuntime, Owned, RawRef, Symbol};
use crate::errors::Status;

/// Trust store backed by the data protection keychain.
///
/// The calling binary must be codesigned with a `keychain-access-groups`
/// entitlement, otherwise every call fails with the missing entitlement
/// status.
pub struct KeychainTrustStore {
    runtime: CfRuntime,
}

impl KeychainTrustStore {
    pub fn new() -> Self {
        Self {
            runtime: CfRuntime::new(),
        }
    }

    fn own(&self, ptr: CFTypeRef) -> Option<Owned<'_>> {
        // SAFETY: only called with results of create and copy functions.
        RawRef::from_ptr(ptr).map(|raw| unsafe { Owned::adopt(&self.runtime, raw) })
    }

    fn symbol(&self, symbol: Symbol) -> CFTypeRef {
        self.runtime.constant(Constant::Symbol(symbol)).as_ptr()
    }

    /// Adopt a create-rule result, or convert the error it came with.
    fn created(&self, result: CFTypeRef, error: CFErrorRef) -> Result<Owned<'_>, NativeError> {
        match self.own(result) {
            Some(owned) => {
                if !error.is_null() {
                    // SAFETY: the error out-parameter follows the create rule.
                    unsafe { CFRelease(error as CFTypeRef) };
                }
                Ok(owned)
            }
            // SAFETY: the error out-parameter follows the create rule.
            None => Err(unsafe { take_error(error) }),
        }
    }
}

impl Default for KeychainTrustStore {
    fn default() -> Self {
        Self::new()
    }
}

fn sec_key(key: Borrowed<'_, '_>) -> SecKeyRef {
    key.raw().addr() as SecKeyRef
}

/// Convert and release a `CFError`.
unsafe fn take_error(error: CFErrorRef) -> NativeError {
    if error.is_null() {
        return NativeError::with_description(Status::Param.code(), "call failed without an error");
    }
    let code = i32::try_from(CFErrorGetCode(error)).unwrap_or(Status::Param.code());
    let description = CFErrorCopyDescription(error);
    let text = if description.is_null() {
        None
    } else {
        let text = cf_string_to_string(description);
        CFRelease(description as CFTypeRef);
        text
    };
    CFRelease(error as CFTypeRef);
    NativeError { code, description: text }
}

impl TrustStore for KeychainTrustStore {
    fn runtime(&self) -> &dyn NativeRuntime {
        &self.runtime
    }

    fn item_add(&self, attributes: &Owned<'_>) -> i32 {
        // SAFETY: `attributes` is a live dictionary built by the bridge.
        unsafe { SecItemAdd(attributes.raw().as_ptr(), ptr::null_mut()) }
    }

    fn item_copy_matching(&self, query: &Owned<'_>) -> (i32, Option<Owned<'_>>) {
        let mut result: CFTypeRef = ptr::null();
        // SAFETY: `query` is a live dictionary built by the bridge.
        let status = unsafe { SecItemCopyMatching(query.raw().as_ptr(), &mut result) };
        (status, self.own(result))
    }

    fn item_update(&self, query: &Owned<'_>, changes: &Owned<'_>) -> i32 {
        // SAFETY: both are live dictionaries built by the bridge.
        unsafe { SecItemUpdate(query.raw().as_ptr(), changes.raw().as_ptr()) }
    }

    fn item_delete(&self, query: &Owned<'_>) -> i32 {
        // SAFETY: `query` is a live dictionary built by the bridge.
        unsafe { SecItemDelete(query.raw().as_ptr()) }
    }

    fn create_access_control(
        &self,
        protection: Symbol,
        flags: AccessControlFlags,
    ) -> Result<Owned<'_>, NativeError> {
        let mut error: CFErrorRef = ptr::null_mut();
        // SAFETY: `protection` resolves to an immortal framework constant.
        let access = unsafe {
            SecAccessControlCreateWithFlags(
                kCFAllocatorDefault,
                self.symbol(protection),
                flags.bits() as CFOptionFlags,
                &mut error,
            )
        };
        self.created(access as CFTypeRef, error)
    }

    fn create_random_key(&self, parameters: &Owned<'_>) -> Result<Owned<'_>, NativeError> {
        let mut error: CFErrorRef = ptr::null_mut();
        // SAFETY: `parameters` is a live dictionary built by the bridge.
        let key = unsafe { SecKeyCreateRandomKey(parameters.raw().as_ptr(), &mut error) };
        self.created(key as CFTypeRef, error)
    }

    fn copy_public_key(&self, key: Borrowed<'_, '_>) -> Option<Owned<'_>> {
        // SAFETY: `key` is live for the duration of the call.
        self.own(unsafe { SecKeyCopyPublicKey(sec_key(key)) } as CFTypeRef)
    }

    fn copy_key_attributes(&self, key: Borrowed<'_, '_>) -> Option<Owned<'_>> {
        // SAFETY: `key` is live for the duration of the call.
        self.own(unsafe { SecKeyCopyAttributes(sec_key(key)) } as CFTypeRef)
    }

    fn create_signature(
        &self,
        key: Borrowed<'_, '_>,
        algorithm: Symbol,
        digest: &Owned<'_>,
    ) -> Result<Owned<'_>, NativeError> {
        let mut error: CFErrorRef = ptr::null_mut();
        // SAFETY: `key` and `digest` are live; the algorithm is a constant.
        let signature = unsafe {
            SecKeyCreateSignature(
                sec_key(key),
                self.symbol(algorithm) as _,
                digest.raw().as_ptr(),
                &mut error,
            )
        };
        self.created(signature as CFTypeRef, error)
    }

    fn create_auth_context(&self, reason: &str) -> Result<Owned<'_>, NativeError> {
        // SAFETY: LAContext may be created and configured on any thread.
        let context = unsafe {
            let context = LAContext::new();
            context.setLocalizedReason(&NSString::from_str(reason));
            context
        };
        // The +1 reference from `new` moves into the handle. Objective-C
        // objects are toll-free with CFRetain and CFRelease.
        let raw = Retained::into_raw(context);
        self.own(raw as CFTypeRef).ok_or_else(|| {
            NativeError::with_description(Status::Allocate.code(), "could not create LAContext")
        })
    }
}
