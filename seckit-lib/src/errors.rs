//! Error types for trust store operations.
//!
//! The trust store reports failures as a flat space of numeric status codes.
//! This module folds that space into [`SecError`]: a closed enum with a named
//! [`Status`] for every documented code, a catch-all [`SecError::NativeStatus`]
//! carrying the raw value, and the library's own bridge and input failures.

use std::fmt;

use crate::backend::NativeError;

/// Documented trust store status codes.
///
/// The discriminants are the raw `OSStatus` values reported by the trust
/// store, so `status as i32` round-trips through [`Status::from_code`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Status {
    /// Function or operation not implemented
    Unimplemented = -4,
    /// One or more parameters were not valid
    Param = -50,
    /// Failed to allocate memory
    Allocate = -108,
    /// User canceled the operation
    UserCanceled = -128,
    /// The item has no access control
    NoAccessForItem = -25243,
    /// Invalid attempt to change the owner of an item
    InvalidOwnerEdit = -25244,
    /// No keychain is available
    NotAvailable = -25291,
    /// Read-only error
    ReadOnly = -25292,
    /// Authentication failed
    AuthFailed = -25293,
    /// The keychain could not be found
    NoSuchKeychain = -25294,
    /// The keychain is not valid
    InvalidKeychain = -25295,
    /// A keychain with the same name already exists
    DuplicateKeychain = -25296,
    /// The item already exists
    DuplicateItem = -25299,
    /// The item could not be found
    ItemNotFound = -25300,
    /// The item reference is invalid
    InvalidItemRef = -25304,
    /// The search reference is invalid
    InvalidSearchRef = -25305,
    /// User interaction is not allowed
    InteractionNotAllowed = -25308,
    /// The attribute is read-only
    ReadOnlyAttr = -25309,
    /// The version is incorrect
    WrongSecVersion = -25310,
    /// The data is not available
    DataNotAvailable = -25316,
    /// The data is not modifiable
    DataNotModifiable = -25317,
    /// Unable to decode the provided data
    Decode = -26275,
    /// A required entitlement is missing
    MissingEntitlement = -34018,
}

impl Status {
    /// The success status.
    pub const SUCCESS: i32 = 0;

    /// Every named status, in declaration order.
    pub const ALL: [Status; 23] = [
        Status::Unimplemented,
        Status::Param,
        Status::Allocate,
        Status::UserCanceled,
        Status::NoAccessForItem,
        Status::InvalidOwnerEdit,
        Status::NotAvailable,
        Status::ReadOnly,
        Status::AuthFailed,
        Status::NoSuchKeychain,
        Status::InvalidKeychain,
        Status::DuplicateKeychain,
        Status::DuplicateItem,
        Status::ItemNotFound,
        Status::InvalidItemRef,
        Status::InvalidSearchRef,
        Status::InteractionNotAllowed,
        Status::ReadOnlyAttr,
        Status::WrongSecVersion,
        Status::DataNotAvailable,
        Status::DataNotModifiable,
        Status::Decode,
        Status::MissingEntitlement,
    ];

    /// Look up the named status for a raw code.
    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.code() == code)
    }

    /// The raw status code.
    pub const fn code(self) -> i32 {
        self as i32
    }

    /// Fixed human-readable explanation.
    ///
    /// Wording follows `security error <code>` on macOS.
    pub const fn message(self) -> &'static str {
        match self {
            Self::Unimplemented => "function or operation not implemented",
            Self::Param => "one or more parameters passed to the function were not valid",
            Self::Allocate => "failed to allocate memory",
            Self::UserCanceled => "user canceled the operation",
            Self::NoAccessForItem => "the specified item has no access control",
            Self::InvalidOwnerEdit => "an invalid attempt to change the owner of an item",
            Self::NotAvailable => {
                "no keychain is available. You may need to restart your computer"
            }
            Self::ReadOnly => "read-only error",
            Self::AuthFailed => "the user name or passphrase you entered is not correct",
            Self::NoSuchKeychain => "the specified keychain could not be found",
            Self::InvalidKeychain => "the keychain is not valid",
            Self::DuplicateKeychain => "a keychain with the same name already exists",
            Self::DuplicateItem => "the specified item already exists in the keychain",
            Self::ItemNotFound => "the specified item could not be found in the keychain",
            Self::InvalidItemRef => "the item reference is invalid",
            Self::InvalidSearchRef => "the search reference is invalid",
            Self::InteractionNotAllowed => "user interaction is not allowed",
            Self::ReadOnlyAttr => "the attribute is read-only",
            Self::WrongSecVersion => "the version is incorrect",
            Self::DataNotAvailable => "the data is not available",
            Self::DataNotModifiable => "the data is not modifiable",
            Self::Decode => "unable to decode the provided data",
            Self::MissingEntitlement => "a required entitlement is missing",
        }
    }
}

/// Comprehensive error type for trust store operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecError {
    /// The trust store reported a documented status.
    Status(Status),

    /// The trust store reported a code outside the documented set.
    NativeStatus {
        /// Raw status code
        code: i32,
        /// Description attached to a native error object, if any
        description: Option<String>,
    },

    /// The caller supplied input the operation cannot act on.
    InvalidInput(String),

    /// The native runtime could not allocate a value.
    AllocationFailed,

    /// Text could not be represented as a native string.
    EncodingFailed,

    /// A predicate was rendered with no attributes.
    EmptyPredicate,

    /// A native result did not have the expected shape.
    MalformedResult(String),
}

impl SecError {
    /// Create an invalid input error.
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput(reason.into())
    }

    /// Create a malformed result error naming what was observed.
    pub fn malformed(observed: impl Into<String>) -> Self {
        Self::MalformedResult(observed.into())
    }

    /// Map a raw status code; any non-zero code is an error.
    pub fn from_code(code: i32) -> Self {
        match Status::from_code(code) {
            Some(status) => Self::Status(status),
            None => Self::NativeStatus {
                code,
                description: None,
            },
        }
    }

    /// The named status, if this error carries one.
    pub fn status(&self) -> Option<Status> {
        match self {
            Self::Status(status) => Some(*status),
            _ => None,
        }
    }

    /// The raw trust store code, for both named and unnamed statuses.
    pub fn code(&self) -> Option<i32> {
        match self {
            Self::Status(status) => Some(status.code()),
            Self::NativeStatus { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Returns true if no item matched.
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(Status::ItemNotFound)
    }

    /// Returns true if the item already existed, or more than one matched.
    pub fn is_duplicate(&self) -> bool {
        self.status() == Some(Status::DuplicateItem)
    }

    /// Returns true if the binary lacks the keychain entitlement.
    pub fn is_missing_entitlement(&self) -> bool {
        self.status() == Some(Status::MissingEntitlement)
    }

    /// Returns true if the user declined or failed an authentication prompt.
    pub fn is_auth_rejected(&self) -> bool {
        matches!(
            self.status(),
            Some(Status::UserCanceled | Status::AuthFailed)
        )
    }

    /// Operator-facing fix for environment conditions retrying cannot change.
    pub fn remediation(&self) -> Option<&'static str> {
        match self.status()? {
            Status::MissingEntitlement => Some(
                "ensure that your binary has been properly codesigned and has \
                 entitlements allowing keychain access",
            ),
            Status::InteractionNotAllowed => Some(
                "the operation needs an authentication prompt; run it from an \
                 interactive session or use a key created without user presence",
            ),
            _ => None,
        }
    }
}

impl fmt::Display for SecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status(status) => match self.remediation() {
                Some(fix) => write!(f, "{}: {} ({})", status.message(), fix, status.code()),
                None => write!(f, "{} ({})", status.message(), status.code()),
            },
            Self::NativeStatus {
                code,
                description: Some(description),
            } => write!(f, "keychain error ({}): {}", code, description),
            Self::NativeStatus { code, .. } => write!(f, "keychain error ({})", code),
            Self::InvalidInput(reason) => write!(f, "invalid input: {}", reason),
            Self::AllocationFailed => write!(f, "native value allocation failed"),
            Self::EncodingFailed => write!(f, "text cannot be represented as a native string"),
            Self::EmptyPredicate => write!(f, "predicate has no attributes"),
            Self::MalformedResult(observed) => {
                write!(f, "unexpected result type: {}", observed)
            }
        }
    }
}

impl std::error::Error for SecError {}

impl From<NativeError> for SecError {
    fn from(err: NativeError) -> Self {
        match Status::from_code(err.code) {
            Some(status) => Self::Status(status),
            None => Self::NativeStatus {
                code: err.code,
                description: err.description,
            },
        }
    }
}

/// Check a status code returned by the trust store.
pub fn check_status(code: i32) -> Result<(), SecError> {
    if code == Status::SUCCESS {
        Ok(())
    } else {
        Err(SecError::from_code(code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_maps_to_ok() {
        assert_eq!(check_status(0), Ok(()));
    }

    #[test]
    fn test_named_codes_round_trip() {
        for status in Status::ALL {
            assert_eq!(Status::from_code(status.code()), Some(status));
            assert_eq!(check_status(status.code()), Err(SecError::Status(status)));
        }
    }

    #[test]
    fn test_unknown_code_is_catch_all() {
        let err = SecError::from_code(-99999);
        assert_eq!(err.status(), None);
        assert_eq!(err.code(), Some(-99999));
        assert_eq!(err.to_string(), "keychain error (-99999)");
    }

    #[test]
    fn test_discriminant_checks() {
        assert!(SecError::from_code(-25300).is_not_found());
        assert!(SecError::from_code(-25299).is_duplicate());
        assert!(SecError::from_code(-34018).is_missing_entitlement());
        assert!(SecError::from_code(-128).is_auth_rejected());
        assert!(!SecError::EmptyPredicate.is_not_found());
    }

    #[test]
    fn test_display_includes_code() {
        let err = SecError::Status(Status::ItemNotFound);
        assert_eq!(
            err.to_string(),
            "the specified item could not be found in the keychain (-25300)"
        );
    }

    #[test]
    fn test_missing_entitlement_carries_remediation() {
        let err = SecError::from_code(-34018);
        assert!(err.remediation().is_some());
        assert!(err.to_string().contains("codesigned"));
        assert!(SecError::from_code(-25300).remediation().is_none());
    }

    #[test]
    fn test_native_error_object_keeps_description() {
        let err: SecError = NativeError::with_description(-67808, "bad key").into();
        assert_eq!(err.to_string(), "keychain error (-67808): bad key");

        let err: SecError = NativeError::new(-128).into();
        assert_eq!(err, SecError::Status(Status::UserCanceled));
    }
}
