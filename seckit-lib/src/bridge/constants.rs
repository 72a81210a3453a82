//! Fixed vocabulary of native constants.
//!
//! Every platform literal the library touches is named here. Every runtime
//! maps each entry to exactly one native object; nothing else in the
//! crate refers to platform symbols directly.

/// Attribute keys that may appear in a predicate or a result dictionary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttrKey {
    Class,
    Account,
    Service,
    Label,
    ApplicationTag,
    ApplicationLabel,
    KeyType,
    KeyClass,
    AccessControl,
    AccessGroup,
    TokenId,
    IsPermanent,
    PrivateKeyAttrs,
    MatchLimit,
    ReturnAttributes,
    ReturnData,
    ReturnRef,
    ValueData,
    ValueRef,
    AuthenticationContext,
    UseDataProtectionKeychain,
}

impl AttrKey {
    pub const ALL: [AttrKey; 21] = [
        AttrKey::Class,
        AttrKey::Account,
        AttrKey::Service,
        AttrKey::Label,
        AttrKey::ApplicationTag,
        AttrKey::ApplicationLabel,
        AttrKey::KeyType,
        AttrKey::KeyClass,
        AttrKey::AccessControl,
        AttrKey::AccessGroup,
        AttrKey::TokenId,
        AttrKey::IsPermanent,
        AttrKey::PrivateKeyAttrs,
        AttrKey::MatchLimit,
        AttrKey::ReturnAttributes,
        AttrKey::ReturnData,
        AttrKey::ReturnRef,
        AttrKey::ValueData,
        AttrKey::ValueRef,
        AttrKey::AuthenticationContext,
        AttrKey::UseDataProtectionKeychain,
    ];

    /// The string value of the platform constant.
    ///
    /// On macOS the constants are CFStrings with exactly these contents; the
    /// simulator uses the same text so traces read the same on both.
    pub const fn native_name(self) -> &'static str {
        match self {
            Self::Class => "class",
            Self::Account => "acct",
            Self::Service => "svce",
            Self::Label => "labl",
            Self::ApplicationTag => "atag",
            Self::ApplicationLabel => "klbl",
            Self::KeyType => "type",
            Self::KeyClass => "kcls",
            Self::AccessControl => "accc",
            Self::AccessGroup => "agrp",
            Self::TokenId => "tkid",
            Self::IsPermanent => "perm",
            Self::PrivateKeyAttrs => "private",
            Self::MatchLimit => "m_Limit",
            Self::ReturnAttributes => "r_Attributes",
            Self::ReturnData => "r_Data",
            Self::ReturnRef => "r_Ref",
            Self::ValueData => "v_Data",
            Self::ValueRef => "v_Ref",
            Self::AuthenticationContext => "u_AuthCtx",
            Self::UseDataProtectionKeychain => "nleg",
        }
    }
}

/// Named constant values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Symbol {
    ClassGenericPassword,
    ClassKey,
    KeyTypeEc,
    KeyClassPrivate,
    KeyClassPublic,
    MatchLimitOne,
    MatchLimitAll,
    TokenIdSecureEnclave,
    AccessibleWhenUnlockedThisDeviceOnly,
    EcdsaSignatureDigestX962Sha256,
}

impl Symbol {
    pub const ALL: [Symbol; 10] = [
        Symbol::ClassGenericPassword,
        Symbol::ClassKey,
        Symbol::KeyTypeEc,
        Symbol::KeyClassPrivate,
        Symbol::KeyClassPublic,
        Symbol::MatchLimitOne,
        Symbol::MatchLimitAll,
        Symbol::TokenIdSecureEnclave,
        Symbol::AccessibleWhenUnlockedThisDeviceOnly,
        Symbol::EcdsaSignatureDigestX962Sha256,
    ];

    pub const fn native_name(self) -> &'static str {
        match self {
            Self::ClassGenericPassword => "genp",
            Self::ClassKey => "keys",
            Self::KeyTypeEc => "73",
            Self::KeyClassPrivate => "1",
            Self::KeyClassPublic => "0",
            Self::MatchLimitOne => "m_LimitOne",
            Self::MatchLimitAll => "m_LimitAll",
            Self::TokenIdSecureEnclave => "com.apple.setoken",
            Self::AccessibleWhenUnlockedThisDeviceOnly => "aku",
            Self::EcdsaSignatureDigestX962Sha256 => "algid:sign:ECDSA:digest-X962:SHA256",
        }
    }
}

/// Any entry of the constant table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Constant {
    Key(AttrKey),
    Symbol(Symbol),
    True,
    False,
}

impl Constant {
    /// Every constant, in table order.
    pub fn all() -> impl Iterator<Item = Constant> {
        AttrKey::ALL
            .into_iter()
            .map(Constant::Key)
            .chain(Symbol::ALL.into_iter().map(Constant::Symbol))
            .chain([Constant::True, Constant::False])
    }
}

impl From<AttrKey> for Constant {
    fn from(key: AttrKey) -> Self {
        Constant::Key(key)
    }
}

impl From<Symbol> for Constant {
    fn from(symbol: Symbol) -> Self {
        Constant::Symbol(symbol)
    }
}

impl From<bool> for Constant {
    fn from(value: bool) -> Self {
        if value {
            Constant::True
        } else {
            Constant::False
        }
    }
}
