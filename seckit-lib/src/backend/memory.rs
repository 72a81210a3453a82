//! In-memory trust store for tests and for hosts without a keychain.
//!
//! Items live in a process-local list and are gone when the store is dropped.
//! Queries arrive as native dictionaries built by the bridge and are parsed
//! back out of the simulated heap, so everything above the [`TrustStore`]
//! seam runs exactly as it would against the real keychain.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use p256::ecdsa::signature::hazmat::PrehashSigner;
use p256::ecdsa::{Signature, SigningKey};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::PublicKey;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use super::{AccessControlFlags, NativeError, TrustStore};
use crate::bridge::{
    AttrKey, Borrowed, Constant, NativeRuntime, NativeType, Owned, RawRef, SimRuntime, Symbol,
};
use crate::enclave::digest_to_field;
use crate::errors::Status;

const PARAM: i32 = Status::Param.code();
const NOT_FOUND: i32 = Status::ItemNotFound.code();
const DUPLICATE: i32 = Status::DuplicateItem.code();
const MISSING_ENTITLEMENT: i32 = Status::MissingEntitlement.code();
const UNIMPLEMENTED: i32 = Status::Unimplemented.code();

/// How the simulated user answers authentication prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Authenticator {
    /// The user authenticates successfully.
    #[default]
    Approve,
    /// The user dismisses the prompt.
    Cancel,
    /// The user fails biometry and passcode.
    Fail,
    /// No prompt can be shown (background or CI process).
    NonInteractive,
}

impl Authenticator {
    fn evaluate(self) -> i32 {
        match self {
            Self::Approve => 0,
            Self::Cancel => Status::UserCanceled.code(),
            Self::Fail => Status::AuthFailed.code(),
            Self::NonInteractive => Status::InteractionNotAllowed.code(),
        }
    }
}

struct SimKey {
    signing: SigningKey,
    point: Vec<u8>,
    application_label: Vec<u8>,
    tag: Vec<u8>,
    label: Option<String>,
    user_presence: bool,
}

/// Reference to a private key, as returned by a lookup.
struct SimKeyRef {
    key: Arc<SimKey>,
    context: Option<Arc<SimAuthContext>>,
}

struct SimPublicKey {
    point: Vec<u8>,
    application_label: Vec<u8>,
}

struct SimAccessControl {
    flags: AccessControlFlags,
}

struct SimAuthContext {
    reason: String,
    outcome: Mutex<Option<i32>>,
}

struct StoredItem {
    class: Symbol,
    account: Option<String>,
    service: Option<String>,
    label: Option<String>,
    tag: Option<Vec<u8>>,
    application_label: Option<Vec<u8>>,
    access_group: Option<String>,
    key_type: Option<Symbol>,
    key_class: Option<Symbol>,
    data: Option<Zeroizing<Vec<u8>>>,
    key: Option<Arc<SimKey>>,
}

#[derive(Default)]
struct Query {
    class: Option<Symbol>,
    account: Option<String>,
    service: Option<String>,
    label: Option<String>,
    tag: Option<Vec<u8>>,
    application_label: Option<Vec<u8>>,
    access_group: Option<String>,
    key_type: Option<Symbol>,
    key_class: Option<Symbol>,
    token_id: Option<Symbol>,
    permanent: bool,
    match_limit: Option<Symbol>,
    return_attributes: bool,
    return_data: bool,
    return_ref: bool,
    value_data: Option<Zeroizing<Vec<u8>>>,
    data_protection: bool,
    auth_context: Option<Arc<SimAuthContext>>,
    access_control: Option<Arc<SimAccessControl>>,
    private_attrs: Option<Box<Query>>,
}

fn filter_matches<T: PartialEq>(filter: &Option<T>, value: &Option<T>) -> bool {
    match filter {
        Some(wanted) => value.as_ref() == Some(wanted),
        None => true,
    }
}

impl Query {
    fn matches(&self, item: &StoredItem) -> bool {
        self.class == Some(item.class)
            && filter_matches(&self.account, &item.account)
            && filter_matches(&self.service, &item.service)
            && filter_matches(&self.label, &item.label)
            && filter_matches(&self.tag, &item.tag)
            && filter_matches(&self.application_label, &item.application_label)
            && filter_matches(&self.access_group, &item.access_group)
            && filter_matches(&self.key_type, &item.key_type)
            && filter_matches(&self.key_class, &item.key_class)
    }

    fn match_all(&self) -> bool {
        self.match_limit == Some(Symbol::MatchLimitAll)
    }

    fn return_flags(&self) -> usize {
        [self.return_attributes, self.return_data, self.return_ref]
            .iter()
            .filter(|flag| **flag)
            .count()
    }
}

/// Simulated trust store over a [`SimRuntime`] heap.
pub struct InMemoryTrustStore {
    runtime: SimRuntime,
    items: Mutex<Vec<StoredItem>>,
    entitlements: Option<Vec<String>>,
    authenticator: Mutex<Authenticator>,
    calls: AtomicUsize,
    prompts: AtomicUsize,
    malformed_results: AtomicBool,
}

impl InMemoryTrustStore {
    /// A store with no entitlement restrictions whose user approves prompts.
    pub fn new() -> Self {
        Self {
            runtime: SimRuntime::new(),
            items: Mutex::new(Vec::new()),
            entitlements: None,
            authenticator: Mutex::new(Authenticator::Approve),
            calls: AtomicUsize::new(0),
            prompts: AtomicUsize::new(0),
            malformed_results: AtomicBool::new(false),
        }
    }

    /// Behave like a binary signed with exactly these access groups.
    ///
    /// An empty list models an unsigned binary: any data protection keychain
    /// request is refused with the missing entitlement status.
    pub fn with_entitlements<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entitlements = Some(groups.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_authenticator(self, authenticator: Authenticator) -> Self {
        self.set_authenticator(authenticator);
        self
    }

    pub fn set_authenticator(&self, authenticator: Authenticator) {
        *self
            .authenticator
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = authenticator;
    }

    /// Append a non-dictionary element to every collection result.
    pub fn inject_malformed_results(&self, enabled: bool) {
        self.malformed_results.store(enabled, Ordering::SeqCst);
    }

    /// The simulated heap, for leak accounting.
    pub fn sim(&self) -> &SimRuntime {
        &self.runtime
    }

    /// Number of trust store calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of authentication prompts shown so far.
    pub fn prompts(&self) -> usize {
        self.prompts.load(Ordering::SeqCst)
    }

    /// Number of stored items.
    pub fn item_count(&self) -> usize {
        self.items().len()
    }

    fn items(&self) -> MutexGuard<'_, Vec<StoredItem>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn authenticator(&self) -> Authenticator {
        *self
            .authenticator
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn called(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    fn own(&self, raw: RawRef) -> Owned<'_> {
        // SAFETY: every `alloc_*` helper returns a fresh +1 reference.
        unsafe { Owned::adopt(&self.runtime, raw) }
    }

    fn prompt(&self, reason: &str) -> i32 {
        self.prompts.fetch_add(1, Ordering::SeqCst);
        #[cfg(feature = "tracing")]
        tracing::debug!(reason, "simulated authentication prompt");
        #[cfg(not(feature = "tracing"))]
        let _ = reason;
        self.authenticator().evaluate()
    }

    fn check_entitlements(&self, query: &Query) -> Result<(), i32> {
        let Some(groups) = &self.entitlements else {
            return Ok(());
        };
        if query.data_protection && groups.is_empty() {
            return Err(MISSING_ENTITLEMENT);
        }
        match &query.access_group {
            Some(group) if !groups.contains(group) => Err(MISSING_ENTITLEMENT),
            _ => Ok(()),
        }
    }

    // -- parsing ------------------------------------------------------------

    fn parse(&self, raw: RawRef) -> Result<Query, i32> {
        let rt = &self.runtime;
        let entries = rt.entries(raw).ok_or(PARAM)?;
        let mut query = Query::default();
        for (key, value) in entries {
            let Some(Constant::Key(attr)) = rt.identify(key) else {
                return Err(PARAM);
            };
            match attr {
                AttrKey::Class => {
                    let class = self.symbol(value)?;
                    if !matches!(class, Symbol::ClassGenericPassword | Symbol::ClassKey) {
                        return Err(PARAM);
                    }
                    query.class = Some(class);
                }
                AttrKey::Account => query.account = Some(self.text(value)?),
                AttrKey::Service => query.service = Some(self.text(value)?),
                AttrKey::Label => query.label = Some(self.text(value)?),
                AttrKey::AccessGroup => query.access_group = Some(self.text(value)?),
                AttrKey::ApplicationTag => query.tag = Some(self.bytes(value)?),
                AttrKey::ApplicationLabel => query.application_label = Some(self.bytes(value)?),
                AttrKey::ValueData => query.value_data = Some(Zeroizing::new(self.bytes(value)?)),
                AttrKey::KeyType => query.key_type = Some(self.symbol(value)?),
                AttrKey::KeyClass => query.key_class = Some(self.symbol(value)?),
                AttrKey::TokenId => query.token_id = Some(self.symbol(value)?),
                AttrKey::MatchLimit => {
                    let limit = self.symbol(value)?;
                    if !matches!(limit, Symbol::MatchLimitOne | Symbol::MatchLimitAll) {
                        return Err(PARAM);
                    }
                    query.match_limit = Some(limit);
                }
                AttrKey::IsPermanent => query.permanent = self.flag(value)?,
                AttrKey::ReturnAttributes => query.return_attributes = self.flag(value)?,
                AttrKey::ReturnData => query.return_data = self.flag(value)?,
                AttrKey::ReturnRef => query.return_ref = self.flag(value)?,
                AttrKey::UseDataProtectionKeychain => query.data_protection = self.flag(value)?,
                AttrKey::AuthenticationContext => {
                    query.auth_context = Some(rt.opaque::<SimAuthContext>(value).ok_or(PARAM)?)
                }
                AttrKey::AccessControl => {
                    query.access_control =
                        Some(rt.opaque::<SimAccessControl>(value).ok_or(PARAM)?)
                }
                AttrKey::PrivateKeyAttrs => query.private_attrs = Some(Box::new(self.parse(value)?)),
                AttrKey::ValueRef => return Err(PARAM),
            }
        }
        Ok(query)
    }

    fn parse_item_query(&self, raw: RawRef) -> Result<Query, i32> {
        let query = self.parse(raw)?;
        if query.class.is_none() {
            return Err(PARAM);
        }
        self.check_entitlements(&query)?;
        Ok(query)
    }

    fn symbol(&self, raw: RawRef) -> Result<Symbol, i32> {
        match self.runtime.identify(raw) {
            Some(Constant::Symbol(symbol)) => Ok(symbol),
            _ => Err(PARAM),
        }
    }

    fn text(&self, raw: RawRef) -> Result<String, i32> {
        self.runtime.text(raw).ok_or(PARAM)
    }

    fn bytes(&self, raw: RawRef) -> Result<Vec<u8>, i32> {
        self.runtime.data(raw).ok_or(PARAM)
    }

    fn flag(&self, raw: RawRef) -> Result<bool, i32> {
        self.runtime.boolean(raw).ok_or(PARAM)
    }

    // -- rendering ----------------------------------------------------------

    fn key_ref(&self, key: &Arc<SimKey>, context: Option<Arc<SimAuthContext>>) -> Owned<'_> {
        let payload = Arc::new(SimKeyRef {
            key: Arc::clone(key),
            context,
        });
        self.own(self.runtime.alloc_opaque(NativeType::Key, payload))
    }

    fn attributes(&self, item: &StoredItem, query: &Query) -> Owned<'_> {
        let rt = &self.runtime;
        let mut held: Vec<Owned<'_>> = Vec::new();
        let mut entries = vec![(
            rt.table(AttrKey::Class.into()),
            rt.table(item.class.into()),
        )];

        for (key, value) in [
            (AttrKey::Account, &item.account),
            (AttrKey::Service, &item.service),
            (AttrKey::Label, &item.label),
            (AttrKey::AccessGroup, &item.access_group),
        ] {
            if let Some(value) = value {
                let value = self.own(rt.alloc_string(value));
                entries.push((rt.table(key.into()), value.raw()));
                held.push(value);
            }
        }
        for (key, value) in [
            (AttrKey::ApplicationTag, &item.tag),
            (AttrKey::ApplicationLabel, &item.application_label),
        ] {
            if let Some(value) = value {
                let value = self.own(rt.alloc_data(value));
                entries.push((rt.table(key.into()), value.raw()));
                held.push(value);
            }
        }
        for (key, value) in [
            (AttrKey::KeyType, item.key_type),
            (AttrKey::KeyClass, item.key_class),
        ] {
            if let Some(symbol) = value {
                entries.push((rt.table(key.into()), rt.table(symbol.into())));
            }
        }
        if query.return_data {
            if let Some(data) = &item.data {
                let value = self.own(rt.alloc_data(data));
                entries.push((rt.table(AttrKey::ValueData.into()), value.raw()));
                held.push(value);
            }
        }
        if query.return_ref {
            if let Some(key) = &item.key {
                let value = self.key_ref(key, query.auth_context.clone());
                entries.push((rt.table(AttrKey::ValueRef.into()), value.raw()));
                held.push(value);
            }
        }

        // The dictionary retains its contents; `held` drops our references.
        self.own(rt.alloc_dictionary(entries))
    }

    fn render(&self, item: &StoredItem, query: &Query) -> Option<Owned<'_>> {
        if query.return_attributes || query.return_flags() > 1 {
            return Some(self.attributes(item, query));
        }
        if query.return_ref {
            return match &item.key {
                Some(key) => Some(self.key_ref(key, query.auth_context.clone())),
                None => Some(self.attributes(item, query)),
            };
        }
        if query.return_data {
            return item
                .data
                .as_ref()
                .map(|data| self.own(self.runtime.alloc_data(data)));
        }
        None
    }

    fn key_payload(&self, key: Borrowed<'_, '_>) -> Option<Arc<SimKeyRef>> {
        self.runtime.opaque::<SimKeyRef>(key.raw())
    }

    fn authorize(&self, key: &SimKeyRef) -> i32 {
        if !key.key.user_presence {
            return 0;
        }
        match &key.context {
            Some(context) => {
                let mut outcome = context
                    .outcome
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner);
                *outcome.get_or_insert_with(|| self.prompt(&context.reason))
            }
            None => self.prompt("use the signing key"),
        }
    }
}

impl Default for InMemoryTrustStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TrustStore for InMemoryTrustStore {
    fn runtime(&self) -> &dyn NativeRuntime {
        &self.runtime
    }

    fn item_add(&self, attributes: &Owned<'_>) -> i32 {
        self.called();
        let query = match self.parse_item_query(attributes.raw()) {
            Ok(query) => query,
            Err(status) => return status,
        };
        if query.class != Some(Symbol::ClassGenericPassword) {
            return UNIMPLEMENTED;
        }

        let mut items = self.items();
        let exists = items.iter().any(|item| {
            item.class == Symbol::ClassGenericPassword
                && item.account == query.account
                && item.service == query.service
        });
        if exists {
            return DUPLICATE;
        }
        items.push(StoredItem {
            class: Symbol::ClassGenericPassword,
            account: query.account,
            service: query.service,
            label: query.label,
            tag: None,
            application_label: None,
            access_group: query.access_group,
            key_type: None,
            key_class: None,
            data: query.value_data,
            key: None,
        });
        0
    }

    fn item_copy_matching(&self, query: &Owned<'_>) -> (i32, Option<Owned<'_>>) {
        self.called();
        let query = match self.parse_item_query(query.raw()) {
            Ok(query) => query,
            Err(status) => return (status, None),
        };

        let items = self.items();
        let matched: Vec<&StoredItem> = items.iter().filter(|item| query.matches(item)).collect();
        if matched.is_empty() {
            return (NOT_FOUND, None);
        }

        if !query.match_all() {
            return (0, self.render(matched[0], &query));
        }

        let mut rendered: Vec<Owned<'_>> = matched
            .into_iter()
            .filter_map(|item| self.render(item, &query))
            .collect();
        if self.malformed_results.load(Ordering::SeqCst) {
            rendered.push(self.own(self.runtime.alloc_data(b"unexpected")));
        }
        let raws = rendered.iter().map(Owned::raw).collect();
        (0, Some(self.own(self.runtime.alloc_array(raws))))
    }

    fn item_update(&self, query: &Owned<'_>, changes: &Owned<'_>) -> i32 {
        self.called();
        let query = match self.parse_item_query(query.raw()) {
            Ok(query) => query,
            Err(status) => return status,
        };
        let changes = match self.parse(changes.raw()) {
            Ok(changes) if changes.class.is_none() => changes,
            Ok(_) => return PARAM,
            Err(status) => return status,
        };

        let mut items = self.items();
        let targets: Vec<usize> = items
            .iter()
            .enumerate()
            .filter(|(_, item)| query.matches(item))
            .map(|(index, _)| index)
            .collect();
        if targets.is_empty() {
            return NOT_FOUND;
        }

        let moves_identity = changes.account.is_some() || changes.service.is_some();
        if moves_identity {
            let clash = targets.iter().any(|index| {
                let item = &items[*index];
                let account = changes.account.as_ref().or(item.account.as_ref());
                let service = changes.service.as_ref().or(item.service.as_ref());
                items.iter().enumerate().any(|(other, candidate)| {
                    !targets.contains(&other)
                        && candidate.class == item.class
                        && candidate.account.as_ref() == account
                        && candidate.service.as_ref() == service
                })
            });
            if clash || (targets.len() > 1 && changes.account.is_some()) {
                return DUPLICATE;
            }
        }

        for index in targets {
            let item = &mut items[index];
            if let Some(account) = &changes.account {
                item.account = Some(account.clone());
            }
            if let Some(service) = &changes.service {
                item.service = Some(service.clone());
            }
            if let Some(label) = &changes.label {
                item.label = Some(label.clone());
            }
            if let Some(data) = &changes.value_data {
                item.data = Some(data.clone());
            }
        }
        0
    }

    fn item_delete(&self, query: &Owned<'_>) -> i32 {
        self.called();
        let query = match self.parse_item_query(query.raw()) {
            Ok(query) => query,
            Err(status) => return status,
        };

        let mut items = self.items();
        let matched = items.iter().filter(|item| query.matches(item)).count();
        let Some(first) = items.iter().position(|item| query.matches(item)) else {
            return NOT_FOUND;
        };
        items.remove(first);
        if matched > 1 {
            DUPLICATE
        } else {
            0
        }
    }

    fn create_access_control(
        &self,
        protection: Symbol,
        flags: AccessControlFlags,
    ) -> Result<Owned<'_>, NativeError> {
        self.called();
        if protection != Symbol::AccessibleWhenUnlockedThisDeviceOnly {
            return Err(NativeError::with_description(
                PARAM,
                "unsupported protection class",
            ));
        }
        let payload = Arc::new(SimAccessControl { flags });
        Ok(self.own(
            self.runtime
                .alloc_opaque(NativeType::AccessControl, payload),
        ))
    }

    fn create_random_key(&self, parameters: &Owned<'_>) -> Result<Owned<'_>, NativeError> {
        self.called();
        let params = self.parse(parameters.raw()).map_err(NativeError::new)?;
        let private = params.private_attrs.as_deref().ok_or_else(|| {
            NativeError::with_description(PARAM, "missing private key attributes")
        })?;
        self.check_entitlements(&params)
            .and_then(|()| self.check_entitlements(private))
            .map_err(NativeError::new)?;

        if params.key_type != Some(Symbol::KeyTypeEc) {
            return Err(NativeError::with_description(PARAM, "unsupported key type"));
        }
        if params.token_id != Some(Symbol::TokenIdSecureEnclave) {
            return Err(NativeError::with_description(
                UNIMPLEMENTED,
                "only secure enclave keys are simulated",
            ));
        }
        let access = private.access_control.as_ref().ok_or_else(|| {
            NativeError::with_description(PARAM, "missing access control")
        })?;
        if !access
            .flags
            .contains(AccessControlFlags::PRIVATE_KEY_USAGE)
        {
            return Err(NativeError::with_description(
                PARAM,
                "secure enclave keys require private key usage",
            ));
        }

        let signing = SigningKey::random(&mut OsRng);
        let point = PublicKey::from(signing.verifying_key())
            .to_encoded_point(false)
            .as_bytes()
            .to_vec();
        let application_label = Sha256::digest(&point)[..20].to_vec();
        let tag = private.tag.clone().unwrap_or_default();
        let key = Arc::new(SimKey {
            signing,
            point,
            application_label: application_label.clone(),
            tag: tag.clone(),
            label: params.label.clone(),
            user_presence: access.flags.contains(AccessControlFlags::USER_PRESENCE),
        });

        if private.permanent {
            self.items().push(StoredItem {
                class: Symbol::ClassKey,
                account: None,
                service: None,
                label: params.label.clone(),
                tag: Some(tag),
                application_label: Some(application_label),
                access_group: params.access_group.clone(),
                key_type: Some(Symbol::KeyTypeEc),
                key_class: Some(Symbol::KeyClassPrivate),
                data: None,
                key: Some(Arc::clone(&key)),
            });
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(
            application_label = %hex::encode(&key.application_label),
            permanent = private.permanent,
            "generated simulated enclave key"
        );

        Ok(self.key_ref(&key, None))
    }

    fn copy_public_key(&self, key: Borrowed<'_, '_>) -> Option<Owned<'_>> {
        self.called();
        if let Some(private) = self.key_payload(key) {
            let payload = Arc::new(SimPublicKey {
                point: private.key.point.clone(),
                application_label: private.key.application_label.clone(),
            });
            return Some(self.own(self.runtime.alloc_opaque(NativeType::Key, payload)));
        }
        if self.runtime.opaque::<SimPublicKey>(key.raw()).is_some() {
            // SAFETY: `key` is live for the duration of the call.
            unsafe { self.runtime.retain(key.raw()) };
            return Some(self.own(key.raw()));
        }
        None
    }

    fn copy_key_attributes(&self, key: Borrowed<'_, '_>) -> Option<Owned<'_>> {
        self.called();
        let rt = &self.runtime;
        let mut held: Vec<Owned<'_>> = Vec::new();
        let mut entries = vec![(
            rt.table(AttrKey::KeyType.into()),
            rt.table(Symbol::KeyTypeEc.into()),
        )];

        if let Some(public) = rt.opaque::<SimPublicKey>(key.raw()) {
            let point = self.own(rt.alloc_data(&public.point));
            let label = self.own(rt.alloc_data(&public.application_label));
            entries.extend([
                (
                    rt.table(AttrKey::KeyClass.into()),
                    rt.table(Symbol::KeyClassPublic.into()),
                ),
                (rt.table(AttrKey::ValueData.into()), point.raw()),
                (rt.table(AttrKey::ApplicationLabel.into()), label.raw()),
            ]);
            held.extend([point, label]);
        } else if let Some(private) = self.key_payload(key) {
            let label = self.own(rt.alloc_data(&private.key.application_label));
            let tag = self.own(rt.alloc_data(&private.key.tag));
            entries.extend([
                (
                    rt.table(AttrKey::KeyClass.into()),
                    rt.table(Symbol::KeyClassPrivate.into()),
                ),
                (
                    rt.table(AttrKey::TokenId.into()),
                    rt.table(Symbol::TokenIdSecureEnclave.into()),
                ),
                (rt.table(AttrKey::ApplicationLabel.into()), label.raw()),
                (rt.table(AttrKey::ApplicationTag.into()), tag.raw()),
            ]);
            held.extend([label, tag]);
            if let Some(text) = &private.key.label {
                let text = self.own(rt.alloc_string(text));
                entries.push((rt.table(AttrKey::Label.into()), text.raw()));
                held.push(text);
            }
        } else {
            return None;
        }

        Some(self.own(rt.alloc_dictionary(entries)))
    }

    fn create_signature(
        &self,
        key: Borrowed<'_, '_>,
        algorithm: Symbol,
        digest: &Owned<'_>,
    ) -> Result<Owned<'_>, NativeError> {
        self.called();
        if algorithm != Symbol::EcdsaSignatureDigestX962Sha256 {
            return Err(NativeError::with_description(PARAM, "unsupported algorithm"));
        }
        let key = self
            .key_payload(key)
            .ok_or_else(|| NativeError::with_description(PARAM, "not a private key"))?;
        let digest = self
            .runtime
            .data(digest.raw())
            .ok_or_else(|| NativeError::with_description(PARAM, "digest is not data"))?;
        if digest.is_empty() {
            return Err(NativeError::with_description(PARAM, "empty digest"));
        }

        let status = self.authorize(&key);
        if status != 0 {
            return Err(NativeError::new(status));
        }

        let field = digest_to_field(&digest);
        let signature: Signature = key
            .key
            .signing
            .sign_prehash(&field)
            .map_err(|err| NativeError::with_description(PARAM, err.to_string()))?;
        Ok(self.own(self.runtime.alloc_data(signature.to_der().as_bytes())))
    }

    fn create_auth_context(&self, reason: &str) -> Result<Owned<'_>, NativeError> {
        self.called();
        let payload = Arc::new(SimAuthContext {
            reason: reason.to_owned(),
            outcome: Mutex::new(None),
        });
        Ok(self.own(self.runtime.alloc_opaque(NativeType::AuthContext, payload)))
    }
}
