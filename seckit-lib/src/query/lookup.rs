use std::borrow::Cow;

use super::predicate::Predicate;
use crate::backend::TrustStore;
use crate::bridge::{AttrKey, Borrowed, Bridge, NativeType, Owned, Symbol};
use crate::config::StoreConfig;
use crate::errors::{check_status, SecError};
use crate::Result;

/// How many matches a retrieval may return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchLimit {
    #[default]
    One,
    All,
}

/// What a retrieval should hand back for each match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReturnFlags {
    pub attributes: bool,
    pub data: bool,
    pub reference: bool,
}

impl ReturnFlags {
    pub const NONE: Self = Self {
        attributes: false,
        data: false,
        reference: false,
    };

    pub const fn attributes(mut self) -> Self {
        self.attributes = true;
        self
    }

    pub const fn data(mut self) -> Self {
        self.data = true;
        self
    }

    pub const fn reference(mut self) -> Self {
        self.reference = true;
        self
    }
}

/// Item class a lookup targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemClass {
    GenericPassword,
    /// Private half of an EC key.
    PrivateKey,
}

/// A description of which stored items to target.
///
/// One `Lookup` renders both the read predicate (with match limit and
/// return flags) and the write predicate used for update and delete.
#[derive(Debug, Clone)]
pub struct Lookup<'h> {
    class: ItemClass,
    account: Option<Cow<'h, str>>,
    service: Option<Cow<'h, str>>,
    tag: Option<Cow<'h, [u8]>>,
    label: Option<Cow<'h, str>>,
    application_label: Option<Cow<'h, [u8]>>,
    limit: MatchLimit,
    returning: ReturnFlags,
    auth_context: Option<Borrowed<'h, 'h>>,
    scope: Option<&'h StoreConfig>,
}

impl<'h> Lookup<'h> {
    fn new(class: ItemClass, returning: ReturnFlags) -> Self {
        Self {
            class,
            account: None,
            service: None,
            tag: None,
            label: None,
            application_label: None,
            limit: MatchLimit::One,
            returning,
            auth_context: None,
            scope: None,
        }
    }

    /// Generic passwords, returning attributes and data.
    pub fn secrets() -> Self {
        Self::new(
            ItemClass::GenericPassword,
            ReturnFlags::NONE.attributes().data(),
        )
    }

    /// Private EC keys, returning a key reference.
    pub fn keys() -> Self {
        Self::new(ItemClass::PrivateKey, ReturnFlags::NONE.reference())
    }

    pub fn class(&self) -> ItemClass {
        self.class
    }

    pub fn account(mut self, account: &'h str) -> Self {
        self.account = Some(Cow::Borrowed(account));
        self
    }

    pub fn service(mut self, service: &'h str) -> Self {
        self.service = Some(Cow::Borrowed(service));
        self
    }

    /// Application tag, stored as the bytes of the string.
    pub fn tag(mut self, tag: &'h str) -> Self {
        self.tag = Some(Cow::Borrowed(tag.as_bytes()));
        self
    }

    /// Label filter; an empty label matches any label.
    pub fn label(mut self, label: &'h str) -> Self {
        self.label = (!label.is_empty()).then_some(Cow::Borrowed(label));
        self
    }

    pub fn application_label(mut self, application_label: &'h [u8]) -> Self {
        self.application_label = Some(Cow::Borrowed(application_label));
        self
    }

    pub fn limit(mut self, limit: MatchLimit) -> Self {
        self.limit = limit;
        self
    }

    pub fn returning(mut self, returning: ReturnFlags) -> Self {
        self.returning = returning;
        self
    }

    /// Attach an authentication context to the read predicate.
    pub fn authenticated_by(mut self, context: Borrowed<'h, 'h>) -> Self {
        self.auth_context = Some(context);
        self
    }

    /// Apply the keychain scope from `config`.
    pub fn scoped(mut self, config: &'h StoreConfig) -> Self {
        self.scope = Some(config);
        self
    }

    fn identity(&self) -> Predicate<'h> {
        let mut predicate = Predicate::new();
        match self.class {
            ItemClass::GenericPassword => {
                predicate.insert(AttrKey::Class, Symbol::ClassGenericPassword);
            }
            ItemClass::PrivateKey => {
                predicate
                    .insert(AttrKey::Class, Symbol::ClassKey)
                    .insert(AttrKey::KeyType, Symbol::KeyTypeEc)
                    .insert(AttrKey::KeyClass, Symbol::KeyClassPrivate);
            }
        }
        if let Some(config) = self.scope {
            predicate.apply_scope(config);
        }
        if let Some(account) = &self.account {
            predicate.insert(AttrKey::Account, account.clone());
        }
        if let Some(service) = &self.service {
            predicate.insert(AttrKey::Service, service.clone());
        }
        if let Some(tag) = &self.tag {
            predicate.insert(AttrKey::ApplicationTag, tag.clone());
        }
        if let Some(label) = &self.application_label {
            predicate.insert(AttrKey::ApplicationLabel, label.clone());
        }
        if let Some(label) = &self.label {
            predicate.insert(AttrKey::Label, label.clone());
        }
        predicate
    }

    /// Read-mode predicate: identity, filters, match limit and return flags.
    pub fn predicate(&self) -> Predicate<'h> {
        let mut predicate = self.identity();
        let limit = match self.limit {
            MatchLimit::One => Symbol::MatchLimitOne,
            MatchLimit::All => Symbol::MatchLimitAll,
        };
        predicate.insert(AttrKey::MatchLimit, limit);
        if self.returning.attributes {
            predicate.insert(AttrKey::ReturnAttributes, true);
        }
        if self.returning.data {
            predicate.insert(AttrKey::ReturnData, true);
        }
        if self.returning.reference {
            predicate.insert(AttrKey::ReturnRef, true);
        }
        if let Some(context) = self.auth_context {
            predicate.insert(AttrKey::AuthenticationContext, context);
        }
        predicate
    }

    /// Write-mode predicate: identity and filters only.
    pub fn mutation_predicate(&self) -> Predicate<'h> {
        self.identity()
    }

    /// Retrieve exactly one match. No match propagates as not found.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(level = "debug", skip_all, fields(class = ?self.class))
    )]
    pub fn fetch_one<'s>(&self, store: &'s dyn TrustStore) -> Result<Owned<'s>> {
        let bridge = Bridge::new(store.runtime());
        let query = self.clone().limit(MatchLimit::One).predicate().render(&bridge)?;
        let (status, result) = store.item_copy_matching(&query);
        check_status(status)?;
        result.ok_or_else(|| SecError::malformed("empty result"))
    }

    /// Retrieve every match. No match is an empty result, not an error.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(level = "debug", skip_all, fields(class = ?self.class))
    )]
    pub fn fetch_all<'s>(&self, store: &'s dyn TrustStore) -> Result<Records<'s>> {
        let bridge = Bridge::new(store.runtime());
        let query = self.clone().limit(MatchLimit::All).predicate().render(&bridge)?;
        let (status, result) = store.item_copy_matching(&query);
        match check_status(status) {
            Ok(()) => Ok(Records {
                bridge,
                collection: result,
            }),
            Err(err) if err.is_not_found() => Ok(Records {
                bridge,
                collection: None,
            }),
            Err(err) => Err(err),
        }
    }
}

/// The collection returned by a multi-match retrieval.
pub struct Records<'s> {
    bridge: Bridge<'s>,
    collection: Option<Owned<'s>>,
}

impl<'s> Records<'s> {
    pub fn bridge(&self) -> Bridge<'s> {
        self.bridge
    }

    /// Every record, each checked to be an attribute map.
    pub fn entries(&self) -> Result<Vec<Borrowed<'_, 's>>> {
        let Some(collection) = &self.collection else {
            return Ok(Vec::new());
        };
        let items = self.bridge.unwrap_collection(collection.borrow())?;
        for item in &items {
            if self.bridge.type_of(*item) != NativeType::Dictionary {
                return Err(SecError::malformed(self.bridge.describe(*item)));
            }
        }
        Ok(items)
    }
}
