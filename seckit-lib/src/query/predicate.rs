use std::borrow::Cow;
use std::fmt;

use crate::bridge::{AttrKey, Borrowed, Bridge, Owned, Symbol};
use crate::config::StoreConfig;
use crate::Result;

/// A typed attribute value.
#[derive(Clone)]
pub enum Value<'h> {
    Text(Cow<'h, str>),
    Bytes(Cow<'h, [u8]>),
    Bool(bool),
    /// A named native constant.
    Symbol(Symbol),
    Nested(Predicate<'h>),
    /// A live native object such as an access control or auth context.
    Handle(Borrowed<'h, 'h>),
}

impl fmt::Debug for Value<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(text) => f.debug_tuple("Text").field(text).finish(),
            // Byte values may carry secret data.
            Value::Bytes(bytes) => write!(f, "Bytes(<{} bytes>)", bytes.len()),
            Value::Bool(value) => f.debug_tuple("Bool").field(value).finish(),
            Value::Symbol(symbol) => f.debug_tuple("Symbol").field(symbol).finish(),
            Value::Nested(predicate) => f.debug_tuple("Nested").field(predicate).finish(),
            Value::Handle(handle) => f.debug_tuple("Handle").field(handle).finish(),
        }
    }
}

impl<'h> From<&'h str> for Value<'h> {
    fn from(text: &'h str) -> Self {
        Value::Text(Cow::Borrowed(text))
    }
}

impl From<String> for Value<'_> {
    fn from(text: String) -> Self {
        Value::Text(Cow::Owned(text))
    }
}

impl<'h> From<&'h [u8]> for Value<'h> {
    fn from(bytes: &'h [u8]) -> Self {
        Value::Bytes(Cow::Borrowed(bytes))
    }
}

impl From<Vec<u8>> for Value<'_> {
    fn from(bytes: Vec<u8>) -> Self {
        Value::Bytes(Cow::Owned(bytes))
    }
}

impl From<bool> for Value<'_> {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<Symbol> for Value<'_> {
    fn from(symbol: Symbol) -> Self {
        Value::Symbol(symbol)
    }
}

impl<'h> From<Predicate<'h>> for Value<'h> {
    fn from(predicate: Predicate<'h>) -> Self {
        Value::Nested(predicate)
    }
}

impl<'h, 'rt: 'h> From<Borrowed<'h, 'rt>> for Value<'h> {
    fn from(handle: Borrowed<'h, 'rt>) -> Self {
        Value::Handle(handle)
    }
}

impl<'h> From<Cow<'h, str>> for Value<'h> {
    fn from(text: Cow<'h, str>) -> Self {
        Value::Text(text)
    }
}

impl<'h> From<Cow<'h, [u8]>> for Value<'h> {
    fn from(bytes: Cow<'h, [u8]>) -> Self {
        Value::Bytes(bytes)
    }
}

/// An attribute map with unique keys, kept in insertion order.
#[derive(Clone, Debug, Default)]
pub struct Predicate<'h> {
    entries: Vec<(AttrKey, Value<'h>)>,
}

enum Rendered<'a> {
    Owned(Owned<'a>),
    Peek(Borrowed<'a, 'a>),
}

impl<'h> Predicate<'h> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key`, replacing any existing value in place.
    pub fn insert(&mut self, key: AttrKey, value: impl Into<Value<'h>>) -> &mut Self {
        let value = value.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((key, value)),
        }
        self
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with(mut self, key: AttrKey, value: impl Into<Value<'h>>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn remove(&mut self, key: AttrKey) -> Option<Value<'h>> {
        let index = self.entries.iter().position(|(existing, _)| *existing == key)?;
        Some(self.entries.remove(index).1)
    }

    pub fn get(&self, key: AttrKey) -> Option<&Value<'h>> {
        self.entries
            .iter()
            .find(|(existing, _)| *existing == key)
            .map(|(_, value)| value)
    }

    pub fn contains(&self, key: AttrKey) -> bool {
        self.get(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = AttrKey> + '_ {
        self.entries.iter().map(|(key, _)| *key)
    }

    /// Add the keychain scope attributes `config` asks for.
    pub fn apply_scope(&mut self, config: &'h StoreConfig) -> &mut Self {
        if config.data_protection_keychain {
            self.insert(AttrKey::UseDataProtectionKeychain, true);
        }
        if let Some(group) = &config.access_group {
            self.insert(AttrKey::AccessGroup, group.as_str());
        }
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Build the native dictionary.
    ///
    /// Intermediate values are owned by this call and released when it
    /// returns, whether or not construction succeeded.
    pub fn render<'rt>(&self, bridge: &Bridge<'rt>) -> Result<Owned<'rt>> {
        let mut rendered: Vec<Rendered<'_>> = Vec::with_capacity(self.entries.len());
        for (_, value) in &self.entries {
            rendered.push(match value {
                Value::Text(text) => Rendered::Owned(bridge.wrap_text(text)?),
                Value::Bytes(bytes) => Rendered::Owned(bridge.wrap_bytes(bytes)?),
                Value::Nested(nested) => Rendered::Owned(nested.render(bridge)?),
                Value::Bool(flag) => Rendered::Peek(bridge.constant(*flag)),
                Value::Symbol(symbol) => Rendered::Peek(bridge.constant(*symbol)),
                Value::Handle(handle) => Rendered::Peek(*handle),
            });
        }

        let pairs: Vec<(Borrowed<'_, '_>, Borrowed<'_, '_>)> = self
            .entries
            .iter()
            .zip(&rendered)
            .map(|((key, _), value)| {
                let value = match value {
                    Rendered::Owned(owned) => owned.borrow(),
                    Rendered::Peek(peek) => *peek,
                };
                (bridge.constant(*key), value)
            })
            .collect();

        bridge.build_predicate(&pairs)
    }
}
