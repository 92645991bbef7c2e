use std::collections::{BTreeMap, btree_map};

use super::attribute::Attribute;

/// Case-insensitive name→[`Attribute`] mapping.
///
/// Keys are folded with [`str::to_lowercase`] for lookup; the key as it was
/// inserted is kept alongside the attribute and is what [`keys`](Self::keys)
/// and [`iter`](Self::iter) yield. Iteration follows the folded key order.
#[derive(Debug, Clone, Default)]
pub struct AttributeMap {
    entries: BTreeMap<String, (String, Attribute)>,
}

impl AttributeMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(&fold(key))
    }

    pub fn contains_value(&self, attribute: &Attribute) -> bool {
        self.values().any(|cursor| cursor == attribute)
    }

    pub fn get(&self, key: &str) -> Option<&Attribute> {
        self.entries.get(&fold(key)).map(|(_, attribute)| attribute)
    }

    /// Insert `attribute` under `key`, returning the attribute it replaced.
    pub fn insert(&mut self, key: impl Into<String>, attribute: Attribute) -> Option<Attribute> {
        let key = key.into();
        self.entries
            .insert(fold(&key), (key, attribute))
            .map(|(_, previous)| previous)
    }

    /// Insert `attribute` under its own name.
    pub fn put(&mut self, attribute: Attribute) -> Option<Attribute> {
        let key = attribute.name().to_string();
        self.insert(key, attribute)
    }

    pub fn remove(&mut self, key: &str) -> Option<Attribute> {
        self.entries.remove(&fold(key)).map(|(_, attribute)| attribute)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.values().map(|(key, _)| key.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &Attribute> {
        self.entries.values().map(|(_, attribute)| attribute)
    }

    pub fn iter(&self) -> Iter<'_> {
        Iter {
            inner: self.entries.values(),
        }
    }
}

fn fold(key: &str) -> String {
    key.to_lowercase()
}

/// Iterator over `(key, attribute)` pairs of an [`AttributeMap`].
pub struct Iter<'a> {
    inner: btree_map::Values<'a, String, (String, Attribute)>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (&'a str, &'a Attribute);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner
            .next()
            .map(|(key, attribute)| (key.as_str(), attribute))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<'a> IntoIterator for &'a AttributeMap {
    type Item = (&'a str, &'a Attribute);
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl FromIterator<Attribute> for AttributeMap {
    fn from_iter<I: IntoIterator<Item = Attribute>>(iter: I) -> Self {
        let mut map = AttributeMap::new();
        map.extend(iter);
        map
    }
}

impl Extend<Attribute> for AttributeMap {
    fn extend<I: IntoIterator<Item = Attribute>>(&mut self, iter: I) {
        for attribute in iter {
            self.put(attribute);
        }
    }
}

// Order independent: two maps are equal when every folded key resolves to an
// equal attribute on both sides.
impl PartialEq for AttributeMap {
    fn eq(&self, other: &Self) -> bool {
        self.entries.len() == other.entries.len()
            && self
                .entries
                .iter()
                .all(|(key, (_, attribute))| {
                    other
                        .entries
                        .get(key)
                        .is_some_and(|(_, theirs)| theirs == attribute)
                })
    }
}

impl Eq for AttributeMap {}
