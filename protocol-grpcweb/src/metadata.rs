//! Header and trailer metadata.

/// An ordered mapping from header name to one or more string values.
///
/// Names are stored lower-cased and looked up case-insensitively. Values
/// keep their insertion order within a name. Equality ignores the order in
/// which distinct names were inserted.
#[derive(Debug, Clone, Default)]
pub struct Metadata {
    entries: Vec<(String, Vec<String>)>,
}

impl Metadata {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Append a value under `name`, keeping any values already present.
    ///
    /// Values must not contain line breaks; the header block format has no
    /// way to escape them and [`headers::encode`](crate::headers::encode)
    /// rejects them.
    pub fn append(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        let name = name.as_ref();
        let value = value.into();
        match self.position(name) {
            Some(idx) => self.entries[idx].1.push(value),
            None => self
                .entries
                .push((name.to_ascii_lowercase(), vec![value])),
        }
    }

    /// Builder form of [`append`](Self::append).
    pub fn with(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.append(name, value);
        self
    }

    /// All values for `name`, or an empty slice.
    pub fn get(&self, name: &str) -> &[String] {
        match self.position(name) {
            Some(idx) => &self.entries[idx].1,
            None => &[],
        }
    }

    /// The first value for `name`, if any.
    pub fn get_first(&self, name: &str) -> Option<&str> {
        self.get(name).first().map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Remove `name` and return its values.
    pub fn remove(&mut self, name: &str) -> Option<Vec<String>> {
        self.position(name).map(|idx| self.entries.remove(idx).1)
    }

    /// Number of distinct names.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over every `(name, value)` pair, one per value.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().flat_map(|(name, values)| {
            values.iter().map(move |v| (name.as_str(), v.as_str()))
        })
    }

    /// Iterate over the distinct names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    /// Copy every name from `other` that is not already present here.
    pub fn merge_missing(&mut self, other: &Metadata) {
        for (name, values) in &other.entries {
            if !self.contains(name) {
                self.entries.push((name.clone(), values.clone()));
            }
        }
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|(n, _)| n.eq_ignore_ascii_case(name))
    }
}

impl PartialEq for Metadata {
    fn eq(&self, other: &Self) -> bool {
        self.entries.len() == other.entries.len()
            && self
                .entries
                .iter()
                .all(|(name, values)| other.get(name) == values.as_slice())
    }
}

impl Eq for Metadata {}

impl<K, V> FromIterator<(K, V)> for Metadata
where
    K: AsRef<str>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut md = Metadata::new();
        for (k, v) in iter {
            md.append(k, v);
        }
        md
    }
}
