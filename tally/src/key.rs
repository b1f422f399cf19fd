use crate::{IntoLabels, Label, SharedString};
use std::{fmt, slice::Iter};

/// A metric key.
///
/// A key always includes a name, but can optionally include multiple labels
/// used to further qualify the metric.
///
/// Key equality checks both the name and the labels, and labels are _not_
/// sorted before comparison: two keys built from the same labels in the same
/// order are equal.  Backends that want dimension identity to be independent
/// of ordering must normalize the labels into an unordered mapping before
/// comparing, treating duplicate label keys as last-write-wins.
#[derive(PartialEq, Eq, Hash, Clone, Debug)]
pub struct Key {
    name: SharedString,
    labels: Vec<Label>,
}

impl Key {
    /// Creates a `Key` from a name.
    pub fn from_name<N>(name: N) -> Self
    where
        N: Into<SharedString>,
    {
        Key { name: name.into(), labels: Vec::new() }
    }

    /// Creates a `Key` from a name and a set of labels.
    pub fn from_parts<N, L>(name: N, labels: L) -> Self
    where
        N: Into<SharedString>,
        L: IntoLabels,
    {
        Key { name: name.into(), labels: labels.into_labels() }
    }

    /// Name of this key.
    pub fn name(&self) -> &str {
        self.name.as_ref()
    }

    /// Labels of this key, if they exist.
    pub fn labels(&self) -> Iter<'_, Label> {
        self.labels.iter()
    }

    /// Consumes this `Key`, returning the name and any labels.
    pub fn into_parts(self) -> (SharedString, Vec<Label>) {
        (self.name, self.labels)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.labels.is_empty() {
            write!(f, "Key({})", self.name)
        } else {
            let kv_pairs = self
                .labels
                .iter()
                .map(|label| format!("{} = {}", label.0, label.1))
                .collect::<Vec<_>>();
            write!(f, "Key({}, [{}])", self.name, kv_pairs.join(", "))
        }
    }
}

impl From<String> for Key {
    fn from(name: String) -> Key {
        Key::from_name(name)
    }
}

impl From<&'static str> for Key {
    fn from(name: &'static str) -> Key {
        Key::from_name(name)
    }
}

impl From<SharedString> for Key {
    fn from(name: SharedString) -> Key {
        Key::from_name(name)
    }
}

impl<N, L> From<(N, L)> for Key
where
    N: Into<SharedString>,
    L: IntoLabels,
{
    fn from(parts: (N, L)) -> Key {
        Key::from_parts(parts.0, parts.1)
    }
}
