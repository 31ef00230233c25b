use std::rc::Rc;

/// A label in the text or data segment.
///
/// Cheap to clone; the underlying string is shared.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Label(Rc<str>);

impl Label {
    /// Replaces every character that is not valid in a SPIM label with `_`.
    pub fn sanitized(raw: &str) -> Self {
        let mut name: String = raw
            .chars()
            .map(|ch| if ch.is_ascii_alphanumeric() || ch == '_' || ch == '.' { ch } else { '_' })
            .collect();
        if name.is_empty() {
            name.push_str("label");
        }
        Self(Rc::from(name.as_str()))
    }
}

impl AsRef<str> for Label {
    fn as_ref(&self) -> &str {
        self.0.as_ref()
    }
}

impl From<&str> for Label {
    fn from(value: &str) -> Self {
        Self(Rc::from(value))
    }
}

impl From<String> for Label {
    fn from(value: String) -> Self {
        Self(Rc::from(value))
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}
