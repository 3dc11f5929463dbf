use bytes::Bytes;

/// A subscription subject.
///
/// A `Channel` matches a single exact name; a `Pattern` matches any channel
/// whose name glob-matches it (as Redis's own `PSUBSCRIBE` does).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Target {
    Channel(Bytes),
    Pattern(Bytes),
}

impl Target {
    /// The channel or pattern name, without its kind.
    pub fn name(&self) -> &Bytes {
        match self {
            Target::Channel(name) | Target::Pattern(name) => name,
        }
    }
}
