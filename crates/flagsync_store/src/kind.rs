//! Collection kinds for versioned data.

/// The kinds of versioned configuration data the client keeps in sync.
///
/// Each kind names a keyed collection of versioned items and carries the
/// wire sub-paths used for stream patch paths and polling requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataKind {
    /// Feature flag definitions.
    Flags,
    /// Segment definitions.
    Segments,
}

impl DataKind {
    /// All kinds, in the order they should be applied by an `init`
    /// (segments first, since flags may reference segments).
    pub const ALL: [DataKind; 2] = [DataKind::Segments, DataKind::Flags];

    /// Short namespace name, used in log output.
    pub fn namespace(&self) -> &'static str {
        match self {
            DataKind::Flags => "flags",
            DataKind::Segments => "segments",
        }
    }

    /// Path prefix that stream `patch`/`delete` paths carry for this kind.
    pub fn stream_path_prefix(&self) -> &'static str {
        match self {
            DataKind::Flags => "/flags/",
            DataKind::Segments => "/segments/",
        }
    }

    /// Request sub-path for polling a single item of this kind.
    pub fn poll_sub_path(&self) -> &'static str {
        match self {
            DataKind::Flags => "/sdk/latest-flags",
            DataKind::Segments => "/sdk/latest-segments",
        }
    }

    /// Relative position when applying a full data set. Lower goes first.
    pub fn init_priority(&self) -> u8 {
        match self {
            DataKind::Segments => 0,
            DataKind::Flags => 1,
        }
    }

    /// Whether items of this kind must be ordered so that items they
    /// reference come first within an `init`.
    pub fn ordered_by_dependencies(&self) -> bool {
        matches!(self, DataKind::Flags)
    }

    /// Resolves a stream path (e.g. `/flags/my-key`) into `(kind, key)`.
    ///
    /// Returns `None` for paths outside every known prefix; callers treat
    /// that as a droppable message, not an error.
    pub fn parse_stream_path(path: &str) -> Option<(DataKind, &str)> {
        for kind in [DataKind::Flags, DataKind::Segments] {
            if let Some(key) = path.strip_prefix(kind.stream_path_prefix()) {
                return Some((kind, key));
            }
        }
        None
    }
}
