use xxhash_rust::xxh3::xxh3_64;

/// Stable asset identifier.
///
/// Ids are 32-bit hashes of asset names, which is what the pack formats
/// store on disk (texture references inside a model are name hashes, not
/// strings). Zero is reserved as the invalid id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct AssetId(u32);

impl AssetId {
    pub const INVALID: Self = Self(0);

    /// Hashes an asset name into an id. Never produces [`Self::INVALID`].
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        let hash = xxh3_64(name.as_bytes()) as u32;
        Self(if hash == 0 { 1 } else { hash })
    }

    #[must_use]
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    #[must_use]
    pub fn raw(self) -> u32 {
        self.0
    }

    #[must_use]
    pub fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl std::fmt::Display for AssetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{:08x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_hash_deterministically() {
        let a = AssetId::from_name("ember/model/square");
        let b = AssetId::from_name("ember/model/square");
        let c = AssetId::from_name("ember/model/bone");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.is_valid());
    }
}
