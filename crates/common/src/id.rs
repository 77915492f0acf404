//! ID generation utilities.

use ulid::Ulid;

/// Prefix of every group registration code.
pub const GROUP_CODE_PREFIX: &str = "GRP-";

/// Number of ULID characters kept in a group code.
const GROUP_CODE_LEN: usize = 10;

/// ID generator for entities.
#[derive(Debug, Clone, Default)]
pub struct IdGenerator {
    _private: (),
}

impl IdGenerator {
    /// Create a new ID generator.
    #[must_use]
    pub const fn new() -> Self {
        Self { _private: () }
    }

    /// Generate a new ULID-based ID.
    ///
    /// ULIDs are lexicographically sortable and 26 characters long.
    #[must_use]
    pub fn generate(&self) -> String {
        Ulid::new().to_string().to_lowercase()
    }

    /// Generate a human-facing group registration code, e.g. `GRP-7ZQ4M1K9TX`.
    ///
    /// Uses the tail of a fresh ULID, which is its random part.
    #[must_use]
    pub fn generate_group_code(&self) -> String {
        let ulid = Ulid::new().to_string();
        format!("{GROUP_CODE_PREFIX}{}", &ulid[ulid.len() - GROUP_CODE_LEN..])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_ulid() {
        let id_gen = IdGenerator::new();
        let id1 = id_gen.generate();
        let id2 = id_gen.generate();

        assert_eq!(id1.len(), 26);
        assert_ne!(id1, id2);
        assert_eq!(id1, id1.to_lowercase());
    }

    #[test]
    fn test_generate_group_code() {
        let id_gen = IdGenerator::new();
        let code = id_gen.generate_group_code();

        assert!(code.starts_with(GROUP_CODE_PREFIX));
        assert_eq!(code.len(), GROUP_CODE_PREFIX.len() + 10);
        assert_eq!(code, code.to_uppercase());
        assert_ne!(code, id_gen.generate_group_code());
    }
}
