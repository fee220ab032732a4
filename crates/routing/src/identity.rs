use {anyhow::Result, async_trait::async_trait, std::collections::HashMap};

/// Cross-platform identity links, owned externally.
///
/// A primary id is the canonical key shown in mirrored display names; each
/// primary id may be bound to several origin-platform user ids.
#[async_trait]
pub trait IdentityLinker: Send + Sync {
    /// Canonical id for an origin user. Callers fall back to the origin id
    /// itself when this fails.
    async fn primary_id(&self, origin_user_id: &str) -> Result<String>;

    /// Every origin user id bound to a primary id.
    async fn linked_ids(&self, primary_id: &str) -> Result<Vec<String>>;
}

/// Identity table with no links — every lookup fails, so display names fall
/// back to origin ids and rewrite commands are never authorized.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnlinkedIdentity;

#[async_trait]
impl IdentityLinker for UnlinkedIdentity {
    async fn primary_id(&self, origin_user_id: &str) -> Result<String> {
        anyhow::bail!("no identity link for origin user {origin_user_id}")
    }

    async fn linked_ids(&self, primary_id: &str) -> Result<Vec<String>> {
        anyhow::bail!("unknown primary id {primary_id}")
    }
}

/// Immutable in-memory identity table: primary id → linked origin ids.
#[derive(Debug, Default)]
pub struct StaticIdentityTable {
    links: HashMap<String, Vec<String>>,
}

impl StaticIdentityTable {
    #[must_use]
    pub fn new(links: HashMap<String, Vec<String>>) -> Self {
        Self { links }
    }
}

#[async_trait]
impl IdentityLinker for StaticIdentityTable {
    async fn primary_id(&self, origin_user_id: &str) -> Result<String> {
        self.links
            .iter()
            .find(|(_, ids)| ids.iter().any(|id| id == origin_user_id))
            .map(|(primary, _)| primary.clone())
            .ok_or_else(|| anyhow::anyhow!("no identity link for origin user {origin_user_id}"))
    }

    async fn linked_ids(&self, primary_id: &str) -> Result<Vec<String>> {
        self.links
            .get(primary_id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("unknown primary id {primary_id}"))
    }
}
