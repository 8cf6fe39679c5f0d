//! Persistence gateway contract shared by every entity family.
//!
//! `save` on an entity without an id assigns one; `save` on an entity with an id
//! overwrites that row. Multi-row writes are atomic in every implementation.

use async_trait::async_trait;
use uuid::Uuid;

/// Something a gateway can store.
pub trait Entity: Clone + Send + Sync + 'static {
    const NAME: &'static str;

    fn id(&self) -> Option<Uuid>;
}

#[async_trait]
pub trait Repository<T: Entity>: Send + Sync {
    async fn save(&self, entity: T) -> anyhow::Result<T>;

    async fn save_all(&self, entities: Vec<T>) -> anyhow::Result<Vec<T>>;

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<T>>;

    async fn find_all(&self) -> anyhow::Result<Vec<T>>;

    async fn exists_by_id(&self, id: Uuid) -> anyhow::Result<bool> {
        Ok(self.find_by_id(id).await?.is_some())
    }

    /// Deleting an id that is not stored is not an error.
    async fn delete_by_id(&self, id: Uuid) -> anyhow::Result<()>;

    async fn delete_all(&self) -> anyhow::Result<()>;
}
