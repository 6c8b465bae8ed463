use crate::db::errors::Result;

/// CRUD surface shared by the table-shaped repositories.
///
/// Ledger-style tables (credits, payments) expose purpose-built methods instead, since their
/// rows are not freely updatable.
#[async_trait::async_trait]
pub trait Repository {
    type CreateRequest: Sync;
    type UpdateRequest: Sync;
    type Response;
    type Id: Send;
    type Filter: Sync;

    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response>;

    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>>;

    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>>;

    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response>;
}
