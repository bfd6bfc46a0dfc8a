use serde_json::{Value as JsonValue, json};

use super::ApiClient;
use super::endpoints;
use crate::error::Error;
use crate::pipeline::ApiRequest;
use crate::types::{GeneratedAids, ItemId, MemoryItem, NewMemoryItem};

impl ApiClient {
    /// Ask the backend to generate a mind map, mnemonics and sensory
    /// associations for `content`.
    ///
    /// # Errors
    ///
    /// Any pipeline error, unchanged.
    pub async fn generate_memory_aids(&self, content: &str) -> Result<GeneratedAids, Error> {
        let request =
            ApiRequest::post(endpoints::GENERATE_MEMORY_AIDS).json(&json!({ "content": content }))?;

        self.pipeline
            .send_json(&request)
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Failed to generate memory aids"))
    }

    /// # Errors
    ///
    /// Any pipeline error, unchanged.
    pub async fn save_memory_item(&self, item: &NewMemoryItem) -> Result<MemoryItem, Error> {
        let request = ApiRequest::post(endpoints::MEMORY_ITEMS).json(item)?;

        self.pipeline
            .send_json(&request)
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Failed to save memory item"))
    }

    /// # Errors
    ///
    /// Any pipeline error, unchanged.
    pub async fn get_memory_items(&self) -> Result<Vec<MemoryItem>, Error> {
        let request = ApiRequest::get(endpoints::MEMORY_ITEMS);

        self.pipeline
            .send_json(&request)
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Failed to get memory items"))
    }

    /// # Errors
    ///
    /// Any pipeline error, unchanged.
    pub async fn get_memory_item(&self, id: &ItemId) -> Result<MemoryItem, Error> {
        let request = ApiRequest::get(endpoints::with_id(endpoints::MEMORY_ITEM, &id.0));

        self.pipeline
            .send_json(&request)
            .await
            .inspect_err(|e| tracing::error!(error = %e, item_id = %id, "Failed to get memory item"))
    }

    /// Replace an item's content and aids.
    ///
    /// # Errors
    ///
    /// Any pipeline error, unchanged.
    pub async fn update_memory_item(
        &self,
        id: &ItemId,
        item: &NewMemoryItem,
    ) -> Result<MemoryItem, Error> {
        let request =
            ApiRequest::put(endpoints::with_id(endpoints::MEMORY_ITEM, &id.0)).json(item)?;

        self.pipeline
            .send_json(&request)
            .await
            .inspect_err(|e| tracing::error!(error = %e, item_id = %id, "Failed to update memory item"))
    }

    /// # Errors
    ///
    /// Any pipeline error, unchanged.
    pub async fn delete_memory_item(&self, id: &ItemId) -> Result<JsonValue, Error> {
        let request = ApiRequest::delete(endpoints::with_id(endpoints::MEMORY_ITEM, &id.0));

        self.pipeline
            .send_json(&request)
            .await
            .inspect_err(|e| tracing::error!(error = %e, item_id = %id, "Failed to delete memory item"))
    }
}
