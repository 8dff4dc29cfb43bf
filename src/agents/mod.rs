//! Mode-agent dispatch (spec §4.9). Each agent checks the recommendation
//! cache, searches the catalog for candidates, makes one generative call to
//! turn those candidates into a structured recommendation, and reconciles the
//! model's reply against the candidate set it was actually shown (a model
//! that invents a `product_id` must never produce a card).

pub mod bundle;
pub mod gift;
pub mod review;
pub mod trend;
pub mod value;

use crate::cache::TtlCache;
use crate::error::Result;
use crate::llm::GenerativeGateway;
use crate::models::{Intent, Recommendations, Requirements};
use crate::product_search::CatalogGateway;

pub struct AgentContext<'a> {
    pub requirements: &'a Requirements,
    pub search_keywords: &'a [String],
    pub session_id: &'a str,
    pub catalog: &'a dyn CatalogGateway,
    pub llm: &'a dyn GenerativeGateway,
    pub cache: &'a TtlCache,
    pub preference_context: Option<&'a str>,
}

/// Dispatches to the mode agent selected by the orchestrator's routing step
/// (spec §4.8). Returns the recommendation plus whether it was served from cache.
pub async fn run(intent: Intent, ctx: AgentContext<'_>) -> Result<(Recommendations, bool)> {
    match intent {
        Intent::Gift => gift::run(ctx).await,
        Intent::Value => value::run(ctx).await,
        Intent::Bundle => bundle::run(ctx).await,
        Intent::Review => review::run(ctx).await,
        Intent::Trend => trend::run(ctx).await,
    }
}
