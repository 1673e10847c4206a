use crate::embedding::cache::PgCacheStore;
use crate::state::PipelineState;

/// Prints embedding cache statistics. There is no eviction; pruning is an
/// operator decision, and this view is what they decide from.
pub async fn run(state: PipelineState) -> anyhow::Result<()> {
    let stats = PgCacheStore::new(state.store.pool().clone()).stats().await?;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}
