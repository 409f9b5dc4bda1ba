use anyhow::{bail, Result};

use teapot_core::models::ScoredCandidate;
use teapot_core::score::rank;

use crate::chat::ChatEngine;

/// Rank passages from one corpus against `query`, best first.
///
/// `docs` ranks document chunks; `memory` ranks the turns of the most
/// recent session as `"User: ..."` / `"Assistant: ..."` lines.
pub async fn search_passages(
    engine: &ChatEngine,
    query: &str,
    corpus: &str,
    limit: Option<usize>,
) -> Result<Vec<ScoredCandidate>> {
    let params = engine.config().retrieval.params();
    let candidates: Vec<String> = match corpus {
        "docs" => engine.library().chunks().await,
        "memory" => {
            engine.resume_latest().await;
            engine
                .active_session()
                .await
                .messages
                .iter()
                .map(|turn| turn.as_line())
                .collect()
        }
        _ => bail!("Unknown corpus: {}. Use docs or memory.", corpus),
    };

    let limit = limit.unwrap_or(match corpus {
        "docs" => params.rag_top_k,
        _ => params.memory_top_k,
    });

    Ok(rank(query, &candidates, limit))
}

pub async fn run_search(
    engine: &ChatEngine,
    query: &str,
    corpus: &str,
    limit: Option<usize>,
) -> Result<()> {
    let results = search_passages(engine, query, corpus, limit).await?;

    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, result) in results.iter().enumerate() {
        println!("{}. [{}] {} #{}", i + 1, result.score, corpus, result.index);
        println!("    excerpt: \"{}\"", result.text.replace('\n', " ").trim());
        println!();
    }

    Ok(())
}
