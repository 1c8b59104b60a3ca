use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config::Config;
use crate::engine::SearchEngine;
use crate::extract::{self, DocumentKind};
use crate::search::{self, SearchOptions, SearchResult};
use crate::store;

const INTERACTIVE_RESULT_COUNT: usize = 5;

/// Index files and directories into the vector store
#[inline]
pub async fn index(
    config: &Config,
    paths: &[PathBuf],
    recursive: bool,
    types: &[String],
) -> Result<()> {
    let kinds = parse_kinds(types)?;
    let files = collect_files(paths, recursive, kinds.as_deref())?;

    if files.is_empty() {
        println!("No supported documents found.");
        return Ok(());
    }

    info!("Indexing {} files", files.len());

    let engine = SearchEngine::initialize(config).await?;
    engine
        .health()
        .await
        .context("Embedding server is not available")?;

    let bar = if console::user_attended_stderr() {
        ProgressBar::new(files.len() as u64).with_style(
            ProgressStyle::with_template("{bar:30} [{pos}/{len}] Indexing {msg}")
                .expect("style template is valid"),
        )
    } else {
        ProgressBar::hidden()
    };

    let mut indexed: Vec<(&Path, usize)> = Vec::new();
    let mut skipped: Vec<(&Path, String)> = Vec::new();
    let mut chunks_created = 0;

    for path in &files {
        bar.set_message(display_name(path));
        match engine.index_file(path).await {
            Ok(summary) => {
                chunks_created += summary.chunks_created;
                indexed.push((path, summary.chunks_created));
            }
            Err(e) if e.aborts_file_only() => {
                warn!("Skipping {}: {}", path.display(), e);
                skipped.push((path, e.to_string()));
            }
            Err(e) => {
                bar.abandon();
                return Err(e.into());
            }
        }
        bar.inc(1);
    }
    bar.finish_and_clear();

    println!("{}", style("Indexing complete").bold().green());
    println!("  Files indexed: {}", indexed.len());
    println!("  Chunks created: {}", chunks_created);
    for (path, chunks) in &indexed {
        println!("    ✓ {} ({} chunks)", path.display(), chunks);
    }

    if !skipped.is_empty() {
        println!();
        println!(
            "{}",
            style(format!("⚠️  Skipped {} file(s):", skipped.len())).yellow()
        );
        for (path, reason) in &skipped {
            println!("    {}: {}", path.display(), reason);
        }
    }

    Ok(())
}

/// Run one hybrid search and print the results
#[inline]
pub async fn search(
    config: &Config,
    query: &str,
    count: usize,
    min_score: f32,
    text_matches: bool,
    json: bool,
) -> Result<()> {
    let engine = SearchEngine::initialize(config).await?;
    let options = SearchOptions {
        include_text_matches: text_matches,
        min_score,
    };
    let results = engine.search(query, count, &options).await?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&results).context("Failed to serialize results")?
        );
        return Ok(());
    }

    print_results(query, &results);
    Ok(())
}

/// Prompt loop running searches until the user quits
#[inline]
pub async fn interactive(config: &Config) -> Result<()> {
    let engine = SearchEngine::initialize(config).await?;

    eprintln!("{}", style("🔍 semdex interactive search").bold().cyan());
    eprintln!("Type a query, or an empty line / \"exit\" to quit.");

    loop {
        eprintln!();
        let line: String = Input::new()
            .with_prompt("query")
            .allow_empty(true)
            .interact_text()?;
        let query = line.trim();

        if query.is_empty() || query.eq_ignore_ascii_case("exit") || query.eq_ignore_ascii_case("quit")
        {
            break;
        }

        let options = SearchOptions {
            include_text_matches: true,
            ..SearchOptions::default()
        };
        match engine.search(query, INTERACTIVE_RESULT_COUNT, &options).await {
            Ok(results) => print_results(query, &results),
            Err(e) => eprintln!("{}", style(format!("Search failed: {}", e)).red()),
        }
    }

    Ok(())
}

/// Show index statistics and embedding server health
#[inline]
pub async fn status(config: &Config, json: bool) -> Result<()> {
    let engine = SearchEngine::initialize(config).await?;
    let status = engine.status().await?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&status).context("Failed to serialize status")?
        );
        return Ok(());
    }

    println!("{}", style("📊 Index status").bold().cyan());
    println!("  Location: {}", config.index_dir().display());
    match engine.health().await {
        Ok(()) => println!(
            "  Embedding server: {} ({})",
            style("reachable").green(),
            config.ollama.model
        ),
        Err(e) => println!("  Embedding server: {} ({})", style("unavailable").red(), e),
    }
    println!("  Files: {}", status.total_files);
    println!("  Chunks: {}", status.total_chunks);

    if status.files.is_empty() {
        println!();
        println!("The index is empty. Run 'semdex index <path>' to add documents.");
        return Ok(());
    }

    println!();
    for file in &status.files {
        println!(
            "  {} [{}] {} chunks, {} words",
            file.file_name, file.kind, file.chunks, file.words
        );
    }

    Ok(())
}

/// Break the index down by document kind and file
#[inline]
pub async fn analyze(config: &Config, json: bool) -> Result<()> {
    let engine = SearchEngine::initialize(config).await?;
    let analysis = engine.analyze().await?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&analysis).context("Failed to serialize analysis")?
        );
        return Ok(());
    }

    println!("{}", style("📈 Index analysis").bold().cyan());
    println!("  Files: {}", analysis.total_files);
    println!("  Chunks: {}", analysis.total_chunks);
    println!("  Words: {}", analysis.total_words);

    if analysis.kinds.is_empty() {
        println!();
        println!("The index is empty.");
        return Ok(());
    }

    println!();
    println!("{}", style("By document type:").bold());
    for kind in &analysis.kinds {
        println!(
            "  {}: {} files, {} chunks, {} words",
            kind.kind, kind.files, kind.chunks, kind.words
        );
    }

    println!();
    println!("{}", style("By file:").bold());
    for file in &analysis.files {
        println!(
            "  {} [{}] {} chunks, {} words",
            file.file_name, file.kind, file.chunks, file.words
        );
    }

    Ok(())
}

/// Scan stored chunk text for a literal string
#[inline]
pub async fn find_text(
    config: &Config,
    needle: &str,
    case_sensitive: bool,
    json: bool,
) -> Result<()> {
    let engine = SearchEngine::initialize(config).await?;
    let matches = engine.find_text(needle, case_sensitive).await?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&matches).context("Failed to serialize matches")?
        );
        return Ok(());
    }

    if matches.is_empty() {
        println!("No stored chunks contain \"{}\".", needle);
        return Ok(());
    }

    println!(
        "{}",
        style(format!("🔎 {} chunk(s) containing \"{}\"", matches.len(), needle)).bold().cyan()
    );
    for chunk in &matches {
        println!();
        println!("  {} (chunk {})", chunk.metadata.source.file_name(), chunk.metadata.chunk_index);
        println!("  {}", chunk.metadata.preview);
    }

    Ok(())
}

/// Delete the whole index, prompting unless `yes`
#[inline]
pub async fn clear(config: &Config, yes: bool) -> Result<()> {
    if !yes {
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Delete the entire index at {}?",
                config.index_dir().display()
            ))
            .default(false)
            .interact()?;
        if !confirmed {
            println!("Aborted.");
            return Ok(());
        }
    }

    let engine = SearchEngine::initialize(config).await?;
    engine.clear().await?;
    println!("{}", style("🗑️  Index cleared").green());
    Ok(())
}

/// Copy the index directory to a backup location
#[inline]
pub fn backup(config: &Config, dest: &Path) -> Result<()> {
    let stats = store::backup_index(&config.index_dir(), dest).context("Backup failed")?;

    println!(
        "{}",
        style(format!(
            "💾 Backed up {} files ({} bytes) to {}",
            stats.files,
            stats.bytes,
            dest.display()
        ))
        .green()
    );
    Ok(())
}

/// Replace the index directory with a backup copy, prompting unless `yes`
#[inline]
pub fn restore(config: &Config, src: &Path, yes: bool) -> Result<()> {
    let index_dir = config.index_dir();

    if !yes {
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Replace the index at {} with the backup at {}?",
                index_dir.display(),
                src.display()
            ))
            .default(false)
            .interact()?;
        if !confirmed {
            println!("Aborted.");
            return Ok(());
        }
    }

    let stats = store::restore_index(src, &index_dir).context("Restore failed")?;

    println!(
        "{}",
        style(format!(
            "♻️  Restored {} files ({} bytes) to {}",
            stats.files,
            stats.bytes,
            index_dir.display()
        ))
        .green()
    );
    Ok(())
}

/// Dump the raw candidate set and lexical analysis for a query
#[inline]
pub async fn debug(config: &Config, query: &str, count: usize) -> Result<()> {
    let engine = SearchEngine::initialize(config).await?;
    let hits = engine.candidates(query, count).await?;

    println!(
        "{}",
        style(format!(
            "🐛 {} raw candidate(s) for \"{}\" (pool size {})",
            hits.len(),
            query,
            search::candidate_pool_size(count)
        ))
        .bold()
        .cyan()
    );

    for (rank, hit) in hits.iter().enumerate() {
        let lexical = search::analyze_matches(query, &hit.metadata.text);
        println!();
        println!(
            "{}. {} (id {})",
            rank + 1,
            hit.metadata.source.file_name(),
            hit.id
        );
        println!(
            "   similarity {:.4} ({}%)",
            hit.score,
            search::relevance_percentage(hit.score)
        );
        println!(
            "   direct match: {}; tokens: [{}]; lexical score {:.2}",
            lexical.has_direct_match,
            lexical.matched_tokens.join(", "),
            lexical.score
        );
        println!("   {}", hit.metadata.preview);
    }

    Ok(())
}

fn print_results(query: &str, results: &[SearchResult]) {
    if results.is_empty() {
        println!("No results for \"{}\".", query);
        return;
    }

    println!(
        "{}",
        style(format!("🔍 {} result(s) for \"{}\"", results.len(), query)).bold().cyan()
    );

    for (rank, result) in results.iter().enumerate() {
        let location = match (result.metadata.source.sheet(), result.metadata.source.row()) {
            (Some(sheet), Some(row)) => format!(
                "{} · {} row {}",
                result.metadata.source.file_name(),
                sheet,
                row
            ),
            _ => result.metadata.source.file_name().to_string(),
        };

        println!();
        println!(
            "{}. {} {}",
            rank + 1,
            style(location).bold(),
            style(format!("[{}%]", result.relevance_percentage)).dim()
        );
        println!("   {}", result.metadata.preview);

        if let Some(lexical) = &result.lexical {
            if lexical.has_direct_match {
                println!(
                    "   {} {}",
                    style("matches:").green(),
                    lexical.matched_tokens.join(", ")
                );
            }
        }
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |name| name.to_string_lossy().into_owned())
}

fn parse_kinds(types: &[String]) -> Result<Option<Vec<DocumentKind>>> {
    if types.is_empty() {
        return Ok(None);
    }

    let kinds = types
        .iter()
        .map(|t| t.parse::<DocumentKind>())
        .collect::<crate::Result<Vec<_>>>()?;
    Ok(Some(kinds))
}

/// Expand directory arguments into their supported files; explicit file
/// arguments pass through untouched so unsupported ones fail visibly.
fn collect_files(
    paths: &[PathBuf],
    recursive: bool,
    kinds: Option<&[DocumentKind]>,
) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for path in paths {
        if path.is_dir() {
            files.extend(extract::discover_files(path, recursive, kinds)?);
        } else if path.is_file() {
            files.push(path.clone());
        } else {
            anyhow::bail!("Path does not exist: {}", path.display());
        }
    }

    files.sort();
    files.dedup();
    Ok(files)
}
