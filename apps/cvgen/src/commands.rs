//! Subcommand implementations. Each one wires the store, pipeline and
//! exporter together; nothing here holds domain logic of its own.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::cli::{Commands, FilterArgs, ScorerKind, TailorArgs};
use crate::config::Config;
use crate::errors::AppError;
use crate::export::{export, import::import_tables, writer::write_tables};
use crate::llm_client::LlmClient;
use crate::models::{DocType, Store};
use crate::pipeline::comprehensive::BatchTailor;
use crate::pipeline::filter::{ensure_doc_type_present, filter_store, sort_by_priority};
use crate::pipeline::job_posting::{rewrite_summary, scoring_target, summary_block_id, with_summary};
use crate::pipeline::scoring::{KeywordScorer, LlmScorer, Scorer, ScoringOptions};
use crate::pipeline::selector::SectionCaps;
use crate::pipeline::tailor::{stamp_meta, tailor_store, TailorOptions};
use crate::store;

pub async fn run(command: Commands, config: &Config) -> Result<(), AppError> {
    match command {
        Commands::Export { filter, output_dir } => run_export(&filter, &output_dir),
        Commands::Tailor(args) => run_tailor(&args, config).await,
        Commands::Import {
            input_dir,
            output_file,
        } => run_import(&input_dir, &output_file),
        Commands::List { store, doc_type } => run_list(&store, doc_type),
    }
}

fn run_export(filter: &FilterArgs, output_dir: &Path) -> Result<(), AppError> {
    let loaded = store::load(&filter.store)?;
    let criteria = filter.criteria();
    ensure_doc_type_present(&loaded.store, criteria.doc_type)?;

    let mut document = filter_store(&loaded.store, &criteria);
    sort_by_priority(&mut document.entries);
    write_tables(&export(&document)?, output_dir)?;

    info!(
        "Done: {} of {} entries exported for {}, {} malformed entries skipped",
        document.entries.len(),
        loaded.store.entries.len(),
        criteria.doc_type,
        loaded.skipped.len()
    );
    Ok(())
}

async fn run_tailor(args: &TailorArgs, config: &Config) -> Result<(), AppError> {
    let loaded = store::load(&args.filter.store)?;
    let posting = std::fs::read_to_string(&args.job_posting)?;
    if posting.trim().is_empty() {
        return Err(AppError::Config(format!(
            "job posting {} is empty",
            args.job_posting.display()
        )));
    }
    info!(
        "Read {} characters from {}",
        posting.len(),
        args.job_posting.display()
    );

    let timeout = Duration::from_secs(config.llm_timeout_secs);
    let llm = match args.scorer {
        ScorerKind::Llm => {
            let key = config.api_key(args.ai_service)?;
            let client = LlmClient::new(args.ai_service, key, timeout)
                .map_err(|e| AppError::Config(format!("cannot build HTTP client: {e}")))?;
            info!("LLM client initialized (provider: {:?})", client.provider());
            Some(client)
        }
        ScorerKind::Keyword => None,
    };

    let target = match &llm {
        Some(llm) => scoring_target(llm, &posting).await,
        None => posting.clone(),
    };

    let mut options = TailorOptions::new(args.filter.criteria());
    options.min_score = args.min_score;
    options.scoring = ScoringOptions {
        concurrency: config.scoring_concurrency,
        timeout,
        improve_descriptions: args.improve_descriptions,
    };
    if let Some(json) = &args.entries_per_section {
        options.caps = SectionCaps::default().with_overrides(SectionCaps::parse_overrides(json)?);
    }

    let llm_scorer = llm.clone().map(LlmScorer);
    let scorer: Arc<dyn Scorer> = match &llm_scorer {
        Some(s) => Arc::new(s.clone()),
        None => Arc::new(KeywordScorer),
    };
    let batch: Option<&dyn BatchTailor> = match (&llm_scorer, args.comprehensive) {
        (Some(s), true) => Some(s as &dyn BatchTailor),
        (None, true) => {
            warn!("--comprehensive needs --scorer llm, scoring entry by entry");
            None
        }
        (_, false) => None,
    };

    let outcome = tailor_store(&loaded.store, &target, &options, scorer, batch).await?;
    let mut document = outcome.document;

    if let Some(summary) = outcome.summary {
        document = with_summary(document, summary);
    } else if let Some(llm) = &llm {
        document = refresh_summary(llm, document, &target).await;
    }

    let original_file = args
        .filter
        .store
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    stamp_meta(&mut document.meta, &original_file);

    std::fs::create_dir_all(&args.output_dir)?;
    let json_path = args.output_dir.join(format!("{}.json", args.output_name()));
    if !args.json_only {
        // Validate the tables before anything lands on disk.
        let tables = export(&document)?;
        store::save(&document, &json_path)?;
        write_tables(&tables, &args.output_dir)?;
    } else {
        store::save(&document, &json_path)?;
    }

    for (entry_id, reason) in &outcome.report.excluded {
        info!("Excluded '{entry_id}': {reason}");
    }
    info!(
        "Done: {} of {} entries selected, {} malformed entries skipped, {} unscored fallbacks",
        outcome.report.selected,
        outcome.report.considered,
        loaded.skipped.len(),
        outcome.report.fallbacks
    );
    Ok(())
}

/// Rewrites the summary block for the target job; keeps it on failure.
async fn refresh_summary(llm: &LlmClient, document: Store, target: &str) -> Store {
    let Some(current) = summary_block_id(&document)
        .and_then(|id| document.text_block(id))
        .map(|b| b.content.clone())
    else {
        return document;
    };
    match rewrite_summary(llm, &current, &document.entries, target).await {
        Ok(summary) => with_summary(document, summary),
        Err(e) => {
            warn!("Keeping the existing summary: {e}");
            document
        }
    }
}

fn run_import(input_dir: &Path, output_file: &Path) -> Result<(), AppError> {
    let imported = import_tables(input_dir)?;
    store::save(&imported, output_file)?;
    info!(
        "Done: {} entries written to {}",
        imported.entries.len(),
        output_file.display()
    );
    Ok(())
}

fn run_list(path: &Path, doc_type: Option<DocType>) -> Result<(), AppError> {
    let loaded = store::load(path)?;
    let db = &loaded.store;
    for section in db.sections() {
        let entries: Vec<_> = db
            .entries
            .iter()
            .filter(|e| e.section == section)
            .filter(|e| doc_type.map_or(true, |d| e.is_for(d)))
            .collect();
        if entries.is_empty() {
            continue;
        }
        println!("{section} ({})", entries.len());
        for entry in entries {
            let tags = entry.tags().join(", ");
            println!("  {:<24} {:>3}  {}  [{tags}]", entry.id, entry.importance, entry.title);
        }
    }
    Ok(())
}
