use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::llm_client::Provider;
use crate::models::DocType;
use crate::pipeline::filter::{FilterCriteria, FilterLogic};
use crate::pipeline::selector::DEFAULT_MIN_SCORE;

#[derive(Debug, Parser)]
#[command(name = "cvgen", version)]
#[command(about = "Build CV and resume tables from one tagged career database", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Filter the store for one document type and export CSV tables
    Export {
        #[command(flatten)]
        filter: FilterArgs,
        /// Directory the CSV tables are written to
        #[arg(long)]
        output_dir: PathBuf,
    },
    /// Score entries against a job posting, keep the best per section, export
    Tailor(TailorArgs),
    /// Rebuild a store JSON file from exported CSV tables
    Import {
        #[arg(long)]
        input_dir: PathBuf,
        #[arg(long)]
        output_file: PathBuf,
    },
    /// Print entries grouped by section
    List {
        #[arg(long)]
        store: PathBuf,
        /// Only entries for this document type
        #[arg(long = "type", value_enum)]
        doc_type: Option<DocType>,
    },
}

#[derive(Debug, Clone, Args)]
pub struct FilterArgs {
    /// Career database JSON file
    #[arg(long)]
    pub store: PathBuf,
    #[arg(long = "type", value_enum)]
    pub doc_type: DocType,
    /// Required tags (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub tags: Vec<String>,
    /// Required companies (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub companies: Vec<String>,
    /// How tag and company criteria combine
    #[arg(long, value_enum, default_value_t = FilterLogic::And)]
    pub logic: FilterLogic,
}

impl FilterArgs {
    pub fn criteria(&self) -> FilterCriteria {
        FilterCriteria::for_doc_type(self.doc_type)
            .with_tags(self.tags.iter().cloned())
            .with_companies(self.companies.iter().cloned())
            .with_logic(self.logic)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ScorerKind {
    /// Semantic scoring through the completion service
    Llm,
    /// Offline keyword overlap
    Keyword,
}

#[derive(Debug, Clone, Args)]
pub struct TailorArgs {
    #[command(flatten)]
    pub filter: FilterArgs,
    /// Plain-text job posting
    #[arg(long)]
    pub job_posting: PathBuf,
    #[arg(long)]
    pub output_dir: PathBuf,
    /// Base name of the tailored JSON file (without extension)
    #[arg(long)]
    pub output_name: Option<String>,
    #[arg(long, value_enum, default_value_t = ScorerKind::Llm)]
    pub scorer: ScorerKind,
    #[arg(long, value_enum, default_value_t = Provider::OpenAi)]
    pub ai_service: Provider,
    /// Tailor the whole store in one call instead of scoring entry by entry
    #[arg(long, default_value_t = false)]
    pub comprehensive: bool,
    /// Replace descriptions with the rewritten bullets returned by scoring
    #[arg(long, default_value_t = false)]
    pub improve_descriptions: bool,
    /// JSON mapping of section to max entries, e.g. '{"education": 2}'
    #[arg(long)]
    pub entries_per_section: Option<String>,
    #[arg(
        long,
        default_value_t = DEFAULT_MIN_SCORE,
        value_parser = clap::value_parser!(u8).range(0..=10)
    )]
    pub min_score: u8,
    /// Only write the tailored JSON, skip the CSV tables
    #[arg(long, default_value_t = false)]
    pub json_only: bool,
}

impl TailorArgs {
    pub fn output_name(&self) -> String {
        self.output_name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| format!("tailored_{}", self.filter.doc_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_args() {
        let cli = Cli::try_parse_from([
            "cvgen", "export", "--store", "cv.json", "--type", "resume", "--tags", "ml,rust",
            "--logic", "or", "--output-dir", "out",
        ])
        .unwrap();
        let Commands::Export { filter, output_dir } = cli.command else {
            panic!("expected export");
        };
        let criteria = filter.criteria();
        assert_eq!(criteria.doc_type, DocType::Resume);
        assert_eq!(criteria.logic, FilterLogic::Or);
        assert_eq!(criteria.tags.len(), 2);
        assert_eq!(output_dir, PathBuf::from("out"));
    }

    #[test]
    fn test_tailor_defaults() {
        let cli = Cli::try_parse_from([
            "cvgen", "tailor", "--store", "cv.json", "--type", "cv", "--job-posting", "job.txt",
            "--output-dir", "out",
        ])
        .unwrap();
        let Commands::Tailor(args) = cli.command else {
            panic!("expected tailor");
        };
        assert_eq!(args.scorer, ScorerKind::Llm);
        assert_eq!(args.ai_service, Provider::OpenAi);
        assert_eq!(args.min_score, DEFAULT_MIN_SCORE);
        assert_eq!(args.output_name(), "tailored_cv");
        assert!(!args.comprehensive && !args.json_only);
    }

    #[test]
    fn test_min_score_out_of_range_rejected() {
        let result = Cli::try_parse_from([
            "cvgen", "tailor", "--store", "cv.json", "--type", "cv", "--job-posting", "job.txt",
            "--output-dir", "out", "--min-score", "11",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_doc_type_rejected() {
        let result =
            Cli::try_parse_from(["cvgen", "list", "--store", "cv.json", "--type", "letter"]);
        assert!(result.is_err());
    }
}
