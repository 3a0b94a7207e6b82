use anyhow::Result;
use clap::{Parser, Subcommand};
use semsearch::commands::{SearchArgs, Target, embed_sentence, provision_collection, run_search};
use semsearch::config::{Config, get_config_dir, init_config, show_config};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "semsearch")]
#[command(about = "Semantic search over a vector collection, plus the loader that builds it")]
#[command(version)]
struct Cli {
    /// Configuration directory (defaults to ~/.semsearch)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the default configuration, or show the current one
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Replace a collection with a dataset and verify it
    Provision {
        /// Documents, one JSON object per line
        documents: PathBuf,
        /// Vectors, one JSON array per line, aligned with the documents
        vectors: PathBuf,
        /// Where to write the provisioning report
        output: PathBuf,
        /// Collection to replace
        #[arg(long)]
        collection: Option<String>,
        /// LanceDB URI to write to
        #[arg(long)]
        index_uri: Option<String>,
        /// Load only the first N documents (0 loads everything)
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Search a collection by text and/or reference document ids
    Search {
        /// Query text
        text: Option<String>,
        /// Reference document ids, e.g. "12,7,8"
        #[arg(long)]
        ids: Option<String>,
        /// Only return documents in this category
        #[arg(long)]
        category: Option<String>,
        /// Maximum number of results
        #[arg(long, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
        limit: Option<usize>,
        /// Include stored vectors in the results
        #[arg(long)]
        with_vectors: bool,
        /// Include payloads in the results
        #[arg(long)]
        with_payload: bool,
        #[arg(long)]
        collection: Option<String>,
        #[arg(long)]
        index_uri: Option<String>,
    },
    /// Print the embedding of a sentence
    Embed {
        sentence: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config_dir = match cli.config_dir {
        Some(dir) => dir,
        None => get_config_dir()?,
    };
    let config = Config::load(&config_dir)?;

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config(&config);
            } else if init_config(&config)? {
                println!(
                    "Wrote default configuration to {}",
                    config.config_file_path().display()
                );
            } else {
                println!(
                    "Configuration already exists at {}",
                    config.config_file_path().display()
                );
            }
        }
        Commands::Provision {
            documents,
            vectors,
            output,
            collection,
            index_uri,
            limit,
        } => {
            let target = Target {
                collection,
                index_uri,
            };
            provision_collection(&config, &target, &documents, &vectors, &output, limit).await?;
        }
        Commands::Search {
            text,
            ids,
            category,
            limit,
            with_vectors,
            with_payload,
            collection,
            index_uri,
        } => {
            let target = Target {
                collection,
                index_uri,
            };
            let args = SearchArgs {
                text,
                ids,
                category,
                limit,
                with_vectors,
                with_payload,
            };
            run_search(&config, &target, &args).await?;
        }
        Commands::Embed { sentence } => {
            embed_sentence(&config, &sentence).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn search_with_text_only() {
        let cli = Cli::try_parse_from(["semsearch", "search", "baseball results"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Search {
                text, ids, limit, ..
            } = parsed.command
            {
                assert_eq!(text, Some("baseball results".to_string()));
                assert_eq!(ids, None);
                assert_eq!(limit, None);
            }
        }
    }

    #[test]
    fn search_with_ids_and_category() {
        let cli = Cli::try_parse_from([
            "semsearch",
            "search",
            "--ids",
            "12, 7, 8",
            "--category",
            "sports-watch",
            "--limit",
            "5",
            "--with-payload",
        ]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Search {
                text,
                ids,
                category,
                limit,
                with_payload,
                with_vectors,
                ..
            } = parsed.command
            {
                assert_eq!(text, None);
                assert_eq!(ids, Some("12, 7, 8".to_string()));
                assert_eq!(category, Some("sports-watch".to_string()));
                assert_eq!(limit, Some(5));
                assert!(with_payload);
                assert!(!with_vectors);
            }
        }
    }

    #[test]
    fn provision_command() {
        let cli = Cli::try_parse_from([
            "semsearch",
            "provision",
            "docs.jsonl",
            "vectors.jsonl",
            "report.json",
            "--limit",
            "100",
            "--collection",
            "livedoor",
        ]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Provision {
                documents,
                output,
                limit,
                collection,
                ..
            } = parsed.command
            {
                assert_eq!(documents, PathBuf::from("docs.jsonl"));
                assert_eq!(output, PathBuf::from("report.json"));
                assert_eq!(limit, Some(100));
                assert_eq!(collection, Some("livedoor".to_string()));
            }
        }
    }

    #[test]
    fn provision_requires_all_paths() {
        let cli = Cli::try_parse_from(["semsearch", "provision", "docs.jsonl"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
        }
    }

    #[test]
    fn global_config_dir() {
        let cli = Cli::try_parse_from(["semsearch", "embed", "hello", "--config-dir", "/tmp/x"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            assert_eq!(parsed.config_dir, Some(PathBuf::from("/tmp/x")));
            if let Commands::Embed { sentence } = parsed.command {
                assert_eq!(sentence, "hello");
            }
        }
    }

    #[test]
    fn config_show_flag() {
        let cli = Cli::try_parse_from(["semsearch", "config", "--show"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Config { show } = parsed.command {
                assert!(show);
            }
        }
    }

    #[test]
    fn invalid_limit() {
        let cli = Cli::try_parse_from(["semsearch", "search", "q", "--limit", "many"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::ValueValidation);
        }
    }

    #[test]
    fn zero_search_limit_is_rejected() {
        let cli = Cli::try_parse_from(["semsearch", "search", "q", "--limit", "0"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::ValueValidation);
        }
    }

    #[test]
    fn zero_provision_limit_parses() {
        let cli = Cli::try_parse_from([
            "semsearch",
            "provision",
            "docs.jsonl",
            "vectors.jsonl",
            "report.json",
            "--limit",
            "0",
        ]);
        assert!(cli.is_ok());
    }

    #[test]
    fn invalid_command() {
        let cli = Cli::try_parse_from(["semsearch", "invalid"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::InvalidSubcommand);
        }
    }

    #[test]
    fn help_message() {
        let cli = Cli::try_parse_from(["semsearch", "--help"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::DisplayHelp);
        }
    }
}
