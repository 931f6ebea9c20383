use anuvada::eval::{DEFAULT_SEED, EvalMode, EvaluationConfig, EvaluationRunner};
use anuvada::ingest;
use anuvada::partition::{PoolStrategy, Selection};
use anuvada::pipeline::{FewShot, TranslationPipeline, TranslationRequest};
use anuvada::retrieval::{DatasetScope, RetrievalQuery};
use anuvada::{
    Capabilities, ChatCompletionsProvider, MockGenerator, MockMode, PipelineConfig, SqliteStore,
    TextGenerator,
};
use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command, value_parser};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_DB: &str = "anuvada.sqlite";
const MOCK_REPLY: &str = "[mock translation]";

fn cli() -> Command {
    Command::new("anuvada")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Evidence-guided Sanskrit to English translation")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("db")
                .long("db")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("SQLite database (default: $ANUVADA_DB or anuvada.sqlite)"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Pipeline configuration JSON file"),
        )
        .arg(
            Arg::new("mock")
                .long("mock")
                .short('m')
                .global(true)
                .help("Use the mock generator instead of a model server")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .global(true)
                .help("Show the draft, evidence and stage trace")
                .action(ArgAction::SetTrue),
        )
        .subcommand(Command::new("init").about("Create the database schema"))
        .subcommand(
            Command::new("ingest")
                .about("Load reference data")
                .subcommand_required(true)
                .subcommand(
                    Command::new("lexicon")
                        .about("Dictionary entries from JSON lines")
                        .arg(file_arg("file")),
                )
                .subcommand(
                    Command::new("morphology")
                        .about("CoNLL-like morphology files")
                        .arg(
                            Arg::new("files")
                                .required(true)
                                .num_args(1..)
                                .value_parser(value_parser!(PathBuf)),
                        ),
                )
                .subcommand(
                    Command::new("parallel")
                        .about("A line-aligned parallel dataset")
                        .arg(Arg::new("dataset").long("dataset").short('d').required(true))
                        .arg(file_arg("source"))
                        .arg(file_arg("target")),
                )
                .subcommand(
                    Command::new("testsets")
                        .about("Every <name>/<name>.sa + <name>.en pair under a directory")
                        .arg(file_arg("dir")),
                )
                .subcommand(
                    Command::new("glossary")
                        .about("Mandatory terminology from JSON lines")
                        .arg(file_arg("file")),
                ),
        )
        .subcommand(
            Command::new("translate")
                .about("Translate one passage")
                .arg(Arg::new("text").required(true).index(1))
                .arg(flag("grammar", "Use morphology evidence"))
                .arg(flag("dictionary", "Use dictionary evidence"))
                .arg(flag("glossary", "Enforce glossary terminology"))
                .arg(flag("full", "Enable grammar, dictionary and glossary"))
                .arg(
                    Arg::new("dataset")
                        .long("dataset")
                        .short('d')
                        .help("Retrieve style examples from this dataset ('all' for every dataset)"),
                )
                .arg(
                    Arg::new("examples")
                        .long("examples")
                        .short('k')
                        .value_parser(value_parser!(usize))
                        .default_value("3")
                        .help("Number of retrieved examples"),
                )
                .arg(flag("json", "Print the full run state as JSON")),
        )
        .subcommand(
            Command::new("evaluate")
                .about("Run an ablation mode over a dataset")
                .arg(Arg::new("dataset").long("dataset").short('d').required(true))
                .arg(
                    Arg::new("mode")
                        .long("mode")
                        .required(true)
                        .value_parser(value_parser!(EvalMode))
                        .help("A baseline, B dict, C grammar, D full, E static few-shot, F retrieval, G-I with glossary"),
                )
                .arg(flag("all", "Evaluate every item in the test pool"))
                .arg(
                    Arg::new("first")
                        .long("first")
                        .value_parser(value_parser!(usize))
                        .conflicts_with_all(["all", "random"])
                        .help("Evaluate the first N items (default 5)"),
                )
                .arg(
                    Arg::new("random")
                        .long("random")
                        .value_parser(value_parser!(usize))
                        .conflicts_with("all")
                        .help("Evaluate N items drawn with --seed"),
                )
                .arg(
                    Arg::new("seed")
                        .long("seed")
                        .value_parser(value_parser!(u64))
                        .default_value("42"),
                )
                .arg(
                    Arg::new("strategy")
                        .long("strategy")
                        .value_parser(["global", "sequential"])
                        .default_value("global")
                        .help("Partition used by example modes"),
                )
                .arg(flag(
                    "restrict-half",
                    "Test only the first half, comparable with sequential runs",
                ))
                .arg(
                    Arg::new("examples")
                        .long("examples")
                        .short('k')
                        .value_parser(value_parser!(usize))
                        .default_value("3"),
                )
                .arg(
                    Arg::new("report")
                        .long("report")
                        .value_parser(value_parser!(PathBuf))
                        .help("Write the JSON report here"),
                )
                .arg(
                    Arg::new("export-dir")
                        .long("export-dir")
                        .value_parser(value_parser!(PathBuf))
                        .help("Write the tested items as testset.sa / testset.en"),
                ),
        )
}

fn file_arg(name: &'static str) -> Arg {
    Arg::new(name)
        .required(true)
        .value_parser(value_parser!(PathBuf))
}

fn flag(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name)
        .long(name)
        .help(help)
        .action(ArgAction::SetTrue)
}

fn open_store(args: &ArgMatches) -> Result<SqliteStore> {
    let path = args
        .get_one::<PathBuf>("db")
        .cloned()
        .or_else(|| env::var_os("ANUVADA_DB").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DB));
    info!("Using database {}", path.display());
    SqliteStore::open(&path).with_context(|| format!("opening database {}", path.display()))
}

fn load_config(args: &ArgMatches) -> Result<PipelineConfig> {
    match args.get_one::<PathBuf>("config") {
        Some(path) => Ok(PipelineConfig::from_file(path)?),
        None => Ok(PipelineConfig::default()),
    }
}

fn generator(args: &ArgMatches) -> Result<Arc<dyn TextGenerator>> {
    let generator: Arc<dyn TextGenerator> = if args.get_flag("mock") {
        Arc::new(MockGenerator::new(MockMode::Fixed(MOCK_REPLY.to_string())))
    } else {
        Arc::new(ChatCompletionsProvider::from_env().context(
            "configuring the model server (set ANUVADA_LLM_BASE_URL or use --mock)",
        )?)
    };
    info!("Generator: {}", generator.provider_name());
    Ok(generator)
}

fn pipeline(args: &ArgMatches) -> Result<TranslationPipeline> {
    let store = Arc::new(open_store(args)?);
    Ok(TranslationPipeline::new(store, generator(args)?, load_config(args)?))
}

fn run_ingest(args: &ArgMatches) -> Result<()> {
    let Some((kind, sub)) = args.subcommand() else {
        anyhow::bail!("missing ingest source");
    };
    let store = open_store(sub)?;
    let path = |name: &str| sub.get_one::<PathBuf>(name).cloned().unwrap_or_default();

    match kind {
        "lexicon" => {
            let count = ingest::ingest_lexicon(&store, &path("file"))?;
            println!("✅ {} lexicon entries", count);
        }
        "morphology" => {
            let files: Vec<PathBuf> = sub
                .get_many::<PathBuf>("files")
                .map(|values| values.cloned().collect())
                .unwrap_or_default();
            let count = ingest::ingest_morphology(&store, &files)?;
            println!("✅ {} morphology records from {} files", count, files.len());
        }
        "parallel" => {
            let dataset = sub
                .get_one::<String>("dataset")
                .map(String::as_str)
                .unwrap_or_default();
            let count = ingest::ingest_parallel(&store, dataset, &path("source"), &path("target"))?;
            println!("✅ {} pairs in dataset '{}'", count, dataset);
        }
        "testsets" => {
            let loaded = ingest::ingest_testsets(&store, &path("dir"))?;
            if loaded.is_empty() {
                println!("⚠️  No datasets found");
            }
            for (name, count) in loaded {
                println!("✅ {} pairs in dataset '{}'", count, name);
            }
        }
        "glossary" => {
            let count = ingest::ingest_glossary(&store, &path("file"))?;
            println!("✅ {} glossary terms", count);
        }
        other => anyhow::bail!("unknown ingest source '{}'", other),
    }
    Ok(())
}

async fn translate(args: &ArgMatches) -> Result<()> {
    let text = args
        .get_one::<String>("text")
        .map(String::as_str)
        .unwrap_or_default();
    let verbose = args.get_flag("verbose");

    let capabilities = if args.get_flag("full") {
        Capabilities::full()
    } else {
        Capabilities {
            grammar: args.get_flag("grammar"),
            dictionary: args.get_flag("dictionary"),
            glossary: args.get_flag("glossary"),
        }
    };

    let mut request = TranslationRequest::new(text, capabilities);
    if let Some(dataset) = args.get_one::<String>("dataset") {
        let scope = match dataset.as_str() {
            "all" => DatasetScope::All,
            name => DatasetScope::Named(name.to_string()),
        };
        let k = args.get_one::<usize>("examples").copied().unwrap_or(3);
        request = request.with_few_shot(FewShot::Retrieve(RetrievalQuery::new(text, scope, k)));
    }

    let state = pipeline(args)?.run(&request).await?;

    if args.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&state)?);
        return Ok(());
    }

    if verbose {
        println!("📝 Source: {}", state.source_text);
        println!("🏷  Mode: {}", state.mode_label);
        println!();
        println!("Draft: {}", state.draft_translation);
        let evidence = state.evidence.evidence_text();
        if !evidence.is_empty() {
            println!();
            println!("{}", evidence);
        }
        for (term, definition) in &state.evidence.glossary {
            println!("📖 {}: {}", term, definition);
        }
        println!();
        for event in &state.trace {
            println!("   [{}] {}", event.stage, event.message);
        }
        println!();
    }
    println!("{}", state.final_translation);
    Ok(())
}

async fn evaluate(args: &ArgMatches) -> Result<()> {
    let dataset = args
        .get_one::<String>("dataset")
        .cloned()
        .unwrap_or_default();
    let mode = args
        .get_one::<EvalMode>("mode")
        .copied()
        .unwrap_or(EvalMode::Baseline);

    let selection = if args.get_flag("all") {
        Selection::All
    } else if let Some(n) = args.get_one::<usize>("random").copied() {
        let seed = args.get_one::<u64>("seed").copied().unwrap_or(DEFAULT_SEED);
        Selection::Random { n, seed }
    } else {
        Selection::FirstN(args.get_one::<usize>("first").copied().unwrap_or(5))
    };
    let strategy = match args.get_one::<String>("strategy").map(String::as_str) {
        Some("sequential") => PoolStrategy::SequentialHalves,
        _ => PoolStrategy::Global,
    };

    let config = EvaluationConfig {
        dataset,
        mode,
        selection,
        strategy,
        restrict_pool_to_half: args.get_flag("restrict-half"),
        num_examples: args.get_one::<usize>("examples").copied().unwrap_or(3),
    };

    let pipeline = pipeline(args)?;
    let report = EvaluationRunner::new(&pipeline).run(&config).await?;

    for item in &report.items {
        match (&item.hypothesis, item.chrf, &item.error) {
            (Some(hyp), Some(chrf), _) => {
                println!("[{}] chrF++ {:5.1}  {}", item.item_id, chrf, hyp);
                if args.get_flag("verbose") {
                    println!("      ref: {}", item.reference);
                }
            }
            (_, _, Some(err)) => println!("[{}] ❌ {}", item.item_id, err),
            _ => {}
        }
    }

    println!();
    println!("🏁 {} on '{}' (selection: {})", mode, report.dataset, report.selection_label);
    println!("   {} succeeded, {} failed", report.succeeded, report.failed);
    if let Some(chrf) = report.corpus_chrf {
        println!("   Corpus chrF++: {:.2}", chrf);
    }

    if let Some(path) = args.get_one::<PathBuf>("report") {
        report.write_json(path)?;
        println!("   Report written to {}", path.display());
    }
    if let Some(dir) = args.get_one::<PathBuf>("export-dir") {
        report.export_test_set(dir)?;
        println!("   Test set written to {}", dir.display());
    }
    Ok(())
}

fn init(args: &ArgMatches) -> Result<()> {
    let store = open_store(args)?;
    for table in ["lexicon", "morphology", "corpus", "glossary", "run_log"] {
        let rows = store.row_count(table)?.unwrap_or(0);
        println!("✅ {:<10} {} rows", table, rows);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("anuvada=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match matches.subcommand() {
        Some(("init", sub)) => init(sub),
        Some(("ingest", sub)) => run_ingest(sub),
        Some(("translate", sub)) => translate(sub).await,
        Some(("evaluate", sub)) => evaluate(sub).await,
        _ => unreachable!("a subcommand is required"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        cli().debug_assert();
    }

    #[test]
    fn test_evaluate_arguments() {
        let matches = cli()
            .try_get_matches_from([
                "anuvada", "evaluate", "--dataset", "mkb", "--mode", "f", "--random", "10",
                "--strategy", "sequential", "--mock",
            ])
            .unwrap();
        let (name, sub) = matches.subcommand().unwrap();
        assert_eq!(name, "evaluate");
        assert_eq!(sub.get_one::<EvalMode>("mode"), Some(&EvalMode::DynamicRetrieval));
        assert_eq!(sub.get_one::<usize>("random"), Some(&10));
        assert_eq!(sub.get_one::<u64>("seed"), Some(&42));
        assert!(sub.get_flag("mock"));
    }

    #[test]
    fn test_first_conflicts_with_all() {
        let result = cli().try_get_matches_from([
            "anuvada", "evaluate", "-d", "mkb", "--mode", "A", "--all", "--first", "3",
        ]);
        assert!(result.is_err());
    }
}
