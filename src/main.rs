//! Main CLI application for the station packing solver

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use station_packing::{
    config::{CliOverrides, OutputFormat, Settings},
    extract::{question_files, CnfExtractor},
    logging,
    sat::{CnfLookup, SatEncoder},
    station::{
        station_channels, DatasetLoader, FileDatasetLoader, Question,
        io::{DOMAIN_FILE, INTERFERENCE_FILE},
    },
    utils::{ColorOutput, ResultFormatter},
    StationPackingFacade,
};
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Parser)]
#[command(name = "station_packing")]
#[command(about = "Station packing SAT solver")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve a station packing question
    Solve {
        /// Question file
        question: PathBuf,

        /// Configuration file path
        #[arg(short, long, default_value = "config/default.yaml")]
        config: PathBuf,

        /// Cutoff in seconds (overrides config)
        #[arg(long)]
        cutoff: Option<f64>,

        /// Seed (overrides config)
        #[arg(short, long)]
        seed: Option<u64>,

        /// Dataset root directory (overrides config)
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Output format (overrides config)
        #[arg(short, long, value_parser = parse_format)]
        format: Option<OutputFormat>,

        /// Also write the result into this directory
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Skip the neighborhood presolver
        #[arg(long)]
        no_presolve: bool,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Write the CNF of question files, named by the SHA-1 of their station set
    Encode {
        /// Question file, or directory of question files
        questions: PathBuf,

        /// Configuration file path
        #[arg(short, long, default_value = "config/default.yaml")]
        config: PathBuf,

        /// Dataset root directory (overrides config)
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// CNF output directory (overrides config)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Check an external solver's output against a question
    Decode {
        /// Question file the CNF was extracted from
        question: PathBuf,

        /// Solver output holding a `v` line
        solution: PathBuf,

        /// Configuration file path
        #[arg(short, long, default_value = "config/default.yaml")]
        config: PathBuf,

        /// Dataset root directory (overrides config)
        #[arg(short, long)]
        data: Option<PathBuf>,
    },

    /// Create example configuration, dataset and question files
    Setup {
        /// Directory to create files in
        #[arg(short, long, default_value = ".")]
        directory: PathBuf,

        /// Force overwrite existing files
        #[arg(short, long)]
        force: bool,
    },
}

fn parse_format(value: &str) -> Result<OutputFormat, String> {
    match value {
        "text" => Ok(OutputFormat::Text),
        "json" => Ok(OutputFormat::Json),
        other => Err(format!("unknown format '{}', expected text or json", other)),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Solve {
            question,
            config,
            cutoff,
            seed,
            data,
            format,
            output,
            no_presolve,
            verbose,
        } => {
            let overrides = CliOverrides {
                cutoff_seconds: cutoff,
                seed,
                data_root: data,
                format,
                no_presolve,
                verbose,
                ..CliOverrides::default()
            };
            solve_command(question, config, overrides, output)
        }
        Commands::Encode {
            questions,
            config,
            data,
            output,
            verbose,
        } => {
            let overrides = CliOverrides {
                data_root: data,
                cnf_directory: output,
                verbose,
                ..CliOverrides::default()
            };
            encode_command(questions, config, overrides)
        }
        Commands::Decode {
            question,
            solution,
            config,
            data,
        } => {
            let overrides = CliOverrides {
                data_root: data,
                ..CliOverrides::default()
            };
            decode_command(question, solution, config, overrides)
        }
        Commands::Setup { directory, force } => setup_command(directory, force),
    }
}

fn load_settings(config_path: &Path, overrides: &CliOverrides) -> Result<Settings> {
    let mut settings = if config_path.exists() {
        Settings::from_file(&config_path.to_path_buf())
            .with_context(|| format!("Failed to load config from {}", config_path.display()))?
    } else {
        eprintln!(
            "{}",
            ColorOutput::warning(&format!(
                "Config file {} not found, using defaults",
                config_path.display()
            ))
        );
        Settings::default()
    };

    settings.merge_with_cli(overrides);
    settings
        .validate()
        .context("Configuration validation failed")?;
    Ok(settings)
}

fn solve_command(
    question_path: PathBuf,
    config_path: PathBuf,
    overrides: CliOverrides,
    output_dir: Option<PathBuf>,
) -> Result<()> {
    let settings = load_settings(&config_path, &overrides)?;
    logging::init(&settings.logging.level);

    let question = Question::from_file(&question_path)
        .with_context(|| format!("Failed to read question {}", question_path.display()))?;

    let start_time = Instant::now();
    let mut facade = StationPackingFacade::from_settings(&settings);
    let result = facade
        .solve_question(&question, settings.cutoff(), settings.solver.seed)
        .context("Failed to solve question")?;
    facade.notify_shutdown();

    eprintln!("{}", ResultFormatter::format_headline(&result));
    if overrides.verbose {
        eprintln!(
            "Total time including setup: {:.3}s",
            start_time.elapsed().as_secs_f64()
        );
    }
    println!("{}", ResultFormatter::format(&result, settings.output.format)?);

    if let Some(output_dir) = output_dir {
        let name = question_path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "result".to_string());
        ResultFormatter::save_result(&result, &output_dir, &name, settings.output.format)
            .context("Failed to save result")?;
    }

    Ok(())
}

fn encode_command(questions: PathBuf, config_path: PathBuf, overrides: CliOverrides) -> Result<()> {
    let settings = load_settings(&config_path, &overrides)?;
    logging::init(&settings.logging.level);

    let files = question_files(&questions)
        .with_context(|| format!("Failed to list questions in {}", questions.display()))?;
    if files.is_empty() {
        eprintln!("{}", ColorOutput::warning("No question files found"));
        return Ok(());
    }

    let extractor = CnfExtractor::new(
        Box::new(FileDatasetLoader::with_root(&settings.data.root)),
        CnfLookup::new(&settings.output.cnf_directory),
    );
    let extractions = extractor.extract(&files);
    print!(
        "{}",
        ResultFormatter::format_extractions(&extractions, overrides.verbose)
    );

    let failed = extractions.iter().filter(|e| e.outcome.is_err()).count();
    if failed > 0 {
        anyhow::bail!("{} of {} questions could not be encoded", failed, extractions.len());
    }
    Ok(())
}

fn decode_command(
    question_path: PathBuf,
    solution_path: PathBuf,
    config_path: PathBuf,
    overrides: CliOverrides,
) -> Result<()> {
    let settings = load_settings(&config_path, &overrides)?;

    let question = Question::from_file(&question_path)
        .with_context(|| format!("Failed to read question {}", question_path.display()))?;
    let dataset = FileDatasetLoader::with_root(&settings.data.root)
        .load(&question.station_config)
        .with_context(|| format!("Failed to load dataset {}", question.station_config))?;
    let instance = question.to_instance(&dataset.stations)?;

    let output = std::fs::read_to_string(&solution_path)
        .with_context(|| format!("Failed to read {}", solution_path.display()))?;
    let literals = SatEncoder::parse_solver_output(&output).context("Malformed solver output")?;
    let assignment = SatEncoder::decode(&instance, &literals).context("Model does not decode")?;

    for (station, channel) in station_channels(&assignment) {
        println!("{},{}", station, channel);
    }

    if dataset.constraints.is_satisfying_assignment(&assignment) {
        eprintln!("{}", ColorOutput::success("Assignment is interference free"));
        Ok(())
    } else {
        anyhow::bail!("Assignment violates interference constraints")
    }
}

fn setup_command(directory: PathBuf, force: bool) -> Result<()> {
    println!("{}", ColorOutput::info("Setting up project structure..."));

    let config_dir = directory.join("config");
    let dataset_dir = directory.join("data").join("example");
    let question_dir = directory.join("questions");

    for dir in [&config_dir, &dataset_dir, &question_dir] {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory {}", dir.display()))?;
    }

    let mut settings = Settings::default();
    settings.data.root = PathBuf::from("data");
    let files: [(PathBuf, String); 4] = [
        (
            config_dir.join("default.yaml"),
            serde_yaml::to_string(&settings).context("Failed to serialize settings")?,
        ),
        (
            dataset_dir.join(DOMAIN_FILE),
            "DOMAIN,1,14,15,16\nDOMAIN,2,14,15,16\nDOMAIN,3,15,16\nDOMAIN,4,16\n".to_string(),
        ),
        (
            dataset_dir.join(INTERFERENCE_FILE),
            "CO,1,2,3\nCO,2,3\nADJ+1,3,4\n".to_string(),
        ),
        (
            question_dir.join("example.txt"),
            "STATION_CONFIG,example\nBAND,UHF\nHIGHEST,16\n1,14\n2,15\n3,16\n4\n".to_string(),
        ),
    ];

    for (path, content) in files {
        if path.exists() && !force {
            println!("Skipped: {} (already exists)", path.display());
            continue;
        }
        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Created: {}", path.display());
    }

    println!("\n{}", ColorOutput::success("Setup complete!"));
    println!("\nNext steps:");
    println!("1. Edit {}", config_dir.join("default.yaml").display());
    println!("2. Run: station_packing solve questions/example.txt");

    Ok(())
}
