//! ocdsify CLI - convert EU procurement notices (TED, eForms) to OCDS releases.
//!
//! Batch conversion reports per-notice warnings against the single fatal
//! parse-failure mode; a bad notice never silently drops from the output.

use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

use ocdsify::{emit, Conversion, Converter, FormTable};

#[derive(Parser)]
#[command(name = "ocdsify")]
#[command(version, about = "Convert EU procurement notices (TED legacy and eForms) to OCDS releases", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert notice XML files to OCDS releases
    Convert {
        /// Notice XML files
        files: Vec<PathBuf>,

        /// Output directory for per-notice JSON files (stdout when omitted)
        #[arg(short, long)]
        out_dir: Option<PathBuf>,

        /// Output format: json, ndjson, or package
        #[arg(short, long, default_value = "json")]
        format: String,

        /// ocid prefix registered with the Open Contracting Partnership
        #[arg(long, default_value = ocdsify::extractors::DEFAULT_OCID_PREFIX)]
        ocid_prefix: String,
    },

    /// Classify a notice without converting it
    Detect {
        /// Notice XML file
        file: PathBuf,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Convert {
            files,
            out_dir,
            format,
            ocid_prefix,
        } => convert_files(files, out_dir, &format, &ocid_prefix),
        Commands::Detect { file } => detect_file(&file),
    };

    if let Err(message) = result {
        eprintln!("Error: {}", message);
        process::exit(1);
    }
}

fn convert_files(
    files: Vec<PathBuf>,
    out_dir: Option<PathBuf>,
    format: &str,
    ocid_prefix: &str,
) -> Result<(), String> {
    if files.is_empty() {
        return Err("no input files given".to_string());
    }
    if !matches!(format, "json" | "ndjson" | "package") {
        return Err(format!(
            "unsupported format '{}'. Supported formats: json, ndjson, package",
            format
        ));
    }

    let converter = Converter::with_ocid_prefix(ocid_prefix).map_err(|e| e.to_string())?;

    let mut converted: Vec<(PathBuf, Conversion)> = Vec::new();
    let mut warning_total = 0;
    let mut failed = 0;

    for file in &files {
        let outcome = fs::read(file)
            .map_err(|e| e.to_string())
            .and_then(|bytes| converter.convert_bytes(&bytes).map_err(|e| e.to_string()));

        match outcome {
            Ok(conversion) => {
                if conversion.is_clean() {
                    println!("  ✓ {} ({})", file.display(), conversion.classification.family);
                } else {
                    println!(
                        "  ⚠ {} ({}): {} warning(s)",
                        file.display(),
                        conversion.classification.family,
                        conversion.warnings.len()
                    );
                    for warning in &conversion.warnings {
                        eprintln!("    - {}", warning);
                    }
                }
                warning_total += conversion.warnings.len();
                converted.push((file.clone(), conversion));
            }
            Err(message) => {
                eprintln!("  ✗ {}: {}", file.display(), message);
                failed += 1;
            }
        }
    }

    emit_converted(&converted, out_dir.as_deref(), format)?;

    println!(
        "ℹ converted {}/{} notice(s), {} warning(s), {} failed",
        converted.len(),
        files.len(),
        warning_total,
        failed
    );

    if !converted.is_empty() {
        Ok(())
    } else {
        Err("all input notices failed to convert".to_string())
    }
}

fn emit_converted(
    converted: &[(PathBuf, Conversion)],
    out_dir: Option<&std::path::Path>,
    format: &str,
) -> Result<(), String> {
    let stdout = std::io::stdout();

    match format {
        "json" => {
            for (file, conversion) in converted {
                let json =
                    emit::to_json_pretty(&conversion.release).map_err(|e| e.to_string())?;
                match out_dir {
                    Some(dir) => {
                        fs::create_dir_all(dir).map_err(|e| e.to_string())?;
                        let stem = file
                            .file_stem()
                            .map(|s| s.to_string_lossy().into_owned())
                            .unwrap_or_else(|| "release".to_string());
                        let target = dir.join(format!("{}.json", stem));
                        fs::write(&target, json).map_err(|e| e.to_string())?;
                        println!("  → {}", target.display());
                    }
                    None => println!("{}", json),
                }
            }
        }
        "ndjson" => {
            let mut writer = emit::NdjsonWriter::new(stdout.lock());
            for (_, conversion) in converted {
                writer.write(&conversion.release).map_err(|e| e.to_string())?;
            }
            writer.flush().map_err(|e| e.to_string())?;
        }
        "package" => {
            let releases: Vec<_> = converted.iter().map(|(_, c)| &c.release).collect();
            let published = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();
            let mut out = stdout.lock();
            emit::write_package(&mut out, &releases, &published).map_err(|e| e.to_string())?;
            out.flush().map_err(|e| e.to_string())?;
        }
        _ => unreachable!("format validated by caller"),
    }

    Ok(())
}

fn detect_file(file: &PathBuf) -> Result<(), String> {
    let text = fs::read_to_string(file).map_err(|e| e.to_string())?;
    let doc = roxmltree::Document::parse(&text).map_err(|e| e.to_string())?;
    let table = FormTable::embedded()?;
    let classification = table.classify(&doc);

    println!("family: {}", classification.family);
    match classification.profile {
        Some(profile) => {
            println!("form:   {}", profile.name);
            println!("tags:   {}", profile.tags.join(", "));
        }
        None => println!("form:   not in the forms table"),
    }
    Ok(())
}
