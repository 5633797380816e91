//! undoc CLI - document content extraction tool

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use undoc::ocr::TesseractEngine;
use undoc::render::{self, JsonFormat, PlaceholderMode};
use undoc::{Engine, ExtractionConfig, ProcessedDocument, TableStrategy};

#[derive(Parser)]
#[command(name = "undoc")]
#[command(author = "iyulab")]
#[command(version)]
#[command(about = "Extract text, tables and OCR words from DOCX, PDF and images", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract to the JSON response shape
    Json {
        #[command(flatten)]
        extract: ExtractArgs,

        /// Output file (stdout if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Output compact JSON
        #[arg(long)]
        compact: bool,
    },

    /// Extract to plain text
    Text {
        #[command(flatten)]
        extract: ExtractArgs,

        /// Output file (stdout if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Remove table markers and omit the table appendix
        #[arg(long, env = "UNDOC_STRIP_PLACEHOLDERS")]
        strip_placeholders: bool,

        /// Wrap the text in the JSON text response
        #[arg(long)]
        json: bool,
    },

    /// Show what was extracted
    Info {
        #[command(flatten)]
        extract: ExtractArgs,
    },

    /// Show version information
    Version,
}

/// Input file and extraction settings shared by every extracting command.
#[derive(Args, Debug)]
struct ExtractArgs {
    /// Input document (DOCX, PDF, PNG, JPEG, TIFF, BMP, WebP)
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// JSON configuration file; flags override its values
    #[arg(long, value_name = "FILE", env = "UNDOC_CONFIG")]
    config: Option<PathBuf>,

    /// PDF table strategy: lines_strict, lines, text, engine_default
    #[arg(long, env = "UNDOC_TABLE_STRATEGY")]
    strategy: Option<String>,

    /// Alignment tolerance in points for the text strategy (0-50)
    #[arg(long, env = "UNDOC_TEXT_TOLERANCE")]
    text_tolerance: Option<u32>,

    /// Drop PDF table rows whose cells are all empty
    #[arg(long, env = "UNDOC_REMOVE_EMPTY_ROWS")]
    remove_empty_rows: bool,

    /// OCR language(s), e.g. eng or eng+deu
    #[arg(long, env = "UNDOC_OCR_LANGUAGE")]
    lang: Option<String>,

    /// Tesseract page segmentation mode (0-13)
    #[arg(long, env = "UNDOC_OCR_PSM")]
    psm: Option<u8>,

    /// Tesseract engine mode (0-4)
    #[arg(long, env = "UNDOC_OCR_OEM")]
    oem: Option<u8>,

    /// Skip grayscale/binarize/deskew before OCR
    #[arg(long)]
    no_preprocess: bool,

    /// Skip deskew before OCR
    #[arg(long)]
    no_deskew: bool,

    /// Restrict OCR output to these characters
    #[arg(long, env = "UNDOC_OCR_WHITELIST")]
    whitelist: Option<String>,

    /// Never OCR PDFs without a text layer
    #[arg(long)]
    no_ocr_fallback: bool,

    /// Skip undecodable PDF pages instead of failing
    #[arg(long)]
    lenient: bool,

    /// Process PDF pages one at a time
    #[arg(long)]
    sequential: bool,

    /// Path of the tesseract program
    #[arg(long, value_name = "PATH", env = "UNDOC_TESSERACT")]
    tesseract: Option<PathBuf>,
}

impl ExtractArgs {
    /// Build the extraction config: file first, then flags.
    fn config(&self) -> undoc::Result<ExtractionConfig> {
        let mut config = match &self.config {
            Some(path) => ExtractionConfig::from_json_file(path)?,
            None => ExtractionConfig::default(),
        };

        if let Some(name) = &self.strategy {
            config = config.with_table_strategy(TableStrategy::from_name(name));
        }
        if let Some(tolerance) = self.text_tolerance {
            config = config.with_text_tolerance(tolerance);
        }
        if self.remove_empty_rows {
            config = config.remove_empty_rows();
        }
        if let Some(lang) = &self.lang {
            config = config.with_ocr_language(lang.clone());
        }
        if let Some(psm) = self.psm {
            config.ocr.page_segmentation_mode = psm;
        }
        if let Some(oem) = self.oem {
            config.ocr.engine_mode = oem;
        }
        if self.no_preprocess {
            config.ocr.apply_preprocessing = false;
        }
        if self.no_deskew {
            config.ocr.deskew = false;
        }
        if let Some(whitelist) = &self.whitelist {
            config = config.with_char_whitelist(whitelist.clone());
        }
        if self.no_ocr_fallback {
            config = config.without_pdf_ocr_fallback();
        }
        if self.lenient {
            config = config.lenient();
        }
        if self.sequential {
            config = config.sequential();
        }

        config.validate()?;
        Ok(config)
    }

    fn engine(&self) -> Engine {
        match &self.tesseract {
            Some(path) => Engine::new().with_ocr_engine(Arc::new(TesseractEngine::with_binary(path))),
            None => Engine::new(),
        }
    }

    /// Read and extract the input file, with a spinner on the terminal.
    fn process(&self) -> Result<ProcessedDocument, Box<dyn std::error::Error>> {
        let config = self.config()?;
        let bytes = fs::read(&self.input)?;

        let pb = ProgressBar::new_spinner();
        pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
        pb.set_message(format!("Extracting {}...", self.input.display()));
        pb.enable_steady_tick(Duration::from_millis(100));

        let result = self
            .engine()
            .process(&bytes, &self.input.to_string_lossy(), &config);
        pb.finish_and_clear();

        Ok(result?)
    }
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Json {
            extract,
            output,
            compact,
        } => cmd_json(&extract, output.as_deref(), compact),
        Commands::Text {
            extract,
            output,
            strip_placeholders,
            json,
        } => cmd_text(&extract, output.as_deref(), strip_placeholders, json),
        Commands::Info { extract } => cmd_info(&extract),
        Commands::Version => {
            cmd_version();
            Ok(())
        }
    };

    if let Err(e) = result {
        match e.downcast_ref::<undoc::Error>() {
            Some(err) => eprintln!(
                "{} ({}): {}",
                "Error".red().bold(),
                err.status_code(),
                err
            ),
            None => eprintln!("{}: {}", "Error".red().bold(), e),
        }
        std::process::exit(1);
    }
}

fn write_output(output: Option<&Path>, content: &str) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(path) = output {
        fs::write(path, content)?;
        println!("{} {}", "Saved to".green(), path.display());
    } else {
        println!("{}", content);
    }
    Ok(())
}

fn cmd_json(
    extract: &ExtractArgs,
    output: Option<&Path>,
    compact: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let doc = extract.process()?;

    let format = if compact {
        JsonFormat::Compact
    } else {
        JsonFormat::Pretty
    };

    let json = render::to_json(&doc, format)?;
    write_output(output, &json)
}

fn cmd_text(
    extract: &ExtractArgs,
    output: Option<&Path>,
    strip_placeholders: bool,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let doc = extract.process()?;

    let mode = if strip_placeholders {
        PlaceholderMode::Strip
    } else {
        PlaceholderMode::Keep
    };

    let text = if json {
        render::to_text_response(&doc, mode, JsonFormat::Pretty)?
    } else {
        render::to_text(&doc, mode)
    };
    write_output(output, &text)
}

fn cmd_info(extract: &ExtractArgs) -> Result<(), Box<dyn std::error::Error>> {
    let doc = extract.process()?;

    println!("{}", "Document Information".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());

    println!("{}: {}", "File".bold(), extract.input.display());
    println!("{}: {}", "Source type".bold(), doc.source_type);
    if let Some(method) = doc.pdf_processing_method {
        let method = serde_json::to_value(method)?;
        println!("{}: {}", "PDF method".bold(), method.as_str().unwrap_or_default());
    }
    println!("{}: {}", "Extracted".bold(), doc.extraction_timestamp);

    println!();
    println!("{}", "Content Statistics".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());

    let text = doc.text();
    println!("{}: {}", "Words".bold(), text.split_whitespace().count());
    println!("{}: {}", "Characters".bold(), text.chars().count());

    if let Some(ocr) = doc.ocr_content() {
        let details = &ocr.word_level_details;
        println!("{}: {}", "OCR words".bold(), details.len());
        if !details.is_empty() {
            let mean = details.iter().map(|w| w.confidence).sum::<f32>() / details.len() as f32;
            println!("{}: {:.1}", "Mean confidence".bold(), mean);
        }
        println!("{}: {}", "OCR language".bold(), ocr.ocr_settings_used.language);
    } else {
        println!("{}: {}", "Tables".bold(), doc.tables().len());
        for table in doc.tables() {
            let page = table
                .page_number
                .map(|p| format!(", page {}", p))
                .unwrap_or_default();
            println!(
                "  {} {}: {} columns, {} rows{}",
                "├─".dimmed(),
                table.id,
                table.column_count(),
                table.row_count(),
                page
            );
        }
    }

    Ok(())
}

fn cmd_version() {
    println!("{} {}", "undoc".cyan().bold(), env!("CARGO_PKG_VERSION"));
    println!("Document content extraction tool");
    println!();
    println!("Repository: {}", "https://github.com/iyulab/undoc".dimmed());
    println!("License: MIT");
}
