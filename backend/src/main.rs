//! Shipload CLI - convert shipment spreadsheets to transport booking XML
//!
//! # Main Commands
//!
//! ```bash
//! shipload convert bookings.xlsx -m columns.csv   # writes bookings.xml
//! shipload convert bookings.xlsx -o -             # XML to stdout
//! shipload serve                                  # HTTP server (port 3000)
//! ```
//!
//! # Debug Commands
//!
//! ```bash
//! shipload inspect bookings.xlsx     # headers as read and normalized
//! shipload mapping columns.csv       # parsed mapping table
//! shipload normalize "Delivery Adress"
//! ```

use clap::{Parser, Subcommand};
use shipload::{
    convert_file, normalize, CellValue, ConvertOptions, HeaderNormalizer, MappingTable, Section,
    Settings, SheetTable, Workbook,
};
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "shipload")]
#[command(about = "Convert shipment spreadsheets to transport booking XML", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Sheet selection shared by commands that read a spreadsheet.
#[derive(clap::Args)]
struct SheetArgs {
    /// 1-based header row (default: HEADER_ROW or 4)
    #[arg(long)]
    header_row: Option<usize>,

    /// Worksheet name (default: SHEET_NAME or the first sheet)
    #[arg(long)]
    sheet: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a spreadsheet to booking XML
    Convert {
        /// Input spreadsheet (.xlsx, .xlsm, .xlsb, .xls, .ods, .csv)
        input: PathBuf,

        /// Mapping table (default: MAPPING_FILE)
        #[arg(short, long)]
        mapping: Option<PathBuf>,

        /// Output file, `-` for stdout (default: input with .xml extension)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        sheet: SheetArgs,

        /// Only accept exact header matches
        #[arg(long)]
        no_fuzzy: bool,

        /// Minimum fuzzy similarity, 0 to 1
        #[arg(long)]
        threshold: Option<f64>,
    },

    /// Show the headers of a spreadsheet as read and normalized
    Inspect {
        /// Input spreadsheet
        input: PathBuf,

        #[command(flatten)]
        sheet: SheetArgs,
    },

    /// Show a parsed mapping table
    Mapping {
        /// Mapping file
        file: PathBuf,
    },

    /// Print the normalized form of header texts
    Normalize {
        /// Header texts
        #[arg(required = true)]
        texts: Vec<String>,
    },

    /// Start HTTP server
    Serve {
        /// Port to listen on (default: SERVER_PORT or 3000)
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match Settings::from_env() {
        Ok(settings) => match cli.command {
            Commands::Convert {
                input,
                mapping,
                output,
                sheet,
                no_fuzzy,
                threshold,
            } => cmd_convert(
                &settings,
                &input,
                mapping,
                output.as_deref(),
                &sheet,
                no_fuzzy,
                threshold,
            ),

            Commands::Inspect { input, sheet } => cmd_inspect(&settings, &input, &sheet),

            Commands::Mapping { file } => cmd_mapping(&file),

            Commands::Normalize { texts } => cmd_normalize(&texts),

            Commands::Serve { port } => cmd_serve(settings, port).await,
        },
        Err(e) => Err(e.into()),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn options_for(settings: &Settings, sheet: &SheetArgs) -> ConvertOptions {
    let mut options = ConvertOptions::from(settings);
    if let Some(row) = sheet.header_row {
        options.header_row = row;
    }
    if let Some(name) = &sheet.sheet {
        options.sheet = Some(name.clone());
    }
    options
}

fn cmd_convert(
    settings: &Settings,
    input: &Path,
    mapping: Option<PathBuf>,
    output: Option<&Path>,
    sheet: &SheetArgs,
    no_fuzzy: bool,
    threshold: Option<f64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mapping = match mapping {
        Some(path) => path,
        None => settings.require_mapping()?,
    };

    let mut options = options_for(settings, sheet);
    if no_fuzzy {
        options.matching.fuzzy = false;
    }
    if let Some(t) = threshold {
        if !(0.0..=1.0).contains(&t) {
            return Err(format!("--threshold must be between 0 and 1, got {}", t).into());
        }
        options.matching.threshold = t;
    }

    let to_stdout = output.map_or(false, |p| p == Path::new("-"));
    if to_stdout {
        let mapping = MappingTable::load(&mapping)?;
        let workbook = Workbook::open(input, options.sheet.as_deref())?;
        let conversion = shipload::convert(&workbook, &mapping, &options)?;
        let bytes = conversion.to_bytes()?;
        std::io::stdout().write_all(&bytes)?;
        print_summary(&conversion);
        return Ok(());
    }

    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| input.with_extension("xml"));
    let conversion = convert_file(input, &mapping, &output, &options)?;
    print_summary(&conversion);
    Ok(())
}

fn print_summary(conversion: &shipload::Conversion) {
    let stats = &conversion.stats;
    eprintln!(
        "Sheet '{}': {} rows read, {} shipments, {} rows skipped, {} warnings",
        stats.sheet,
        stats.rows_read,
        stats.shipments,
        stats.rows_skipped,
        conversion.warnings.len()
    );
}

fn cmd_inspect(
    settings: &Settings,
    input: &Path,
    sheet: &SheetArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let options = options_for(settings, sheet);
    let workbook = Workbook::open(input, options.sheet.as_deref())?;
    let table = SheetTable::from_workbook(
        &workbook,
        options.header_row,
        &HeaderNormalizer::new(options.corrections.clone()),
    )?;

    println!(
        "Sheet '{}', header row {}, {} data rows",
        workbook.sheet_name(),
        table.header_row(),
        table.rows().len()
    );
    for (index, column) in table.columns().iter().enumerate() {
        println!(
            "  {:>3}  {:<4} {:<30} {}",
            index,
            shipload::models::column_letters(index),
            column.label,
            column.name
        );
    }
    if let Some(first) = table.rows().first() {
        let sample: Vec<String> = first
            .cells
            .iter()
            .map(|c: &CellValue| shipload::clean_text(c))
            .collect();
        println!("First data row ({}): {}", first.number, sample.join(" | "));
    }
    Ok(())
}

fn cmd_mapping(file: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let mapping = MappingTable::load(file)?;
    println!("{} field(s)", mapping.len());
    for section in Section::ALL {
        let specs = mapping.section(section);
        if specs.is_empty() {
            continue;
        }
        println!("[{}]", section);
        for spec in specs {
            match &spec.matchmode {
                Some(mode) => println!("  {:<20} <- {}  (matchmode {})", spec.tag, spec.source, mode),
                None => println!("  {:<20} <- {}", spec.tag, spec.source),
            }
        }
    }
    for note in mapping.skipped() {
        println!("skipped: {}", note);
    }
    Ok(())
}

fn cmd_normalize(texts: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    for text in texts {
        println!("{}\t{}", text, normalize(text));
    }
    Ok(())
}

async fn cmd_serve(mut settings: Settings, port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(port) = port {
        settings.server_port = port;
    }
    shipload::server::start_server(settings).await
}
