//! # formprint CLI
//!
//! Usage:
//!   formprint render export.json -o forms.pdf
//!   cat export.json | formprint render -o forms.pdf
//!   formprint render export.json --commands > pages.json
//!   formprint example > export.json

use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use formprint::RenderError;

/// formprint: render data-capture forms to PDF
#[derive(Parser)]
#[command(name = "formprint")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a JSON export (file, or stdin if omitted)
    Render {
        input: Option<PathBuf>,

        /// Output path
        #[arg(short, long, default_value = "output.pdf")]
        output: PathBuf,

        /// Print the draw commands as JSON instead of writing a PDF
        #[arg(long)]
        commands: bool,

        /// Enable verbose logging
        #[arg(short, long)]
        verbose: bool,
    },

    /// Print a sample export
    Example,
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), RenderError> {
    match cli.command {
        Commands::Render {
            input,
            output,
            commands,
            verbose,
        } => {
            init_logging(verbose);
            let json = read_input(input.as_ref())?;
            let document: formprint::ExportDocument = serde_json::from_str(&json)?;
            let rendered = formprint::render(&document)?;
            log::info!(
                "rendered {} field(s) onto {} page(s)",
                document.fields.len(),
                rendered.page_count()
            );

            if commands {
                let out = serde_json::to_string_pretty(&rendered)
                    .map_err(|e| RenderError::Io(e.into()))?;
                println!("{}", out);
                return Ok(());
            }

            let pdf = formprint::write_pdf(&rendered, &document.options)?;
            fs::write(&output, &pdf)?;
            log::info!("wrote {} bytes to {}", pdf.len(), output.display());
        }
        Commands::Example => {
            print!("{}", example_export_json());
        }
    }
    Ok(())
}

/// Initialize logging based on verbosity.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_millis()
        .init();
}

fn read_input(path: Option<&PathBuf>) -> Result<String, RenderError> {
    match path {
        Some(p) => Ok(fs::read_to_string(p)?),
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
    }
}

fn example_export_json() -> &'static str {
    r##"{
  "options": {
    "title": "Baseline visit",
    "confidential": true,
    "autoNumber": true
  },
  "fields": [
    {
      "name": "record_id",
      "formName": "demographics",
      "formLabel": "Demographics",
      "elementType": "text",
      "label": "Record ID"
    },
    {
      "name": "name",
      "formName": "demographics",
      "elementType": "text",
      "label": "Name",
      "sectionHeader": "About you"
    },
    {
      "name": "dob",
      "formName": "demographics",
      "elementType": "text",
      "label": "Date of birth",
      "validation": "date_ymd"
    },
    {
      "name": "sex",
      "formName": "demographics",
      "elementType": "radio",
      "label": "Sex",
      "choices": [
        { "code": "0", "label": "Female" },
        { "code": "1", "label": "Male" }
      ]
    },
    {
      "name": "pregnant",
      "formName": "demographics",
      "elementType": "yesno",
      "label": "Currently pregnant?",
      "branchingLogic": "[sex] = '0'"
    },
    {
      "name": "mood_morning",
      "formName": "demographics",
      "elementType": "radio",
      "label": "Mornings",
      "sectionHeader": "How do you feel?",
      "gridName": "mood",
      "choices": [
        { "code": "1", "label": "Poor" },
        { "code": "2", "label": "Fair" },
        { "code": "3", "label": "Good" }
      ]
    },
    {
      "name": "mood_evening",
      "formName": "demographics",
      "elementType": "radio",
      "label": "Evenings",
      "gridName": "mood",
      "choices": [
        { "code": "1", "label": "Poor" },
        { "code": "2", "label": "Fair" },
        { "code": "3", "label": "Good" }
      ]
    },
    {
      "name": "comments",
      "formName": "demographics",
      "elementType": "textarea",
      "label": "Comments",
      "note": "Anything else we should know"
    }
  ],
  "records": [
    {
      "record": "101",
      "events": [
        {
          "instances": [
            {
              "values": {
                "record_id": "101",
                "name": "Ada Lovelace",
                "dob": "1815-12-10",
                "sex": "0",
                "pregnant": "0",
                "mood_morning": "3",
                "mood_evening": "2",
                "comments": "Prefers afternoon appointments."
              }
            }
          ]
        }
      ]
    }
  ],
  "locks": [
    {
      "record": "101",
      "form": "demographics",
      "locked": true,
      "lockedBy": "jdoe",
      "lockedAt": "2026-03-02 14:05"
    }
  ]
}
"##
}
