use clap::Parser;
use sift_context::text::{DEFAULT_MARKDOWN_DELIMITERS, TextSplitter};
use std::fs;
use std::io::{self, Read};
use std::process;

/// A CLI tool to split a text file into overlapping chunks and print them as JSON.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the input text file. If not provided, reads from stdin.
    #[arg(short, long)]
    input: Option<String>,

    /// Maximum length of each chunk, in characters.
    #[arg(short, long, default_value_t = 1000)]
    chunk_size: usize,

    /// Characters shared by consecutive chunks.
    #[arg(short, long, default_value_t = 200)]
    overlap: usize,

    /// Comma-separated list of regex patterns for delimiters.
    /// Defaults to Markdown delimiters if not provided.
    #[arg(short, long, value_delimiter = ',')]
    delimiters: Option<Vec<String>>,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let file_content = if let Some(input_path) = args.input {
        fs::read_to_string(input_path)?
    } else {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    };

    let delimiter_patterns_owned: Vec<String> = if let Some(d) = args.delimiters {
        d
    } else {
        DEFAULT_MARKDOWN_DELIMITERS
            .iter()
            .map(|&s| s.to_string())
            .collect()
    };

    let delimiter_patterns_refs: Vec<&str> = delimiter_patterns_owned
        .iter()
        .map(|s| s.as_str())
        .collect();

    let splitter = TextSplitter::new(&delimiter_patterns_refs, args.chunk_size, args.overlap)?;
    let spans = splitter.split(&file_content);

    println!("{}", serde_json::to_string_pretty(&spans)?);
    Ok(())
}
