//! CLI tool filling a spreadsheet template with quantities from invoice PDFs

use invoice_qty::{process_batch, Job, QtyError};
use std::env;
use std::path::PathBuf;
use std::process;
use std::time::Instant;

fn usage(program: &str) -> ! {
    eprintln!(
        "Usage: {} --template <Template.xlsx> [--out <dir>] [--unit <token>]... [--anchor <product>]... [--json] <pdf_file>...",
        program
    );
    eprintln!();
    eprintln!("Reads barcode/quantity pairs from each PDF and writes <out>/<pdf name>.xlsx.");
    eprintln!("  --out      output directory (default: CM-Done)");
    eprintln!("  --unit     quantity unit label, repeatable (default: Tabs)");
    eprintln!("  --anchor   product name pinned to the quantity on its line, repeatable");
    process::exit(1);
}

fn main() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let args: Vec<String> = env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("pdf2qty");

    let mut template: Option<PathBuf> = None;
    let mut out_dir = PathBuf::from("CM-Done");
    let mut units: Vec<String> = Vec::new();
    let mut anchors: Vec<String> = Vec::new();
    let mut json_output = false;
    let mut pdfs: Vec<PathBuf> = Vec::new();

    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--template" => template = iter.next().map(PathBuf::from),
            "--out" => match iter.next() {
                Some(dir) => out_dir = PathBuf::from(dir),
                None => usage(program),
            },
            "--unit" => match iter.next() {
                Some(unit) => units.push(unit.clone()),
                None => usage(program),
            },
            "--anchor" => match iter.next() {
                Some(anchor) => anchors.push(anchor.clone()),
                None => usage(program),
            },
            "--json" => json_output = true,
            "-h" | "--help" => usage(program),
            other if other.starts_with("--") => {
                eprintln!("Unknown option: {}", other);
                usage(program);
            }
            other => pdfs.push(PathBuf::from(other)),
        }
    }

    let Some(template) = template else {
        usage(program)
    };
    if pdfs.is_empty() {
        usage(program);
    }

    let mut job = Job::new(template, out_dir);
    if !units.is_empty() {
        job.extractor.patterns.unit_tokens = units;
    }
    job.extractor.patterns.anchors = anchors;

    let start = Instant::now();

    let report = match process_batch(&pdfs, &job) {
        Ok(report) => report,
        Err(e) => fail(&e, json_output),
    };

    if json_output {
        let outputs: Vec<String> = report
            .outputs
            .iter()
            .map(|p| format!("\"{}\"", escape_json(&p.display().to_string())))
            .collect();
        let failures: Vec<String> = report
            .failures
            .iter()
            .map(|(p, e)| {
                format!(
                    r#"{{"file":"{}","error":"{}"}}"#,
                    escape_json(&p.display().to_string()),
                    escape_json(&e.to_string())
                )
            })
            .collect();
        println!(
            r#"{{"outputs":[{}],"failures":[{}],"processing_time_ms":{}}}"#,
            outputs.join(","),
            failures.join(","),
            start.elapsed().as_millis()
        );
    } else {
        println!("Invoice Quantities");
        println!("==================");
        println!("Template: {}", job.template.display());
        println!();
        for out in &report.outputs {
            println!("  written  {}", out.display());
        }
        for (pdf, e) in &report.failures {
            println!("  FAILED   {}: {}", pdf.display(), e);
        }
        println!();
        println!(
            "{} of {} PDFs processed in {}ms",
            report.outputs.len(),
            pdfs.len(),
            start.elapsed().as_millis()
        );
    }

    if !report.is_success() {
        process::exit(2);
    }
}

fn fail(e: &QtyError, json_output: bool) -> ! {
    if json_output {
        println!(r#"{{"error":"{}"}}"#, escape_json(&e.to_string()));
    } else {
        eprintln!("Error: {}", e);
    }
    process::exit(1);
}

fn escape_json(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out
}
