//! Debug tool: show how each barcode in a PDF gets its quantity

use invoice_qty::quantity::{Observer, Resolution, Unresolved};
use invoice_qty::{ExtractorConfig, PageSource, PdfPages, QuantityExtractor};
use std::env;

/// Prints every decision the extractor makes
struct Printer;

impl Observer for Printer {
    fn resolved(&mut self, r: &Resolution<'_>) {
        println!(
            "  p{:<3} {}  qty={:<8} raw={:<10} via={:<18} dist={}",
            r.page + 1,
            r.barcode,
            r.quantity,
            format!("{:?}", r.raw),
            r.strategy,
            r.distance
        );
    }

    fn unresolved(&mut self, u: &Unresolved<'_>) {
        println!("  p{:<3} {}  UNRESOLVED context={:?}", u.page + 1, u.barcode, u.context);
    }

    fn shadowed(&mut self, winner: &Resolution<'_>, strategy: &'static str, raw: &str) {
        println!(
            "         {}  also {} -> {:?} (kept {:?})",
            winner.barcode, strategy, raw, winner.raw
        );
    }
}

fn main() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Debug)
        .parse_default_env()
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: debug_barcodes <pdf_path> [--text]");
        std::process::exit(1);
    }
    let dump_text = args.iter().any(|a| a == "--text");

    let pages = PdfPages::open(&args[1]).expect("Failed to open PDF");

    if dump_text {
        for i in 0..pages.page_count() {
            let text = pages.page_text(i).expect("Failed to read page");
            println!("=== PAGE {} ({} chars) ===", i + 1, text.chars().count());
            println!("{}", text);
            println!();
        }
    }

    let config = ExtractorConfig {
        report_shadowed: true,
        ..ExtractorConfig::default()
    };
    let extractor = QuantityExtractor::new(config).expect("Invalid patterns");
    println!("Strategies: {}", extractor.strategy_names().join(" > "));
    println!();

    let extraction = extractor
        .extract_with(&pages, &mut Printer)
        .expect("Failed to extract");

    println!();
    println!("=== {} barcodes ===", extraction.len());
    for (i, (barcode, quantity)) in extraction.iter().enumerate() {
        println!("{:>3}. {}  {}", i + 1, barcode, quantity);
    }
}
