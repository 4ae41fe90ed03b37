use anyhow::{bail, Context, Result};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use haul_payroll::{
    calculate_payroll, render_text, write_csv_file, NameSimilarityAuditor,
    PayrollParser, SettlementConfig, SettlementReconciler, VERSION,
};

const USAGE: &str = "Usage: haul-payroll <input.txt> [--config cfg.json] [--output report.txt] \
[--csv out.csv] [--json out.json]";

#[derive(Debug, Default)]
struct Options {
    input: PathBuf,
    config: Option<PathBuf>,
    output: Option<PathBuf>,
    csv: Option<PathBuf>,
    json: Option<PathBuf>,
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() || args.iter().any(|a| a == "--help" || a == "-h") {
        println!("haul-payroll {}", VERSION);
        println!("{}", USAGE);
        return Ok(());
    }

    let options = parse_args(&args)?;
    run(&options)
}

fn parse_args(args: &[String]) -> Result<Options> {
    let mut options = Options::default();
    let mut input = None;
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        let slot = match arg.as_str() {
            "--config" => &mut options.config,
            "--output" => &mut options.output,
            "--csv" => &mut options.csv,
            "--json" => &mut options.json,
            flag if flag.starts_with("--") => bail!("Unknown option: {}\n{}", flag, USAGE),
            path => {
                if input.is_some() {
                    bail!("Only one input file is accepted\n{}", USAGE);
                }
                input = Some(PathBuf::from(path));
                continue;
            }
        };
        let value = iter
            .next()
            .with_context(|| format!("{} needs a file path\n{}", arg, USAGE))?;
        *slot = Some(PathBuf::from(value));
    }

    options.input = input.with_context(|| format!("Missing input file\n{}", USAGE))?;
    Ok(options)
}

fn run(options: &Options) -> Result<()> {
    println!("💰 Haul Payroll {}", VERSION);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    // 1. Config
    let config = match &options.config {
        Some(path) => {
            let config = SettlementConfig::from_file(path)?;
            println!("✓ Loaded config from {}", path.display());
            config
        }
        None => SettlementConfig::default(),
    };

    // 2. Parse
    println!("\n📂 Parsing {}...", options.input.display());
    let input = PayrollParser::with_config(&config).parse_file(&options.input)?;
    println!(
        "✓ {} sessions, {} events, {} recruitments, {} participants",
        input.contents.len(),
        input.events.len(),
        input.recruitments.len(),
        input.registry.count()
    );
    for diagnostic in &input.diagnostics {
        println!(
            "⚠️  line {}: {} ({})",
            diagnostic.line_number, diagnostic.reason, diagnostic.line
        );
    }

    // 3. Settle
    println!("\n⚖️  Settling...");
    let payroll = calculate_payroll(input, &config).context("Settlement failed")?;
    println!("✓ {}", payroll.summary());

    // 4. Reconcile
    let reconciliation = SettlementReconciler::new().reconcile(&payroll);
    if reconciliation.is_balanced() {
        println!("✓ {}", reconciliation.summary());
    } else {
        bail!("❌ {}", reconciliation.summary());
    }

    // 5. Report
    let report = render_text(&payroll);
    println!("\n{}", report);

    let output = options.output.clone().unwrap_or_else(default_output_path);
    write_file(&output, &report)?;
    println!("💾 Report written to {}", output.display());

    if let Some(path) = &options.csv {
        write_csv_file(&payroll, path)?;
        println!("💾 CSV written to {}", path.display());
    }
    if let Some(path) = &options.json {
        let json = serde_json::to_string_pretty(&payroll).context("Failed to serialize payroll")?;
        write_file(path, &json)?;
        println!("💾 JSON written to {}", path.display());
    }

    // 6. Similar names
    let pairs = NameSimilarityAuditor::with_config(&config).audit_registry(&payroll.participants);
    if !pairs.is_empty() {
        println!("\n🔎 Possibly the same person:");
        for pair in &pairs {
            println!("   {} ↔ {} ({:.2})", pair.first, pair.second, pair.score);
        }
    }

    Ok(())
}

/// payroll_DD_MM_YYYY.txt in the working directory
fn default_output_path() -> PathBuf {
    let date = chrono::Local::now().format("%d_%m_%Y");
    PathBuf::from(format!("payroll_{}.txt", date))
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_args() {
        let options = parse_args(&args(&["in.txt", "--csv", "out.csv", "--config", "cfg.json"])).unwrap();

        assert_eq!(options.input, PathBuf::from("in.txt"));
        assert_eq!(options.csv, Some(PathBuf::from("out.csv")));
        assert_eq!(options.config, Some(PathBuf::from("cfg.json")));
        assert!(options.json.is_none());
    }

    #[test]
    fn test_parse_args_errors() {
        assert!(parse_args(&args(&["--csv", "out.csv"])).is_err());
        assert!(parse_args(&args(&["in.txt", "--csv"])).is_err());
        assert!(parse_args(&args(&["in.txt", "--bogus", "x"])).is_err());
        assert!(parse_args(&args(&["a.txt", "b.txt"])).is_err());
    }

    #[test]
    fn test_default_output_path() {
        let name = default_output_path().to_string_lossy().to_string();
        assert!(name.starts_with("payroll_"));
        assert!(name.ends_with(".txt"));
        assert_eq!(name.len(), "payroll_DD_MM_YYYY.txt".len());
    }

    #[test]
    fn test_run_writes_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("input.txt");
        fs::write(
            &input,
            "KONTENTY:\n1: lead\n  1: 100, 10, BEACH, 1, TAK, , merlin, beslarin\n",
        )
        .unwrap();

        let options = Options {
            input,
            output: Some(dir.path().join("report.txt")),
            csv: Some(dir.path().join("out.csv")),
            json: Some(dir.path().join("out.json")),
            ..Options::default()
        };
        run(&options).unwrap();

        let report = fs::read_to_string(dir.path().join("report.txt")).unwrap();
        assert!(report.contains("LOOT BEACH - 1"));
        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.path().join("out.json")).unwrap()).unwrap();
        assert_eq!(json["gross_items"], 100_000);
        assert!(dir.path().join("out.csv").exists());
    }
}
