//! rca-cli: terminal client for the RCA Agent HTTP API
//!
//! # Subcommands
//! - `analyze [FILE] [--json]`: analyze a log file (stdin when omitted or `-`)
//! - `history [-n <limit>] [--oldest-first] [--json]`: list stored analyses, newest first
//! - `show <ID> [--json]`: print one stored analysis
//! - `feedback <ID> --helpful yes|no [--comment ..]`: rate a stored analysis
//! - `status`: show server health

use std::io::Read;

use clap::{Parser, Subcommand, ValueEnum};
use serde::Deserialize;

const DEFAULT_SERVER: &str = "http://127.0.0.1:8501";
const DEFAULT_LIMIT: u32 = 10;

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(
    name = "rca-cli",
    version,
    about = "RCA Agent: analyze logs and browse analysis history"
)]
struct Cli {
    /// RCA Agent HTTP server URL (overrides RCA_SERVER_URL env var)
    #[arg(long, env = "RCA_SERVER_URL", default_value = DEFAULT_SERVER)]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Analyze a log and store the result
    Analyze {
        /// Log file to analyze; reads stdin when omitted or "-"
        file: Option<String>,

        /// Print the stored record as JSON
        #[arg(long)]
        json: bool,
    },

    /// List stored analyses
    History {
        /// Maximum number of records to return
        #[arg(short = 'n', long, default_value_t = DEFAULT_LIMIT)]
        limit: u32,

        /// List in creation order instead of newest first
        #[arg(long)]
        oldest_first: bool,

        /// Print records as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show one stored analysis
    Show {
        id: i64,

        /// Print the record as JSON
        #[arg(long)]
        json: bool,
    },

    /// Leave feedback on a stored analysis
    Feedback {
        id: i64,

        /// Was the analysis helpful?
        #[arg(long, value_enum)]
        helpful: YesNo,

        /// Optional free-text comment
        #[arg(long)]
        comment: Option<String>,
    },

    /// Show RCA Agent server status
    Status,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum YesNo {
    Yes,
    No,
}

// ============================================================================
// API Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct FixPlan {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub steps: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct DetectedError {
    pub timestamp: Option<String>,
    pub error_message: String,
    pub error_type: String,
}

#[derive(Debug, Deserialize)]
pub struct Solution {
    pub error_message: String,
    pub immediate_fix: FixPlan,
    pub permanent_fix: FixPlan,
    pub preventive_measures: FixPlan,
    #[serde(default)]
    pub references: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct Feedback {
    pub helpful: bool,
    pub comment: Option<String>,
}

/// A stored analysis as returned by the RCA Agent HTTP API
#[derive(Debug, Deserialize)]
pub struct AnalysisRecord {
    pub id: i64,
    pub raw_log: String,
    pub parsed_error: Vec<DetectedError>,
    pub suggestion: Vec<Solution>,
    pub model: String,
    pub created_at: String,
    pub feedback: Option<Feedback>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryResponse {
    pub records: Vec<AnalysisRecord>,
    pub count: usize,
}

// ============================================================================
// Text rendering
// ============================================================================

/// One-line listing: `#id  timestamp  Type: message`, message capped at 80 chars.
pub fn summary_line(record: &AnalysisRecord) -> String {
    let headline = match record.parsed_error.first() {
        Some(e) => format!("{}: {}", e.error_type, e.error_message),
        None => "No errors detected".to_string(),
    };
    let mut headline: String = headline.chars().take(80).collect();
    if record.parsed_error.len() > 1 {
        headline.push_str(&format!(" (+{} more)", record.parsed_error.len() - 1));
    }
    let feedback = match &record.feedback {
        Some(f) if f.helpful => "  [helpful]",
        Some(_) => "  [not helpful]",
        None => "",
    };
    format!("#{:<5} {}  {}{}", record.id, record.created_at, headline, feedback)
}

fn render_plan(out: &mut String, title: &str, plan: &FixPlan) {
    out.push_str(&format!("  {}: {}\n", title, plan.summary));
    for step in &plan.steps {
        out.push_str(&format!("    - {}\n", step));
    }
}

/// Full human-readable report for a single record.
pub fn render_record(record: &AnalysisRecord) -> String {
    let mut out = format!(
        "Analysis #{} ({}, {})\n\n",
        record.id, record.created_at, record.model
    );

    if record.parsed_error.is_empty() {
        out.push_str("No errors detected in the logs.\n");
    } else {
        out.push_str("Errors detected:\n");
        for (i, e) in record.parsed_error.iter().enumerate() {
            out.push_str(&format!(
                "  {}. [{}] {} (at {})\n",
                i + 1,
                e.error_type,
                e.error_message,
                e.timestamp.as_deref().unwrap_or("N/A")
            ));
        }
    }

    for (i, s) in record.suggestion.iter().enumerate() {
        out.push_str(&format!("\nSolution {} for: {}\n", i + 1, s.error_message));
        render_plan(&mut out, "Immediate fix", &s.immediate_fix);
        render_plan(&mut out, "Permanent fix", &s.permanent_fix);
        render_plan(&mut out, "Preventive measures", &s.preventive_measures);
        for r in &s.references {
            out.push_str(&format!("  See: {}\n", r));
        }
    }

    if let Some(f) = &record.feedback {
        out.push_str(&format!(
            "\nFeedback: {}{}\n",
            if f.helpful { "Yes" } else { "No" },
            f.comment
                .as_deref()
                .map(|c| format!(" - {}", c))
                .unwrap_or_default()
        ));
    }

    out
}

// ============================================================================
// HTTP Client Calls
// ============================================================================

fn client(timeout_secs: u64) -> anyhow::Result<reqwest::blocking::Client> {
    Ok(reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()?)
}

/// Send a request and decode the JSON body, exiting 1 on connection or HTTP errors.
fn fetch<T: for<'de> Deserialize<'de>>(request: reqwest::blocking::RequestBuilder, url: &str) -> T {
    let resp = match request.send() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("rca-cli: connection failed to {}: {}", url, e);
            std::process::exit(1);
        }
    };

    if !resp.status().is_success() {
        let status = resp.status();
        let body: serde_json::Value = resp.json().unwrap_or_default();
        eprintln!(
            "rca-cli: server returned {}: {}",
            status,
            body["error"].as_str().unwrap_or("no details")
        );
        std::process::exit(1);
    }

    match resp.json() {
        Ok(v) => v,
        Err(e) => {
            eprintln!("rca-cli: failed to parse response from {}: {}", url, e);
            std::process::exit(1);
        }
    }
}

fn read_log(file: Option<&str>) -> anyhow::Result<String> {
    let mut text = String::new();
    match file {
        None | Some("-") => {
            std::io::stdin().read_to_string(&mut text)?;
        }
        Some(path) => {
            text = std::fs::read_to_string(path)?;
        }
    }
    Ok(text)
}

fn print_json(value: &serde_json::Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn do_analyze(server: &str, file: Option<&str>, json_output: bool) -> anyhow::Result<()> {
    let log = read_log(file)?;
    if log.trim().is_empty() {
        eprintln!("rca-cli: log text is empty; nothing to analyze");
        std::process::exit(1);
    }

    // LLM round trips with retries can take several minutes
    let client = client(300)?;
    let url = format!("{}/analyze", server);
    let body: serde_json::Value =
        fetch(client.post(&url).json(&serde_json::json!({ "log": log })), &url);

    if json_output {
        return print_json(&body);
    }
    let record: AnalysisRecord = serde_json::from_value(body)?;
    print!("{}", render_record(&record));
    Ok(())
}

fn do_history(server: &str, limit: u32, oldest_first: bool, json_output: bool) -> anyhow::Result<()> {
    let client = client(30)?;
    let url = format!(
        "{}/history?limit={}&newest_first={}",
        server, limit, !oldest_first
    );
    let body: serde_json::Value = fetch(client.get(&url), &url);

    if json_output {
        return print_json(&body);
    }
    let history: HistoryResponse = serde_json::from_value(body)?;
    if history.count == 0 {
        eprintln!("No analyses stored yet.");
        return Ok(());
    }
    for record in &history.records {
        println!("{}", summary_line(record));
    }
    Ok(())
}

fn do_show(server: &str, id: i64, json_output: bool) -> anyhow::Result<()> {
    let client = client(30)?;
    let url = format!("{}/history/{}", server, id);
    let body: serde_json::Value = fetch(client.get(&url), &url);

    if json_output {
        return print_json(&body);
    }
    let record: AnalysisRecord = serde_json::from_value(body)?;
    println!("Log:\n{}\n", record.raw_log.trim_end());
    print!("{}", render_record(&record));
    Ok(())
}

fn do_feedback(server: &str, id: i64, helpful: YesNo, comment: Option<String>) -> anyhow::Result<()> {
    let client = client(30)?;
    let url = format!("{}/history/{}/feedback", server, id);
    let payload = serde_json::json!({
        "helpful": matches!(helpful, YesNo::Yes),
        "comment": comment,
    });
    let _: serde_json::Value = fetch(client.post(&url).json(&payload), &url);
    println!("Thank you for your feedback on analysis #{}", id);
    Ok(())
}

/// Show the server status by calling GET /health.
fn do_status(server: &str) -> anyhow::Result<()> {
    let client = client(10)?;
    let url = format!("{}/health", server);

    match client.get(&url).send() {
        Ok(r) if r.status().is_success() => {
            let body: serde_json::Value = r.json().unwrap_or_default();
            let llm = match &body["llm"] {
                serde_json::Value::Object(o) => format!(
                    "{} ({})",
                    o.get("backend").and_then(|v| v.as_str()).unwrap_or("?"),
                    o.get("model").and_then(|v| v.as_str()).unwrap_or("?")
                ),
                other => other.as_str().unwrap_or("?").to_string(),
            };
            println!("RCA Agent: {}", body["status"].as_str().unwrap_or("unknown"));
            println!("Version:   {}", body["version"].as_str().unwrap_or("?"));
            println!("SQLite:    {}", body["sqlite"].as_str().unwrap_or("?"));
            println!("LLM:       {}", llm);
        }
        Ok(r) => {
            eprintln!("rca-cli: server unhealthy (HTTP {})", r.status());
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("rca-cli: cannot reach {}: {}", url, e);
            std::process::exit(1);
        }
    }

    Ok(())
}

// ============================================================================
// Main
// ============================================================================

fn main() {
    let cli = Cli::parse();
    let server = cli.server.trim_end_matches('/').to_string();

    let result = match cli.command {
        Commands::Analyze { file, json } => do_analyze(&server, file.as_deref(), json),
        Commands::History {
            limit,
            oldest_first,
            json,
        } => do_history(&server, limit, oldest_first, json),
        Commands::Show { id, json } => do_show(&server, id, json),
        Commands::Feedback {
            id,
            helpful,
            comment,
        } => do_feedback(&server, id, helpful, comment),
        Commands::Status => do_status(&server),
    };

    if let Err(e) = result {
        eprintln!("rca-cli: {}", e);
        std::process::exit(1);
    }
}

// ============================================================================
// Tests
// ============================================================================
