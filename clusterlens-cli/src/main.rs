// ClusterLens CLI - MongoDB log metrics, AI analyses and report chat

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use clusterlens_core::{
    render_report_html, AnalysisFilter, AnalysisOwner, AnalysisRecord, AnalysisRequest,
    AnalysisStatus, AnalysisStore, AnalysisType, Cluster, ClusterLens, MetricKind, MetricSelection,
    ReportConversation,
};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "clusterlens")]
#[command(about = "MongoDB log metrics with AI-powered analysis", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Extract metrics from log files and print them as JSON
    Metrics {
        /// Metric categories to extract (cpu, memory, slow-queries)
        #[arg(long, value_delimiter = ',')]
        metrics: Vec<MetricKind>,

        /// MongoDB log files, processed in order
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Extract metrics, store them and generate an AI analysis
    Analyze {
        /// Cluster the logs belong to
        #[arg(long)]
        cluster: String,

        /// Requesting user
        #[arg(long, env = "CLUSTERLENS_USER")]
        user: String,

        /// Requesting organization
        #[arg(long, env = "CLUSTERLENS_ORG")]
        org: String,

        /// Analysis name (defaults to a timestamped name)
        #[arg(long)]
        name: Option<String>,

        /// Analysis type: performance, slow-queries, summary or other
        #[arg(long = "type", default_value = "other")]
        analysis_type: AnalysisType,

        /// AI provider (openai, claude, openrouter)
        #[arg(long)]
        provider: Option<String>,

        /// Model override for the provider
        #[arg(long)]
        model: Option<String>,

        /// Metric categories to extract (cpu, memory, slow-queries)
        #[arg(long, value_delimiter = ',')]
        metrics: Vec<MetricKind>,

        /// MongoDB log files, processed in order
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// List stored analyses, newest first
    List {
        /// Only analyses whose cluster name contains this text, or whose cluster id equals it
        #[arg(long)]
        cluster: Option<String>,

        /// Maximum number of analyses to show
        #[arg(long)]
        limit: Option<i64>,
    },

    /// Show one analysis and its report
    Show {
        id: String,

        /// Write the report as an HTML page
        #[arg(long)]
        html: Option<PathBuf>,
    },

    /// Ask follow-up questions about an analysis report
    Chat {
        id: String,

        /// AI provider (openai, claude, openrouter)
        #[arg(long)]
        provider: Option<String>,

        /// Model override for the provider
        #[arg(long)]
        model: Option<String>,
    },

    /// Manage clusters
    Cluster {
        #[command(subcommand)]
        command: ClusterCommands,
    },
}

#[derive(Subcommand, Debug)]
enum ClusterCommands {
    /// Register a cluster
    Add {
        name: String,

        #[arg(long)]
        description: Option<String>,

        #[arg(long)]
        org: Option<String>,
    },

    /// List registered clusters
    List,
}

fn selection_from(kinds: &[MetricKind]) -> MetricSelection {
    if kinds.is_empty() {
        MetricSelection::all()
    } else {
        MetricSelection::from_kinds(kinds)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("clusterlens=info".parse()?)
                .add_directive("clusterlens_core=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli).await {
        error!("Command failed: {:#}", e);
        eprintln!("\n✗ {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let lens = ClusterLens::new()?;

    match cli.command {
        Commands::Metrics { metrics, files } => {
            let aggregate = lens.extract_metrics(&files, &selection_from(&metrics)).await?;
            println!("{}", aggregate.to_pretty_json()?);
            Ok(())
        }

        Commands::Analyze {
            cluster,
            user,
            org,
            name,
            analysis_type,
            provider,
            model,
            metrics,
            files,
        } => {
            info!("Analyzing {} files for cluster {}", files.len(), cluster);

            let provider = lens.provider(provider.as_deref(), model.as_deref())?;
            let store = Arc::new(lens.open_store().await?);

            let mut request =
                AnalysisRequest::new(AnalysisOwner::new(cluster, user, org)).with_type(analysis_type);
            if let Some(name) = name {
                request = request.with_name(name);
            }

            let record = lens
                .analyze_files(store, provider, request, &files, &selection_from(&metrics))
                .await?;

            match record.status {
                AnalysisStatus::Complete => println!("\n✓ Analysis complete!"),
                _ => println!("\n⚠ Metrics stored, but the AI provider returned no report"),
            }
            print_analysis(&record, None);
            Ok(())
        }

        Commands::List { cluster, limit } => {
            let store = lens.open_store().await?;
            let cluster_names: HashMap<String, String> = store
                .list_clusters()
                .await?
                .into_iter()
                .map(|c| (c.id, c.name))
                .collect();

            // Name matching happens here, so the limit is applied after it
            let filter = AnalysisFilter {
                cluster_id: None,
                status: None,
                limit: if cluster.is_some() { None } else { limit },
            };
            let mut analyses = store.list_analyses(&filter).await?;
            if let Some(query) = cluster.as_deref() {
                analyses.retain(|a| {
                    let name = cluster_names.get(&a.cluster_id).map(String::as_str);
                    cluster_matches(query, &a.cluster_id, name)
                });
                if let Some(limit) = limit {
                    analyses.truncate(usize::try_from(limit).unwrap_or(0));
                }
            }

            if analyses.is_empty() {
                println!("\nNo analyses found.");
                println!("\nRun 'clusterlens analyze --cluster <ID> --user <ID> --org <ID> <FILES>' to create one.");
                return Ok(());
            }

            println!("\nAnalyses:");
            println!("┌{:─<38}┬{:─<40}┬{:─<22}┬{:─<10}┬{:─<16}┐", "", "", "", "", "");
            println!("│ {:36} │ {:38} │ {:20} │ {:8} │ {:14} │", "ID", "Name", "Cluster", "Status", "Created");
            println!("├{:─<38}┼{:─<40}┼{:─<22}┼{:─<10}┼{:─<16}┤", "", "", "", "", "");

            for analysis in &analyses {
                let cluster = cluster_names
                    .get(&analysis.cluster_id)
                    .unwrap_or(&analysis.cluster_id);
                println!(
                    "│ {:36} │ {:38} │ {:20} │ {:8} │ {:14} │",
                    analysis.id,
                    format!("{} {}", clusterlens_core::report::type_icon(analysis.analysis_type), analysis.name)
                        .chars()
                        .take(37)
                        .collect::<String>(),
                    cluster.chars().take(20).collect::<String>(),
                    analysis.status.to_string(),
                    format_time_ago(&analysis.created_at)
                );
            }

            println!("└{:─<38}┴{:─<40}┴{:─<22}┴{:─<10}┴{:─<16}┘", "", "", "", "", "");
            println!("\nTotal: {} analyses", analyses.len());
            Ok(())
        }

        Commands::Show { id, html } => {
            let store = lens.open_store().await?;
            let record = store
                .get_analysis(&id)
                .await?
                .with_context(|| format!("Analysis not found: {}", id))?;

            let cluster = store.get_cluster(&record.cluster_id).await?;
            print_analysis(&record, cluster.as_ref());

            if let Some(report) = &record.html_report {
                println!("\n{}", report);
            }

            if let Some(path) = html {
                let page = render_report_html(&record)?;
                tokio::fs::write(&path, page)
                    .await
                    .with_context(|| format!("Failed to write report to {}", path.display()))?;
                println!("\n✓ HTML report written to {}", path.display());
            }
            Ok(())
        }

        Commands::Chat { id, provider, model } => {
            let store = lens.open_store().await?;
            let record = store
                .get_analysis(&id)
                .await?
                .with_context(|| format!("Analysis not found: {}", id))?;
            let mut conversation = ReportConversation::for_analysis(&record)
                .with_context(|| format!("Analysis {} has no report to chat about yet", id))?;
            let provider = lens.provider(provider.as_deref(), model.as_deref())?;

            println!("\nChatting about '{}' with {} ({})", record.name, provider.get_provider_name(), provider.get_model());
            println!("Type 'exit' or press Ctrl+D to stop.\n");

            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            while let Some(line) = lines.next_line().await? {
                let input = line.trim();
                if input == "exit" || input == "quit" {
                    break;
                }

                match conversation.send(provider.as_ref(), input).await {
                    Ok(Some(reply)) => println!("\n{}\n", reply),
                    Ok(None) => {}
                    Err(e) => eprintln!("\n✗ No reply: {}\n", e),
                }
            }

            info!("Chat ended after {} messages", conversation.transcript().len());
            Ok(())
        }

        Commands::Cluster { command } => {
            let store = lens.open_store().await?;
            match command {
                ClusterCommands::Add { name, description, org } => {
                    let cluster = Cluster::new(name, description, org);
                    store.create_cluster(&cluster).await?;
                    println!("\n✓ Cluster registered!");
                    println!("  Name: {}", cluster.name);
                    println!("  ID:   {}", cluster.id);
                }
                ClusterCommands::List => {
                    let clusters = store.list_clusters().await?;
                    if clusters.is_empty() {
                        println!("\nNo clusters registered. Run 'clusterlens cluster add <NAME>'.");
                    }
                    for cluster in &clusters {
                        println!(
                            "{}  {}  {}",
                            cluster.id,
                            cluster.name,
                            cluster.description.as_deref().unwrap_or("")
                        );
                    }
                }
            }
            Ok(())
        }
    }
}

fn print_analysis(record: &AnalysisRecord, cluster: Option<&Cluster>) {
    println!("\nAnalysis Details:");
    println!("  ID:       {}", record.id);
    println!("  Name:     {}", record.name);
    println!(
        "  Cluster:  {}",
        cluster.map(|c| c.name.as_str()).unwrap_or(&record.cluster_id)
    );
    println!("  Type:     {}", record.analysis_type);
    println!("  Status:   {}", record.status);
    println!("  Created:  {}", format_time_ago(&record.created_at));
}

/// Format a timestamp as a human-readable "time ago" string
/// Case-insensitive substring match on the cluster name, exact match on the id
fn cluster_matches(query: &str, cluster_id: &str, cluster_name: Option<&str>) -> bool {
    if query == cluster_id {
        return true;
    }
    let query = query.to_lowercase();
    cluster_name.is_some_and(|name| name.to_lowercase().contains(&query))
}

fn format_time_ago(timestamp: &chrono::DateTime<chrono::Utc>) -> String {
    use chrono::Utc;

    let now = Utc::now();
    let duration = now.signed_duration_since(*timestamp);

    if duration.num_seconds() < 60 {
        "just now".to_string()
    } else if duration.num_minutes() < 60 {
        format!("{} mins ago", duration.num_minutes())
    } else if duration.num_hours() < 24 {
        format!("{} hours ago", duration.num_hours())
    } else if duration.num_days() < 7 {
        format!("{} days ago", duration.num_days())
    } else if duration.num_weeks() < 4 {
        format!("{} weeks ago", duration.num_weeks())
    } else {
        format!("{} months ago", duration.num_days() / 30)
    }
}
