//! Podium CLI
//!
//! Command-line interface for Podium:
//! - Run the API server
//! - Manage the seller roster
//! - Print and export rankings
//! - Record sales
//! - Seed a demo campaign

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

use podium::api::{serve, ApiConfig, AppState};
use podium::builder::{submit, CampaignDraft, DraftEdit, Place};
use podium::config::{generate_default_config, Config};
use podium::display::{format_value, Progress};
use podium::export::{render, ExportFormat};
use podium::ranking::RankingAggregator;
use podium::store::{open_store, CampaignStore, MetricType, NewSale, Seller};

#[derive(Parser)]
#[command(name = "podium")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Sales campaign leaderboard")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: search the usual locations)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the API server
    Serve,

    /// Print a commented default config file
    InitConfig {
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Create demo sellers and a campaign with sales
    Seed,

    /// Seller roster
    Sellers {
        #[command(subcommand)]
        command: SellerCommands,
    },

    /// List campaigns
    Campaigns,

    /// Print a campaign ranking
    Ranking {
        /// Campaign id
        campaign: Uuid,
        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },

    /// Record a sale
    Sale {
        /// Campaign id
        campaign: Uuid,
        /// Seller id or exact name
        seller: String,
        /// Sale value
        value: f64,
    },
}

#[derive(Subcommand)]
pub enum SellerCommands {
    /// List sellers
    List,
    /// Add a seller
    Add {
        name: String,
        #[arg(long)]
        avatar_url: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
    Csv,
}

const DEMO_SELLERS: [(&str, f64); 7] = [
    ("Carlos Silva", 185_000.0),
    ("Ana Costa", 172_000.0),
    ("Roberto Oliveira", 158_000.0),
    ("Juliana Santos", 142_000.0),
    ("Pedro Almeida", 135_000.0),
    ("Mariana Lima", 128_000.0),
    ("Felipe Souza", 115_000.0),
];

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::InitConfig { output, force } = &cli.command {
        return init_config(output.as_ref(), *force);
    }

    let config = match &cli.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };

    if let Err(e) = podium::logging::init(&config.logging) {
        eprintln!("Logging disabled: {}", e);
    }

    let watch_changes = matches!(cli.command, Commands::Serve);
    let opened =
        open_store(&config.store, watch_changes).context("Failed to open campaign store")?;
    let store = opened.store();

    match cli.command {
        Commands::Serve => {
            tracing::info!("Podium v{}", env!("CARGO_PKG_VERSION"));
            let api_config = ApiConfig::from(&config);
            let state = AppState::new(store, api_config.clone());
            serve(state, &api_config).await?;
        }

        Commands::InitConfig { output, force } => init_config(output.as_ref(), force)?,

        Commands::Seed => seed(store.as_ref()).await?,

        Commands::Sellers { command } => match command {
            SellerCommands::List => {
                let sellers = store.list_sellers().await?;
                if sellers.is_empty() {
                    println!("No sellers yet.");
                    println!();
                    println!("Add one with:");
                    println!("  podium sellers add \"Carlos Silva\"");
                } else {
                    println!("{:<36}  {}", "ID", "Name");
                    println!("{}", "-".repeat(60));
                    for seller in sellers {
                        println!("{:<36}  {}", seller.id, seller.name);
                    }
                }
            }
            SellerCommands::Add { name, avatar_url } => {
                let name = name.trim();
                if name.is_empty() {
                    bail!("Seller name cannot be empty");
                }
                let seller = store.add_seller(name, avatar_url.as_deref()).await?;
                println!("Added {} ({})", seller.name, seller.id);
            }
        },

        Commands::Campaigns => {
            let campaigns = store.list_campaigns().await?;
            if campaigns.is_empty() {
                println!("No campaigns yet. Try: podium seed");
            } else {
                println!("{:<36}  {:<10}  {}", "ID", "Metric", "Name");
                println!("{}", "-".repeat(72));
                for campaign in campaigns {
                    println!(
                        "{:<36}  {:<10}  {}",
                        campaign.id,
                        campaign.metric_type.as_str(),
                        campaign.name
                    );
                }
            }
        }

        Commands::Ranking { campaign, format } => {
            let aggregator = RankingAggregator::new(Arc::clone(&store), config.ranking.tie_break);
            let ranking = aggregator.rank(campaign).await?;

            match format {
                OutputFormat::Json => print!("{}", render(&ranking, ExportFormat::Json)?),
                OutputFormat::Csv => print!("{}", render(&ranking, ExportFormat::Csv)?),
                OutputFormat::Table => {
                    let metric = ranking.campaign.metric_type;
                    println!("{}", ranking.campaign.name);
                    println!();
                    println!("{:>4}  {:<24}  {:>16}  {:>6}", "#", "Seller", "Total", "Meta");
                    println!("{}", "-".repeat(56));
                    for entry in &ranking.entries {
                        let progress = Progress::of(entry.value, entry.goal)
                            .map(|p| p.label())
                            .unwrap_or_default();
                        println!(
                            "{:>3}º  {:<24}  {:>16}  {:>6}",
                            entry.rank,
                            entry.name,
                            format_value(entry.value, metric),
                            progress
                        );
                    }
                    println!("{}", "-".repeat(56));
                    println!(
                        "      {:<24}  {:>16}",
                        "Equipe",
                        format_value(ranking.team_total, metric)
                    );
                }
            }
        }

        Commands::Sale {
            campaign,
            seller,
            value,
        } => {
            if !value.is_finite() || value < 0.0 {
                bail!("Sale value must be a non-negative number");
            }
            let seller = resolve_seller(store.as_ref(), &seller).await?;
            let sale = store
                .record_sale(NewSale {
                    campaign_id: campaign,
                    seller_id: seller.id,
                    value,
                })
                .await?;
            println!("Recorded {} for {} ({})", sale.value, seller.name, sale.id);
        }
    }

    Ok(())
}

fn init_config(output: Option<&PathBuf>, force: bool) -> Result<()> {
    let content = generate_default_config();
    match output {
        Some(path) => {
            if path.exists() && !force {
                bail!("{:?} already exists (use --force to overwrite)", path);
            }
            std::fs::write(path, content)
                .with_context(|| format!("Failed to write {:?}", path))?;
            println!("Wrote {:?}", path);
        }
        None => print!("{}", content),
    }
    Ok(())
}

async fn resolve_seller(store: &dyn CampaignStore, key: &str) -> Result<Seller> {
    let sellers = store.list_sellers().await?;
    let by_id = key.parse::<Uuid>().ok();

    sellers
        .into_iter()
        .find(|s| Some(s.id) == by_id || s.name == key)
        .with_context(|| format!("Unknown seller: {}", key))
}

async fn seed(store: &dyn CampaignStore) -> Result<()> {
    let mut sellers = Vec::with_capacity(DEMO_SELLERS.len());
    for (name, _) in DEMO_SELLERS {
        sellers.push(store.add_seller(name, None).await?);
    }

    let mut draft = CampaignDraft::default()
        .apply(DraftEdit::SetName {
            name: "Campanha de Vendas Q4".to_string(),
        })
        .apply(DraftEdit::SetMetricType {
            metric_type: MetricType::Monetary,
        })
        .apply(DraftEdit::SetGoalsEnabled { enabled: true })
        .apply(DraftEdit::SetIndividualGoal {
            goal: Some(150_000.0),
        })
        .apply(DraftEdit::SetTeamGoal {
            goal: Some(1_000_000.0),
        })
        .apply(DraftEdit::SetPrizesEnabled { enabled: true })
        .apply(DraftEdit::SetPrize {
            place: Place::First,
            prize: "Viagem para Cancún".to_string(),
        })
        .apply(DraftEdit::SetPrize {
            place: Place::Second,
            prize: "iPhone".to_string(),
        })
        .apply(DraftEdit::SetPrize {
            place: Place::Third,
            prize: "Vale-compras R$ 1.000".to_string(),
        })
        .apply(DraftEdit::SetStartDate {
            date: NaiveDate::from_ymd_opt(2024, 10, 1),
        })
        .apply(DraftEdit::SetEndDate {
            date: NaiveDate::from_ymd_opt(2024, 12, 31),
        });
    for seller in &sellers {
        draft = draft.apply(DraftEdit::ToggleParticipant {
            seller_id: seller.id,
        });
    }

    let campaign = submit(store, &draft, Some("seed".to_string())).await?;

    for (seller, (_, total)) in sellers.iter().zip(DEMO_SELLERS) {
        let first = (total * 0.6).round();
        for value in [first, total - first] {
            store
                .record_sale(NewSale {
                    campaign_id: campaign.id,
                    seller_id: seller.id,
                    value,
                })
                .await?;
        }
    }

    println!("Seeded {} sellers", sellers.len());
    println!("Campaign: {} ({})", campaign.name, campaign.id);
    println!();
    println!("Show the ranking with:");
    println!("  podium ranking {}", campaign.id);

    Ok(())
}
