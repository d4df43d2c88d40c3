use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use reqwest::Client;
use std::{fs, path::PathBuf};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};
use wcsb_dashboard::{
    load::{date_parser::parse_month, Table},
    publish::{Publisher, RepoCoordinate},
    st53::OperatorFilter,
    Dashboard, DashboardConfig, DashboardError, Month, Unit, ViewRequest,
};

/// Render the WCSB supply/disposition dashboards, or push a table upstream.
#[derive(Parser, Debug)]
#[command(name = "wcsb-dashboard", version)]
struct Args {
    /// YAML config replacing the built-in one
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the ST3 source (URL or path)
    #[arg(long, global = true)]
    st3: Option<String>,

    /// Override the ST53 source (URL or path)
    #[arg(long, global = true)]
    st53: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Supply & disposition statement with the in-situ breakdown
    Render {
        /// metric (m³/day) or barrels (bbl/day)
        #[arg(long, default_value = "metric")]
        unit: Unit,
        /// First month shown, e.g. 2023-01
        #[arg(long, value_parser = parse_month_arg)]
        start: Option<Month>,
        /// Last month shown
        #[arg(long, value_parser = parse_month_arg)]
        end: Option<Month>,
        /// Write the HTML here instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
        /// Also write the reshaped statement as CSV
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// ST53 operator production view
    Operators {
        /// Operators to include; defaults to the first five
        #[arg(long = "operator")]
        operators: Vec<String>,
        /// Scheme names to include; empty means all
        #[arg(long = "scheme")]
        schemes: Vec<String>,
        #[arg(long, default_value = "metric")]
        unit: Unit,
        /// Emit the series as JSON instead of HTML
        #[arg(long)]
        json: bool,
        /// Print the operator and scheme names available to filter on
        #[arg(long, conflicts_with = "json")]
        list: bool,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Push a local CSV to a GitHub repository
    Publish {
        /// CSV file with a header row
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        owner: String,
        #[arg(long)]
        repo: String,
        /// Destination path inside the repository
        #[arg(long)]
        path: String,
        #[arg(long, default_value = "main")]
        branch: String,
        #[arg(long, default_value = "Auto-upload from wcsb-dashboard")]
        message: String,
        #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
        token: Option<String>,
        #[arg(long)]
        api_base: Option<String>,
    },
}

fn parse_month_arg(s: &str) -> Result<Month, String> {
    parse_month(s).ok_or_else(|| format!("not a month: {s}"))
}

fn write_output(out: Option<&PathBuf>, text: &str) -> Result<()> {
    match out {
        Some(path) => {
            fs::write(path, text).with_context(|| format!("writing {}", path.display()))?;
            info!(path = %path.display(), bytes = text.len(), "wrote output");
        }
        None => println!("{}", text),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let env = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,wcsb_dashboard=info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => DashboardConfig::from_path(path)?,
        None => DashboardConfig::builtin()?,
    };
    if let Some(st3) = args.st3 {
        config.st3_url = st3;
    }
    if let Some(st53) = args.st53 {
        config.st53_url = st53;
    }
    let client = Client::new();

    let result = match args.command {
        Command::Render {
            unit,
            start,
            end,
            out,
            csv,
        } => {
            let dashboard = Dashboard::new(config, client)?;
            let req = ViewRequest {
                unit,
                start,
                end,
                refresh: false,
            };
            match dashboard.render(&req).await {
                Ok(view) => {
                    if let Some(path) = &csv {
                        let bytes = view.matrix.to_table().to_csv()?;
                        fs::write(path, &bytes)
                            .with_context(|| format!("writing {}", path.display()))?;
                        info!(path = %path.display(), rows = view.matrix.rows().len(), "wrote CSV");
                    }
                    write_output(out.as_ref(), &view.html)
                }
                Err(e) => Err(e),
            }
        }
        Command::Operators {
            operators,
            schemes,
            unit,
            json,
            list,
            out,
        } => {
            let dashboard = Dashboard::new(config, client)?;
            if list {
                let (operators, schemes) = dashboard.operator_options(false).await?;
                let text = format!(
                    "Operators:\n{}\n\nSchemes:\n{}",
                    operators.join("\n"),
                    schemes.join("\n")
                );
                write_output(out.as_ref(), &text)
            } else {
                let filter = (!operators.is_empty()).then(|| OperatorFilter {
                    operators: operators.into_iter().collect(),
                    schemes: schemes.into_iter().collect(),
                });
                let (view, html) = dashboard.operators(filter, unit, false).await?;
                let text = if json { view.to_json()? } else { html };
                write_output(out.as_ref(), &text)
            }
        }
        Command::Publish {
            input,
            owner,
            repo,
            path,
            branch,
            message,
            token,
            api_base,
        } => {
            let file = fs::File::open(&input)
                .with_context(|| format!("opening {}", input.display()))?;
            let table = Table::from_csv_reader(file)?;
            let mut publisher = Publisher::new(client, token)?;
            if let Some(base) = api_base {
                publisher = publisher.with_api_base(&base)?;
            }
            let coord = RepoCoordinate {
                owner,
                repo,
                path,
                branch,
            };
            publisher.publish(&table, &coord, &message).await.map(|out| {
                info!(created = out.created, url = %out.html_url, "published");
                println!("File pushed to GitHub: {}", out.html_url);
            })
        }
    };

    if let Err(e) = &result {
        match e.downcast_ref::<DashboardError>() {
            Some(DashboardError::SchemaMismatch { columns }) => {
                error!(columns, "unexpected number of columns; no table rendered")
            }
            Some(DashboardError::RemoteRejected { status, body }) => {
                error!(status, %body, "GitHub push failed")
            }
            _ => error!("{:#}", e),
        }
    }
    result
}
