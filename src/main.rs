use clap::{Parser, Subcommand};
use futures::StreamExt;
use s3_rds_connector::{
    config::Config, utils::init_logger, AppError, DatabaseClient, ObjectStoreClient,
};
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "s3-rds-connector", version, about = "Ad-hoc S3 and MySQL data retrieval")]
struct Cli {
    /// Region for the client and location constraint for new buckets (overrides S3_REGION)
    #[arg(long, global = true)]
    region: Option<String>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    /// Debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List bucket names
    Buckets,
    /// Create a bucket in the configured region
    CreateBucket { name: String },
    /// Upload a local file
    Upload {
        path: PathBuf,
        bucket: String,
        /// Object key; defaults to the file's base name
        #[arg(long)]
        key: Option<String>,
    },
    /// List object keys in a bucket
    Objects { bucket: String },
    /// Download an object to a local file
    Download {
        bucket: String,
        key: String,
        path: PathBuf,
    },
    /// Print the first sheet of a spreadsheet (or CSV) object
    ReadSheet {
        bucket: String,
        key: String,
        /// Only print the first N rows
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Run SQL statements in one session, in order
    Query {
        /// Schema to select; defaults to RDS_SCHEMA
        #[arg(long)]
        schema: Option<String>,
        /// Stream rows as they arrive instead of collecting them
        #[arg(long)]
        stream: bool,
        #[arg(required = true)]
        sql: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    let mut config = Config::from_env()?;
    if let Some(region) = cli.region {
        config.storage.region = region;
    }

    match cli.command {
        Command::Buckets => {
            let client = ObjectStoreClient::from_config(&config.storage)?;
            print_names(&client.list_buckets().await?, cli.json)?;
        }
        Command::CreateBucket { name } => {
            let client = ObjectStoreClient::from_config(&config.storage)?;
            client.create_bucket(&name).await?;
            println!("created {} in {}", name, client.region());
        }
        Command::Upload { path, bucket, key } => {
            let client = ObjectStoreClient::from_config(&config.storage)?;
            let key = client.upload_file(&path, &bucket, key.as_deref()).await?;
            println!("uploaded {} to s3://{}/{}", path.display(), bucket, key);
        }
        Command::Objects { bucket } => {
            let client = ObjectStoreClient::from_config(&config.storage)?;
            print_names(&client.list_objects(&bucket).await?, cli.json)?;
        }
        Command::Download { bucket, key, path } => {
            let client = ObjectStoreClient::from_config(&config.storage)?;
            client.download_object(&key, &bucket, &path).await?;
            println!("downloaded s3://{}/{} to {}", bucket, key, path.display());
        }
        Command::ReadSheet { bucket, key, limit } => {
            let client = ObjectStoreClient::from_config(&config.storage)?;
            let mut table = client.read_spreadsheet_object(&bucket, &key).await?;
            if let Some(limit) = limit {
                table = table.head(limit);
            }
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&table)?);
            } else {
                println!("{}", table);
            }
        }
        Command::Query { schema, stream, sql } => {
            let schema = schema
                .or_else(|| config.database.schema.clone())
                .ok_or_else(|| AppError::Config("no schema given and RDS_SCHEMA unset".to_string()))?;
            let client = DatabaseClient::from_config(&config.database)?;
            run_queries(&client, &schema, sql, stream, cli.json).await?;
        }
    }

    Ok(())
}

async fn run_queries(
    client: &DatabaseClient,
    schema: &str,
    statements: Vec<String>,
    stream: bool,
    json: bool,
) -> anyhow::Result<()> {
    let runner = client.clone();
    client
        .with_session(schema, move |session| {
            Box::pin(async move {
                for sql in &statements {
                    info!(sql = %sql, "Executing statement");
                    if stream {
                        let mut rows = session.stream_query(sql);
                        while let Some(row) = rows.next().await {
                            println!("{}", row?);
                        }
                    } else {
                        let result = runner.run_query(&mut *session, sql).await?;
                        if json {
                            let rendered = serde_json::to_string_pretty(&result)
                                .map_err(|e| AppError::InvalidRequest(e.to_string()))?;
                            println!("{}", rendered);
                        } else {
                            let rows: Vec<String> = result.iter().map(ToString::to_string).collect();
                            println!("[{}]", rows.join(", "));
                        }
                    }
                }
                Ok::<(), AppError>(())
            })
        })
        .await?;
    Ok(())
}

fn print_names(names: &[String], json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(names)?);
    } else {
        for name in names {
            println!("{}", name);
        }
    }
    Ok(())
}
