use clap::{Parser, Subcommand};
use reqwest::Method;
use serde_json::Value;

#[derive(Parser)]
#[command(name = "proxy-cli")]
#[command(about = "Fetch URLs through a running fetch-proxy", long_about = None)]
struct Cli {
    /// Base URL of the proxy.
    #[arg(short, long, default_value = "http://localhost:3000", env = "FETCH_PROXY_URL")]
    proxy: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch a target URL through the proxy
    Fetch {
        /// Target URL
        url: String,

        /// stream, auto, json, html or text
        #[arg(short = 't', long)]
        response_type: Option<String>,

        /// HTTP method
        #[arg(short = 'X', long, default_value = "GET")]
        method: String,

        /// Request body (POST/PUT/PATCH)
        #[arg(short, long)]
        data: Option<String>,

        /// Extra request headers, "Name: value"
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,
    },
    /// Check that the proxy is up
    Health,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::builder().no_proxy().build()?;
    let base = cli.proxy.trim_end_matches('/');

    match cli.command {
        Commands::Fetch {
            url,
            response_type,
            method,
            data,
            headers,
        } => {
            let mut query = vec![("url", url)];
            if let Some(rt) = response_type {
                query.push(("responseType", rt));
            }

            let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())?;
            let mut request = client
                .request(method, format!("{}/proxy", base))
                .query(&query);
            for header in &headers {
                let (name, value) = header
                    .split_once(':')
                    .ok_or_else(|| format!("malformed header: {}", header))?;
                request = request.header(name.trim(), value.trim());
            }
            if let Some(body) = data {
                request = request.body(body);
            }

            print_response(request.send().await?).await?;
        }
        Commands::Health => {
            let res = client.get(format!("{}/health", base)).send().await?;
            print_response(res).await?;
        }
    }

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let is_json = res
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"));

    if !status.is_success() {
        eprintln!("Proxy returned status {}", status);
    }

    if is_json {
        let json: Value = res.json().await?;
        println!("{}", serde_json::to_string_pretty(&json)?);
    } else {
        let bytes = res.bytes().await?;
        println!("{}", String::from_utf8_lossy(&bytes));
    }
    Ok(())
}
