use clap::Parser as _;
use openapi_mcp_proxy::cli::Args;
use openapi_mcp_proxy::logging::init_tracing;
use openapi_mcp_proxy::{build_server, serve_stdio};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level, args.log_format);

    let config = args.to_config()?;
    let server = build_server(&config).await?;

    let tools = server.tools();
    if args.print_tools {
        println!("{}", serde_json::to_string_pretty(&tools)?);
        return Ok(());
    }

    tracing::info!(tools = tools.len(), spec = %config.spec, "serving MCP over stdio");
    serve_stdio(server).await?;
    Ok(())
}
