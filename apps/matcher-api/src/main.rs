use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = matcher_api::Args::parse();

	matcher_api::run(args).await
}
