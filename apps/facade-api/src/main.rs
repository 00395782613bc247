use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = facade_api::Args::parse();

	facade_api::run(args).await
}
