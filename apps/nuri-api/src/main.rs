use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = nuri_api::Args::parse();

	nuri_api::run(args).await
}
