mod cli;

use clap::Parser;

use pagedump::config;
use pagedump::error::AppError;
use pagedump::fetch;

use cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(&cli).await {
        e.print_json_stderr();
        #[allow(clippy::cast_possible_truncation)]
        std::process::exit(e.code as i32);
    }
}

async fn run(cli: &Cli) -> Result<(), AppError> {
    let file = config::load_config(cli.config.as_deref())?;
    let (request, browser) = cli.resolve(&file);

    let html = fetch::fetch(&request, &browser).await?;

    // Stdout carries exactly the rendered markup, newline-terminated.
    println!("{html}");
    Ok(())
}
