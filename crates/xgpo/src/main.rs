use std::process::ExitCode;

use clap::Parser;
use log::{error, info, warn};
use tokio_util::sync::CancellationToken;
use xgpo::{AppSettings, Language, LaunchError, Launcher, Text, build_http_client, logging};
use xgpo_platform::AppPaths;

#[derive(Parser)]
#[command(name = "xgpo")]
#[command(about = "Grand Piece Online launcher and wiki browser", long_about = None)]
#[command(version)]
struct Cli {
    /// Base wiki query; each category appends its own keywords
    query: Option<String>,

    /// Interface language (pt-BR or en-US); remembered for later runs
    #[arg(long, env = "XGPO_LANG")]
    lang: Option<Language>,

    /// Write debug logs for this run
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let mut settings = AppSettings::load();

    if let Ok(paths) = AppPaths::new() {
        logging::init_logging(
            &paths,
            cli.debug || settings.debug_logging,
            settings.max_log_size_bytes,
        );
    }

    if let Some(language) = cli.lang
        && settings.language != Some(language)
    {
        settings.language = Some(language);
        if let Err(error) = settings.save() {
            warn!("Failed to persist language choice: {error}");
        }
    }
    let language = settings.language.unwrap_or_else(Language::detect);

    info!("Interface language {language}");
    xgpo_core::cleanup_stale_staging();

    match run(cli.query.as_deref().unwrap_or_default(), &settings, language).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(launch_error) => {
            error!("{launch_error}");
            eprintln!("{}", launch_error.user_message(language));
            ExitCode::from(launch_error.exit_code())
        }
    }
}

async fn run(query: &str, settings: &AppSettings, language: Language) -> Result<(), LaunchError> {
    eprintln!("{}", language.text(Text::Loading));
    let client = build_http_client(settings)?;
    let launcher = Launcher::new(&client, settings, language);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, cancelling wiki searches");
            on_interrupt.cancel();
        }
    });

    let output = launcher.run(query, &cancel).await?;
    println!("{output}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::{CommandFactory, Parser};
    use xgpo::Language;

    use super::Cli;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn query_and_language_are_optional() {
        let cli = Cli::try_parse_from(["xgpo"]).expect("bare invocation should parse");
        assert_eq!(cli.query, None);
        assert!(!cli.debug);

        let cli = Cli::try_parse_from(["xgpo", "Kraken", "--lang", "en_us", "--debug"])
            .expect("full invocation should parse");
        assert_eq!(cli.query.as_deref(), Some("Kraken"));
        assert_eq!(cli.lang, Some(Language::EnUs));
        assert!(cli.debug);
    }

    #[test]
    fn unknown_language_is_rejected() {
        assert!(Cli::try_parse_from(["xgpo", "--lang", "fr-FR"]).is_err());
    }
}
