//! CLI smoke entry point.
//!
//! # Responsibility
//! - Open the configured article database through `pankat_core`.
//! - Print schema version and collection counts for quick sanity checks.

use pankat_core::db::migrations::current_user_version;
use pankat_core::db::open_db_with;
use pankat_core::logging::init_logging_from_config;
use pankat_core::{ArticleRepository, Config, SqliteArticleStore};
use std::error::Error;
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("pankat: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let config = Config::from_env()?;
    init_logging_from_config(&config)?;

    let mut conn = open_db_with(&config.db)?;
    println!("pankat_core version={}", pankat_core::core_version());
    println!("schema_version={}", current_user_version(&conn)?);

    let repo = ArticleRepository::new(SqliteArticleStore::try_new(&mut conn)?);
    println!("articles={}", repo.articles()?.len());
    println!("drafts={}", repo.drafts()?.len());
    println!("special_pages={}", repo.special_pages()?.len());
    println!("tags={}", repo.tags()?.len());
    println!("series={}", repo.series()?.len());
    Ok(())
}
