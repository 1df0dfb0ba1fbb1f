use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::domain::matching::MatchResult;
use crate::errors::EngineResult;
use crate::processing::MatchJob;
use crate::processing::embedding::EmbeddingProvider;
use crate::processing::matching::Matcher;
use crate::repository::{CatalogReader, FileRepository, ListingReader, MatchOutput, MatchWriter};

/// Pause before the next `recv` after a transient socket error.
pub const RECEIVE_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Command line of the matcher binary.
///
/// Without arguments the binary runs as a queue worker. With both table
/// paths it matches them once and prints the JSON result to stdout.
#[derive(Parser, Debug, PartialEq, Eq)]
#[command(
    name = "prosept-matcher",
    version,
    about = "Match dealer product listings to manufacturer catalog articles"
)]
pub struct Cli {
    /// Catalog table (`;`-separated, columns `article` and `name`)
    #[arg(requires = "listings")]
    pub catalog: Option<PathBuf>,

    /// Dealer listing table (columns `product_url` and `product_name`)
    pub listings: Option<PathBuf>,

    /// Shortlist length per listing; `top_k` from the configuration when omitted
    pub k: Option<NonZeroUsize>,
}

/// Table paths and shortlist length of a one-shot run.
#[derive(Debug, PartialEq, Eq)]
pub struct OneShotJob {
    pub catalog_path: PathBuf,
    pub listings_path: PathBuf,
    pub top_k: Option<usize>,
}

impl Cli {
    /// `None` means worker mode.
    pub fn one_shot(self) -> Option<OneShotJob> {
        match (self.catalog, self.listings) {
            (Some(catalog_path), Some(listings_path)) => Some(OneShotJob {
                catalog_path,
                listings_path,
                top_k: self.k.map(NonZeroUsize::get),
            }),
            _ => None,
        }
    }
}

/// What the worker loop does after `recv` fails.
#[derive(Debug, PartialEq, Eq)]
pub enum ReceiveFailure {
    /// The context was terminated; no further message can arrive.
    Stop,
    /// Wait and receive again.
    Retry(Duration),
}

impl ReceiveFailure {
    pub fn classify(error: &zmq::Error) -> Self {
        match error {
            zmq::Error::ETERM | zmq::Error::ENOTSOCK => Self::Stop,
            _ => Self::Retry(RECEIVE_RETRY_DELAY),
        }
    }
}

/// Loads both tables from `repo`, runs the matcher and hands the result to
/// the repository's writer. Nothing is written when the run fails.
pub async fn run_match<R, P>(repo: &R, matcher: &Matcher<P>, k: usize) -> EngineResult<MatchResult>
where
    R: CatalogReader + ListingReader + MatchWriter,
    P: EmbeddingProvider + ?Sized,
{
    let catalog = repo.list_catalog()?;
    let listings = repo.list_listings()?;
    let result = matcher.match_tables(&catalog, &listings, k).await?;
    repo.write_matches(&result)?;
    Ok(result)
}

/// Processes a match job received from the queue. Failures are logged; the
/// output file is only created for a successful run.
pub async fn process_match_message<P>(job: MatchJob, matcher: &Matcher<P>, default_k: usize)
where
    P: EmbeddingProvider + ?Sized,
{
    log::info!("Received match job: {job:?}");

    let k = job.top_k.unwrap_or(default_k);
    let repo = FileRepository::new(
        &job.catalog_path,
        &job.listings_path,
        MatchOutput::File(job.output_path.clone()),
    );

    match run_match(&repo, matcher, k).await {
        Ok(result) => log::info!(
            "Finished match job: {} listings written to {}",
            result.len(),
            job.output_path.display()
        ),
        Err(e) => log::error!("Match job failed for {}: {e}", job.output_path.display()),
    }
}
