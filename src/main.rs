use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use room_vibe::client::CatalogClient;
use room_vibe::config::load_config;
use room_vibe::models::PreferenceSubmission;
use room_vibe::playlist::{ScoreComponent, ScoringConfig, ScoringOutcome};
use room_vibe::{
    CandidatePoolProvider, InMemoryPreferenceStore, RoomId, StaticCandidatePool, VibeProfile,
    VibeService,
};

#[derive(Parser)]
#[command(name = "room-vibe")]
#[command(about = "Rank candidate tracks for a room from its members' preferences")]
#[command(version)]
struct Args {
    /// Path to a JSON array of preference submissions
    #[arg(short = 'r', long = "records")]
    records_file: String,

    /// Path to a JSON array of candidate tracks (fetched from the catalog service when omitted)
    #[arg(short = 'p', long = "candidates")]
    candidates_file: Option<String>,

    /// Path to the scoring configuration JSON file
    #[arg(short = 'c', long = "config")]
    config_file: Option<String>,

    /// Room to build the shortlist for (defaults to the room of the first submission)
    #[arg(long = "room")]
    room: Option<String>,

    /// Print the scoring outcome as JSON instead of a listing
    #[arg(long = "json")]
    json: bool,

    /// Quiet mode - reduce output verbosity
    #[arg(short = 'q', long = "quiet")]
    quiet: bool,
}

fn init_tracing(quiet: bool) {
    let default_level = if quiet { "warn" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.quiet);

    let config = load_config()?;

    let scoring_config = match &args.config_file {
        Some(path) => ScoringConfig::load_from_file(path)
            .with_context(|| format!("Failed to load scoring configuration from '{path}'"))?,
        None => ScoringConfig::default(),
    };

    let content = std::fs::read_to_string(&args.records_file)
        .with_context(|| format!("Preference file '{}' could not be read", args.records_file))?;
    let submissions: Vec<PreferenceSubmission> =
        serde_json::from_str(&content).context("Preference file is not a JSON array of submissions")?;

    let room_id = match (&args.room, submissions.first()) {
        (Some(room), _) => RoomId::from(room.as_str()),
        (None, Some(first)) => first.room_id.clone(),
        (None, None) => anyhow::bail!("No preference submissions in '{}'", args.records_file),
    };

    let provider: Box<dyn CandidatePoolProvider> = match &args.candidates_file {
        Some(path) => Box::new(
            StaticCandidatePool::load_from_file(path)
                .with_context(|| format!("Failed to load candidates from '{path}'"))?,
        ),
        None => Box::new(CatalogClient::new(&config)?),
    };

    let service = VibeService::new(InMemoryPreferenceStore::new(), provider);
    for submission in submissions {
        let user = submission.user_id.clone();
        service
            .submit(submission)
            .with_context(|| format!("Submission from '{user}' was rejected"))?;
    }

    info!(room = %room_id, "Building shortlist");
    let outcome = service.build_shortlist(&room_id, scoring_config)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    if let Some(profile) = service.current_profile(&room_id)? {
        print_profile(&profile);
    }
    print_outcome(&outcome, args.quiet);

    Ok(())
}

fn print_profile(profile: &VibeProfile) {
    println!("\nRoom {} vibe ({} members)", profile.room_id, profile.contributing_user_count);
    println!("{}", "=".repeat(32));
    for (feature, value) in &profile.feature_centroid {
        let spread = profile.feature_spread.get(feature).copied().unwrap_or(0.0);
        println!("   {feature:<13} {value:.2} ± {spread:.2}");
    }

    let mut top_genres: Vec<_> = profile.genre_affinity.iter().collect();
    top_genres.sort_by(|a, b| b.1.total_cmp(a.1).then_with(|| a.0.cmp(b.0)));
    if !top_genres.is_empty() {
        let top_5: Vec<String> = top_genres
            .iter()
            .take(5)
            .map(|(genre, weight)| format!("{genre} ({:.0}%)", *weight * 100.0))
            .collect();
        println!("   Top Genres: {}", top_5.join(", "));
    }
    if !profile.hard_no_genres.is_empty() {
        let hard_nos: Vec<&str> = profile.hard_no_genres.iter().map(String::as_str).collect();
        println!("   Hard No: {}", hard_nos.join(", "));
    }
    if let Some(event) = &profile.event_type {
        println!("   Event: {event}");
    }
    println!("   New vs familiar: {:.2}", profile.new_vs_familiar);
}

fn print_outcome(outcome: &ScoringOutcome, quiet: bool) {
    let summary = &outcome.summary;
    println!("\nShortlist: {}/{} tracks", outcome.ranked.len(), outcome.requested);
    println!(
        "   Candidates: {} | Hard-no excluded: {} | Contributor cap skipped: {} | Penalized: {}",
        summary.candidate_count,
        summary.excluded_by_hard_no,
        summary.skipped_by_contributor_cap,
        summary.penalized_count
    );
    if outcome.shortfall {
        println!("   Shortfall: fewer candidates than requested; widen the candidate pool or accept fewer tracks.");
    }

    if quiet {
        return;
    }

    for candidate in &outcome.ranked {
        let component = |c: ScoreComponent| candidate.score_breakdown.get(&c).copied().unwrap_or(0.0);
        let contributor = candidate
            .contributor_user_id
            .as_ref()
            .map(|user| format!(" | from {user}"))
            .unwrap_or_default();
        let genres = if candidate.genre_tags.is_empty() {
            String::new()
        } else {
            let tags: Vec<&str> = candidate.genre_tags.iter().map(String::as_str).collect();
            format!(" | {}", tags.join(", "))
        };

        println!(
            "     {}. {} score {:.3} (F:{:.2} G:{:.2} N:{:.2} D:{:.2}) pop {:.0}{}{}",
            candidate.rank,
            candidate.track_id,
            candidate.score,
            component(ScoreComponent::FeatureFit),
            component(ScoreComponent::GenreFit),
            component(ScoreComponent::FamiliarityFit),
            component(ScoreComponent::DiversityMultiplier),
            candidate.popularity,
            contributor,
            genres
        );
    }
}
