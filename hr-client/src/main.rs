//! honest - HonestReviews terminal client
//!
//! Stores the session in a JSON token file, so consecutive invocations stay
//! logged in until the refresh token expires.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use hr_client::config::{default_file_path, ClientConfig, FileConfig};
use hr_client::store::detail::{personality_key, profile_key};
use hr_client::store::lists::{MemberParams, PersonalityParams};
use hr_client::store::orgs::OrgParams;
use hr_client::store::reviews::ReviewParams;
use hr_client::store::paged::PageParams;
use hr_client::views::{self, Selectors};
use hr_client::{Actions, ApiClient, FileStorage, PersonalityRef, SharedStore};
use hr_common::api::query::{ReviewSort, SortField, SortOrder};
use hr_common::api::requests::{
    NamedCreate, ProfileUpdate, RecoverRequest, RegisterRequest, ReviewCreate, ReviewUpdate,
};
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

/// Command-line arguments for honest
#[derive(Parser, Debug)]
#[command(name = "honest")]
#[command(about = "HonestReviews terminal client")]
#[command(version)]
struct Args {
    /// API base URL, including the /api prefix
    #[arg(long, env = "HR_API_URL")]
    base_url: Option<String>,

    /// Where the session tokens are kept
    #[arg(long, env = "HR_TOKEN_FILE")]
    token_file: Option<PathBuf>,

    /// TOML config file
    #[arg(long, env = "HR_CLIENT_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(ClapArgs, Debug, Clone)]
struct ListArgs {
    /// Case-insensitive name filter
    #[arg(long)]
    search: Option<String>,
    /// Sort field
    #[arg(long)]
    sort: Option<String>,
    /// asc or desc
    #[arg(long)]
    order: Option<String>,
    /// Number of pages to load
    #[arg(long, default_value_t = 1)]
    pages: u32,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check that the server is up
    Health,
    /// Create an account and print its recovery codes
    Register {
        username: String,
        #[arg(long)]
        display_name: Option<String>,
        #[arg(long, env = "HR_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    Login {
        username: String,
        #[arg(long, env = "HR_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    Logout,
    /// Reset a password with a recovery code
    Recover {
        recovery_code: String,
        #[arg(long, env = "HR_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Show the logged-in profile
    Whoami,
    /// Show a public profile
    Profile { username: String },
    /// Edit the logged-in profile
    ProfileUpdate {
        #[arg(long)]
        display_name: Option<String>,
        #[arg(long)]
        bio: Option<String>,
        #[arg(long)]
        avatar_url: Option<String>,
    },
    /// List organizations
    Orgs(ListArgs),
    /// Show one organization
    Org { slug: String },
    OrgCreate {
        name: String,
        #[arg(long)]
        description: Option<String>,
    },
    OrgDelete { slug: String },
    Join { slug: String },
    Members {
        slug: String,
        #[command(flatten)]
        list: ListArgs,
    },
    /// Make a member a moderator
    Promote { slug: String, profile_id: Uuid },
    Personalities {
        org: String,
        #[command(flatten)]
        list: ListArgs,
    },
    Personality { org: String, slug: String },
    PersonalityCreate {
        org: String,
        name: String,
        #[arg(long)]
        description: Option<String>,
    },
    PersonalityDelete { org: String, slug: String },
    /// List a personality's reviews
    Reviews {
        org: String,
        slug: String,
        /// newest, oldest, rating_desc or rating_asc
        #[arg(long)]
        sort: Option<String>,
        #[arg(long)]
        min: Option<i64>,
        #[arg(long)]
        max: Option<i64>,
        #[arg(long, default_value_t = 1)]
        pages: u32,
    },
    /// Write a review
    Review {
        org: String,
        slug: String,
        #[arg(long)]
        rating: i64,
        #[arg(long)]
        title: String,
        #[arg(long)]
        body: String,
    },
    ReviewEdit {
        id: Uuid,
        #[arg(long)]
        rating: Option<i64>,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        body: Option<String>,
    },
    ReviewDelete { id: Uuid },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hr_client=warn,honest=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let args = Args::parse();

    let file = match &args.config {
        Some(path) => FileConfig::load(path)?,
        None => {
            let path = default_file_path();
            if path.exists() {
                FileConfig::load(&path)?
            } else {
                FileConfig::default()
            }
        }
    };
    let config = ClientConfig::resolve(args.base_url.clone(), args.token_file.clone(), file);
    debug!("Using API {} with tokens in {}", config.base_url, config.token_file.display());

    let storage = Arc::new(FileStorage::new(&config.token_file));
    let api = ApiClient::new(&config.base_url, storage)?;
    let actions = Actions::new(api, SharedStore::default());

    run(&actions, args.command).await
}

async fn run(actions: &Actions, command: Command) -> Result<()> {
    let api = actions.api();
    let mut selectors = Selectors::new();

    match command {
        Command::Health => {
            let health = api.health().await?;
            println!("{} ({} v{})", health.status, health.module, health.version);
        }
        Command::Register {
            username,
            display_name,
            password,
        } => {
            let password = password_or_prompt(password)?;
            let registered = api
                .register(&RegisterRequest {
                    username,
                    password,
                    display_name,
                })
                .await?;
            println!("Registered {} ({})", registered.username, registered.id);
            println!("Recovery codes (shown once, keep them safe):");
            for code in registered.codes {
                println!("  {}", code);
            }
        }
        Command::Login { username, password } => {
            let password = password_or_prompt(password)?;
            actions.login(&username, &password).await?;
            println!("Logged in as {}", username.trim());
        }
        Command::Logout => {
            actions.logout().await?;
            println!("Logged out");
        }
        Command::Recover {
            recovery_code,
            password,
        } => {
            let new_password = password_or_prompt(password)?;
            let response = api
                .recover(&RecoverRequest {
                    recovery_code,
                    new_password,
                })
                .await?;
            println!("{}", response.detail);
        }
        Command::Whoami => {
            let claims = api
                .session()
                .claims()
                .ok_or_else(|| anyhow!("Not logged in"))?;
            debug!(iat = ?claims.iat, exp = ?claims.exp, "Stored access token");
            let me = api.me().await?;
            print!("{}", views::render_profile(&me));
            print!("{}", views::render_session(&claims));
        }
        Command::Profile { username } => {
            actions.load_profile(&username).await?;
            let profile = actions.store().read(|s| {
                s.details
                    .profiles
                    .get(&profile_key(&username))
                    .and_then(|d| d.value().cloned())
            });
            let profile = profile.ok_or_else(|| anyhow!("Profile not found"))?;
            print!("{}", views::render_profile(&profile));
        }
        Command::ProfileUpdate {
            display_name,
            bio,
            avatar_url,
        } => {
            let profile = actions
                .update_profile(&ProfileUpdate {
                    display_name,
                    bio,
                    avatar_url,
                })
                .await?;
            print!("{}", views::render_profile(&profile));
        }
        Command::Orgs(list) => {
            let params: OrgParams = page_params(&list)?;
            actions.load_orgs(params).await?;
            for _ in 1..list.pages {
                actions.load_more_orgs().await?;
            }
            let view = actions.store().read(|s| selectors.org_list(s));
            print!("{}", views::render_org_list(&view));
        }
        Command::Org { slug } => {
            let org = api.org(&slug).await?;
            println!("{} ({})", org.name, org.slug);
            if let Some(description) = &org.description {
                println!("  {}", description);
            }
            println!(
                "  members: {}  personalities: {}  reviews: {}",
                org.members_count, org.personalities_count, org.reviews_count
            );
        }
        Command::OrgCreate { name, description } => {
            let org = actions.create_org(&NamedCreate { name, description }).await?;
            println!("Created {} ({})", org.name, org.slug);
        }
        Command::OrgDelete { slug } => {
            actions.delete_org(&slug).await?;
            println!("Deleted {}", slug);
        }
        Command::Join { slug } => {
            actions.join_org(&slug).await?;
            println!("Joined {}", slug);
        }
        Command::Members { slug, list } => {
            let params: MemberParams = page_params(&list)?;
            actions.load_members(&slug, params).await?;
            for _ in 1..list.pages {
                actions.load_more_members(&slug).await?;
            }
            let rendered = actions
                .store()
                .read(|s| views::render_members(&s.members.listed(&slug)));
            print!("{}", rendered);
        }
        Command::Promote { slug, profile_id } => {
            actions.promote_member(&slug, profile_id).await?;
            println!("Promoted {} to moderator", profile_id);
        }
        Command::Personalities { org, list } => {
            let params: PersonalityParams = page_params(&list)?;
            actions.load_personalities(&org, params).await?;
            for _ in 1..list.pages {
                actions.load_more_personalities(&org).await?;
            }
            let view = actions
                .store()
                .read(|s| selectors.personality_list(s, &org));
            print!("{}", views::render_personality_list(&view));
        }
        Command::Personality { org, slug } => {
            let target = resolve_personality(actions, &org, &slug).await?;
            let p = actions
                .store()
                .read(|s| s.personalities.get(&target.id).cloned())
                .ok_or_else(|| anyhow!("Personality not found"))?;
            println!("{} ({})", p.name, p.slug);
            if let Some(description) = &p.description {
                println!("  {}", description);
            }
            println!(
                "  average {} from {} reviews",
                views::format_average(p.average_review),
                p.total_reviews
            );
        }
        Command::PersonalityCreate {
            org,
            name,
            description,
        } => {
            let p = actions
                .create_personality(&org, &NamedCreate { name, description })
                .await?;
            println!("Created {} ({})", p.name, p.slug);
        }
        Command::PersonalityDelete { org, slug } => {
            resolve_personality(actions, &org, &slug).await?;
            actions.delete_personality(&org, &slug).await?;
            println!("Deleted {}", slug);
        }
        Command::Reviews {
            org,
            slug,
            sort,
            min,
            max,
            pages,
        } => {
            let sort = match sort.as_deref() {
                Some(value) => {
                    ReviewSort::parse(value).ok_or_else(|| anyhow!("Unknown review sort: {}", value))?
                }
                None => ReviewSort::default(),
            };
            let params = ReviewParams {
                sort,
                rating_min: min,
                rating_max: max,
            };
            // Reject bad filters before resolving the personality
            hr_common::validation::rating_range(min, max)?;

            let target = resolve_personality(actions, &org, &slug).await?;
            actions.load_reviews(&target, params).await?;
            for _ in 1..pages {
                actions.load_more_reviews(&target).await?;
            }
            let view = actions
                .store()
                .read(|s| selectors.review_list(s, target.id));
            print!("{}", views::render_review_list(&view));
        }
        Command::Review {
            org,
            slug,
            rating,
            title,
            body,
        } => {
            let request = ReviewCreate {
                title,
                body,
                rating,
            };
            request.validate()?;
            let target = resolve_personality(actions, &org, &slug).await?;
            let review = actions.create_review(&target, &request).await?;
            println!("Posted review {}", review.id);
        }
        Command::ReviewEdit {
            id,
            rating,
            title,
            body,
        } => {
            let review = actions
                .update_review(id, &ReviewUpdate { title, body, rating })
                .await?;
            println!("Updated review {} ({})", review.id, views::stars(review.rating));
        }
        Command::ReviewDelete { id } => {
            api.delete_review(id).await?;
            println!("Deleted review {}", id);
        }
    }
    Ok(())
}

/// Look up a personality so its id is known to the cache
async fn resolve_personality(actions: &Actions, org: &str, slug: &str) -> Result<PersonalityRef> {
    actions.load_personality(org, slug).await?;
    actions
        .store()
        .read(|s| {
            s.details
                .personalities
                .get(&personality_key(org, slug))
                .and_then(|d| d.value())
                .map(|p| PersonalityRef::new(org, p))
        })
        .ok_or_else(|| anyhow!("Personality {}/{} not found", org, slug))
}

fn page_params<S: SortField>(list: &ListArgs) -> Result<PageParams<S>> {
    let sort = match list.sort.as_deref() {
        Some(value) => Some(S::parse(value).ok_or_else(|| anyhow!("Unknown sort field: {}", value))?),
        None => None,
    };
    let order = match list.order.as_deref() {
        Some(value) => Some(SortOrder::parse(value).ok_or_else(|| anyhow!("Order must be asc or desc"))?),
        None => None,
    };
    if list.pages == 0 {
        bail!("--pages must be at least 1");
    }
    Ok(PageParams {
        search: list.search.clone(),
        sort,
        order,
    }
    .normalized())
}

fn password_or_prompt(password: Option<String>) -> Result<String> {
    if let Some(password) = password {
        return Ok(password);
    }
    print!("Password: ");
    io::stdout().flush().context("Failed to flush stdout")?;
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read password")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
