//! `digger discogs ...` commands.
//!
//! Thin wrappers over [`DiscogsClient`]: each resolves the token owner
//! where the endpoint needs a username, performs one call, and prints the
//! result. Errors carry the HTTP status and response body.

use anyhow::{Context, Result};

use crate::catalog::{
    release_url, Condition, DiscogsClient, ListingRequest, ListingStatus, SleeveCondition,
    ALL_FOLDER,
};
use crate::config::Config;

fn client(config: &Config) -> Result<DiscogsClient> {
    DiscogsClient::from_config(&config.discogs).with_context(|| {
        format!(
            "Set {} to a Discogs personal access token",
            config.discogs.token_env
        )
    })
}

async fn username(client: &DiscogsClient) -> Result<String> {
    Ok(client.verify_credential().await?.username)
}

pub async fn run_whoami(config: &Config) -> Result<()> {
    let client = client(config)?;
    let identity = client.verify_credential().await?;
    let profile = client.profile(&identity.username).await?;

    println!("{}", profile.username);
    if !profile.name.is_empty() {
        println!("  name:       {}", profile.name);
    }
    if !profile.location.is_empty() {
        println!("  location:   {}", profile.location);
    }
    println!("  collection: {}", profile.num_collection);
    println!("  wantlist:   {}", profile.num_wantlist);
    Ok(())
}

pub async fn run_search(config: &Config, query: &str) -> Result<()> {
    let client = client(config)?;
    let response = client.search_release(query).await?;

    if response.results.is_empty() {
        println!("No results.");
        return Ok(());
    }
    for r in &response.results {
        println!(
            "{:>10}  {}  [{}] {} {}  {}",
            r.id,
            r.title,
            r.catno,
            r.year,
            r.country,
            r.format.join(", ")
        );
    }
    Ok(())
}

pub async fn run_collection(config: &Config, page: u32) -> Result<()> {
    let client = client(config)?;
    let user = username(&client).await?;
    let result = client
        .collection_page(&user, ALL_FOLDER, page, config.discogs.per_page)
        .await?;

    for item in &result.releases {
        let info = &item.basic_information;
        let artists: Vec<&str> = info.artists.iter().map(|a| a.name.as_str()).collect();
        println!("{:>10}  {} - {}  ({})", info.id, artists.join(", "), info.title, info.year);
    }
    println!(
        "page {} / {}  ({} items)",
        result.pagination.page, result.pagination.pages, result.pagination.items
    );
    Ok(())
}

pub async fn run_add(config: &Config, release_id: u64) -> Result<()> {
    let client = client(config)?;
    let user = username(&client).await?;
    let instance = client
        .add_to_collection(&user, release_id, config.discogs.folder_id)
        .await?;
    println!(
        "Added {} to collection (instance {})",
        release_url(release_id),
        instance.instance_id
    );
    Ok(())
}

pub async fn run_want(config: &Config, release_id: u64) -> Result<()> {
    let client = client(config)?;
    let user = username(&client).await?;
    client.add_to_wantlist(&user, release_id).await?;
    println!("Added {} to wantlist", release_url(release_id));
    Ok(())
}

pub struct SellArgs {
    pub release_id: u64,
    pub condition: Condition,
    pub sleeve: Option<SleeveCondition>,
    pub price: f64,
    pub draft: bool,
    pub comments: Option<String>,
}

pub async fn run_sell(config: &Config, args: SellArgs) -> Result<()> {
    let client = client(config)?;
    let listing = ListingRequest {
        release_id: args.release_id,
        condition: args.condition,
        sleeve_condition: args.sleeve,
        price: args.price,
        status: if args.draft {
            ListingStatus::Draft
        } else {
            ListingStatus::ForSale
        },
        comments: args.comments.filter(|c| !c.trim().is_empty()),
    };
    let created = client.create_listing(&listing).await?;
    println!(
        "Listed {} as {} at {:.2} (listing {})",
        release_url(args.release_id),
        listing.condition,
        listing.price,
        created.listing_id
    );
    Ok(())
}
