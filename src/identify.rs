//! `digger identify`: the interactive clarification loop.
//!
//! Sends the photo batch to the agent, then keeps answering its questions
//! from stdin until it produces a record or fails. Choice questions are
//! printed numbered; an answer may be:
//!
//! - a number, which sends that option's value
//! - `@path/to/photo.jpg [text]`, which attaches a photo with optional text
//! - any other text, sent as-is (an empty line asks the agent to continue)
//!
//! With `--json` every turn is printed to stdout as one JSON object per
//! line and prompts go to stderr.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::warn;

use crate::agent::{Credentials, IdentificationAgent};
use crate::catalog::{release_url, Condition, DiscogsClient};
use crate::collection::{CollectionStore, JsonFileStore};
use crate::config::Config;
use crate::hosting::{host_from_config, resolve_image_urls};
use crate::images::ImageInput;
use crate::models::{AgentQuestion, AgentResponse, DraftRecord, Outcome, VinylRecord};

pub struct IdentifyOptions {
    pub images: Vec<PathBuf>,
    pub json: bool,
    pub save: bool,
    pub condition: Option<Condition>,
}

/// A parsed answer to a clarification question.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Answer {
    pub text: Option<String>,
    pub image: Option<PathBuf>,
}

/// Interpret one input line against the pending question.
pub fn parse_answer(input: &str, question: &AgentQuestion) -> Answer {
    let input = input.trim();
    if let Some(rest) = input.strip_prefix('@') {
        let rest = rest.trim_start();
        let (path, text) = match rest.split_once(char::is_whitespace) {
            Some((path, text)) => (path, Some(text.trim().to_string())),
            None => (rest, None),
        };
        if !path.is_empty() {
            return Answer {
                text: text.filter(|t| !t.is_empty()),
                image: Some(PathBuf::from(path)),
            };
        }
    }

    if let Ok(n) = input.parse::<usize>() {
        if let Some(option) = n.checked_sub(1).and_then(|i| question.options.get(i)) {
            return Answer {
                text: Some(option.value.clone()),
                image: None,
            };
        }
    }

    Answer {
        text: (!input.is_empty()).then(|| input.to_string()),
        image: None,
    }
}

fn prompt(text: &str) {
    let mut err = std::io::stderr().lock();
    let _ = write!(err, "{}", text);
    let _ = err.flush();
}

async fn read_line(lines: &mut Lines<BufReader<Stdin>>) -> Result<String> {
    lines
        .next_line()
        .await?
        .context("Input closed before the identification finished")
}

async fn confirm(lines: &mut Lines<BufReader<Stdin>>, question: &str) -> Result<bool> {
    prompt(&format!("{} [y/N] ", question));
    let answer = lines.next_line().await?.unwrap_or_default();
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

fn render(response: &AgentResponse, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(response)?);
        return Ok(());
    }
    for log in &response.logs {
        println!("  · {}", log);
    }
    match &response.outcome {
        Outcome::ClarificationNeeded(q) => {
            println!();
            println!("{}", q.text);
            for (i, option) in q.options.iter().enumerate() {
                println!("  {}) {}", i + 1, option.label);
            }
            if q.allow_image_upload {
                println!("  (attach a photo with @path/to/photo.jpg)");
            }
        }
        Outcome::Complete(record) => print_draft(record),
        Outcome::Error(message) => println!("Error: {}", message),
    }
    Ok(())
}

fn print_draft(r: &DraftRecord) {
    println!();
    println!("{} - {}", r.artist, r.title);
    for (label, value) in [
        ("Year", &r.year),
        ("Label", &r.label),
        ("Catalog #", &r.catalog_number),
        ("Country", &r.country),
        ("Format", &r.format),
        ("Price", &r.estimated_price),
        ("Discogs", &r.discogs_url),
    ] {
        if !value.is_empty() {
            println!("  {:<10} {}", label, value);
        }
    }
    if !r.description.is_empty() {
        println!("  {}", r.description);
    }
    if !r.is_valid {
        println!(
            "  warning: {}",
            r.validation_warning
                .as_deref()
                .unwrap_or("the photos may not be enough for a reliable identification")
        );
    }
}

async fn load_images(paths: &[PathBuf]) -> Result<Vec<ImageInput>> {
    let mut images = Vec::with_capacity(paths.len());
    for path in paths {
        images.push(ImageInput::from_path(path).await?);
    }
    Ok(images)
}

pub async fn run_identify(config: &Config, opts: IdentifyOptions) -> Result<()> {
    let max = config.agent.max_images;
    let paths = expand_image_args(&opts.images)?;
    if paths.is_empty() {
        anyhow::bail!("No photos given");
    }
    if paths.len() > max {
        anyhow::bail!(
            "Too many photos: {} given, at most {} per identification",
            paths.len(),
            max
        );
    }
    let mut photos = load_images(&paths).await?;

    let api_key = std::env::var(&config.agent.api_key_env).unwrap_or_default();
    let catalog_token = config.discogs.token();
    let mut agent = IdentificationAgent::new(
        &config.agent,
        Credentials::new(api_key, catalog_token.clone()),
    )
    .with_context(|| format!("Set {} to a Gemini API key", config.agent.api_key_env))?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut response = agent.start_analysis(photos.clone()).await;

    let draft = loop {
        render(&response, opts.json)?;
        let question = match response.outcome {
            Outcome::Complete(draft) => break draft,
            Outcome::Error(message) => anyhow::bail!("Identification failed: {}", message),
            Outcome::ClarificationNeeded(question) => question,
        };

        prompt("> ");
        let answer = parse_answer(&read_line(&mut lines).await?, &question);
        let image = match answer.image {
            Some(path) if photos.len() >= max => {
                eprintln!("Photo limit of {} reached, ignoring {}", max, path.display());
                None
            }
            Some(path) => {
                let image = ImageInput::from_path(&path).await?;
                photos.push(image.clone());
                Some(image)
            }
            None => None,
        };
        response = agent.reply(answer.text, image).await;
    };

    if !opts.save && !confirm(&mut lines, "Save to collection?").await? {
        return Ok(());
    }

    let record = save_record(config, draft, &photos, opts.condition).await?;
    eprintln!("Saved {} ({})", record.display_name(), record.id);
    if opts.json {
        println!("{}", serde_json::to_string(&record)?);
    }

    if let (Some(token), Some(release_id)) = (catalog_token, record.discogs_release_id) {
        if confirm(
            &mut lines,
            &format!("Add {} to your Discogs collection?", release_url(release_id)),
        )
        .await?
        {
            if let Err(e) = add_to_discogs(config, &token, release_id).await {
                eprintln!("Could not add to Discogs: {:#}", e);
            } else {
                eprintln!("Added to Discogs collection");
            }
        }
    }
    Ok(())
}

/// Upload photos (if hosting is enabled), finalize the draft and append it.
async fn save_record(
    config: &Config,
    draft: DraftRecord,
    photos: &[ImageInput],
    condition: Option<Condition>,
) -> Result<VinylRecord> {
    let host = match host_from_config(&config.hosting) {
        Ok(host) => host,
        Err(e) => {
            warn!(error = %e, "image hosting unavailable, keeping local photos");
            None
        }
    };
    let urls = resolve_image_urls(host.as_deref(), photos).await;
    let record = VinylRecord::from_draft(draft, urls, condition.map(|c| c.as_str().to_string()));

    let store = JsonFileStore::new(&config.collection.path);
    store.append(record.clone()).await?;
    Ok(record)
}

async fn add_to_discogs(config: &Config, token: &str, release_id: u64) -> Result<()> {
    let client = DiscogsClient::new(&config.discogs, token)?;
    let identity = client.verify_credential().await?;
    client
        .add_to_collection(&identity.username, release_id, config.discogs.folder_id)
        .await?;
    Ok(())
}

/// Resolve the photo arguments, expanding directories to the image files
/// they contain (sorted by name).
pub fn expand_image_args(args: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for arg in args {
        if arg.is_dir() {
            let mut entries: Vec<PathBuf> = std::fs::read_dir(arg)
                .with_context(|| format!("Failed to read directory: {}", arg.display()))?
                .filter_map(|e| e.ok().map(|e| e.path()))
                .filter(|p| is_image_path(p))
                .collect();
            entries.sort();
            out.extend(entries);
        } else {
            out.push(arg.clone());
        }
    }
    Ok(out)
}

fn is_image_path(path: &Path) -> bool {
    path.is_file()
        && mime_guess::from_path(path)
            .first()
            .is_some_and(|m| m.type_() == mime_guess::mime::IMAGE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{QuestionKind, QuestionOption};

    fn choice() -> AgentQuestion {
        AgentQuestion {
            text: "Which pressing?".to_string(),
            kind: QuestionKind::Choice,
            options: vec![
                QuestionOption {
                    label: "1973 UK".to_string(),
                    value: "UK-1973-SHVL804".to_string(),
                },
                QuestionOption {
                    label: "Not sure".to_string(),
                    value: "unsure".to_string(),
                },
            ],
            allow_image_upload: true,
        }
    }

    #[test]
    fn test_number_selects_option_value() {
        assert_eq!(
            parse_answer(" 1 ", &choice()),
            Answer {
                text: Some("UK-1973-SHVL804".to_string()),
                image: None
            }
        );
    }

    #[test]
    fn test_out_of_range_number_is_text() {
        assert_eq!(parse_answer("3", &choice()).text.as_deref(), Some("3"));
        assert_eq!(parse_answer("0", &choice()).text.as_deref(), Some("0"));
    }

    #[test]
    fn test_at_prefix_attaches_photo() {
        assert_eq!(
            parse_answer("@label.jpg side A label", &choice()),
            Answer {
                text: Some("side A label".to_string()),
                image: Some(PathBuf::from("label.jpg"))
            }
        );
        assert_eq!(
            parse_answer("@runout.png", &choice()),
            Answer {
                text: None,
                image: Some(PathBuf::from("runout.png"))
            }
        );
    }

    #[test]
    fn test_empty_line_is_empty_answer() {
        assert_eq!(parse_answer("   ", &choice()), Answer::default());
        assert_eq!(parse_answer("@", &choice()).text.as_deref(), Some("@"));
    }

    #[test]
    fn test_expand_directory_keeps_images_sorted() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("b.jpg"), b"b").unwrap();
        std::fs::write(dir.path().join("a.png"), b"a").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"n").unwrap();
        let single = dir.path().join("b.jpg");

        let paths = expand_image_args(&[dir.path().to_path_buf(), single.clone()]).unwrap();
        assert_eq!(
            paths,
            vec![dir.path().join("a.png"), dir.path().join("b.jpg"), single]
        );
    }
}
