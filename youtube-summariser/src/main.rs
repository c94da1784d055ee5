//! youtube-summarizer - Summarize YouTube videos from the command line

mod setup;
mod youtube;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures_util::StreamExt;
use llm_client::{LlmClient, ProviderId};
use std::io::Write;
use std::path::PathBuf;

use youtube::SearchResult;

const SYSTEM_PROMPT: &str = r#"Summarize this video transcript concisely.

## Output Format (use markdown):

### TL;DR
One paragraph capturing the essence (2-3 sentences).

### Key Takeaways
- Bullet points of the most important insights
- Include timestamps like [MM:SS] where relevant

### Detailed Summary
Comprehensive breakdown. Scale length to video complexity (~50 words per 5 minutes of content).

### Notable Quotes
1-3 memorable quotes with timestamps, if any stand out.

Preserve any timestamps from the transcript. Be concise—omit filler and tangents."#;

#[derive(Parser, Debug)]
#[command(name = "youtube-summarizer")]
#[command(about = "Summarize YouTube videos from the command line")]
#[command(version)]
#[command(after_help = "Examples:
  youtube-summarizer init
  youtube-summarizer \"https://www.youtube.com/watch?v=VIDEO_ID\"
  youtube-summarizer \"https://youtu.be/VIDEO_ID\" --output summary.md
  youtube-summarizer \"https://youtube.com/watch?v=VIDEO_ID\" --provider openai
  youtube-summarizer search \"Python tutorial\" --first")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Summarize a YouTube video
    #[command(alias = "summarize")]
    Summarise {
        /// YouTube video URL to summarize
        url: String,

        #[command(flatten)]
        opts: SummariseOpts,
    },
    /// Search YouTube by title and summarize
    Search {
        /// Search query (video title or keywords)
        query: String,

        /// Auto-select the first search result without prompting
        #[arg(short = '1', long)]
        first: bool,

        /// Number of search results to display
        #[arg(long, default_value_t = 5)]
        max_results: usize,

        #[command(flatten)]
        opts: SummariseOpts,
    },
    /// Configure API keys and default settings interactively
    Init,
}

#[derive(clap::Args, Debug)]
struct SummariseOpts {
    /// Output filename (default: summary_<video_id>_<timestamp>.md)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print the summary to stdout without saving to a file
    #[arg(long)]
    no_save: bool,

    /// LLM provider to use (overrides config)
    #[arg(long)]
    provider: Option<ProviderId>,

    /// Disable streaming output (wait for the complete response)
    #[arg(long)]
    no_stream: bool,
}

fn is_url_like(arg: &str) -> bool {
    arg.starts_with("http://")
        || arg.starts_with("https://")
        || arg.starts_with("www.")
        || arg.starts_with("youtube.com")
        || arg.starts_with("youtu.be")
}

fn generate_output_filename(video_id: &str) -> String {
    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    format!("summary_{}_{}.md", video_id, timestamp)
}

/// Summarize the transcript, streaming to stdout unless disabled. A Ctrl-C
/// during streaming keeps the fragments received so far and abandons the rest.
async fn summarize_transcript(transcript: &str, llm: &LlmClient, stream: bool) -> Result<String> {
    if !stream {
        return Ok(llm.chat(SYSTEM_PROMPT, transcript).await?);
    }

    let mut fragments = llm.stream_chat(SYSTEM_PROMPT, transcript).await?;
    let mut summary = String::new();
    let mut stdout = std::io::stdout();

    println!("\n--- Summary ---\n");
    loop {
        tokio::select! {
            next = fragments.next() => match next {
                Some(fragment) => {
                    let fragment = fragment?;
                    print!("{}", fragment);
                    stdout.flush()?;
                    summary.push_str(&fragment);
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                eprintln!("\n\nSummary generation interrupted by user.");
                break;
            }
        }
    }
    println!("\n");

    Ok(summary)
}

/// Shared logic for processing a video: fetch transcript, summarize, save.
async fn process_video(
    video_id: &str,
    video_url: &str,
    opts: &SummariseOpts,
    llm: &LlmClient,
) -> Result<()> {
    println!("Fetching transcript for {}...", video_id);
    let transcript = youtube::fetch_transcript(video_id).await?;

    println!("Transcript: {} characters", transcript.len());
    println!("Generating summary...");
    let summary = summarize_transcript(&transcript, llm, !opts.no_stream)
        .await
        .context("Error generating summary")?;

    if opts.no_stream {
        println!("Done.");
    }

    let generated = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
    let output_content = format!(
        r#"# YouTube Video Summary

| | |
|---|---|
| **Video URL** | <{video_url}> |
| **Video ID** | `{video_id}` |
| **Generated** | {generated} |
| **Model** | {} / {} |

---

{summary}
"#,
        llm.provider(),
        llm.model(),
    );

    if opts.no_save {
        if opts.no_stream {
            // Only print the full formatted output if we haven't streamed it
            println!("\n{}", "-".repeat(50));
            println!("{}", output_content);
        }
    } else {
        let output_file = opts
            .output
            .clone()
            .unwrap_or_else(|| PathBuf::from(generate_output_filename(video_id)));
        std::fs::write(&output_file, &output_content)
            .with_context(|| format!("Failed to write {}", output_file.display()))?;
        println!("Saved to {}", output_file.display());
        if opts.no_stream {
            println!("\n{}", "-".repeat(50));
            println!("{}", output_content);
        }
    }

    Ok(())
}

async fn cmd_summarise(url: &str, opts: &SummariseOpts) -> Result<()> {
    let llm = LlmClient::new(opts.provider)?;
    println!("Using {}/{}", llm.provider(), llm.model());

    if !youtube::validate_url(url) {
        anyhow::bail!("Invalid YouTube URL");
    }
    let video_id =
        youtube::extract_video_id(url).context("Could not extract video ID from URL")?;

    process_video(&video_id, url, opts, &llm).await
}

/// Prompt for a 1-based selection; `None` means the user cancelled.
fn prompt_selection(count: usize) -> Result<Option<usize>> {
    loop {
        print!("Select video (1-{}): ", count);
        std::io::stdout().flush()?;

        let mut input = String::new();
        if std::io::stdin().read_line(&mut input)? == 0 {
            return Ok(None);
        }
        let input = input.trim();
        if input.is_empty() {
            return Ok(None);
        }
        match input.parse::<usize>() {
            Ok(choice) if (1..=count).contains(&choice) => return Ok(Some(choice - 1)),
            Ok(_) => println!("Please enter a number between 1 and {}", count),
            Err(_) => println!("Please enter a valid number"),
        }
    }
}

async fn cmd_search(
    query: &str,
    first: bool,
    max_results: usize,
    opts: &SummariseOpts,
) -> Result<()> {
    let llm = LlmClient::new(opts.provider)?;
    println!("Using {}/{}", llm.provider(), llm.model());

    println!("Searching YouTube for: {}", query);
    let results = youtube::search_videos(query, max_results).await?;
    if results.is_empty() {
        anyhow::bail!("No videos found matching your query");
    }

    let selected: &SearchResult = if first {
        println!("Auto-selecting: {}", results[0].title);
        &results[0]
    } else {
        println!("\nFound {} video(s):\n", results.len());
        for (i, video) in results.iter().enumerate() {
            println!("  {}. {}", i + 1, video.title);
            println!("     Channel: {} | Duration: {}", video.channel, video.duration);
            println!();
        }
        match prompt_selection(results.len())? {
            Some(idx) => &results[idx],
            None => {
                println!("Cancelled.");
                return Ok(());
            }
        }
    };

    println!("\nSelected: {}", selected.title);
    println!("URL: {}\n", selected.url);

    process_video(&selected.video_id, &selected.url, opts, &llm).await
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    // Backward compatibility: a bare URL first argument means summarise
    let mut argv: Vec<String> = std::env::args().collect();
    if argv.len() > 1 && is_url_like(&argv[1]) {
        argv.insert(1, "summarise".to_string());
    }
    let args = Args::parse_from(argv);

    match args.command {
        Command::Init => setup::run_init(),
        Command::Summarise { url, opts } => cmd_summarise(&url, &opts).await,
        Command::Search {
            query,
            first,
            max_results,
            opts,
        } => cmd_search(&query, first, max_results, &opts).await,
    }
}
