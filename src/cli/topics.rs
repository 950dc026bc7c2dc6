use std::{
    io::{IsTerminal, stdin},
    path::Path,
    process,
};

use anyhow::Context;
use clap::{Parser, Subcommand};
use dialoguer::{Select, theme::ColorfulTheme};
use scribe::{
    Config,
    generate::{Difficulty, SearchIntent, TopicIdea, TopicQueue, TopicStatus},
};
use tracing::instrument;

use super::terminal::{self, Colorize};

#[derive(Debug, Parser)]
#[command(about = "Manage the queue of topics waiting to be written")]
pub struct Topics {
    #[command(subcommand)]
    command: TopicsCommand,
}

#[derive(Debug, Subcommand)]
enum TopicsCommand {
    /// Queue a new topic
    Add(Add),

    /// List queued topics
    List(ListTopics),

    /// Queue the starter topics if the queue is empty
    Seed,

    /// Drop old completed topics
    Cleanup,
}

#[derive(Debug, Parser)]
struct Add {
    /// Working title
    title: String,

    /// Primary search keyword (defaults to the title)
    #[arg(long, short)]
    keyword: Option<String>,

    /// Category name; prompts on a terminal when omitted
    #[arg(long, short)]
    category: Option<String>,

    /// Search intent
    #[arg(long, default_value_t)]
    intent: SearchIntent,

    /// Ranking difficulty
    #[arg(long, default_value_t)]
    difficulty: Difficulty,
}

#[derive(Debug, Parser)]
struct ListTopics {
    /// Include completed and failed topics
    #[arg(long, short)]
    all: bool,
}

impl Topics {
    #[instrument(level = "debug", skip(self))]
    pub fn run(self, root: &Path) -> anyhow::Result<()> {
        let config = super::load_config(root)?;
        let mut queue =
            TopicQueue::open(&Config::data_dir(root)).context("failed to open topic queue")?;

        match self.command {
            TopicsCommand::Add(add) => {
                let category = match add.category {
                    Some(category) => category,
                    None => choose_category(&config)?,
                };
                let keyword = add.keyword.unwrap_or_else(|| add.title.to_lowercase());
                let topic = queue.add(TopicIdea {
                    title: add.title,
                    target_keyword: keyword,
                    search_intent: add.intent,
                    difficulty: add.difficulty,
                    category,
                });
                println!("{}", format!("Queued {} ({})", topic.title, topic.id).success());
                queue.save().context("failed to save topic queue")?;
            }
            TopicsCommand::List(list) => print_topics(&queue, list.all),
            TopicsCommand::Seed => {
                let added = queue.seed();
                if added == 0 {
                    println!("{}", "Queue already has topics; nothing seeded".dim());
                } else {
                    queue.save().context("failed to save topic queue")?;
                    println!("{}", format!("Seeded {added} topic(s)").success());
                }
            }
            TopicsCommand::Cleanup => {
                let removed = queue.cleanup();
                queue.save().context("failed to save topic queue")?;
                println!("Removed {removed} completed topic(s)");
            }
        }
        Ok(())
    }
}

fn choose_category(config: &Config) -> anyhow::Result<String> {
    let categories = config.categories();
    if !stdin().is_terminal() {
        return Ok(categories.first().name.clone());
    }

    let names: Vec<String> = categories
        .iter()
        .map(|c| format!("{} {}", c.emoji, c.name))
        .collect();
    let Some(index) = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Category")
        .items(&names)
        .default(0)
        .interact_opt()?
    else {
        println!("Cancelled");
        process::exit(130);
    };

    categories
        .iter()
        .nth(index)
        .map(|c| c.name.clone())
        .context("selected category out of range")
}

fn print_topics(queue: &TopicQueue, all: bool) {
    let rows: Vec<Vec<String>> = queue
        .topics()
        .iter()
        .filter(|topic| all || topic.status == TopicStatus::Pending)
        .map(|topic| {
            vec![
                status_label(topic.status),
                topic.category.clone(),
                topic.search_intent.to_string(),
                topic.difficulty.to_string(),
                terminal::truncate(&topic.title, 60),
            ]
        })
        .collect();

    if rows.is_empty() {
        println!("{}", "No topics queued".dim());
        return;
    }
    terminal::print_table(&["STATUS", "CATEGORY", "INTENT", "DIFFICULTY", "TITLE"], &rows);
    println!(
        "\n{}",
        format!("{} generated so far", queue.total_generated()).dim()
    );
}

fn status_label(status: TopicStatus) -> String {
    match status {
        TopicStatus::Pending => "pending".dim(),
        TopicStatus::Generating => "generating".warning(),
        TopicStatus::Completed => "completed".success(),
        TopicStatus::Failed => "failed".failure(),
    }
}
