//! Command handlers shared by one-shot subcommands and the interactive shell.

use std::path::Path;

use anyhow::Result;
use laq_rag::LaqPipeline;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::debug;

use crate::display;

const MENU: [&str; 6] =
    ["Upload PDF", "Search LAQ", "Chat with LAQ", "Database Info", "Clear Database", "Exit"];

pub struct App {
    pipeline: LaqPipeline,
    editor: DefaultEditor,
}

impl App {
    pub fn new(pipeline: LaqPipeline) -> Result<Self> {
        Ok(Self { pipeline, editor: DefaultEditor::new()? })
    }

    /// Read one trimmed line; `None` on Ctrl-C or Ctrl-D.
    fn prompt(&mut self, label: &str) -> Result<Option<String>> {
        match self.editor.readline(label) {
            Ok(line) => {
                let line = line.trim().to_string();
                if !line.is_empty() {
                    self.editor.add_history_entry(line.as_str())?;
                }
                Ok(Some(line))
            }
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn confirm(&mut self, question: &str) -> Result<bool> {
        let answer = self.prompt(&format!("{question} (yes/no): "))?;
        Ok(answer.is_some_and(|a| matches!(a.to_lowercase().as_str(), "yes" | "y")))
    }

    pub async fn upload(&mut self, path: &Path, assume_yes: bool) -> Result<()> {
        println!("Processing {}...", path.display());
        let doc = self.pipeline.process_document(path).await?;
        display::extraction(&doc);

        if !assume_yes && !self.confirm("\nStore this data in the database?")? {
            println!("Data not stored");
            return Ok(());
        }

        println!("Generating embeddings and storing...");
        let report = self.pipeline.store(&doc).await?;
        display::ingest_report(&report, &doc.file_name);
        Ok(())
    }

    pub async fn search(&mut self, query: &str, top_k: Option<usize>) -> Result<()> {
        let top_k = top_k.unwrap_or(self.pipeline.config().search_top_k);
        let matches = self.pipeline.search(query, top_k).await?;
        if matches.is_empty() {
            println!("No results found");
            return Ok(());
        }
        display::search_results(query, &matches);
        Ok(())
    }

    pub async fn chat(&mut self, query: &str) -> Result<()> {
        println!("Generating response...");
        match self.pipeline.chat(query).await? {
            Some(answer) => display::chat_answer(&answer),
            None => println!("No relevant LAQs found for this query"),
        }
        Ok(())
    }

    pub async fn info(&mut self) -> Result<()> {
        let count = self.pipeline.count().await?;
        display::info(self.pipeline.config(), count);
        Ok(())
    }

    pub async fn clear(&mut self, assume_yes: bool) -> Result<()> {
        if !assume_yes && !self.confirm("Are you sure you want to clear all data?")? {
            println!("Operation cancelled");
            return Ok(());
        }
        self.pipeline.clear().await?;
        println!("Database cleared");
        Ok(())
    }

    /// Numbered menu loop. Errors from an action are reported and the loop
    /// continues.
    pub async fn shell(&mut self) -> Result<()> {
        display::heading("LAQ RAG");
        println!("Database: {} records loaded", self.pipeline.count().await?);

        loop {
            display::heading("MENU");
            for (i, item) in MENU.iter().enumerate() {
                println!("{}. {item}", i + 1);
            }

            let Some(choice) = self.prompt(&format!("Select (1-{}): ", MENU.len()))? else {
                break;
            };
            debug!(choice = %choice, "menu selection");

            let outcome = match choice.as_str() {
                "1" => match self.prompt("Enter PDF path: ")? {
                    Some(path) if !path.is_empty() => self.upload(Path::new(&path), false).await,
                    _ => continue,
                },
                "2" => match self.prompt("Enter query: ")? {
                    Some(query) if !query.is_empty() => self.search(&query, None).await,
                    _ => {
                        println!("Query cannot be empty");
                        continue;
                    }
                },
                "3" => match self.prompt("Enter query: ")? {
                    Some(query) if !query.is_empty() => self.chat(&query).await,
                    _ => {
                        println!("Query cannot be empty");
                        continue;
                    }
                },
                "4" => self.info().await,
                "5" => self.clear(false).await,
                "6" => break,
                _ => {
                    println!("Invalid choice. Please select 1-{}.", MENU.len());
                    continue;
                }
            };

            if let Err(e) = outcome {
                display::error(&e);
            }
        }

        println!("\nGoodbye!");
        Ok(())
    }
}
