use clap::{Args, ValueEnum};

use quote_sync_core::{EngineError, MutationOutcome, PersistenceError, Record, SyncEngine};

#[derive(Clone, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Filter value that clears the remembered category
const ALL_CATEGORIES: &str = "all";

/// Add a new quote
#[derive(Args)]
pub struct AddCommand {
    /// Quote text
    pub text: String,

    /// Category
    #[arg(long)]
    pub category: String,
}

impl AddCommand {
    pub async fn run(&self, engine: &SyncEngine) -> Result<(), QuoteCommandError> {
        match engine.add_quote(self.text.trim(), self.category.trim()).await? {
            MutationOutcome::Delivered(remote) => {
                println!("Added quote (synced as {})", remote.id);
            }
            MutationOutcome::Queued(item) => {
                println!("Added quote {} (queued for sync)", item.payload.id);
            }
        }
        Ok(())
    }
}

/// List quotes
#[derive(Args)]
pub struct ListCommand {
    /// Only quotes whose category contains this text
    #[arg(long)]
    pub category: Option<String>,

    /// Ignore the remembered category filter
    #[arg(long, conflicts_with = "category")]
    pub all: bool,

    /// Output format
    #[arg(long, short, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

impl ListCommand {
    pub fn run(&self, engine: &SyncEngine) -> Result<(), QuoteCommandError> {
        let filter = if self.all {
            None
        } else {
            self.category.clone().or_else(|| engine.selected_filter())
        };

        let records = match &filter {
            Some(category) => engine.with_store(|store| store.filter_by_category(category)),
            None => engine.records(),
        };

        match self.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&records)?),
            OutputFormat::Text => {
                if records.is_empty() {
                    println!("No quotes found.");
                    return Ok(());
                }
                if let Some(category) = &filter {
                    println!("Category filter: {}\n", category);
                }
                for record in &records {
                    print_record(record);
                }
                println!("\n{} quote(s)", records.len());
            }
        }
        Ok(())
    }
}

/// Show a random quote
#[derive(Args)]
pub struct RandomCommand {
    /// Pick from categories containing this text
    #[arg(long)]
    pub category: Option<String>,
}

impl RandomCommand {
    pub fn run(&self, engine: &SyncEngine) -> Result<(), QuoteCommandError> {
        let picked = engine.with_store(|store| match &self.category {
            Some(category) => store.random_from_category(category),
            None => store.random(),
        });

        match (picked, &self.category) {
            (Some(record), _) => println!("{}", record),
            (None, Some(category)) => println!("No quotes in category '{}'.", category),
            (None, None) => println!("No quotes yet. Add one with 'quotes add'."),
        }
        Ok(())
    }
}

/// Search quote text
#[derive(Args)]
pub struct SearchCommand {
    /// Text to look for (case-insensitive)
    pub term: String,

    /// Output format
    #[arg(long, short, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

impl SearchCommand {
    pub fn run(&self, engine: &SyncEngine) -> Result<(), QuoteCommandError> {
        let found = engine.with_store(|store| store.search(&self.term));

        match self.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&found)?),
            OutputFormat::Text => {
                if found.is_empty() {
                    println!("No quotes match '{}'.", self.term);
                } else {
                    for record in &found {
                        print_record(record);
                    }
                }
            }
        }
        Ok(())
    }
}

/// Show quote statistics
#[derive(Args)]
pub struct StatsCommand {
    /// Output format
    #[arg(long, short, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

impl StatsCommand {
    pub async fn run(&self, engine: &SyncEngine) -> Result<(), QuoteCommandError> {
        let stats = engine.with_store(|store| store.stats());
        let queued = engine.queue_len().await;
        let state = engine.sync_state();

        match self.format {
            OutputFormat::Json => {
                let value = serde_json::json!({
                    "total": stats.total,
                    "categories": stats.categories,
                    "queued": queued,
                    "lastSyncAt": state.last_sync_at,
                });
                println!("{}", serde_json::to_string_pretty(&value)?);
            }
            OutputFormat::Text => {
                println!("Quotes:     {}", stats.total);
                println!("Categories: {}", stats.categories);
                println!("Queued:     {}", queued);
                match state.last_sync_at {
                    Some(at) => println!("Last sync:  {}", at.format("%Y-%m-%d %H:%M:%S UTC")),
                    None => println!("Last sync:  never"),
                }
            }
        }
        Ok(())
    }
}

/// Show or set the remembered category filter
#[derive(Args)]
pub struct FilterCommand {
    /// Category to remember, or "all" to clear
    pub category: Option<String>,
}

impl FilterCommand {
    pub fn run(&self, engine: &SyncEngine) -> Result<(), QuoteCommandError> {
        match self.category.as_deref().map(str::trim) {
            None => {
                match engine.selected_filter() {
                    Some(current) => println!("Current filter: {}", current),
                    None => println!("Current filter: {}", ALL_CATEGORIES),
                }
                let categories = engine.with_store(|store| store.categories());
                println!("Categories: {}", categories.join(", "));
            }
            Some(category) if category.is_empty() || category.eq_ignore_ascii_case(ALL_CATEGORIES) => {
                engine.set_selected_filter(None)?;
                println!("Filter cleared");
            }
            Some(category) => {
                engine.set_selected_filter(Some(category))?;
                println!("Filter set to '{}'", category);
            }
        }
        Ok(())
    }
}

fn print_record(record: &Record) {
    let source = record
        .source
        .map(|s| format!(" [{}]", s))
        .unwrap_or_default();
    println!("  {}{}", record, source);
}

/// Errors from quote commands
#[derive(Debug)]
pub enum QuoteCommandError {
    Engine(EngineError),
    Persistence(PersistenceError),
    Json(serde_json::Error),
}

impl std::fmt::Display for QuoteCommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QuoteCommandError::Engine(e) => write!(f, "{}", e),
            QuoteCommandError::Persistence(e) => write!(f, "Storage error: {}", e),
            QuoteCommandError::Json(e) => write!(f, "JSON error: {}", e),
        }
    }
}

impl std::error::Error for QuoteCommandError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            QuoteCommandError::Engine(e) => Some(e),
            QuoteCommandError::Persistence(e) => Some(e),
            QuoteCommandError::Json(e) => Some(e),
        }
    }
}

impl From<EngineError> for QuoteCommandError {
    fn from(e: EngineError) -> Self {
        QuoteCommandError::Engine(e)
    }
}

impl From<PersistenceError> for QuoteCommandError {
    fn from(e: PersistenceError) -> Self {
        QuoteCommandError::Persistence(e)
    }
}

impl From<serde_json::Error> for QuoteCommandError {
    fn from(e: serde_json::Error) -> Self {
        QuoteCommandError::Json(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quote_sync_core::{check_server, FileStore, HttpGateway};
    use std::sync::Arc;
    use tempfile::tempdir;

    // Nothing listens on port 9; every remote call fails fast
    fn offline_engine(dir: &std::path::Path) -> SyncEngine {
        let gateway = Arc::new(HttpGateway::new("http://127.0.0.1:9", "posts", "1"));
        let backend = Arc::new(FileStore::new(dir.to_path_buf()));
        SyncEngine::builder(gateway, backend).online(false).build()
    }

    #[tokio::test]
    async fn test_add_queues_while_offline() {
        let temp_dir = tempdir().unwrap();
        let engine = offline_engine(temp_dir.path());

        let cmd = AddCommand {
            text: "  Stay curious  ".to_string(),
            category: "Growth".to_string(),
        };
        cmd.run(&engine).await.unwrap();

        assert_eq!(engine.queue_len().await, 1);
        let found = engine.with_store(|store| store.search("stay curious"));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].text, "Stay curious");
        assert!(!check_server("http://127.0.0.1:9").await);
    }

    #[tokio::test]
    async fn test_add_rejects_blank_text() {
        let temp_dir = tempdir().unwrap();
        let engine = offline_engine(temp_dir.path());

        let cmd = AddCommand {
            text: "   ".to_string(),
            category: "Growth".to_string(),
        };
        let err = cmd.run(&engine).await.unwrap_err();
        assert!(err.to_string().contains("must not be empty"));
    }

    #[tokio::test]
    async fn test_filter_is_remembered() {
        let temp_dir = tempdir().unwrap();
        let engine = offline_engine(temp_dir.path());

        FilterCommand {
            category: Some("Life".to_string()),
        }
        .run(&engine)
        .unwrap();
        assert_eq!(
            offline_engine(temp_dir.path()).selected_filter(),
            Some("Life".to_string())
        );

        FilterCommand {
            category: Some("ALL".to_string()),
        }
        .run(&engine)
        .unwrap();
        assert_eq!(engine.selected_filter(), None);
    }
}
