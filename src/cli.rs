use std::error::Error;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use lexitip::{
    DefinitionResolver, Dictionary, JsonFileStore, KeyValueStore, Page, PopoverConfig,
    PopoverHandle, Theme, WordList, WordPopover, WordSpan, merge_theme,
};
use serde_json::json;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "lexitip", about = "Resolve word popovers and reader preferences", version)]
pub struct Cli {
    /// Emit JSON instead of human-readable output.
    #[arg(long, global = true)]
    json: bool,

    /// Preference file standing in for the browser's storage.
    #[arg(
        long,
        global = true,
        env = "LEXITIP_PREFS",
        default_value = "lexitip-prefs.json"
    )]
    prefs: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render the definition markup for one or more lookup keys.
    Define {
        /// Dictionary file (.json, .js, .tsv, optionally .zst compressed).
        #[arg(long, env = "LEXITIP_DICT")]
        dict: PathBuf,
        /// Keys to resolve.
        #[arg(required = true)]
        keys: Vec<String>,
    },
    /// Decide whether a word's popover opens under the saved preferences.
    Popover {
        #[arg(long, env = "LEXITIP_DICT")]
        dict: PathBuf,
        /// Surface text of the word.
        word: String,
        /// Explicit lookup key.
        #[arg(long)]
        lemma: Option<String>,
        /// Membership tags, e.g. `ielts` or `extra`.
        #[arg(long = "tag")]
        tags: Vec<String>,
    },
    /// Show or change the saved preferences.
    #[command(subcommand)]
    Prefs(PrefsCommand),
    /// Merge a theme into a popover style-class string.
    MergeTheme {
        theme: Theme,
        #[arg(default_value = "")]
        classes: String,
    },
    /// Serve the popover API over HTTP.
    #[cfg(feature = "web")]
    Serve {
        #[arg(long, env = "LEXITIP_DICT")]
        dict: PathBuf,
        #[arg(long, default_value = "127.0.0.1:8080")]
        addr: std::net::SocketAddr,
    },
}

#[derive(Subcommand, Debug)]
enum PrefsCommand {
    /// Print the effective preferences.
    Show,
    /// Select the color theme.
    Theme { theme: Theme },
    /// Select the active word list.
    List { word_list: WordList },
    /// Flip the night-mode toggle.
    ToggleNight,
}

pub fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_tracing();
    match cli.command {
        Command::Define { dict, keys } => handle_define(dict, keys, cli.json),
        Command::Popover {
            dict,
            word,
            lemma,
            tags,
        } => handle_popover(dict, cli.prefs, word, lemma, tags, cli.json),
        Command::Prefs(command) => handle_prefs(cli.prefs, command, cli.json),
        Command::MergeTheme { theme, classes } => {
            let merged = merge_theme(theme, &classes);
            if cli.json {
                println!("{}", json!({ "theme": merged }));
            } else {
                println!("{merged}");
            }
            Ok(())
        }
        #[cfg(feature = "web")]
        Command::Serve { dict, addr } => handle_serve(dict, addr),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn handle_define(dict: PathBuf, keys: Vec<String>, as_json: bool) -> Result<(), Box<dyn Error>> {
    let dictionary = Dictionary::open(&dict)?;
    let resolver = DefinitionResolver::new(&dictionary);
    if as_json {
        let payload: Vec<_> = keys
            .iter()
            .map(|key| match resolver.explain(key) {
                Some(resolved) => json!(resolved),
                None => json!({ "requested": key, "html": null }),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }
    for key in &keys {
        match resolver.explain(key) {
            Some(resolved) if resolved.source_key != resolved.requested => {
                println!("{key} -> {} ({})", resolved.source_key, resolved.shape);
                println!("  {}", resolved.html);
            }
            Some(resolved) => {
                println!("{key} ({})", resolved.shape);
                println!("  {}", resolved.html);
            }
            None => println!("{key}: <no definition>"),
        }
    }
    Ok(())
}

struct TerminalPopover {
    word: WordSpan,
    theme: String,
    content: Option<String>,
}

impl PopoverHandle for TerminalPopover {
    fn theme(&self) -> &str {
        &self.theme
    }

    fn set_theme(&mut self, classes: String) {
        self.theme = classes;
    }

    fn set_content(&mut self, html: String) {
        self.content = Some(html);
    }
}

impl WordPopover for TerminalPopover {
    fn reference(&self) -> &WordSpan {
        &self.word
    }
}

fn handle_popover(
    dict: PathBuf,
    prefs: PathBuf,
    word: String,
    lemma: Option<String>,
    tags: Vec<String>,
    as_json: bool,
) -> Result<(), Box<dyn Error>> {
    let dictionary = Dictionary::open(&dict)?;
    let resolver = DefinitionResolver::new(&dictionary);
    let page = Page::new(JsonFileStore::open(prefs));
    let mut span = WordSpan::new(word).with_tags(tags);
    if let Some(lemma) = lemma {
        span = span.with_lemma(lemma);
    }
    let mut popover = TerminalPopover {
        word: span,
        theme: PopoverConfig::DEFINITION_THEME.to_string(),
        content: None,
    };
    let decision = page.on_word_popover_show(&mut popover, &resolver);
    if as_json {
        let payload = json!({
            "word": popover.word.text,
            "key": popover.word.lookup_key(),
            "wordList": page.word_list(),
            "show": decision.is_shown(),
            "content": popover.content,
            "theme": popover.theme,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else if let Some(content) = decision.content() {
        println!("theme: {}", popover.theme);
        println!("{content}");
    } else {
        println!(
            "suppressed: {:?} under word list {}",
            popover.word.text,
            page.word_list()
        );
    }
    Ok(())
}

fn handle_prefs(prefs: PathBuf, command: PrefsCommand, as_json: bool) -> Result<(), Box<dyn Error>> {
    let mut page = Page::new(JsonFileStore::open(prefs));
    let changed = match command {
        PrefsCommand::Show => false,
        PrefsCommand::Theme { theme } => page.change_theme(theme),
        PrefsCommand::List { word_list } => page.change_word_list(word_list),
        PrefsCommand::ToggleNight => {
            page.toggle_night_mode();
            true
        }
    };
    if as_json {
        println!("{}", serde_json::to_string_pretty(&page.state())?);
        return Ok(());
    }
    println!("theme:     {} (body class {})", page.theme(), page.body_class());
    println!("word list: {} (content class {})", page.word_list(), page.content_class());
    let saved = page.store().get(lexitip::THEME_KEY).is_some()
        || page.store().get(lexitip::WORD_LIST_KEY).is_some();
    if !changed && !saved {
        println!("(defaults; nothing saved yet)");
    }
    Ok(())
}

#[cfg(feature = "web")]
fn handle_serve(dict: PathBuf, addr: std::net::SocketAddr) -> Result<(), Box<dyn Error>> {
    let config = lexitip::web::WebConfig {
        addr,
        dictionary: dict,
    };
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(lexitip::web::serve(config))?;
    Ok(())
}
