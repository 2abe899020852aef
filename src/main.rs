use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use std::sync::Arc;

use tiao::cache::{
  Cacheable, MemoryStorage, NoopStorage, PageCache, PageStorage, SortOrder, SqliteStorage,
};
use tiao::config::{CacheBackend, Config};
use tiao::music::{CatalogSource, Music, MusicUpdate, NewMusic};
use tiao::suggestion::{Suggestion, SuggestionCatalog, SuggestionStatus};
use tiao::{logging, ListView, MusicListController, PageView, SuggestionListController};

#[derive(Parser, Debug)]
#[command(name = "tiao")]
#[command(about = "Browse and curate the Clube do Tião music ranking")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/tiao/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// JSON catalog to use (overrides TIAO_CATALOG and the config file)
  #[arg(long)]
  catalog: Option<PathBuf>,

  /// JSON file with listener suggestions (default: next to the catalog)
  #[arg(long)]
  suggestions: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  #[command(flatten)]
  Music(MusicCommand),
  /// Review listener suggestions
  Suggestion {
    #[command(subcommand)]
    command: SuggestionCommand,
  },
}

#[derive(Subcommand, Debug)]
enum MusicCommand {
  /// Show the top list and one page of the remaining ranking
  List {
    #[arg(short, long, default_value_t = 1)]
    page: u32,

    /// asc or desc by plays
    #[arg(short, long)]
    sort: Option<String>,

    /// Don't split off the most played music
    #[arg(long)]
    no_top: bool,
  },
  /// Show the most played music
  Top,
  /// Add a music video
  Add {
    #[arg(long)]
    title: String,
    /// YouTube link; fills in the video id and link
    #[arg(long, conflicts_with_all = ["youtube_id", "link"])]
    url: Option<String>,
    #[arg(long)]
    youtube_id: Option<String>,
    #[arg(long)]
    link: Option<String>,
    #[arg(long, default_value_t = 0)]
    plays: u64,
  },
  /// Change fields of a music video
  Update {
    id: u64,
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    youtube_id: Option<String>,
    #[arg(long)]
    link: Option<String>,
    #[arg(long)]
    plays: Option<u64>,
  },
  /// Remove a music video
  Delete { id: u64 },
}

#[derive(Subcommand, Debug)]
enum SuggestionCommand {
  /// Show one page of suggestions, newest first
  List {
    #[arg(short, long, default_value_t = 1)]
    page: u32,

    /// all, pending, approved or rejected
    #[arg(short, long, default_value = "all")]
    status: String,
  },
  /// Suggest the video behind a YouTube link
  Add {
    url: String,
    #[arg(long)]
    title: Option<String>,
  },
  Approve { id: u64 },
  Reject {
    id: u64,
    /// Shown to whoever made the suggestion
    #[arg(long)]
    reason: Option<String>,
  },
  Delete { id: u64 },
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let config = Config::load(args.config.as_deref())?;
  let _log_guard = logging::init(&config.logging)?;

  let catalog_path = args
    .catalog
    .or_else(|| config.catalog_path())
    .ok_or_else(|| {
      eyre!(
        "No catalog given. Pass --catalog, set TIAO_CATALOG or add `catalog:` to the config file."
      )
    })?;
  let suggestions_path = args
    .suggestions
    .unwrap_or_else(|| config.suggestions_path(&catalog_path));

  let sources = Sources {
    musics: Arc::new(CatalogSource::open(&catalog_path)?),
    suggestions: Arc::new(SuggestionCatalog::open(&suggestions_path)?),
  };

  match config.cache.backend {
    CacheBackend::Memory => {
      run(args.command, &config, sources, MemoryStorage::new(), MemoryStorage::new()).await
    }
    CacheBackend::Sqlite => {
      let open = || match &config.cache.path {
        Some(path) => SqliteStorage::open_at(path),
        None => SqliteStorage::open(),
      };
      run(args.command, &config, sources, open()?, open()?).await
    }
    CacheBackend::None => {
      run(args.command, &config, sources, NoopStorage::new(), NoopStorage::new()).await
    }
  }
}

struct Sources {
  musics: Arc<CatalogSource>,
  suggestions: Arc<SuggestionCatalog>,
}

fn page_cache<T: Cacheable, S: PageStorage<T>>(config: &Config, storage: S) -> PageCache<T, S> {
  let cache = PageCache::new(storage);
  match config.cache.stale_time() {
    Some(stale_time) => cache.with_stale_time(stale_time),
    None => cache,
  }
}

async fn run<M: PageStorage<Music>, G: PageStorage<Suggestion>>(
  command: Command,
  config: &Config,
  sources: Sources,
  music_storage: M,
  suggestion_storage: G,
) -> Result<()> {
  match command {
    Command::Music(command) => {
      let list = MusicListController::new(
        sources.musics,
        page_cache(config, music_storage),
        &config.listing,
      );
      run_musics(command, config, &list).await
    }
    Command::Suggestion { command } => {
      let list = SuggestionListController::new(
        sources.suggestions,
        page_cache(config, suggestion_storage),
        config.listing.suggestions_per_page,
      );
      run_suggestions(command, &list).await
    }
  }
}

async fn run_musics<S: PageStorage<Music>>(
  command: MusicCommand,
  config: &Config,
  list: &MusicListController<S>,
) -> Result<()> {
  match command {
    MusicCommand::List { page, sort, no_top } => {
      let sort = match sort {
        Some(s) => s.parse::<SortOrder>()?,
        None => config.listing.default_sort,
      };
      let exclude = if no_top {
        Vec::new()
      } else {
        list.fetch_top().await?
      };
      list.load(page, sort, &exclude, false).await?;
      print_view(&list.view(), !no_top);
    }
    MusicCommand::Top => {
      list.fetch_top().await?;
      print_top(&list.view());
    }
    MusicCommand::Add {
      title,
      url,
      youtube_id,
      link,
      plays,
    } => {
      let outcome = match url {
        Some(url) => list.create_from_youtube_url(title, &url).await?,
        None => {
          list
            .create(NewMusic {
              title,
              youtube_id,
              link,
              plays,
            })
            .await?
        }
      };
      println!("Added #{}: {}", outcome.value.id, outcome.value.title);
      outcome.refresh?;
      print_view(&list.view(), false);
    }
    MusicCommand::Update {
      id,
      title,
      youtube_id,
      link,
      plays,
    } => {
      let changes = MusicUpdate {
        title,
        youtube_id,
        link,
        plays,
      };
      if changes.is_empty() {
        return Err(eyre!("Nothing to update; pass at least one field"));
      }
      let outcome = list.update(id, changes).await?;
      println!("Updated #{}: {}", outcome.value.id, outcome.value.title);
      outcome.refresh?;
      print_view(&list.view(), false);
    }
    MusicCommand::Delete { id } => {
      let outcome = list.delete(id).await?;
      println!("Deleted #{}", id);
      outcome.refresh?;
      print_view(&list.view(), false);
    }
  }

  Ok(())
}

async fn run_suggestions<S: PageStorage<Suggestion>>(
  command: SuggestionCommand,
  list: &SuggestionListController<S>,
) -> Result<()> {
  match command {
    SuggestionCommand::List { page, status } => {
      let status = match status.as_str() {
        "all" => None,
        name => Some(name.parse::<SuggestionStatus>()?),
      };
      list.load(page, status, false).await?;
    }
    SuggestionCommand::Add { url, title } => {
      let outcome = list.submit(&url, title).await?;
      println!("Suggestion #{} received", outcome.value.id);
      outcome.refresh?;
    }
    SuggestionCommand::Approve { id } => {
      list.approve(id).await?.refresh?;
      println!("Approved #{}", id);
    }
    SuggestionCommand::Reject { id, reason } => {
      list.reject(id, reason).await?.refresh?;
      println!("Rejected #{}", id);
    }
    SuggestionCommand::Delete { id } => {
      list.delete(id).await?.refresh?;
      println!("Deleted suggestion #{}", id);
    }
  }

  print_suggestions(&list.view(), list.status_filter());
  Ok(())
}

fn describe(music: &Music) -> String {
  let plays = format!("{} ({} plays)", music.title, music.plays);
  match (&music.youtube_id, &music.link) {
    (Some(youtube_id), _) => format!("{} https://youtu.be/{}", plays, youtube_id),
    (None, Some(link)) => format!("{} {}", plays, link),
    (None, None) => plays,
  }
}

fn print_top(view: &ListView) {
  println!("Top {}", view.top.len());
  for (position, music) in view.top.iter().enumerate() {
    println!("{:>4}. {}", position + 1, describe(music));
  }
}

fn print_view(view: &ListView, with_top: bool) {
  if with_top && !view.top.is_empty() {
    print_top(view);
    println!();
  }

  println!(
    "Page {} of {} ({})",
    view.current_page,
    view.total_pages.max(1),
    view.sort
  );
  if view.items.is_empty() {
    println!("  No other music found.");
  }
  for item in &view.items {
    println!("{:>4}. {}", item.position, describe(&item.music));
  }

  print_pager(
    view.current_page,
    &view.visible_pages,
    view.has_prev_page,
    view.has_next_page,
  );
}

fn print_suggestions(view: &PageView<Suggestion>, status: Option<SuggestionStatus>) {
  let status = status.map_or("all", |s| s.as_str());
  println!(
    "Suggestions ({}), page {} of {}",
    status,
    view.current_page,
    view.total_pages.max(1)
  );
  if view.items.is_empty() {
    println!("  No suggestions.");
  }
  for (position, suggestion) in (view.offset + 1..).zip(&view.items) {
    let title = suggestion.title.as_deref().unwrap_or("(untitled)");
    println!(
      "{:>4}. #{} [{}] {} {}",
      position, suggestion.id, suggestion.status, title, suggestion.link
    );
    if let Some(reason) = &suggestion.reason {
      println!("        reason: {}", reason);
    }
  }

  print_pager(
    view.current_page,
    &view.visible_pages,
    view.has_prev_page,
    view.has_next_page,
  );
}

fn print_pager(current_page: u32, visible_pages: &[u32], has_prev: bool, has_next: bool) {
  let pages: Vec<String> = visible_pages
    .iter()
    .map(|&page| {
      if page == current_page {
        format!("[{}]", page)
      } else {
        page.to_string()
      }
    })
    .collect();
  let prev = if has_prev { "<" } else { " " };
  let next = if has_next { ">" } else { " " };
  println!("{} {} {}", prev, pages.join(" "), next);
}
