use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use phototag::{cli, config, keywords, normalizer, pipeline, proxy, scanner, store};
use phototag_common::{matched_keywords, parse_keyword_input, parse_query, PhotoRecord, SearchOutcome};
use cli::{Cli, Commands};
use config::Config;
use pipeline::{Notice, UploadOptions, Uploader};
use store::{BoundedStore, FileMedium, PhotoLibrary};

/// お知らせに表示するキーワード数
const PREVIEW_KEYWORDS: usize = 5;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logger(cli.verbose);
    let config = Config::load()?;

    match cli.command {
        Commands::Add { paths, no_auto, source, keywords: manual, recursive } => {
            println!("📸 phototag - 写真追加\n");

            // 1. ファイル収集
            println!("[1/2] 写真をスキャン中...");
            let files = scanner::collect_paths(&paths, recursive)?;
            println!("✔ {}件のファイルを検出\n", files.len());

            // 2. 正規化・キーワード取得・保存
            println!("[2/2] 解析・保存中...");
            let mut library = open_library(&config)?;
            let uploader = Uploader::new(
                normalizer::ImageNormalizer::default(),
                keywords::KeywordAggregator::from_config(&config)?,
            );
            let options = UploadOptions {
                auto_keywords: !no_auto,
                aggregate: source.options(config.get_vision_api_key()),
                manual_keywords: manual.as_deref().map(parse_keyword_input).unwrap_or_default(),
            };

            let image_count = files.iter().filter(|p| scanner::is_image_path(p)).count();
            let pb = if image_count > 1 {
                let style = ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {msg}")?
                    .progress_chars("#>-");
                Some(ProgressBar::new(image_count as u64).with_style(style))
            } else {
                None
            };

            let report = uploader
                .ingest_paths(&mut library, &files, &options, |done, _| {
                    if let Some(pb) = &pb {
                        pb.set_position(done as u64);
                    }
                })
                .await;
            if let Some(pb) = pb {
                pb.finish_and_clear();
            }

            for notice in &report.notices {
                print_notice(notice);
            }
            for id in &report.added {
                if let Some(record) = library.get(id) {
                    println!("  + {}  {}", record.id(), record.filename);
                }
            }
            if report.skipped > 0 {
                println!("- 画像以外のファイル {}件をスキップ", report.skipped);
            }
            if report.has_failures() {
                println!("\n⚠ {}件のファイルを追加できませんでした:", report.failures.len());
                for failure in &report.failures {
                    println!("  - {}: {}", failure.filename, failure.error);
                }
            }

            println!("\n✅ 追加完了 ({}枚)", report.added.len());
        }

        Commands::Search { query } => {
            let library = open_library(&config)?;
            let terms = parse_query(&query);

            match library.search(&query) {
                SearchOutcome::NoQuery => println!("検索語を入力してください"),
                SearchOutcome::Matches(found) if found.is_empty() => {
                    println!("「{}」に一致する写真はありません", query.trim());
                }
                SearchOutcome::Matches(found) => {
                    println!("🔍 {}件見つかりました\n", found.len());
                    for record in found {
                        let matched = matched_keywords(record, &terms);
                        let keywords: Vec<String> = record
                            .keywords()
                            .iter()
                            .map(|k| {
                                if matched.contains(&k.as_str()) {
                                    format!("[{}]", k)
                                } else {
                                    k.clone()
                                }
                            })
                            .collect();
                        println!("  {}  {}", record.id(), record.filename);
                        println!("    {}", keywords.join(", "));
                    }
                }
            }
        }

        Commands::Tag { id, keywords } => {
            let mut library = open_library(&config)?;
            let record = library.update_keywords(&id, parse_keyword_input(&keywords))?;
            println!("✔ キーワードを更新しました: {}", record.filename);
            println!("    {}", record.keywords().join(", "));
        }

        Commands::Delete { id } => {
            let mut library = open_library(&config)?;
            let removed = library.delete(&id)?;
            println!("✔ 削除しました: {}", removed.filename);
        }

        Commands::List => {
            let library = open_library(&config)?;
            if library.is_empty() {
                println!("写真がありません");
            }
            for record in library.records() {
                print_record(record);
            }
        }

        Commands::Info => {
            let library = open_library(&config)?;
            let (used, limit) = library.usage()?;
            println!("保存情報:");
            println!("  保存先: {}", config.storage_dir()?.display());
            println!("  件数: {}", library.len());
            println!(
                "  サイズ: {:.2}MB / {:.2}MB ({:.0}%)",
                used as f64 / 1024.0 / 1024.0,
                limit as f64 / 1024.0 / 1024.0,
                used as f64 / limit as f64 * 100.0
            );
        }

        Commands::Serve { bind } => {
            let mut config = config;
            if let Some(bind) = bind {
                config.bind = bind;
            }
            println!("🌐 phototag - 中継サーバー ({})", config.bind);
            proxy::run_server(&config).await?;
        }

        Commands::Config { set_vision_key, set_hf_token, set_proxy_url, show } => {
            let mut config = config;

            if let Some(key) = set_vision_key {
                config.set_vision_api_key(key)?;
                println!("✔ Vision APIキーを設定しました");
            }

            if let Some(token) = set_hf_token {
                config.set_hf_token(token)?;
                println!("✔ 推論サービスのトークンを設定しました");
            }

            if let Some(url) = set_proxy_url {
                config.set_proxy_url(url)?;
                println!("✔ 中継サーバーのURLを設定しました");
            }

            if show {
                let set_or_not = |v: Option<String>| if v.is_some() { "設定済み" } else { "未設定" };
                println!("設定:");
                println!("  中継サーバー: {}", config.get_proxy_url());
                println!("  推論モード: {:?}", config.inference_mode);
                println!("  モデル: {}", config.models.join(", "));
                println!("  保存先: {}", config.storage_dir()?.display());
                println!("  Vision APIキー: {}", set_or_not(config.get_vision_api_key()));
                println!("  推論サービスのトークン: {}", set_or_not(config.get_hf_token()));
            }
        }
    }

    Ok(())
}

fn init_logger(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();
}

fn open_library(config: &Config) -> anyhow::Result<PhotoLibrary<FileMedium>> {
    let medium = FileMedium::open(&config.storage_dir()?, config.storage_quota_bytes)?;
    Ok(PhotoLibrary::open(BoundedStore::new(medium)))
}

fn print_notice(notice: &Notice) {
    match notice {
        Notice::Detected { filename, keywords } => {
            let preview = keywords.iter().take(PREVIEW_KEYWORDS).cloned().collect::<Vec<_>>().join(", ");
            let more = if keywords.len() > PREVIEW_KEYWORDS { "..." } else { "" };
            println!("✔ {}: {}件のキーワード: {}{}", filename, keywords.len(), preview, more);
        }
        Notice::NoKeywords { filename, inference_only: true } => {
            println!("⚠ {}: 推論サービスに接続できません。中継サーバー（phototag serve）を確認してください", filename);
        }
        Notice::NoKeywords { filename, .. } => {
            println!("⚠ {}: キーワードを取得できませんでした。tag コマンドで追加してください", filename);
        }
    }
}

fn print_record(record: &PhotoRecord) {
    println!(
        "{}  {}  {}{}",
        record.id(),
        record.added_at.format("%Y-%m-%d %H:%M"),
        record.filename,
        if record.auto_tagged { "  🤖" } else { "" }
    );
    if record.keywords().is_empty() {
        println!("    (キーワードなし)");
    } else {
        println!("    {}", record.keywords().join(", "));
    }
}
