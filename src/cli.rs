use crate::keywords::SourceMode;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "phototag")]
#[command(about = "写真キーワード自動付与・検索ツール", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 詳細ログを出力
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 写真を追加（ファイルまたはフォルダ）
    Add {
        /// 写真ファイル/フォルダのパス
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// キーワードを自動取得しない
        #[arg(long)]
        no_auto: bool,

        /// キーワードの取得元
        #[arg(short, long, default_value = "combined")]
        source: SourceMode,

        /// 手入力キーワード（カンマ区切り）
        #[arg(short, long)]
        keywords: Option<String>,

        /// サブフォルダも再帰的にスキャン
        #[arg(short = 'r', long)]
        recursive: bool,
    },

    /// キーワードで写真を検索
    Search {
        /// 検索語（空白区切り、いずれかに部分一致）
        #[arg(default_value = "")]
        query: String,
    },

    /// 写真のキーワードを置き換える
    Tag {
        /// 写真ID
        id: String,

        /// キーワード（カンマ区切り）
        keywords: String,
    },

    /// 写真を削除
    Delete {
        /// 写真ID
        id: String,
    },

    /// 保存済みの写真を一覧表示
    List,

    /// 保存容量を表示
    Info,

    /// 推論サービス用の中継サーバーを起動
    Serve {
        /// 待ち受けアドレス（デフォルト: 設定ファイルの bind）
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// 設定
    Config {
        /// Vision APIキーを設定
        #[arg(long)]
        set_vision_key: Option<String>,

        /// 推論サービスのトークンを設定
        #[arg(long)]
        set_hf_token: Option<String>,

        /// 中継サーバーのURLを設定
        #[arg(long)]
        set_proxy_url: Option<String>,

        /// 現在の設定を表示
        #[arg(long)]
        show: bool,
    },
}
