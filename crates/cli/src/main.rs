//! # blobdrop CLI
//!
//! 運用者向けのトークン管理ツール。
//!
//! - `create-token` — クライアント用トークンとサーバー保持値（`DROP_TOKEN`）を生成
//! - `check-token` — stdinのトークンがサーバー保持値と一致するか確認（不一致は終了コード1）

use std::io::Read;
use std::process::ExitCode;

use anyhow::Context;
use blobdrop_crypto::{generate_token, Credential, HardenedParams, TokenForm};
use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "blobdrop-cli")]
#[command(about = "blobdrop operator CLI")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 新しいトークンを生成する
    CreateToken(CreateTokenArgs),
    /// stdinから読んだトークンをサーバー保持値と照合する
    CheckToken {
        /// サーバー保持値（DROP_TOKENに設定する値）
        #[arg(long)]
        server: String,
    },
}

#[derive(Args)]
struct CreateTokenArgs {
    /// scryptによるHardened形式で生成する
    #[arg(long)]
    hardened: bool,

    /// scryptのコストN（2の冪）
    #[arg(long, requires = "hardened")]
    cost: Option<u64>,

    /// scryptのブロックサイズr
    #[arg(long, requires = "hardened")]
    block_size: Option<u32>,

    /// scryptの並列度p
    #[arg(long, requires = "hardened")]
    parallelism: Option<u32>,

    /// 導出鍵の長さ（バイト）
    #[arg(long, requires = "hardened")]
    output_length: Option<usize>,
}

impl CreateTokenArgs {
    fn form(&self) -> TokenForm {
        if !self.hardened {
            return TokenForm::Digest;
        }
        let defaults = HardenedParams::default();
        TokenForm::Hardened(HardenedParams {
            cost: self.cost.unwrap_or(defaults.cost),
            block_size: self.block_size.unwrap_or(defaults.block_size),
            parallelism: self.parallelism.unwrap_or(defaults.parallelism),
            output_length: self.output_length.unwrap_or(defaults.output_length),
        })
    }
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    match cli.command {
        Commands::CreateToken(args) => {
            let (client, server) =
                generate_token(args.form()).context("トークンの生成に失敗しました")?;
            println!("client token: {client}");
            println!("server token: {server}");
            Ok(ExitCode::SUCCESS)
        }
        Commands::CheckToken { server } => {
            let mut input = String::new();
            std::io::stdin()
                .read_to_string(&mut input)
                .context("stdinの読み取りに失敗しました")?;

            if check_token(&server, &input)? {
                println!("match");
                Ok(ExitCode::SUCCESS)
            } else {
                println!("mismatch");
                Ok(ExitCode::FAILURE)
            }
        }
    }
}

/// サーバー保持値をパースし、候補トークン（末尾改行は除去）を検証する。
fn check_token(server: &str, candidate: &str) -> anyhow::Result<bool> {
    let credential: Credential = server
        .parse()
        .context("サーバー保持値のパースに失敗しました")?;
    let token = candidate.trim_end_matches(['\r', '\n']);
    Ok(credential.verify(token.as_bytes()))
}
