use anyhow::{anyhow, bail, Result};
use clap::{Parser, Subcommand};
use shared::domain::{MemoId, RowStatus, UserId, Visibility};
use storage::{NewMemo, NewResource, Storage};

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, default_value = "sqlite://./data/memos_demo.db")]
    database_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    CreateUser {
        username: String,
    },
    CreateMemo {
        creator_id: i64,
        content: String,
        #[arg(long, default_value = "public")]
        visibility: String,
    },
    AttachResource {
        memo_id: i64,
        filename: String,
        #[arg(long, default_value = "")]
        external_link: String,
        #[arg(long, default_value = "application/octet-stream")]
        mime_type: String,
        #[arg(long, default_value_t = 0)]
        size: u64,
    },
    ArchiveMemo {
        memo_id: i64,
    },
    PinMemo {
        memo_id: i64,
        #[arg(long)]
        unpin: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let storage = Storage::new(&cli.database_url).await?;

    match cli.command {
        Command::CreateUser { username } => {
            let user_id = storage.create_user(&username).await?;
            println!("created user_id={}", user_id.0);
        }
        Command::CreateMemo {
            creator_id,
            content,
            visibility,
        } => {
            let visibility = Visibility::parse(&visibility)
                .ok_or_else(|| anyhow!("unknown visibility '{visibility}'"))?;
            let creator_id = UserId(creator_id);
            let username = storage
                .username_for_user(creator_id)
                .await?
                .ok_or_else(|| anyhow!("user {} not found", creator_id.0))?;
            let memo_id = storage
                .create_memo(&NewMemo {
                    creator_id,
                    content: &content,
                    visibility,
                    created_ts: None,
                })
                .await?;
            println!("created memo_id={} for @{username}", memo_id.0);
        }
        Command::AttachResource {
            memo_id,
            filename,
            external_link,
            mime_type,
            size,
        } => {
            let memo = storage
                .find_memo(MemoId(memo_id))
                .await?
                .ok_or_else(|| anyhow!("memo {memo_id} not found"))?;
            let resource = storage
                .create_resource(&NewResource {
                    creator_id: memo.creator_id,
                    memo_id: Some(memo.memo_id),
                    filename: &filename,
                    external_link: &external_link,
                    mime_type: &mime_type,
                    size,
                })
                .await?;
            println!(
                "created resource_id={} public_id={}",
                resource.resource_id.0, resource.public_id
            );
        }
        Command::ArchiveMemo { memo_id } => {
            if !storage
                .set_memo_row_status(MemoId(memo_id), RowStatus::Archived)
                .await?
            {
                bail!("memo {memo_id} not found");
            }
            println!("archived memo_id={memo_id}");
        }
        Command::PinMemo { memo_id, unpin } => {
            if !storage.set_memo_pinned(MemoId(memo_id), !unpin).await? {
                bail!("memo {memo_id} not found");
            }
            let action = if unpin { "unpinned" } else { "pinned" };
            println!("{action} memo_id={memo_id}");
        }
    }

    Ok(())
}
