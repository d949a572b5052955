use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;

use crate::application::LedgerService;
use crate::domain::{format_cents, parse_cents, Account, AccountId, NewAccount, TransferParams};
use crate::storage::{Store, StoreConfig};

/// Ledgerstore - accounts and atomic money transfers
#[derive(Parser)]
#[command(name = "ledgerstore")]
#[command(about = "A minimal account ledger with atomic, concurrency-safe transfers")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, global = true, env = "LEDGER_DATABASE", default_value = "ledger.db")]
    pub database: String,

    /// How long to wait for a locked database, in milliseconds
    #[arg(long, global = true, default_value = "10000")]
    pub busy_timeout_ms: u64,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Account management commands
    #[command(subcommand)]
    Account(AccountCommands),

    /// Move money from one account to another
    Transfer {
        /// Amount to transfer (e.g., "50.00" or "50")
        amount: String,

        /// Source account ID
        #[arg(long)]
        from: AccountId,

        /// Destination account ID
        #[arg(long)]
        to: AccountId,

        /// Give up (and roll back) if not committed within this many milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
    },

    /// List the entries of an account
    Entries {
        /// Account ID
        #[arg(long)]
        account: AccountId,

        #[arg(short, long, default_value = "20")]
        limit: u32,

        #[arg(short, long, default_value = "0")]
        offset: u32,
    },

    /// List transfers from one account to another
    Transfers {
        /// Source account ID
        #[arg(long)]
        from: AccountId,

        /// Destination account ID
        #[arg(long)]
        to: AccountId,

        #[arg(short, long, default_value = "20")]
        limit: u32,

        #[arg(short, long, default_value = "0")]
        offset: u32,
    },

    /// Verify ledger integrity
    Check,
}

#[derive(Subcommand)]
pub enum AccountCommands {
    /// Create a new account
    Create {
        /// Account owner
        owner: String,

        /// Opening balance (e.g., "100.00")
        #[arg(short, long, default_value = "0", allow_hyphen_values = true)]
        balance: String,

        /// Currency code (e.g., EUR, USD)
        #[arg(short, long, default_value = "EUR")]
        currency: String,
    },

    /// Show an account
    Show {
        /// Account ID
        id: AccountId,
    },

    /// List accounts by ID
    List {
        #[arg(short, long, default_value = "20")]
        limit: u32,

        #[arg(short, long, default_value = "0")]
        offset: u32,
    },

    /// Overwrite an account's balance
    SetBalance {
        /// Account ID
        id: AccountId,

        /// New balance (e.g., "100.00")
        #[arg(allow_hyphen_values = true)]
        balance: String,
    },

    /// Delete an account without ledger history
    Delete {
        /// Account ID
        id: AccountId,
    },
}

impl Cli {
    fn config(&self) -> StoreConfig {
        StoreConfig::for_path(&self.database)
            .with_busy_timeout(Duration::from_millis(self.busy_timeout_ms))
    }

    async fn service(&self) -> Result<LedgerService> {
        let store = Store::connect(&self.config()).await?;
        Ok(LedgerService::new(store))
    }

    pub async fn run(self) -> Result<()> {
        let json = self.json;

        match self.command {
            Commands::Init => {
                Store::init(&self.config().create_if_missing(true)).await?;
                println!("Database initialized: {}", self.database);
            }

            Commands::Account(ref cmd) => {
                let service = self.service().await?;
                run_account_command(&service, cmd, json).await?;
            }

            Commands::Transfer {
                ref amount,
                from,
                to,
                timeout_ms,
            } => {
                let service = self.service().await?;
                let amount =
                    parse_cents(amount).context("Invalid amount format. Use '50.00' or '50'")?;
                let params = TransferParams::new(from, to, amount);

                let result = match timeout_ms {
                    Some(ms) => {
                        let deadline = tokio::time::Instant::now() + Duration::from_millis(ms);
                        service.transfer_tx_with_deadline(params, deadline).await?
                    }
                    None => service.transfer_tx(params).await?,
                };

                if json {
                    print_json(&result)?;
                } else {
                    println!(
                        "Transferred {} {} from #{} to #{} (transfer {})",
                        format_cents(result.transfer.amount),
                        result.from_account.currency,
                        result.from_account.id,
                        result.to_account.id,
                        result.transfer.id
                    );
                    println!(
                        "  #{:<6} {:>14}",
                        result.from_account.id,
                        format_cents(result.from_account.balance)
                    );
                    println!(
                        "  #{:<6} {:>14}",
                        result.to_account.id,
                        format_cents(result.to_account.balance)
                    );
                }
            }

            Commands::Entries {
                account,
                limit,
                offset,
            } => {
                let service = self.service().await?;
                let entries = service.list_entries(account, limit, offset).await?;

                if json {
                    print_json(&entries)?;
                } else if entries.is_empty() {
                    println!("No entries found.");
                } else {
                    println!("{:<8} {:<20} {:<7} {:>14}", "ID", "DATE", "KIND", "AMOUNT");
                    println!("{}", "-".repeat(52));
                    for entry in entries {
                        let kind = if entry.is_debit() {
                            "debit"
                        } else if entry.is_credit() {
                            "credit"
                        } else {
                            "-"
                        };
                        println!(
                            "{:<8} {:<20} {:<7} {:>14}",
                            entry.id,
                            entry.created_at.format("%Y-%m-%d %H:%M:%S"),
                            kind,
                            format_cents(entry.amount)
                        );
                    }
                }
            }

            Commands::Transfers {
                from,
                to,
                limit,
                offset,
            } => {
                let service = self.service().await?;
                let transfers = service.list_transfers(from, to, limit, offset).await?;

                if json {
                    print_json(&transfers)?;
                } else if transfers.is_empty() {
                    println!("No transfers found.");
                } else {
                    println!(
                        "{:<8} {:<20} {:<8} {:<8} {:>14}",
                        "ID", "DATE", "FROM", "TO", "AMOUNT"
                    );
                    println!("{}", "-".repeat(62));
                    for transfer in transfers {
                        println!(
                            "{:<8} {:<20} {:<8} {:<8} {:>14}",
                            transfer.id,
                            transfer.created_at.format("%Y-%m-%d %H:%M:%S"),
                            transfer.from_account_id,
                            transfer.to_account_id,
                            format_cents(transfer.amount)
                        );
                    }
                }
            }

            Commands::Check => {
                let service = self.service().await?;
                run_check_command(&service, json).await?;
            }
        }

        Ok(())
    }
}

async fn run_account_command(
    service: &LedgerService,
    cmd: &AccountCommands,
    json: bool,
) -> Result<()> {
    match cmd {
        AccountCommands::Create {
            owner,
            balance,
            currency,
        } => {
            let balance =
                parse_cents(balance).context("Invalid balance format. Use '50.00' or '50'")?;
            let account = service
                .create_account(NewAccount::new(owner.as_str(), balance, currency.as_str()))
                .await?;
            if json {
                print_json(&account)?;
            } else {
                println!("Created account #{} for {}", account.id, account.owner);
            }
        }

        AccountCommands::Show { id } => {
            let account = service.get_account(*id).await?;
            if json {
                print_json(&account)?;
            } else {
                print_account(&account);
            }
        }

        AccountCommands::List { limit, offset } => {
            let accounts = service.list_accounts(*limit, *offset).await?;
            if json {
                print_json(&accounts)?;
            } else if accounts.is_empty() {
                println!("No accounts found.");
            } else {
                println!("{:<8} {:<20} {:>14} {:<8}", "ID", "OWNER", "BALANCE", "CURRENCY");
                println!("{}", "-".repeat(54));
                for account in accounts {
                    println!(
                        "{:<8} {:<20} {:>14} {:<8}",
                        account.id,
                        truncate(&account.owner, 20),
                        format_cents(account.balance),
                        account.currency
                    );
                }
            }
        }

        AccountCommands::SetBalance { id, balance } => {
            let balance =
                parse_cents(balance).context("Invalid balance format. Use '50.00' or '50'")?;
            let account = service.update_account(*id, balance).await?;
            if json {
                print_json(&account)?;
            } else {
                print_account(&account);
            }
        }

        AccountCommands::Delete { id } => {
            service.delete_account(*id).await?;
            if json {
                print_json(&deleted_summary(*id))?;
            } else {
                println!("Deleted account #{}", id);
            }
        }
    }
    Ok(())
}

async fn run_check_command(service: &LedgerService, json: bool) -> Result<()> {
    let report = service.check_integrity().await?;

    if json {
        print_json(&report)?;
    } else {
        println!("Checking ledger integrity...\n");
        println!("Accounts:      {}", report.stats.account_count);
        println!("Transfers:     {}", report.stats.transfer_count);
        println!("Entries:       {}", report.stats.entry_count);
        println!("Total balance: {}", format_cents(report.stats.total_balance));
        println!();
    }

    if !report.is_healthy() {
        if !json {
            println!("Issues found:");
            for issue in &report.issues {
                println!("  - {}", issue);
            }
        }
        anyhow::bail!("Ledger integrity check failed");
    }

    if !json {
        println!("Ledger is consistent.");
    }
    Ok(())
}

fn print_account(account: &Account) {
    println!("Account #{}", account.id);
    println!("  Owner:    {}", account.owner);
    println!(
        "  Balance:  {} {}",
        format_cents(account.balance),
        account.currency
    );
    println!(
        "  Created:  {}",
        account.created_at.format("%Y-%m-%d %H:%M:%S")
    );
}

fn deleted_summary(id: AccountId) -> serde_json::Value {
    serde_json::json!({ "deleted": id })
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_transfer_command() {
        let cli = Cli::try_parse_from([
            "ledgerstore",
            "--database",
            "test.db",
            "transfer",
            "12.50",
            "--from",
            "1",
            "--to",
            "2",
        ])
        .unwrap();

        assert_eq!(cli.database, "test.db");
        match cli.command {
            Commands::Transfer {
                amount,
                from,
                to,
                timeout_ms,
            } => {
                assert_eq!(amount, "12.50");
                assert_eq!((from, to), (1, 2));
                assert_eq!(timeout_ms, None);
            }
            _ => panic!("expected transfer command"),
        }
    }

    #[test]
    fn test_parse_negative_balance() {
        let cli = Cli::try_parse_from(["ledgerstore", "account", "set-balance", "3", "-5.00"])
            .unwrap();
        match cli.command {
            Commands::Account(AccountCommands::SetBalance { id, balance }) => {
                assert_eq!(id, 3);
                assert_eq!(balance, "-5.00");
            }
            _ => panic!("expected set-balance command"),
        }
    }

    #[test]
    fn test_database_flag_after_subcommand() {
        let cli = Cli::try_parse_from(["ledgerstore", "account", "list", "--database", "x.db"])
            .unwrap();
        assert_eq!(cli.database, "x.db");
        assert!(matches!(
            cli.command,
            Commands::Account(AccountCommands::List { limit: 20, offset: 0 })
        ));
    }

    #[test]
    fn test_delete_json_summary() {
        let cli = Cli::try_parse_from(["ledgerstore", "account", "delete", "9", "--json"]).unwrap();
        assert!(cli.json);
        assert_eq!(deleted_summary(9).to_string(), r#"{"deleted":9}"#);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 20), "short");
        assert_eq!(truncate("a very long owner name here", 10), "a very ...");
    }
}
