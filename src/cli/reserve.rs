use super::{into_result, ui};
use crate::core::reserve::{ReserveBalance, ReserveTransaction};
use crate::{AppContext, ReserveCommand};
use anyhow::Result;
use comfy_table::{Cell, Table};
use rust_decimal::Decimal;

fn balance_table(balances: &[ReserveBalance]) -> Table {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Asset"),
        ui::header_cell("Amount"),
        ui::header_cell("Unit"),
        ui::header_cell("Value (USD)"),
        ui::header_cell("Location"),
        ui::header_cell("Custodian"),
        ui::header_cell("Updated"),
    ]);
    for balance in balances {
        table.add_row(vec![
            Cell::new(balance.asset_type),
            ui::decimal_cell(balance.amount, 4),
            Cell::new(balance.asset_type.native_unit()),
            ui::decimal_cell(balance.amount_usd, 2),
            ui::optional_cell(balance.location.as_deref()),
            ui::optional_cell(balance.custody_provider.as_deref()),
            Cell::new(balance.updated_at.format("%Y-%m-%d %H:%M:%S")),
        ]);
    }
    table
}

fn transaction_table(transactions: &[ReserveTransaction]) -> Table {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Executed at"),
        ui::header_cell("Type"),
        ui::header_cell("Asset"),
        ui::header_cell("Amount"),
        ui::header_cell("USD"),
        ui::header_cell("Balance"),
        ui::header_cell("Reason"),
        ui::header_cell("By"),
    ]);
    for tx in transactions {
        table.add_row(vec![
            Cell::new(tx.executed_at.format("%Y-%m-%d %H:%M:%S")),
            Cell::new(tx.transaction_type),
            Cell::new(tx.asset_type),
            ui::decimal_cell(tx.amount, 4),
            ui::decimal_cell(tx.amount_usd, 2),
            ui::decimal_cell(tx.new_balance, 4),
            Cell::new(&tx.reason),
            Cell::new(&tx.executed_by),
        ]);
    }
    table
}

fn print_balance(label: &str, balance: &ReserveBalance) {
    println!(
        "{} {} {} ({} USD)",
        ui::style_text(label, ui::StyleType::TotalLabel),
        ui::style_text(&balance.amount.round_dp(4).to_string(), ui::StyleType::TotalValue),
        balance.asset_type.native_unit(),
        balance.amount_usd.round_dp(2)
    );
}

pub async fn run(ctx: &AppContext, command: ReserveCommand) -> Result<()> {
    match command {
        ReserveCommand::List { actor } => {
            let balances = into_result(ctx.admin.reserves(Some(&actor)).await)?;
            if balances.is_empty() {
                println!("No reserves recorded.");
                return Ok(());
            }
            let total: Decimal = balances.iter().map(|b| b.amount_usd).sum();
            println!("\n{}", ui::style_text("Reserves", ui::StyleType::Title));
            println!("{}", balance_table(&balances));
            println!(
                "{} {}",
                ui::style_text("Book value (USD):", ui::StyleType::TotalLabel),
                ui::style_text(&total.round_dp(2).to_string(), ui::StyleType::TotalValue)
            );
        }
        ReserveCommand::Add {
            actor,
            asset,
            amount,
            amount_usd,
            location,
            custody_provider,
        } => {
            let balance = into_result(
                ctx.admin
                    .add_reserve(Some(&actor), asset, amount, amount_usd, location, custody_provider)
                    .await,
            )?;
            print_balance("New balance:", &balance);
        }
        ReserveCommand::Withdraw {
            actor,
            asset,
            amount,
            amount_usd,
            reason,
        } => {
            let balance = into_result(
                ctx.admin
                    .withdraw_reserve(Some(&actor), asset, amount, amount_usd, &reason)
                    .await,
            )?;
            print_balance("Remaining balance:", &balance);
        }
        ReserveCommand::Log { actor } => {
            let transactions = into_result(ctx.admin.reserve_transactions(Some(&actor)).await)?;
            if transactions.is_empty() {
                println!("No reserve transactions recorded.");
                return Ok(());
            }
            println!(
                "\n{}",
                ui::style_text("Reserve transactions", ui::StyleType::Title)
            );
            println!("{}", transaction_table(&transactions));
        }
    }
    Ok(())
}
