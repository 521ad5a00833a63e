use super::{into_result, ui};
use crate::core::basket::BasketComposition;
use crate::{AppContext, BasketCommand};
use anyhow::Result;
use comfy_table::{Cell, Color, Table};

fn basket_table(baskets: &[BasketComposition]) -> Table {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Activated at"),
        ui::header_cell("Gold"),
        ui::header_cell("USD"),
        ui::header_cell("EUR"),
        ui::header_cell("Status"),
        ui::header_cell("By"),
        ui::header_cell("Notes"),
    ]);
    for basket in baskets {
        let status = if basket.is_active {
            Cell::new("active").fg(Color::Green)
        } else {
            Cell::new("inactive").fg(Color::DarkGrey)
        };
        table.add_row(vec![
            Cell::new(basket.activated_at.format("%Y-%m-%d %H:%M:%S")),
            ui::decimal_cell(basket.gold_weight, 4),
            ui::decimal_cell(basket.usd_weight, 4),
            ui::decimal_cell(basket.eur_weight, 4),
            status,
            Cell::new(&basket.activated_by),
            Cell::new(&basket.notes),
        ]);
    }
    table
}

pub async fn run(ctx: &AppContext, command: BasketCommand) -> Result<()> {
    match command {
        BasketCommand::Show { actor: None } => {
            let Some(active) = ctx.registry.get_active().await? else {
                println!("No active basket composition.");
                return Ok(());
            };
            println!("{}", basket_table(&[active]));
        }
        BasketCommand::Show { actor: Some(actor) } => {
            let history = into_result(ctx.admin.basket_history(Some(&actor)).await)?;
            println!(
                "\n{}",
                ui::style_text("Basket composition history", ui::StyleType::Title)
            );
            println!("{}", basket_table(&history));
        }
        BasketCommand::Set {
            actor,
            gold,
            usd,
            eur,
            notes,
        } => {
            let basket = into_result(
                ctx.admin
                    .update_basket(Some(&actor), gold, usd, eur, &notes)
                    .await,
            )?;
            println!(
                "{} {}",
                ui::style_text("Activated basket", ui::StyleType::TotalLabel),
                basket.id
            );
            println!("{}", basket_table(&[basket]));
        }
    }
    Ok(())
}
