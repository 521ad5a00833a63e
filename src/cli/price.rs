use super::{into_result, ui};
use crate::AppContext;
use crate::core::currency::BASE_CURRENCY;
use crate::core::error::EngineError;
use crate::core::price::GoldUnit;
use crate::core::valuation::ActPriceSnapshot;
use anyhow::{Result, anyhow};
use comfy_table::{Cell, Table};
use futures::future::join;
use rust_decimal::Decimal;

fn snapshot_table(snapshot: &ActPriceSnapshot, threshold: Decimal) -> Table {
    let mut table = ui::new_styled_table();
    table.set_header(vec![ui::header_cell("Metric"), ui::header_cell("Value")]);
    table.add_row(vec![
        Cell::new("ACT price (USD)"),
        ui::decimal_cell(snapshot.price_usd, 6),
    ]);
    table.add_row(vec![
        Cell::new("Total reserves (USD)"),
        ui::decimal_cell(snapshot.total_reserve_usd, 2),
    ]);
    table.add_row(vec![
        Cell::new("Gold component (USD)"),
        ui::decimal_cell(snapshot.gold_component_usd, 2),
    ]);
    table.add_row(vec![
        Cell::new("USD component"),
        ui::decimal_cell(snapshot.usd_component, 2),
    ]);
    table.add_row(vec![
        Cell::new("EUR component (USD)"),
        ui::decimal_cell(snapshot.eur_component_usd, 2),
    ]);
    table.add_row(vec![
        Cell::new("Total supply"),
        ui::decimal_cell(snapshot.total_supply, 0),
    ]);
    table.add_row(vec![
        Cell::new("Reserve ratio"),
        ui::ratio_cell(snapshot.reserve_ratio, threshold),
    ]);
    table.add_row(vec![
        Cell::new("Peg ratio"),
        ui::ratio_cell(snapshot.peg_ratio, threshold),
    ]);
    table
}

fn history_table(snapshots: &[ActPriceSnapshot], threshold: Decimal) -> Table {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Calculated at"),
        ui::header_cell("Price (USD)"),
        ui::header_cell("Reserves (USD)"),
        ui::header_cell("Peg ratio"),
        ui::header_cell("Basket"),
    ]);
    for snapshot in snapshots {
        let basket = snapshot.basket_composition_id.map(|id| id.to_string());
        table.add_row(vec![
            Cell::new(snapshot.calculated_at.format("%Y-%m-%d %H:%M:%S")),
            ui::decimal_cell(snapshot.price_usd, 6),
            ui::decimal_cell(snapshot.total_reserve_usd, 2),
            ui::ratio_cell(snapshot.peg_ratio, threshold),
            ui::optional_cell(basket.as_deref()),
        ]);
    }
    table
}

// Rows only for currencies that already have a stored USD rate.
async fn local_price_table(ctx: &AppContext, price_usd: Decimal) -> Result<Option<Table>> {
    let mut table = ui::new_styled_table();
    table.set_header(vec![ui::header_cell("Currency"), ui::header_cell("ACT price")]);
    for code in &ctx.config.providers.rates.currencies {
        match ctx.rates.convert_amount(price_usd, BASE_CURRENCY, code).await {
            Ok(amount) => {
                table.add_row(vec![Cell::new(code), ui::decimal_cell(amount, 4)]);
            }
            Err(EngineError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok((table.row_iter().count() > 0).then_some(table))
}

pub async fn run_price(ctx: &AppContext) -> Result<()> {
    let (current, last_saved) = join(
        ctx.engine.compute_current(),
        ctx.engine.latest_snapshot(),
    )
    .await;
    let current = current?;
    let threshold = ctx.engine.settings().rebalance_threshold;

    println!("\n{}", ui::style_text("ACT valuation", ui::StyleType::Title));
    println!("{}", snapshot_table(&current, threshold));
    if let Some(table) = local_price_table(ctx, current.price_usd).await? {
        println!("{table}");
    }

    match ctx.registry.get_active().await? {
        Some(basket) => println!(
            "Basket: gold {} / usd {} / eur {}",
            basket.gold_weight, basket.usd_weight, basket.eur_weight
        ),
        None => println!(
            "{}",
            ui::style_text("No active basket composition", ui::StyleType::Subtle)
        ),
    }
    if let Some(saved) = last_saved? {
        println!(
            "{}",
            ui::style_text(
                &format!(
                    "Last saved snapshot: {} at {}",
                    saved.price_usd.round_dp(6),
                    saved.calculated_at.format("%Y-%m-%d %H:%M:%S")
                ),
                ui::StyleType::Subtle
            )
        );
    }
    if current.peg_ratio < threshold {
        println!(
            "{}",
            ui::style_text(
                &format!(
                    "Reserves cover less than {}% of supply: rebalancing needed",
                    (threshold * Decimal::ONE_HUNDRED).round_dp(2).normalize()
                ),
                ui::StyleType::Error
            )
        );
    }
    Ok(())
}

pub async fn run_history(ctx: &AppContext, limit: usize) -> Result<()> {
    let snapshots = into_result(ctx.admin.price_history(limit).await)?;
    if snapshots.is_empty() {
        println!("No price snapshots recorded yet.");
        return Ok(());
    }
    let threshold = ctx.engine.settings().rebalance_threshold;
    println!("\n{}", ui::style_text("ACT price history", ui::StyleType::Title));
    println!("{}", history_table(&snapshots, threshold));
    Ok(())
}

pub async fn run_refresh(ctx: &AppContext, gold_only: bool) -> Result<()> {
    let pb = ui::new_spinner(&format!("Refreshing via {}", ctx.gold.provider_name()));

    let (success, gold_price, act_price) = if gold_only {
        let summary = ctx.jobs.refresh_gold().await;
        pb.finish_and_clear();
        if let Some(error) = &summary.error {
            println!("{}", ui::style_text(error, ui::StyleType::Error));
        }
        (summary.success, Some(summary.gold_price), summary.act_price)
    } else {
        let summary = ctx.jobs.refresh_all().await;
        pb.finish_and_clear();
        let Some(results) = summary.results else {
            return Err(anyhow!(summary.message.unwrap_or_default()));
        };
        println!(
            "Exchange rates updated: {}",
            ui::style_text(
                &results.exchange_rates.updated.to_string(),
                ui::StyleType::TotalValue
            )
        );
        for error in results
            .exchange_rates
            .errors
            .iter()
            .chain(results.gold_price.error.iter())
            .chain(results.act_price.error.iter())
        {
            println!("{}", ui::style_text(error, ui::StyleType::Error));
        }
        (summary.success, results.gold_price.price, results.act_price.price)
    };

    if let Some(price) = gold_price {
        for unit in [GoldUnit::Ounce, GoldUnit::Gram] {
            println!(
                "{} {}",
                ui::style_text(&format!("Gold (USD/{unit}):"), ui::StyleType::TotalLabel),
                unit.from_ounce_price(price).round_dp(2)
            );
        }
    }
    if let Some(price) = act_price {
        println!(
            "{} {}",
            ui::style_text("ACT (USD):", ui::StyleType::TotalLabel),
            ui::style_text(&price.round_dp(6).to_string(), ui::StyleType::TotalValue)
        );
    }
    if !success {
        return Err(anyhow!("Refresh completed with errors"));
    }
    Ok(())
}

pub async fn run_force_update(ctx: &AppContext, actor: &str) -> Result<()> {
    let snapshot = into_result(ctx.admin.force_price_update(Some(actor)).await)?;
    let threshold = ctx.engine.settings().rebalance_threshold;
    println!("{}", snapshot_table(&snapshot, threshold));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::asset::AssetPrices;
    use crate::core::reserve::ReserveAmounts;
    use crate::core::valuation::compute_price;
    use rust_decimal_macros::dec;

    fn snapshot() -> ActPriceSnapshot {
        let reserves = ReserveAmounts {
            gold: dec!(100),
            usd: dec!(500000),
            eur: dec!(0),
        };
        compute_price(&AssetPrices::default(), None, &reserves, dec!(1000000))
    }

    #[test]
    fn test_snapshot_table_lists_metrics() {
        let rendered = snapshot_table(&snapshot(), dec!(0.8)).to_string();
        assert!(rendered.contains("ACT price (USD)"));
        assert!(rendered.contains("0.7"));
        assert!(rendered.contains("700000"));
        assert!(rendered.contains("70%"));
    }

    #[tokio::test]
    async fn test_local_price_table_skips_missing_rates() {
        use crate::core::config::AppConfig;
        use crate::core::currency::ExchangeRate;
        use crate::store::Store;
        use crate::store::memory::MemoryStore;
        use std::sync::Arc;

        let config: AppConfig = serde_yaml::from_str(
            "storage: memory\nproviders:\n  rates:\n    currencies: [NGN, KES]\n",
        )
        .unwrap();
        let store = Arc::new(MemoryStore::new());
        let ctx = AppContext::new(config, store.clone()).unwrap();

        assert!(local_price_table(&ctx, dec!(0.5)).await.unwrap().is_none());

        store
            .upsert_exchange_rate(ExchangeRate {
                from_currency: "USD".to_string(),
                to_currency: "NGN".to_string(),
                rate: dec!(1500),
                updated_at: chrono::Utc::now(),
            })
            .await
            .unwrap();
        let table = local_price_table(&ctx, dec!(0.5)).await.unwrap().unwrap();
        assert_eq!(table.row_iter().count(), 1);
        assert!(table.to_string().contains("750"));
    }

    #[test]
    fn test_history_table_has_row_per_snapshot() {
        let table = history_table(&[snapshot(), snapshot()], dec!(0.8));
        assert_eq!(table.row_iter().count(), 2);
    }
}
