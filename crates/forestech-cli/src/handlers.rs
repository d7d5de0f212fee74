//! Command handlers.

use std::future::Future;
use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use forestech_core::models::{Invoice, Movement, MovementType, MovementTypeFilter, Product, Supplier, Vehicle};
use forestech_core::{ForestechApi, NotificationFeed};
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

use crate::console::{render_snapshot, ConsoleSink};
use crate::Resource;

pub async fn health(api: &ForestechApi) -> Result<()> {
    let up = api.check_connection().await;
    println!("{}", render_snapshot(&api.monitor().snapshot(), api.banner()));
    if !up {
        bail!("backend unreachable at {}", api.config().health_url);
    }
    Ok(())
}

pub async fn list(
    api: &ForestechApi,
    resource: Resource,
    search: Option<&str>,
    movement_type: Option<MovementType>,
    json: bool,
) -> Result<()> {
    let search = search.map(str::to_string);

    match resource {
        Resource::Products => {
            let service = api.products().clone();
            let rows = fetch(api, cache_key("products", search.as_deref()), move || {
                let service = service.clone();
                let search = search.clone();
                async move {
                    match search {
                        Some(q) => service.search(&q).await,
                        None => service.get_all().await,
                    }
                }
            })
            .await?;
            print_rows(&rows, json, product_line)
        }
        Resource::Vehicles => {
            let service = api.vehicles().clone();
            let rows = fetch(api, cache_key("vehicles", search.as_deref()), move || {
                let service = service.clone();
                let search = search.clone();
                async move {
                    match search {
                        Some(q) => service.search(&q).await,
                        None => service.get_all().await,
                    }
                }
            })
            .await?;
            print_rows(&rows, json, vehicle_line)
        }
        Resource::Suppliers => {
            let service = api.suppliers().clone();
            let rows = fetch(api, "suppliers".to_string(), move || {
                let service = service.clone();
                async move { service.get_all().await }
            })
            .await?;
            print_rows(&rows, json, supplier_line)
        }
        Resource::Movements => {
            let filter = movement_type
                .map(MovementTypeFilter::Only)
                .unwrap_or_default();
            let key = match movement_type {
                Some(kind) => format!("movements:{}", kind),
                None => "movements".to_string(),
            };
            let service = api.movements().clone();
            let rows = fetch(api, key, move || {
                let service = service.clone();
                async move { service.get_all(filter).await }
            })
            .await?;
            print_rows(&rows, json, movement_line)
        }
        Resource::Invoices => {
            let service = api.invoices().clone();
            let rows = fetch(api, "invoices".to_string(), move || {
                let service = service.clone();
                async move { service.get_all().await }
            })
            .await?;
            print_rows(&rows, json, invoice_line)
        }
    }
}

pub async fn stock(api: &ForestechApi, product_id: &str, valued: bool, json: bool) -> Result<()> {
    if valued {
        let stock = api.movements().get_stock_valued(product_id).await?;
        if json {
            println!("{}", serde_json::to_string_pretty(&stock)?);
        } else {
            println!(
                "{}: {} units at {:.2} (value {:.2})",
                stock.product_id,
                stock.stock,
                stock.weighted_average_price,
                stock.total_value()
            );
        }
    } else {
        let stock = api.movements().get_stock(product_id).await?;
        if json {
            println!("{}", serde_json::to_string_pretty(&stock)?);
        } else {
            println!("{}: {} units", stock.product_id, stock.stock);
        }
    }
    Ok(())
}

pub async fn cancel_invoice(api: &ForestechApi, id: &str) -> Result<()> {
    api.invoices().cancel(id).await?;
    api.cache().invalidate("invoices");
    api.notifier().success(format!("Invoice {} cancelled", id));
    Ok(())
}

/// Follow the connection state and present notifications until Ctrl-C.
///
/// Pressing Enter runs a manual recheck.
pub async fn watch(api: &ForestechApi, feed: NotificationFeed) -> Result<()> {
    let mut status = api.monitor().subscribe();
    let presenter = tokio::spawn(async move { feed.present(&ConsoleSink).await });

    println!("{}", render_snapshot(&status.borrow_and_update(), api.banner()));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = status.borrow_and_update().clone();
                println!("{}", render_snapshot(&snapshot, api.banner()));
            }
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(_)) => {
                    debug!("Manual recheck requested");
                    let monitor = api.monitor().clone();
                    tokio::spawn(async move {
                        monitor.check_connection().await;
                    });
                }
                Ok(None) | Err(_) => stdin_open = false,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received, exiting");
                break;
            }
        }
    }

    presenter.abort();
    Ok(())
}

async fn fetch<T, F, Fut>(api: &ForestechApi, key: String, producer: F) -> Result<Arc<T>>
where
    T: Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = forestech_core::Result<T>> + Send + 'static,
{
    let state = api.cached(key, producer).load().await;

    if state.is_disconnected && state.data.is_none() {
        bail!("backend unreachable; run `forestech health` to recheck");
    }
    if let Some(err) = state.error {
        return Err(err.into());
    }
    state.data.ok_or_else(|| anyhow!("no data returned"))
}

fn cache_key(resource: &str, search: Option<&str>) -> String {
    match search {
        Some(q) => format!("{}:search:{}", resource, q),
        None => resource.to_string(),
    }
}

fn print_rows<T: Serialize>(rows: &[T], json: bool, line: fn(&T) -> String) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(rows)?);
        return Ok(());
    }
    for row in rows {
        println!("{}", line(row));
    }
    if rows.is_empty() {
        println!("(none)");
    }
    Ok(())
}

fn product_line(p: &Product) -> String {
    format!("{}  {}  {:.2}/{}", p.id, p.name, p.unit_price, p.measurement_unit)
}

fn vehicle_line(v: &Vehicle) -> String {
    format!("{}  {}  {} {} ({})", v.id, v.placa, v.marca, v.modelo, v.anio)
}

fn supplier_line(s: &Supplier) -> String {
    format!("{}  {}  NIT {}", s.id, s.name, s.nit)
}

fn movement_line(m: &Movement) -> String {
    format!(
        "{}  {}  product {}  qty {}  subtotal {:.2}",
        m.id, m.movement_type, m.product_id, m.quantity, m.subtotal
    )
}

fn invoice_line(i: &Invoice) -> String {
    format!(
        "{}  {}  {}  total {:.2}  {}",
        i.id, i.numero_factura, i.fecha_emision, i.total, i.estado
    )
}
