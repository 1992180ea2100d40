use anyhow::Result;
use serde_json::json;

use slidekit::{Config, Reply};

pub async fn cmd_order_create(config: &Config, item_id: &str) -> Result<()> {
    let service = config.order_service()?;
    let body = serde_json::to_vec(&json!({ "itemId": item_id }))?;
    print_reply(&service.handle_create(&body).await)
}

pub async fn cmd_order_capture(config: &Config, order_id: &str, item_id: Option<&str>) -> Result<()> {
    let service = config.order_service()?;
    let body = serde_json::to_vec(&json!({ "orderId": order_id, "itemId": item_id }))?;
    print_reply(&service.handle_capture(&body).await)
}

fn print_reply(reply: &Reply) -> Result<()> {
    println!("{}", reply.body_string());
    if reply.status >= 400 {
        anyhow::bail!("order request failed with status {}", reply.status);
    }
    Ok(())
}
