//! Last-consumable command implementation.

use chrono::SecondsFormat;

use crate::location;

pub async fn run(root: String) -> Result<(), Box<dyn std::error::Error>> {
    let client = location::open_client(&root, "changefeed")
        .map_err(|e| format!("Invalid container: {}", e))?;

    match client.last_consumable().await? {
        Some(time) => println!("{}", time.to_rfc3339_opts(SecondsFormat::Secs, true)),
        None => println!("none"),
    }
    Ok(())
}
