//! Pages command implementation.

use chrono::{DateTime, Utc};
use serde_json::json;

use crate::location;

pub async fn run(
    root: String,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    cursor: Option<String>,
    page_size: Option<usize>,
    container: String,
) -> Result<(), Box<dyn std::error::Error>> {
    let client = location::open_client(&root, &container)
        .map_err(|e| format!("Invalid container: {}", e))?;

    let mut stream = match &cursor {
        Some(token) => client.open_with_cursor(token).await?,
        None => client.open(start, end).await?,
    };

    let mut index = 0usize;
    while let Some(page) = stream.next_page(page_size).await? {
        index += 1;
        let line = json!({
            "page": index,
            "count": page.len(),
            "continuation": page.continuation_token()?,
        });
        println!("{}", serde_json::to_string(&line)?);
    }

    Ok(())
}
