//! List command implementation.

use chrono::{DateTime, Utc};
use futures::TryStreamExt;

use crate::location;
use crate::output;

pub struct ListArgs {
    pub root: String,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub cursor: Option<String>,
    pub event_type: Option<String>,
    pub max_events: Option<u64>,
    pub container: String,
    pub json: bool,
}

pub async fn run(args: ListArgs) -> Result<(), Box<dyn std::error::Error>> {
    let client = location::open_client(&args.root, &args.container)
        .map_err(|e| format!("Invalid container: {}", e))?;

    let mut stream = match &args.cursor {
        Some(token) => client.open_with_cursor(token).await?,
        None => client.open(args.start, args.end).await?,
    };

    // Output header if table format
    if !args.json {
        output::print_table_header();
    }

    let mut event_count: u64 = 0;
    let mut last_cursor = None;
    loop {
        if args.max_events.is_some_and(|max| event_count >= max) {
            break;
        }
        let Some(item) = stream.try_next().await? else {
            break;
        };
        // The cursor advances past filtered events too.
        last_cursor = Some(item.cursor);

        if let Some(event_type) = &args.event_type {
            if item.event.event_type() != Some(event_type.as_str()) {
                continue;
            }
        }

        if args.json {
            println!("{}", serde_json::to_string(item.event.record())?);
        } else {
            println!("{}", output::format_table_row(&item.event));
        }
        event_count += 1;
    }

    if let Some(cursor) = last_cursor {
        eprintln!("cursor: {}", cursor.serialize()?);
    }

    Ok(())
}
