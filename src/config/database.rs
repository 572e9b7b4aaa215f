use bson::doc;
use mongodb::{Client, Database};

use crate::config::settings::DatabaseSettings;

pub async fn connect(settings: &DatabaseSettings) -> Result<Database, mongodb::error::Error> {
    let client = Client::with_uri_str(&settings.uri).await?;
    let db = client.database(&settings.database);

    // The driver connects lazily; ping so bad URIs and credentials fail here.
    db.run_command(doc! { "ping": 1 }).await?;

    Ok(db)
}
