//! Walks a `people` table through insert, read, update and remove.
//!
//! Run with `cargo run --example crud`. Set `DATABASE_URL` to point at
//! Postgres or MySQL instead of the default in-memory SQLite database.

use docmodel::{Client, ConnectConfig, Database, Error, FieldType, Fields, Schema};

#[tokio::main]
async fn main() -> Result<(), Error> {
    env_logger::init();

    let url = std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite::memory:".to_string());
    let client = match url.split(':').next() {
        Some("postgres" | "postgresql") => Client::Postgres,
        Some("mysql") => Client::MySql,
        _ => Client::Sqlite,
    };

    let mut db = Database::new();
    db.connect(&ConnectConfig::new(client, url).with_pool(1, 1))
        .await?;

    let ddl = match client {
        Client::Postgres => "CREATE TABLE IF NOT EXISTS people (id SERIAL PRIMARY KEY, name TEXT, age INTEGER)",
        Client::MySql => "CREATE TABLE IF NOT EXISTS people (id INTEGER AUTO_INCREMENT PRIMARY KEY, name TEXT, age INTEGER)",
        Client::Sqlite => "CREATE TABLE IF NOT EXISTS people (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT, age INTEGER)",
    };
    db.connection()?
        .execute(ddl)
        .await
        .map_err(|e| Error::Engine(e.to_string()))?;

    let schema = Schema::new()
        .field("name", FieldType::String)
        .required("age", FieldType::Number);
    let people = db.model("people", schema.into())?;

    let john = people
        .insert(Fields::new().with("name", "john").with("age", 31))
        .await?;
    println!("inserted {}", john.to_json());

    match people.insert(Fields::from([("name", "nobody")])).await {
        Err(Error::Validation(e)) => println!("rejected: {e}"),
        other => println!("unexpected: {other:?}"),
    }

    if let Some(id) = john.id() {
        people
            .raw_update(id, Fields::from([("name", "mark")]))
            .await?;
        if let Some(doc) = people.get(id).await? {
            println!("after update {}", doc.to_json());
        }
    }

    for doc in people.get_all().await? {
        println!("row {}", doc.to_json());
        if let Some(id) = doc.id() {
            people.raw_remove(id).await?;
        }
    }
    println!("{} rows left", people.get_all().await?.len());

    db.disconnect().await
}
