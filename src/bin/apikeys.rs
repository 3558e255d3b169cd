//! Operator utility: mint a partner API key.
//!
//! Usage: `apikeys <label> [company-uuid]`
//!
//! Prints the raw key exactly once; only its hash is stored.

use anyhow::{bail, Context};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use uuid::Uuid;

use leadflow::accounts::{generate_api_key, insert_api_key};

fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let mut args = std::env::args().skip(1);
    let Some(label) = args.next() else {
        bail!("usage: apikeys <label> [company-uuid]");
    };
    let company_id = args
        .next()
        .map(|raw| Uuid::parse_str(&raw).context("company id must be a UUID"))
        .transpose()?;

    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let mut conn = PgConnection::establish(&database_url)
        .context("failed to connect to database")?;

    let raw_key = generate_api_key();
    let key = insert_api_key(&mut conn, &raw_key, &label, company_id)?;

    println!("created API key {} (label: {})", key.id, key.label);
    println!("raw key (store it now, it is not recoverable): {raw_key}");
    Ok(())
}
