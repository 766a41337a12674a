use mongodb::{Client, Database, IndexModel};
use mongodb::bson::doc;
use mongodb::options::IndexOptions;
use std::env;

/// Process-wide configuration, built once at startup and injected into the app
/// as `web::Data<Config>`. Handlers never read the environment directly.
#[derive(Clone)]
pub struct Config {
    pub port: u16,
    pub mongodb_uri: String,
    pub database_name: String,
    pub jwt_secret: String,
    pub jwt_expire_hours: i64,
    pub frontend_url: String,
    pub email: EmailConfig,
}

#[derive(Clone)]
pub struct EmailConfig {
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub from_name: String,
    pub from_email: String,
    /// Operator inbox that receives booking and contact notifications.
    pub operator_recipient: String,
}

impl Config {
    pub fn from_env() -> Config {
        let from_email = env::var("EMAIL_FROM_EMAIL")
            .unwrap_or_else(|_| "noreply@vroum-auto.example".to_string());
        Config {
            port: env::var("PORT")
                .unwrap_or_else(|_| "5000".to_string())
                .parse()
                .expect("PORT must be a number"),
            mongodb_uri: env::var("MONGODB_URI").expect("MONGODB_URI must be set"),
            database_name: env::var("DATABASE_NAME").expect("DATABASE_NAME must be set"),
            jwt_secret: env::var("JWT_SECRET").expect("JWT_SECRET must be set"),
            jwt_expire_hours: env::var("JWT_EXPIRE_HOURS")
                .unwrap_or_else(|_| "24".to_string())
                .parse()
                .expect("JWT_EXPIRE_HOURS must be a number"),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            email: EmailConfig {
                smtp_host: env::var("EMAIL_HOST").ok(),
                smtp_port: env::var("EMAIL_PORT")
                    .unwrap_or_else(|_| "587".to_string())
                    .parse()
                    .expect("EMAIL_PORT must be a number"),
                smtp_username: env::var("EMAIL_USER").ok(),
                smtp_password: env::var("EMAIL_PASS").ok(),
                from_name: env::var("EMAIL_FROM_NAME").unwrap_or_else(|_| "Vroum-Auto".to_string()),
                operator_recipient: env::var("EMAIL_ADMIN_RECIPIENT")
                    .unwrap_or_else(|_| from_email.clone()),
                from_email,
            },
        }
    }
}

pub async fn init_database(config: &Config) -> mongodb::error::Result<Database> {
    log::info!("Connecting to MongoDB database: {}", config.database_name);

    let client = Client::with_uri_str(&config.mongodb_uri).await?;
    let database = client.database(&config.database_name);

    ensure_indexes(&database).await?;

    Ok(database)
}

/// Unique indexes backing the uniqueness invariants: one account per email,
/// one favorite per (user, vehicle) pair.
async fn ensure_indexes(database: &Database) -> mongodb::error::Result<()> {
    let unique = IndexOptions::builder().unique(true).build();

    database
        .collection::<mongodb::bson::Document>("users")
        .create_index(
            IndexModel::builder()
                .keys(doc! { "email": 1 })
                .options(unique.clone())
                .build(),
            None,
        )
        .await?;

    database
        .collection::<mongodb::bson::Document>("favorites")
        .create_index(
            IndexModel::builder()
                .keys(doc! { "user": 1, "vehicle": 1 })
                .options(unique)
                .build(),
            None,
        )
        .await?;

    Ok(())
}
