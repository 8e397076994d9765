use chrono::Duration;
use mongodb::{bson::doc, error::Error as DbError, Client as MongoClient};
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;

use crate::model::{
    api::{auth::Rights, email::Email},
    db::{Branch, NewUser, User, YearOfStudy},
    mongodb::{ensure_indexes_exist, Coll},
};

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Deserialize)]
pub struct Config {
    // non-secrets
    public_url: String,
    login_ttl: u32,
    auth_ttl: u32,
    #[serde(default)]
    dev_mode: bool,
    admin_email: Email,
    // secrets
    jwt_secret: String,
    hmac_secret: String,
}

impl Config {
    /// The externally visible base URL of the site, without a trailing slash.
    /// Login links are built on it.
    pub fn public_url(&self) -> &str {
        self.public_url.trim_end_matches('/')
    }

    /// Valid lifetime of login links in minutes.
    pub fn login_ttl(&self) -> Duration {
        Duration::minutes(self.login_ttl.into())
    }

    /// Valid lifetime of auth token cookies in seconds.
    pub fn auth_ttl(&self) -> Duration {
        Duration::seconds(self.auth_ttl.into())
    }

    /// In development mode, undeliverable login links are handed back to the requester.
    pub fn dev_mode(&self) -> bool {
        self.dev_mode
    }

    /// Address of the administrator account created on first start.
    pub fn admin_email(&self) -> &Email {
        &self.admin_email
    }

    /// Secret key used to encrypt JWTs.
    pub fn jwt_secret(&self) -> &[u8] {
        self.jwt_secret.as_bytes()
    }

    /// Secret key used to sign login links.
    pub fn hmac_secret(&self) -> &[u8] {
        self.hmac_secret.as_bytes()
    }
}

/// A fairing that loads the application config and puts it in managed state.
/// This could easily be achieved using `AdHoc::config`, but is written out
/// explicitly for symmetry with the other fairings and control over error
/// messages.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        // Manage the state.
        rocket = rocket.manage(config);
        Ok(rocket)
    }
}

/// Configuration for the database.
#[derive(Deserialize)]
pub struct DbConfig {
    // secrets
    pub db_uri: String,
}

/// A fairing that loads the MongoDB config, connects to the database,
/// performs any setup necessary, and places both a `Client` and a `Database`
/// into managed state.
pub struct DatabaseFairing;

#[rocket::async_trait]
impl Fairing for DatabaseFairing {
    fn info(&self) -> Info {
        Info {
            name: "MongoDB",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<DbConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load database config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        let admin_email = match rocket.figment().extract_inner::<Email>("admin_email") {
            Ok(email) => email,
            Err(e) => {
                error!("Failed to load bootstrap admin address");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        info!("Loaded database config, connecting...");
        // Construct the connection.
        let client = match MongoClient::with_uri_str(config.db_uri).await {
            Ok(client) => client,
            Err(e) => {
                error!("Failed to connect to database: {e}");
                return Err(rocket);
            }
        };
        let db = client.database(DATABASE_NAME);

        // Ensure the required indexes exist.
        if let Err(e) = ensure_indexes_exist(&db).await {
            error!("Failed to connect to database: {e}");
            return Err(rocket);
        }

        // Ensure there is at least one admin user.
        let users = Coll::from_db(&db);
        let new_users = Coll::from_db(&db);
        if let Err(e) = ensure_admin_exists(&users, &new_users, admin_email).await {
            error!("Failed to connect to database: {e}");
            return Err(rocket);
        }
        info!("...database connection online!");

        // Manage the state.
        rocket = rocket.manage(client).manage(db);
        Ok(rocket)
    }
}

/// The name of the production database.
pub const DATABASE_NAME: &str = "evote";

/// If no administrator exists, make the account with the given address one,
/// creating it if necessary.
pub async fn ensure_admin_exists(
    users: &Coll<User>,
    new_users: &Coll<NewUser>,
    email: Email,
) -> Result<(), DbError> {
    let admin_filter = doc! { "role": Rights::Admin as i32 };
    if users.find_one(admin_filter, None).await?.is_some() {
        return Ok(());
    }

    let promoted = users
        .update_one(
            doc! { "email": email.clone() },
            doc! { "$set": { "role": Rights::Admin as i32 } },
            None,
        )
        .await?;
    if promoted.matched_count > 0 {
        warn!("No admin found, promoted existing user {email} to admin");
        return Ok(());
    }

    let admin = NewUser {
        email: email.clone(),
        name: "Administrator".to_string(),
        role: Rights::Admin,
        branch: Branch::Cse,
        year_of_study: YearOfStudy::Fourth,
    };
    new_users.insert_one(admin, None).await?;
    warn!("No admin found, created bootstrap admin {email}");
    Ok(())
}

#[cfg(test)]
mod examples {
    use super::*;

    impl Config {
        pub fn example() -> Self {
            Self {
                public_url: "http://localhost:8000/".to_string(),
                login_ttl: 15,
                auth_ttl: 3600,
                dev_mode: false,
                admin_email: "returning.officer@college.example".parse().unwrap(),
                jwt_secret: "test jwt secret".to_string(),
                hmac_secret: "test hmac secret".to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors_convert_units() {
        let config = Config::example();
        assert_eq!("http://localhost:8000", config.public_url());
        assert_eq!(Duration::minutes(15), config.login_ttl());
        assert_eq!(Duration::hours(1), config.auth_ttl());
        assert!(!config.dev_mode());
    }

    #[backend_test]
    async fn bootstrap_admin_is_created_once(users: Coll<User>, new_users: Coll<NewUser>) {
        let email: Email = "boss@college.example".parse().unwrap();
        ensure_admin_exists(&users, &new_users, email.clone()).await.unwrap();
        ensure_admin_exists(&users, &new_users, email.clone()).await.unwrap();

        let admins = users
            .count_documents(doc! { "role": Rights::Admin as i32 }, None)
            .await
            .unwrap();
        assert_eq!(1, admins);
        let admin = users
            .find_one(doc! { "email": email.clone() }, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(Rights::Admin, admin.role);
    }

    #[backend_test]
    async fn bootstrap_promotes_existing_account(users: Coll<User>, new_users: Coll<NewUser>) {
        new_users.insert_one(NewUser::example(), None).await.unwrap();
        ensure_admin_exists(&users, &new_users, Email::example())
            .await
            .unwrap();

        assert_eq!(1, users.count_documents(None, None).await.unwrap());
        let user = users.find_one(None, None).await.unwrap().unwrap();
        assert_eq!(Rights::Admin, user.role);
    }
}
