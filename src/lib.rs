#[macro_use]
extern crate rocket;

#[macro_use]
extern crate log;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use rocket::{Build, Rocket};

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod notifier;

pub use config::Config;

/// Assemble the server: routes, logging, config, database and mail relay.
pub fn build() -> Rocket<Build> {
    rocket::build()
        .mount("/", api::routes())
        .register("/", api::catchers())
        .attach(logging::LoggerFairing)
        .attach(config::ConfigFairing)
        .attach(config::DatabaseFairing)
        .attach(notifier::NotifierFairing)
}

#[cfg(test)]
use std::{sync::Arc, time::Duration as StdDuration};

#[cfg(test)]
use mongodb::{bson::doc, options::ClientOptions, Client as DbClient, Database};

#[cfg(test)]
use crate::{
    model::{
        api::auth::Rights,
        db::{NewCandidate, NewUser, NewVoter, User},
        login::TokenAuthority,
        mongodb::{ensure_indexes_exist, Coll, Id},
    },
    notifier::{Notifier, RecordingNotifier},
};

/// Connect to the configured test database server.
///
/// Panics if the server cannot be reached.
#[cfg(test)]
pub(crate) async fn db_client() -> DbClient {
    let db_uri = rocket::Config::figment()
        .extract::<config::DbConfig>()
        .expect("Failed to load test database config")
        .db_uri;
    let mut options = ClientOptions::parse(db_uri)
        .await
        .expect("Invalid test database URI");
    options.server_selection_timeout = Some(StdDuration::from_secs(5));
    let client = DbClient::with_options(options).expect("Invalid test database options");
    client
        .database("admin")
        .run_command(doc! { "ping": 1 }, None)
        .await
        .expect("Test database server is unreachable");
    client
}

/// A fresh, random database name, so tests never collide.
#[cfg(test)]
pub(crate) fn database() -> String {
    let random: u32 = rand::random();
    format!("test{random}")
}

/// A server instance on the given database, recording login links rather than sending them.
#[cfg(test)]
pub(crate) async fn rocket_for_db_and_notifier(
    db_client: DbClient,
    db_name: &str,
    notifier: Arc<RecordingNotifier>,
) -> Rocket<Build> {
    rocket_for_figment(rocket::Config::figment(), db_client, db_name, notifier).await
}

/// As [`rocket_for_db_and_notifier`], but configured from the given figment.
#[cfg(test)]
pub(crate) async fn rocket_for_figment(
    figment: rocket::figment::Figment,
    db_client: DbClient,
    db_name: &str,
    notifier: Arc<RecordingNotifier>,
) -> Rocket<Build> {
    let db = db_client.database(db_name);
    ensure_indexes_exist(&db).await.unwrap();
    let dyn_notifier: Arc<dyn Notifier> = notifier.clone();
    rocket::custom(figment)
        .mount("/", api::routes())
        .register("/", api::catchers())
        .attach(config::ConfigFairing)
        .manage(db_client)
        .manage(db)
        .manage(dyn_notifier)
        .manage(notifier)
}

/// Create an account with the given rights and log the client in as it,
/// by consuming a freshly issued login link.
#[cfg(test)]
pub(crate) async fn log_in_as(
    client: &rocket::local::asynchronous::Client,
    db: &Database,
    rights: Rights,
) -> User {
    let new_user = match rights {
        Rights::Admin => NewUser::admin_example(),
        Rights::Voter => NewUser::example(),
        Rights::Candidate => NewUser {
            role: Rights::Candidate,
            ..NewUser::example2()
        },
    };
    let id: Id = Coll::<NewUser>::from_db(db)
        .insert_one(&new_user, None)
        .await
        .unwrap()
        .inserted_id
        .as_object_id()
        .unwrap()
        .into();
    match rights {
        Rights::Admin => {}
        Rights::Voter => {
            Coll::<NewVoter>::from_db(db)
                .insert_one(NewVoter::new(id), None)
                .await
                .unwrap();
        }
        Rights::Candidate => {
            Coll::<NewCandidate>::from_db(db)
                .insert_one(NewCandidate::new(id, new_user.name.clone()), None)
                .await
                .unwrap();
        }
    }
    let user = User { id, user: new_user };

    let config = client.rocket().state::<Config>().unwrap();
    let authority = TokenAuthority::new(db, config.hmac_secret());
    let token = authority.issue(&user, config.login_ttl()).await.unwrap();
    let signed = authority.sign(&token);
    let response = client
        .get(uri!(api::auth::verify(token = signed.as_str())))
        .dispatch()
        .await;
    assert_eq!(rocket::http::Status::Ok, response.status());
    user
}
